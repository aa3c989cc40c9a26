use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

/// Target job limit for an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Quota {
    /// `maxjobs=0`: the account cannot start new work
    Disabled,
    /// Limit removed
    Unlimited,
}

impl fmt::Display for Quota {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quota::Disabled => write!(f, "disabled"),
            Quota::Unlimited => write!(f, "unlimited"),
        }
    }
}

/// One change to apply to the accounting subsystem.
///
/// Intents are plain data. The engine produces them, the executor turns
/// each into exactly one backend command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MutationIntent {
    CreateAccount {
        account: String,
        parent: String,
        amount: u64,
        default_qos: String,
        qos: Vec<String>,
    },
    SetQuota {
        account: String,
        quota: Quota,
    },
    AddMembers {
        account: String,
        users: BTreeSet<String>,
        /// Also make `account` the default account of every added user
        default_account: bool,
    },
    RemoveMembers {
        account: String,
        users: BTreeSet<String>,
    },
    /// Full replacement of the account's QoS list
    SetQos {
        account: String,
        qos: Vec<String>,
    },
    SetAmount {
        account: String,
        amount: u64,
    },
}

impl MutationIntent {
    pub fn account(&self) -> &str {
        match self {
            MutationIntent::CreateAccount { account, .. }
            | MutationIntent::SetQuota { account, .. }
            | MutationIntent::AddMembers { account, .. }
            | MutationIntent::RemoveMembers { account, .. }
            | MutationIntent::SetQos { account, .. }
            | MutationIntent::SetAmount { account, .. } => account,
        }
    }

    /// Short stable name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            MutationIntent::CreateAccount { .. } => "create_account",
            MutationIntent::SetQuota { .. } => "set_quota",
            MutationIntent::AddMembers { .. } => "add_members",
            MutationIntent::RemoveMembers { .. } => "remove_members",
            MutationIntent::SetQos { .. } => "set_qos",
            MutationIntent::SetAmount { .. } => "set_amount",
        }
    }
}

fn join(items: impl IntoIterator<Item = impl AsRef<str>>) -> String {
    items
        .into_iter()
        .map(|s| s.as_ref().to_string())
        .collect::<Vec<_>>()
        .join(",")
}

impl fmt::Display for MutationIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MutationIntent::CreateAccount {
                account,
                parent,
                amount,
                qos,
                ..
            } => write!(
                f,
                "create account {} (parent {}, amount {}, qos {})",
                account,
                parent,
                amount,
                join(qos)
            ),
            MutationIntent::SetQuota { account, quota } => {
                write!(f, "set quota of {} to {}", account, quota)
            }
            MutationIntent::AddMembers { account, users, .. } => {
                write!(f, "add {} to {}", join(users), account)
            }
            MutationIntent::RemoveMembers { account, users } => {
                write!(f, "remove {} from {}", join(users), account)
            }
            MutationIntent::SetQos { account, qos } => {
                write!(f, "set qos of {} to {}", account, join(qos))
            }
            MutationIntent::SetAmount { account, amount } => {
                write!(f, "set amount of {} to {}", account, amount)
            }
        }
    }
}

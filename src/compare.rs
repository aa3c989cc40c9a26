//! Directory group vs. accounting account membership comparison.
//!
//! Read-only helper: for each (account, group) pair it reports which users
//! would have to be added to or removed from the account so that its
//! membership matches the directory group. Nothing is changed.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::accounting::command;
use crate::backend::Backend;
use crate::error::{Result, SlurpError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MembershipDelta {
    pub account: String,
    pub group: String,
    /// In the directory group but not in the account
    pub to_add: BTreeSet<String>,
    /// In the account but not in the directory group
    pub to_remove: BTreeSet<String>,
}

impl MembershipDelta {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

/// Members of a group from a `getent group` line (`name:x:gid:a,b,c`).
pub fn parse_group_entry(line: &str) -> Result<BTreeSet<String>> {
    let fields: Vec<&str> = line.trim().split(':').collect();
    if fields.len() != 4 {
        return Err(SlurpError::BackendQueryError {
            command: "getent group".into(),
            diagnostic: format!("unexpected group entry {:?}", line.trim()),
        });
    }
    Ok(fields[3]
        .split(',')
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .map(String::from)
        .collect())
}

async fn group_members(directory: &dyn Backend, group: &str) -> Result<BTreeSet<String>> {
    let args = vec!["group".to_string(), group.to_string()];
    let output = directory.run(&args).await?;
    if !output.success() {
        return Err(SlurpError::BackendQueryError {
            command: directory.describe(&args),
            diagnostic: format!("group {} not found ({})", group, output.diagnostic()),
        });
    }
    let line = output.stdout.lines().next().unwrap_or_default();
    parse_group_entry(line)
}

async fn account_members(accounting: &dyn Backend, account: &str) -> Result<BTreeSet<String>> {
    let args = command::show_account_users(account);
    let output = accounting.run(&args).await?;
    if !output.success() {
        return Err(SlurpError::BackendQueryError {
            command: accounting.describe(&args),
            diagnostic: output.diagnostic(),
        });
    }
    Ok(output
        .stdout
        .lines()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .map(String::from)
        .collect())
}

/// Compare each `(account, group)` pair.
pub async fn compare_membership<'a, I>(
    accounting: &dyn Backend,
    directory: &dyn Backend,
    pairs: I,
) -> Result<Vec<MembershipDelta>>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut deltas = Vec::new();
    for (account, group) in pairs {
        let directory_users = group_members(directory, group).await?;
        let account_users = account_members(accounting, account).await?;

        let delta = MembershipDelta {
            account: account.to_string(),
            group: group.to_string(),
            to_add: directory_users.difference(&account_users).cloned().collect(),
            to_remove: account_users.difference(&directory_users).cloned().collect(),
        };
        tracing::debug!(
            account,
            group,
            to_add = delta.to_add.len(),
            to_remove = delta.to_remove.len(),
            "Compared membership"
        );
        deltas.push(delta);
    }
    Ok(deltas)
}

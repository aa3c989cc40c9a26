use std::collections::{BTreeSet, HashMap};
use std::fmt;

use serde::Serialize;

use crate::reconcile::{MutationIntent, Quota};

/// Observed accounting state, keyed by account name.
pub type AccountState = HashMap<String, AccountRecord>;

/// Job limit currently set on an account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum MaxJobs {
    #[default]
    Unlimited,
    Limited(u32),
}

impl MaxJobs {
    /// `maxjobs=0` is how an account is switched off.
    pub fn is_disabled(&self) -> bool {
        matches!(self, MaxJobs::Limited(0))
    }

    /// Parse the `maxjobs` column. Empty and `-1` both mean no limit.
    pub fn parse(field: &str) -> Result<Self, String> {
        match field.trim() {
            "" | "-1" => Ok(MaxJobs::Unlimited),
            value => value
                .parse::<u32>()
                .map(MaxJobs::Limited)
                .map_err(|_| format!("invalid maxjobs value {:?}", value)),
        }
    }
}

impl fmt::Display for MaxJobs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaxJobs::Unlimited => write!(f, "unlimited"),
            MaxJobs::Limited(n) => write!(f, "{}", n),
        }
    }
}

impl From<Quota> for MaxJobs {
    fn from(quota: Quota) -> Self {
        match quota {
            Quota::Disabled => MaxJobs::Limited(0),
            Quota::Unlimited => MaxJobs::Unlimited,
        }
    }
}

/// An account as the accounting subsystem currently reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountRecord {
    pub name: String,
    pub members: BTreeSet<String>,
    pub max_jobs: MaxJobs,
    /// QoS labels in the order the backend reports them
    pub qos: Vec<String>,
    /// Resource grant; `None` when the attribute is unset
    pub amount: Option<u64>,
}

impl AccountRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: BTreeSet::new(),
            max_jobs: MaxJobs::Unlimited,
            qos: Vec::new(),
            amount: None,
        }
    }

    pub fn with_members<I, S>(mut self, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.members = members.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_max_jobs(mut self, max_jobs: MaxJobs) -> Self {
        self.max_jobs = max_jobs;
        self
    }

    pub fn with_qos<I, S>(mut self, qos: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.qos = qos.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_amount(mut self, amount: u64) -> Self {
        self.amount = Some(amount);
        self
    }

    /// QoS labels on this account that are not part of `default_set`.
    pub fn extra_qos(&self, default_set: &[String]) -> BTreeSet<String> {
        self.qos
            .iter()
            .filter(|label| !default_set.contains(label))
            .cloned()
            .collect()
    }

    /// Fold the effect of an intent into this record. Intents for other
    /// accounts are ignored; returns whether anything was applied.
    pub fn apply(&mut self, intent: &MutationIntent) -> bool {
        if intent.account() != self.name {
            return false;
        }
        match intent {
            MutationIntent::CreateAccount { amount, qos, .. } => {
                self.max_jobs = MaxJobs::Unlimited;
                self.qos = qos.clone();
                self.amount = Some(*amount);
            }
            MutationIntent::SetQuota { quota, .. } => self.max_jobs = (*quota).into(),
            MutationIntent::AddMembers { users, .. } => {
                self.members.extend(users.iter().cloned());
            }
            MutationIntent::RemoveMembers { users, .. } => {
                self.members.retain(|m| !users.contains(m));
            }
            MutationIntent::SetQos { qos, .. } => self.qos = qos.clone(),
            MutationIntent::SetAmount { amount, .. } => self.amount = Some(*amount),
        }
        true
    }
}

/// Apply an intent to a whole state map, creating the record for
/// `CreateAccount` when it is not there yet.
pub fn apply_intent(state: &mut AccountState, intent: &MutationIntent) {
    let record = state
        .entry(intent.account().to_string())
        .or_insert_with(|| AccountRecord::new(intent.account()));
    record.apply(intent);
}

use thiserror::Error;

use crate::reconcile::MutationIntent;

/// A single mutation that the accounting backend refused.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{intent} failed: {diagnostic}")]
pub struct MutationError {
    pub intent: MutationIntent,
    pub diagnostic: String,
}

#[derive(Error, Debug)]
pub enum SlurpError {
    #[error("Accounting backend unavailable ({program}): {reason}")]
    BackendUnavailable { program: String, reason: String },

    #[error("Accounting query failed: {command}\n{diagnostic}")]
    BackendQueryError { command: String, diagnostic: String },

    #[error("Mutation error: {0}")]
    Mutation(#[from] MutationError),

    #[error("Allocation feed unavailable: {0}")]
    FeedUnavailable(String),

    #[error("Allocation feed malformed: {0}")]
    FeedMalformed(String),

    #[error("No parent account for project {project_id}: no explicit parent and no prefix rule matches")]
    UnresolvedParent { project_id: String },

    #[error("Account {account} could not be read from accounting state; allocation skipped")]
    UnreadableAccount { account: String },

    #[error("Malformed allocation {allocation}: {reason}")]
    MalformedAllocation { allocation: String, reason: String },

    #[error("Malformed association row {line}: {reason}")]
    MalformedRow { line: usize, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Too many failures encountered ({count} > {threshold}), exiting")]
    ErrorBudgetExhausted { count: usize, threshold: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Settings file error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl SlurpError {
    /// Whether this error ends the run on its own, regardless of the error budget.
    pub fn is_fatal(&self) -> bool {
        match self {
            SlurpError::BackendUnavailable { .. }
            | SlurpError::BackendQueryError { .. }
            | SlurpError::FeedUnavailable(_)
            | SlurpError::FeedMalformed(_)
            | SlurpError::Config(_)
            | SlurpError::ErrorBudgetExhausted { .. }
            | SlurpError::Io(_)
            | SlurpError::Toml(_) => true,
            SlurpError::Mutation(_)
            | SlurpError::UnresolvedParent { .. }
            | SlurpError::UnreadableAccount { .. }
            | SlurpError::MalformedAllocation { .. }
            | SlurpError::MalformedRow { .. } => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, SlurpError>;

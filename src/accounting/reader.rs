use std::sync::Arc;

use crate::accounting::command;
use crate::accounting::parser::{parse_associations, ParsedAssociations};
use crate::backend::Backend;
use crate::config::{ClusterConfig, RowPolicy};
use crate::error::{Result, SlurpError};

/// Reads the current association state for one cluster.
pub struct AccountingReader {
    backend: Arc<dyn Backend>,
    cluster: ClusterConfig,
    row_policy: RowPolicy,
    stderr_is_failure: bool,
}

impl AccountingReader {
    pub fn new(backend: Arc<dyn Backend>, cluster: ClusterConfig) -> Self {
        Self {
            backend,
            cluster,
            row_policy: RowPolicy::default(),
            stderr_is_failure: false,
        }
    }

    pub fn with_row_policy(mut self, policy: RowPolicy) -> Self {
        self.row_policy = policy;
        self
    }

    pub fn with_stderr_is_failure(mut self, enabled: bool) -> Self {
        self.stderr_is_failure = enabled;
        self
    }

    /// Query the accounting subsystem and parse its association listing.
    ///
    /// # Errors
    ///
    /// [`SlurpError::BackendUnavailable`] when the program cannot be started,
    /// [`SlurpError::BackendQueryError`] when the query itself fails. Rows that
    /// do not parse are not errors here; they come back in
    /// [`ParsedAssociations::rejected`].
    pub async fn read(&self) -> Result<ParsedAssociations> {
        let args = command::show_associations(&self.cluster);
        let output = self.backend.run(&args).await?;

        if output.is_failure(self.stderr_is_failure) {
            return Err(SlurpError::BackendQueryError {
                command: self.backend.describe(&args),
                diagnostic: output.diagnostic(),
            });
        }
        if !output.stderr.trim().is_empty() {
            tracing::warn!(stderr = %output.stderr.trim(), "Association query wrote to stderr");
        }

        let parsed = parse_associations(&output.stdout, self.row_policy);
        tracing::info!(
            cluster = %self.cluster.name,
            accounts = parsed.accounts.len(),
            rejected_rows = parsed.rejected.len(),
            "Read accounting state"
        );
        Ok(parsed)
    }
}

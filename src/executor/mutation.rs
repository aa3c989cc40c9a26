use std::sync::Arc;

use crate::accounting::command;
use crate::backend::Backend;
use crate::config::ClusterConfig;
use crate::error::{MutationError, Result, SlurpError};
use crate::reconcile::MutationIntent;

/// Applies intents to the accounting subsystem, one command each.
pub struct MutationExecutor {
    backend: Arc<dyn Backend>,
    cluster: ClusterConfig,
    stderr_is_failure: bool,
}

impl MutationExecutor {
    pub fn new(backend: Arc<dyn Backend>, cluster: ClusterConfig) -> Self {
        Self {
            backend,
            cluster,
            stderr_is_failure: false,
        }
    }

    pub fn with_stderr_is_failure(mut self, enabled: bool) -> Self {
        self.stderr_is_failure = enabled;
        self
    }

    /// Apply a single intent.
    ///
    /// # Errors
    ///
    /// [`SlurpError::Mutation`] when the backend rejected the command, or
    /// [`SlurpError::BackendUnavailable`] when it could not be run at all.
    pub async fn apply(&self, intent: &MutationIntent) -> Result<()> {
        let args = command::render(intent, &self.cluster);
        tracing::info!(
            account = %intent.account(),
            kind = intent.kind(),
            command = %self.backend.describe(&args),
            "Applying mutation"
        );

        let output = self.backend.run(&args).await?;
        if output.is_failure(self.stderr_is_failure) {
            return Err(SlurpError::Mutation(MutationError {
                intent: intent.clone(),
                diagnostic: output.diagnostic(),
            }));
        }
        if !output.stderr.trim().is_empty() {
            tracing::warn!(
                account = %intent.account(),
                stderr = %output.stderr.trim(),
                "Mutation succeeded with diagnostics"
            );
        }
        Ok(())
    }
}

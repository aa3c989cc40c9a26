use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

use crate::accounting::AccountingReader;
use crate::backend::Backend;
use crate::budget::ErrorBudget;
use crate::config::Settings;
use crate::error::Result;
use crate::executor::MutationExecutor;
use crate::feed::AllocationSource;
use crate::reconcile::Reconciler;

/// Summary of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub cluster: String,
    pub today: NaiveDate,
    pub accounts_observed: usize,
    pub allocations: usize,
    pub intents_planned: usize,
    pub intents_applied: usize,
    /// Every recoverable failure recorded during the run
    pub failures: Vec<String>,
}

/// One complete reconciliation pass: read observed state, fetch desired
/// state, plan, then apply intents strictly one after another.
pub struct SyncRun {
    reader: AccountingReader,
    source: Arc<dyn AllocationSource>,
    reconciler: Reconciler,
    executor: MutationExecutor,
    error_threshold: usize,
}

impl SyncRun {
    pub fn new(
        reader: AccountingReader,
        source: Arc<dyn AllocationSource>,
        reconciler: Reconciler,
        executor: MutationExecutor,
        error_threshold: usize,
    ) -> Self {
        Self {
            reader,
            source,
            reconciler,
            executor,
            error_threshold,
        }
    }

    /// Wire a run from settings. Reads go to `query_backend`, mutations to
    /// `mutation_backend` (a dry-run backend in debug mode).
    pub fn from_settings(
        settings: &Settings,
        query_backend: Arc<dyn Backend>,
        mutation_backend: Arc<dyn Backend>,
        source: Arc<dyn AllocationSource>,
    ) -> Self {
        let cluster = settings.cluster.clone();
        let reader = AccountingReader::new(query_backend, cluster.clone())
            .with_row_policy(settings.backend.row_policy)
            .with_stderr_is_failure(settings.backend.stderr_is_failure);
        let executor = MutationExecutor::new(mutation_backend, cluster.clone())
            .with_stderr_is_failure(settings.backend.stderr_is_failure);

        Self::new(
            reader,
            source,
            Reconciler::new(cluster),
            executor,
            settings.error_threshold,
        )
    }

    /// Execute the run as of `today`.
    ///
    /// # Errors
    ///
    /// Fatal errors (invalid cluster settings, backend unavailable, failed
    /// state query, feed errors)
    /// end the run immediately. Recoverable errors are recorded in the
    /// run's [`ErrorBudget`]; the run ends with
    /// [`SlurpError::ErrorBudgetExhausted`](crate::error::SlurpError::ErrorBudgetExhausted)
    /// once too many have accumulated.
    pub async fn execute(&self, today: NaiveDate) -> Result<RunReport> {
        self.reconciler.cluster().validate()?;
        let run_id = Uuid::new_v4();
        let mut budget = ErrorBudget::new(self.error_threshold);
        let cluster = self.reconciler.cluster().name.clone();

        tracing::info!(run_id = %run_id, cluster = %cluster, today = %today, "Starting reconciliation run");

        let observed = self.reader.read().await?;
        for rejected in &observed.rejected {
            budget.record(rejected)?;
        }

        let desired = self.source.fetch().await?;
        for rejected in &desired.rejected {
            budget.record(rejected)?;
        }

        let plan = self.reconciler.reconcile_partial(
            &observed.accounts,
            &observed.unreadable,
            &desired.allocations,
            today,
        );
        for skipped in &plan.skipped {
            budget.record(skipped)?;
        }
        tracing::info!(
            run_id = %run_id,
            intents = plan.intents.len(),
            skipped = plan.skipped.len(),
            "Reconciliation planned"
        );

        let mut applied = 0;
        for intent in &plan.intents {
            match self.executor.apply(intent).await {
                Ok(()) => applied += 1,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => budget.record(&e)?,
            }
        }

        let report = RunReport {
            run_id,
            cluster,
            today,
            accounts_observed: observed.accounts.len(),
            allocations: desired.allocations.len(),
            intents_planned: plan.intents.len(),
            intents_applied: applied,
            failures: budget.messages().to_vec(),
        };
        tracing::info!(
            run_id = %run_id,
            applied = report.intents_applied,
            planned = report.intents_planned,
            failures = report.failures.len(),
            "Reconciliation run complete"
        );
        Ok(report)
    }
}

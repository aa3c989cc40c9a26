//! Mutation execution.
//!
//! [`MutationExecutor::apply`] renders one [`MutationIntent`] into one
//! accounting command and runs it. It never batches, reorders or retries,
//! and it does not decide whether a failure should stop the run; that is
//! the [`ErrorBudget`]'s job.
//!
//! [`MutationIntent`]: crate::reconcile::MutationIntent
//! [`ErrorBudget`]: crate::budget::ErrorBudget

pub mod mutation;

pub use mutation::MutationExecutor;

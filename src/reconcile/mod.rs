//! Reconciliation engine.
//!
//! Diffs observed accounting state against the desired allocations and
//! emits the [`MutationIntent`]s needed to converge them. For each
//! allocation, in feed order:
//!
//! 1. **Parent**: explicit parent, else the first matching prefix rule.
//!    No match skips the allocation with [`UnresolvedParent`].
//! 2. **Existence**: a missing account gets `CreateAccount`; planning then
//!    continues against the freshly created record.
//! 3. **Quota**: disabled (deactivated or outside the validity window)
//!    accounts get `maxjobs=0`, enabled ones get the limit lifted. Nothing
//!    is emitted when the account is already in the right state.
//! 4. **Membership**: set difference in both directions.
//! 5. **QoS**: full replacement when the non-default labels differ.
//! 6. **Amount**: replaced when it differs.
//!
//! [`UnresolvedParent`]: crate::error::SlurpError::UnresolvedParent

pub mod engine;
pub mod intent;

pub use engine::{Reconciler, Reconciliation};
pub use intent::{MutationIntent, Quota};

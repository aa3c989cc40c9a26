use std::collections::BTreeSet;

use chrono::NaiveDate;

use crate::accounting::{AccountRecord, AccountState};
use crate::config::ClusterConfig;
use crate::error::{Result, SlurpError};
use crate::feed::AllocationRecord;
use crate::reconcile::intent::{MutationIntent, Quota};

/// Output of one reconciliation pass.
#[derive(Debug, Default)]
pub struct Reconciliation {
    /// Intents in application order
    pub intents: Vec<MutationIntent>,
    /// Allocations that produced no intents because they could not be planned
    pub skipped: Vec<SlurpError>,
}

impl Reconciliation {
    pub fn is_converged(&self) -> bool {
        self.intents.is_empty()
    }
}

/// Computes the intents that converge observed accounting state onto the
/// desired allocations.
///
/// The engine does no I/O and is deterministic: the same observed state,
/// allocations and date always yield the same intents.
#[derive(Debug, Clone)]
pub struct Reconciler {
    cluster: ClusterConfig,
}

impl Reconciler {
    pub fn new(cluster: ClusterConfig) -> Self {
        Self { cluster }
    }

    pub fn cluster(&self) -> &ClusterConfig {
        &self.cluster
    }

    /// Parent account for an allocation: the explicit parent when present,
    /// otherwise the first prefix rule matching the project id.
    pub fn resolve_parent(&self, allocation: &AllocationRecord) -> Result<String> {
        if let Some(parent) = allocation.parent.as_deref().filter(|p| !p.is_empty()) {
            return Ok(parent.to_string());
        }
        self.cluster
            .parent_rules
            .iter()
            .find(|rule| allocation.project_id.starts_with(&rule.prefix))
            .map(|rule| rule.parent.clone())
            .ok_or_else(|| SlurpError::UnresolvedParent {
                project_id: allocation.project_id.clone(),
            })
    }

    /// Addenda with duplicates and default labels removed, registry order kept.
    fn extra_qos(&self, allocation: &AllocationRecord) -> Vec<String> {
        let mut extra: Vec<String> = Vec::new();
        for label in &allocation.qos_addenda {
            if !self.cluster.default_qos.contains(label) && !extra.contains(label) {
                extra.push(label.clone());
            }
        }
        extra
    }

    /// Full QoS list an account for `allocation` should carry.
    pub fn desired_qos(&self, allocation: &AllocationRecord) -> Vec<String> {
        let mut qos = self.cluster.default_qos.clone();
        qos.extend(self.extra_qos(allocation));
        qos
    }

    /// Intents for a single allocation, in create → quota → membership →
    /// QoS → amount order. `current` is the account as it stands, if it exists.
    pub fn plan_allocation(
        &self,
        current: Option<&AccountRecord>,
        allocation: &AllocationRecord,
        today: NaiveDate,
    ) -> Result<Vec<MutationIntent>> {
        let parent = self.resolve_parent(allocation)?;
        let account = allocation.project_id.clone();
        let desired_qos = self.desired_qos(allocation);
        let mut intents = Vec::new();

        let seeded;
        let record = match current {
            Some(record) => record,
            None => {
                let default_qos = self.cluster.default_qos_label().ok_or_else(|| {
                    SlurpError::Config("default QoS set must not be empty".into())
                })?;
                let create = MutationIntent::CreateAccount {
                    account: account.clone(),
                    parent,
                    amount: allocation.amount,
                    default_qos: default_qos.to_string(),
                    qos: desired_qos.clone(),
                };
                let mut fresh = AccountRecord::new(account.clone());
                fresh.apply(&create);
                intents.push(create);
                seeded = fresh;
                &seeded
            }
        };

        // Quota gate
        let disabled = !allocation.is_active_on(today);
        if disabled && !record.max_jobs.is_disabled() {
            intents.push(MutationIntent::SetQuota {
                account: account.clone(),
                quota: Quota::Disabled,
            });
        } else if !disabled && record.max_jobs.is_disabled() {
            intents.push(MutationIntent::SetQuota {
                account: account.clone(),
                quota: Quota::Unlimited,
            });
        }

        // Membership
        let adds: BTreeSet<String> = allocation
            .collaborators
            .difference(&record.members)
            .cloned()
            .collect();
        let removes: BTreeSet<String> = record
            .members
            .difference(&allocation.collaborators)
            .cloned()
            .collect();
        if !adds.is_empty() {
            intents.push(MutationIntent::AddMembers {
                account: account.clone(),
                users: adds,
                default_account: self.cluster.is_general_account(&account),
            });
        }
        if !removes.is_empty() {
            intents.push(MutationIntent::RemoveMembers {
                account: account.clone(),
                users: removes,
            });
        }

        // QoS, replaced wholesale
        let wanted_extra: BTreeSet<String> = self.extra_qos(allocation).into_iter().collect();
        if record.extra_qos(&self.cluster.default_qos) != wanted_extra {
            intents.push(MutationIntent::SetQos {
                account: account.clone(),
                qos: desired_qos,
            });
        }

        // Amount
        if record.amount != Some(allocation.amount) {
            intents.push(MutationIntent::SetAmount {
                account,
                amount: allocation.amount,
            });
        }

        Ok(intents)
    }

    /// Plan every allocation in feed order.
    ///
    /// Each allocation is planned against a working view of `observed` into
    /// which the intents of earlier allocations have already been folded, so
    /// a project listed twice sees the result of its first entry. Allocations
    /// that cannot be planned are returned in [`Reconciliation::skipped`].
    pub fn reconcile(
        &self,
        observed: &AccountState,
        desired: &[AllocationRecord],
        today: NaiveDate,
    ) -> Reconciliation {
        self.reconcile_partial(observed, &BTreeSet::new(), desired, today)
    }

    /// Like [`reconcile`](Self::reconcile), for an observed state that could
    /// only be read in part. Allocations whose account is in `unreadable`
    /// are skipped with [`SlurpError::UnreadableAccount`].
    pub fn reconcile_partial(
        &self,
        observed: &AccountState,
        unreadable: &BTreeSet<String>,
        desired: &[AllocationRecord],
        today: NaiveDate,
    ) -> Reconciliation {
        let mut working = AccountState::new();
        let mut result = Reconciliation::default();

        for allocation in desired {
            if unreadable.contains(&allocation.project_id) {
                result.skipped.push(SlurpError::UnreadableAccount {
                    account: allocation.project_id.clone(),
                });
                continue;
            }
            let current = working
                .get(&allocation.project_id)
                .or_else(|| observed.get(&allocation.project_id));

            match self.plan_allocation(current, allocation, today) {
                Ok(intents) => {
                    tracing::debug!(
                        project_id = %allocation.project_id,
                        intents = intents.len(),
                        "Planned allocation"
                    );
                    if intents.is_empty() {
                        continue;
                    }
                    let mut record = current
                        .cloned()
                        .unwrap_or_else(|| AccountRecord::new(allocation.project_id.clone()));
                    for intent in &intents {
                        record.apply(intent);
                    }
                    working.insert(allocation.project_id.clone(), record);
                    result.intents.extend(intents);
                }
                Err(e) => result.skipped.push(e),
            }
        }

        result
    }
}

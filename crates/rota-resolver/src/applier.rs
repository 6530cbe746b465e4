//! Atomic application of validated edit sets.

use std::sync::Arc;

use rota_core::{CommitRecord, ConflictReport, EditSet, Reassignment, Result, RotaError, ScheduleChangeIntent};
use rota_state::ScheduleStore;

use crate::config::ApplierConfig;
use crate::resolver::{Proposal, Resolution, ResolveMode, Resolver};

/// What happened when a proposal was applied.
#[derive(Debug, Clone, PartialEq)]
pub enum ApplyOutcome {
    Committed {
        edits: EditSet,
        reassignments: Vec<Reassignment>,
        /// `None` when the edit set was empty and nothing was written.
        commit: Option<CommitRecord>,
    },
    /// A retry re-validated the intent against newer state and it no longer holds.
    Conflicted(ConflictReport),
}

/// Commits proposals, re-resolving on stale writes.
pub struct MutationApplier {
    store: Arc<dyn ScheduleStore>,
    resolver: Arc<dyn Resolver>,
    config: ApplierConfig,
}

impl MutationApplier {
    pub fn new(store: Arc<dyn ScheduleStore>, resolver: Arc<dyn Resolver>, config: ApplierConfig) -> Self {
        Self {
            store,
            resolver,
            config,
        }
    }

    pub fn config(&self) -> &ApplierConfig {
        &self.config
    }

    /// Commit `proposal`, which was derived from `intent` under `mode`.
    ///
    /// A stale write is never retried blindly: the intent is resolved again
    /// against current state, which may turn it into a conflict.
    pub async fn apply(
        &self,
        intent: &ScheduleChangeIntent,
        proposal: Proposal,
        mode: ResolveMode,
    ) -> Result<ApplyOutcome> {
        let mut proposal = proposal;
        let mut attempts: u32 = 0;

        loop {
            if proposal.edits.is_empty() {
                tracing::info!(intent = %intent.summary(), "Schedule already satisfies intent; nothing to write");
                return Ok(ApplyOutcome::Committed {
                    edits: proposal.edits,
                    reassignments: proposal.reassignments,
                    commit: None,
                });
            }

            attempts += 1;
            match self.store.put(&proposal.edits).await {
                Ok(commit) => {
                    return Ok(ApplyOutcome::Committed {
                        edits: proposal.edits,
                        reassignments: proposal.reassignments,
                        commit: Some(commit),
                    });
                }
                Err(RotaError::StaleWrite { dates }) => {
                    if attempts > self.config.max_retries {
                        tracing::warn!(intent = %intent.summary(), attempts, "Giving up after repeated stale writes");
                        return Err(RotaError::Contention { attempts });
                    }
                    tracing::info!(
                        intent = %intent.summary(),
                        attempt = attempts,
                        stale = ?dates,
                        "Stale write; resolving again"
                    );
                    match self.resolver.resolve(intent, mode).await? {
                        Resolution::Committable(next) => proposal = next,
                        Resolution::Conflicted(report) => return Ok(ApplyOutcome::Conflicted(report)),
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use rota_core::{Employee, EntryEdit, Role};
    use rota_state::InMemoryScheduleStore;
    use std::sync::atomic::{AtomicU32, Ordering};

    use crate::config::ResolverConfig;
    use crate::resolver::ConflictResolver;

    fn april(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, day).unwrap()
    }

    /// Always hands back an edit set that expects a version the store never has.
    struct StaleResolver {
        calls: AtomicU32,
    }

    fn stale_proposal() -> Proposal {
        let mut after = rota_core::Assignments::new();
        after.insert(Role::first_line_support(), "EMP001".into());
        Proposal {
            edits: EditSet {
                entries: vec![EntryEdit {
                    date: april(1),
                    expected_version: Some(99),
                    before: Default::default(),
                    after,
                }],
                ..EditSet::default()
            },
            reassignments: vec![],
        }
    }

    #[async_trait]
    impl Resolver for StaleResolver {
        async fn resolve(&self, _intent: &ScheduleChangeIntent, _mode: ResolveMode) -> Result<Resolution> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Resolution::Committable(stale_proposal()))
        }

        fn config(&self) -> &ResolverConfig {
            unreachable!()
        }
    }

    fn intent() -> ScheduleChangeIntent {
        ScheduleChangeIntent::builder()
            .target("EMP001")
            .on(april(1))
            .action(rota_core::ChangeAction::Assign)
            .build()
            .unwrap()
    }

    async fn store() -> Arc<InMemoryScheduleStore> {
        let store = Arc::new(InMemoryScheduleStore::new());
        store.register_employee(Employee::new("EMP001", "John Smith")).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_contention_after_max_retries() {
        let store = store().await;
        let resolver = Arc::new(StaleResolver {
            calls: AtomicU32::new(0),
        });
        let applier = MutationApplier::new(store.clone(), resolver.clone(), ApplierConfig { max_retries: 2 });

        let err = applier
            .apply(&intent(), stale_proposal(), ResolveMode::AutoResolve)
            .await
            .unwrap_err();

        assert!(matches!(err, RotaError::Contention { attempts: 3 }));
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 2);
        assert_eq!(store.version().await, 0);
    }

    #[tokio::test]
    async fn test_stale_proposal_is_re_resolved_and_committed() {
        let store = store().await;
        let resolver = Arc::new(ConflictResolver::new(store.clone(), ResolverConfig::default()));
        let applier = MutationApplier::new(store.clone(), resolver, ApplierConfig::default());

        let outcome = applier
            .apply(&intent(), stale_proposal(), ResolveMode::AutoResolve)
            .await
            .unwrap();

        let ApplyOutcome::Committed { commit, .. } = outcome else {
            panic!("expected commit");
        };
        assert!(commit.is_some());
        let entry = store.get(april(1)).await.unwrap().unwrap();
        assert_eq!(entry.assigned(&Role::first_line_support()).map(|e| e.as_str()), Some("EMP001"));
    }

    #[tokio::test]
    async fn test_empty_proposal_writes_nothing() {
        let store = store().await;
        let resolver = Arc::new(ConflictResolver::new(store.clone(), ResolverConfig::default()));
        let applier = MutationApplier::new(store.clone(), resolver, ApplierConfig::default());

        let proposal = Proposal {
            edits: EditSet::new(),
            reassignments: vec![],
        };
        let outcome = applier.apply(&intent(), proposal, ResolveMode::AutoResolve).await.unwrap();

        assert!(matches!(outcome, ApplyOutcome::Committed { commit: None, .. }));
        assert!(store.commits(10).await.unwrap().is_empty());
    }
}

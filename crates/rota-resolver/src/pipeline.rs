//! The change request pipeline.
//!
//! `text → intent → proposal → commit`, with every terminal outcome reported
//! as a [`ChangeResult`]. Direct schedule operations enter the same pipeline
//! with a structured intent, so no write skips validation.

use std::sync::Arc;

use chrono::NaiveDate;
use rota_core::{
    ChangeAction, ChangeResult, EmployeeNumber, RequestStatus, Result, Role, RotaError, ScheduleChangeIntent,
};
use rota_interpret::{IntentExtractor, Interpretation};
use rota_state::ScheduleStore;

use crate::applier::{ApplyOutcome, MutationApplier};
use crate::cancel::RequestContext;
use crate::config::{ApplierConfig, ResolverConfig};
use crate::resolver::{ConflictResolver, Resolution, ResolveMode, Resolver};

/// Ties the extractor, resolver and applier to one store.
pub struct ChangePipeline {
    store: Arc<dyn ScheduleStore>,
    extractor: IntentExtractor,
    resolver: Arc<dyn Resolver>,
    applier: MutationApplier,
}

impl ChangePipeline {
    pub fn new(
        store: Arc<dyn ScheduleStore>,
        extractor: IntentExtractor,
        resolver_config: ResolverConfig,
        applier_config: ApplierConfig,
    ) -> Self {
        let resolver: Arc<dyn Resolver> = Arc::new(ConflictResolver::new(store.clone(), resolver_config));
        Self::with_resolver(store, extractor, resolver, applier_config)
    }

    /// Build around a custom resolver.
    pub fn with_resolver(
        store: Arc<dyn ScheduleStore>,
        extractor: IntentExtractor,
        resolver: Arc<dyn Resolver>,
        applier_config: ApplierConfig,
    ) -> Self {
        let applier = MutationApplier::new(store.clone(), resolver.clone(), applier_config);
        Self {
            store,
            extractor,
            resolver,
            applier,
        }
    }

    pub fn store(&self) -> &Arc<dyn ScheduleStore> {
        &self.store
    }

    pub fn extractor(&self) -> &IntentExtractor {
        &self.extractor
    }

    pub fn resolver(&self) -> &Arc<dyn Resolver> {
        &self.resolver
    }

    /// Interpret `text` as of `current_date` and carry it through to a
    /// terminal outcome.
    ///
    /// Rule conflicts, ambiguity and unrecognized text are outcomes, not
    /// errors. Errors are reserved for timeouts, exhausted retries,
    /// cancellation and store failures; in every error case the store is
    /// unchanged.
    pub async fn process_change_request(&self, text: &str, current_date: NaiveDate) -> Result<ChangeResult> {
        self.process_change_request_with(text, current_date, &RequestContext::default())
            .await
    }

    /// [`process_change_request`](Self::process_change_request) with
    /// cancellation and status reporting.
    pub async fn process_change_request_with(
        &self,
        text: &str,
        current_date: NaiveDate,
        ctx: &RequestContext,
    ) -> Result<ChangeResult> {
        ctx.report(RequestStatus::Received);
        let result = self.interpret_and_settle(text, current_date, ctx).await;
        report_terminal(ctx, &result);
        result
    }

    async fn interpret_and_settle(
        &self,
        text: &str,
        current_date: NaiveDate,
        ctx: &RequestContext,
    ) -> Result<ChangeResult> {
        ctx.ensure_active("interpretation")?;
        let roster = self.store.roster().await?;

        let interpretation = tokio::select! {
            biased;
            _ = ctx.cancelled() => {
                return Err(RotaError::Cancelled {
                    reason: "cancelled during interpretation".to_string(),
                });
            }
            interpretation = self.extractor.interpret(text, &roster, current_date) => interpretation?,
        };

        let intent = match interpretation {
            Interpretation::Intent(intent) => intent,
            Interpretation::Ambiguous(ambiguity) => return Ok(ChangeResult::Ambiguous { ambiguity }),
            Interpretation::Unrecognized { reason } => return Ok(ChangeResult::Unrecognized { reason }),
        };
        ctx.report(RequestStatus::Interpreted);

        self.settle(intent, ResolveMode::AutoResolve, ctx).await
    }

    /// Validate and commit an already structured intent.
    pub async fn process_intent(&self, intent: ScheduleChangeIntent) -> Result<ChangeResult> {
        self.settle(intent, ResolveMode::AutoResolve, &RequestContext::default())
            .await
    }

    async fn settle(
        &self,
        intent: ScheduleChangeIntent,
        mode: ResolveMode,
        ctx: &RequestContext,
    ) -> Result<ChangeResult> {
        ctx.ensure_active("validation")?;
        let proposal = match self.resolver.resolve(&intent, mode).await? {
            Resolution::Committable(proposal) => proposal,
            Resolution::Conflicted(report) => return Ok(ChangeResult::Conflicted { report }),
        };
        ctx.report(RequestStatus::Validated);

        // Last point at which cancellation is honoured.
        ctx.ensure_active("commit")?;

        match self.applier.apply(&intent, proposal, mode).await? {
            ApplyOutcome::Committed {
                edits,
                reassignments,
                commit,
            } => Ok(ChangeResult::Committed {
                intent,
                edits,
                reassignments,
                commit_id: commit.map(|c| c.id),
            }),
            ApplyOutcome::Conflicted(report) => Ok(ChangeResult::Conflicted { report }),
        }
    }

    /// Put `employee` in `role` on `date`. Nobody else is moved to make it fit.
    pub async fn assign(
        &self,
        date: NaiveDate,
        role: Role,
        employee: impl Into<EmployeeNumber>,
    ) -> Result<ChangeResult> {
        let intent = ScheduleChangeIntent::builder()
            .target(employee)
            .on(date)
            .action(ChangeAction::Assign)
            .role(role)
            .build()?;
        self.settle(intent, ResolveMode::Strict, &RequestContext::default())
            .await
    }

    /// Remove every assignment on `date`, one employee per commit, stopping
    /// at the first that does not commit.
    pub async fn clear_date(&self, date: NaiveDate) -> Result<Vec<ChangeResult>> {
        let Some(entry) = self.store.get(date).await? else {
            return Ok(Vec::new());
        };

        let mut employees: Vec<EmployeeNumber> = entry.assignments.values().cloned().collect();
        employees.sort();
        employees.dedup();

        let mut results = Vec::new();
        for employee in employees {
            let intent = ScheduleChangeIntent::builder()
                .target(employee)
                .on(date)
                .action(ChangeAction::Unassign)
                .build()?;
            let result = self
                .settle(intent, ResolveMode::Strict, &RequestContext::default())
                .await?;
            let committed = result.is_committed();
            results.push(result);
            if !committed {
                break;
            }
        }
        Ok(results)
    }
}

fn report_terminal(ctx: &RequestContext, result: &Result<ChangeResult>) {
    let status = match result {
        Ok(result) => result.status(),
        Err(RotaError::Cancelled { .. }) => RequestStatus::Cancelled,
        Err(_) => RequestStatus::Failed,
    };
    ctx.report(status);
}

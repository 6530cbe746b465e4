//! Conflict resolution.
//!
//! The resolver reads a window of the schedule, applies the intent to a
//! detached copy, evaluates the rule set and, for every violation the request
//! is responsible for, tries one reassignment that clears it without causing
//! anything new. The result is either a committable edit set or a
//! [`ConflictReport`]; nothing here writes to the store.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use rota_core::{
    AbsenceEdit, ChangeAction, Conflict, ConflictReport, DateRange, EditSet, EmployeeNumber,
    EntryEdit, ProposedResolution, Reassignment, Result, Role, RotaError, ScheduleChangeIntent,
    ScheduleEntry, VersionGuard, Violation,
};
use rota_rules::{RuleSet, ScheduleSlice};
use rota_state::ScheduleStore;

use crate::config::ResolverConfig;
use crate::hypothetical::{apply_intent, Hypothetical};
use crate::ranking::eligible_substitutes;

/// A validated change ready to be committed.
#[derive(Debug, Clone, PartialEq)]
pub struct Proposal {
    /// Empty when the schedule already reflects the intent.
    pub edits: EditSet,
    pub reassignments: Vec<Reassignment>,
}

/// Verdict on an intent.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Committable(Proposal),
    Conflicted(ConflictReport),
}

/// Whether violations may be repaired by reassigning other slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolveMode {
    #[default]
    AutoResolve,
    /// Report every violation as-is.
    Strict,
}

/// Trait for conflict resolvers.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Validate `intent` against fresh store state.
    async fn resolve(&self, intent: &ScheduleChangeIntent, mode: ResolveMode) -> Result<Resolution>;

    fn config(&self) -> &ResolverConfig;
}

/// Everything the resolver read, detached from the store.
#[derive(Debug, Clone)]
pub struct Baseline {
    /// Schedule and roster as read.
    pub slice: ScheduleSlice,

    /// Version of every entry that existed when read.
    pub versions: BTreeMap<NaiveDate, u64>,

    pub catalog_version: u64,

    pub rules: RuleSet,

    /// Dates the rule set is evaluated over.
    pub scope: DateRange,
}

impl Baseline {
    /// Scope covers every rule window around `edited`; the slice covers
    /// every rule window around the scope, so repairs anywhere in the scope
    /// are judged with full context.
    pub fn new(
        edited: DateRange,
        entries: Vec<ScheduleEntry>,
        roster: Vec<rota_core::Employee>,
        rules: RuleSet,
        catalog_version: u64,
    ) -> Self {
        let scope = rules.window(edited);
        let window = rules.window(scope);
        let versions = entries.iter().map(|e| (e.date, e.version)).collect();
        Self {
            slice: ScheduleSlice::from_entries(window, entries, roster),
            versions,
            catalog_version,
            rules,
            scope,
        }
    }
}

/// Evaluates slices and keeps only what the request is answerable for:
/// violations on its own dates, and violations the baseline did not have.
struct Judge<'a> {
    rules: &'a RuleSet,
    scope: DateRange,
    edited: DateRange,
    baseline: HashSet<Violation>,
}

impl<'a> Judge<'a> {
    fn new(baseline: &'a Baseline, edited: DateRange) -> Self {
        let before = baseline.rules.evaluate(&baseline.slice, baseline.scope);
        Self {
            rules: &baseline.rules,
            scope: baseline.scope,
            edited,
            baseline: before.into_iter().collect(),
        }
    }

    fn attributable(&self, slice: &ScheduleSlice) -> Vec<Violation> {
        self.rules
            .evaluate(slice, self.scope)
            .into_iter()
            .filter(|v| v.dates.iter().any(|d| self.edited.contains(*d)) || !self.baseline.contains(v))
            .collect()
    }
}

struct Repair {
    fix: Option<(ScheduleSlice, Reassignment, Vec<Violation>)>,
    substitutes: Vec<EmployeeNumber>,
}

/// Slots whose occupant could be changed to clear `violation`, with the
/// current occupant.
fn repair_slots(
    slice: &ScheduleSlice,
    violation: &Violation,
    hypothetical: &Hypothetical,
) -> Vec<(NaiveDate, Role, Option<EmployeeNumber>)> {
    let mut slots = Vec::new();
    if violation.employees.is_empty() {
        // A position left empty, e.g. coverage.
        if let Some(role) = &violation.role {
            for date in &violation.dates {
                if slice.assigned(*date, role).is_none() && !hypothetical.is_pinned(*date, role) {
                    slots.push((*date, role.clone(), None));
                }
            }
        }
        return slots;
    }

    for date in &violation.dates {
        for employee in &violation.employees {
            for role in slice.roles_on(employee, *date) {
                if violation.role.as_ref().map_or(true, |r| *r == role) && !hypothetical.is_pinned(*date, &role) {
                    slots.push((*date, role, Some(employee.clone())));
                }
            }
        }
    }
    slots
}

#[allow(clippy::too_many_arguments)]
fn try_repair(
    baseline: &Baseline,
    judge: &Judge<'_>,
    slice: &ScheduleSlice,
    hypothetical: &Hypothetical,
    violation: &Violation,
    current: &[Violation],
    config: &ResolverConfig,
) -> Repair {
    let mut substitutes: Vec<EmployeeNumber> = Vec::new();

    for (date, role, displaced) in repair_slots(slice, violation, hypothetical) {
        let candidates = eligible_substitutes(
            slice,
            &baseline.rules,
            hypothetical,
            date,
            displaced.as_ref(),
            baseline.scope,
            config,
        );
        for candidate in candidates {
            if !substitutes.contains(&candidate) {
                substitutes.push(candidate.clone());
            }

            let mut trial = slice.clone();
            trial.assign(date, role.clone(), candidate.clone());
            let after = judge.attributable(&trial);
            if after.contains(violation) || !after.iter().all(|v| current.contains(v)) {
                continue;
            }

            let from = displaced
                .clone()
                .or_else(|| baseline.slice.assigned(date, &role).cloned());
            let reassignment = Reassignment {
                date,
                role,
                from,
                to: candidate,
                resolves: violation.rule.clone(),
            };
            return Repair {
                fix: Some((trial, reassignment, after)),
                substitutes,
            };
        }
    }

    Repair {
        fix: None,
        substitutes,
    }
}

/// Recorded as the reason for reassignments a substitution asked for.
const SUBSTITUTION: &str = "substitution";

/// Hand every slot a substitution left open to the best-ranked employee
/// whose placement adds no violation of its own.
fn fill_open_slots(
    baseline: &Baseline,
    judge: &Judge<'_>,
    slice: &mut ScheduleSlice,
    hypothetical: &mut Hypothetical,
    config: &ResolverConfig,
) -> (Vec<Reassignment>, Vec<Conflict>) {
    let mut filled = Vec::new();
    let mut unfilled = Vec::new();

    for ((date, role), held_by) in hypothetical.open.clone() {
        let before = judge.attributable(slice);
        let candidates = eligible_substitutes(
            slice,
            &baseline.rules,
            hypothetical,
            date,
            Some(&held_by),
            baseline.scope,
            config,
        );
        let accepted = candidates.iter().find_map(|candidate| {
            let mut trial = slice.clone();
            trial.assign(date, role.clone(), candidate.clone());
            let after = judge.attributable(&trial);
            after
                .iter()
                .all(|v| before.contains(v))
                .then(|| (trial, candidate.clone()))
        });
        hypothetical.pinned.insert((date, role.clone()));

        match accepted {
            Some((trial, to)) => {
                tracing::debug!(%date, %role, from = %held_by, %to, "Substitute picked");
                *slice = trial;
                filled.push(Reassignment {
                    date,
                    role,
                    from: Some(held_by),
                    to,
                    resolves: SUBSTITUTION.to_string(),
                });
            }
            None => {
                let violation = Violation {
                    rule: "substitute available".to_string(),
                    kind: "no_substitute".to_string(),
                    dates: vec![date],
                    employees: vec![held_by.clone()],
                    role: Some(role.clone()),
                    message: format!("nobody can take over {role} from {held_by} on {date}"),
                };
                unfilled.push(Conflict {
                    offending_entries: offending_entries(slice, &violation, &baseline.versions),
                    available_substitutes: candidates,
                    violation,
                });
            }
        }
    }

    (filled, unfilled)
}

fn offending_entries(slice: &ScheduleSlice, violation: &Violation, versions: &BTreeMap<NaiveDate, u64>) -> Vec<ScheduleEntry> {
    slice
        .entries_for(&violation.dates)
        .into_iter()
        .map(|mut entry| {
            entry.version = versions.get(&entry.date).copied().unwrap_or(0);
            entry
        })
        .collect()
}

/// Minimal edit set turning the baseline into `hypothetical`.
fn diff(baseline: &Baseline, hypothetical: &ScheduleSlice) -> EditSet {
    let before = &baseline.slice;
    let mut dates: Vec<NaiveDate> = before.days.keys().chain(hypothetical.days.keys()).copied().collect();
    dates.sort();
    dates.dedup();

    let entries: Vec<EntryEdit> = dates
        .into_iter()
        .filter_map(|date| {
            let was = before.days.get(&date).cloned().unwrap_or_default();
            let now = hypothetical.days.get(&date).cloned().unwrap_or_default();
            (was != now).then(|| EntryEdit {
                date,
                expected_version: baseline.versions.get(&date).copied(),
                before: was,
                after: now,
            })
        })
        .collect();

    let mut absences: Vec<AbsenceEdit> = Vec::new();
    for employee in &hypothetical.roster {
        let known = before
            .employee(&employee.employee_number)
            .map(|e| e.known_absences.clone())
            .unwrap_or_default();
        for date in employee.known_absences.difference(&known) {
            absences.push(AbsenceEdit {
                employee_number: employee.employee_number.clone(),
                date: *date,
            });
        }
    }

    if entries.is_empty() && absences.is_empty() {
        return EditSet::new();
    }

    let guards = before
        .window
        .days()
        .filter(|date| !entries.iter().any(|e| e.date == *date))
        .map(|date| VersionGuard {
            date,
            expected_version: baseline.versions.get(&date).copied(),
        })
        .collect();

    EditSet {
        entries,
        absences,
        guards,
        catalog_version: Some(baseline.catalog_version),
    }
}

/// Validate `intent` against `baseline` without touching any store.
pub fn resolve_against(
    baseline: &Baseline,
    intent: &ScheduleChangeIntent,
    mode: ResolveMode,
    config: &ResolverConfig,
) -> Resolution {
    let judge = Judge::new(baseline, intent.date_range);

    let mut slice = baseline.slice.clone();
    let mut hypothetical = apply_intent(&mut slice, intent);

    let (mut reassignments, mut blocked) = fill_open_slots(baseline, &judge, &mut slice, &mut hypothetical, config);
    blocked.extend(hypothetical.blocked.iter().map(|violation| Conflict {
        offending_entries: offending_entries(&slice, violation, &baseline.versions),
        available_substitutes: Vec::new(),
        violation: violation.clone(),
    }));

    let mut current = judge.attributable(&slice);
    let mut unresolved: Vec<Conflict> = Vec::new();

    for violation in current.clone() {
        if !current.contains(&violation) {
            // Cleared as a side effect of an earlier repair.
            continue;
        }

        let repair = match mode {
            ResolveMode::AutoResolve => try_repair(baseline, &judge, &slice, &hypothetical, &violation, &current, config),
            ResolveMode::Strict => Repair {
                fix: None,
                substitutes: Vec::new(),
            },
        };

        match repair.fix {
            Some((next, reassignment, remaining)) => {
                tracing::debug!(
                    rule = %violation.rule,
                    date = %reassignment.date,
                    to = %reassignment.to,
                    "Reassigned slot to clear violation"
                );
                slice = next;
                current = remaining;
                reassignments.push(reassignment);
            }
            None => unresolved.push(Conflict {
                offending_entries: offending_entries(&slice, &violation, &baseline.versions),
                available_substitutes: repair.substitutes,
                violation,
            }),
        }
    }

    unresolved.retain(|c| current.contains(&c.violation));
    unresolved.splice(0..0, blocked);

    if !unresolved.is_empty() {
        let resolution = if reassignments.is_empty() {
            ProposedResolution::NoValidResolution
        } else {
            ProposedResolution::Partial { reassignments }
        };
        return Resolution::Conflicted(ConflictReport {
            intent: intent.clone(),
            conflicts: unresolved,
            resolution,
        });
    }

    Resolution::Committable(Proposal {
        edits: diff(baseline, &slice),
        reassignments,
    })
}

/// Resolver backed by a [`ScheduleStore`].
pub struct ConflictResolver {
    store: Arc<dyn ScheduleStore>,
    config: ResolverConfig,
}

impl ConflictResolver {
    pub fn new(store: Arc<dyn ScheduleStore>, config: ResolverConfig) -> Self {
        Self { store, config }
    }

    /// Read everything `intent` needs, failing if it names unknown employees.
    pub async fn materialize(&self, intent: &ScheduleChangeIntent) -> Result<Baseline> {
        // Read the catalog version first so a concurrent roster change makes
        // the resulting edit set stale rather than silently mixed.
        let catalog_version = self.store.catalog_version().await;
        let roster = self.store.roster().await?;
        let rules = self.store.rules().await?;

        let mut referenced = vec![&intent.target_employee];
        if let ChangeAction::Substitute {
            replacement: Some(replacement),
        } = &intent.action
        {
            referenced.push(replacement);
        }
        for number in referenced {
            if !roster.iter().any(|e| &e.employee_number == number) {
                return Err(RotaError::ReferentialIntegrity {
                    employee_number: number.clone(),
                    context: "named in the request but not on the roster".to_string(),
                });
            }
        }

        let window = rules.window(rules.window(intent.date_range));
        let entries = self.store.range(window).await?;

        Ok(Baseline::new(intent.date_range, entries, roster, rules, catalog_version))
    }
}

#[async_trait]
impl Resolver for ConflictResolver {
    async fn resolve(&self, intent: &ScheduleChangeIntent, mode: ResolveMode) -> Result<Resolution> {
        intent.validate()?;

        let baseline = self.materialize(intent).await?;
        let resolution = resolve_against(&baseline, intent, mode, &self.config);

        match &resolution {
            Resolution::Committable(proposal) => tracing::info!(
                intent = %intent.summary(),
                changed_dates = ?proposal.edits.dates(),
                reassignments = proposal.reassignments.len(),
                "Intent validated"
            ),
            Resolution::Conflicted(report) => tracing::info!(
                intent = %intent.summary(),
                rules = ?report.rule_names(),
                "Intent conflicts with rules"
            ),
        }

        Ok(resolution)
    }

    fn config(&self) -> &ResolverConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rota_core::{Assignments, Employee};
    use rota_rules::{Days, Rule, RuleKind};

    fn april(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, day).unwrap()
    }

    fn fls() -> Role {
        Role::first_line_support()
    }

    fn coverage() -> Rule {
        Rule::new(
            "first_line_support weekday coverage",
            RuleKind::CoverageMinimum {
                role: fls(),
                days: Days::Weekdays,
            },
        )
    }

    fn baseline(roster: Vec<Employee>, entries: Vec<ScheduleEntry>, rules: Vec<Rule>, edited: DateRange) -> Baseline {
        Baseline::new(edited, entries, roster, RuleSet::new(rules).unwrap(), 7)
    }

    fn intent(action: ChangeAction, target: &str, day: u32) -> ScheduleChangeIntent {
        ScheduleChangeIntent::builder()
            .target(target)
            .on(april(day))
            .action(action)
            .build()
            .unwrap()
    }

    fn committable(resolution: Resolution) -> Proposal {
        match resolution {
            Resolution::Committable(p) => p,
            Resolution::Conflicted(report) => panic!("unexpected conflict: {:?}", report),
        }
    }

    fn conflicted(resolution: Resolution) -> ConflictReport {
        match resolution {
            Resolution::Conflicted(report) => report,
            Resolution::Committable(p) => panic!("unexpected commit: {:?}", p),
        }
    }

    #[test]
    fn test_sole_staffer_time_off_conflicts_with_no_substitutes() {
        let b = baseline(
            vec![Employee::new("EMP001", "John Smith")],
            vec![],
            vec![coverage()],
            DateRange::single(april(1)),
        );
        let i = intent(ChangeAction::TimeOff, "EMP001", 1);

        let report = conflicted(resolve_against(&b, &i, ResolveMode::AutoResolve, &ResolverConfig::default()));

        assert_eq!(report.rule_names(), vec!["first_line_support weekday coverage"]);
        assert!(report.conflicts[0].available_substitutes.is_empty());
        assert_eq!(report.resolution, ProposedResolution::NoValidResolution);
    }

    #[test]
    fn test_time_off_reassigns_to_next_eligible() {
        let b = baseline(
            vec![Employee::new("EMP001", "John Smith"), Employee::new("EMP002", "Jane Doe")],
            vec![ScheduleEntry {
                version: 3,
                ..ScheduleEntry::new(april(1)).with(fls(), "EMP001")
            }],
            vec![coverage()],
            DateRange::single(april(1)),
        );
        let i = intent(ChangeAction::TimeOff, "EMP001", 1);

        let proposal = committable(resolve_against(&b, &i, ResolveMode::AutoResolve, &ResolverConfig::default()));

        assert_eq!(proposal.reassignments.len(), 1);
        let r = &proposal.reassignments[0];
        assert_eq!(r.from.as_ref().map(|e| e.as_str()), Some("EMP001"));
        assert_eq!(r.to.as_str(), "EMP002");

        let edit = &proposal.edits.entries[0];
        assert_eq!(edit.expected_version, Some(3));
        assert_eq!(edit.after.get(&fls()).map(|e| e.as_str()), Some("EMP002"));
        assert_eq!(proposal.edits.absences.len(), 1);
        assert_eq!(proposal.edits.catalog_version, Some(7));
        assert!(proposal.edits.guards.iter().all(|g| g.date != april(1)));
    }

    #[test]
    fn test_strict_mode_never_reassigns() {
        let b = baseline(
            vec![Employee::new("EMP001", "John Smith"), Employee::new("EMP002", "Jane Doe")],
            vec![ScheduleEntry::new(april(1)).with(fls(), "EMP001")],
            vec![coverage()],
            DateRange::single(april(1)),
        );
        let i = intent(ChangeAction::Unassign, "EMP001", 1);

        let report = conflicted(resolve_against(&b, &i, ResolveMode::Strict, &ResolverConfig::default()));
        assert_eq!(report.conflicts.len(), 1);
    }

    #[test]
    fn test_no_op_yields_empty_edit_set() {
        let b = baseline(
            vec![Employee::new("EMP001", "John Smith")],
            vec![ScheduleEntry::new(april(1)).with(fls(), "EMP001")],
            vec![coverage()],
            DateRange::single(april(1)),
        );
        let i = intent(ChangeAction::Assign, "EMP001", 1);

        let proposal = committable(resolve_against(&b, &i, ResolveMode::AutoResolve, &ResolverConfig::default()));
        assert!(proposal.edits.is_empty());
        assert!(proposal.edits.guards.is_empty());
    }

    #[test]
    fn test_pre_existing_violation_elsewhere_is_not_blocking() {
        // Monday is unstaffed already; the request only touches Tuesday.
        let b = baseline(
            vec![Employee::new("EMP001", "John Smith"), Employee::new("EMP002", "Jane Doe")],
            vec![ScheduleEntry::new(april(2)).with(fls(), "EMP001")],
            vec![
                coverage(),
                Rule::new("max days per week", RuleKind::WeeklyLimit { max_days: 3 }),
            ],
            DateRange::single(april(2)),
        );
        let i = intent(
            ChangeAction::Substitute {
                replacement: Some("EMP002".into()),
            },
            "EMP001",
            2,
        );

        let proposal = committable(resolve_against(&b, &i, ResolveMode::AutoResolve, &ResolverConfig::default()));
        assert_eq!(proposal.edits.dates(), vec![april(2)]);
        assert!(proposal.reassignments.is_empty());
    }

    #[test]
    fn test_assign_on_absence_is_pinned_conflict() {
        let b = baseline(
            vec![
                Employee::new("EMP001", "John Smith").with_absences([april(1)]),
                Employee::new("EMP002", "Jane Doe"),
            ],
            vec![],
            vec![Rule::new("respect known absences", RuleKind::RespectAbsences)],
            DateRange::single(april(1)),
        );
        let i = intent(ChangeAction::Assign, "EMP001", 1);

        let report = conflicted(resolve_against(&b, &i, ResolveMode::AutoResolve, &ResolverConfig::default()));
        assert_eq!(report.conflicts[0].violation.kind, "respect_absences");
        assert_eq!(report.conflicts[0].offending_entries[0].date, april(1));
    }

    #[test]
    fn test_assign_over_another_holder_conflicts() {
        let b = baseline(
            vec![Employee::new("EMP001", "John Smith"), Employee::new("EMP002", "Jane Doe")],
            vec![ScheduleEntry::new(april(1)).with(fls(), "EMP001")],
            vec![coverage()],
            DateRange::single(april(1)),
        );
        let i = intent(ChangeAction::Assign, "EMP002", 1);

        for mode in [ResolveMode::AutoResolve, ResolveMode::Strict] {
            let report = conflicted(resolve_against(&b, &i, mode, &ResolverConfig::default()));
            assert_eq!(report.rule_names(), vec!["slot already held"]);
            assert_eq!(report.conflicts[0].violation.employees, vec![EmployeeNumber::new("EMP001")]);
            assert_eq!(report.resolution, ProposedResolution::NoValidResolution);
        }
    }

    #[test]
    fn test_open_substitution_picks_stand_in_on_uncovered_day() {
        // Saturday: no coverage rule applies, yet a stand-in is still required.
        let b = baseline(
            vec![Employee::new("EMP001", "John Smith"), Employee::new("EMP002", "Jane Doe")],
            vec![ScheduleEntry::new(april(6)).with(fls(), "EMP001")],
            vec![coverage()],
            DateRange::single(april(6)),
        );
        let i = intent(ChangeAction::Substitute { replacement: None }, "EMP001", 6);

        let proposal = committable(resolve_against(&b, &i, ResolveMode::Strict, &ResolverConfig::default()));

        assert_eq!(proposal.reassignments.len(), 1);
        let r = &proposal.reassignments[0];
        assert_eq!(r.from.as_ref().map(|e| e.as_str()), Some("EMP001"));
        assert_eq!(r.to.as_str(), "EMP002");
        assert_eq!(r.resolves, "substitution");
        assert_eq!(proposal.edits.entries[0].after.get(&fls()).map(|e| e.as_str()), Some("EMP002"));
    }

    #[test]
    fn test_open_substitution_without_candidates_conflicts() {
        let b = baseline(
            vec![
                Employee::new("EMP001", "John Smith"),
                Employee::new("EMP002", "Jane Doe").with_absences([april(6)]),
            ],
            vec![ScheduleEntry::new(april(6)).with(fls(), "EMP001")],
            vec![coverage()],
            DateRange::single(april(6)),
        );
        let i = intent(ChangeAction::Substitute { replacement: None }, "EMP001", 6);

        let report = conflicted(resolve_against(&b, &i, ResolveMode::AutoResolve, &ResolverConfig::default()));
        assert_eq!(report.rule_names(), vec!["substitute available"]);
        assert_eq!(report.conflicts[0].violation.kind, "no_substitute");
        assert!(report.conflicts[0].available_substitutes.is_empty());
    }

    #[test]
    fn test_weekly_limit_moves_an_unpinned_day() {
        // EMP001 works Mon-Wed; assigning Thursday breaks the 3-day limit.
        let fls_days: Vec<ScheduleEntry> = (1..=3)
            .map(|d| ScheduleEntry::new(april(d)).with(fls(), "EMP001"))
            .collect();
        let b = baseline(
            vec![Employee::new("EMP001", "John Smith"), Employee::new("EMP002", "Jane Doe")],
            fls_days,
            vec![Rule::new("max days per week", RuleKind::WeeklyLimit { max_days: 3 })],
            DateRange::single(april(4)),
        );
        let i = intent(ChangeAction::Assign, "EMP001", 4);

        let proposal = committable(resolve_against(&b, &i, ResolveMode::AutoResolve, &ResolverConfig::default()));

        assert_eq!(proposal.reassignments.len(), 1);
        assert_eq!(proposal.reassignments[0].date, april(1));
        assert_eq!(proposal.reassignments[0].to.as_str(), "EMP002");
        let mut expected = Assignments::new();
        expected.insert(fls(), "EMP001".into());
        assert_eq!(proposal.edits.entries.iter().find(|e| e.date == april(4)).unwrap().after, expected);
    }
}

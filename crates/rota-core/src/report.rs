//! Validation verdicts and terminal request outcomes.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::commit::EditSet;
use crate::intent::{Ambiguity, ScheduleChangeIntent};
use crate::types::{EmployeeNumber, RequestStatus, Role, ScheduleEntry};

/// A rule's verdict that a (hypothetical) schedule breaks a named constraint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Violation {
    /// Name of the rule, as configured.
    pub rule: String,

    /// Rule kind tag, e.g. `coverage_minimum`.
    pub kind: String,

    /// Offending dates, ascending.
    pub dates: Vec<NaiveDate>,

    /// Offending employees, if the violation is about people.
    pub employees: Vec<EmployeeNumber>,

    /// Offending role, if the violation is about a position.
    pub role: Option<Role>,

    /// Human-readable explanation.
    pub message: String,
}

impl Violation {
    pub fn touches_date(&self, date: NaiveDate) -> bool {
        self.dates.contains(&date)
    }

    pub fn involves(&self, employee: &EmployeeNumber) -> bool {
        self.employees.contains(employee)
    }
}

/// A role handed to a different employee by the resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reassignment {
    pub date: NaiveDate,
    pub role: Role,
    pub from: Option<EmployeeNumber>,
    pub to: EmployeeNumber,
    /// Rule whose violation this reassignment cleared, or `substitution`
    /// when the request asked for a stand-in without naming one.
    pub resolves: String,
}

/// One unresolved violation together with the entries it concerns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    pub violation: Violation,

    /// Hypothetical entries on the offending dates.
    pub offending_entries: Vec<ScheduleEntry>,

    /// Employees that were eligible to fill in; empty when nobody was.
    pub available_substitutes: Vec<EmployeeNumber>,
}

/// What the resolver proposes for a conflicted request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProposedResolution {
    /// Nothing the resolver can do makes the request valid.
    NoValidResolution,
    /// Some violations were fixable, but not all; nothing was committed.
    Partial { reassignments: Vec<Reassignment> },
}

/// Result of a failed validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictReport {
    pub intent: ScheduleChangeIntent,
    pub conflicts: Vec<Conflict>,
    pub resolution: ProposedResolution,
}

impl ConflictReport {
    /// Names of every rule that failed, in report order, without duplicates.
    pub fn rule_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for conflict in &self.conflicts {
            if !names.contains(&conflict.violation.rule.as_str()) {
                names.push(conflict.violation.rule.as_str());
            }
        }
        names
    }
}

/// Terminal outcome of `process_change_request`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ChangeResult {
    /// The edit set landed. An empty edit set means the schedule already
    /// satisfied the request and nothing was written.
    Committed {
        intent: ScheduleChangeIntent,
        edits: EditSet,
        reassignments: Vec<Reassignment>,
        commit_id: Option<Uuid>,
    },
    /// Rules failed; the store is unchanged.
    Conflicted { report: ConflictReport },
    /// Several interpretations were plausible.
    Ambiguous { ambiguity: Ambiguity },
    /// No interpretation could be produced.
    Unrecognized { reason: String },
}

impl ChangeResult {
    pub fn is_committed(&self) -> bool {
        matches!(self, ChangeResult::Committed { .. })
    }

    pub fn status(&self) -> RequestStatus {
        match self {
            ChangeResult::Committed { .. } => RequestStatus::Committed,
            ChangeResult::Conflicted { .. } => RequestStatus::Conflicted,
            ChangeResult::Ambiguous { .. } => RequestStatus::Ambiguous,
            ChangeResult::Unrecognized { .. } => RequestStatus::Unrecognized,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::ChangeAction;

    #[test]
    fn test_rule_names_deduplicated() {
        let date = NaiveDate::from_ymd_opt(2024, 4, 1).unwrap();
        let violation = |rule: &str| Violation {
            rule: rule.to_string(),
            kind: "coverage_minimum".to_string(),
            dates: vec![date],
            employees: vec![],
            role: Some(Role::first_line_support()),
            message: "unstaffed".to_string(),
        };
        let intent = ScheduleChangeIntent::builder()
            .target("EMP001")
            .on(date)
            .action(ChangeAction::TimeOff)
            .build()
            .unwrap();
        let conflict = |rule: &str| Conflict {
            violation: violation(rule),
            offending_entries: vec![],
            available_substitutes: vec![],
        };
        let report = ConflictReport {
            intent,
            conflicts: vec![conflict("coverage"), conflict("coverage"), conflict("weekly")],
            resolution: ProposedResolution::NoValidResolution,
        };
        assert_eq!(report.rule_names(), vec!["coverage", "weekly"]);
    }

    #[test]
    fn test_change_result_tagging() {
        let result = ChangeResult::Unrecognized {
            reason: "no employee mentioned".into(),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["outcome"], "unrecognized");
        assert_eq!(result.status(), RequestStatus::Unrecognized);
    }
}

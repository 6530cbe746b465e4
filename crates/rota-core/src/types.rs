//! Common types used across the rota workspace.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::{Result, RotaError};

/// Stable, unique identifier of an employee (e.g. `EMP001`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmployeeNumber(String);

impl EmployeeNumber {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EmployeeNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EmployeeNumber {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for EmployeeNumber {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A position that is staffed per day (e.g. `first_line_support`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(String);

impl Role {
    pub const FIRST_LINE_SUPPORT: &'static str = "first_line_support";

    /// Creates a role, normalizing free text to snake_case
    /// ("First-line support" becomes `first_line_support`).
    pub fn new(value: impl AsRef<str>) -> Self {
        let mut normalized = String::new();
        let mut pending_sep = false;
        for ch in value.as_ref().trim().chars() {
            if ch.is_alphanumeric() {
                if pending_sep && !normalized.is_empty() {
                    normalized.push('_');
                }
                pending_sep = false;
                normalized.extend(ch.to_lowercase());
            } else {
                pending_sep = true;
            }
        }
        Self(normalized)
    }

    pub fn first_line_support() -> Self {
        Self(Self::FIRST_LINE_SUPPORT.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Role → employee mapping for one day.
pub type Assignments = BTreeMap<Role, EmployeeNumber>;

/// A person on the roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Employee {
    /// Unique, stable identifier.
    pub employee_number: EmployeeNumber,

    /// Display name, e.g. "John Smith".
    pub name: String,

    /// Dates on which the employee is known to be unavailable.
    #[serde(default)]
    pub known_absences: BTreeSet<NaiveDate>,

    /// Arbitrary metadata.
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl Employee {
    pub fn new(employee_number: impl Into<EmployeeNumber>, name: impl Into<String>) -> Self {
        Self {
            employee_number: employee_number.into(),
            name: name.into(),
            known_absences: BTreeSet::new(),
            metadata: serde_json::Value::Null,
        }
    }

    pub fn with_absences(mut self, dates: impl IntoIterator<Item = NaiveDate>) -> Self {
        self.known_absences.extend(dates);
        self
    }

    pub fn is_absent_on(&self, date: NaiveDate) -> bool {
        self.known_absences.contains(&date)
    }

    /// Lowercased name tokens, used for matching free-text references.
    pub fn name_tokens(&self) -> Vec<String> {
        self.name
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|t| !t.is_empty())
            .map(|t| t.to_lowercase())
            .collect()
    }

    pub fn validate(&self) -> Result<()> {
        if self.employee_number.as_str().trim().is_empty() {
            return Err(RotaError::InvalidInput(
                "employee_number cannot be empty".to_string(),
            ));
        }
        if self.name.trim().is_empty() {
            return Err(RotaError::InvalidInput(format!(
                "employee {} must have a name",
                self.employee_number
            )));
        }
        Ok(())
    }
}

/// The assignments for one date. At most one entry exists per date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub date: NaiveDate,

    /// Who holds which role on this date.
    pub assignments: Assignments,

    /// Version token of the last write (store-wide monotonically increasing).
    pub version: u64,
}

impl ScheduleEntry {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            assignments: Assignments::new(),
            version: 0,
        }
    }

    pub fn with(mut self, role: Role, employee: impl Into<EmployeeNumber>) -> Self {
        self.assignments.insert(role, employee.into());
        self
    }

    pub fn assigned(&self, role: &Role) -> Option<&EmployeeNumber> {
        self.assignments.get(role)
    }

    /// Roles held by `employee` on this date.
    pub fn roles_of(&self, employee: &EmployeeNumber) -> Vec<Role> {
        self.assignments
            .iter()
            .filter(|(_, e)| *e == employee)
            .map(|(r, _)| r.clone())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }
}

/// Inclusive date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if end < start {
            return Err(RotaError::InvalidInput(format!(
                "date range ends ({end}) before it starts ({start})"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn single(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// Number of days covered, inclusive.
    pub fn len_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// Every date in the range, ascending.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        std::iter::successors(Some(self.start), |d| d.succ_opt()).take_while(move |d| *d <= end)
    }

    /// Grows the range by whole days on each side, saturating at the calendar bounds.
    pub fn expand(&self, before: u32, after: u32) -> Self {
        let mut start = self.start;
        for _ in 0..before {
            match start.pred_opt() {
                Some(d) => start = d,
                None => break,
            }
        }
        let mut end = self.end;
        for _ in 0..after {
            match end.succ_opt() {
                Some(d) => end = d,
                None => break,
            }
        }
        Self { start, end }
    }

    /// Smallest range covering both.
    pub fn hull(&self, other: &DateRange) -> Self {
        Self {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Overlapping part of both ranges, if any.
    pub fn intersect(&self, other: &DateRange) -> Option<Self> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        (start <= end).then_some(Self { start, end })
    }

    /// Extends the range to whole ISO weeks (Monday through Sunday).
    pub fn to_whole_weeks(&self) -> Self {
        let back = self.start.weekday().num_days_from_monday();
        let forward = 6 - self.end.weekday().num_days_from_monday();
        self.expand(back, forward)
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}..={}", self.start, self.end)
        }
    }
}

/// Returns true for Monday through Friday.
pub fn is_weekday(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Status of a change request in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    /// Request text has been received.
    Received,
    /// The extractor produced a single intent.
    Interpreted,
    /// The intent was checked against the rule set.
    Validated,
    /// The edit set landed in the store.
    Committed,
    /// Rules could not be satisfied; a report was produced.
    Conflicted,
    /// Clarification needed; candidates were returned.
    Ambiguous,
    /// The request could not be interpreted.
    Unrecognized,
    /// An error stopped processing.
    Failed,
    /// The request was cancelled before commit.
    Cancelled,
}

impl RequestStatus {
    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RequestStatus::Committed
                | RequestStatus::Conflicted
                | RequestStatus::Ambiguous
                | RequestStatus::Unrecognized
                | RequestStatus::Failed
                | RequestStatus::Cancelled
        )
    }

    /// Returns true if the request can still be cancelled.
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }
}

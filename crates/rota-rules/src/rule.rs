//! Rule representation.
//!
//! Rules are plain data: a name, an enabled flag and a [`RuleKind`] carrying
//! the parameters. They serialize as flat tagged JSON:
//!
//! ```json
//! {"name": "weekday coverage", "kind": "coverage_minimum", "role": "first_line_support", "days": "weekdays"}
//! ```

use std::collections::HashSet;

use chrono::{Datelike, NaiveDate, Weekday};
use rota_core::{DateRange, EmployeeNumber, Result, Role, RotaError, Violation};
use serde::{Deserialize, Serialize};

use crate::evaluate;
use crate::slice::ScheduleSlice;

/// Day of the week, as written in rule configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayName {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

impl From<DayName> for Weekday {
    fn from(day: DayName) -> Self {
        match day {
            DayName::Mon => Weekday::Mon,
            DayName::Tue => Weekday::Tue,
            DayName::Wed => Weekday::Wed,
            DayName::Thu => Weekday::Thu,
            DayName::Fri => Weekday::Fri,
            DayName::Sat => Weekday::Sat,
            DayName::Sun => Weekday::Sun,
        }
    }
}

/// Which days of the week a rule applies to.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Days {
    /// Monday through Friday.
    #[default]
    Weekdays,
    Weekends,
    EveryDay,
    On(Vec<DayName>),
}

impl Days {
    pub fn includes(&self, date: NaiveDate) -> bool {
        let weekday = date.weekday();
        match self {
            Days::Weekdays => !matches!(weekday, Weekday::Sat | Weekday::Sun),
            Days::Weekends => matches!(weekday, Weekday::Sat | Weekday::Sun),
            Days::EveryDay => true,
            Days::On(days) => days.iter().any(|d| Weekday::from(*d) == weekday),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Days::Weekdays => "every weekday".to_string(),
            Days::Weekends => "every weekend day".to_string(),
            Days::EveryDay => "every day".to_string(),
            Days::On(days) => {
                let names: Vec<String> = days.iter().map(|d| format!("{:?}", d)).collect();
                format!("on {}", names.join(", "))
            }
        }
    }
}

/// Condition over a single assignment, used by custom-predicate rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Predicate {
    All { of: Vec<Predicate> },
    Any { of: Vec<Predicate> },
    Not { predicate: Box<Predicate> },
    RoleIs { role: Role },
    EmployeeIs { employee: EmployeeNumber },
    OnDays { days: Days },
    Between { start: NaiveDate, end: NaiveDate },
}

impl Predicate {
    /// Evaluate against one assignment.
    pub fn matches(&self, date: NaiveDate, role: &Role, employee: &EmployeeNumber) -> bool {
        match self {
            Predicate::All { of } => of.iter().all(|p| p.matches(date, role, employee)),
            Predicate::Any { of } => of.iter().any(|p| p.matches(date, role, employee)),
            Predicate::Not { predicate } => !predicate.matches(date, role, employee),
            Predicate::RoleIs { role: wanted } => wanted == role,
            Predicate::EmployeeIs { employee: wanted } => wanted == employee,
            Predicate::OnDays { days } => days.includes(date),
            Predicate::Between { start, end } => *start <= date && date <= *end,
        }
    }
}

/// The fixed set of rule kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleKind {
    /// `role` must be staffed on the selected days.
    CoverageMinimum {
        role: Role,
        #[serde(default)]
        days: Days,
    },

    /// Nobody (or only the listed employees) may work on these dates.
    BlackoutDate {
        dates: Vec<NaiveDate>,
        #[serde(default)]
        employees: Vec<EmployeeNumber>,
    },

    /// No employee works more than `max_days` days in a row
    /// (in `role`, when given).
    ConsecutiveDayLimit {
        max_days: u32,
        #[serde(default)]
        role: Option<Role>,
    },

    /// Nobody holds more than one of `roles` on the same day.
    RoleExclusivity { roles: Vec<Role> },

    /// No employee works more than `max_days` days in one ISO week.
    WeeklyLimit { max_days: u32 },

    /// Nobody is scheduled on one of their known absence dates.
    RespectAbsences,

    /// Every assignment must satisfy `require`.
    CustomPredicate {
        description: String,
        require: Predicate,
    },
}

impl RuleKind {
    /// Tag used in serialized form and in violation reports.
    pub fn tag(&self) -> &'static str {
        match self {
            RuleKind::CoverageMinimum { .. } => "coverage_minimum",
            RuleKind::BlackoutDate { .. } => "blackout_date",
            RuleKind::ConsecutiveDayLimit { .. } => "consecutive_day_limit",
            RuleKind::RoleExclusivity { .. } => "role_exclusivity",
            RuleKind::WeeklyLimit { .. } => "weekly_limit",
            RuleKind::RespectAbsences => "respect_absences",
            RuleKind::CustomPredicate { .. } => "custom_predicate",
        }
    }
}

fn enabled_by_default() -> bool {
    true
}

/// A named, configurable constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub name: String,

    #[serde(default = "enabled_by_default")]
    pub enabled: bool,

    #[serde(flatten)]
    pub kind: RuleKind,
}

impl Rule {
    pub fn new(name: impl Into<String>, kind: RuleKind) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            kind,
        }
    }

    /// Dates this rule must see to judge an edit on `edited`.
    pub fn window(&self, edited: DateRange) -> DateRange {
        match &self.kind {
            RuleKind::ConsecutiveDayLimit { max_days, .. } => edited.expand(*max_days, *max_days),
            RuleKind::WeeklyLimit { .. } => edited.to_whole_weeks(),
            _ => edited,
        }
    }

    /// Evaluate over the part of `edited`'s window that `slice` covers.
    pub fn evaluate(&self, slice: &ScheduleSlice, edited: DateRange) -> Vec<Violation> {
        if !self.enabled {
            return Vec::new();
        }
        match self.window(edited).intersect(&slice.window) {
            Some(scope) => evaluate::dispatch(self, slice, scope),
            None => Vec::new(),
        }
    }

    /// True if this rule forbids `employee` from working at all on `date`.
    pub fn bars(&self, slice: &ScheduleSlice, employee: &EmployeeNumber, date: NaiveDate) -> bool {
        if !self.enabled {
            return false;
        }
        match &self.kind {
            RuleKind::BlackoutDate { dates, employees } => {
                dates.contains(&date) && (employees.is_empty() || employees.contains(employee))
            }
            RuleKind::RespectAbsences => slice.is_absent(employee, date),
            _ => false,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(RotaError::InvalidInput("rule name cannot be empty".into()));
        }
        let invalid = |msg: &str| Err(RotaError::InvalidInput(format!("rule '{}': {}", self.name, msg)));
        match &self.kind {
            RuleKind::CoverageMinimum { role, days } => {
                if role.is_empty() {
                    return invalid("role cannot be empty");
                }
                if matches!(days, Days::On(list) if list.is_empty()) {
                    return invalid("day list cannot be empty");
                }
            }
            RuleKind::BlackoutDate { dates, .. } => {
                if dates.is_empty() {
                    return invalid("at least one blackout date is required");
                }
            }
            RuleKind::ConsecutiveDayLimit { max_days, .. } | RuleKind::WeeklyLimit { max_days } => {
                if *max_days == 0 {
                    return invalid("max_days must be at least 1");
                }
            }
            RuleKind::RoleExclusivity { roles } => {
                if roles.len() < 2 {
                    return invalid("role exclusivity needs at least two roles");
                }
            }
            RuleKind::RespectAbsences => {}
            RuleKind::CustomPredicate { description, .. } => {
                if description.trim().is_empty() {
                    return invalid("custom predicates need a description");
                }
            }
        }
        Ok(())
    }
}

/// Ordered collection of rules. A schedule is valid iff every rule passes;
/// the order only affects reporting.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RuleSet {
    pub rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new(rules: Vec<Rule>) -> Result<Self> {
        let set = Self { rules };
        set.validate()?;
        Ok(set)
    }

    /// Weekday first-line coverage, at most three days a week, and known
    /// absences respected.
    pub fn default_rules() -> Self {
        Self {
            rules: vec![
                Rule::new(
                    "first_line_support weekday coverage",
                    RuleKind::CoverageMinimum {
                        role: Role::first_line_support(),
                        days: Days::Weekdays,
                    },
                ),
                Rule::new("max days per week", RuleKind::WeeklyLimit { max_days: 3 }),
                Rule::new("respect known absences", RuleKind::RespectAbsences),
            ],
        }
    }

    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for rule in &self.rules {
            rule.validate()?;
            if !names.insert(rule.name.as_str()) {
                return Err(RotaError::InvalidInput(format!(
                    "duplicate rule name '{}'",
                    rule.name
                )));
            }
        }
        Ok(())
    }

    pub fn enabled(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter().filter(|r| r.enabled)
    }

    pub fn get(&self, name: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.name == name)
    }

    /// Insert or replace by name, keeping the position of an existing rule.
    pub fn upsert(&mut self, rule: Rule) -> Result<()> {
        rule.validate()?;
        match self.rules.iter_mut().find(|r| r.name == rule.name) {
            Some(existing) => *existing = rule,
            None => self.rules.push(rule),
        }
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Option<Rule> {
        let index = self.rules.iter().position(|r| r.name == name)?;
        Some(self.rules.remove(index))
    }

    /// Union of the windows every enabled rule needs around `edited`.
    pub fn window(&self, edited: DateRange) -> DateRange {
        self.enabled()
            .map(|r| r.window(edited))
            .fold(edited, |acc, w| acc.hull(&w))
    }

    /// Evaluate every enabled rule against `slice`, scoped to what each
    /// rule needs around `edited`. Violations come back in rule order.
    pub fn evaluate(&self, slice: &ScheduleSlice, edited: DateRange) -> Vec<Violation> {
        let violations: Vec<Violation> = self
            .enabled()
            .flat_map(|rule| rule.evaluate(slice, edited))
            .collect();
        tracing::debug!(
            rules = self.rules.len(),
            violations = violations.len(),
            window = %edited,
            "Evaluated rule set"
        );
        violations
    }

    /// True if any enabled rule forbids `employee` from working on `date`.
    pub fn bars(&self, slice: &ScheduleSlice, employee: &EmployeeNumber, date: NaiveDate) -> bool {
        self.enabled().any(|r| r.bars(slice, employee, date))
    }
}

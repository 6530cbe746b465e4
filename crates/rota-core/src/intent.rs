//! Intent types and builder.
//!
//! A [`ScheduleChangeIntent`] is the structured form of a free-text change
//! request. It is transient: it lives for one request and is never stored.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, RotaError};
use crate::types::{DateRange, EmployeeNumber, Role};

/// What the request asks to change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChangeAction {
    /// Give the target employee the role on every date in the range.
    Assign,
    /// Take the target employee off the role (or all roles) on the range.
    Unassign,
    /// The target is unavailable: record the absence and vacate every role they hold.
    TimeOff,
    /// Someone else takes over the target's role(s). Without an explicit
    /// replacement the resolver picks one.
    Substitute { replacement: Option<EmployeeNumber> },
}

impl ChangeAction {
    /// Short label used in logs and reports.
    pub fn label(&self) -> &'static str {
        match self {
            ChangeAction::Assign => "assign",
            ChangeAction::Unassign => "unassign",
            ChangeAction::TimeOff => "time_off",
            ChangeAction::Substitute { .. } => "substitute",
        }
    }

    /// True when the target employee gives up work in the range.
    pub fn releases_target(&self) -> bool {
        !matches!(self, ChangeAction::Assign)
    }
}

/// Structured output of interpretation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleChangeIntent {
    /// Unique identifier for this intent.
    pub id: Uuid,

    /// The employee the request is about.
    pub target_employee: EmployeeNumber,

    /// Dates affected, inclusive.
    pub date_range: DateRange,

    pub action: ChangeAction,

    /// Role the request is scoped to; `None` means every role the target
    /// holds (or the default role for assignments).
    pub role: Option<Role>,

    /// Extractor confidence in `[0.0, 1.0]`.
    pub confidence: f32,

    /// The text the intent was extracted from, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_text: Option<String>,
}

/// Candidate set returned when a request cannot be pinned to one intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ambiguity {
    pub reason: String,
    pub candidates: Vec<ScheduleChangeIntent>,
}

/// Builder for creating intents with a fluent API.
#[derive(Debug, Default)]
pub struct IntentBuilder {
    target_employee: Option<EmployeeNumber>,
    date_range: Option<DateRange>,
    action: Option<ChangeAction>,
    role: Option<Role>,
    confidence: Option<f32>,
    source_text: Option<String>,
}

impl IntentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn target(mut self, employee: impl Into<EmployeeNumber>) -> Self {
        self.target_employee = Some(employee.into());
        self
    }

    pub fn dates(mut self, range: DateRange) -> Self {
        self.date_range = Some(range);
        self
    }

    pub fn on(self, date: chrono::NaiveDate) -> Self {
        self.dates(DateRange::single(date))
    }

    pub fn action(mut self, action: ChangeAction) -> Self {
        self.action = Some(action);
        self
    }

    pub fn role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    pub fn confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn source_text(mut self, text: impl Into<String>) -> Self {
        self.source_text = Some(text.into());
        self
    }

    /// Build the intent.
    pub fn build(self) -> Result<ScheduleChangeIntent> {
        let target_employee = self
            .target_employee
            .ok_or_else(|| RotaError::InvalidInput("intent target employee is required".into()))?;
        let date_range = self
            .date_range
            .ok_or_else(|| RotaError::InvalidInput("intent date range is required".into()))?;
        let action = self
            .action
            .ok_or_else(|| RotaError::InvalidInput("intent action is required".into()))?;

        let intent = ScheduleChangeIntent {
            id: Uuid::new_v4(),
            target_employee,
            date_range,
            action,
            role: self.role,
            confidence: self.confidence.unwrap_or(1.0),
            source_text: self.source_text,
        };
        intent.validate()?;
        Ok(intent)
    }
}

impl ScheduleChangeIntent {
    pub fn builder() -> IntentBuilder {
        IntentBuilder::new()
    }

    /// Validate the intent's internal consistency.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(RotaError::InvalidInput(format!(
                "confidence must be within [0, 1], got {}",
                self.confidence
            )));
        }

        if self.date_range.end < self.date_range.start {
            return Err(RotaError::InvalidInput(format!(
                "date range {} is inverted",
                self.date_range
            )));
        }

        if let Some(role) = &self.role {
            if role.is_empty() {
                return Err(RotaError::InvalidInput("role cannot be empty".into()));
            }
        }

        if let ChangeAction::Substitute {
            replacement: Some(replacement),
        } = &self.action
        {
            if *replacement == self.target_employee {
                return Err(RotaError::InvalidInput(format!(
                    "{} cannot substitute for themselves",
                    replacement
                )));
            }
        }

        Ok(())
    }

    /// One-line description, e.g. `time_off EMP001 2024-04-01`.
    pub fn summary(&self) -> String {
        let mut summary = format!(
            "{} {} {}",
            self.action.label(),
            self.target_employee,
            self.date_range
        );
        if let Some(role) = &self.role {
            summary.push_str(&format!(" ({role})"));
        }
        if let ChangeAction::Substitute {
            replacement: Some(replacement),
        } = &self.action
        {
            summary.push_str(&format!(" -> {replacement}"));
        }
        summary
    }
}

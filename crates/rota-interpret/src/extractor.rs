//! Normalization of model output into a [`ScheduleChangeIntent`].

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use rota_core::{
    Ambiguity, ChangeAction, DateRange, Employee, EmployeeNumber, Result, Role, RotaError,
    ScheduleChangeIntent,
};
use serde::{Deserialize, Serialize};

use crate::dates::DateParser;
use crate::model::{InterpretRequest, LanguageModel, RawIntent};

/// Extractor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// Below this, a lone interpretation is reported as ambiguous.
    pub min_confidence: f32,

    /// Upper bound on the model call.
    pub timeout: Duration,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.5,
            timeout: Duration::from_secs(15),
        }
    }
}

/// Outcome of interpreting one request.
#[derive(Debug, Clone, PartialEq)]
pub enum Interpretation {
    Intent(ScheduleChangeIntent),
    Ambiguous(Ambiguity),
    Unrecognized { reason: String },
}

/// Candidates from one reading of the model output.
struct Reading {
    intents: Vec<ScheduleChangeIntent>,
    /// Why there is more than one.
    reason: Option<String>,
}

/// Turns free text into an intent, never inventing employees and never
/// reading the clock.
pub struct IntentExtractor {
    model: Arc<dyn LanguageModel>,
    dates: DateParser,
    config: ExtractorConfig,
}

impl IntentExtractor {
    pub fn new(model: Arc<dyn LanguageModel>, config: ExtractorConfig) -> Result<Self> {
        Ok(Self {
            model,
            dates: DateParser::new()?,
            config,
        })
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Interpret `text` against `roster` as of `current_date`.
    ///
    /// A model that does not answer within the timeout, or reports its own
    /// timeout, is an error; a model that answers with garbage or fails is
    /// `Unrecognized`.
    pub async fn interpret(
        &self,
        text: &str,
        roster: &[Employee],
        current_date: NaiveDate,
    ) -> Result<Interpretation> {
        if text.trim().is_empty() {
            return Ok(Interpretation::Unrecognized {
                reason: "request is empty".to_string(),
            });
        }

        let request = InterpretRequest {
            text,
            roster,
            current_date,
        };

        let raw = match tokio::time::timeout(self.config.timeout, self.model.interpret(&request)).await {
            Err(_) => {
                tracing::warn!(model = %self.model.name(), "Language model timed out");
                return Err(RotaError::Timeout {
                    duration_ms: self.config.timeout.as_millis() as u64,
                    message: format!("language model '{}' did not answer", self.model.name()),
                });
            }
            Ok(Err(e @ RotaError::Timeout { .. })) => {
                tracing::warn!(model = %self.model.name(), error = %e, "Language model timed out");
                return Err(e);
            }
            Ok(Err(e)) => {
                tracing::warn!(model = %self.model.name(), error = %e, "Language model failed");
                return Ok(Interpretation::Unrecognized {
                    reason: format!("could not interpret request: {}", e),
                });
            }
            Ok(Ok(raw)) => raw,
        };

        let interpretation = self.normalize(&raw, text, roster, current_date);
        match &interpretation {
            Interpretation::Intent(intent) => {
                tracing::info!(intent = %intent.summary(), confidence = intent.confidence, "Interpreted request")
            }
            Interpretation::Ambiguous(ambiguity) => tracing::info!(
                reason = %ambiguity.reason,
                candidates = ambiguity.candidates.len(),
                "Request is ambiguous"
            ),
            Interpretation::Unrecognized { reason } => {
                tracing::info!(reason = %reason, "Request not recognized")
            }
        }
        Ok(interpretation)
    }

    /// Resolve raw model output against the roster and the current date.
    pub fn normalize(
        &self,
        raw: &RawIntent,
        text: &str,
        roster: &[Employee],
        current_date: NaiveDate,
    ) -> Interpretation {
        let primary = self.read(raw, text, roster, current_date);
        let alternatives: Vec<Reading> = raw
            .alternatives
            .iter()
            .filter_map(|alt| self.read(alt, text, roster, current_date).ok())
            .collect();

        let (mut intents, mut reason) = match primary {
            Ok(reading) => (reading.intents, reading.reason),
            Err(reason) if alternatives.is_empty() => return Interpretation::Unrecognized { reason },
            Err(_) => (Vec::new(), None),
        };
        for alt in alternatives {
            for intent in alt.intents {
                if !intents.iter().any(|known| same_reading(known, &intent)) {
                    intents.push(intent);
                }
            }
        }

        match intents.len() {
            0 => Interpretation::Unrecognized {
                reason: "no usable interpretation".to_string(),
            },
            1 => {
                let intent = intents.remove(0);
                if intent.confidence < self.config.min_confidence {
                    Interpretation::Ambiguous(Ambiguity {
                        reason: format!("low confidence ({:.2})", intent.confidence),
                        candidates: vec![intent],
                    })
                } else {
                    Interpretation::Intent(intent)
                }
            }
            _ => Interpretation::Ambiguous(Ambiguity {
                reason: reason
                    .take()
                    .unwrap_or_else(|| "several plausible interpretations".to_string()),
                candidates: intents,
            }),
        }
    }

    fn read(
        &self,
        raw: &RawIntent,
        text: &str,
        roster: &[Employee],
        current_date: NaiveDate,
    ) -> std::result::Result<Reading, String> {
        let label = raw.action.as_deref().ok_or("no recognizable action")?;
        let kind = parse_action(label).ok_or_else(|| format!("unknown action '{}'", label))?;

        let reference = raw
            .employees
            .iter()
            .find(|r| !r.trim().is_empty())
            .ok_or("request does not name an employee")?;
        let targets = match_employees(reference, roster);
        if targets.is_empty() {
            return Err(format!("'{}' does not match anyone on the roster", reference));
        }

        let mut reasons = Vec::new();
        if targets.len() > 1 {
            reasons.push(format!("'{}' matches {} employees", reference, targets.len()));
        }

        let actions: Vec<ChangeAction> = match (kind, raw.replacement.as_deref()) {
            (ActionKind::Substitute, Some(r)) if !r.trim().is_empty() => {
                let replacements = match_employees(r, roster);
                if replacements.is_empty() {
                    return Err(format!("'{}' does not match anyone on the roster", r));
                }
                if replacements.len() > 1 {
                    reasons.push(format!("'{}' matches {} employees", r, replacements.len()));
                }
                replacements
                    .into_iter()
                    .map(|e| ChangeAction::Substitute {
                        replacement: Some(e.employee_number.clone()),
                    })
                    .collect()
            }
            (kind, _) => vec![kind.into_action()],
        };

        let ranges = self.date_ranges(raw, current_date)?;
        if ranges.len() > 1 {
            reasons.push("request names dates that are not contiguous".to_string());
        }

        let role = raw
            .role
            .as_deref()
            .filter(|r| !r.trim().is_empty())
            .map(Role::new);
        let confidence = match raw.confidence {
            Some(c) if c.is_nan() => 0.0,
            Some(c) => c.clamp(0.0, 1.0),
            None => 1.0,
        };

        let mut intents = Vec::new();
        let mut last_error = None;
        for target in &targets {
            for action in &actions {
                for range in &ranges {
                    let mut builder = ScheduleChangeIntent::builder()
                        .target(target.employee_number.clone())
                        .dates(*range)
                        .action(action.clone())
                        .confidence(confidence)
                        .source_text(text);
                    if let Some(role) = &role {
                        builder = builder.role(role.clone());
                    }
                    match builder.build() {
                        Ok(intent) => intents.push(intent),
                        Err(e) => last_error = Some(e.to_string()),
                    }
                }
            }
        }

        if intents.is_empty() {
            return Err(last_error.unwrap_or_else(|| "no usable interpretation".to_string()));
        }
        Ok(Reading {
            intents,
            reason: (!reasons.is_empty()).then(|| reasons.join("; ")),
        })
    }

    fn date_ranges(&self, raw: &RawIntent, today: NaiveDate) -> std::result::Result<Vec<DateRange>, String> {
        let parse = |phrase: &str| {
            self.dates
                .parse(phrase, today)
                .ok_or_else(|| format!("could not understand date '{}'", phrase))
        };

        if let Some(start) = raw.start.as_deref() {
            let start = parse(start)?;
            let end = match raw.end.as_deref() {
                Some(end) => parse(end)?,
                None => start,
            };
            return DateRange::new(start, end)
                .map(|r| vec![r])
                .map_err(|e| e.to_string());
        }

        let mut dates = raw
            .dates
            .iter()
            .map(|d| parse(d))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        if dates.is_empty() {
            return Err("request does not name a date".to_string());
        }
        dates.sort();
        dates.dedup();

        let first = dates[0];
        let last = dates[dates.len() - 1];
        if (last - first).num_days() as usize + 1 == dates.len() {
            return DateRange::new(first, last)
                .map(|r| vec![r])
                .map_err(|e| e.to_string());
        }
        Ok(dates.into_iter().map(DateRange::single).collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ActionKind {
    Assign,
    Unassign,
    TimeOff,
    Substitute,
}

impl ActionKind {
    fn into_action(self) -> ChangeAction {
        match self {
            ActionKind::Assign => ChangeAction::Assign,
            ActionKind::Unassign => ChangeAction::Unassign,
            ActionKind::TimeOff => ChangeAction::TimeOff,
            ActionKind::Substitute => ChangeAction::Substitute { replacement: None },
        }
    }
}

fn parse_action(label: &str) -> Option<ActionKind> {
    let normalized = label.trim().to_lowercase().replace(['-', ' '], "_");
    match normalized.as_str() {
        "assign" | "schedule" | "add" => Some(ActionKind::Assign),
        "unassign" | "remove" => Some(ActionKind::Unassign),
        "time_off" | "timeoff" | "day_off" | "leave" | "vacation" | "absence" | "sick" => {
            Some(ActionKind::TimeOff)
        }
        "substitute" | "swap" | "cover" | "replace" => Some(ActionKind::Substitute),
        _ => None,
    }
}

fn same_reading(a: &ScheduleChangeIntent, b: &ScheduleChangeIntent) -> bool {
    a.target_employee == b.target_employee
        && a.date_range == b.date_range
        && a.action == b.action
        && a.role == b.role
}

/// Roster entries a free-text reference could mean, in roster order.
///
/// An employee number or a full name is decisive; otherwise every employee
/// whose name contains all of the reference's words matches.
pub fn match_employees<'a>(reference: &str, roster: &'a [Employee]) -> Vec<&'a Employee> {
    let lowered = reference.trim().to_lowercase();
    let cleaned = lowered
        .strip_suffix("'s")
        .or_else(|| lowered.strip_suffix("’s"))
        .unwrap_or(&lowered)
        .trim();
    if cleaned.is_empty() {
        return Vec::new();
    }

    let by_number: Vec<&Employee> = roster
        .iter()
        .filter(|e| e.employee_number.as_str().to_lowercase() == cleaned)
        .collect();
    if !by_number.is_empty() {
        return by_number;
    }

    let by_name: Vec<&Employee> = roster
        .iter()
        .filter(|e| e.name.trim().to_lowercase() == cleaned)
        .collect();
    if !by_name.is_empty() {
        return by_name;
    }

    let wanted: Vec<&str> = cleaned.split_whitespace().collect();
    roster
        .iter()
        .filter(|e| {
            let tokens = e.name_tokens();
            wanted.iter().all(|w| tokens.iter().any(|t| t == w))
        })
        .collect()
}

/// Number of the single employee `reference` denotes, if exactly one.
pub fn resolve_employee(reference: &str, roster: &[Employee]) -> Option<EmployeeNumber> {
    match match_employees(reference, roster).as_slice() {
        [only] => Some(only.employee_number.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyword::KeywordModel;
    use async_trait::async_trait;

    struct Scripted(RawIntent);

    #[async_trait]
    impl LanguageModel for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn interpret(&self, _request: &InterpretRequest<'_>) -> Result<RawIntent> {
            Ok(self.0.clone())
        }
    }

    struct Failing;

    #[async_trait]
    impl LanguageModel for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        async fn interpret(&self, _request: &InterpretRequest<'_>) -> Result<RawIntent> {
            Err(RotaError::ModelError {
                message: "boom".into(),
                transient: false,
            })
        }
    }

    /// Gives up on its own before the extractor's deadline.
    struct SelfTimingOut;

    #[async_trait]
    impl LanguageModel for SelfTimingOut {
        fn name(&self) -> &str {
            "self-timing-out"
        }

        async fn interpret(&self, _request: &InterpretRequest<'_>) -> Result<RawIntent> {
            Err(RotaError::Timeout {
                duration_ms: 10,
                message: "upstream did not answer".into(),
            })
        }
    }

    struct Stalled;

    #[async_trait]
    impl LanguageModel for Stalled {
        fn name(&self) -> &str {
            "stalled"
        }

        async fn interpret(&self, _request: &InterpretRequest<'_>) -> Result<RawIntent> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(RawIntent::default())
        }
    }

    fn march_first() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    fn april(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, day).unwrap()
    }

    fn roster() -> Vec<Employee> {
        vec![
            Employee::new("EMP001", "John Smith"),
            Employee::new("EMP002", "Jane Doe"),
            Employee::new("EMP003", "John Doe"),
        ]
    }

    fn keyword_extractor() -> IntentExtractor {
        IntentExtractor::new(Arc::new(KeywordModel::new().unwrap()), ExtractorConfig::default()).unwrap()
    }

    fn scripted(raw: RawIntent) -> IntentExtractor {
        IntentExtractor::new(Arc::new(Scripted(raw)), ExtractorConfig::default()).unwrap()
    }

    #[test]
    fn test_match_employees() {
        let roster = roster();
        assert_eq!(match_employees("john", &roster).len(), 2);
        assert_eq!(match_employees("John Smith", &roster).len(), 1);
        assert_eq!(match_employees("emp002", &roster)[0].name, "Jane Doe");
        assert_eq!(match_employees("Jane's", &roster).len(), 1);
        assert!(match_employees("Bob", &roster).is_empty());
        assert_eq!(resolve_employee("smith", &roster), Some("EMP001".into()));
        assert_eq!(resolve_employee("doe", &roster), None);
    }

    #[tokio::test]
    async fn test_full_name_resolves_to_intent() {
        let result = keyword_extractor()
            .interpret("John Smith needs time off on April 1st", &roster(), march_first())
            .await
            .unwrap();

        match result {
            Interpretation::Intent(intent) => {
                assert_eq!(intent.target_employee.as_str(), "EMP001");
                assert_eq!(intent.date_range, DateRange::single(april(1)));
                assert_eq!(intent.action, ChangeAction::TimeOff);
            }
            other => panic!("expected intent, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_shared_first_name_is_ambiguous() {
        let result = keyword_extractor()
            .interpret("John needs time off on April 1st", &roster(), march_first())
            .await
            .unwrap();

        match result {
            Interpretation::Ambiguous(ambiguity) => {
                let targets: Vec<&str> = ambiguity
                    .candidates
                    .iter()
                    .map(|c| c.target_employee.as_str())
                    .collect();
                assert_eq!(targets, vec!["EMP001", "EMP003"]);
            }
            other => panic!("expected ambiguity, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_employee_is_unrecognized() {
        let result = keyword_extractor()
            .interpret("Bob needs time off tomorrow", &roster(), march_first())
            .await
            .unwrap();
        assert!(matches!(result, Interpretation::Unrecognized { .. }));
    }

    #[tokio::test]
    async fn test_low_confidence_is_ambiguous() {
        let extractor = scripted(RawIntent {
            action: Some("assign".into()),
            employees: vec!["Jane".into()],
            dates: vec!["2024-04-02".into()],
            confidence: Some(0.2),
            ..Default::default()
        });

        let result = extractor.interpret("maybe Jane?", &roster(), march_first()).await.unwrap();
        match result {
            Interpretation::Ambiguous(ambiguity) => {
                assert_eq!(ambiguity.candidates.len(), 1);
                assert!(ambiguity.reason.contains("low confidence"));
            }
            other => panic!("expected ambiguity, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_alternatives_become_candidates() {
        let extractor = scripted(RawIntent {
            action: Some("time_off".into()),
            employees: vec!["Jane Doe".into()],
            dates: vec!["next Monday".into()],
            alternatives: vec![RawIntent {
                action: Some("unassign".into()),
                employees: vec!["Jane Doe".into()],
                dates: vec!["next Monday".into()],
                ..Default::default()
            }],
            ..Default::default()
        });

        let result = extractor.interpret("Jane off Monday", &roster(), march_first()).await.unwrap();
        match result {
            Interpretation::Ambiguous(ambiguity) => assert_eq!(ambiguity.candidates.len(), 2),
            other => panic!("expected ambiguity, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_substitute_with_named_replacement() {
        let result = keyword_extractor()
            .interpret("Jane Doe will cover for John Smith on 2024-04-03", &roster(), march_first())
            .await
            .unwrap();
        match result {
            Interpretation::Intent(intent) => {
                assert_eq!(intent.target_employee.as_str(), "EMP001");
                assert_eq!(
                    intent.action,
                    ChangeAction::Substitute {
                        replacement: Some("EMP002".into())
                    }
                );
            }
            other => panic!("expected intent, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_non_contiguous_dates_are_ambiguous() {
        let extractor = scripted(RawIntent {
            action: Some("time_off".into()),
            employees: vec!["EMP002".into()],
            dates: vec!["April 1".into(), "April 3".into()],
            ..Default::default()
        });
        let result = extractor.interpret("...", &roster(), march_first()).await.unwrap();
        assert!(matches!(result, Interpretation::Ambiguous(a) if a.candidates.len() == 2));
    }

    #[tokio::test]
    async fn test_model_failure_is_unrecognized() {
        let extractor = IntentExtractor::new(Arc::new(Failing), ExtractorConfig::default()).unwrap();
        let result = extractor.interpret("anything", &roster(), march_first()).await.unwrap();
        assert!(matches!(result, Interpretation::Unrecognized { .. }));
    }

    #[tokio::test]
    async fn test_stalled_model_times_out() {
        let config = ExtractorConfig {
            timeout: Duration::from_millis(50),
            ..Default::default()
        };
        let extractor = IntentExtractor::new(Arc::new(Stalled), config).unwrap();
        let err = extractor.interpret("anything", &roster(), march_first()).await.unwrap_err();
        assert!(matches!(err, RotaError::Timeout { duration_ms: 50, .. }));
    }

    #[tokio::test]
    async fn test_model_reported_timeout_is_not_unrecognized() {
        let extractor = IntentExtractor::new(Arc::new(SelfTimingOut), ExtractorConfig::default()).unwrap();
        let err = extractor.interpret("anything", &roster(), march_first()).await.unwrap_err();
        assert!(matches!(err, RotaError::Timeout { .. }));
        assert!(err.is_retryable());
    }
}

//! Deterministic, offline language model.
//!
//! Recognizes requests by keyword and mentions by roster names. Used when no
//! model endpoint is configured, and as a predictable model in tests.

use async_trait::async_trait;
use regex::Regex;
use rota_core::{Result, RotaError};

use crate::dates::DateParser;
use crate::model::{InterpretRequest, LanguageModel, RawIntent};

const SUBSTITUTE: &str = r"(?i)\b(?:cover(?:s|ing)?\s+for|fill(?:s|ing)?\s+in\s+for|instead\s+of|in\s+place\s+of|replac(?:e|es|ing)|swap(?:s|ping)?|substitut(?:e|es|ing)(?:\s+for)?|takes?\s+over\s+(?:for|from))\b";
const UNASSIGN: &str = r"(?i)\b(?:remove|unassign|off\s+the\s+(?:schedule|rota|shift)|drop)\b";
const TIME_OFF: &str = r"(?i)\b(?:time\s+off|days?\s+off|off\s+(?:on|from)|vacation|holiday|sick|leave|absent|unavailable|out\s+of\s+office|away|pto)\b";
const ASSIGN: &str = r"(?i)\b(?:assign|schedule|put|book|staff|work(?:s|ing)?\s+(?:on|as)|cover(?:s|ing)?|add)\b";
const TIERED_ROLE: &str = r"(?i)\b(first|second|third)[\s_-]+line(?:[\s_-]+support)?\b";
const ON_CALL: &str = r"(?i)\bon[\s_-]+call\b";

/// A roster reference found in the text.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Mention {
    start: usize,
    end: usize,
    text: String,
}

/// Keyword-driven [`LanguageModel`].
#[derive(Debug, Clone)]
pub struct KeywordModel {
    dates: DateParser,
    substitute: Regex,
    unassign: Regex,
    time_off: Regex,
    assign: Regex,
    tiered_role: Regex,
    on_call: Regex,
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| RotaError::Internal(format!("invalid keyword pattern: {}", e)))
}

impl KeywordModel {
    pub fn new() -> Result<Self> {
        Ok(Self {
            dates: DateParser::new()?,
            substitute: compile(SUBSTITUTE)?,
            unassign: compile(UNASSIGN)?,
            time_off: compile(TIME_OFF)?,
            assign: compile(ASSIGN)?,
            tiered_role: compile(TIERED_ROLE)?,
            on_call: compile(ON_CALL)?,
        })
    }

    /// Roster references in order of appearance, longest form first.
    fn mentions(&self, request: &InterpretRequest<'_>) -> Result<Vec<Mention>> {
        let lower = request.text.to_lowercase();
        let mut found: Vec<Mention> = Vec::new();

        let overlaps = |found: &[Mention], start: usize, end: usize| {
            found.iter().any(|m| start < m.end && m.start < end)
        };

        let mut full_forms: Vec<String> = Vec::new();
        for employee in request.roster {
            full_forms.push(employee.name.to_lowercase());
            full_forms.push(employee.employee_number.as_str().to_lowercase());
        }
        let mut tokens: Vec<String> = request
            .roster
            .iter()
            .flat_map(|e| e.name_tokens())
            .filter(|t| t.chars().count() >= 2)
            .collect();
        tokens.sort();
        tokens.dedup();

        for form in full_forms.iter().chain(tokens.iter()) {
            if form.trim().is_empty() {
                continue;
            }
            let pattern = compile(&format!(r"\b{}\b", regex::escape(form)))?;
            for m in pattern.find_iter(&lower) {
                if !overlaps(&found, m.start(), m.end()) {
                    found.push(Mention {
                        start: m.start(),
                        end: m.end(),
                        text: m.as_str().to_string(),
                    });
                }
            }
        }

        found.sort_by_key(|m| m.start);
        Ok(found)
    }

    fn role(&self, text: &str) -> Option<String> {
        if let Some(caps) = self.tiered_role.captures(text) {
            return Some(format!("{}_line_support", caps[1].to_lowercase()));
        }
        self.on_call.is_match(text).then(|| "on_call".to_string())
    }

    /// Fill `dates` or `start`/`end` from the phrases in `text`.
    fn fill_dates(&self, text: &str, raw: &mut RawIntent) {
        let found = self.dates.find(text);
        if let [first, second] = found.as_slice() {
            let between = text[first.end..second.start].trim().to_lowercase();
            let before = text[..first.start].trim_end().to_lowercase();
            let is_range = matches!(between.as_str(), "to" | "through" | "thru" | "until" | "till" | "-" | "–")
                || (between == "and" && before.ends_with("between"));
            if is_range {
                raw.start = Some(first.text.clone());
                raw.end = Some(second.text.clone());
                return;
            }
        }
        raw.dates = found.into_iter().map(|m| m.text).collect();
    }
}

#[async_trait]
impl LanguageModel for KeywordModel {
    fn name(&self) -> &str {
        "keyword"
    }

    async fn interpret(&self, request: &InterpretRequest<'_>) -> Result<RawIntent> {
        let text = request.text;
        let mentions = self.mentions(request)?;
        let mut raw = RawIntent::default();

        let substitute = self.substitute.find(text);
        let categories = [
            ("substitute", substitute.is_some()),
            ("unassign", self.unassign.is_match(text)),
            ("time_off", self.time_off.is_match(text)),
            ("assign", self.assign.is_match(text)),
        ];
        let matched: Vec<&str> = categories.iter().filter(|(_, hit)| *hit).map(|(name, _)| *name).collect();
        raw.action = matched.first().map(|a| a.to_string());
        raw.confidence = Some(match matched.len() {
            0 => 0.0,
            1 => 0.9,
            _ => 0.7,
        });

        match (raw.action.as_deref(), substitute) {
            (Some("substitute"), Some(keyword)) => {
                let target = mentions
                    .iter()
                    .find(|m| m.start >= keyword.end())
                    .or_else(|| mentions.first());
                if let Some(target) = target {
                    raw.employees.push(target.text.clone());
                    raw.replacement = mentions
                        .iter()
                        .find(|m| m.text != target.text)
                        .map(|m| m.text.clone());
                }
            }
            _ => {
                if let Some(first) = mentions.first() {
                    raw.employees.push(first.text.clone());
                }
            }
        }

        raw.role = self.role(text);
        self.fill_dates(text, &mut raw);

        tracing::debug!(
            action = ?raw.action,
            employees = ?raw.employees,
            dates = ?raw.dates,
            "Keyword model interpreted request"
        );

        Ok(raw)
    }
}

//! The language-model capability boundary.
//!
//! Whatever produces a [`RawIntent`] is untrusted: employee references are
//! free text, dates are unparsed phrases, and the action is a loose label.
//! [`crate::IntentExtractor`] normalizes all of it against the roster.

use async_trait::async_trait;
use chrono::NaiveDate;
use rota_core::{Employee, Result};
use serde::{Deserialize, Serialize};

/// Everything a model may look at.
#[derive(Debug, Clone, Serialize)]
pub struct InterpretRequest<'a> {
    pub text: &'a str,
    pub roster: &'a [Employee],
    pub current_date: NaiveDate,
}

/// Unnormalized model output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawIntent {
    /// Loose action label, e.g. "time off", "assign", "cover".
    #[serde(default)]
    pub action: Option<String>,

    /// How the request refers to the affected employee(s), e.g. "John".
    #[serde(default)]
    pub employees: Vec<String>,

    /// How the request refers to a named replacement, if any.
    #[serde(default)]
    pub replacement: Option<String>,

    /// Individual date phrases.
    #[serde(default)]
    pub dates: Vec<String>,

    /// Range start phrase.
    #[serde(default)]
    pub start: Option<String>,

    /// Range end phrase.
    #[serde(default)]
    pub end: Option<String>,

    #[serde(default)]
    pub role: Option<String>,

    /// Self-reported confidence in [0, 1].
    #[serde(default)]
    pub confidence: Option<f32>,

    /// Other readings the model considered plausible.
    #[serde(default)]
    pub alternatives: Vec<RawIntent>,
}

/// A capability that turns free text into a [`RawIntent`].
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    async fn interpret(&self, request: &InterpretRequest<'_>) -> Result<RawIntent>;
}

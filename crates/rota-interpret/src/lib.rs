//! # Rota Interpret
//!
//! Turns a free-form change request into a [`rota_core::ScheduleChangeIntent`].
//!
//! The language model is a pluggable capability behind [`LanguageModel`]:
//! - [`HttpLanguageModel`] - any OpenAI-compatible chat completions endpoint
//! - [`KeywordModel`] - deterministic keyword matching, no network
//!
//! [`IntentExtractor`] treats model output as untrusted and resolves it
//! against the roster and an explicit current date.

pub mod dates;
pub mod extractor;
pub mod http;
pub mod keyword;
pub mod model;

pub use dates::{DateMatch, DateParser};
pub use extractor::{match_employees, resolve_employee, ExtractorConfig, IntentExtractor, Interpretation};
pub use http::HttpLanguageModel;
pub use keyword::KeywordModel;
pub use model::{InterpretRequest, LanguageModel, RawIntent};

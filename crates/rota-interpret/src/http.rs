//! Language model over an OpenAI-compatible chat completions API.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use rota_core::{Result, RotaError};
use serde::{Deserialize, Serialize};

use crate::model::{InterpretRequest, LanguageModel, RawIntent};

/// Instructions sent with every request.
pub const SYSTEM_PROMPT: &str = "You turn staffing calendar change requests into JSON. \
Reply with a single JSON object and nothing else, with these fields: \
\"action\" (one of \"assign\", \"unassign\", \"time_off\", \"substitute\"), \
\"employees\" (the words the request uses for the affected employee, exactly as written), \
\"replacement\" (the words used for a named replacement, or null), \
\"dates\" (date phrases exactly as written) or \"start\"/\"end\" for ranges, \
\"role\" (or null), \"confidence\" (0 to 1), and \"alternatives\" \
(other plausible readings in the same shape, or []). \
Never invent employees or resolve dates yourself.";

/// Chat completions client.
#[derive(Clone)]
pub struct HttpLanguageModel {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
    timeout: Duration,
}

impl fmt::Debug for HttpLanguageModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpLanguageModel")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

impl HttpLanguageModel {
    /// `base_url` is the server root, with or without a trailing `/v1`.
    pub fn new(base_url: &str, model: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RotaError::Internal(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
            model: model.into(),
            temperature: 0.0,
            timeout,
        })
    }

    fn transport_error(&self, e: reqwest::Error) -> RotaError {
        if e.is_timeout() {
            return RotaError::Timeout {
                duration_ms: self.timeout.as_millis() as u64,
                message: format!("language model '{}' did not answer", self.model),
            };
        }
        RotaError::ModelError {
            message: format!("request to language model failed: {}", e),
            transient: e.is_connect(),
        }
    }

    fn completions_url(&self) -> String {
        if self.base_url.ends_with("/v1") {
            format!("{}/chat/completions", self.base_url)
        } else {
            format!("{}/v1/chat/completions", self.base_url)
        }
    }

    fn user_prompt(request: &InterpretRequest<'_>) -> String {
        let roster: Vec<String> = request
            .roster
            .iter()
            .map(|e| format!("- {}: {}", e.employee_number, e.name))
            .collect();
        format!(
            "Current date: {} ({})\nRoster:\n{}\nRequest: {}",
            request.current_date,
            request.current_date.format("%A"),
            roster.join("\n"),
            request.text
        )
    }
}

/// The JSON object inside a reply, tolerating code fences and chatter.
fn extract_json(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    (end > start).then(|| &content[start..=end])
}

#[async_trait]
impl LanguageModel for HttpLanguageModel {
    fn name(&self) -> &str {
        &self.model
    }

    async fn interpret(&self, request: &InterpretRequest<'_>) -> Result<RawIntent> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: Self::user_prompt(request),
                },
            ],
            temperature: self.temperature,
            response_format: ResponseFormat { kind: "json_object" },
        };

        let mut call = self.client.post(self.completions_url()).json(&body);
        if let Some(key) = &self.api_key {
            call = call.bearer_auth(key);
        }

        let response = call.send().await.map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RotaError::ModelError {
                message: format!("language model returned {}: {}", status, body),
                transient: status.is_server_error() || status.as_u16() == 429,
            });
        }

        let chat: ChatResponse = response.json().await.map_err(|e| RotaError::ModelError {
            message: format!("unreadable language model response: {}", e),
            transient: false,
        })?;

        let content = chat
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| RotaError::ModelError {
                message: "language model returned no choices".to_string(),
                transient: false,
            })?;

        tracing::debug!(model = %self.model, reply_len = content.len(), "Language model replied");

        let json = extract_json(content).ok_or_else(|| RotaError::ModelError {
            message: "language model reply contained no JSON object".to_string(),
            transient: false,
        })?;
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rota_core::Employee;

    fn model(base: &str) -> HttpLanguageModel {
        HttpLanguageModel::new(base, "gpt-4o-mini", Some("sk-secret".into()), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_completions_url() {
        assert_eq!(model("http://localhost:8000/").completions_url(), "http://localhost:8000/v1/chat/completions");
        assert_eq!(model("https://api.example.com/v1").completions_url(), "https://api.example.com/v1/chat/completions");
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let rendered = format!("{:?}", model("http://localhost:8000"));
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_user_prompt_lists_roster_and_date() {
        let roster = vec![Employee::new("EMP001", "John Smith")];
        let request = InterpretRequest {
            text: "John needs Friday off",
            roster: &roster,
            current_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        };
        let prompt = HttpLanguageModel::user_prompt(&request);
        assert!(prompt.contains("2024-03-01 (Friday)"));
        assert!(prompt.contains("- EMP001: John Smith"));
        assert!(prompt.ends_with("John needs Friday off"));
    }

    #[tokio::test]
    async fn test_silent_server_is_a_timeout() {
        // Accepts the connection and never writes a byte.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let model = HttpLanguageModel::new(&format!("http://{}", addr), "gpt-4o-mini", None, Duration::from_millis(50)).unwrap();
        let roster = vec![Employee::new("EMP001", "John Smith")];
        let request = InterpretRequest {
            text: "John needs Friday off",
            roster: &roster,
            current_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        };

        let err = model.interpret(&request).await.unwrap_err();
        assert!(matches!(err, RotaError::Timeout { duration_ms: 50, .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_extract_json_from_fenced_reply() {
        let reply = "```json\n{\"action\": \"assign\"}\n```";
        assert_eq!(extract_json(reply), Some("{\"action\": \"assign\"}"));
        assert_eq!(extract_json("no json here"), None);
    }
}

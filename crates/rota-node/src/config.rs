//! Node configuration, read once from the environment.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Configuration errors. Any of these stops startup.
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{name} is not valid: {value:?} ({reason})")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

fn invalid(name: &'static str, value: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        name,
        value: value.to_string(),
        reason: reason.into(),
    }
}

/// Language model endpoint settings.
#[derive(Clone, PartialEq)]
pub struct LlmConfig {
    /// When unset the offline keyword model is used.
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeConfig {
    pub log_level: String,
    pub host: String,
    pub port: u16,
    pub debug: bool,
    pub llm: LlmConfig,
    pub rules_path: Option<PathBuf>,
    pub seed_demo: bool,
    pub max_retries: u32,
    pub min_confidence: f32,
    /// Finished change requests beyond this many are forgotten, oldest first.
    pub max_tracked_requests: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8000,
            debug: false,
            llm: LlmConfig {
                base_url: None,
                api_key: None,
                model: "gpt-4o-mini".to_string(),
                timeout: Duration::from_millis(15_000),
            },
            rules_path: None,
            seed_demo: true,
            max_retries: 3,
            min_confidence: 0.5,
            max_tracked_requests: 1000,
        }
    }
}

fn parse_bool(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(name, value, "expected true or false")),
    }
}

fn parse_number<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| invalid(name, value, e.to_string()))
}

impl NodeConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through `lookup`, then validate it.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(level) = get("ROTA_LOG").or_else(|| get("LOG_LEVEL")) {
            config.log_level = level;
        }
        if let Some(host) = get("HTTP_HOST") {
            config.host = host;
        }
        if let Some(port) = get("HTTP_PORT") {
            config.port = parse_number("HTTP_PORT", &port)?;
        }
        if let Some(debug) = get("HTTP_DEBUG") {
            config.debug = parse_bool("HTTP_DEBUG", &debug)?;
        }
        config.llm.base_url = get("LLM_BASE_URL");
        config.llm.api_key = get("LLM_API_KEY");
        if let Some(model) = get("LLM_MODEL") {
            config.llm.model = model;
        }
        if let Some(timeout) = get("LLM_TIMEOUT_MS") {
            config.llm.timeout = Duration::from_millis(parse_number("LLM_TIMEOUT_MS", &timeout)?);
        }
        config.rules_path = get("ROTA_RULES_PATH").map(PathBuf::from);
        if let Some(seed) = get("ROTA_SEED_DEMO") {
            config.seed_demo = parse_bool("ROTA_SEED_DEMO", &seed)?;
        }
        if let Some(retries) = get("ROTA_MAX_RETRIES") {
            config.max_retries = parse_number("ROTA_MAX_RETRIES", &retries)?;
        }
        if let Some(confidence) = get("ROTA_MIN_CONFIDENCE") {
            config.min_confidence = parse_number("ROTA_MIN_CONFIDENCE", &confidence)?;
        }
        if let Some(limit) = get("ROTA_MAX_TRACKED_REQUESTS") {
            config.max_tracked_requests = parse_number("ROTA_MAX_TRACKED_REQUESTS", &limit)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(invalid("HTTP_PORT", "0", "must be between 1 and 65535"));
        }
        self.listen_addr()?;
        if self.llm.timeout.is_zero() {
            return Err(invalid("LLM_TIMEOUT_MS", "0", "must be positive"));
        }
        if let Some(url) = &self.llm.base_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(invalid("LLM_BASE_URL", url, "must start with http:// or https://"));
            }
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(invalid(
                "ROTA_MIN_CONFIDENCE",
                &self.min_confidence.to_string(),
                "must be between 0 and 1",
            ));
        }
        if self.max_tracked_requests == 0 {
            return Err(invalid("ROTA_MAX_TRACKED_REQUESTS", "0", "must be positive"));
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        let raw = format!("{}:{}", self.host, self.port);
        raw.parse()
            .map_err(|_| invalid("HTTP_HOST", &self.host, "not an IP address"))
    }

    /// Effective tracing filter; debug mode forces at least `debug`.
    pub fn log_filter(&self) -> String {
        if self.debug {
            "debug".to_string()
        } else {
            self.log_level.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from(vars: &[(&str, &str)]) -> Result<NodeConfig, ConfigError> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        NodeConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = from(&[]).unwrap();
        assert_eq!(config, NodeConfig::default());
        assert_eq!(config.listen_addr().unwrap().port(), 8000);
        assert!(config.llm.base_url.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = from(&[
            ("HTTP_PORT", "9090"),
            ("HTTP_DEBUG", "true"),
            ("LLM_BASE_URL", "https://llm.internal/v1"),
            ("LLM_TIMEOUT_MS", "2500"),
            ("ROTA_SEED_DEMO", "false"),
            ("ROTA_MAX_RETRIES", "5"),
            ("ROTA_MAX_TRACKED_REQUESTS", "50"),
        ])
        .unwrap();

        assert_eq!(config.port, 9090);
        assert_eq!(config.log_filter(), "debug");
        assert_eq!(config.llm.timeout, Duration::from_millis(2500));
        assert!(!config.seed_demo);
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.max_tracked_requests, 50);
    }

    #[test]
    fn test_invalid_values_fail() {
        assert!(from(&[("HTTP_PORT", "eighty")]).is_err());
        assert!(from(&[("HTTP_DEBUG", "maybe")]).is_err());
        assert!(from(&[("LLM_BASE_URL", "llm.internal")]).is_err());
        assert!(from(&[("ROTA_MIN_CONFIDENCE", "1.5")]).is_err());
        assert!(from(&[("HTTP_HOST", "not a host")]).is_err());
        assert!(from(&[("ROTA_MAX_TRACKED_REQUESTS", "0")]).is_err());
    }

    #[test]
    fn test_api_key_is_redacted() {
        let config = from(&[("LLM_API_KEY", "sk-secret")]).unwrap();
        assert!(!format!("{:?}", config).contains("sk-secret"));
    }
}

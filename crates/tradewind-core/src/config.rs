//! Desk configuration.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Top-level configuration for the desk core.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TradewindConfig {
    /// Streaming chat endpoint settings.
    #[serde(default)]
    pub chat: ChatEndpointConfig,

    /// Orchestrator endpoint settings.
    #[serde(default)]
    pub orchestrator: OrchestratorEndpointConfig,
}

/// Streaming chat endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatEndpointConfig {
    /// Base URL of the chat completions API.
    #[serde(default = "default_chat_base_url")]
    pub base_url: String,

    /// Model identifier sent with each request.
    #[serde(default = "default_model_id")]
    pub model_id: String,

    /// Optional API key override (if not provided, loaded from environment).
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for ChatEndpointConfig {
    fn default() -> Self {
        Self {
            base_url: default_chat_base_url(),
            model_id: default_model_id(),
            api_key: None,
        }
    }
}

fn default_chat_base_url() -> String {
    "http://localhost:8000/v1".to_string()
}

fn default_model_id() -> String {
    "desk-copilot".to_string()
}

/// Orchestrator endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorEndpointConfig {
    /// Base URL of the orchestrator REST API.
    #[serde(default = "default_orchestrator_base_url")]
    pub base_url: String,

    /// Request timeout in seconds; expiry surfaces as a transport error.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Optional API key override (if not provided, loaded from environment).
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for OrchestratorEndpointConfig {
    fn default() -> Self {
        Self {
            base_url: default_orchestrator_base_url(),
            timeout_secs: default_timeout_secs(),
            api_key: None,
        }
    }
}

fn default_orchestrator_base_url() -> String {
    "http://localhost:9090/orchestrator".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

/// Errors that can occur during configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl TradewindConfig {
    /// Loads configuration from a TOML file, falling back to defaults for
    /// missing sections and fields.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read or parsed.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: TradewindConfig = toml::from_str(&contents)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = TradewindConfig::default();
        assert_eq!(config.chat.base_url, "http://localhost:8000/v1");
        assert_eq!(config.chat.model_id, "desk-copilot");
        assert!(config.chat.api_key.is_none());
        assert_eq!(config.orchestrator.timeout_secs, 10);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: TradewindConfig = toml::from_str(
            r#"
            [chat]
            model_id = "desk-copilot-70b"
            "#,
        )
        .unwrap();
        assert_eq!(config.chat.model_id, "desk-copilot-70b");
        assert_eq!(config.chat.base_url, "http://localhost:8000/v1");
        assert_eq!(config.orchestrator.timeout_secs, 10);
    }

    #[test]
    fn test_full_toml() {
        let config: TradewindConfig = toml::from_str(
            r#"
            [chat]
            base_url = "https://api.example.com/v1"
            model_id = "m"
            api_key = "k"

            [orchestrator]
            base_url = "https://orch.example.com"
            timeout_secs = 3
            "#,
        )
        .unwrap();
        assert_eq!(config.chat.api_key.as_deref(), Some("k"));
        assert_eq!(config.orchestrator.base_url, "https://orch.example.com");
        assert_eq!(config.orchestrator.timeout_secs, 3);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[orchestrator]\ntimeout_secs = 5").unwrap();

        let config = TradewindConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.orchestrator.timeout_secs, 5);
    }

    #[test]
    fn test_load_from_missing_file_is_io_error() {
        let result = TradewindConfig::load_from_file("/nonexistent/tradewind.toml");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "not valid toml [").unwrap();

        let result = TradewindConfig::load_from_file(file.path());
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }
}

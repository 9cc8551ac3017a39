//! Configuration loading, validation, and management for Imali.
//!
//! Loads configuration from `~/.imali/config.toml` (or an explicit path)
//! with environment variable overrides. Validates all settings at startup.

use imali_core::{ChatTemplate, GenerationParams};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.imali/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Generation backend selection
    #[serde(default)]
    pub model: ModelConfig,

    /// Sampling parameters, shared by every request
    #[serde(default)]
    pub generation: GenerationParams,

    /// Strategy playbook sources
    #[serde(default)]
    pub playbook: PlaybookConfig,

    /// HTTP gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Backend name: "vllm", "ollama", "llamacpp", "openai", "local", or any
    /// other name served by an OpenAI-compatible endpoint at `api_url`
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Model identifier reported by `/health` and sent to the backend
    #[serde(default = "default_model_id")]
    pub model_id: String,

    /// Endpoint override for HTTP backends
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// API key for HTTP backends that need one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Prompt format expected by the model. Unset means the backend's own
    /// default (ChatML, or the preset's format for local models)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_template: Option<ChatTemplate>,
}

fn default_provider() -> String {
    "vllm".into()
}
fn default_model_id() -> String {
    "Qwen/Qwen2.5-1.5B-Instruct".into()
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model_id: default_model_id(),
            api_url: None,
            api_key: None,
            chat_template: None,
        }
    }
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelConfig")
            .field("provider", &self.provider)
            .field("model_id", &self.model_id)
            .field("api_url", &self.api_url)
            .field("api_key", &redact(&self.api_key))
            .field("chat_template", &self.chat_template)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybookConfig {
    /// Primary (evolved) playbook
    #[serde(default = "default_playbook_path")]
    pub path: PathBuf,

    /// Seed playbook, used only when the primary file does not exist
    #[serde(default = "default_fallback_path")]
    pub fallback_path: PathBuf,
}

fn default_playbook_path() -> PathBuf {
    PathBuf::from("datasets/trm_playbook_evolved.json")
}
fn default_fallback_path() -> PathBuf {
    PathBuf::from("datasets/trm_playbook_seed.json")
}

impl Default for PlaybookConfig {
    fn default() -> Self {
        Self {
            path: default_playbook_path(),
            fallback_path: default_fallback_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Browser origins allowed to call the API. Empty = no CORS headers.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_port() -> u16 {
    8000
}
fn default_host() -> String {
    "0.0.0.0".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            cors_origins: vec![],
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.imali/config.toml).
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_path(&Self::config_dir().join("config.toml"))
    }

    /// Load configuration from `path`, then apply environment overrides:
    /// - `IMALI_API_KEY`
    /// - `IMALI_PROVIDER`
    /// - `IMALI_MODEL`
    /// - `IMALI_PLAYBOOK_PATH`
    /// - `IMALI_PORT`
    pub fn load_path(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path (no env overrides).
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup function.
    fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("IMALI_API_KEY") {
            self.model.api_key = Some(key);
        }
        if let Some(provider) = lookup("IMALI_PROVIDER") {
            self.model.provider = provider;
        }
        if let Some(model) = lookup("IMALI_MODEL") {
            self.model.model_id = model;
        }
        if let Some(path) = lookup("IMALI_PLAYBOOK_PATH") {
            self.playbook.path = PathBuf::from(path);
        }
        if let Some(port) = lookup("IMALI_PORT") {
            self.gateway.port = port.parse().map_err(|_| {
                ConfigError::ValidationError(format!("IMALI_PORT is not a valid port: {port}"))
            })?;
        }
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".imali")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.generation.temperature) {
            return Err(ConfigError::ValidationError(
                "generation.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.generation.max_new_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "generation.max_new_tokens must be > 0".into(),
            ));
        }

        if self.model.model_id.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "model.model_id must not be empty".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert_eq!(config.model.provider, "vllm");
        assert_eq!(config.model.model_id, "Qwen/Qwen2.5-1.5B-Instruct");
        assert_eq!(config.gateway.port, 8000);
        assert_eq!(config.generation.max_new_tokens, 256);
        assert!(config.generation.do_sample);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.model.provider, config.model.provider);
        assert_eq!(parsed.playbook.path, config.playbook.path);
        assert_eq!(parsed.gateway.port, config.gateway.port);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let config = AppConfig {
            generation: GenerationParams {
                temperature: 5.0,
                ..GenerationParams::default()
            },
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_max_tokens_rejected() {
        let mut config = AppConfig::default();
        config.generation.max_new_tokens = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.model.provider, "vllm");
        assert_eq!(config.model.chat_template, None);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[model]
provider = "local"
model_id = "qwen2.5:1.5b"
chat_template = "chatml"

[playbook]
path = "/srv/imali/playbook.json"
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.model.provider, "local");
        assert_eq!(config.model.chat_template, Some(ChatTemplate::ChatML));
        assert_eq!(config.playbook.path, PathBuf::from("/srv/imali/playbook.json"));
        assert_eq!(
            config.playbook.fallback_path,
            PathBuf::from("datasets/trm_playbook_seed.json")
        );
        assert_eq!(config.gateway.host, "0.0.0.0");
        assert!((config.generation.temperature - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[gateway\nport = ").unwrap();
        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn env_overrides_apply() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("IMALI_PROVIDER", "ollama"),
            ("IMALI_MODEL", "qwen2.5:1.5b-instruct"),
            ("IMALI_PORT", "9090"),
            ("IMALI_API_KEY", "sk-test"),
        ]);
        let mut config = AppConfig::default();
        config
            .apply_env_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.model.provider, "ollama");
        assert_eq!(config.model.model_id, "qwen2.5:1.5b-instruct");
        assert_eq!(config.gateway.port, 9090);
        assert_eq!(config.model.api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn bad_port_override_rejected() {
        let mut config = AppConfig::default();
        let result = config.apply_env_overrides(|k| {
            (k == "IMALI_PORT").then(|| "eighty".to_string())
        });
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn api_key_is_redacted_in_debug() {
        let mut config = AppConfig::default();
        config.model.api_key = Some("sk-very-secret".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-very-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("Qwen/Qwen2.5-1.5B-Instruct"));
        assert!(toml_str.contains("8000"));
        assert!(toml_str.contains("trm_playbook_seed.json"));
    }
}

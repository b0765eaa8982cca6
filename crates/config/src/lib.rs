//! Configuration loading, validation, and management for LEAP.
//!
//! Loads configuration from `~/.leap/config.toml` (or `$LEAP_CONFIG`) with
//! environment variable overrides. Validates all settings at startup.

pub mod pairs;

pub use pairs::{MODEL_PAIRS, ModelPair, find_pair};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.leap/config.toml`. Every field has a default, so an
/// empty file (or no file at all) is a valid configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Print per-turn progress
    #[serde(default)]
    pub verbose: bool,

    /// Record per-call latency and throughput
    #[serde(default = "default_true")]
    pub track_latency: bool,

    /// Generation backend
    #[serde(default)]
    pub backend: BackendConfig,

    /// Main (planning) and sub (filtering) models
    #[serde(default)]
    pub models: ModelsConfig,

    /// Turn loop limits and size thresholds
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    /// Built-in tool settings
    #[serde(default)]
    pub tools: ToolsConfig,
}

fn default_true() -> bool {
    true
}

/// Which wire protocol the backend speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Ollama's native `/api/generate`
    #[default]
    Ollama,
    /// Any `/chat/completions` endpoint (llama.cpp server, vLLM, LM Studio)
    OpenaiCompat,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ollama => f.write_str("ollama"),
            Self::OpenaiCompat => f.write_str("openai_compat"),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default)]
    pub kind: BackendKind,

    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Unload the previous model before generating with a different one.
    #[serde(default = "default_true")]
    pub sequential: bool,
}

fn default_api_url() -> String {
    "http://localhost:11434".into()
}
fn default_timeout_secs() -> u64 {
    120
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("kind", &self.kind)
            .field("api_url", &self.api_url)
            .field("api_key", &redact(&self.api_key))
            .field("timeout_secs", &self.timeout_secs)
            .field("sequential", &self.sequential)
            .finish()
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::default(),
            api_url: default_api_url(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
            sequential: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    /// Planning / answering model
    #[serde(default = "default_main_model")]
    pub main: String,

    /// Result filtering model
    #[serde(default = "default_sub_model")]
    pub sub: String,

    /// Temperature for final and direct answers
    #[serde(default = "default_main_temperature")]
    pub main_temperature: f32,

    /// Temperature for filtering
    #[serde(default)]
    pub sub_temperature: f32,

    /// Temperature for planning and state updates
    #[serde(default = "default_planning_temperature")]
    pub planning_temperature: f32,

    /// Issue a one-token generation per model at startup
    #[serde(default = "default_true")]
    pub warmup: bool,
}

fn default_main_model() -> String {
    "qwen3:1.7b".into()
}
fn default_sub_model() -> String {
    "gemma3:1b".into()
}
fn default_main_temperature() -> f32 {
    0.3
}
fn default_planning_temperature() -> f32 {
    0.5
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            main: default_main_model(),
            sub: default_sub_model(),
            main_temperature: default_main_temperature(),
            sub_temperature: 0.0,
            planning_temperature: default_planning_temperature(),
            warmup: true,
        }
    }
}

/// Turn loop limits, size thresholds and per-phase token budgets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,

    #[serde(default = "default_true")]
    pub enable_filtering: bool,

    /// Mapping results whose pretty JSON is shorter than this skip the filter model.
    #[serde(default = "default_small_result_chars")]
    pub small_result_chars: usize,

    /// Cap on the serialized result shown to the filter model.
    #[serde(default = "default_filter_input_chars")]
    pub filter_input_chars: usize,

    /// Cap on string / scalar results before wrapping.
    #[serde(default = "default_text_truncate_chars")]
    pub text_truncate_chars: usize,

    /// Cap on the result text shown to the state update.
    #[serde(default = "default_state_result_chars")]
    pub state_result_chars: usize,

    /// Hard cap on the rolling summary.
    #[serde(default = "default_summary_max_chars")]
    pub summary_max_chars: usize,

    /// Direct answers shorter than this are retried once.
    #[serde(default = "default_direct_min_chars")]
    pub direct_min_chars: usize,

    #[serde(default = "default_direct_retry_temperature")]
    pub direct_retry_temperature: f32,

    #[serde(default = "default_planning_max_tokens")]
    pub planning_max_tokens: u32,

    #[serde(default = "default_state_max_tokens")]
    pub state_max_tokens: u32,

    #[serde(default = "default_filter_max_tokens")]
    pub filter_max_tokens: u32,

    #[serde(default = "default_final_max_tokens")]
    pub final_max_tokens: u32,

    #[serde(default = "default_direct_max_tokens")]
    pub direct_max_tokens: u32,
}

fn default_max_turns() -> u32 {
    15
}
fn default_small_result_chars() -> usize {
    500
}
fn default_filter_input_chars() -> usize {
    3000
}
fn default_text_truncate_chars() -> usize {
    1000
}
fn default_state_result_chars() -> usize {
    1000
}
fn default_summary_max_chars() -> usize {
    2400
}
fn default_direct_min_chars() -> usize {
    10
}
fn default_direct_retry_temperature() -> f32 {
    0.8
}
fn default_planning_max_tokens() -> u32 {
    300
}
fn default_state_max_tokens() -> u32 {
    512
}
fn default_filter_max_tokens() -> u32 {
    512
}
fn default_final_max_tokens() -> u32 {
    1024
}
fn default_direct_max_tokens() -> u32 {
    2048
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            enable_filtering: true,
            small_result_chars: default_small_result_chars(),
            filter_input_chars: default_filter_input_chars(),
            text_truncate_chars: default_text_truncate_chars(),
            state_result_chars: default_state_result_chars(),
            summary_max_chars: default_summary_max_chars(),
            direct_min_chars: default_direct_min_chars(),
            direct_retry_temperature: default_direct_retry_temperature(),
            planning_max_tokens: default_planning_max_tokens(),
            state_max_tokens: default_state_max_tokens(),
            filter_max_tokens: default_filter_max_tokens(),
            final_max_tokens: default_final_max_tokens(),
            direct_max_tokens: default_direct_max_tokens(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Tools to expose. Empty = every built-in tool.
    #[serde(default)]
    pub enabled: Vec<String>,

    #[serde(default = "default_shell_timeout_secs")]
    pub shell_timeout_secs: u64,

    #[serde(default = "default_web_timeout_secs")]
    pub web_timeout_secs: u64,
}

fn default_shell_timeout_secs() -> u64 {
    30
}
fn default_web_timeout_secs() -> u64 {
    10
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            enabled: Vec::new(),
            shell_timeout_secs: default_shell_timeout_secs(),
            web_timeout_secs: default_web_timeout_secs(),
        }
    }
}

impl AppConfig {
    /// Load configuration from `$LEAP_CONFIG` or the default path (~/.leap/config.toml).
    ///
    /// Environment overrides, applied after the file:
    /// - `LEAP_MAIN_MODEL`, `LEAP_SUB_MODEL`
    /// - `LEAP_BACKEND_URL`
    /// - `LEAP_API_KEY`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = std::env::var("LEAP_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| Self::config_dir().join("config.toml"));
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
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

    /// Apply `LEAP_*` overrides using the given lookup.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(model) = lookup("LEAP_MAIN_MODEL") {
            self.models.main = model;
        }
        if let Some(model) = lookup("LEAP_SUB_MODEL") {
            self.models.sub = model;
        }
        if let Some(url) = lookup("LEAP_BACKEND_URL") {
            self.backend.api_url = url;
        }
        if let Some(key) = lookup("LEAP_API_KEY") {
            self.backend.api_key = Some(key);
        }
    }

    /// Replace both models with a named preset from [`MODEL_PAIRS`].
    pub fn apply_pair(&mut self, name: &str) -> Result<&'static ModelPair, ConfigError> {
        let pair = find_pair(name).ok_or_else(|| {
            let known: Vec<_> = MODEL_PAIRS.iter().map(|p| p.name).collect();
            ConfigError::ValidationError(format!(
                "unknown model pair '{name}' (known: {})",
                known.join(", ")
            ))
        })?;
        self.models.main = pair.main.into();
        self.models.sub = pair.sub.into();
        Ok(pair)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".leap")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let temperatures = [
            ("models.main_temperature", self.models.main_temperature),
            ("models.sub_temperature", self.models.sub_temperature),
            ("models.planning_temperature", self.models.planning_temperature),
            (
                "orchestrator.direct_retry_temperature",
                self.orchestrator.direct_retry_temperature,
            ),
        ];
        for (name, value) in temperatures {
            if !(0.0..=2.0).contains(&value) {
                return Err(ConfigError::ValidationError(format!(
                    "{name} must be between 0.0 and 2.0"
                )));
            }
        }

        if self.models.main.trim().is_empty() || self.models.sub.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "models.main and models.sub must not be empty".into(),
            ));
        }

        if self.orchestrator.max_turns == 0 {
            return Err(ConfigError::ValidationError(
                "orchestrator.max_turns must be at least 1".into(),
            ));
        }

        let o = &self.orchestrator;
        if o.small_result_chars == 0
            || o.filter_input_chars == 0
            || o.text_truncate_chars == 0
            || o.summary_max_chars == 0
        {
            return Err(ConfigError::ValidationError(
                "orchestrator size limits must be greater than zero".into(),
            ));
        }

        if self.backend.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "backend.timeout_secs must be greater than zero".into(),
            ));
        }

        Ok(())
    }

    /// A copy with secrets blanked out, for display.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.backend.api_key.is_some() {
            copy.backend.api_key = Some("[REDACTED]".into());
        }
        copy
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            track_latency: true,
            backend: BackendConfig::default(),
            models: ModelsConfig::default(),
            orchestrator: OrchestratorConfig::default(),
            tools: ToolsConfig::default(),
        }
    }
}

/// Get the user's home directory.
pub fn dirs_home() -> PathBuf {
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

impl From<ConfigError> for leap_core::Error {
    fn from(err: ConfigError) -> Self {
        leap_core::Error::config(err.to_string())
    }
}

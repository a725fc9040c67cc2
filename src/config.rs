//! Configuration: generation settings from env, with an optional TOML file
//! (`CONTENT_CONFIG_PATH`) supplying defaults and reference data.
//!
//! Everything here is read once at start-up and shared read-only afterwards.
//! Env variables win over the file; the file wins over built-in defaults.
//!
//! ```toml
//! [generation]
//! model = "gpt-4o-mini"
//! max_retries = 3
//! retry_delay_ms = 1000
//!
//! [[levels]]
//! id = "L1"
//! title = "Beginner"
//!
//! [[topics]]
//! id = "T1"
//! title = "Family"
//!
//! [[lessons]]
//! id = "LES1"
//! level_id = "L1"
//! topic_id = "T1"
//! ```

use std::time::Duration;

use serde::Deserialize;
use tracing::{error, info};

use crate::domain::{Level, Topic};
use crate::error::ConfigurationError;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1000;
pub const DEFAULT_MAX_TOKENS: u32 = 4096;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_CALL_TIMEOUT_SECS: u64 = 120;

/// Optional TOML file contents.
#[derive(Clone, Debug, Deserialize, Default)]
pub struct FileConfig {
  #[serde(default)]
  pub generation: GenerationFileCfg,
  #[serde(default)]
  pub levels: Vec<Level>,
  #[serde(default)]
  pub topics: Vec<Topic>,
  #[serde(default)]
  pub lessons: Vec<LessonCfg>,
}

/// `[generation]` table. Every knob is optional.
#[derive(Clone, Debug, Deserialize, Default)]
pub struct GenerationFileCfg {
  #[serde(default)] pub base_url: Option<String>,
  #[serde(default)] pub model: Option<String>,
  #[serde(default)] pub max_retries: Option<u32>,
  #[serde(default)] pub retry_delay_ms: Option<u64>,
  #[serde(default)] pub max_tokens: Option<u32>,
  #[serde(default)] pub temperature: Option<f32>,
  #[serde(default)] pub call_timeout_secs: Option<u64>,
}

/// Lesson entry accepted in TOML configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct LessonCfg {
  pub id: String,
  pub level_id: String,
  pub topic_id: String,
}

/// Read-only settings for the generation client.
#[derive(Clone, Debug)]
pub struct GenerationSettings {
  pub api_key: Option<String>,
  pub base_url: String,
  pub model: String,
  pub max_retries: u32,
  pub retry_delay: Duration,
  pub max_tokens: u32,
  pub temperature: f32,
  /// Overall budget for one generation call, retries and backoff included.
  pub call_timeout: Duration,
}

impl Default for GenerationSettings {
  fn default() -> Self {
    Self {
      api_key: None,
      base_url: DEFAULT_BASE_URL.into(),
      model: DEFAULT_MODEL.into(),
      max_retries: DEFAULT_MAX_RETRIES,
      retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
      max_tokens: DEFAULT_MAX_TOKENS,
      temperature: DEFAULT_TEMPERATURE,
      call_timeout: Duration::from_secs(DEFAULT_CALL_TIMEOUT_SECS),
    }
  }
}

impl GenerationSettings {
  pub fn from_env(file: &GenerationFileCfg) -> Result<Self, ConfigurationError> {
    Self::resolve(file, |k: &str| std::env::var(k).ok())
  }

  /// Layer `env` over `file` over defaults, then check ranges.
  pub fn resolve(
    file: &GenerationFileCfg,
    env: impl Fn(&str) -> Option<String>,
  ) -> Result<Self, ConfigurationError> {
    let d = Self::default();
    let s = Self {
      api_key: env("OPENAI_API_KEY"),
      base_url: env("OPENAI_BASE_URL").or_else(|| file.base_url.clone()).unwrap_or(d.base_url),
      model: env("OPENAI_MODEL").or_else(|| file.model.clone()).unwrap_or(d.model),
      max_retries: parse_env(&env, "GENERATION_MAX_RETRIES", "max_retries")?
        .or(file.max_retries)
        .unwrap_or(d.max_retries),
      retry_delay: parse_env(&env, "GENERATION_RETRY_DELAY_MS", "retry_delay_ms")?
        .or(file.retry_delay_ms)
        .map(Duration::from_millis)
        .unwrap_or(d.retry_delay),
      max_tokens: parse_env(&env, "GENERATION_MAX_TOKENS", "max_tokens")?
        .or(file.max_tokens)
        .unwrap_or(d.max_tokens),
      temperature: parse_env(&env, "GENERATION_TEMPERATURE", "temperature")?
        .or(file.temperature)
        .unwrap_or(d.temperature),
      call_timeout: parse_env(&env, "GENERATION_CALL_TIMEOUT_SECS", "call_timeout_secs")?
        .or(file.call_timeout_secs)
        .map(Duration::from_secs)
        .unwrap_or(d.call_timeout),
    };
    s.check()?;
    Ok(s)
  }

  fn check(&self) -> Result<(), ConfigurationError> {
    if self.max_retries == 0 {
      return Err(invalid("max_retries", "must be at least 1"));
    }
    if !(0.0..=2.0).contains(&self.temperature) {
      return Err(invalid("temperature", "must be between 0.0 and 2.0"));
    }
    if self.call_timeout.is_zero() {
      return Err(invalid("call_timeout_secs", "must be positive"));
    }
    if self.model.trim().is_empty() {
      return Err(invalid("model", "must not be empty"));
    }
    Ok(())
  }
}

/// The key must be present, non-blank and free of whitespace.
pub fn validate_api_key(key: Option<&str>) -> Result<&str, ConfigurationError> {
  let key = key.ok_or(ConfigurationError::MissingApiKey)?;
  if key.trim().is_empty() {
    return Err(ConfigurationError::MissingApiKey);
  }
  if key.chars().any(char::is_whitespace) {
    return Err(ConfigurationError::InvalidApiKey("contains whitespace"));
  }
  Ok(key)
}

fn invalid(field: &'static str, reason: &str) -> ConfigurationError {
  ConfigurationError::Invalid { field, reason: reason.into() }
}

fn parse_env<T: std::str::FromStr>(
  env: &impl Fn(&str) -> Option<String>,
  var: &str,
  field: &'static str,
) -> Result<Option<T>, ConfigurationError>
where
  T::Err: std::fmt::Display,
{
  match env(var) {
    None => Ok(None),
    Some(raw) => raw
      .trim()
      .parse::<T>()
      .map(Some)
      .map_err(|e| invalid(field, &format!("{var}={raw:?}: {e}"))),
  }
}

/// Attempt to load `FileConfig` from CONTENT_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_file_config_from_env() -> Option<FileConfig> {
  let path = std::env::var("CONTENT_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<FileConfig>(&s) {
      Ok(cfg) => {
        info!(target: "lesson_content_backend", %path, levels = cfg.levels.len(), topics = cfg.topics.len(), lessons = cfg.lessons.len(), "Loaded content config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "lesson_content_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "lesson_content_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

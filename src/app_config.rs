use anyhow::{Context, Result, anyhow};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::document::{BatchingConfig, ProjectSettings};
use crate::file_utils::FileManager;
use crate::providers::ClientSettings;
use crate::translation::TranslatorOptions;

/// Application configuration module
/// Loading, validating and saving settings, and turning them into the
/// settings objects used by batching, clients and the translator.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Config {
    /// Language to translate into
    #[serde(default = "default_target_language")]
    pub target_language: String,

    /// Instructions sent with every batch
    #[serde(default)]
    pub instructions: Option<String>,

    /// Scene and batch segmentation
    #[serde(default)]
    pub batching: BatchingSettings,

    /// Translation client and policy
    #[serde(default)]
    pub translation: TranslationConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Translation provider type
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TranslationProvider {
    // @provider: In-process scripted client
    #[default]
    Mock,
    // @provider: OpenAI
    OpenAI,
    // @provider: Gemini
    Gemini,
    // @provider: Anthropic
    Anthropic,
}

impl TranslationProvider {
    // @returns: Capitalized provider name
    pub fn display_name(&self) -> &str {
        match self {
            Self::Mock => "Mock",
            Self::OpenAI => "OpenAI",
            Self::Gemini => "Gemini",
            Self::Anthropic => "Anthropic",
        }
    }

    // @returns: Whether the provider needs an API key
    pub fn requires_api_key(&self) -> bool {
        !matches!(self, Self::Mock)
    }

    // @returns: Model used when the config names none
    pub fn default_model(&self) -> Option<&'static str> {
        match self {
            Self::Mock => None,
            Self::OpenAI => Some("gpt-4o"),
            Self::Gemini => Some("gemini-2.0-flash"),
            Self::Anthropic => Some("claude-3-haiku-20240307"),
        }
    }

    // @returns: Service URL used when the config names none
    pub fn default_endpoint(&self) -> Option<&'static str> {
        match self {
            Self::Mock => None,
            Self::OpenAI => Some("https://api.openai.com/v1"),
            Self::Gemini => Some("https://generativelanguage.googleapis.com/v1beta"),
            Self::Anthropic => Some("https://api.anthropic.com"),
        }
    }

    // @returns: Requests per minute when the config sets no limit
    pub fn default_rate_limit(&self) -> Option<u32> {
        match self {
            Self::Mock | Self::Gemini => None,
            Self::OpenAI => Some(60),
            // Standard tier allows 50 per minute
            Self::Anthropic => Some(45),
        }
    }
}

impl std::fmt::Display for TranslationProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name().to_lowercase())
    }
}

impl std::str::FromStr for TranslationProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "mock" => Ok(Self::Mock),
            "openai" => Ok(Self::OpenAI),
            "gemini" => Ok(Self::Gemini),
            "anthropic" => Ok(Self::Anthropic),
            _ => Err(anyhow!("Invalid provider type: {}", s)),
        }
    }
}

/// Segmentation thresholds
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct BatchingSettings {
    /// Gap in seconds that starts a new scene
    #[serde(default = "default_scene_threshold_secs")]
    pub scene_threshold_secs: f64,

    /// Preferred minimum lines per batch
    #[serde(default = "default_min_batch_size")]
    pub min_batch_size: usize,

    /// Maximum lines per batch
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
}

impl Default for BatchingSettings {
    fn default() -> Self {
        Self {
            scene_threshold_secs: default_scene_threshold_secs(),
            min_batch_size: default_min_batch_size(),
            max_batch_size: default_max_batch_size(),
        }
    }
}

/// Translation client and run policy
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TranslationConfig {
    // @field: Provider type identifier
    #[serde(default)]
    pub provider: TranslationProvider,

    // @field: Model name
    #[serde(default)]
    pub model: Option<String>,

    // @field: API key
    #[serde(default)]
    pub api_key: Option<String>,

    // @field: Service URL
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Retries after the first attempt of a request
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base backoff delay in seconds, doubled on each retry
    #[serde(default = "default_backoff_time_secs")]
    pub backoff_time_secs: f64,

    /// Timeout for a single attempt; 0 disables it
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Requests per minute (optional)
    #[serde(default)]
    pub rate_limit: Option<u32>,

    /// Temperature parameter for text generation
    #[serde(default)]
    pub temperature: f32,

    /// Abort a scene after its first failed batch
    #[serde(default)]
    pub stop_on_error: bool,

    /// Re-attempt failed batches on later runs
    #[serde(default = "default_true")]
    pub retry_on_error: bool,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            provider: TranslationProvider::default(),
            model: None,
            api_key: None,
            endpoint: None,
            max_retries: default_max_retries(),
            backoff_time_secs: default_backoff_time_secs(),
            timeout_secs: default_timeout_secs(),
            rate_limit: None,
            temperature: 0.0,
            stop_on_error: false,
            retry_on_error: true,
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

fn default_target_language() -> String {
    "English".to_string()
}

fn default_scene_threshold_secs() -> f64 {
    30.0
}

fn default_min_batch_size() -> usize {
    10
}

fn default_max_batch_size() -> usize {
    30
}

fn default_max_retries() -> u32 {
    5
}

fn default_backoff_time_secs() -> f64 {
    4.0
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Config {
            target_language: default_target_language(),
            instructions: None,
            batching: BatchingSettings::default(),
            translation: TranslationConfig::default(),
            log_level: LogLevel::default(),
        }
    }
}

impl Config {
    /// Load a configuration file; missing fields take their defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = FileManager::read_to_string(path)?;
        let config: Config =
            serde_json::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration as pretty JSON.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        FileManager::write_atomic(path, &content)
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        if self.target_language.trim().is_empty() {
            return Err(anyhow!("Target language must not be empty"));
        }

        self.to_batching_config()
            .validate()
            .context("Invalid batching settings")?;

        let translation = &self.translation;
        if !translation.backoff_time_secs.is_finite() || translation.backoff_time_secs < 0.0 {
            return Err(anyhow!(
                "Backoff time must be a non-negative number of seconds, got {}",
                translation.backoff_time_secs
            ));
        }
        if !(0.0..=2.0).contains(&translation.temperature) {
            return Err(anyhow!("Temperature must be between 0.0 and 2.0, got {}", translation.temperature));
        }
        if translation.provider.requires_api_key() && translation.api_key.as_deref().is_none_or(str::is_empty) {
            return Err(anyhow!(
                "Translation API key is required for {} provider",
                translation.provider.display_name()
            ));
        }

        Ok(())
    }

    pub fn to_batching_config(&self) -> BatchingConfig {
        BatchingConfig::new(
            self.batching.scene_threshold_secs,
            self.batching.min_batch_size,
            self.batching.max_batch_size,
        )
    }

    /// Client settings for the configured provider.
    ///
    /// Model, endpoint and rate limit fall back to the provider's defaults when
    /// unset; an explicit rate limit of 0 disables limiting.
    pub fn to_client_settings(&self) -> ClientSettings {
        let translation = &self.translation;
        let provider = &translation.provider;
        ClientSettings {
            api_key: translation.api_key.clone(),
            model: translation
                .model
                .clone()
                .or_else(|| provider.default_model().map(str::to_string)),
            endpoint: translation
                .endpoint
                .clone()
                .or_else(|| provider.default_endpoint().map(str::to_string)),
            max_retries: translation.max_retries,
            backoff_time: Duration::try_from_secs_f64(translation.backoff_time_secs).unwrap_or_default(),
            timeout: (translation.timeout_secs > 0).then(|| Duration::from_secs(translation.timeout_secs)),
            rate_limit: translation
                .rate_limit
                .or_else(|| provider.default_rate_limit())
                .filter(|rate| *rate > 0),
            temperature: translation.temperature,
        }
    }

    pub fn to_translator_options(&self) -> TranslatorOptions {
        TranslatorOptions {
            stop_on_error: self.translation.stop_on_error,
            retry_on_error: self.translation.retry_on_error,
            ..TranslatorOptions::default()
        }
    }

    /// Fill in project settings the project does not set itself.
    pub fn apply_defaults(&self, settings: &mut ProjectSettings) {
        if settings.target_language.is_none() {
            settings.target_language = Some(self.target_language.clone());
        }
        if settings.instructions.is_none() {
            settings.instructions = self.instructions.clone();
        }
    }
}

/*!
 * Tests for application configuration
 */

use log::LevelFilter;
use std::time::Duration;
use tempfile::tempdir;

use subtrans::app_config::{Config, LogLevel, TranslationProvider};
use subtrans::document::ProjectSettings;

#[test]
fn test_config_default_shouldBeValid() {
    let config = Config::default();

    assert_eq!(config.target_language, "English");
    assert_eq!(config.translation.provider, TranslationProvider::Mock);
    assert_eq!(config.translation.max_retries, 5);
    assert!(config.translation.retry_on_error);
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_validate_withHostedProviderAndNoKey_shouldFail() {
    let mut config = Config::default();
    config.translation.provider = TranslationProvider::OpenAI;
    assert!(config.validate().is_err());

    config.translation.api_key = Some(String::new());
    assert!(config.validate().is_err());

    config.translation.api_key = Some("sk-test".to_string());
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_validate_withBadValues_shouldFail() {
    let mut config = Config::default();
    config.batching.min_batch_size = 50;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.translation.backoff_time_secs = -1.0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.translation.temperature = 3.5;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.target_language = "  ".to_string();
    assert!(config.validate().is_err());
}

#[test]
fn test_config_saveAndLoad_shouldRoundTrip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("conf.json");

    let mut config = Config::default();
    config.target_language = "French".to_string();
    config.instructions = Some("Keep it casual".to_string());
    config.translation.rate_limit = Some(30);
    config.log_level = LogLevel::Debug;

    config.save_to_file(&path).unwrap();
    let loaded = Config::load_from_file(&path).unwrap();

    assert_eq!(loaded, config);
}

#[test]
fn test_config_loadFromFile_withPartialJson_shouldFillDefaults() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("conf.json");
    std::fs::write(&path, r#"{ "target_language": "Spanish", "translation": { "max_retries": 1 } }"#).unwrap();

    let config = Config::load_from_file(&path).unwrap();

    assert_eq!(config.target_language, "Spanish");
    assert_eq!(config.translation.max_retries, 1);
    assert_eq!(config.translation.timeout_secs, 120);
    assert_eq!(config.batching.max_batch_size, 30);
}

#[test]
fn test_config_loadFromFile_withInvalidContent_shouldFail() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("conf.json");
    std::fs::write(&path, r#"{ "translation": { "provider": "gemini" } }"#).unwrap();

    assert!(Config::load_from_file(&path).is_err());
    assert!(Config::load_from_file(dir.path().join("missing.json")).is_err());
}

#[test]
fn test_config_toClientSettings_shouldConvertUnits() {
    let mut config = Config::default();
    config.translation.backoff_time_secs = 0.5;
    config.translation.timeout_secs = 0;
    config.translation.rate_limit = Some(0);
    config.translation.model = Some("gpt-test".to_string());

    let settings = config.to_client_settings();

    assert_eq!(settings.backoff_time, Duration::from_millis(500));
    assert_eq!(settings.timeout, None);
    assert_eq!(settings.rate_limit, None);
    assert_eq!(settings.model.as_deref(), Some("gpt-test"));
}

#[test]
fn test_config_toClientSettings_withVendorProvider_shouldFillProviderDefaults() {
    let mut config = Config::default();
    config.translation.provider = TranslationProvider::Anthropic;

    let settings = config.to_client_settings();
    assert_eq!(settings.model.as_deref(), Some("claude-3-haiku-20240307"));
    assert_eq!(settings.endpoint.as_deref(), Some("https://api.anthropic.com"));
    assert_eq!(settings.rate_limit, Some(45));

    config.translation.model = Some("claude-custom".to_string());
    config.translation.rate_limit = Some(0);
    let settings = config.to_client_settings();
    assert_eq!(settings.model.as_deref(), Some("claude-custom"));
    assert_eq!(settings.rate_limit, None);

    let mock = Config::default().to_client_settings();
    assert_eq!(mock.endpoint, None);
    assert_eq!(mock.rate_limit, None);
}

#[test]
fn test_config_toTranslatorOptions_shouldCarryErrorPolicy() {
    let mut config = Config::default();
    config.translation.stop_on_error = true;
    config.translation.retry_on_error = false;

    let options = config.to_translator_options();

    assert!(options.stop_on_error);
    assert!(!options.retry_on_error);
}

#[test]
fn test_config_applyDefaults_shouldOnlyFillMissingSettings() {
    let mut config = Config::default();
    config.target_language = "German".to_string();
    config.instructions = Some("Formal register".to_string());

    let mut settings = ProjectSettings {
        target_language: Some("Italian".to_string()),
        ..ProjectSettings::default()
    };
    config.apply_defaults(&mut settings);

    assert_eq!(settings.target_language.as_deref(), Some("Italian"));
    assert_eq!(settings.instructions.as_deref(), Some("Formal register"));
}

#[test]
fn test_translationProvider_fromStr_shouldIgnoreCase() {
    assert_eq!("OpenAI".parse::<TranslationProvider>().unwrap(), TranslationProvider::OpenAI);
    assert_eq!("anthropic".parse::<TranslationProvider>().unwrap(), TranslationProvider::Anthropic);
    assert!("unknown".parse::<TranslationProvider>().is_err());
    assert_eq!(TranslationProvider::Gemini.to_string(), "gemini");
}

#[test]
fn test_logLevel_intoLevelFilter_shouldMatch() {
    assert_eq!(LevelFilter::from(LogLevel::Warn), LevelFilter::Warn);
    assert_eq!(LevelFilter::from(LogLevel::default()), LevelFilter::Info);
}

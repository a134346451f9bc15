use std::env;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::Catalog;
use crate::gateway::{GatewayConfig, GatewayCredentials};
use crate::title::TitleRules;

pub const DEFAULT_USER_AGENT: &str = "tmtool/0.1";
pub const DEFAULT_SOURCE_LANGUAGE: &str = "he";
pub const DEFAULT_CREATE_SUMMARY: &str = "Creating redirect for suggested translation";
pub const DEFAULT_MOVE_SUMMARY: &str = "Suggested translation changed";
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_RATE_LIMIT_READ_MS: u64 = 300;
pub const DEFAULT_RATE_LIMIT_WRITE_MS: u64 = 1_000;
pub const DEFAULT_MAX_RETRIES: usize = 2;
pub const DEFAULT_MAX_WRITE_RETRIES: usize = 1;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 500;
/// Placeholder replaced by the target language code in the API URL template.
pub const LANGUAGE_PLACEHOLDER: &str = "$1";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("missing target wiki API URL (set target_wiki.api_url or TM_TARGET_WIKI_API_URL)")]
    MissingApiUrl,
    #[error("missing target wiki login details: {0} is not set")]
    MissingCredential(&'static str),
    #[error("language `{0}` is not configured as a translation target")]
    UnknownLanguage(String),
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct TmConfig {
    #[serde(default)]
    pub translation: TranslationSection,
    #[serde(default)]
    pub target_wiki: TargetWikiSection,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct TranslationSection {
    pub source_language: Option<String>,
    #[serde(default)]
    pub languages: Vec<String>,
    /// Prefixes that make a title an interwiki link on the target wiki.
    #[serde(default)]
    pub interwiki_prefixes: Vec<String>,
    #[serde(default)]
    pub auto_save_word_count: bool,
    #[serde(default)]
    pub auto_set_end_date_on_word_count: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct TargetWikiSection {
    /// e.g. `https://$1.wikipedia.org/w/api.php`
    pub api_url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub user_agent: Option<String>,
    pub create_summary: Option<String>,
    pub move_summary: Option<String>,
    pub timeout_ms: Option<u64>,
    /// Minimum gap between consecutive reads, in milliseconds.
    pub rate_limit_read_ms: Option<u64>,
    /// Minimum gap between consecutive edits or moves.
    pub rate_limit_write_ms: Option<u64>,
    pub max_retries: Option<usize>,
    pub max_write_retries: Option<usize>,
    pub retry_delay_ms: Option<u64>,
}

impl TmConfig {
    pub fn source_language(&self) -> &str {
        self.translation
            .source_language
            .as_deref()
            .unwrap_or(DEFAULT_SOURCE_LANGUAGE)
    }

    pub fn catalog(&self) -> Catalog {
        Catalog::new(&self.translation.languages)
    }

    /// Interwiki prefixes plus every language code the target wiki links to.
    pub fn title_rules(&self) -> TitleRules {
        let prefixes = self
            .translation
            .interwiki_prefixes
            .iter()
            .map(String::as_str)
            .chain(self.translation.languages.iter().map(String::as_str))
            .chain(std::iter::once(self.source_language()));
        TitleRules::new(prefixes)
    }

    /// Resolve the API URL template: env > config > None.
    pub fn api_url_template(&self) -> Option<String> {
        env_override("TM_TARGET_WIKI_API_URL").or_else(|| non_empty(&self.target_wiki.api_url))
    }

    pub fn user_agent(&self) -> String {
        env_override("TM_USER_AGENT")
            .or_else(|| non_empty(&self.target_wiki.user_agent))
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string())
    }

    /// Credentials are mandatory; anything missing is a configuration error.
    pub fn credentials(&self) -> Result<GatewayCredentials, ConfigError> {
        let username = env_override("TM_TARGET_WIKI_USER")
            .or_else(|| non_empty(&self.target_wiki.username))
            .ok_or(ConfigError::MissingCredential("TM_TARGET_WIKI_USER"))?;
        let password = env_override("TM_TARGET_WIKI_PASSWORD")
            .or_else(|| non_empty(&self.target_wiki.password))
            .ok_or(ConfigError::MissingCredential("TM_TARGET_WIKI_PASSWORD"))?;
        Ok(GatewayCredentials { username, password })
    }

    /// Everything needed to talk to the target wiki for `language`.
    pub fn gateway_config(&self, language: &str) -> Result<GatewayConfig, ConfigError> {
        if !self.catalog().is_valid_language(language) {
            return Err(ConfigError::UnknownLanguage(language.to_string()));
        }
        let template = self.api_url_template().ok_or(ConfigError::MissingApiUrl)?;
        let credentials = self.credentials()?;
        Ok(GatewayConfig {
            api_url: template.replace(LANGUAGE_PLACEHOLDER, language),
            credentials,
            source_language: self.source_language().to_string(),
            create_summary: self
                .target_wiki
                .create_summary
                .clone()
                .unwrap_or_else(|| DEFAULT_CREATE_SUMMARY.to_string()),
            move_summary: self
                .target_wiki
                .move_summary
                .clone()
                .unwrap_or_else(|| DEFAULT_MOVE_SUMMARY.to_string()),
            user_agent: self.user_agent(),
            timeout_ms: env_value_u64("TM_HTTP_TIMEOUT_MS")
                .or(self.target_wiki.timeout_ms)
                .unwrap_or(DEFAULT_TIMEOUT_MS),
            rate_limit_read_ms: self
                .target_wiki
                .rate_limit_read_ms
                .unwrap_or(DEFAULT_RATE_LIMIT_READ_MS),
            rate_limit_write_ms: self
                .target_wiki
                .rate_limit_write_ms
                .unwrap_or(DEFAULT_RATE_LIMIT_WRITE_MS),
            max_retries: env_value_usize("TM_HTTP_RETRIES")
                .or(self.target_wiki.max_retries)
                .unwrap_or(DEFAULT_MAX_RETRIES),
            max_write_retries: self
                .target_wiki
                .max_write_retries
                .unwrap_or(DEFAULT_MAX_WRITE_RETRIES),
            retry_delay_ms: self
                .target_wiki
                .retry_delay_ms
                .unwrap_or(DEFAULT_RETRY_DELAY_MS),
        })
    }
}

/// Load and parse a TmConfig from a TOML file. Returns default if file doesn't exist.
pub fn load_config(config_path: &Path) -> Result<TmConfig> {
    if !config_path.exists() {
        return Ok(TmConfig::default());
    }
    let content = fs::read_to_string(config_path)
        .with_context(|| format!("failed to read {}", config_path.display()))?;
    let parsed: TmConfig = toml::from_str(&content)
        .with_context(|| format!("failed to parse {}", config_path.display()))?;
    Ok(parsed)
}

pub fn default_config_toml() -> String {
    r#"[translation]
source_language = "he"
languages = ["ar"]
interwiki_prefixes = ["wikipedia", "wiktionary", "commons", "meta"]
auto_save_word_count = false
auto_set_end_date_on_word_count = false

[target_wiki]
# $1 is replaced by the target language code.
api_url = "https://$1.wikipedia.org/w/api.php"
# username and password can also come from TM_TARGET_WIKI_USER / TM_TARGET_WIKI_PASSWORD.
# Request pacing and retries (milliseconds / attempts):
# rate_limit_read_ms = 300
# rate_limit_write_ms = 1000
# max_retries = 2
# max_write_retries = 1
# retry_delay_ms = 500
"#
    .to_string()
}

fn env_override(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToString::to_string)
}

fn env_value_u64(key: &str) -> Option<u64> {
    env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
}

fn env_value_usize(key: &str) -> Option<usize> {
    env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<usize>().ok())
}

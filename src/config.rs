//! Configuration management for headline-caster.
//!
//! Loads config from YAML files in standard locations. Credentials can also
//! come from the environment (`NEWS_API_KEY`, `GEMINI_API_KEY`), which takes
//! precedence over the file.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::ConfigError;
use crate::headlines::HeadlineQuery;

pub const NEWS_API_KEY_VAR: &str = "NEWS_API_KEY";
pub const GEMINI_API_KEY_VAR: &str = "GEMINI_API_KEY";

/// Which NewsAPI endpoint the headlines come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NewsMode {
    /// `/v2/everything?q=<query>`
    Search,
    /// `/v2/top-headlines?country=<country>`
    Country,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NewsConfig {
    pub base_url: String,
    pub api_key: String,
    pub mode: NewsMode,
    pub query: String,
    pub country: String,
    pub timeout_secs: u64,
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            base_url: "https://newsapi.org".into(),
            api_key: String::new(),
            mode: NewsMode::Search,
            query: "anime".into(),
            country: "ca".into(),
            timeout_secs: 30,
        }
    }
}

impl NewsConfig {
    pub fn selection(&self) -> HeadlineQuery {
        match self.mode {
            NewsMode::Search => HeadlineQuery::Search(self.query.clone()),
            NewsMode::Country => HeadlineQuery::Country(self.country.clone()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    pub host: String,
    pub model: String,
    pub api_key: String,
    /// Number of past exchanges re-sent with each turn. 0 keeps everything.
    pub max_history_turns: usize,
    pub timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            host: "https://generativelanguage.googleapis.com".into(),
            model: "gemini-1.5-pro".into(),
            api_key: String::new(),
            max_history_turns: 20,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    pub folder: PathBuf,
    pub language: String,
    pub tts_url: String,
    pub playback: bool,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            folder: PathBuf::from("audio"),
            language: "en".into(),
            tts_url: "https://translate.google.com/translate_tts".into(),
            playback: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Titles this long or shorter (in bytes) are skipped.
    pub min_title_len: usize,
    pub delay_secs: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_title_len: 25,
            delay_secs: 2.0,
        }
    }
}

impl PipelineConfig {
    /// Pause between narrated headlines. Negative, NaN and out-of-range
    /// values are rejected.
    pub fn delay(&self) -> Result<Duration, ConfigError> {
        Duration::try_from_secs_f64(self.delay_secs).map_err(|e| ConfigError::Invalid {
            key: "pipeline.delay_secs",
            reason: format!("{} ({e})", self.delay_secs),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub news: NewsConfig,
    pub gemini: GeminiConfig,
    pub speech: SpeechConfig,
    pub pipeline: PipelineConfig,
}

/// API keys resolved from the environment and config file.
#[derive(Clone)]
pub struct Credentials {
    pub news_api_key: String,
    pub gemini_api_key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("news_api_key", &"<redacted>")
            .field("gemini_api_key", &"<redacted>")
            .finish()
    }
}

impl Config {
    /// Load configuration from YAML file.
    ///
    /// Searches standard locations if no path is provided:
    /// 1. ./config.yaml
    /// 2. ~/.config/headline-caster/config.yaml
    /// 3. /etc/headline-caster/config.yaml
    ///
    /// Falls back to defaults only when no file is found. A file that exists
    /// but cannot be read or parsed is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = path.map(PathBuf::from).or_else(|| {
            let candidates = [
                std::env::current_dir().ok().map(|d| d.join("config.yaml")),
                dirs::home_dir().map(|h| h.join(".config/headline-caster/config.yaml")),
                Some(PathBuf::from("/etc/headline-caster/config.yaml")),
            ];
            candidates.into_iter().flatten().find(|p| p.exists())
        });

        let Some(config_path) = resolved else {
            info!("No config file found, using defaults");
            return Ok(Self::default());
        };

        let contents = std::fs::read_to_string(&config_path).map_err(|source| ConfigError::Read {
            path: config_path.clone(),
            source,
        })?;
        let config = Self::from_yaml(&contents).map_err(|source| ConfigError::Parse {
            path: config_path.clone(),
            source,
        })?;
        config.validate()?;
        info!("Loaded config from {}", config_path.display());
        Ok(config)
    }

    /// Reject values that parse but cannot be used.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pipeline.delay()?;
        Ok(())
    }

    pub fn from_yaml(contents: &str) -> Result<Self, serde_yml::Error> {
        // An empty file deserializes to unit, not to an empty mapping.
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yml::from_str(contents)
    }

    /// Resolve both API keys, preferring the process environment.
    pub fn credentials(&self) -> Result<Credentials, ConfigError> {
        self.credentials_from(|name| std::env::var(name).ok())
    }

    pub fn credentials_from<F>(&self, lookup: F) -> Result<Credentials, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let pick = |env_var: &'static str, key: &'static str, configured: &str| {
            lookup(env_var)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .or_else(|| Some(configured.trim().to_string()).filter(|v| !v.is_empty()))
                .ok_or(ConfigError::MissingCredential { env_var, key })
        };

        Ok(Credentials {
            news_api_key: pick(NEWS_API_KEY_VAR, "news.api_key", &self.news.api_key)?,
            gemini_api_key: pick(GEMINI_API_KEY_VAR, "gemini.api_key", &self.gemini.api_key)?,
        })
    }
}

/// Load `.env` from the working directory into the process environment.
/// A missing file is not an error.
pub fn load_dotenv() -> Result<(), ConfigError> {
    match dotenvy::dotenv() {
        Ok(path) => {
            debug!("Loaded environment from {}", path.display());
            Ok(())
        }
        Err(e) if e.not_found() => {
            debug!("No .env file found");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

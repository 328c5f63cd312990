//! Error types for each pipeline stage.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yml::Error,
    },

    #[error("failed to load .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),

    #[error("missing credential: set {env_var} or `{key}` in config.yaml")]
    MissingCredential {
        env_var: &'static str,
        key: &'static str,
    },

    #[error("invalid value for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Error)]
pub enum HeadlineError {
    #[error("headline request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("news provider returned {status}: {message}")]
    Status {
        status: reqwest::StatusCode,
        message: String,
    },

    #[error("malformed headline payload: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum NarrationError {
    #[error("chat request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("model `{model}` returned {status}: {message}")]
    Status {
        model: String,
        status: reqwest::StatusCode,
        message: String,
    },
}

#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("speech synthesis request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("speech service returned {0}")]
    Status(reqwest::StatusCode),

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        source: rodio::decoder::DecoderError,
    },

    #[error("nothing to speak")]
    EmptyText,

    #[error("playback failed: {0}")]
    Playback(String),
}

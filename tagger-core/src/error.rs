//! Error types shared by every component of the tagger.
//!
//! Mirrors the four error kinds of the design: configuration errors (bad
//! YAML, unknown feature names, conflicting flags), I/O errors, format
//! errors in the tabular stream or persisted artifacts, and non-fatal
//! runtime warnings (logged via `tracing`, never returned as an `Err`).

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TaggerError>;

#[derive(Debug, Error)]
pub enum TaggerError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("format error: {0}")]
    Format(String),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TaggerError {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        TaggerError::Config(msg.into())
    }

    pub fn format<S: Into<String>>(msg: S) -> Self {
        TaggerError::Format(msg.into())
    }
}

//! Error types for storyteller

use std::io;
use thiserror::Error;

/// Main error type for storyteller
#[derive(Error, Debug)]
pub enum StoryError {
    #[error("Story generation failed: {0}")]
    GenerationFailed(String),

    #[error("API credential is missing (set {0})")]
    MissingCredential(String),

    #[error("Speech synthesis error: {0}")]
    Synthesis(String),

    #[error("Unknown voice: {0}")]
    InvalidVoice(String),

    #[error("Speech rate {0} out of range (0.5 - 2.0)")]
    InvalidRate(f32),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("INI parse error: {0}")]
    IniParse(String),

    #[error("History error: {0}")]
    History(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for storyteller operations
pub type Result<T> = std::result::Result<T, StoryError>;

impl From<String> for StoryError {
    fn from(s: String) -> Self {
        StoryError::Other(s)
    }
}

impl From<&str> for StoryError {
    fn from(s: &str) -> Self {
        StoryError::Other(s.to_string())
    }
}

impl From<serde_json::Error> for StoryError {
    fn from(e: serde_json::Error) -> Self {
        StoryError::History(format!("JSON error: {}", e))
    }
}

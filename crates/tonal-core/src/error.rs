//! Error types for the Tonal core crate

use thiserror::Error;

/// Errors produced while fetching, loading or running models
#[derive(Debug, Error)]
pub enum Error {
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Failed to load model: {0}")]
    ModelLoadError(String),

    /// A model required by the request was never loaded.
    #[error("{0}")]
    ModelUnavailable(String),

    #[error("Inference failed: {0}")]
    InferenceError(String),

    #[error("Tokenization failed: {0}")]
    TokenizationError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Download failed: {0}")]
    DownloadError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Tensor error: {0}")]
    Candle(#[from] candle_core::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

//! Error types for Savr

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// A required request field is missing or malformed
    #[error("{0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Missing or invalid configuration; the pipeline cannot run at all
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("OCR error: {0}")]
    Ocr(String),

    /// An external collaborator answered but the answer was unusable
    #[error("Upstream error: {0}")]
    Upstream(String),
}

impl Error {
    /// Errors the caller can fix by changing the request (HTTP 400)
    pub fn is_input_error(&self) -> bool {
        matches!(self, Error::InvalidInput(_))
    }

    /// Errors that prevent the pipeline from running at all
    pub fn is_configuration_fault(&self) -> bool {
        matches!(self, Error::Config(_) | Error::Encryption(_) | Error::Toml(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

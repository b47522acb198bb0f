//! Storj Worker Error Types

use axum::http::StatusCode;
use thiserror::Error;

/// Result type alias for Storj Worker operations
pub type Result<T> = std::result::Result<T, Error>;

/// Storj Worker error types
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    // Storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Note not found: {0}")]
    NoteNotFound(String),

    #[error("Invalid filename: {0}")]
    InvalidKey(String),

    // Network errors
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// HTTP status a handler should answer with for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::NoteNotFound(_) => StatusCode::NOT_FOUND,
            Error::InvalidKey(_) => StatusCode::BAD_REQUEST,
            Error::Api { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Check if this error came from the client side of a request
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Network(e.to_string())
    }
}

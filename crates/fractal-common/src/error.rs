//! Error types for julia-tiles services.

use thiserror::Error;

/// Result type alias using FractalError.
pub type FractalResult<T> = Result<T, FractalError>;

/// Primary error type for render requests.
#[derive(Debug, Error)]
pub enum FractalError {
    // === Request Errors ===
    #[error("Invalid parameter value for '{param}': {message}")]
    InvalidParameter { param: String, message: String },

    #[error("Malformed tile coordinate: {0}")]
    MalformedTile(String),

    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    // === Rendering Errors ===
    #[error("Image encoding failed: {0}")]
    EncodeError(String),

    // === Infrastructure Errors ===
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl FractalError {
    pub fn invalid(param: impl Into<String>, message: impl Into<String>) -> Self {
        FractalError::InvalidParameter {
            param: param.into(),
            message: message.into(),
        }
    }

    /// Get the HTTP status code for this error.
    pub fn http_status_code(&self) -> u16 {
        match self {
            FractalError::InvalidParameter { .. }
            | FractalError::MalformedTile(_)
            | FractalError::MalformedMessage(_) => 400,

            FractalError::EncodeError(_) | FractalError::Internal(_) => 500,
        }
    }
}

impl From<serde_json::Error> for FractalError {
    fn from(err: serde_json::Error) -> Self {
        FractalError::MalformedMessage(err.to_string())
    }
}

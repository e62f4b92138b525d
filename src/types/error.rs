//! Error types for the unroller service

use hyper::StatusCode;

/// Main error type for unroll operations
#[derive(Debug, thiserror::Error)]
pub enum UnrollError {
    /// The supplied document does not meet the preconditions of the
    /// selected strategy (wrong type, missing required field).
    #[error("invalid content: {0}")]
    Validation(String),

    /// A field is present but not of the expected shape.
    #[error("failed to cast field to expected type: {0}")]
    Conversion(String),

    /// No UUID-shaped substring could be found in an identifier.
    #[error("cannot extract UUID from {0}")]
    UuidExtraction(String),

    /// The body XML could not be parsed.
    #[error("cannot parse body: {0}")]
    BodyParsing(String),

    /// The downstream content store call failed.
    #[error("error connecting to content store: {0}")]
    ContentStore(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl UnrollError {
    /// Convert error to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::UuidExtraction(_) => StatusCode::BAD_REQUEST,
            Self::Conversion(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BodyParsing(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ContentStore(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<std::io::Error> for UnrollError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for UnrollError {
    fn from(err: serde_json::Error) -> Self {
        Self::BadRequest(format!("JSON error: {}", err))
    }
}

impl From<hyper::Error> for UnrollError {
    fn from(err: hyper::Error) -> Self {
        Self::Internal(format!("HTTP error: {}", err))
    }
}

impl From<reqwest::Error> for UnrollError {
    fn from(err: reqwest::Error) -> Self {
        Self::ContentStore(err.to_string())
    }
}

/// Result type alias for unroll operations
pub type Result<T> = std::result::Result<T, UnrollError>;

//! Error types for Recplay

use thiserror::Error;

/// Result type alias using Recplay Error
pub type Result<T> = std::result::Result<T, Error>;

/// Recplay error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The recording tool could not be started (missing executable,
    /// permission denied, or it died during startup).
    #[error("Failed to start recorder: {0}")]
    Spawn(String),

    #[error("Resource not found: {kind} with id {id}")]
    NotFound { kind: String, id: String },

    /// The session existed but was destroyed by a concurrent save/stop.
    #[error("Session {id} is already gone")]
    SessionGone { id: String },

    #[error("Resource already exists: {kind} with id {id}")]
    AlreadyExists { kind: String, id: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("AI upstream failed after {attempts} attempt(s): {message}")]
    Upstream { attempts: u32, message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Shorthand for a missing session
    pub fn session_not_found(id: impl Into<String>) -> Self {
        Error::NotFound {
            kind: "session".to_string(),
            id: id.into(),
        }
    }

    /// Shorthand for a missing test case
    pub fn test_not_found(id: impl Into<String>) -> Self {
        Error::NotFound {
            kind: "test".to_string(),
            id: id.into(),
        }
    }

    /// True for both an unknown id and a session destroyed underneath the caller
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. } | Error::SessionGone { .. })
    }

    /// Stable machine-readable code for API consumers
    pub fn code(&self) -> &'static str {
        match self {
            Error::Io(_) => "io_error",
            Error::Database(_) => "database_error",
            Error::Serialization(_) => "serialization_error",
            Error::Spawn(_) => "spawn_failed",
            Error::NotFound { .. } => "not_found",
            Error::SessionGone { .. } => "session_gone",
            Error::AlreadyExists { .. } => "already_exists",
            Error::InvalidConfig(_) => "config_error",
            Error::InvalidRequest(_) => "invalid_request",
            Error::Upstream { .. } => "upstream_error",
            Error::Internal(_) => "internal_error",
        }
    }
}

impl From<url::ParseError> for Error {
    fn from(e: url::ParseError) -> Self {
        Error::InvalidRequest(format!("invalid URL: {}", e))
    }
}

//! Error taxonomy of the sync engine.
//!
//! ```text
//! ApiError (transport)          SyncError (engine)
//! ────────────────────          ──────────────────
//! Connectivity ───────────────► Connectivity
//! Unauthorized ───────────────► Auth            (session ends)
//! Status / Decode ────────────► Remote
//!                               Validation      (never reaches the network)
//!                               Compile         (typesetting reported failure)
//!                               Persistence     (save failed, non-fatal)
//!                               NotSelected
//! ```

use texler_core::ValidationError;
use thiserror::Error;

/// Failure of a single remote call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// No interpretable response: connection refused, timeout, reset.
    #[error("Connectivity error: {0}")]
    Connectivity(String),
    /// HTTP 401; the credential has already been invalidated.
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Remote error {status}: {message}")]
    Status { status: u16, message: String },
    /// A response arrived but its body was not the expected shape.
    #[error("Decode error: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized)
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ApiError::Decode(e.to_string())
        } else {
            ApiError::Connectivity(e.to_string())
        }
    }
}

/// Failure reported by the typesetting service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
    /// Source line of the first diagnostic, when the service reported one
    pub line: Option<u32>,
    pub message: String,
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.line {
            Some(line) => write!(f, "line {line}: {}", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for CompileError {}

impl CompileError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            line: None,
            message: message.into(),
        }
    }

    pub fn at_line(line: u32, message: impl Into<String>) -> Self {
        Self {
            line: Some(line),
            message: message.into(),
        }
    }
}

/// Engine-level errors surfaced to callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("Connectivity error: {0}")]
    Connectivity(String),
    #[error("Not authenticated")]
    Auth,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Compile error: {0}")]
    Compile(CompileError),
    #[error("Failed to save {path}: {message}")]
    Persistence { path: String, message: String },
    #[error("Remote error {status}: {message}")]
    Remote { status: u16, message: String },
    #[error("No workspace or project selected")]
    NotSelected,
}

impl From<ApiError> for SyncError {
    fn from(e: ApiError) -> Self {
        match e {
            ApiError::Connectivity(msg) => SyncError::Connectivity(msg),
            ApiError::Unauthorized => SyncError::Auth,
            ApiError::Status { status, message } => SyncError::Remote { status, message },
            ApiError::Decode(message) => SyncError::Remote { status: 200, message },
        }
    }
}

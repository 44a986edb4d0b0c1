//! Validation errors raised synchronously by the project store.
//!
//! These never reach the network: a rejected mutation leaves the store
//! exactly as it was before the call.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("File path must not be empty")]
    EmptyPath,
    #[error("File already exists: {0}")]
    DuplicatePath(String),
    #[error("Unknown file path: {0}")]
    UnknownPath(String),
}

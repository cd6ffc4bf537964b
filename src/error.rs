//! Error types for stowage

use thiserror::Error;

/// Everything a store operation can fail with.
///
/// The first three variants are expected outcomes the HTTP layer turns
/// into client-facing statuses; `Body` and `Io` escalate as server errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("empty upload body")]
    EmptyBody,

    #[error("blob not found: {0}")]
    NotFound(String),

    #[error("path escapes store root: {0}")]
    InvalidPath(String),

    #[error("request body error: {0}")]
    Body(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

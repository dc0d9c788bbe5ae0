//! Error types for credential helper operations.

use std::time::Duration;

use thiserror::Error;

/// Errors raised while reading, writing or verifying stored credentials.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("backend {program} is unavailable: {reason}")]
    BackendUnavailable { program: String, reason: String },

    #[error("backend {operation} of {namespace}/{key} failed: {reason}")]
    BackendWrite {
        operation: &'static str,
        namespace: String,
        key: String,
        reason: String,
    },

    #[error("backend {program} printed malformed {operation} output: {source}")]
    MalformedOutput {
        program: String,
        operation: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error(
        "credentials for {server:?} in {namespace} were not observed in the backend after {waited:?}"
    )]
    VerificationTimeout {
        namespace: String,
        server: String,
        waited: Duration,
    },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result alias for credential operations.
pub type Result<T> = std::result::Result<T, CredentialError>;

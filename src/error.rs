//! Error types for convoflow.
//!
//! All errors are represented by the `FlowError` enum, with one variant per
//! failure category of the engine.

use std::io::ErrorKind;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for all convoflow operations.
#[derive(Deserialize, Serialize, Error, Debug, Clone, PartialEq)]
pub enum FlowError {
    /// Scenario definition errors: missing start node, dangling edge
    /// references, malformed node payloads. Fatal at load time.
    #[error("{0}")]
    Definition(String),

    /// User input failed a slot-filling or form validation rule.
    /// Non-fatal: the session is left untouched and the user is re-prompted.
    #[error("{0}")]
    Validation(String),

    /// An external HTTP or LLM call failed (network, non-2xx, timeout).
    #[error("{0}")]
    ExternalCall(String),

    /// The auto-advance iteration cap was exceeded.
    #[error("loop limit exceeded after {0} iterations")]
    LoopGuard(u32),

    /// Referenced session does not exist.
    #[error("session {0} not found")]
    SessionNotFound(String),

    /// Session persistence adapter errors.
    #[error("{0}")]
    Store(String),

    /// Configuration parsing or validation errors.
    #[error("{0}")]
    Config(String),

    /// Data conversion errors (JSON, path extraction).
    #[error("{0}")]
    Convert(String),

    /// Runtime execution errors.
    #[error("{0}")]
    Runtime(String),
}

impl From<FlowError> for String {
    fn from(val: FlowError) -> Self {
        val.to_string()
    }
}

impl From<std::io::Error> for FlowError {
    fn from(error: std::io::Error) -> Self {
        FlowError::Runtime(error.to_string())
    }
}

impl From<FlowError> for std::io::Error {
    fn from(val: FlowError) -> Self {
        #[allow(clippy::io_other_error)]
        std::io::Error::new(ErrorKind::Other, val.to_string())
    }
}

impl From<serde_json::Error> for FlowError {
    fn from(error: serde_json::Error) -> Self {
        FlowError::Convert(error.to_string())
    }
}

impl From<jsonschema::ValidationError<'_>> for FlowError {
    fn from(error: jsonschema::ValidationError<'_>) -> Self {
        FlowError::Definition(error.to_string())
    }
}

impl From<reqwest::Error> for FlowError {
    fn from(error: reqwest::Error) -> Self {
        FlowError::ExternalCall(error.to_string())
    }
}

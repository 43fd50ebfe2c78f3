//! Error types for Fanflow.
//!
//! All errors in Fanflow are represented by the `FanflowError` enum,
//! which provides specific variants for different error categories.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for all Fanflow operations.
///
/// Each variant represents a specific category of error that can occur
/// while building or executing a task tree. Failures that happen inside a
/// running phase are absorbed into the task's `TaskResponse` instead of
/// being raised, so these errors surface mainly from construction,
/// configuration and resolver code.
#[derive(Deserialize, Serialize, Error, Debug, Clone, PartialEq)]
pub enum FanflowError {
    /// Parameter substitution errors (missing/null context fields, unmapped tokens).
    #[error("{0}")]
    Substitution(String),

    /// Data resolver transport errors.
    #[error("{0}")]
    Resolver(String),

    /// Configuration parsing or validation errors.
    #[error("{0}")]
    Config(String),

    /// Data conversion errors (JSON, TOML, etc.).
    #[error("{0}")]
    Convert(String),

    /// I/O operation errors.
    #[error("{0}")]
    IoError(String),
}

impl From<FanflowError> for String {
    fn from(val: FanflowError) -> Self {
        val.to_string()
    }
}

impl From<std::io::Error> for FanflowError {
    fn from(error: std::io::Error) -> Self {
        FanflowError::IoError(error.to_string())
    }
}

impl From<serde_json::Error> for FanflowError {
    fn from(error: serde_json::Error) -> Self {
        FanflowError::Convert(error.to_string())
    }
}

impl From<reqwest::Error> for FanflowError {
    fn from(error: reqwest::Error) -> Self {
        FanflowError::Resolver(error.to_string())
    }
}

//! Error types for ocmgmt

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::codec::GroupConfig;
use crate::context::CancelReason;

#[derive(Debug, Error)]
pub enum OcError {
    /// IO error with the path or group it happened on
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
    /// Group file does not exist
    #[error("group {0} does not exist")]
    GroupNotFound(String),
    /// The defaults group is never removed
    #[error("default group cannot be deleted")]
    DefaultGroupProtected,
    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    /// Command exited unsuccessfully
    #[error("Command '{cmd}' failed{}: {stderr}", code_suffix(.code))]
    CommandFailed {
        cmd: String,
        code: Option<i32>,
        stderr: String,
    },
    /// Command could not be started
    #[error("Failed to start command '{cmd}': {source}")]
    CommandSpawn {
        cmd: String,
        #[source]
        source: io::Error,
    },
    /// Control tool returned JSON that does not match the expected shape
    #[error("Failed to decode output of '{cmd}': {source}")]
    Decode {
        cmd: String,
        #[source]
        source: serde_json::Error,
    },
    /// Disconnect collapses every cause into this one
    #[error("failed to disconnect user {0}")]
    DisconnectFailed(String),
    /// Context fired before the operation finished
    #[error("operation canceled or timed out: {0}")]
    Cancelled(CancelReason),
    /// Reading stopped midway; `partial` holds what was parsed so far
    #[error("Failed reading {}: {source}", .path.display())]
    PartialRead {
        path: PathBuf,
        partial: Box<GroupConfig>,
        #[source]
        source: io::Error,
    },
    /// Write-map value has the wrong shape for its key
    #[error("Invalid value for '{key}': {reason}")]
    InvalidWriteValue { key: String, reason: String },
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
    /// Background task panicked or was aborted
    #[error("Task failed: {0}")]
    TaskFailed(String),
}

impl OcError {
    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        OcError::Io {
            context: context.into(),
            source,
        }
    }

    /// True for errors produced by the context rather than the operation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, OcError::Cancelled(_))
    }
}

impl From<tokio::task::JoinError> for OcError {
    fn from(error: tokio::task::JoinError) -> Self {
        OcError::TaskFailed(error.to_string())
    }
}

fn code_suffix(code: &Option<i32>) -> String {
    code.map(|c| format!(" with code {}", c)).unwrap_or_default()
}

pub type OcResult<T> = Result<T, OcError>;

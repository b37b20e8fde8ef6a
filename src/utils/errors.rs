// src/utils/errors.rs
//! Error types for the recorder

use thiserror::Error;

/// Recorder result alias
pub type Result<T> = std::result::Result<T, RecorderError>;

/// Errors raised by the recorder
#[derive(Debug, Error)]
pub enum RecorderError {
    /// Snapshot write or rename failed. Fatal: the decision was not persisted.
    #[error("storage failed: {0}")]
    StorageFailed(String),

    /// Transport-level failure talking to a recording agent
    #[error("agent request failed: {0}")]
    AgentRequestFailed(String),

    /// Recording agent answered with a non-success status
    #[error("agent returned {status}: {body}")]
    AgentStatus { status: u16, body: String },

    /// Contest feed could not be opened or read
    #[error("feed error: {0}")]
    FeedError(String),

    /// Audit log append failed
    #[error("audit log failed: {0}")]
    AuditFailed(String),

    /// Invalid or unreadable configuration
    #[error("config error: {0}")]
    ConfigError(String),
}

impl RecorderError {
    /// Whether the error must stop event processing
    pub fn is_fatal(&self) -> bool {
        matches!(self, RecorderError::StorageFailed(_) | RecorderError::ConfigError(_))
    }
}

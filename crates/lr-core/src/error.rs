//! Error types for topology access, sinks and installation.

use thiserror::Error;

/// Errors raised by a logging topology while it is being read or mutated.
#[derive(Error, Debug)]
pub enum TopologyError {
    #[error("sink not found: {0}")]
    SinkNotFound(String),

    #[error("sink already registered: {0}")]
    DuplicateSink(String),

    #[error("sink already attached to root route: {0}")]
    DuplicateAttachment(String),

    #[error("no root attachment for sink: {0}")]
    AttachmentNotFound(String),

    #[error("sink still attached to root route: {0}")]
    SinkInUse(String),

    #[error("configuration lock poisoned")]
    LockPoisoned,

    #[error("commit failed: {0}")]
    Commit(String),
}

impl TopologyError {
    /// Stable error code for structured reporting.
    pub fn code(&self) -> u32 {
        match self {
            TopologyError::SinkNotFound(_) => 30,
            TopologyError::DuplicateSink(_) => 31,
            TopologyError::DuplicateAttachment(_) => 32,
            TopologyError::AttachmentNotFound(_) => 33,
            TopologyError::LockPoisoned => 34,
            TopologyError::Commit(_) => 35,
            TopologyError::SinkInUse(_) => 36,
        }
    }
}

/// Errors raised by a sink while starting or appending.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("sink '{0}' is not started")]
    NotStarted(String),

    #[error("write failed: {0}")]
    Write(#[from] std::io::Error),

    #[error("event rejected: {0}")]
    Rejected(String),
}

impl SinkError {
    pub fn code(&self) -> u32 {
        match self {
            SinkError::NotStarted(_) => 40,
            SinkError::Write(_) => 42,
            SinkError::Rejected(_) => 43,
        }
    }
}

/// Errors that abort an installation attempt.
#[derive(Error, Debug)]
pub enum InstallError {
    #[error("topology error: {0}")]
    Topology(#[from] TopologyError),

    #[error("sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("install panicked: {0}")]
    Panicked(String),
}

impl InstallError {
    pub fn code(&self) -> u32 {
        match self {
            InstallError::Topology(e) => e.code(),
            InstallError::Sink(e) => e.code(),
            InstallError::Panicked(_) => 50,
        }
    }
}

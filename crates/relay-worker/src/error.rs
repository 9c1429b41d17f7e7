//! Error types for the worker.
//!
//! Two disjoint classes: [`ProtocolViolation`] means the parent and worker
//! disagree about the protocol and the process must abort; [`RequestError`]
//! is an ordinary domain failure reported back as a rejection.

use std::io;

use crate::config::ConfigError;

/// Unrecoverable disagreement with the parent process.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolViolation {
    #[error("unknown method [method:{method}]")]
    UnknownMethod { method: String },

    #[error("malformed frame: {reason}")]
    MalformedFrame { reason: String },

    #[error("duplicate in-flight request id [id:{id}]")]
    DuplicateRequestId { id: u32 },

    #[error("response for a request that is not in flight [id:{id}]")]
    UnexpectedResponse { id: u32 },
}

/// Failure of a single request, sent back as `reject(code, reason)`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),
}

impl RequestError {
    pub fn bad_request(reason: impl Into<String>) -> Self {
        Self::BadRequest(reason.into())
    }

    pub fn not_found(reason: impl Into<String>) -> Self {
        Self::NotFound(reason.into())
    }

    pub fn conflict(reason: impl Into<String>) -> Self {
        Self::Conflict(reason.into())
    }

    /// HTTP-style status code used on the wire.
    pub fn code(&self) -> u16 {
        match self {
            Self::BadRequest(_) => 400,
            Self::NotFound(_) => 404,
            Self::Conflict(_) => 409,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolViolation),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl WorkerError {
    /// Whether the process must abort instead of exiting normally.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Protocol(_))
    }
}

//! Error taxonomy for analytics queries
//!
//! Every query operation returns either a success payload or one of the tagged
//! failures below. There is no opaque catch-all variant: the transport layer
//! decides retry and status-code policy from [`ErrorKind`] alone.
//!
//! An empty bucket is never an error. Statistics over zero gaps are a valid,
//! zero-count result (see [`crate::stats::GapStatistics::empty`]).

use crate::source::StreamId;
use thiserror::Error;

/// Result type used by the analytics core
pub type QueryResult<T> = std::result::Result<T, AnalyticsError>;

/// Failure of an analytics query
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalyticsError {
    /// Malformed or out-of-range caller input, reported before any data access
    #[error("invalid argument: {reason}")]
    InvalidArgument { reason: String },

    /// The referenced stream does not exist (or disappeared mid-query)
    #[error("Stream with ID {stream} not found")]
    NotFound { stream: StreamId },

    /// The underlying event-log read failed; never retried by the core
    #[error("event log read failed: {reason}")]
    DataAccess { reason: String },

    /// The host cancelled the query; no partial result is produced
    #[error("query cancelled")]
    Cancelled,
}

impl AnalyticsError {
    /// Build an `InvalidArgument` error from a human-readable reason
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }

    /// Stable tag for this failure
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::DataAccess { .. } => ErrorKind::DataAccessFailure,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }
}

/// Failure category exposed to the transport layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidArgument,
    NotFound,
    DataAccessFailure,
    Cancelled,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::InvalidArgument => "InvalidArgument",
            Self::NotFound => "NotFound",
            Self::DataAccessFailure => "DataAccessFailure",
            Self::Cancelled => "Cancelled",
        };
        f.write_str(name)
    }
}

/// Failure reported by an [`EventSource`](crate::source::EventSource)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SourceError {
    #[error("stream {0} does not exist")]
    StreamNotFound(StreamId),

    #[error("event log unavailable: {0}")]
    Unavailable(String),

    #[error("event rejected: {0}")]
    Rejected(String),
}

impl From<SourceError> for AnalyticsError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::StreamNotFound(stream) => Self::NotFound { stream },
            SourceError::Unavailable(reason) => Self::DataAccess { reason },
            SourceError::Rejected(reason) => Self::InvalidArgument { reason },
        }
    }
}

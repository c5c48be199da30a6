//! Output formatting
//!
//! Every query result is `Serialize`, so JSON output is generic. Text output
//! renders one banner-style report per result type.

pub mod json;
pub mod text;

use crate::error::{AnalyticsError, ErrorKind};
use serde::Serialize;

/// Query failure as reported to the user
#[derive(Debug, Clone, Serialize)]
pub struct ErrorReport {
    pub kind: String,
    pub message: String,
}

impl ErrorReport {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind: kind.to_string(),
            message: message.into(),
        }
    }
}

impl From<&AnalyticsError> for ErrorReport {
    fn from(err: &AnalyticsError) -> Self {
        let message = match err {
            AnalyticsError::InvalidArgument { reason } => reason.clone(),
            other => other.to_string(),
        };
        Self::new(err.kind(), message)
    }
}

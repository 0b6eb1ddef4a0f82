//! Error types for DocSage.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::capabilities::Capability;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Unsupported input: {0}")]
    UnsupportedInput(String),

    #[error("No supported documents found in {}", .0.display())]
    NoDocumentsFound(PathBuf),

    #[error("Index not found or unreadable: {0}")]
    IndexUnavailable(String),

    #[error("Index was built with different settings: {0}")]
    IndexMismatch(String),

    #[error("{capability} capability failed: {message}")]
    Capability {
        capability: Capability,
        message: String,
    },

    #[error("{capability} capability timed out after {after:?}")]
    Timeout {
        capability: Capability,
        after: Duration,
    },

    #[error("Query is empty")]
    EmptyQuery,

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification used by the transport layer to pick a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    UnsupportedInput,
    NoDocumentsFound,
    IndexUnavailable,
    CapabilityFailure,
    InvalidRequest,
    Internal,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnsupportedInput(_) => ErrorKind::UnsupportedInput,
            Self::NoDocumentsFound(_) => ErrorKind::NoDocumentsFound,
            Self::IndexUnavailable(_) | Self::IndexMismatch(_) => ErrorKind::IndexUnavailable,
            Self::Capability { .. } | Self::Timeout { .. } => ErrorKind::CapabilityFailure,
            Self::EmptyQuery | Self::Config(_) => ErrorKind::InvalidRequest,
            Self::Extraction(_)
            | Self::Storage(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Shorthand for a failed embedding or generation call.
    pub fn capability(capability: Capability, message: impl Into<String>) -> Self {
        Self::Capability {
            capability,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

//! External capabilities (embedding, generation) and their call deadlines.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};

/// An external capability the core consumes but does not implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    /// Text → fixed-dimension vector.
    Embedding,
    /// Prompt → answer text.
    Generation,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Embedding => write!(f, "embedding"),
            Self::Generation => write!(f, "generation"),
        }
    }
}

/// Run a capability call under a deadline.
///
/// An elapsed deadline becomes [`Error::Timeout`]; the call's own error is
/// passed through unchanged.
pub async fn with_timeout<T, F>(capability: Capability, after: Duration, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(after, call).await {
        Ok(result) => result,
        Err(_) => {
            warn!(%capability, timeout_ms = after.as_millis() as u64, "capability call timed out");
            Err(Error::Timeout { capability, after })
        }
    }
}

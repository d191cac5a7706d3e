use std::path::PathBuf;

use thiserror::Error;

/// Failures of a single unit of work (one call, one day, one file).
///
/// None of these cross an instrument boundary: callers turn them into a
/// logged skip or a [`crate::collect::Outcome`].
#[derive(Debug, Error)]
pub enum CollectError {
    /// Network failure or timeout before a response arrived.
    #[error("transport error calling {endpoint}: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// Non-2xx status, an API `error` object, or a body we could not decode.
    #[error("remote error from {endpoint}: {reason}")]
    Remote { endpoint: String, reason: String },

    #[error("failed to write {}: {reason}", .path.display())]
    Persistence { path: PathBuf, reason: String },

    #[error("invalid time window [{start_ms}, {end_ms})")]
    InvalidWindow { start_ms: i64, end_ms: i64 },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl CollectError {
    pub fn remote(endpoint: &str, reason: impl Into<String>) -> Self {
        CollectError::Remote {
            endpoint: endpoint.to_string(),
            reason: reason.into(),
        }
    }

    pub fn persistence(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        CollectError::Persistence {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

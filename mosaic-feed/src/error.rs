//! Loader failures.

use std::error::Error as StdError;

use thiserror::Error;

type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// A page fetch that did not produce a response.
///
/// Loaders own their retry and timeout policy. The feed only reports the
/// failure and returns to idle so the next trigger can try again.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct LoadError {
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl LoadError {
    /// Creates an error with a message only.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Wraps an underlying error, keeping it as the source.
    pub fn from_source<E>(message: impl Into<String>, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Human-readable message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<serde_json::Error> for LoadError {
    fn from(error: serde_json::Error) -> Self {
        Self::from_source("malformed page response", error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_is_kept() {
        let io = std::io::Error::other("connection reset");
        let error = LoadError::from_source("page 3 failed", io);
        assert_eq!(error.to_string(), "page 3 failed");
        assert_eq!(
            error.source().map(ToString::to_string).as_deref(),
            Some("connection reset")
        );
        assert!(LoadError::new("offline").source().is_none());
    }
}

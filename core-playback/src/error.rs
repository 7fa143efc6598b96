//! # Playback Error Types
//!
//! Errors raised while resolving queue items and scheduling media sources.
//!
//! `PlaybackError` is `Clone` because one in-flight resolution is shared by
//! every caller waiting on the same item, and each of them receives its own
//! copy of the outcome.

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Errors that can occur while scheduling playback.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    // ========================================================================
    // Resolution Errors
    // ========================================================================
    /// Metadata could not be fetched; a later attempt may succeed.
    #[error("Stream resolution failed: {0}")]
    ResolutionFailed(String),

    /// The service reports that the stream does not exist.
    #[error("Stream unavailable: {0}")]
    StreamUnavailable(String),

    /// Metadata was fetched but could not be understood.
    #[error("Stream extraction failed: {0}")]
    ExtractionFailed(String),

    /// The listener could not build a playable source from the metadata.
    #[error("No playable source for {0}")]
    NoPlayableSource(String),

    // ========================================================================
    // Queue Errors
    // ========================================================================
    /// A queue item was constructed with invalid data.
    #[error("Invalid queue item: {0}")]
    InvalidItem(String),

    /// The upstream queue source failed to produce the next page.
    #[error("Queue fetch failed: {0}")]
    QueueFetchFailed(String),

    // ========================================================================
    // Manager Errors
    // ========================================================================
    /// Configuration values are out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The manager has been disposed or has shut down.
    #[error("Media source manager is closed")]
    ManagerClosed,

    /// Internal error (should not occur in normal operation).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlaybackError {
    /// Returns `true` if this error is transient and the operation can be retried.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PlaybackError::ResolutionFailed(_) | PlaybackError::QueueFetchFailed(_)
        )
    }

    /// Returns `true` if the stream itself cannot be played, regardless of
    /// how often resolution is attempted.
    pub fn is_source_error(&self) -> bool {
        matches!(
            self,
            PlaybackError::StreamUnavailable(_)
                | PlaybackError::ExtractionFailed(_)
                | PlaybackError::NoPlayableSource(_)
        )
    }
}

impl From<BridgeError> for PlaybackError {
    fn from(error: BridgeError) -> Self {
        match error {
            BridgeError::NotFound(message) => PlaybackError::StreamUnavailable(message),
            BridgeError::Extraction(message) => PlaybackError::ExtractionFailed(message),
            BridgeError::Serialization(err) => PlaybackError::ExtractionFailed(err.to_string()),
            other => PlaybackError::ResolutionFailed(other.to_string()),
        }
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bridge_error_classification() {
        let network: PlaybackError = BridgeError::Network("connection reset".into()).into();
        assert!(network.is_transient());
        assert!(!network.is_source_error());

        let extraction: PlaybackError = BridgeError::Extraction("unexpected layout".into()).into();
        assert!(extraction.is_source_error());
        assert!(!extraction.is_transient());

        let missing: PlaybackError = BridgeError::NotFound("removed".into()).into();
        assert_eq!(missing, PlaybackError::StreamUnavailable("removed".into()));
    }

    #[test]
    fn test_error_display() {
        let err = PlaybackError::NoPlayableSource("https://example.com/watch".into());
        assert_eq!(err.to_string(), "No playable source for https://example.com/watch");
        assert_eq!(
            PlaybackError::ManagerClosed.to_string(),
            "Media source manager is closed"
        );
    }
}

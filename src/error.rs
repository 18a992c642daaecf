//! Error types for mediasheet
//!
//! This module provides the error kinds surfaced by the selection and fetch subsystem:
//! - Selection errors (capacity reached)
//! - Per-item resolution failures reported by an [`AssetResolver`](crate::resolver::AssetResolver)
//! - Configuration and serialization errors

use crate::types::MediaId;
use thiserror::Error;

/// Result type alias for mediasheet operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for mediasheet
#[derive(Debug, Error)]
pub enum Error {
    /// Toggle rejected because the selection is already at capacity
    #[error("selection limit reached: at most {limit} items can be selected")]
    LimitReached {
        /// The configured selection limit
        limit: usize,
    },

    /// A single item's image or video could not be resolved
    #[error("resolution failed: {0}")]
    ResolutionFailed(#[from] ResolutionError),

    /// The batch was superseded or explicitly stopped
    #[error("fetch cancelled")]
    Cancelled,

    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "selected_limit")
        key: Option<String>,
    },

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The coordinator was created outside of a tokio runtime
    #[error("no tokio runtime available to drive fetches")]
    NoRuntime,
}

impl Error {
    /// Returns true if this error only signals cancellation (not a real failure)
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            Error::Cancelled | Error::ResolutionFailed(ResolutionError::Cancelled { .. })
        )
    }

    pub(crate) fn config(key: &str, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }
}

/// Failure to resolve the payload of a single media item
///
/// Resolution failures are local to one item: the coordinator logs them and omits
/// the item from the batch result instead of aborting the batch.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolutionError {
    /// The underlying asset no longer exists or is inaccessible
    #[error("asset {id} is unavailable")]
    Unavailable {
        /// The item that could not be found
        id: MediaId,
    },

    /// Image data could not be produced (decode, cache or remote fetch failed)
    #[error("image for {id} could not be resolved: {reason}")]
    Image {
        /// The failing item
        id: MediaId,
        /// Resolver-provided description
        reason: String,
    },

    /// Video export or transcoding failed
    #[error("video for {id} could not be exported: {reason}")]
    Video {
        /// The failing item
        id: MediaId,
        /// Resolver-provided description
        reason: String,
    },

    /// The resolver observed the cancellation signal and stopped early
    #[error("resolution of {id} was cancelled")]
    Cancelled {
        /// The item whose resolution stopped
        id: MediaId,
    },
}

impl ResolutionError {
    /// The id of the item this failure belongs to
    pub fn id(&self) -> &MediaId {
        match self {
            ResolutionError::Unavailable { id }
            | ResolutionError::Image { id, .. }
            | ResolutionError::Video { id, .. }
            | ResolutionError::Cancelled { id } => id,
        }
    }
}

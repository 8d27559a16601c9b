//! Error types for inperson sync.

use thiserror::Error;

/// Errors that can occur while encoding or decoding sync data.
#[derive(Debug, Error)]
pub enum SyncError {
    /// JSON serialization failed
    #[error("serialization failed: {0}")]
    Serialization(#[source] serde_json::Error),

    /// JSON deserialization failed
    #[error("deserialization failed: {0}")]
    Deserialization(#[source] serde_json::Error),

    /// Payload exceeds the accepted size
    #[error("payload too large: {size} bytes (limit: {limit} bytes)")]
    PayloadTooLarge {
        /// Actual payload size.
        size: usize,
        /// Maximum accepted size.
        limit: usize,
    },
}

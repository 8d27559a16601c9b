//! Error type for coordinator operations.

use inperson_sync_types::SyncError;
use thiserror::Error;

use crate::store::StoreError;
use crate::transport::TransportError;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// A payload could not be encoded or decoded.
    #[error("payload error: {0}")]
    Payload(#[from] SyncError),

    /// The peer or its device is not known.
    #[error("unknown peer: {0}")]
    UnknownPeer(String),

    /// Transport error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Persistence error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

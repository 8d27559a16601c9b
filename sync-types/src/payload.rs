//! The sync wire payload.
//!
//! A payload is simply a JSON array of [`Event`] records, already filtered
//! for the receiving peer. Writes are whole-document: every payload carries
//! the sender's full visible event list, never a delta.

use crate::{Event, SyncError};

/// Maximum accepted payload size (1 MiB).
pub const MAX_PAYLOAD_SIZE: usize = 1024 * 1024;

/// Serialize an event list for transmission.
pub fn encode_events(events: &[Event]) -> Result<Vec<u8>, SyncError> {
    serde_json::to_vec(events).map_err(SyncError::Serialization)
}

/// Deserialize a received payload.
///
/// Oversized payloads are rejected before parsing.
pub fn decode_events(bytes: &[u8]) -> Result<Vec<Event>, SyncError> {
    if bytes.len() > MAX_PAYLOAD_SIZE {
        return Err(SyncError::PayloadTooLarge {
            size: bytes.len(),
            limit: MAX_PAYLOAD_SIZE,
        });
    }
    serde_json::from_slice(bytes).map_err(SyncError::Deserialization)
}

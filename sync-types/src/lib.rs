//! # sync-types
//!
//! Entity model and wire payload for inperson peer-to-peer event sync.
//!
//! This crate provides the value types shared by every other crate:
//! - [`Device`], [`EventId`] - Identity types
//! - [`Event`], [`ReceivedEvent`], [`Invite`], [`Publicity`] - Events and their sharing scope
//! - [`Response`], [`Attendance`], [`AttendanceCounts`] - Attendance responses
//! - [`Friend`] - A durably remembered peer
//! - [`encode_events`] / [`decode_events`] - The sync wire payload
//! - [`SyncError`] - Error types
//!
//! Every type here is an immutable value. "Mutation" produces a new value
//! with a later `last_update`.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod attendance;
mod error;
mod event;
mod friend;
mod ids;
mod payload;
mod time;

pub use attendance::{Attendance, AttendanceCounts, Response};
pub use error::SyncError;
pub use event::{Event, Invite, Publicity, ReceivedEvent};
pub use friend::{Friend, UNVERIFIED_PUBLIC_KEY};
pub use ids::{Device, EventId};
pub use payload::{decode_events, encode_events, MAX_PAYLOAD_SIZE};
pub use time::{next_update_after, Timestamp};

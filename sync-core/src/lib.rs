//! # inperson-sync-core
//!
//! Pure logic for inperson sync (no I/O, instant tests).
//!
//! This crate holds the conflict-resolution rules and the per-peer lifecycle
//! state machine without any network or disk I/O.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects. This enables:
//! - Instant unit tests (no mocks, no async)
//! - Deterministic behavior (same input → same output)
//! - Property tests over the merge algebra
//!
//! The actual I/O (transport, storage) is performed by `sync-client`, which
//! interprets the actions produced by [`PeerState::on_event`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod merge;
pub mod peer;
pub mod roster;
pub mod visibility;

pub use merge::{
    fold_into_authoritative, merge_invites, merge_responses, should_replace_received_event,
};
pub use peer::{Action, PeerEvent, PeerState, SyncEvent};
pub use roster::{response_roster, ResponseStatus, RosterEntry};
pub use visibility::{filter_visible_events, is_visible_to};

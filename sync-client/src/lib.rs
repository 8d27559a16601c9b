//! # sync-client
//!
//! Client library for inperson peer-to-peer event sync.
//!
//! This is the library applications embed: it owns the device's events and
//! friends, and keeps them in sync with friends in radio range.
//!
//! ## Features
//!
//! - **Offline-first**: every collection is persisted locally through a
//!   pluggable [`Store`]
//! - **Creator authority**: only an event's creator may change its content;
//!   everyone else contributes responses and invites
//! - **Transport abstraction**: pluggable proximity transport (loopback, mock)
//! - **Pure state machine**: uses sync-core for side-effect-free peer logic
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use inperson_sync_client::{EventStore, FileStore, FriendDirectory, LoopbackHub,
//!     ScriptedPrompter, SyncCoordinator};
//!
//! let store = Arc::new(FileStore::open("./data").await?);
//! let events = Arc::new(EventStore::open(store.clone(), "alice").await?);
//! let friends = Arc::new(FriendDirectory::open(store).await?);
//!
//! let hub = LoopbackHub::new();
//! let (transport, transport_events) = hub.join(Device::new("alice"));
//! let sync = SyncCoordinator::new(events, friends, transport, Arc::new(ScriptedPrompter::accepting()));
//!
//! sync.start().await?;
//! tokio::spawn({ let sync = sync.clone(); async move { sync.run(transport_events).await } });
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod coordinator;
pub mod diagnostics;
pub mod error;
pub mod events;
pub mod friends;
pub mod prompt;
pub mod store;
pub mod transport;

pub use coordinator::{NearbyPeer, PeerNotice, SyncCoordinator, SyncReport};
pub use diagnostics::{
    DiagnosticEvent, DiagnosticKind, Diagnostics, MetricsSnapshot, SyncMetrics,
    DEFAULT_DIAGNOSTICS_CAPACITY,
};
pub use error::ClientError;
pub use events::{
    ApplyOutcome, EventStore, StoreChange, CREATED_EVENTS_KEY, PAST_EVENTS_KEY,
    RECEIVED_EVENTS_KEY,
};
pub use friends::{FriendDirectory, FRIENDS_KEY};
pub use prompt::{Prompter, ScriptedPrompter};
pub use store::{FileStore, MemoryStore, Store, StoreError};
pub use transport::{
    InviteResponder, LoopbackHub, LoopbackTransport, MockTransport, PeerId, Transport,
    TransportError, TransportEvent,
};

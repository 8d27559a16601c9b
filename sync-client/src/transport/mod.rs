//! Transport abstraction for nearby-peer sync.
//!
//! This module provides a pluggable transport layer that abstracts the
//! radio or mesh that carries data between nearby devices.
//!
//! # Design
//!
//! Commands go through the async [`Transport`] trait:
//! - `search_for_nearby_devices()` starts advertising and browsing
//! - `initiate_connection()` invites a discovered peer
//! - `write_data()` sends one payload to a connected peer
//!
//! Everything the transport observes comes back as [`TransportEvent`]
//! values on a `tokio::sync::mpsc` channel, which the coordinator drains.
//!
//! # Example
//!
//! ```ignore
//! let hub = LoopbackHub::new();
//! let (transport, events) = hub.join(Device::new("A"));
//! transport.search_for_nearby_devices().await?;
//! coordinator.run(events).await;
//! ```

mod loopback;
mod mock;

pub use loopback::{LoopbackHub, LoopbackTransport};
pub use mock::MockTransport;

use std::fmt;

use async_trait::async_trait;
use inperson_sync_types::Device;
use thiserror::Error;
use tokio::sync::oneshot;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The peer handle is not known to the transport.
    #[error("unknown peer: {0}")]
    UnknownPeer(PeerId),

    /// Connection failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// No session with the peer.
    #[error("not connected to {0}")]
    NotConnected(PeerId),

    /// Send failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// The transport has shut down.
    #[error("transport closed")]
    Closed,
}

/// Ephemeral session handle for a nearby peer.
///
/// Assigned by the transport and only meaningful for the current session.
/// The durable identity is the [`Device`] the peer advertises.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(String);

impl PeerId {
    /// Wrap a transport-assigned handle.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The handle as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({})", self.0)
    }
}

/// Answers one inbound connection invite.
///
/// Dropping the responder without answering declines the invite.
#[derive(Debug)]
pub struct InviteResponder {
    reply: oneshot::Sender<bool>,
}

impl InviteResponder {
    /// Create a responder and the receiver the transport waits on.
    pub fn new() -> (Self, oneshot::Receiver<bool>) {
        let (reply, rx) = oneshot::channel();
        (Self { reply }, rx)
    }

    /// Accept the invite.
    pub fn accept(self) {
        self.respond(true);
    }

    /// Decline the invite.
    pub fn decline(self) {
        self.respond(false);
    }

    /// Answer the invite.
    pub fn respond(self, accepted: bool) {
        // The inviter may have given up already.
        let _ = self.reply.send(accepted);
    }
}

/// Something the transport observed.
#[derive(Debug)]
pub enum TransportEvent {
    /// A peer is advertising nearby.
    PeerDiscovered {
        /// Session handle.
        peer: PeerId,
        /// Identity the peer advertises.
        device: Device,
    },
    /// A peer stopped advertising.
    PeerLost {
        /// Session handle.
        peer: PeerId,
    },
    /// A session with the peer is established.
    PeerConnected {
        /// Session handle.
        peer: PeerId,
    },
    /// The session with the peer ended.
    PeerDisconnected {
        /// Session handle.
        peer: PeerId,
    },
    /// The peer wants to connect.
    InviteReceived {
        /// Session handle.
        peer: PeerId,
        /// Answers the invite.
        responder: InviteResponder,
    },
    /// The peer sent a payload.
    DataReceived {
        /// Session handle.
        peer: PeerId,
        /// The raw payload.
        data: Vec<u8>,
    },
}

impl TransportEvent {
    /// The peer this event concerns.
    pub fn peer(&self) -> &PeerId {
        match self {
            TransportEvent::PeerDiscovered { peer, .. }
            | TransportEvent::PeerLost { peer }
            | TransportEvent::PeerConnected { peer }
            | TransportEvent::PeerDisconnected { peer }
            | TransportEvent::InviteReceived { peer, .. }
            | TransportEvent::DataReceived { peer, .. } => peer,
        }
    }
}

/// Transport trait for reaching nearby peers.
///
/// Implementations handle the underlying radio or mesh (Bluetooth,
/// peer-to-peer Wi-Fi, in-process loopback, mock).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Start advertising this device and browsing for others.
    async fn search_for_nearby_devices(&self) -> Result<(), TransportError>;

    /// Invite `peer` to connect.
    ///
    /// Success means the invite was delivered and accepted; the session
    /// itself is reported as [`TransportEvent::PeerConnected`].
    async fn initiate_connection(&self, peer: &PeerId) -> Result<(), TransportError>;

    /// Send one payload to a connected peer.
    async fn write_data(&self, data: &[u8], peer: &PeerId) -> Result<(), TransportError>;
}

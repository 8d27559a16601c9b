//! Per-peer lifecycle state machine.
//!
//! One [`PeerState`] exists for every nearby peer the transport reports.
//! The machine takes events as input and produces a new state plus a list of
//! actions; the coordinator in sync-client performs the actual I/O (invites,
//! connection attempts, writes, prompts).
//!
//! Whether a peer is a friend is decided by the caller and passed in with
//! the event, so the machine stays free of lookups.

/// Lifecycle of one nearby peer - NO I/O, just state transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerState {
    /// Seen nearby, no connection attempt in flight.
    Discovered,
    /// A connection is being set up (we invited, or accepted their invite).
    Invited,
    /// Session established; data may flow.
    Connected,
    /// Session ended or failed.
    Disconnected,
}

impl PeerState {
    /// A freshly discovered peer.
    pub fn new() -> Self {
        Self::Discovered
    }

    /// Process an event and return the new state plus actions to execute.
    pub fn on_event(self, event: PeerEvent) -> (Self, Vec<Action>) {
        match (self, event) {
            // Discovery
            (Self::Discovered | Self::Disconnected, PeerEvent::Discovered { is_friend: true }) => {
                (Self::Invited, vec![Action::InitiateConnection])
            }
            (Self::Discovered | Self::Disconnected, PeerEvent::Discovered { is_friend: false }) => (
                Self::Discovered,
                vec![Action::EmitEvent(SyncEvent::UnknownPeerNearby)],
            ),

            // Outbound connection chosen by the user
            (Self::Discovered | Self::Disconnected, PeerEvent::ConnectRequested { is_friend }) => {
                let mut actions = vec![Action::InitiateConnection];
                if !is_friend {
                    actions.push(Action::PromptForName);
                }
                (Self::Invited, actions)
            }

            // Inbound invites
            (Self::Connected, PeerEvent::InviteReceived { .. }) => {
                (Self::Connected, vec![Action::DeclineInvite])
            }
            (_, PeerEvent::InviteReceived { is_friend: true }) => (
                Self::Invited,
                vec![Action::AcceptInvite, Action::TouchLastSeen],
            ),
            (state, PeerEvent::InviteReceived { is_friend: false }) => {
                (state, vec![Action::PromptInvite])
            }
            (Self::Connected, PeerEvent::InviteDecision { .. }) => {
                (Self::Connected, vec![Action::DeclineInvite])
            }
            (_, PeerEvent::InviteDecision { accepted: true }) => (
                Self::Invited,
                vec![Action::AcceptInvite, Action::PromptForName],
            ),
            (state, PeerEvent::InviteDecision { accepted: false }) => {
                (state, vec![Action::DeclineInvite])
            }

            // Connection lifecycle
            (Self::Connected, PeerEvent::ConnectSucceeded) => (Self::Connected, vec![]),
            (_, PeerEvent::ConnectSucceeded) => (
                Self::Connected,
                vec![
                    Action::TouchLastSeen,
                    Action::ShareEvents,
                    Action::EmitEvent(SyncEvent::Connected),
                ],
            ),
            (Self::Invited, PeerEvent::ConnectFailed { error }) => (
                Self::Disconnected,
                vec![Action::EmitEvent(SyncEvent::ConnectionFailed { error })],
            ),
            (Self::Connected | Self::Invited, PeerEvent::Disconnected { still_nearby: true }) => (
                Self::Invited,
                vec![
                    Action::EmitEvent(SyncEvent::Disconnected),
                    Action::InitiateConnection,
                ],
            ),
            (Self::Connected | Self::Invited, PeerEvent::Disconnected { still_nearby: false }) => (
                Self::Disconnected,
                vec![Action::EmitEvent(SyncEvent::Disconnected)],
            ),
            (_, PeerEvent::Lost) => (
                Self::Disconnected,
                vec![Action::EmitEvent(SyncEvent::Lost)],
            ),

            // Invalid transitions - stay in current state
            (state, _) => (state, vec![]),
        }
    }

    /// Check if a session is established.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Check if a connection is being set up.
    pub fn is_connecting(&self) -> bool {
        matches!(self, Self::Invited)
    }
}

impl Default for PeerState {
    fn default() -> Self {
        Self::new()
    }
}

/// Things that can happen to a nearby peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerEvent {
    /// The transport (re)discovered the peer.
    Discovered {
        /// Whether the advertised device is in the friend directory.
        is_friend: bool,
    },
    /// The local user asked to connect to the peer.
    ConnectRequested {
        /// Whether the advertised device is in the friend directory.
        is_friend: bool,
    },
    /// The peer invited us to connect.
    InviteReceived {
        /// Whether the advertised device is in the friend directory.
        is_friend: bool,
    },
    /// The user answered an invite prompt.
    InviteDecision {
        /// Whether the user accepted.
        accepted: bool,
    },
    /// Session established.
    ConnectSucceeded,
    /// Connection attempt failed.
    ConnectFailed {
        /// Error message describing the failure.
        error: String,
    },
    /// Session ended.
    Disconnected {
        /// Whether the peer is still being advertised nearby.
        still_nearby: bool,
    },
    /// The peer stopped advertising.
    Lost,
}

/// Actions to be executed by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Ask the transport to connect to the peer.
    InitiateConnection,
    /// Accept the pending inbound invite.
    AcceptInvite,
    /// Decline the pending inbound invite.
    DeclineInvite,
    /// Ask the user whether to accept an invite from an unknown device.
    PromptInvite,
    /// Ask the user to name the newly accepted device.
    PromptForName,
    /// Refresh the friend's `last_seen`.
    TouchLastSeen,
    /// Send the peer its visible events.
    ShareEvents,
    /// Emit an event to the application.
    EmitEvent(SyncEvent),
}

/// Events emitted to the application layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// A device that is not a friend is nearby.
    UnknownPeerNearby,
    /// Session established.
    Connected,
    /// Session ended.
    Disconnected,
    /// Connection attempt failed.
    ConnectionFailed {
        /// Error message describing the failure.
        error: String,
    },
    /// The peer is gone.
    Lost,
}

//! SyncCoordinator - the glue between transport, friends and events.
//!
//! # Architecture
//!
//! Each nearby peer has a [`PeerState`] machine (from sync-core). Transport
//! events are translated into [`PeerEvent`]s, and the returned [`Action`]s
//! are interpreted here to perform the actual I/O.
//!
//! ```text
//! Transport ──TransportEvent──▶ SyncCoordinator ──▶ EventStore / FriendDirectory
//!     ▲                              │
//!     └──── write_data / invite ─────┘
//!                  sync-core (pure state machine, merge, visibility)
//! ```
//!
//! Identity: a [`PeerId`] is a transport session handle. The coordinator
//! keeps the mapping from each handle to the [`Device`] it advertised, and
//! resolves the device id to a [`Friend`] before any data flows. Payloads
//! from devices that are not friends are dropped.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use futures_util::future::join_all;
use inperson_sync_core::{filter_visible_events, Action, PeerEvent, PeerState, SyncEvent};
use inperson_sync_types::{decode_events, encode_events, Device, Event, Friend};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::diagnostics::{DiagnosticKind, Diagnostics, SyncMetrics};
use crate::error::ClientError;
use crate::events::EventStore;
use crate::friends::FriendDirectory;
use crate::prompt::Prompter;
use crate::transport::{InviteResponder, PeerId, Transport, TransportEvent};

const NOTICE_CHANNEL_CAPACITY: usize = 64;

/// Application-facing notification about a nearby peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerNotice {
    /// Session handle.
    pub peer: PeerId,
    /// Advertised identity.
    pub device: Device,
    /// What happened.
    pub event: SyncEvent,
}

/// A nearby peer as currently tracked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NearbyPeer {
    /// Session handle.
    pub peer: PeerId,
    /// Advertised identity.
    pub device: Device,
    /// Lifecycle state.
    pub state: PeerState,
}

/// Outcome of one [`SyncCoordinator::share_with_nearby_friends`] cycle.
#[derive(Debug, Default)]
pub struct SyncReport {
    /// Peers a payload was attempted for.
    pub attempted: usize,
    /// Peers that accepted the payload.
    pub delivered: usize,
    /// Events written, summed over delivered payloads.
    pub events_sent: usize,
    /// Per-peer failures. Not retried; the next cycle catches up.
    pub failures: Vec<(PeerId, ClientError)>,
}

#[derive(Debug, Clone)]
struct PeerEntry {
    device: Device,
    state: PeerState,
    // Session-only identity for a stranger the user accepted but has not
    // named (yet). Used for outbound sharing only.
    provisional: Option<Friend>,
}

/// How a transition performs the work that may take long: a user prompt
/// or a write to the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlowWork {
    /// Finish it before returning.
    Await,
    /// Hand it to its own task. The state transition itself still happens
    /// before returning.
    Spawn,
}

/// An invite prompt handed to a background task, with the actions queued
/// behind it.
struct PendingPrompt {
    rest: VecDeque<Action>,
    responder: Option<InviteResponder>,
}

struct Inner<T> {
    events: Arc<EventStore>,
    friends: Arc<FriendDirectory>,
    transport: T,
    prompter: Arc<dyn Prompter>,
    peers: DashMap<PeerId, PeerEntry>,
    notices: broadcast::Sender<PeerNotice>,
    diagnostics: Diagnostics,
    metrics: SyncMetrics,
}

/// Drives synchronization with nearby peers.
///
/// Cheap to clone; clones share all state.
pub struct SyncCoordinator<T: Transport> {
    inner: Arc<Inner<T>>,
}

impl<T: Transport> Clone for SyncCoordinator<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Transport> std::fmt::Debug for SyncCoordinator<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncCoordinator")
            .field("local_user", &self.inner.events.local_user())
            .field("nearby", &self.inner.peers.len())
            .field("metrics", &self.inner.metrics)
            .finish_non_exhaustive()
    }
}

impl<T: Transport + 'static> SyncCoordinator<T> {
    /// Create a coordinator.
    pub fn new(
        events: Arc<EventStore>,
        friends: Arc<FriendDirectory>,
        transport: T,
        prompter: Arc<dyn Prompter>,
    ) -> Self {
        let (notices, _) = broadcast::channel(NOTICE_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                events,
                friends,
                transport,
                prompter,
                peers: DashMap::new(),
                notices,
                diagnostics: Diagnostics::new(),
                metrics: SyncMetrics::default(),
            }),
        }
    }

    /// The event store.
    pub fn events(&self) -> &Arc<EventStore> {
        &self.inner.events
    }

    /// The friend directory.
    pub fn friends(&self) -> &Arc<FriendDirectory> {
        &self.inner.friends
    }

    /// The transport.
    pub fn transport(&self) -> &T {
        &self.inner.transport
    }

    /// Recent sync activity.
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.inner.diagnostics
    }

    /// Operational counters.
    pub fn metrics(&self) -> &SyncMetrics {
        &self.inner.metrics
    }

    /// Receive a [`PeerNotice`] whenever a peer's lifecycle changes.
    pub fn subscribe(&self) -> broadcast::Receiver<PeerNotice> {
        self.inner.notices.subscribe()
    }

    /// Every tracked nearby peer, ordered by handle.
    pub fn nearby_peers(&self) -> Vec<NearbyPeer> {
        let mut peers: Vec<NearbyPeer> = self
            .inner
            .peers
            .iter()
            .map(|entry| NearbyPeer {
                peer: entry.key().clone(),
                device: entry.device.clone(),
                state: entry.state.clone(),
            })
            .collect();
        peers.sort_by(|a, b| a.peer.cmp(&b.peer));
        peers
    }

    /// Handles of peers with an established session.
    pub fn connected_peers(&self) -> Vec<PeerId> {
        self.nearby_peers()
            .into_iter()
            .filter(|p| p.state.is_connected())
            .map(|p| p.peer)
            .collect()
    }

    /// Start advertising and browsing.
    pub async fn start(&self) -> Result<(), ClientError> {
        self.inner.transport.search_for_nearby_devices().await?;
        tracing::info!("Searching for nearby devices as {}", self.inner.events.local_user());
        Ok(())
    }

    /// Consume transport events until the channel closes.
    ///
    /// Every event moves its peer's state machine in arrival order. Invite
    /// prompts and connect-time writes run on their own tasks so a slow
    /// prompt or a slow peer never stalls the loop.
    pub async fn run(&self, mut events: mpsc::UnboundedReceiver<TransportEvent>) {
        while let Some(event) = events.recv().await {
            let peer = event.peer().clone();
            if let Err(e) = self.dispatch(event, SlowWork::Spawn).await {
                tracing::warn!("Error handling event from {}: {}", peer, e);
            }
        }
        tracing::info!("Transport event stream closed");
    }

    /// Handle a single transport event to completion, prompts and writes
    /// included.
    pub async fn handle_event(&self, event: TransportEvent) -> Result<(), ClientError> {
        self.dispatch(event, SlowWork::Await).await
    }

    async fn dispatch(&self, event: TransportEvent, slow: SlowWork) -> Result<(), ClientError> {
        match event {
            TransportEvent::PeerDiscovered { peer, device } => {
                self.on_discovered(peer, device, slow).await
            }
            TransportEvent::PeerLost { peer } => {
                self.inner.diagnostics.record(&peer, DiagnosticKind::LostPeer);
                self.drive(&peer, PeerEvent::Lost, None, slow).await?;
                self.inner.peers.remove(&peer);
                Ok(())
            }
            TransportEvent::PeerConnected { peer } => {
                self.inner.diagnostics.record(&peer, DiagnosticKind::Connected);
                SyncMetrics::incr(&self.inner.metrics.connections_total);
                self.drive(&peer, PeerEvent::ConnectSucceeded, None, slow).await
            }
            TransportEvent::PeerDisconnected { peer } => {
                self.inner
                    .diagnostics
                    .record(&peer, DiagnosticKind::Disconnected);
                // Lost peers are already gone from the table.
                let still_nearby = self.inner.peers.contains_key(&peer);
                self.drive(&peer, PeerEvent::Disconnected { still_nearby }, None, slow)
                    .await
            }
            TransportEvent::InviteReceived { peer, responder } => {
                self.on_invite(peer, responder, slow).await
            }
            TransportEvent::DataReceived { peer, data } => self.receive(&peer, &data).await,
        }
    }

    /// Connect to a nearby peer the user picked, typically one surfaced by
    /// [`SyncEvent::UnknownPeerNearby`].
    ///
    /// The connection attempt itself runs in the background; a failure is
    /// reported as [`SyncEvent::ConnectionFailed`].
    pub async fn connect_to(&self, peer: &PeerId) -> Result<(), ClientError> {
        let device = self
            .device_of(peer)
            .ok_or_else(|| ClientError::UnknownPeer(peer.to_string()))?;
        let is_friend = self.is_trusted(peer, &device).await;
        self.drive(peer, PeerEvent::ConnectRequested { is_friend }, None, SlowWork::Await)
            .await
    }

    /// Send `peer` every current event it may see.
    ///
    /// Returns the number of events written.
    pub async fn share_with(&self, peer: &PeerId) -> Result<usize, ClientError> {
        let friend = self
            .recipient(peer)
            .await
            .ok_or_else(|| ClientError::UnknownPeer(peer.to_string()))?;
        let snapshot = self.inner.events.events_to_share().await;
        self.send_snapshot(peer, &friend, &snapshot).await
    }

    /// Send every connected friend its visible events.
    ///
    /// One snapshot of the event store is taken for the whole cycle; writes
    /// to different peers run concurrently.
    pub async fn share_with_nearby_friends(&self) -> SyncReport {
        let snapshot = self.inner.events.events_to_share().await;

        let mut recipients = Vec::new();
        for peer in self.connected_peers() {
            match self.recipient(&peer).await {
                Some(friend) => recipients.push((peer, friend)),
                None => tracing::debug!("Not sharing with {}: not a friend", peer),
            }
        }

        let results = join_all(
            recipients
                .iter()
                .map(|(peer, friend)| self.send_snapshot(peer, friend, &snapshot)),
        )
        .await;

        let mut report = SyncReport::default();
        for ((peer, _), result) in recipients.into_iter().zip(results) {
            report.attempted += 1;
            match result {
                Ok(count) => {
                    report.delivered += 1;
                    report.events_sent += count;
                }
                Err(e) => report.failures.push((peer, e)),
            }
        }

        tracing::info!(
            "Shared {} events with {}/{} nearby friends",
            report.events_sent,
            report.delivered,
            report.attempted
        );
        report
    }

    /// Periodically move elapsed events to the past and, if `rebroadcast`
    /// is set, share with every connected friend.
    ///
    /// A zero interval disables the task.
    pub fn spawn_housekeeping(&self, interval: Duration, rebroadcast: bool) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            if interval.is_zero() {
                tracing::info!("Housekeeping task disabled");
                return;
            }
            tracing::info!("Housekeeping task started (interval: {}s)", interval.as_secs());

            let mut timer = tokio::time::interval(interval);
            loop {
                timer.tick().await;

                match this.inner.events.advance_time().await {
                    Ok(0) => tracing::debug!("Housekeeping: no events elapsed"),
                    Ok(moved) => tracing::info!("Housekeeping: {} events are now past", moved),
                    Err(e) => tracing::error!("Housekeeping error: {}", e),
                }

                if rebroadcast && !this.connected_peers().is_empty() {
                    let report = this.share_with_nearby_friends().await;
                    for (peer, e) in &report.failures {
                        tracing::debug!("Rebroadcast to {} failed: {}", peer, e);
                    }
                }
            }
        })
    }

    async fn on_discovered(&self, peer: PeerId, device: Device, slow: SlowWork) -> Result<(), ClientError> {
        self.inner.diagnostics.record(
            &peer,
            DiagnosticKind::FoundPeer {
                device_id: device.id.clone(),
            },
        );
        tracing::debug!("Found {} advertising {}", peer, device);

        self.inner
            .peers
            .entry(peer.clone())
            .and_modify(|entry| {
                if entry.device != device {
                    entry.device = device.clone();
                    entry.provisional = None;
                }
            })
            .or_insert_with(|| PeerEntry {
                device: device.clone(),
                state: PeerState::new(),
                provisional: None,
            });

        let is_friend = self.is_trusted(&peer, &device).await;
        self.drive(&peer, PeerEvent::Discovered { is_friend }, None, slow)
            .await
    }

    async fn on_invite(
        &self,
        peer: PeerId,
        responder: InviteResponder,
        slow: SlowWork,
    ) -> Result<(), ClientError> {
        let Some(device) = self.device_of(&peer) else {
            self.inner
                .diagnostics
                .record(&peer, DiagnosticKind::InviteIgnored);
            tracing::info!("Declining invite from undiscovered peer {}", peer);
            responder.decline();
            return Ok(());
        };

        self.inner
            .diagnostics
            .record(&peer, DiagnosticKind::InviteReceived);
        let is_friend = self.is_trusted(&peer, &device).await;
        self.drive(&peer, PeerEvent::InviteReceived { is_friend }, Some(responder), slow)
            .await
    }

    async fn receive(&self, peer: &PeerId, data: &[u8]) -> Result<(), ClientError> {
        SyncMetrics::add(&self.inner.metrics.bytes_received, data.len());

        let device = match self.device_of(peer) {
            Some(device) => device,
            None => {
                self.dropped(peer, "undiscovered peer");
                return Err(ClientError::UnknownPeer(peer.to_string()));
            }
        };
        let Some(friend) = self.inner.friends.lookup(&device.id).await else {
            self.dropped(peer, "not a friend");
            return Err(ClientError::UnknownPeer(device.id));
        };
        let events = match decode_events(data) {
            Ok(events) => events,
            Err(e) => {
                self.dropped(peer, &e.to_string());
                return Err(e.into());
            }
        };

        let count = events.len();
        let outcome = self.inner.events.apply_incoming(events, &friend).await?;
        SyncMetrics::incr(&self.inner.metrics.payloads_received);
        self.inner
            .diagnostics
            .record(peer, DiagnosticKind::DataReceived { events: count });
        tracing::debug!(
            "Received {} events from {}: {} new, {} updated, {} merged",
            count,
            friend.name,
            outcome.inserted,
            outcome.replaced,
            outcome.folded
        );
        Ok(())
    }

    fn dropped(&self, peer: &PeerId, reason: &str) {
        SyncMetrics::incr(&self.inner.metrics.payloads_dropped);
        self.inner.diagnostics.record(
            peer,
            DiagnosticKind::PayloadDropped {
                reason: reason.to_string(),
            },
        );
        tracing::warn!("Dropped payload from {}: {}", peer, reason);
    }

    async fn send_snapshot(
        &self,
        peer: &PeerId,
        friend: &Friend,
        snapshot: &[Event],
    ) -> Result<usize, ClientError> {
        let visible = filter_visible_events(snapshot, friend);
        let bytes = encode_events(&visible)?;

        match self.inner.transport.write_data(&bytes, peer).await {
            Ok(()) => {
                let metrics = &self.inner.metrics;
                SyncMetrics::incr(&metrics.payloads_sent);
                SyncMetrics::add(&metrics.bytes_sent, bytes.len());
                SyncMetrics::add(&metrics.events_sent, visible.len());
                self.inner.diagnostics.record(
                    peer,
                    DiagnosticKind::DataSent {
                        events: visible.len(),
                    },
                );
                tracing::debug!("Sent {} events to {} ({} bytes)", visible.len(), friend.name, bytes.len());
                Ok(visible.len())
            }
            Err(e) => {
                SyncMetrics::incr(&self.inner.metrics.send_failures);
                tracing::warn!("Failed to send events to {}: {}", friend.name, e);
                Err(e.into())
            }
        }
    }

    /// Feed `event` to the peer's state machine and perform the resulting
    /// actions. Unknown peers are ignored, and a pending invite for one is
    /// declined.
    async fn drive(
        &self,
        peer: &PeerId,
        event: PeerEvent,
        responder: Option<InviteResponder>,
        slow: SlowWork,
    ) -> Result<(), ClientError> {
        let Some((device, actions)) = self.transition(peer, event) else {
            if let Some(responder) = responder {
                responder.decline();
            }
            return Ok(());
        };

        let pending = self.perform(peer, &device, actions.into(), responder, slow).await?;
        if let Some(mut pending) = pending {
            pending.rest.push_front(Action::PromptInvite);
            let this = self.clone();
            let peer = peer.clone();
            tokio::spawn(async move {
                let result = this
                    .perform(&peer, &device, pending.rest, pending.responder, SlowWork::Await)
                    .await;
                if let Err(e) = result {
                    tracing::warn!("Error answering invite from {}: {}", peer, e);
                }
            });
        }
        Ok(())
    }

    /// Perform `queue` in order. With [`SlowWork::Spawn`], writes go to
    /// their own tasks and an invite prompt stops the queue; the prompt and
    /// whatever follows it are returned for the caller to run.
    async fn perform(
        &self,
        peer: &PeerId,
        device: &Device,
        mut queue: VecDeque<Action>,
        mut responder: Option<InviteResponder>,
        slow: SlowWork,
    ) -> Result<Option<PendingPrompt>, ClientError> {
        let mut result = Ok(None);
        while let Some(action) = queue.pop_front() {
            match action {
                Action::InitiateConnection => self.spawn_initiate(peer.clone()),
                Action::AcceptInvite => {
                    if let Some(responder) = responder.take() {
                        tracing::debug!("Accepting invite from {}", device);
                        responder.accept();
                    }
                }
                Action::DeclineInvite => {
                    if let Some(responder) = responder.take() {
                        tracing::debug!("Declining invite from {}", device);
                        responder.decline();
                    }
                }
                Action::PromptInvite if slow == SlowWork::Spawn => {
                    return Ok(Some(PendingPrompt {
                        rest: queue,
                        responder,
                    }));
                }
                Action::PromptInvite => {
                    let accepted = self.inner.prompter.prompt_accept_invite(device).await;
                    tracing::info!(
                        "Invite from unknown device {} {}",
                        device,
                        if accepted { "accepted" } else { "declined" }
                    );
                    if let Some((_, next)) =
                        self.transition(peer, PeerEvent::InviteDecision { accepted })
                    {
                        queue.extend(next);
                    }
                }
                Action::PromptForName => {
                    self.set_provisional(peer, device);
                    if let Some(name) = self.inner.prompter.prompt_for_name(device).await {
                        self.inner.friends.add(name, device.clone()).await?;
                        if let Some(mut entry) = self.inner.peers.get_mut(peer) {
                            entry.provisional = None;
                        }
                    }
                }
                Action::TouchLastSeen => {
                    self.inner.friends.touch_last_seen(&device.id).await?;
                }
                Action::ShareEvents => match slow {
                    SlowWork::Await => {
                        if let Err(e) = self.share_on_connect(peer).await {
                            result = Err(e);
                        }
                    }
                    SlowWork::Spawn => {
                        let this = self.clone();
                        let peer = peer.clone();
                        tokio::spawn(async move {
                            if let Err(e) = this.share_on_connect(&peer).await {
                                tracing::debug!("Connect-time share with {} failed: {}", peer, e);
                            }
                        });
                    }
                },
                Action::EmitEvent(event) => self.emit(peer, device, event),
            }
        }

        if let Some(responder) = responder {
            responder.decline();
        }
        result
    }

    async fn share_on_connect(&self, peer: &PeerId) -> Result<(), ClientError> {
        match self.recipient(peer).await {
            Some(friend) => {
                let snapshot = self.inner.events.events_to_share().await;
                self.send_snapshot(peer, &friend, &snapshot).await?;
            }
            None => tracing::debug!("Not sharing with {}: not a friend", peer),
        }
        Ok(())
    }

    /// Apply `event` to the stored state. Returns the peer's device and the
    /// actions to perform, or `None` if the peer is not tracked.
    fn transition(&self, peer: &PeerId, event: PeerEvent) -> Option<(Device, Vec<Action>)> {
        let mut entry = self.inner.peers.get_mut(peer)?;
        let (state, actions) = entry.state.clone().on_event(event);
        entry.state = state;
        Some((entry.device.clone(), actions))
    }

    fn spawn_initiate(&self, peer: PeerId) {
        let this = self.clone();
        tokio::spawn(async move {
            this.initiate(&peer).await;
        });
    }

    async fn initiate(&self, peer: &PeerId) {
        self.inner.diagnostics.record(peer, DiagnosticKind::InviteSent);
        tracing::debug!("Inviting {}", peer);

        if let Err(e) = self.inner.transport.initiate_connection(peer).await {
            SyncMetrics::incr(&self.inner.metrics.connect_failures);
            let error = e.to_string();
            self.inner.diagnostics.record(
                peer,
                DiagnosticKind::ConnectFailed {
                    error: error.clone(),
                },
            );
            tracing::warn!("Connection to {} failed: {}", peer, error);

            if let Some((device, actions)) = self.transition(peer, PeerEvent::ConnectFailed { error }) {
                for action in actions {
                    if let Action::EmitEvent(event) = action {
                        self.emit(peer, &device, event);
                    }
                }
            }
        }
    }

    fn emit(&self, peer: &PeerId, device: &Device, event: SyncEvent) {
        match &event {
            SyncEvent::Connected => tracing::info!("Connected to {}", device),
            SyncEvent::Disconnected => tracing::info!("Disconnected from {}", device),
            SyncEvent::UnknownPeerNearby => tracing::info!("Unknown device {} is nearby", device),
            SyncEvent::ConnectionFailed { error } => {
                tracing::debug!("Connection to {} failed: {}", device, error)
            }
            SyncEvent::Lost => tracing::debug!("Lost {}", device),
        }
        // No subscribers is fine.
        let _ = self.inner.notices.send(PeerNotice {
            peer: peer.clone(),
            device: device.clone(),
            event,
        });
    }

    fn device_of(&self, peer: &PeerId) -> Option<Device> {
        self.inner.peers.get(peer).map(|entry| entry.device.clone())
    }

    /// Friends, and strangers accepted during this session.
    async fn is_trusted(&self, peer: &PeerId, device: &Device) -> bool {
        let provisional = self
            .inner
            .peers
            .get(peer)
            .map(|entry| entry.provisional.is_some())
            .unwrap_or(false);
        provisional || self.inner.friends.lookup(&device.id).await.is_some()
    }

    /// Who to share with: the friend record, else the provisional identity.
    async fn recipient(&self, peer: &PeerId) -> Option<Friend> {
        let (device, provisional) = {
            let entry = self.inner.peers.get(peer)?;
            (entry.device.clone(), entry.provisional.clone())
        };
        match self.inner.friends.lookup(&device.id).await {
            Some(friend) => Some(friend),
            None => provisional,
        }
    }

    fn set_provisional(&self, peer: &PeerId, device: &Device) {
        if let Some(mut entry) = self.inner.peers.get_mut(peer) {
            if entry.provisional.is_none() {
                entry.provisional = Some(Friend::new(device.id.clone(), device.clone(), Utc::now()));
            }
        }
    }
}

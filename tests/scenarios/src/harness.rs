//! Scenario harness - several in-process nodes sharing one loopback hub.
//!
//! Each [`TestNode`] is a full client stack on a [`MemoryStore`]. The
//! [`Mesh`] owns the hub, wires up friendships, starts the coordinators'
//! event loops, and collects state snapshots for the assertion helpers.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use sync_client::{
    ClientError, EventStore, FriendDirectory, LoopbackHub, LoopbackTransport, MemoryStore,
    PeerId, ScriptedPrompter, StoreError, SyncCoordinator,
};
use sync_types::{Device, Event};
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::assertions::{NodeState, TopologyState};

/// How long scenario waits allow before giving up.
pub const DEFAULT_WAIT: Duration = Duration::from_secs(5);

/// Errors that can occur while driving a scenario.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Persistence error on a node.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Coordinator error on a node.
    #[error("client error: {0}")]
    Client(#[from] ClientError),

    /// No node with that user id was added.
    #[error("no node named {0}")]
    UnknownNode(String),

    /// A condition never became true.
    #[error("timed out after {timeout:?} waiting for {what}")]
    Timeout {
        /// What was awaited.
        what: String,
        /// How long we waited.
        timeout: Duration,
    },
}

/// One complete client stack.
pub struct TestNode {
    /// The node's user id, also its advertised device id.
    pub user: String,
    /// The node's coordinator.
    pub sync: SyncCoordinator<LoopbackTransport>,
    /// Backing store, shared with the event store and directory.
    pub store: MemoryStore,
    transport_events: Option<tokio::sync::mpsc::UnboundedReceiver<sync_client::TransportEvent>>,
    run: Option<JoinHandle<()>>,
}

impl TestNode {
    /// The node's events.
    pub fn events(&self) -> &Arc<EventStore> {
        self.sync.events()
    }

    /// The node's friends.
    pub fn friends(&self) -> &Arc<FriendDirectory> {
        self.sync.friends()
    }

    /// The handle other nodes see for this one.
    pub fn peer_id(&self) -> &PeerId {
        self.sync.transport().peer_id()
    }

    /// Current and past events keyed by id.
    pub async fn state(&self) -> NodeState {
        let mut current: HashMap<_, Event> = HashMap::new();
        for event in self.events().my_current_events().await {
            current.insert(event.id, event);
        }
        for received in self.events().received_events().await {
            current.insert(received.event.id, received.event);
        }
        let past = self
            .events()
            .past_events()
            .await
            .into_iter()
            .map(|e| (e.id, e))
            .collect();

        NodeState {
            user: self.user.clone(),
            current,
            past,
        }
    }

    /// Whether the node holds `event_id` as a current event.
    pub async fn has_event(&self, event_id: sync_types::EventId) -> bool {
        self.events()
            .my_current_events()
            .await
            .iter()
            .any(|e| e.id == event_id)
            || self
                .events()
                .received_events()
                .await
                .iter()
                .any(|r| r.event.id == event_id)
    }
}

/// A set of nodes sharing one loopback hub.
#[derive(Default)]
pub struct Mesh {
    hub: LoopbackHub,
    nodes: Vec<TestNode>,
}

impl Mesh {
    /// Create an empty mesh.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node for `user` that answers prompts with `prompter`.
    ///
    /// The node is idle until [`Mesh::start`].
    pub async fn add_node(&mut self, user: &str, prompter: ScriptedPrompter) -> Result<(), HarnessError> {
        let store = MemoryStore::new();
        let backing: Arc<dyn sync_client::Store> = Arc::new(store.clone());
        let events = Arc::new(EventStore::open(backing.clone(), user).await?);
        let friends = Arc::new(FriendDirectory::open(backing).await?);
        let (transport, transport_events) = self.hub.join(Device::new(user));

        self.nodes.push(TestNode {
            user: user.to_string(),
            sync: SyncCoordinator::new(events, friends, transport, Arc::new(prompter)),
            store,
            transport_events: Some(transport_events),
            run: None,
        });
        Ok(())
    }

    /// The node for `user`.
    pub fn node(&self, user: &str) -> Result<&TestNode, HarnessError> {
        self.nodes
            .iter()
            .find(|n| n.user == user)
            .ok_or_else(|| HarnessError::UnknownNode(user.to_string()))
    }

    fn node_mut(&mut self, user: &str) -> Result<&mut TestNode, HarnessError> {
        self.nodes
            .iter_mut()
            .find(|n| n.user == user)
            .ok_or_else(|| HarnessError::UnknownNode(user.to_string()))
    }

    /// Make `a` and `b` friends of each other.
    pub async fn befriend(&self, a: &str, b: &str) -> Result<(), HarnessError> {
        self.node(a)?.friends().add(b, Device::new(b)).await?;
        self.node(b)?.friends().add(a, Device::new(a)).await?;
        Ok(())
    }

    /// Make every pair of nodes friends.
    pub async fn befriend_all(&self) -> Result<(), HarnessError> {
        let users: Vec<String> = self.nodes.iter().map(|n| n.user.clone()).collect();
        for (i, a) in users.iter().enumerate() {
            for b in &users[i + 1..] {
                self.befriend(a, b).await?;
            }
        }
        Ok(())
    }

    /// Spawn `user`'s event loop and start searching.
    pub async fn start(&mut self, user: &str) -> Result<(), HarnessError> {
        let node = self.node_mut(user)?;
        if let Some(transport_events) = node.transport_events.take() {
            let sync = node.sync.clone();
            node.run = Some(tokio::spawn(async move { sync.run(transport_events).await }));
        }
        node.sync.start().await?;
        Ok(())
    }

    /// Start every node, in the order they were added.
    pub async fn start_all(&mut self) -> Result<(), HarnessError> {
        let users: Vec<String> = self.nodes.iter().map(|n| n.user.clone()).collect();
        for user in users {
            self.start(&user).await?;
        }
        Ok(())
    }

    /// Take `user` out of range of everyone.
    pub fn leave(&mut self, user: &str) -> Result<(), HarnessError> {
        let node = self.node_mut(user)?;
        node.sync.transport().leave();
        if let Some(run) = node.run.take() {
            run.abort();
        }
        Ok(())
    }

    /// Wait until `a` and `b` both report a session with each other.
    pub async fn wait_connected(&self, a: &str, b: &str) -> Result<(), HarnessError> {
        let (na, nb) = (self.node(a)?, self.node(b)?);
        wait_until(&format!("{} <-> {} connected", a, b), DEFAULT_WAIT, || async move {
            na.sync.connected_peers().contains(nb.peer_id())
                && nb.sync.connected_peers().contains(na.peer_id())
        })
        .await
    }

    /// Wait until `user` holds `event_id` as a current event.
    pub async fn wait_for_event(
        &self,
        user: &str,
        event_id: sync_types::EventId,
    ) -> Result<(), HarnessError> {
        let node = self.node(user)?;
        wait_until(&format!("{} to hold {}", user, event_id), DEFAULT_WAIT, || async move {
            node.has_event(event_id).await
        })
        .await
    }

    /// Snapshot every node.
    pub async fn snapshot(&self) -> TopologyState {
        let mut nodes = Vec::with_capacity(self.nodes.len());
        for node in &self.nodes {
            nodes.push(node.state().await);
        }
        TopologyState { nodes }
    }
}

impl Drop for Mesh {
    fn drop(&mut self) {
        for node in &mut self.nodes {
            if let Some(run) = node.run.take() {
                run.abort();
            }
        }
    }
}

/// Poll `check` until it returns true or `timeout` elapses.
pub async fn wait_until<F, Fut>(what: &str, timeout: Duration, mut check: F) -> Result<(), HarnessError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check().await {
            return Ok(());
        }
        if tokio::time::Instant::now() >= deadline {
            tracing::warn!("Timed out waiting for {}", what);
            return Err(HarnessError::Timeout {
                what: what.to_string(),
                timeout,
            });
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

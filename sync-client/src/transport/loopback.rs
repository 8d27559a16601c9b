//! In-process transport linking several nodes through a shared hub.
//!
//! Every node that joins the hub gets its own [`LoopbackTransport`] and an
//! event receiver. Nodes that are searching discover each other, invites are
//! delivered as [`TransportEvent::InviteReceived`] and wait for the remote
//! answer, and writes become [`TransportEvent::DataReceived`] on the other
//! side. Used by the demo and the end-to-end tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use inperson_sync_types::Device;
use tokio::sync::mpsc;

use super::{InviteResponder, PeerId, Transport, TransportError, TransportEvent};

#[derive(Debug)]
struct Node {
    device: Device,
    events: mpsc::UnboundedSender<TransportEvent>,
    searching: bool,
    links: HashSet<PeerId>,
}

#[derive(Debug, Default)]
struct HubInner {
    nodes: HashMap<PeerId, Node>,
}

/// Shared medium connecting loopback transports.
#[derive(Debug, Default, Clone)]
pub struct LoopbackHub {
    inner: Arc<Mutex<HubInner>>,
    next_id: Arc<AtomicU64>,
}

impl LoopbackHub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HubInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Attach a node advertising `device`.
    ///
    /// The node is invisible to others until it starts searching.
    pub fn join(&self, device: Device) -> (LoopbackTransport, mpsc::UnboundedReceiver<TransportEvent>) {
        let id = PeerId::new(format!("peer-{}", self.next_id.fetch_add(1, Ordering::Relaxed) + 1));
        let (tx, rx) = mpsc::unbounded_channel();

        self.lock().nodes.insert(
            id.clone(),
            Node {
                device,
                events: tx,
                searching: false,
                links: HashSet::new(),
            },
        );
        tracing::debug!("Loopback node {} joined", id);

        (
            LoopbackTransport {
                hub: self.clone(),
                id,
            },
            rx,
        )
    }

    /// Number of attached nodes.
    pub fn len(&self) -> usize {
        self.lock().nodes.len()
    }

    /// Whether no node is attached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One node's view of a [`LoopbackHub`].
#[derive(Debug, Clone)]
pub struct LoopbackTransport {
    hub: LoopbackHub,
    id: PeerId,
}

impl LoopbackTransport {
    /// The handle other nodes see for this node.
    pub fn peer_id(&self) -> &PeerId {
        &self.id
    }

    /// End the session with `peer`, as if it walked out of range and back.
    pub fn disconnect(&self, peer: &PeerId) {
        let mut hub = self.hub.lock();
        let linked = hub
            .nodes
            .get_mut(&self.id)
            .map(|me| me.links.remove(peer))
            .unwrap_or(false);
        if !linked {
            return;
        }
        if let Some(other) = hub.nodes.get_mut(peer) {
            other.links.remove(&self.id);
            let _ = other.events.send(TransportEvent::PeerDisconnected {
                peer: self.id.clone(),
            });
        }
        if let Some(me) = hub.nodes.get(&self.id) {
            let _ = me.events.send(TransportEvent::PeerDisconnected { peer: peer.clone() });
        }
    }

    /// Detach from the hub. Every other node sees this one go away.
    pub fn leave(&self) {
        let mut hub = self.hub.lock();
        let Some(me) = hub.nodes.remove(&self.id) else {
            return;
        };
        for (id, other) in hub.nodes.iter_mut() {
            if me.searching && other.searching {
                let _ = other.events.send(TransportEvent::PeerLost {
                    peer: self.id.clone(),
                });
            }
            if other.links.remove(&self.id) {
                let _ = other.events.send(TransportEvent::PeerDisconnected {
                    peer: self.id.clone(),
                });
                tracing::debug!("Loopback link {} <-> {} dropped", self.id, id);
            }
        }
        tracing::debug!("Loopback node {} left", self.id);
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn search_for_nearby_devices(&self) -> Result<(), TransportError> {
        let mut hub = self.hub.lock();
        let Some(me) = hub.nodes.get_mut(&self.id) else {
            return Err(TransportError::Closed);
        };
        if me.searching {
            return Ok(());
        }
        me.searching = true;
        let my_device = me.device.clone();
        let my_events = me.events.clone();

        for (id, other) in hub.nodes.iter() {
            if *id == self.id || !other.searching {
                continue;
            }
            let _ = my_events.send(TransportEvent::PeerDiscovered {
                peer: id.clone(),
                device: other.device.clone(),
            });
            let _ = other.events.send(TransportEvent::PeerDiscovered {
                peer: self.id.clone(),
                device: my_device.clone(),
            });
        }
        Ok(())
    }

    async fn initiate_connection(&self, peer: &PeerId) -> Result<(), TransportError> {
        let (responder, answer) = InviteResponder::new();
        {
            let hub = self.hub.lock();
            if !hub.nodes.contains_key(&self.id) {
                return Err(TransportError::Closed);
            }
            let target = hub
                .nodes
                .get(peer)
                .ok_or_else(|| TransportError::UnknownPeer(peer.clone()))?;
            target
                .events
                .send(TransportEvent::InviteReceived {
                    peer: self.id.clone(),
                    responder,
                })
                .map_err(|_| TransportError::ConnectionFailed(format!("{} is gone", peer)))?;
        }

        // A dropped responder counts as a decline.
        let accepted = answer.await.unwrap_or(false);
        if !accepted {
            return Err(TransportError::ConnectionFailed(format!(
                "{} declined the invite",
                peer
            )));
        }

        let mut hub = self.hub.lock();
        if !hub.nodes.contains_key(peer) {
            return Err(TransportError::UnknownPeer(peer.clone()));
        }
        let newly_linked = match hub.nodes.get_mut(&self.id) {
            Some(me) => me.links.insert(peer.clone()),
            None => return Err(TransportError::Closed),
        };
        if let Some(other) = hub.nodes.get_mut(peer) {
            other.links.insert(self.id.clone());
        }
        if newly_linked {
            for (from, to) in [(&self.id, peer), (peer, &self.id)] {
                if let Some(node) = hub.nodes.get(to) {
                    let _ = node
                        .events
                        .send(TransportEvent::PeerConnected { peer: from.clone() });
                }
            }
        }
        Ok(())
    }

    async fn write_data(&self, data: &[u8], peer: &PeerId) -> Result<(), TransportError> {
        let hub = self.hub.lock();
        let me = hub.nodes.get(&self.id).ok_or(TransportError::Closed)?;
        if !me.links.contains(peer) {
            return Err(TransportError::NotConnected(peer.clone()));
        }
        let target = hub
            .nodes
            .get(peer)
            .ok_or_else(|| TransportError::UnknownPeer(peer.clone()))?;
        target
            .events
            .send(TransportEvent::DataReceived {
                peer: self.id.clone(),
                data: data.to_vec(),
            })
            .map_err(|_| TransportError::SendFailed(format!("{} stopped listening", peer)))
    }
}

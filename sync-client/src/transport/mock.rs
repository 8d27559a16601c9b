//! Mock transport for testing.
//!
//! Records every command and allows injecting failures.

use super::{PeerId, Transport, TransportError};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Mock transport for testing.
///
/// Clones share state, so a test can keep one handle while the coordinator
/// owns another.
#[derive(Debug, Default, Clone)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

#[derive(Debug, Default)]
struct MockTransportInner {
    searches: usize,
    connect_attempts: Vec<PeerId>,
    writes: Vec<(PeerId, Vec<u8>)>,
    unreachable: HashSet<PeerId>,
    fail_next_connect: Option<String>,
    fail_next_send: Option<String>,
}

impl MockTransport {
    /// Create a new mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockTransportInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// How many times searching was started.
    pub fn searches(&self) -> usize {
        self.lock().searches
    }

    /// Every peer a connection was attempted with, in order.
    pub fn connect_attempts(&self) -> Vec<PeerId> {
        self.lock().connect_attempts.clone()
    }

    /// Every payload written, with its destination.
    pub fn writes(&self) -> Vec<(PeerId, Vec<u8>)> {
        self.lock().writes.clone()
    }

    /// Payloads written to `peer`.
    pub fn writes_to(&self, peer: &PeerId) -> Vec<Vec<u8>> {
        self.lock()
            .writes
            .iter()
            .filter(|(to, _)| to == peer)
            .map(|(_, data)| data.clone())
            .collect()
    }

    /// Make every command addressed to `peer` fail with `NotConnected`.
    pub fn make_unreachable(&self, peer: &PeerId) {
        self.lock().unreachable.insert(peer.clone());
    }

    /// Cause the next initiate_connection() to fail with the given error.
    pub fn fail_next_connect(&self, error: &str) {
        self.lock().fail_next_connect = Some(error.to_string());
    }

    /// Cause the next write_data() to fail with the given error.
    pub fn fail_next_send(&self, error: &str) {
        self.lock().fail_next_send = Some(error.to_string());
    }

    /// Clear all recorded state.
    pub fn reset(&self) {
        *self.lock() = MockTransportInner::default();
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn search_for_nearby_devices(&self) -> Result<(), TransportError> {
        self.lock().searches += 1;
        Ok(())
    }

    async fn initiate_connection(&self, peer: &PeerId) -> Result<(), TransportError> {
        let mut inner = self.lock();
        inner.connect_attempts.push(peer.clone());

        // Check for forced failure
        if let Some(error) = inner.fail_next_connect.take() {
            return Err(TransportError::ConnectionFailed(error));
        }
        if inner.unreachable.contains(peer) {
            return Err(TransportError::NotConnected(peer.clone()));
        }
        Ok(())
    }

    async fn write_data(&self, data: &[u8], peer: &PeerId) -> Result<(), TransportError> {
        let mut inner = self.lock();

        if inner.unreachable.contains(peer) {
            return Err(TransportError::NotConnected(peer.clone()));
        }

        // Check for forced failure
        if let Some(error) = inner.fail_next_send.take() {
            return Err(TransportError::SendFailed(error));
        }

        inner.writes.push((peer.clone(), data.to_vec()));
        Ok(())
    }
}

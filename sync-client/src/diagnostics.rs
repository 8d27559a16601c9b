//! Operational counters and a rolling debug log of sync activity.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use chrono::Utc;
use inperson_sync_types::Timestamp;

use crate::transport::PeerId;

/// Entries kept by [`Diagnostics::new`].
pub const DEFAULT_DIAGNOSTICS_CAPACITY: usize = 200;

/// Operational metrics for one coordinator.
///
/// All counters are monotonic since startup.
#[derive(Debug, Default)]
pub struct SyncMetrics {
    /// Payloads successfully handed to the transport.
    pub payloads_sent: AtomicU64,
    /// Payloads received from friends and applied.
    pub payloads_received: AtomicU64,
    /// Payloads dropped (unknown sender or undecodable).
    pub payloads_dropped: AtomicU64,
    /// Total payload bytes written.
    pub bytes_sent: AtomicU64,
    /// Total payload bytes received.
    pub bytes_received: AtomicU64,
    /// Events sent, summed over all payloads.
    pub events_sent: AtomicU64,
    /// Sessions established.
    pub connections_total: AtomicU64,
    /// Connection attempts that failed.
    pub connect_failures: AtomicU64,
    /// Writes that failed.
    pub send_failures: AtomicU64,
}

impl SyncMetrics {
    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add(counter: &AtomicU64, amount: usize) {
        counter.fetch_add(amount as u64, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        MetricsSnapshot {
            payloads_sent: load(&self.payloads_sent),
            payloads_received: load(&self.payloads_received),
            payloads_dropped: load(&self.payloads_dropped),
            bytes_sent: load(&self.bytes_sent),
            bytes_received: load(&self.bytes_received),
            events_sent: load(&self.events_sent),
            connections_total: load(&self.connections_total),
            connect_failures: load(&self.connect_failures),
            send_failures: load(&self.send_failures),
        }
    }
}

/// Plain copy of [`SyncMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct MetricsSnapshot {
    pub payloads_sent: u64,
    pub payloads_received: u64,
    pub payloads_dropped: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub events_sent: u64,
    pub connections_total: u64,
    pub connect_failures: u64,
    pub send_failures: u64,
}

/// What happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// A peer advertising `device_id` came into range.
    FoundPeer {
        /// Advertised device id.
        device_id: String,
    },
    /// The peer went out of range.
    LostPeer,
    /// We invited the peer.
    InviteSent,
    /// The peer invited us.
    InviteReceived,
    /// An invite from a peer that was never discovered was declined.
    InviteIgnored,
    /// Session established.
    Connected,
    /// Session ended.
    Disconnected,
    /// Connection attempt failed.
    ConnectFailed {
        /// Transport error text.
        error: String,
    },
    /// Events were written to the peer.
    DataSent {
        /// Events in the payload.
        events: usize,
    },
    /// Events were received from the peer.
    DataReceived {
        /// Events in the payload.
        events: usize,
    },
    /// A payload from the peer was discarded.
    PayloadDropped {
        /// Why.
        reason: String,
    },
}

/// One log entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticEvent {
    /// When it happened.
    pub at: Timestamp,
    /// The peer involved.
    pub peer: PeerId,
    /// What happened.
    pub kind: DiagnosticKind,
}

/// Bounded ring of recent [`DiagnosticEvent`]s; the oldest entry is evicted
/// first.
#[derive(Debug)]
pub struct Diagnostics {
    capacity: usize,
    entries: Mutex<VecDeque<DiagnosticEvent>>,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new()
    }
}

impl Diagnostics {
    /// Keep the last [`DEFAULT_DIAGNOSTICS_CAPACITY`] entries.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_DIAGNOSTICS_CAPACITY)
    }

    /// Keep the last `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(VecDeque::with_capacity(capacity.max(1))),
        }
    }

    /// Append an entry.
    pub fn record(&self, peer: &PeerId, kind: DiagnosticKind) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(DiagnosticEvent {
            at: Utc::now(),
            peer: peer.clone(),
            kind,
        });
    }

    /// All retained entries, oldest first.
    pub fn entries(&self) -> Vec<DiagnosticEvent> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

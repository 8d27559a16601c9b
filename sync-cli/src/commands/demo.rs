//! Run two in-process nodes through a full sync session.
//!
//! Alice hosts a BBQ, Bob comes into range, receives it, answers, and
//! Alice sees the answer. Everything runs over the loopback transport on
//! in-memory stores, so the user's own data is never touched.

use anyhow::{Context, Result};
use chrono::{Duration as ChronoDuration, Utc};
use inperson_sync_client::{
    EventStore, FriendDirectory, LoopbackHub, LoopbackTransport, MemoryStore, MetricsSnapshot,
    ScriptedPrompter, Store, SyncCoordinator,
};
use inperson_sync_core::response_roster;
use inperson_sync_types::{Attendance, Device, Event, EventId, Publicity};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::config::SyncConfig;

/// What the demo observed.
#[derive(Debug)]
pub struct DemoReport {
    /// The demo event.
    pub event_id: EventId,
    /// Bob's answer as seen by Alice.
    pub answer_seen_by_host: Option<Attendance>,
    /// Alice's counters.
    pub host_metrics: MetricsSnapshot,
    /// Bob's counters.
    pub guest_metrics: MetricsSnapshot,
}

struct DemoNode {
    name: &'static str,
    sync: SyncCoordinator<LoopbackTransport>,
    tasks: Vec<JoinHandle<()>>,
}

impl DemoNode {
    async fn join(hub: &LoopbackHub, name: &'static str, user_id: &str, config: &SyncConfig) -> Result<Self> {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let events = Arc::new(EventStore::open(store.clone(), user_id).await?);
        let friends = Arc::new(FriendDirectory::open(store).await?);
        let (transport, transport_events) = hub.join(Device::new(user_id));
        let sync = SyncCoordinator::new(
            events,
            friends,
            transport,
            Arc::new(ScriptedPrompter::declining()),
        );

        let runner = sync.clone();
        let tasks = vec![
            tokio::spawn(async move { runner.run(transport_events).await }),
            sync.spawn_housekeeping(config.housekeeping_interval(), config.rebroadcast),
        ];
        Ok(Self { name, sync, tasks })
    }

    fn user_id(&self) -> &str {
        self.sync.events().local_user()
    }

    async fn find(&self, id: EventId) -> Option<Event> {
        self.sync.events().find(id).await
    }

    fn print_diagnostics(&self) {
        println!("  {}:", self.name);
        for entry in self.sync.diagnostics().entries() {
            println!("    {}  {:<10} {:?}", entry.at.format("%H:%M:%S%.3f"), entry.peer.to_string(), entry.kind);
        }
    }
}

impl Drop for DemoNode {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Poll `check` until it returns true or `timeout` elapses.
async fn wait_for<F, Fut>(what: &str, timeout: Duration, mut check: F) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    tokio::time::timeout(timeout, async {
        while !check().await {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .with_context(|| format!("Timed out after {:?} waiting for {}", timeout, what))
}

/// Run the demo.
pub async fn run(config: &SyncConfig, timeout: Duration) -> Result<DemoReport> {
    let hub = LoopbackHub::new();
    let alice = DemoNode::join(&hub, "Alice", "alice", config).await?;
    let bob = DemoNode::join(&hub, "Bob", "bob", config).await?;

    println!("1. Alice and Bob add each other as friends");
    alice.sync.friends().add("Bob", Device::new(bob.user_id())).await?;
    bob.sync.friends().add("Alice", Device::new(alice.user_id())).await?;

    println!("2. Alice creates a private BBQ and invites Bob");
    let bbq = Event::new("BBQ", Utc::now() + ChronoDuration::days(2), alice.user_id(), Publicity::Private);
    let event_id = bbq.id;
    alice.sync.events().create_event(bbq).await?;
    let bob_friend = alice
        .sync
        .friends()
        .lookup(bob.user_id())
        .await
        .context("Bob is missing from Alice's friends")?;
    alice
        .sync
        .events()
        .invite_friends(&[bob_friend], event_id)
        .await?
        .context("Alice could not invite Bob")?;

    println!("3. Both devices start searching");
    alice.sync.start().await?;
    bob.sync.start().await?;

    let guest = &bob;
    wait_for("Bob to receive the BBQ", timeout, move || async move {
        guest.find(event_id).await.is_some() && !guest.sync.connected_peers().is_empty()
    })
    .await?;
    println!("   Bob received the BBQ");

    println!("4. Bob answers Going and shares with nearby friends");
    bob.sync
        .events()
        .record_user_response(event_id, Attendance::Going)
        .await?
        .context("Bob could not answer")?;
    let report = bob.sync.share_with_nearby_friends().await;
    println!(
        "   Sent {} event(s) to {}/{} friend(s)",
        report.events_sent, report.delivered, report.attempted
    );

    let bob_id = bob.user_id().to_string();
    let (host, guest_id) = (&alice, bob_id.as_str());
    wait_for("Alice to see Bob's answer", timeout, move || async move {
        host.find(event_id)
            .await
            .is_some_and(|e| e.response_of(guest_id).is_some())
    })
    .await?;

    let event = alice
        .find(event_id)
        .await
        .context("Alice lost her own event")?;
    println!();
    println!("{} as seen by Alice:", event.title);
    let names = [(bob.user_id(), "Bob")];
    let roster = response_roster(&event, alice.user_id(), |id| {
        names
            .iter()
            .find(|(user, _)| *user == id)
            .map(|(_, name)| name.to_string())
    });
    for row in &roster {
        println!("  {:<12} {}", row.name, row.status.title());
    }

    println!();
    println!("Diagnostics:");
    alice.print_diagnostics();
    bob.print_diagnostics();

    let host_metrics = alice.sync.metrics().snapshot();
    let guest_metrics = bob.sync.metrics().snapshot();
    println!();
    println!(
        "Alice: {} payload(s) sent, {} received; Bob: {} sent, {} received",
        host_metrics.payloads_sent,
        host_metrics.payloads_received,
        guest_metrics.payloads_sent,
        guest_metrics.payloads_received
    );

    Ok(DemoReport {
        event_id,
        answer_seen_by_host: event.response_of(&bob_id).map(|r| r.attendance),
        host_metrics,
        guest_metrics,
    })
}

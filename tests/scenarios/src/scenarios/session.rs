//! Session scenarios (SESS-*).
//!
//! Sessions drop and come back while peers stay in range; peers that leave
//! are forgotten; housekeeping keeps friends up to date without an explicit
//! share.

#[cfg(test)]
mod tests {
    use std::time::Duration as StdDuration;

    use chrono::{Duration, Utc};
    use sync_client::ScriptedPrompter;
    use sync_core::SyncEvent;
    use sync_types::{Event, Publicity};

    use crate::harness::{wait_until, Mesh, DEFAULT_WAIT};

    fn bbq(creator: &str) -> Event {
        Event::new("BBQ", Utc::now() + Duration::days(1), creator, Publicity::AutoShare)
    }

    async fn connected_pair() -> Mesh {
        let mut mesh = Mesh::new();
        mesh.add_node("A", ScriptedPrompter::declining()).await.unwrap();
        mesh.add_node("B", ScriptedPrompter::declining()).await.unwrap();
        mesh.befriend("A", "B").await.unwrap();
        mesh.start_all().await.unwrap();
        mesh.wait_connected("A", "B").await.unwrap();
        mesh
    }

    /// SESS-01: A dropped session between nearby friends is re-established
    /// and sharing resumes.
    #[tokio::test]
    async fn sess_01_reconnects_while_nearby() {
        let mesh = connected_pair().await;
        let (a, b) = (mesh.node("A").unwrap(), mesh.node("B").unwrap());
        let connections = a.sync.metrics().snapshot().connections_total;

        a.sync.transport().disconnect(b.peer_id());

        wait_until("A to reconnect", DEFAULT_WAIT, || async move {
            a.sync.metrics().snapshot().connections_total > connections
        })
        .await
        .unwrap();
        mesh.wait_connected("A", "B").await.unwrap();

        let event = bbq("A");
        a.events().create_event(event.clone()).await.unwrap();
        let report = a.sync.share_with_nearby_friends().await;
        assert_eq!(report.delivered, 1);
        mesh.wait_for_event("B", event.id).await.unwrap();
    }

    /// SESS-02: A peer that leaves is reported lost and dropped from the
    /// nearby table.
    #[tokio::test]
    async fn sess_02_lost_peer_is_forgotten() {
        let mut mesh = connected_pair().await;
        let mut notices = mesh.node("A").unwrap().sync.subscribe();

        mesh.leave("B").unwrap();

        let a = mesh.node("A").unwrap();
        wait_until("A to forget B", DEFAULT_WAIT, || async move {
            a.sync.nearby_peers().is_empty()
        })
        .await
        .unwrap();

        let mut seen = Vec::new();
        while let Ok(notice) = notices.try_recv() {
            seen.push(notice.event);
        }
        assert!(seen.contains(&SyncEvent::Lost));
        // B is gone, but stays a friend.
        assert!(a.friends().lookup("B").await.is_some());
    }

    /// SESS-03: Housekeeping rebroadcasts new events to connected friends.
    #[tokio::test]
    async fn sess_03_housekeeping_rebroadcasts() {
        let mesh = connected_pair().await;
        let a = mesh.node("A").unwrap();
        let housekeeping = a.sync.spawn_housekeeping(StdDuration::from_millis(20), true);

        let event = bbq("A");
        a.events().create_event(event.clone()).await.unwrap();
        mesh.wait_for_event("B", event.id).await.unwrap();

        housekeeping.abort();
    }

    /// SESS-04: A friend's last-seen time moves forward when it connects.
    #[tokio::test]
    async fn sess_04_connecting_touches_last_seen() {
        let mut mesh = Mesh::new();
        mesh.add_node("A", ScriptedPrompter::declining()).await.unwrap();
        mesh.add_node("B", ScriptedPrompter::declining()).await.unwrap();
        mesh.befriend("A", "B").await.unwrap();
        let added = mesh
            .node("A")
            .unwrap()
            .friends()
            .lookup("B")
            .await
            .unwrap()
            .last_seen;

        tokio::time::sleep(StdDuration::from_millis(5)).await;
        mesh.start_all().await.unwrap();
        mesh.wait_connected("A", "B").await.unwrap();

        let a = mesh.node("A").unwrap();
        wait_until("A to touch B", DEFAULT_WAIT, || async move {
            a.friends()
                .lookup("B")
                .await
                .is_some_and(|f| f.last_seen > added)
        })
        .await
        .unwrap();
    }
}

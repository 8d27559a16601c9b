//! Convergence scenarios (CONV-*).
//!
//! Friends exchange events on connect and on every share cycle; these check
//! that all holders of an event end up agreeing on its responses.

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use sync_client::ScriptedPrompter;
    use sync_types::{Attendance, Event, Publicity};

    use crate::assertions::{
        assert_creator_content_intact, assert_event_present, assert_responses_converged,
    };
    use crate::harness::{wait_until, Mesh, DEFAULT_WAIT};

    fn bbq(creator: &str) -> Event {
        Event::new("BBQ", Utc::now() + Duration::days(1), creator, Publicity::AutoShare)
    }

    async fn mesh_of(users: &[&str]) -> Mesh {
        let mut mesh = Mesh::new();
        for user in users {
            mesh.add_node(user, ScriptedPrompter::declining()).await.unwrap();
        }
        mesh
    }

    /// CONV-01: A creates a BBQ, B responds Maybe, both converge.
    #[tokio::test]
    async fn conv_01_two_friends_bbq() {
        let mut mesh = mesh_of(&["A", "B"]).await;
        mesh.befriend("A", "B").await.unwrap();
        let event = bbq("A");
        let id = event.id;
        mesh.node("A").unwrap().events().create_event(event.clone()).await.unwrap();

        mesh.start_all().await.unwrap();
        mesh.wait_connected("A", "B").await.unwrap();
        mesh.wait_for_event("B", id).await.unwrap();

        let (a, b) = (mesh.node("A").unwrap(), mesh.node("B").unwrap());
        let received = b.events().received_events().await;
        assert_eq!(received[0].sender.name, "A");

        b.events()
            .record_user_response(id, Attendance::Maybe)
            .await
            .unwrap();
        b.sync.share_with_nearby_friends().await;

        wait_until("A to fold in B's response", DEFAULT_WAIT, || async move {
            a.events()
                .find(id)
                .await
                .and_then(|e| e.response_of("B").map(|r| r.attendance))
                == Some(Attendance::Maybe)
        })
        .await
        .unwrap();

        // A's folded copy is newer, so B replaces its own with it.
        a.sync.share_with_nearby_friends().await;
        wait_until("B to hold A's copy", DEFAULT_WAIT, || async move {
            b.events().find(id).await == a.events().find(id).await
        })
        .await
        .unwrap();

        let topology = mesh.snapshot().await;
        assert!(assert_responses_converged(&topology, id).passed);
        assert!(assert_creator_content_intact(&topology, &event).passed);
    }

    /// CONV-02: Delivering the same payload twice changes nothing.
    #[tokio::test]
    async fn conv_02_duplicate_delivery_is_idempotent() {
        let mut mesh = mesh_of(&["A", "B"]).await;
        mesh.befriend("A", "B").await.unwrap();
        let id = {
            let event = bbq("A");
            let id = event.id;
            mesh.node("A").unwrap().events().create_event(event).await.unwrap();
            id
        };

        mesh.start_all().await.unwrap();
        mesh.wait_connected("A", "B").await.unwrap();
        mesh.wait_for_event("B", id).await.unwrap();

        let (a, b) = (mesh.node("A").unwrap(), mesh.node("B").unwrap());
        // Let B's connect-time payload land first.
        wait_until("A to hear from B", DEFAULT_WAIT, || async move {
            a.sync.metrics().snapshot().payloads_received >= 1
        })
        .await
        .unwrap();

        b.events()
            .record_user_response(id, Attendance::Going)
            .await
            .unwrap();
        b.sync.share_with_nearby_friends().await;
        wait_until("A to fold in B's response", DEFAULT_WAIT, || async move {
            a.events()
                .find(id)
                .await
                .is_some_and(|e| e.response_of("B").is_some())
        })
        .await
        .unwrap();
        let after_first = a.events().find(id).await;
        let received = a.sync.metrics().snapshot().payloads_received;

        b.sync.share_with_nearby_friends().await;
        wait_until("A to receive the duplicate", DEFAULT_WAIT, || async move {
            a.sync.metrics().snapshot().payloads_received > received
        })
        .await
        .unwrap();

        assert_eq!(a.events().find(id).await, after_first);
    }

    /// CONV-03: Responses travel back to the creator through a mutual friend.
    #[tokio::test]
    async fn conv_03_response_relayed_through_mutual_friend() {
        let mut mesh = mesh_of(&["A", "B", "C"]).await;
        mesh.befriend("A", "B").await.unwrap();
        mesh.befriend("B", "C").await.unwrap();
        let event = bbq("A");
        let id = event.id;
        mesh.node("A").unwrap().events().create_event(event.clone()).await.unwrap();

        mesh.start_all().await.unwrap();
        mesh.wait_for_event("B", id).await.unwrap();
        mesh.wait_connected("B", "C").await.unwrap();

        let (a, b, c) = (
            mesh.node("A").unwrap(),
            mesh.node("B").unwrap(),
            mesh.node("C").unwrap(),
        );
        b.sync.share_with_nearby_friends().await;
        mesh.wait_for_event("C", id).await.unwrap();

        c.events()
            .record_user_response(id, Attendance::Going)
            .await
            .unwrap();
        c.sync.share_with_nearby_friends().await;
        wait_until("B to take C's newer copy", DEFAULT_WAIT, || async move {
            b.events()
                .find(id)
                .await
                .is_some_and(|e| e.response_of("C").is_some())
        })
        .await
        .unwrap();

        b.sync.share_with_nearby_friends().await;
        wait_until("A to fold in C's response", DEFAULT_WAIT, || async move {
            a.events()
                .find(id)
                .await
                .and_then(|e| e.response_of("C").map(|r| r.attendance))
                == Some(Attendance::Going)
        })
        .await
        .unwrap();

        // A never befriended C.
        assert!(a.friends().lookup("C").await.is_none());
        let topology = mesh.snapshot().await;
        assert!(assert_creator_content_intact(&topology, &event).passed);
    }

    /// CONV-04: Five mutual friends each end up holding everyone's event.
    #[tokio::test]
    async fn conv_04_five_friends_converge() {
        let users = ["A", "B", "C", "D", "E"];
        let mut mesh = mesh_of(&users).await;
        mesh.befriend_all().await.unwrap();

        let mut ids = Vec::new();
        for user in users {
            let event = bbq(user);
            ids.push(event.id);
            mesh.node(user).unwrap().events().create_event(event).await.unwrap();
        }

        mesh.start_all().await.unwrap();

        for user in users {
            for id in &ids {
                mesh.wait_for_event(user, *id).await.unwrap();
            }
        }

        let topology = mesh.snapshot().await;
        for node in &topology.nodes {
            for id in &ids {
                assert!(assert_event_present(node, *id).passed);
            }
        }
    }
}

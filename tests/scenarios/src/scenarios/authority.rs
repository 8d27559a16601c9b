//! Authority scenarios (AUTH-*).
//!
//! Forged or stale copies arriving over the wire: only the creator decides
//! an event's content, past events are frozen, and strangers cannot push.

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use sync_client::{ScriptedPrompter, Transport};
    use sync_types::{encode_events, Attendance, Event, Publicity, Response};

    use crate::assertions::assert_creator_content_intact;
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

        // Both connect-time payloads have landed before a scenario starts.
        for user in ["A", "B"] {
            let node = mesh.node(user).unwrap();
            wait_until("connect-time payload", DEFAULT_WAIT, || async move {
                node.sync.metrics().snapshot().payloads_received >= 1
            })
            .await
            .unwrap();
        }
        mesh
    }

    /// AUTH-01: A friend's edited title never overwrites the creator's copy,
    /// but the response riding along is merged.
    #[tokio::test]
    async fn auth_01_forged_title_is_ignored() {
        let mesh = connected_pair().await;
        let (a, b) = (mesh.node("A").unwrap(), mesh.node("B").unwrap());
        let event = bbq("A");
        let id = event.id;
        a.events().create_event(event.clone()).await.unwrap();

        let forged = Event {
            title: "Cancelled".into(),
            last_update: Utc::now() + Duration::hours(1),
            responses: vec![Response::new("B", Attendance::Going, Utc::now())],
            ..event.clone()
        };
        b.sync
            .transport()
            .write_data(&encode_events(&[forged]).unwrap(), a.peer_id())
            .await
            .unwrap();

        wait_until("A to fold in B's response", DEFAULT_WAIT, || async move {
            a.events()
                .find(id)
                .await
                .is_some_and(|e| e.response_of("B").is_some())
        })
        .await
        .unwrap();

        let local = a.events().find(id).await.unwrap();
        assert_eq!(local.title, "BBQ");
        assert!(assert_creator_content_intact(&mesh.snapshot().await, &event).passed);
    }

    /// AUTH-02: A copy that claims a different creator is rejected by
    /// holders of the real event.
    #[tokio::test]
    async fn auth_02_creator_cannot_be_reassigned() {
        let mesh = connected_pair().await;
        let (a, b) = (mesh.node("A").unwrap(), mesh.node("B").unwrap());
        let event = bbq("B");
        let id = event.id;
        b.events().create_event(event.clone()).await.unwrap();
        b.sync.share_with_nearby_friends().await;
        mesh.wait_for_event("A", id).await.unwrap();

        let before = a.sync.metrics().snapshot().payloads_received;
        let hijacked = Event {
            creator_id: "A".into(),
            title: "Mine now".into(),
            last_update: Utc::now() + Duration::hours(1),
            ..event.clone()
        };
        b.sync
            .transport()
            .write_data(&encode_events(&[hijacked]).unwrap(), a.peer_id())
            .await
            .unwrap();
        wait_until("A to process the copy", DEFAULT_WAIT, || async move {
            a.sync.metrics().snapshot().payloads_received > before
        })
        .await
        .unwrap();

        let received = a.events().received_events().await;
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].event.creator_id, "B");
        assert_eq!(received[0].event.title, "BBQ");
    }

    /// AUTH-03: Past events ignore anything that arrives later.
    #[tokio::test]
    async fn auth_03_past_event_is_frozen() {
        let mesh = connected_pair().await;
        let (a, b) = (mesh.node("A").unwrap(), mesh.node("B").unwrap());
        let yesterday = Event::new(
            "Yesterday's BBQ",
            Utc::now() - Duration::days(1),
            "A",
            Publicity::AutoShare,
        );
        a.events().create_event(yesterday.clone()).await.unwrap();
        let frozen = a.events().past_events().await;
        assert_eq!(frozen.len(), 1);

        let before = a.sync.metrics().snapshot().payloads_received;
        let late = yesterday.updating_responses(vec![Response::new(
            "B",
            Attendance::Going,
            Utc::now(),
        )]);
        b.sync
            .transport()
            .write_data(&encode_events(&[late]).unwrap(), a.peer_id())
            .await
            .unwrap();
        wait_until("A to process the copy", DEFAULT_WAIT, || async move {
            a.sync.metrics().snapshot().payloads_received > before
        })
        .await
        .unwrap();

        assert_eq!(a.events().past_events().await, frozen);
        assert!(a.events().my_current_events().await.is_empty());
        assert!(a.events().received_events().await.is_empty());
    }

    /// AUTH-04: Once a friend is forgotten, its payloads are dropped.
    #[tokio::test]
    async fn auth_04_forgotten_friend_is_dropped() {
        let mesh = connected_pair().await;
        let (a, b) = (mesh.node("A").unwrap(), mesh.node("B").unwrap());
        a.friends().clear().await.unwrap();

        let event = bbq("B");
        b.events().create_event(event.clone()).await.unwrap();
        b.sync.share_with_nearby_friends().await;

        wait_until("A to drop B's payload", DEFAULT_WAIT, || async move {
            a.sync.metrics().snapshot().payloads_dropped >= 1
        })
        .await
        .unwrap();
        assert!(a.events().find(event.id).await.is_none());
    }

    /// AUTH-05: A stranger whose invite is declined never gets a session.
    #[tokio::test]
    async fn auth_05_declined_stranger_cannot_push() {
        let prompter = ScriptedPrompter::declining();
        let mut mesh = Mesh::new();
        mesh.add_node("A", prompter.clone()).await.unwrap();
        mesh.add_node("Z", ScriptedPrompter::declining()).await.unwrap();
        // One-sided: Z knows A, A has never heard of Z.
        mesh.node("Z")
            .unwrap()
            .friends()
            .add("A", sync_types::Device::new("A"))
            .await
            .unwrap();
        mesh.start_all().await.unwrap();

        let (a, z) = (mesh.node("A").unwrap(), mesh.node("Z").unwrap());
        wait_until("Z's invite to be declined", DEFAULT_WAIT, || async move {
            z.sync.metrics().snapshot().connect_failures >= 1
        })
        .await
        .unwrap();
        assert_eq!(prompter.asked(), vec!["Z"]);

        let result = z
            .sync
            .transport()
            .write_data(&encode_events(&[bbq("Z")]).unwrap(), a.peer_id())
            .await;
        assert!(result.is_err());
        assert!(a.events().received_events().await.is_empty());
        assert!(a.friends().list().await.is_empty());
    }
}

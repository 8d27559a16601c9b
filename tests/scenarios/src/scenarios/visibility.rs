//! Visibility scenarios (VIS-*).
//!
//! Private and CanInvite events may only reach their creator and invitees,
//! no matter who relays them.

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use sync_client::ScriptedPrompter;
    use sync_types::{Event, Publicity};

    use crate::assertions::{assert_event_absent, assert_event_present};
    use crate::harness::Mesh;

    fn event(title: &str, creator: &str, publicity: Publicity) -> Event {
        Event::new(title, Utc::now() + Duration::days(1), creator, publicity)
    }

    async fn triangle() -> Mesh {
        let mut mesh = Mesh::new();
        for user in ["A", "B", "C"] {
            mesh.add_node(user, ScriptedPrompter::declining()).await.unwrap();
        }
        mesh.befriend_all().await.unwrap();
        mesh
    }

    /// VIS-01: A private event reaches its invitee and nobody else, even
    /// when the invitee shares onwards.
    #[tokio::test]
    async fn vis_01_private_event_stays_with_invitees() {
        let mut mesh = triangle().await;
        let a = mesh.node("A").unwrap();
        let private = event("Surprise party", "A", Publicity::Private);
        let marker = event("Picnic", "A", Publicity::AutoShare);
        a.events().create_event(private.clone()).await.unwrap();
        a.events().create_event(marker.clone()).await.unwrap();
        let c_friend = a.friends().lookup("C").await.unwrap();
        a.events()
            .invite_friends(&[c_friend], private.id)
            .await
            .unwrap()
            .unwrap();

        mesh.start_all().await.unwrap();
        mesh.wait_for_event("C", private.id).await.unwrap();
        // The marker rides in the same payload as the private event would.
        mesh.wait_for_event("B", marker.id).await.unwrap();

        // C relays its whole store; B must still not see the private event.
        let c_marker = event("Coffee", "C", Publicity::AutoShare);
        let c = mesh.node("C").unwrap();
        c.events().create_event(c_marker.clone()).await.unwrap();
        mesh.wait_connected("B", "C").await.unwrap();
        c.sync.share_with_nearby_friends().await;
        mesh.wait_for_event("B", c_marker.id).await.unwrap();

        let topology = mesh.snapshot().await;
        let state = |user: &str| topology.nodes.iter().find(|n| n.user == user).unwrap();
        assert!(assert_event_present(state("A"), private.id).passed);
        assert!(assert_event_present(state("C"), private.id).passed);
        assert!(assert_event_absent(state("B"), private.id).passed);
    }

    /// VIS-02: An invitee of a CanInvite event may widen the audience.
    #[tokio::test]
    async fn vis_02_can_invite_widens_audience() {
        let mut mesh = triangle().await;
        let a = mesh.node("A").unwrap();
        let open = event("Board games", "A", Publicity::CanInvite);
        a.events().create_event(open.clone()).await.unwrap();
        let b_friend = a.friends().lookup("B").await.unwrap();
        a.events()
            .invite_friends(&[b_friend], open.id)
            .await
            .unwrap()
            .unwrap();

        mesh.start_all().await.unwrap();
        mesh.wait_for_event("B", open.id).await.unwrap();

        let b = mesh.node("B").unwrap();
        let c_friend = b.friends().lookup("C").await.unwrap();
        let widened = b
            .events()
            .invite_friends(&[c_friend], open.id)
            .await
            .unwrap()
            .unwrap();
        assert!(widened.user_is_invited("C"));

        mesh.wait_connected("B", "C").await.unwrap();
        b.sync.share_with_nearby_friends().await;
        mesh.wait_for_event("C", open.id).await.unwrap();
    }

    /// VIS-03: Only the creator may invite to a private event.
    #[tokio::test]
    async fn vis_03_invitee_cannot_invite_to_private() {
        let mut mesh = triangle().await;
        let a = mesh.node("A").unwrap();
        let private = event("Dinner", "A", Publicity::Private);
        a.events().create_event(private.clone()).await.unwrap();
        let b_friend = a.friends().lookup("B").await.unwrap();
        a.events()
            .invite_friends(&[b_friend], private.id)
            .await
            .unwrap()
            .unwrap();

        mesh.start_all().await.unwrap();
        mesh.wait_for_event("B", private.id).await.unwrap();

        let b = mesh.node("B").unwrap();
        let c_friend = b.friends().lookup("C").await.unwrap();
        let result = b.events().invite_friends(&[c_friend], private.id).await.unwrap();
        assert!(result.is_none());

        let copy = b.events().find(private.id).await.unwrap();
        assert!(!copy.user_is_invited("C"));
    }
}

//! Invite friends to an event.

use anyhow::{Context, Result};
use inperson_sync_types::{Event, Friend};
use std::path::Path;

use super::Node;

/// Run the invite command. `friend_ids` are user ids or friend names.
pub async fn run(data_dir: &Path, event_prefix: &str, friend_ids: &[String]) -> Result<Event> {
    let node = Node::open(data_dir).await?;
    let event = node.resolve_event(event_prefix).await?;

    let known = node.friends.list().await;
    let mut invitees: Vec<Friend> = Vec::with_capacity(friend_ids.len());
    for wanted in friend_ids {
        let friend = known
            .iter()
            .find(|f| f.device.id == *wanted || f.name == *wanted)
            .with_context(|| format!("'{}' is not a friend. Add them with 'inperson friends add'.", wanted))?;
        invitees.push(friend.clone());
    }

    let updated = node
        .events
        .invite_friends(&invitees, event.id)
        .await
        .context("Failed to save invites")?
        .with_context(|| {
            format!(
                "Cannot invite to '{}': it is past, or only its host may invite",
                event.title
            )
        })?;

    let names: Vec<&str> = invitees.iter().map(|f| f.name.as_str()).collect();
    println!("Invited {} to {}", names.join(", "), updated.title);
    Ok(updated)
}

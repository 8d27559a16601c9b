//! Record the local user's answer to an event.

use anyhow::{Context, Result};
use inperson_sync_types::{Attendance, Event};
use std::path::Path;

use super::{short_id, Node};

/// Run the respond command.
pub async fn run(data_dir: &Path, event_prefix: &str, attendance: Attendance) -> Result<Event> {
    let node = Node::open(data_dir).await?;
    let event = node.resolve_event(event_prefix).await?;

    let updated = node
        .events
        .record_user_response(event.id, attendance)
        .await
        .context("Failed to save response")?
        .with_context(|| format!("Event {} is past and can no longer be answered", short_id(&event)))?;

    println!("Answered '{}' to {}", attendance, updated.title);
    Ok(updated)
}

//! Show one event with its response roster.

use anyhow::Result;
use chrono::Utc;
use inperson_sync_core::{response_roster, RosterEntry};
use inperson_sync_types::Event;
use std::path::Path;

use super::{format_date, Node};

/// Roster rows for an event as seen by the local user.
pub async fn roster(node: &Node, event: &Event) -> Vec<RosterEntry> {
    let names = node.friend_names().await;
    response_roster(event, &node.device.user_id, |id| names.get(id).cloned())
}

/// Run the show command.
pub async fn run(data_dir: &Path, event_prefix: &str) -> Result<()> {
    let node = Node::open(data_dir).await?;
    let event = node.resolve_event(event_prefix).await?;
    let me = node.device.user_id.as_str();
    let names = node.friend_names().await;

    let host = if event.is_created_by(me) {
        "Me".to_string()
    } else {
        names
            .get(&event.creator_id)
            .cloned()
            .unwrap_or_else(|| event.creator_id.clone())
    };
    let past = event.is_past(Utc::now());

    println!("{}", event.title);
    println!();
    println!("  ID:         {}", event.id);
    println!("  When:       {}{}", format_date(event.date), if past { " (past)" } else { "" });
    println!("  Host:       {}", host);
    println!("  Visibility: {}", event.publicity);
    println!("  Updated:    {}", format_date(event.last_update));
    println!(
        "  Responses:  {}",
        if past {
            event.past_response_summary(me)
        } else {
            event.response_summary(me)
        }
    );
    println!();

    for row in roster(&node, &event).await {
        println!("  {:<24} {}", row.name, row.status.title());
    }

    Ok(())
}

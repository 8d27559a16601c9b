//! List events.

use anyhow::Result;
use std::path::Path;

use super::{format_date, short_id, Node};

/// Run the list command.
pub async fn run(data_dir: &Path, include_past: bool) -> Result<()> {
    let node = Node::open(data_dir).await?;
    let me = node.device.user_id.as_str();
    let names = node.friend_names().await;

    let mine = node.events.my_current_events().await;
    let received = node.events.received_events().await;

    println!("My events:");
    if mine.is_empty() {
        println!("  (none)");
    }
    for event in &mine {
        println!(
            "  {}  {:<24} {}  [{}]  {}",
            short_id(event),
            event.title,
            format_date(event.date),
            event.publicity,
            event.response_summary(me)
        );
    }

    println!();
    println!("Received:");
    if received.is_empty() {
        println!("  (none)");
    }
    for received in &received {
        let event = &received.event;
        let host = names
            .get(&event.creator_id)
            .map(String::as_str)
            .unwrap_or(event.creator_id.as_str());
        let answer = event
            .response_of(me)
            .map(|r| r.attendance.title())
            .unwrap_or("-");
        println!(
            "  {}  {:<24} {}  host: {}  you: {}  via {}",
            short_id(event),
            event.title,
            format_date(event.date),
            host,
            answer,
            received.sender.name
        );
    }

    if include_past {
        let past = node.events.past_events().await;
        println!();
        println!("Past:");
        if past.is_empty() {
            println!("  (none)");
        }
        for event in &past {
            println!(
                "  {}  {:<24} {}  {}",
                short_id(event),
                event.title,
                format_date(event.date),
                event.past_response_summary(me)
            );
        }
    }

    Ok(())
}

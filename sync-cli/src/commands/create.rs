//! Create an event.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use inperson_sync_types::{Event, EventId, Publicity};
use std::path::Path;

use super::{format_date, short_id, Node};

/// Parse an event time: RFC 3339 (`2026-07-04T18:00:00Z`) or an offset
/// from now (`+90m`, `+3h`, `+2d`).
pub fn parse_when(input: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    if let Some(offset) = input.strip_prefix('+') {
        let split = offset
            .find(|c: char| !c.is_ascii_digit())
            .with_context(|| format!("Missing unit in '{}' (use m, h or d)", input))?;
        let (amount, unit) = offset.split_at(split);
        let amount: i64 = amount
            .parse()
            .with_context(|| format!("Invalid amount in '{}'", input))?;
        let delta = match unit {
            "m" => Duration::minutes(amount),
            "h" => Duration::hours(amount),
            "d" => Duration::days(amount),
            other => anyhow::bail!("Unknown unit '{}' (use m, h or d)", other),
        };
        return Ok(now + delta);
    }

    DateTime::parse_from_rfc3339(input)
        .map(|d| d.with_timezone(&Utc))
        .with_context(|| format!("Invalid time '{}': expected RFC 3339 or +<n>[m|h|d]", input))
}

/// Run the create command.
pub async fn run(data_dir: &Path, title: &str, date: DateTime<Utc>, publicity: Publicity) -> Result<EventId> {
    let title = title.trim();
    if title.is_empty() {
        anyhow::bail!("Event title must not be empty");
    }

    let node = Node::open(data_dir).await?;
    let event = Event::new(title, date, node.device.user_id.clone(), publicity);
    let id = event.id;
    node.events
        .create_event(event.clone())
        .await
        .context("Failed to save event")?;

    println!("Created event {}", short_id(&event));
    println!();
    println!("  Title:      {}", event.title);
    println!("  When:       {}", format_date(event.date));
    println!("  Visibility: {}", event.publicity);
    if event.is_past(Utc::now()) {
        println!();
        println!("Note: this time has already passed; the event was filed as past.");
    }

    Ok(id)
}

//! Show local status.

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::path::Path;

use super::Node;
use crate::config::{DeviceConfig, NodeConfig, CONFIG_FILE};

/// Run the status command.
pub async fn run(data_dir: &Path) -> Result<()> {
    println!("=== inperson status ===");
    println!();

    if !DeviceConfig::exists(data_dir).await {
        println!("Device: NOT INITIALIZED");
        println!();
        println!("Run 'inperson init --name <name>' to initialize.");
        return Ok(());
    }

    let node = Node::open(data_dir).await?;
    let now = Utc::now();

    println!("Device:");
    println!("  User ID: {}", node.device.user_id);
    println!("  Name:    {}", node.device.name);
    println!("  Init:    {}", format_age(node.device.created_at, now));
    println!();

    let config = NodeConfig::load(data_dir)?;
    println!("Settings ({}):", data_dir.join(CONFIG_FILE).display());
    if config.sync.housekeeping_interval_secs == 0 {
        println!("  Housekeeping: off");
    } else {
        println!(
            "  Housekeeping: every {}s (rebroadcast: {})",
            config.sync.housekeeping_interval_secs,
            if config.sync.rebroadcast { "on" } else { "off" }
        );
    }
    println!("  Log filter:   {}", config.log.filter);
    println!();

    let friends = node.friends.list().await;
    println!("Friends: {}", friends.len());
    if let Some(latest) = friends.iter().max_by_key(|f| f.last_seen) {
        println!("  Last seen: {} ({})", latest.name, format_age(latest.last_seen, now));
    }
    println!();

    println!("Events:");
    println!("  Mine:     {}", node.events.my_current_events().await.len());
    println!("  Received: {}", node.events.received_events().await.len());
    println!("  Past:     {}", node.events.past_events().await.len());
    println!("  Shared on connect: {}", node.events.events_to_share().await.len());

    Ok(())
}

/// Relative age of `ts` as seen at `now`.
fn format_age(ts: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff = (now - ts).num_seconds().max(0);

    if diff < 60 {
        "just now".to_string()
    } else if diff < 3600 {
        format!("{} minutes ago", diff / 60)
    } else if diff < 86400 {
        format!("{} hours ago", diff / 3600)
    } else {
        format!("{} days ago", diff / 86400)
    }
}

//! Manage the friend directory.

use anyhow::{Context, Result};
use chrono::Utc;
use inperson_sync_types::{Device, Friend};
use std::path::Path;

use super::{format_date, Node};

/// List friends.
pub async fn list(data_dir: &Path) -> Result<()> {
    let node = Node::open(data_dir).await?;
    let friends = node.friends.list().await;

    if friends.is_empty() {
        println!("No friends yet. Add one with 'inperson friends add <name> <user-id>'.");
        return Ok(());
    }

    let now = Utc::now();
    for friend in &friends {
        let seen = if friend.last_seen > now {
            "just now".to_string()
        } else {
            format_date(friend.last_seen)
        };
        println!("  {:<20} {}  last seen {}", friend.name, friend.device.id, seen);
    }
    Ok(())
}

/// Remember `user_id` as `name`.
pub async fn add(data_dir: &Path, name: &str, user_id: &str) -> Result<Friend> {
    let name = name.trim();
    if name.is_empty() {
        anyhow::bail!("Friend name must not be empty");
    }

    let node = Node::open(data_dir).await?;
    if user_id == node.device.user_id {
        anyhow::bail!("That is your own user id");
    }

    let friend = node
        .friends
        .add(name, Device::new(user_id))
        .await
        .context("Failed to save friend")?;
    if friend.name == name {
        println!("Added {} ({})", friend.name, friend.device.id);
    } else {
        println!("{} is already known as {}", user_id, friend.name);
    }
    Ok(friend)
}

/// Forget every friend.
pub async fn clear(data_dir: &Path) -> Result<()> {
    let node = Node::open(data_dir).await?;
    let count = node.friends.list().await.len();
    node.friends.clear().await.context("Failed to clear friends")?;
    println!("Removed {} friend(s)", count);
    Ok(())
}

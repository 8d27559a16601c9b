//! CLI command implementations.

pub mod create;
pub mod demo;
pub mod friends;
pub mod init;
pub mod invite;
pub mod list;
pub mod respond;
pub mod show;
pub mod status;

use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use inperson_sync_client::{EventStore, FileStore, FriendDirectory, Store};
use inperson_sync_types::Event;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::config::DeviceConfig;

/// Subdirectory of the data directory holding events and friends.
pub const STORE_DIR: &str = "store";

/// The local user's persisted state, opened for one command.
pub struct Node {
    /// Identity.
    pub device: DeviceConfig,
    /// Created, received and past events.
    pub events: EventStore,
    /// Known friends.
    pub friends: FriendDirectory,
}

impl Node {
    /// Open the stores under `data_dir`. Requires `init`.
    pub async fn open(data_dir: &Path) -> Result<Self> {
        let device = DeviceConfig::load(data_dir).await?;
        let store: Arc<dyn Store> = Arc::new(
            FileStore::open(data_dir.join(STORE_DIR))
                .await
                .context("Failed to open store")?,
        );
        let events = EventStore::open(store.clone(), device.user_id.clone())
            .await
            .context("Failed to load events")?;
        let friends = FriendDirectory::open(store)
            .await
            .context("Failed to load friends")?;
        Ok(Self {
            device,
            events,
            friends,
        })
    }

    /// Friend names by user id.
    pub async fn friend_names(&self) -> HashMap<String, String> {
        self.friends
            .list()
            .await
            .into_iter()
            .map(|f| (f.device.id.clone(), f.name))
            .collect()
    }

    /// Find an event in any collection by id or unique id prefix.
    pub async fn resolve_event(&self, prefix: &str) -> Result<Event> {
        let mut all = self.events.my_current_events().await;
        all.extend(self.events.received_events().await.into_iter().map(|r| r.event));
        all.extend(self.events.past_events().await);

        let mut matches = all
            .into_iter()
            .filter(|e| e.id.to_string().starts_with(prefix));
        let found = matches
            .next()
            .with_context(|| format!("No event with id {}", prefix))?;
        if matches.next().is_some() {
            anyhow::bail!("Event id {} is ambiguous; use more characters", prefix);
        }
        Ok(found)
    }
}

/// Short form of an event id for listings.
pub fn short_id(event: &Event) -> String {
    event.id.to_string()[..8].to_string()
}

/// Format a timestamp in local time.
pub fn format_date(date: DateTime<Utc>) -> String {
    date.with_timezone(&Local).format("%a %d %b %Y %H:%M").to_string()
}

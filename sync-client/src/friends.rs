//! Durable list of known peers.

use std::sync::Arc;

use chrono::Utc;
use inperson_sync_types::{Device, Friend};
use tokio::sync::Mutex;

use crate::store::{load_json, save_json, Store, StoreError};

/// Store key for the friend list.
pub const FRIENDS_KEY: &str = "friends";

/// Friend list, persisted under [`FRIENDS_KEY`].
pub struct FriendDirectory {
    store: Arc<dyn Store>,
    friends: Mutex<Vec<Friend>>,
}

impl std::fmt::Debug for FriendDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FriendDirectory").finish_non_exhaustive()
    }
}

impl FriendDirectory {
    /// Load the persisted friend list.
    pub async fn open(store: Arc<dyn Store>) -> Result<Self, StoreError> {
        let friends: Vec<Friend> = load_json(store.as_ref(), FRIENDS_KEY).await?;
        tracing::debug!("Loaded {} friends", friends.len());
        Ok(Self {
            store,
            friends: Mutex::new(friends),
        })
    }

    /// The friend with this device id, if any.
    pub async fn lookup(&self, device_id: &str) -> Option<Friend> {
        self.friends
            .lock()
            .await
            .iter()
            .find(|f| f.id() == device_id)
            .cloned()
    }

    /// Remember `device` as `name`.
    ///
    /// Adding a device that is already known returns the existing record
    /// unchanged.
    pub async fn add(&self, name: impl Into<String>, device: Device) -> Result<Friend, StoreError> {
        let mut friends = self.friends.lock().await;
        if let Some(existing) = friends.iter().find(|f| f.device == device) {
            return Ok(existing.clone());
        }

        let friend = Friend::new(name, device, Utc::now());
        let mut next = friends.clone();
        next.push(friend.clone());
        save_json(self.store.as_ref(), FRIENDS_KEY, &next).await?;
        *friends = next;
        tracing::info!("Added friend {} ({})", friend.name, friend.id());
        Ok(friend)
    }

    /// Record that `device_id` was just seen. Returns `false` if unknown.
    pub async fn touch_last_seen(&self, device_id: &str) -> Result<bool, StoreError> {
        let mut friends = self.friends.lock().await;
        let mut next = friends.clone();
        let Some(friend) = next.iter_mut().find(|f| f.id() == device_id) else {
            return Ok(false);
        };
        friend.last_seen = Utc::now();
        save_json(self.store.as_ref(), FRIENDS_KEY, &next).await?;
        *friends = next;
        Ok(true)
    }

    /// Forget every friend.
    pub async fn clear(&self) -> Result<(), StoreError> {
        let mut friends = self.friends.lock().await;
        save_json::<Friend>(self.store.as_ref(), FRIENDS_KEY, &[]).await?;
        friends.clear();
        tracing::info!("Cleared friend list");
        Ok(())
    }

    /// All friends, in the order they were added.
    pub async fn list(&self) -> Vec<Friend> {
        self.friends.lock().await.clone()
    }

    /// The friends among `devices`, in `devices` order.
    pub async fn friends_among(&self, devices: &[Device]) -> Vec<Friend> {
        let friends = self.friends.lock().await;
        devices
            .iter()
            .filter_map(|d| friends.iter().find(|f| f.device == *d).cloned())
            .collect()
    }
}

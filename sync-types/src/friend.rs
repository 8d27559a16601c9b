//! Friends: durably remembered peers.

use serde::{Deserialize, Serialize};

use crate::{Device, Timestamp};

/// Public key recorded for a friend until key exchange has happened.
pub const UNVERIFIED_PUBLIC_KEY: &str = "unverified";

/// A durably remembered peer identity, independent of current reachability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Friend {
    /// Display name chosen by the local user.
    pub name: String,
    /// The friend's advertised device identity.
    pub device: Device,
    /// Public key, or [`UNVERIFIED_PUBLIC_KEY`].
    #[serde(rename = "publicKey")]
    pub public_key: String,
    /// When the friend was last connected.
    #[serde(rename = "lastSeen")]
    pub last_seen: Timestamp,
}

impl Friend {
    /// Create a friend with an unverified public key.
    pub fn new(name: impl Into<String>, device: Device, last_seen: Timestamp) -> Self {
        Self {
            name: name.into(),
            device,
            public_key: UNVERIFIED_PUBLIC_KEY.to_string(),
            last_seen,
        }
    }

    /// The friend's durable user id.
    pub fn id(&self) -> &str {
        &self.device.id
    }
}

//! Timestamps.

use chrono::{DateTime, Duration, Utc};

/// Wall-clock timestamp used for event dates and last-update stamps.
///
/// Serialized as RFC 3339 (ISO-8601).
pub type Timestamp = DateTime<Utc>;

/// A fresh "now" stamp that still sorts after `previous`.
///
/// Device clocks drift. If the local clock reads earlier than a stamp we
/// already hold, the new stamp is `previous + 1ms` so a local edit never
/// loses to its own predecessor under last-write-wins.
pub fn next_update_after(previous: Timestamp) -> Timestamp {
    let now = Utc::now();
    let floor = previous + Duration::milliseconds(1);
    if now > floor {
        now
    } else {
        floor
    }
}

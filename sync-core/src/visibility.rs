//! Sender-side visibility filter.

use inperson_sync_types::{Event, Friend, Publicity};

/// Whether `friend` may receive `event`.
///
/// AutoShare events go to everyone. Private and CanInvite events go only to
/// their creator and to invite recipients.
pub fn is_visible_to(event: &Event, friend: &Friend) -> bool {
    match event.publicity {
        Publicity::AutoShare => true,
        Publicity::Private | Publicity::CanInvite => {
            event.is_created_by(friend.id()) || event.user_is_invited(friend.id())
        }
    }
}

/// The subset of `events` that may be sent to `friend`, in input order.
pub fn filter_visible_events(events: &[Event], friend: &Friend) -> Vec<Event> {
    events
        .iter()
        .filter(|event| is_visible_to(event, friend))
        .cloned()
        .collect()
}

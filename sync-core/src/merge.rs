//! Merge engine: reconciling two versions of the same event.
//!
//! Every function here is total. There are no error cases; malformed input
//! never reaches this module because undecodable payloads are dropped by the
//! caller.
//!
//! Conflict resolution is last-write-wins on `last_update`, with ties going
//! to the local copy. Because "keep the left one on a tie" is a left-biased
//! maximum, [`merge_responses`] is associative and merging the same data
//! twice is a no-op.

use std::collections::{HashMap, HashSet};

use inperson_sync_types::{next_update_after, Event, Invite, Response};

/// Merge two response lists, one response per responder.
///
/// For every responder present on either side the response with the greater
/// `last_update` wins; equal stamps keep the local copy. The result holds
/// exactly the union of responder ids, in order of first appearance (local
/// entries first).
pub fn merge_responses(local: &[Response], incoming: &[Response]) -> Vec<Response> {
    let mut merged: Vec<Response> = Vec::with_capacity(local.len() + incoming.len());
    let mut index: HashMap<&str, usize> = HashMap::new();

    for response in local.iter().chain(incoming.iter()) {
        match index.get(response.responder_id.as_str()) {
            Some(&slot) => {
                if response.last_update > merged[slot].last_update {
                    merged[slot] = response.clone();
                }
            }
            None => {
                index.insert(response.responder_id.as_str(), merged.len());
                merged.push(response.clone());
            }
        }
    }

    merged
}

/// Set union of two invite lists, keyed by `(sender_id, recipient_id)`.
///
/// Local order is kept; new invites are appended in arrival order.
pub fn merge_invites(local: &[Invite], incoming: &[Invite]) -> Vec<Invite> {
    let mut seen: HashSet<(&str, &str)> = HashSet::new();
    local
        .iter()
        .chain(incoming.iter())
        .filter(|invite| seen.insert((invite.sender_id.as_str(), invite.recipient_id.as_str())))
        .cloned()
        .collect()
}

/// Whether an incoming copy of a received event should replace ours.
pub fn should_replace_received_event(existing: &Event, incoming: &Event) -> bool {
    incoming.last_update > existing.last_update
}

/// Fold an incoming copy of a locally created event into the local,
/// authoritative copy.
///
/// Only responses and invites are taken from `incoming`; title, date,
/// creator and publicity always stay as they are locally, since a remote
/// sender is never authoritative over content this node created.
///
/// Returns `None` when the fold changes nothing, so re-applying the same
/// data leaves the local event (including its `last_update`) untouched.
pub fn fold_into_authoritative(local: &Event, incoming: &Event) -> Option<Event> {
    let responses = merge_responses(&local.responses, &incoming.responses);
    let invites = merge_invites(&local.invites, &incoming.invites);

    if responses == local.responses && invites == local.invites {
        return None;
    }

    Some(Event {
        responses,
        invites,
        last_update: next_update_after(local.last_update),
        ..local.clone()
    })
}

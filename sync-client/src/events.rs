//! The event store: every event this node knows about.
//!
//! Three collections, each persisted under its own key:
//!
//! - `createdEvents`: events the local user created (this node is
//!   authoritative for their content)
//! - `receivedEvents`: events created elsewhere, with the friend that
//!   delivered the latest copy
//! - `pastEvents`: events whose date has elapsed; frozen
//!
//! An event id lives in exactly one collection. Events move one way, from
//! either current collection to `pastEvents`, and never back.
//!
//! All mutations are serialised through one async mutex that is held across
//! the persist step, so saves land in the same order as the mutations. A
//! mutation works on a copy of the collections that replaces the live ones
//! only once it is persisted; on a `StoreError` memory is left as it was.

use std::sync::Arc;

use chrono::Utc;
use inperson_sync_core::{
    fold_into_authoritative, merge_invites, merge_responses, should_replace_received_event,
};
use inperson_sync_types::{
    next_update_after, Attendance, Event, EventId, Friend, Invite, ReceivedEvent, Response,
    Timestamp,
};
use tokio::sync::{broadcast, Mutex};

use crate::store::{load_json, save_json, Store, StoreError};

/// Store key for locally created events.
pub const CREATED_EVENTS_KEY: &str = "createdEvents";
/// Store key for events received from friends.
pub const RECEIVED_EVENTS_KEY: &str = "receivedEvents";
/// Store key for elapsed events.
pub const PAST_EVENTS_KEY: &str = "pastEvents";

const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// Notification sent to subscribers after a mutation is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreChange {
    /// A local event was created.
    Created(EventId),
    /// An event's content, responses or invites changed.
    Updated(EventId),
    /// A local event was deleted.
    Deleted(EventId),
    /// A previously unknown event arrived from a friend.
    Received(EventId),
    /// The event's date elapsed and it is now frozen.
    MovedToPast(EventId),
    /// Current events were wiped.
    Cleared,
}

/// Summary of one [`EventStore::apply_incoming`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyOutcome {
    /// Events seen for the first time.
    pub inserted: usize,
    /// Received events replaced by a newer copy.
    pub replaced: usize,
    /// Locally created events that gained responses or invites.
    pub folded: usize,
    /// Events that carried nothing new.
    pub unchanged: usize,
    /// Copies that claim a different creator than the one we hold.
    pub rejected: usize,
    /// Events already frozen as past.
    pub ignored_past: usize,
}

impl ApplyOutcome {
    /// Whether anything was written.
    pub fn changed(&self) -> bool {
        self.inserted + self.replaced + self.folded > 0
    }
}

#[derive(Debug, Default, Clone)]
struct Collections {
    mine: Vec<Event>,
    received: Vec<ReceivedEvent>,
    past: Vec<Event>,
}

impl Collections {
    fn find(&self, id: &EventId) -> Option<&Event> {
        self.mine
            .iter()
            .find(|e| e.id == *id)
            .or_else(|| self.received.iter().map(|r| &r.event).find(|e| e.id == *id))
            .or_else(|| self.past.iter().find(|e| e.id == *id))
    }

    /// Move every elapsed event into `past`. Returns the ids moved.
    fn migrate_past(&mut self, now: Timestamp) -> Vec<EventId> {
        let mut moved = Vec::new();

        let (past_mine, mine): (Vec<Event>, Vec<Event>) =
            std::mem::take(&mut self.mine).into_iter().partition(|e| e.is_past(now));
        self.mine = mine;

        let (past_received, received): (Vec<ReceivedEvent>, Vec<ReceivedEvent>) =
            std::mem::take(&mut self.received)
                .into_iter()
                .partition(|r| r.event.is_past(now));
        self.received = received;

        for event in past_mine
            .into_iter()
            .chain(past_received.into_iter().map(|r| r.event))
        {
            moved.push(event.id);
            self.past.push(event);
        }
        moved
    }
}

/// Collapse duplicate responders (latest answer wins) and duplicate invites
/// in a copy that arrived from the network.
fn normalized(event: Event) -> Event {
    Event {
        responses: merge_responses(&[], &event.responses),
        invites: merge_invites(&[], &event.invites),
        ..event
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Dirty {
    mine: bool,
    received: bool,
    past: bool,
}

impl Dirty {
    const MINE: Dirty = Dirty {
        mine: true,
        received: false,
        past: false,
    };
    const RECEIVED: Dirty = Dirty {
        mine: false,
        received: true,
        past: false,
    };
}

/// Owner of all event collections.
pub struct EventStore {
    store: Arc<dyn Store>,
    local_user: String,
    inner: Mutex<Collections>,
    changes: broadcast::Sender<StoreChange>,
}

impl std::fmt::Debug for EventStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStore")
            .field("local_user", &self.local_user)
            .finish_non_exhaustive()
    }
}

impl EventStore {
    /// Load the persisted collections for `local_user`.
    ///
    /// Missing keys are empty collections. Events whose date has already
    /// elapsed are moved to `pastEvents` straight away.
    pub async fn open(store: Arc<dyn Store>, local_user: impl Into<String>) -> Result<Self, StoreError> {
        let collections = Collections {
            mine: load_json(store.as_ref(), CREATED_EVENTS_KEY).await?,
            received: load_json(store.as_ref(), RECEIVED_EVENTS_KEY).await?,
            past: load_json(store.as_ref(), PAST_EVENTS_KEY).await?,
        };
        tracing::debug!(
            "Loaded events: {} created, {} received, {} past",
            collections.mine.len(),
            collections.received.len(),
            collections.past.len()
        );

        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        let this = Self {
            store,
            local_user: local_user.into(),
            inner: Mutex::new(collections),
            changes,
        };
        this.advance_time().await?;
        Ok(this)
    }

    /// The local user's id.
    pub fn local_user(&self) -> &str {
        &self.local_user
    }

    /// Receive a [`StoreChange`] after every persisted mutation.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }

    /// Add a locally created event.
    pub async fn create_event(&self, event: Event) -> Result<(), StoreError> {
        let mut guard = self.inner.lock().await;
        let mut c = guard.clone();
        if c.find(&event.id).is_some() {
            tracing::warn!("Ignoring create of existing event {}", event.id);
            return Ok(());
        }

        let id = event.id;
        tracing::info!("Created event {} ({})", id, event.title);
        c.mine.push(event);
        self.commit(&mut guard, c, Dirty::MINE, vec![StoreChange::Created(id)])
            .await
    }

    /// Replace a locally created event.
    ///
    /// Returns `false` when `old_id` is not one of ours, or when `new_event`
    /// would change the event's id or creator.
    pub async fn update_event(&self, old_id: EventId, new_event: Event) -> Result<bool, StoreError> {
        let mut guard = self.inner.lock().await;
        let mut c = guard.clone();
        let Some(slot) = c.mine.iter().position(|e| e.id == old_id) else {
            return Ok(false);
        };
        if new_event.id != old_id || new_event.creator_id != c.mine[slot].creator_id {
            tracing::warn!("Refusing update that changes identity of event {}", old_id);
            return Ok(false);
        }

        c.mine[slot] = new_event;
        self.commit(&mut guard, c, Dirty::MINE, vec![StoreChange::Updated(old_id)])
            .await?;
        Ok(true)
    }

    /// Delete a locally created event. Returns `false` if it is not ours.
    pub async fn delete_event(&self, id: EventId) -> Result<bool, StoreError> {
        let mut guard = self.inner.lock().await;
        let mut c = guard.clone();
        let before = c.mine.len();
        c.mine.retain(|e| e.id != id);
        if c.mine.len() == before {
            return Ok(false);
        }

        tracing::info!("Deleted event {}", id);
        self.commit(&mut guard, c, Dirty::MINE, vec![StoreChange::Deleted(id)])
            .await?;
        Ok(true)
    }

    /// Record the local user's attendance for a current event.
    ///
    /// Returns the updated event, or `None` if the id is unknown or past.
    pub async fn record_user_response(
        &self,
        event_id: EventId,
        attendance: Attendance,
    ) -> Result<Option<Event>, StoreError> {
        let mut guard = self.inner.lock().await;
        let mut c = guard.clone();
        let local_user = self.local_user.as_str();

        let respond = |event: &Event| {
            let stamp = match event.response_of(local_user) {
                Some(previous) => next_update_after(previous.last_update),
                None => Utc::now(),
            };
            let response = Response::new(local_user, attendance, stamp);
            merge_responses(&event.responses, std::slice::from_ref(&response))
        };

        let (updated, dirty) = if let Some(event) = c.mine.iter_mut().find(|e| e.id == event_id) {
            let responses = respond(event);
            *event = event.updating_responses(responses);
            (event.clone(), Dirty::MINE)
        } else if let Some(received) = c.received.iter_mut().find(|r| r.event.id == event_id) {
            let responses = respond(&received.event);
            *received = received.updating_responses(responses);
            (received.event.clone(), Dirty::RECEIVED)
        } else {
            return Ok(None);
        };

        tracing::info!("Responded {} to event {}", attendance, event_id);
        self.commit(&mut guard, c, dirty, vec![StoreChange::Updated(event_id)])
            .await?;
        Ok(Some(updated))
    }

    /// Invite `invitees` to a current event on behalf of the local user.
    ///
    /// Returns the updated event, or `None` if the id is unknown, past, or
    /// the local user may not invite to it. Inviting someone already
    /// invited by the local user leaves the event untouched.
    pub async fn invite_friends(
        &self,
        invitees: &[Friend],
        event_id: EventId,
    ) -> Result<Option<Event>, StoreError> {
        let mut guard = self.inner.lock().await;
        let mut c = guard.clone();
        let local_user = self.local_user.as_str();
        let new_invites: Vec<Invite> = invitees
            .iter()
            .map(|friend| Invite::new(local_user, friend.id()))
            .collect();

        let invite = |event: &Event| -> Option<Vec<Invite>> {
            let merged = merge_invites(&event.invites, &new_invites);
            (merged != event.invites).then_some(merged)
        };

        let (updated, dirty) = if let Some(event) = c.mine.iter_mut().find(|e| e.id == event_id) {
            match invite(event) {
                Some(invites) => *event = event.updating_invitees(invites),
                None => return Ok(Some(event.clone())),
            }
            (event.clone(), Dirty::MINE)
        } else if let Some(received) = c.received.iter_mut().find(|r| r.event.id == event_id) {
            if !received.event.can_invite(local_user) {
                tracing::warn!("Not allowed to invite to private event {}", event_id);
                return Ok(None);
            }
            match invite(&received.event) {
                Some(invites) => *received = received.updating_invitees(invites),
                None => return Ok(Some(received.event.clone())),
            }
            (received.event.clone(), Dirty::RECEIVED)
        } else {
            return Ok(None);
        };

        tracing::info!("Invited {} friend(s) to event {}", invitees.len(), event_id);
        self.commit(&mut guard, c, dirty, vec![StoreChange::Updated(event_id)])
            .await?;
        Ok(Some(updated))
    }

    /// Merge events received from `from` into local state.
    ///
    /// - our own events: only responses and invites are folded in
    /// - known received events: replaced iff the incoming copy is newer
    /// - unknown events: stored as received from `from`
    /// - past events: ignored
    ///
    /// Applying the same batch twice leaves the store unchanged.
    pub async fn apply_incoming(&self, events: Vec<Event>, from: &Friend) -> Result<ApplyOutcome, StoreError> {
        let mut guard = self.inner.lock().await;
        let mut c = guard.clone();
        let mut outcome = ApplyOutcome::default();
        let mut dirty = Dirty::default();
        let mut notes = Vec::new();

        for incoming in events {
            let incoming = normalized(incoming);
            let id = incoming.id;

            if c.past.iter().any(|e| e.id == id) {
                outcome.ignored_past += 1;
            } else if let Some(local) = c.mine.iter_mut().find(|e| e.id == id) {
                match fold_into_authoritative(local, &incoming) {
                    Some(folded) => {
                        *local = folded;
                        outcome.folded += 1;
                        dirty.mine = true;
                        notes.push(StoreChange::Updated(id));
                    }
                    None => outcome.unchanged += 1,
                }
            } else if let Some(existing) = c.received.iter_mut().find(|r| r.event.id == id) {
                if incoming.creator_id != existing.event.creator_id {
                    tracing::warn!(
                        "Rejecting copy of event {} from {} with a different creator",
                        id,
                        from.id()
                    );
                    outcome.rejected += 1;
                } else if should_replace_received_event(&existing.event, &incoming) {
                    *existing = incoming.received_from(from);
                    outcome.replaced += 1;
                    dirty.received = true;
                    notes.push(StoreChange::Updated(id));
                } else {
                    outcome.unchanged += 1;
                }
            } else {
                c.received.push(incoming.received_from(from));
                outcome.inserted += 1;
                dirty.received = true;
                notes.push(StoreChange::Received(id));
            }
        }

        tracing::debug!("Applied events from {}: {:?}", from.id(), outcome);
        if outcome.changed() {
            self.commit(&mut guard, c, dirty, notes).await?;
        }
        Ok(outcome)
    }

    /// Move every event whose date has elapsed to `pastEvents`.
    pub async fn advance_time(&self) -> Result<usize, StoreError> {
        self.advance_time_to(Utc::now()).await
    }

    /// Move every event whose date is before `now` to `pastEvents`.
    ///
    /// Returns the number of events moved.
    pub async fn advance_time_to(&self, now: Timestamp) -> Result<usize, StoreError> {
        let mut guard = self.inner.lock().await;
        let mut c = guard.clone();
        let moved = c.migrate_past(now);
        if moved.is_empty() {
            return Ok(0);
        }
        let count = moved.len();
        self.persist(&c, Dirty {
            mine: true,
            received: true,
            past: true,
        })
        .await?;
        *guard = c;
        for id in moved {
            tracing::info!("Event {} is now past", id);
            self.notify(StoreChange::MovedToPast(id));
        }
        Ok(count)
    }

    /// The events to offer peers: created plus received, never past.
    pub async fn events_to_share(&self) -> Vec<Event> {
        let c = self.inner.lock().await;
        let now = Utc::now();
        c.mine
            .iter()
            .cloned()
            .chain(c.received.iter().map(|r| r.event.clone()))
            .filter(|e| !e.is_past(now))
            .collect()
    }

    /// Locally created current events.
    pub async fn my_current_events(&self) -> Vec<Event> {
        self.inner.lock().await.mine.clone()
    }

    /// Current events received from friends.
    pub async fn received_events(&self) -> Vec<ReceivedEvent> {
        self.inner.lock().await.received.clone()
    }

    /// Frozen past events.
    pub async fn past_events(&self) -> Vec<Event> {
        self.inner.lock().await.past.clone()
    }

    /// Look up an event in any collection.
    pub async fn find(&self, id: EventId) -> Option<Event> {
        self.inner.lock().await.find(&id).cloned()
    }

    /// Debug reset: drop all current events. Past events are kept.
    pub async fn clear_all_data(&self) -> Result<(), StoreError> {
        let mut guard = self.inner.lock().await;
        let mut c = guard.clone();
        c.mine.clear();
        c.received.clear();
        self.persist(&c, Dirty {
            mine: true,
            received: true,
            past: false,
        })
        .await?;
        *guard = c;
        tracing::info!("Cleared all current events");
        self.notify(StoreChange::Cleared);
        Ok(())
    }

    /// Migrate elapsed events in `next`, persist it, make it `current`,
    /// then notify subscribers.
    async fn commit(
        &self,
        current: &mut Collections,
        mut next: Collections,
        mut dirty: Dirty,
        mut notes: Vec<StoreChange>,
    ) -> Result<(), StoreError> {
        let moved = next.migrate_past(Utc::now());
        if !moved.is_empty() {
            dirty = Dirty {
                mine: true,
                received: true,
                past: true,
            };
            notes.extend(moved.into_iter().map(StoreChange::MovedToPast));
        }

        self.persist(&next, dirty).await?;
        *current = next;
        for note in notes {
            self.notify(note);
        }
        Ok(())
    }

    async fn persist(&self, c: &Collections, dirty: Dirty) -> Result<(), StoreError> {
        let store = self.store.as_ref();
        if dirty.mine {
            save_json(store, CREATED_EVENTS_KEY, &c.mine).await?;
        }
        if dirty.received {
            save_json(store, RECEIVED_EVENTS_KEY, &c.received).await?;
        }
        if dirty.past {
            save_json(store, PAST_EVENTS_KEY, &c.past).await?;
        }
        Ok(())
    }

    fn notify(&self, change: StoreChange) {
        // No subscribers is fine.
        let _ = self.changes.send(change);
    }
}

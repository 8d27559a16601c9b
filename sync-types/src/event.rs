//! Events, invites and publicity.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{next_update_after, AttendanceCounts, EventId, Friend, Response, Timestamp};

/// How far an event propagates.
///
/// Serialized as an integer (0, 1, 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Publicity {
    /// Only the creator may invite; shared only with the creator and invitees.
    Private,
    /// Invitees may invite others; not shared automatically.
    CanInvite,
    /// Shared automatically with every friend (and their friends, and so on).
    AutoShare,
}

impl Publicity {
    /// Human-readable title.
    pub fn title(&self) -> &'static str {
        match self {
            Publicity::Private => "Private",
            Publicity::CanInvite => "Invitation Allowed",
            Publicity::AutoShare => "Public",
        }
    }
}

impl fmt::Display for Publicity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

impl From<Publicity> for u8 {
    fn from(publicity: Publicity) -> Self {
        match publicity {
            Publicity::Private => 0,
            Publicity::CanInvite => 1,
            Publicity::AutoShare => 2,
        }
    }
}

impl TryFrom<u8> for Publicity {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Publicity::Private),
            1 => Ok(Publicity::CanInvite),
            2 => Ok(Publicity::AutoShare),
            other => Err(format!("invalid publicity: {}", other)),
        }
    }
}

/// An invitation of `recipient_id` to an event, made by `sender_id`.
///
/// Immutable once created. An event's invite list only ever grows.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Invite {
    /// User id of whoever sent the invite.
    #[serde(rename = "senderID")]
    pub sender_id: String,
    /// User id of the invitee.
    #[serde(rename = "recipientID")]
    pub recipient_id: String,
}

impl Invite {
    /// Create an invite.
    pub fn new(sender_id: impl Into<String>, recipient_id: impl Into<String>) -> Self {
        Self {
            sender_id: sender_id.into(),
            recipient_id: recipient_id.into(),
        }
    }
}

/// A social event.
///
/// Immutable; every transform returns a new value with a later
/// `last_update`. `creator_id` never changes across versions of the same
/// `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Merge key.
    pub id: EventId,
    /// Title.
    pub title: String,
    /// When the event takes place.
    pub date: Timestamp,
    /// When this version was produced.
    #[serde(rename = "lastUpdate")]
    pub last_update: Timestamp,
    /// At most one response per responder.
    pub responses: Vec<Response>,
    /// User id of the creator.
    #[serde(rename = "creatorID")]
    pub creator_id: String,
    /// Invites issued so far.
    pub invites: Vec<Invite>,
    /// Sharing scope.
    pub publicity: Publicity,
}

impl Event {
    /// Create a brand-new event with a fresh id and no responses or invites.
    pub fn new(
        title: impl Into<String>,
        date: Timestamp,
        creator_id: impl Into<String>,
        publicity: Publicity,
    ) -> Self {
        Self {
            id: EventId::new(),
            title: title.into(),
            date,
            last_update: chrono::Utc::now(),
            responses: Vec::new(),
            creator_id: creator_id.into(),
            invites: Vec::new(),
            publicity,
        }
    }

    /// Wrap this event with the friend that delivered it.
    pub fn received_from(&self, friend: &Friend) -> ReceivedEvent {
        ReceivedEvent {
            event: self.clone(),
            sender: friend.clone(),
        }
    }

    /// A new version with `responses` replaced.
    pub fn updating_responses(&self, responses: Vec<Response>) -> Event {
        Event {
            responses,
            last_update: next_update_after(self.last_update),
            ..self.clone()
        }
    }

    /// A new version with `invites` replaced.
    pub fn updating_invitees(&self, invites: Vec<Invite>) -> Event {
        Event {
            invites,
            last_update: next_update_after(self.last_update),
            ..self.clone()
        }
    }

    /// Whether `user_id` is a recipient of one of this event's invites.
    pub fn user_is_invited(&self, user_id: &str) -> bool {
        self.invites.iter().any(|i| i.recipient_id == user_id)
    }

    /// Whether `user_id` created this event.
    pub fn is_created_by(&self, user_id: &str) -> bool {
        self.creator_id == user_id
    }

    /// Whether `user_id` may invite others to this event.
    ///
    /// Private events may only be shared onwards by their creator.
    pub fn can_invite(&self, user_id: &str) -> bool {
        match self.publicity {
            Publicity::Private => self.is_created_by(user_id),
            Publicity::CanInvite | Publicity::AutoShare => true,
        }
    }

    /// Whether the event's date has elapsed at `now`.
    pub fn is_past(&self, now: Timestamp) -> bool {
        self.date < now
    }

    /// The response recorded for `user_id`, if any.
    pub fn response_of(&self, user_id: &str) -> Option<&Response> {
        self.responses.iter().find(|r| r.responder_id == user_id)
    }

    /// Counts of everyone's responses except `excluding`'s own.
    pub fn attendance_counts(&self, excluding: &str) -> AttendanceCounts {
        AttendanceCounts::from_responses(
            self.responses.iter().filter(|r| r.responder_id != excluding),
        )
    }

    /// Response summary for display, excluding the local user.
    pub fn response_summary(&self, excluding: &str) -> String {
        self.attendance_counts(excluding).summary()
    }

    /// Past-tense response summary, excluding the local user.
    pub fn past_response_summary(&self, excluding: &str) -> String {
        self.attendance_counts(excluding).past_summary()
    }
}

/// An event authored by someone else, paired with the friend that delivered
/// the most recent copy.
///
/// The sender is attribution only; conflict resolution looks at
/// `event.last_update` alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivedEvent {
    /// The event.
    pub event: Event,
    /// Who delivered it.
    pub sender: Friend,
}

impl ReceivedEvent {
    /// A new version with the event's responses replaced.
    pub fn updating_responses(&self, responses: Vec<Response>) -> ReceivedEvent {
        ReceivedEvent {
            event: self.event.updating_responses(responses),
            sender: self.sender.clone(),
        }
    }

    /// A new version with the event's invites replaced.
    pub fn updating_invitees(&self, invites: Vec<Invite>) -> ReceivedEvent {
        ReceivedEvent {
            event: self.event.updating_invitees(invites),
            sender: self.sender.clone(),
        }
    }
}

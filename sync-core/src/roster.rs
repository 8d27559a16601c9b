//! Who is coming: the per-event response roster shown by front ends.

use inperson_sync_types::{Attendance, Event};

/// How a roster row should be labelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStatus {
    /// The person answered.
    Attendance(Attendance),
    /// The local user hosts this event.
    Host,
    /// Invited but no answer yet.
    Invited,
    /// Holds the event without an invite and has not answered.
    NotResponded,
}

impl ResponseStatus {
    /// Human-readable label.
    pub fn title(&self) -> &'static str {
        match self {
            ResponseStatus::Attendance(attendance) => attendance.title(),
            ResponseStatus::Host => "Host",
            ResponseStatus::Invited => "Invited",
            ResponseStatus::NotResponded => "Not Responded",
        }
    }
}

/// One row of the roster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    /// Display name ("Me" for the local user, the raw id when unnamed).
    pub name: String,
    /// Row status.
    pub status: ResponseStatus,
}

impl RosterEntry {
    fn new(name: impl Into<String>, status: ResponseStatus) -> Self {
        Self {
            name: name.into(),
            status,
        }
    }
}

/// Build the roster for `event` as seen by `local_user`.
///
/// Rows, in order: the host, the local user, everyone else who answered,
/// then invitees that have not answered yet. `name_of` resolves a user id to
/// a friend's name.
pub fn response_roster<F>(event: &Event, local_user: &str, name_of: F) -> Vec<RosterEntry>
where
    F: Fn(&str) -> Option<String>,
{
    let display = |id: &str| name_of(id).unwrap_or_else(|| id.to_string());
    let own = event.response_of(local_user).map(|r| r.attendance);

    let mut rows = Vec::new();
    if event.is_created_by(local_user) {
        rows.push(RosterEntry::new("Me", ResponseStatus::Host));
    } else {
        rows.push(RosterEntry::new(
            display(&event.creator_id),
            ResponseStatus::Attendance(Attendance::Host),
        ));
        let fallback = if event.user_is_invited(local_user) {
            ResponseStatus::Invited
        } else {
            ResponseStatus::NotResponded
        };
        rows.push(RosterEntry::new(
            "Me",
            own.map(ResponseStatus::Attendance).unwrap_or(fallback),
        ));
    }

    rows.extend(
        event
            .responses
            .iter()
            .filter(|r| r.responder_id != local_user && r.responder_id != event.creator_id)
            .map(|r| RosterEntry::new(display(&r.responder_id), ResponseStatus::Attendance(r.attendance))),
    );

    let mut pending: Vec<&str> = Vec::new();
    for invite in &event.invites {
        let id = invite.recipient_id.as_str();
        if id == event.creator_id
            || id == local_user
            || event.response_of(id).is_some()
            || pending.contains(&id)
        {
            continue;
        }
        pending.push(id);
    }
    rows.extend(
        pending
            .into_iter()
            .map(|id| RosterEntry::new(display(id), ResponseStatus::Invited)),
    );

    rows
}

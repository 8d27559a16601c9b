//! Attendance responses.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::Timestamp;

/// How a responder is attending an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Attendance {
    /// The event creator.
    #[serde(rename = "HOST")]
    Host,
    /// Going.
    #[serde(rename = "GOING")]
    Going,
    /// Not going.
    #[serde(rename = "NOTGOING")]
    NotGoing,
    /// Maybe.
    #[serde(rename = "MAYBE")]
    Maybe,
}

impl Attendance {
    /// Human-readable title.
    pub fn title(&self) -> &'static str {
        match self {
            Attendance::Host => "Host",
            Attendance::Going => "Going",
            Attendance::NotGoing => "Not Going",
            Attendance::Maybe => "Maybe",
        }
    }
}

impl fmt::Display for Attendance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// One responder's answer for one event.
///
/// At most one logical response exists per `(event, responder_id)`;
/// duplicates are resolved by `last_update`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    /// Durable user id of the responder.
    #[serde(rename = "responderID")]
    pub responder_id: String,
    /// The answer.
    #[serde(rename = "going")]
    pub attendance: Attendance,
    /// When the responder last changed their answer.
    #[serde(rename = "lastUpdate")]
    pub last_update: Timestamp,
}

impl Response {
    /// Create a response.
    pub fn new(responder_id: impl Into<String>, attendance: Attendance, last_update: Timestamp) -> Self {
        Self {
            responder_id: responder_id.into(),
            attendance,
            last_update,
        }
    }
}

/// Counts of responses by category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttendanceCounts {
    /// Responses marked `Host`.
    pub host: usize,
    /// Responses marked `Going`.
    pub going: usize,
    /// Responses marked `NotGoing`.
    pub not_going: usize,
    /// Responses marked `Maybe`.
    pub maybe: usize,
}

impl AttendanceCounts {
    /// Tally a list of attendances.
    pub fn tally<'a>(attendances: impl IntoIterator<Item = &'a Attendance>) -> Self {
        attendances
            .into_iter()
            .fold(Self::default(), |mut counts, attendance| {
                match attendance {
                    Attendance::Host => counts.host += 1,
                    Attendance::Going => counts.going += 1,
                    Attendance::NotGoing => counts.not_going += 1,
                    Attendance::Maybe => counts.maybe += 1,
                }
                counts
            })
    }

    /// Tally the attendance of a list of responses.
    pub fn from_responses<'a>(responses: impl IntoIterator<Item = &'a Response>) -> Self {
        Self::tally(responses.into_iter().map(|r| &r.attendance))
    }

    /// Summary for an upcoming event, e.g. `"2 going, 1 maybe"`.
    ///
    /// Hosts are not counted. Returns `"No responses"` when empty.
    pub fn summary(&self) -> String {
        self.format(&["going", "not going", "maybe"])
    }

    /// Summary for an event that already happened, e.g. `"2 went, 1 didn't go"`.
    pub fn past_summary(&self) -> String {
        self.format(&["went", "didn't go", "maybe"])
    }

    fn format(&self, labels: &[&str; 3]) -> String {
        let parts: Vec<String> = [self.going, self.not_going, self.maybe]
            .iter()
            .zip(labels.iter())
            .filter(|(count, _)| **count > 0)
            .map(|(count, label)| format!("{} {}", count, label))
            .collect();

        if parts.is_empty() {
            "No responses".to_string()
        } else {
            parts.join(", ")
        }
    }
}

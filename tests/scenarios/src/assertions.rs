//! Assertion helpers for scenario tests.
//!
//! These are pure functions that check sync state after a scenario has
//! settled. They take node snapshots as input and return pass/fail.

use std::collections::HashMap;

use sync_types::{Event, EventId, Response};

/// One node's events at a point in time.
#[derive(Debug, Clone, Default)]
pub struct NodeState {
    /// The node's user id.
    pub user: String,
    /// Created and received events.
    pub current: HashMap<EventId, Event>,
    /// Past events.
    pub past: HashMap<EventId, Event>,
}

/// Every node's events at a point in time.
#[derive(Debug, Clone, Default)]
pub struct TopologyState {
    /// All nodes in the mesh.
    pub nodes: Vec<NodeState>,
}

/// Result of an assertion check.
#[derive(Debug, Clone)]
pub struct AssertionResult {
    /// Whether the assertion passed
    pub passed: bool,
    /// Description of what was checked
    pub description: String,
    /// Details on failure
    pub failure_details: Option<String>,
}

impl AssertionResult {
    /// Create a passing result.
    pub fn pass(description: &str) -> Self {
        Self {
            passed: true,
            description: description.into(),
            failure_details: None,
        }
    }

    /// Create a failing result.
    pub fn fail(description: &str, details: &str) -> Self {
        Self {
            passed: false,
            description: description.into(),
            failure_details: Some(details.into()),
        }
    }
}

/// Assert that `user` holds `event_id` as a current event.
pub fn assert_event_present(node: &NodeState, event_id: EventId) -> AssertionResult {
    if node.current.contains_key(&event_id) {
        AssertionResult::pass(&format!("Event {} present on {}", event_id, node.user))
    } else {
        AssertionResult::fail(
            &format!("Event {} should be present on {}", event_id, node.user),
            &format!(
                "Node has {} current events but not the expected one",
                node.current.len()
            ),
        )
    }
}

/// Assert that `user` holds no copy of `event_id` at all.
///
/// Used for the private-event boundary: a user outside the audience must
/// never see the event.
pub fn assert_event_absent(node: &NodeState, event_id: EventId) -> AssertionResult {
    if node.current.contains_key(&event_id) || node.past.contains_key(&event_id) {
        AssertionResult::fail(
            &format!("Event {} should not reach {}", event_id, node.user),
            "A copy was found on the node",
        )
    } else {
        AssertionResult::pass(&format!("Event {} absent on {}", event_id, node.user))
    }
}

fn sorted_responses(event: &Event) -> Vec<Response> {
    let mut responses = event.responses.clone();
    responses.sort_by(|a, b| a.responder_id.cmp(&b.responder_id));
    responses
}

/// Assert that every node holding `event_id` agrees on its responses.
pub fn assert_responses_converged(topology: &TopologyState, event_id: EventId) -> AssertionResult {
    let copies: Vec<(&str, Vec<Response>)> = topology
        .nodes
        .iter()
        .filter_map(|n| n.current.get(&event_id).map(|e| (n.user.as_str(), sorted_responses(e))))
        .collect();

    let Some((first_user, reference)) = copies.first() else {
        return AssertionResult::pass("No copies to check");
    };

    for (user, responses) in &copies[1..] {
        if responses != reference {
            return AssertionResult::fail(
                "Response convergence",
                &format!(
                    "{} has {:?} but {} has {:?}",
                    user, responses, first_user, reference
                ),
            );
        }
    }

    AssertionResult::pass(&format!(
        "All {} copies of {} agree on responses",
        copies.len(),
        event_id
    ))
}

/// Assert that no node carries content for `original` other than the
/// creator's.
///
/// Title, date, creator and publicity may only be set by the creator.
pub fn assert_creator_content_intact(topology: &TopologyState, original: &Event) -> AssertionResult {
    for node in &topology.nodes {
        let copy = node
            .current
            .get(&original.id)
            .or_else(|| node.past.get(&original.id));
        let Some(copy) = copy else { continue };

        if copy.title != original.title
            || copy.date != original.date
            || copy.creator_id != original.creator_id
            || copy.publicity != original.publicity
        {
            return AssertionResult::fail(
                "Creator authority",
                &format!(
                    "{} holds '{}' by {} instead of '{}' by {}",
                    node.user, copy.title, copy.creator_id, original.title, original.creator_id
                ),
            );
        }
    }

    AssertionResult::pass(&format!("Content of {} untouched everywhere", original.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use sync_types::{Attendance, Publicity};

    fn event() -> Event {
        Event::new("BBQ", Utc::now() + Duration::days(1), "A", Publicity::AutoShare)
    }

    fn node(user: &str, events: &[Event]) -> NodeState {
        NodeState {
            user: user.into(),
            current: events.iter().map(|e| (e.id, e.clone())).collect(),
            past: HashMap::new(),
        }
    }

    #[test]
    fn test_event_present_pass() {
        let e = event();
        assert!(assert_event_present(&node("B", &[e.clone()]), e.id).passed);
    }

    #[test]
    fn test_event_present_fail() {
        let result = assert_event_present(&node("B", &[]), event().id);
        assert!(!result.passed);
        assert!(result.failure_details.is_some());
    }

    #[test]
    fn test_event_absent_checks_past_too() {
        let e = event();
        let mut state = node("B", &[]);
        state.past.insert(e.id, e.clone());
        assert!(!assert_event_absent(&state, e.id).passed);
    }

    #[test]
    fn test_responses_converged_ignores_order() {
        let now = Utc::now();
        let e = event();
        let one = e.updating_responses(vec![
            Response::new("B", Attendance::Going, now),
            Response::new("C", Attendance::Maybe, now),
        ]);
        let two = e.updating_responses(vec![
            Response::new("C", Attendance::Maybe, now),
            Response::new("B", Attendance::Going, now),
        ]);
        let topology = TopologyState {
            nodes: vec![node("A", &[one]), node("B", &[two])],
        };

        assert!(assert_responses_converged(&topology, e.id).passed);
    }

    #[test]
    fn test_responses_diverged() {
        let now = Utc::now();
        let e = event();
        let topology = TopologyState {
            nodes: vec![
                node("A", &[e.updating_responses(vec![Response::new("B", Attendance::Going, now)])]),
                node("B", &[e.clone()]),
            ],
        };

        assert!(!assert_responses_converged(&topology, e.id).passed);
    }

    #[test]
    fn test_creator_content_tampered() {
        let original = event();
        let tampered = Event {
            title: "Not a BBQ".into(),
            ..original.clone()
        };
        let topology = TopologyState {
            nodes: vec![node("A", &[original.clone()]), node("B", &[tampered])],
        };

        assert!(!assert_creator_content_intact(&topology, &original).passed);
    }
}

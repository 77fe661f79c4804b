use std::collections::HashSet;

use serde::Serialize;

use super::model::Flow;

/// Result of walking a flow from its first step along each step's first
/// button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum JourneyOutcome {
    Empty,
    /// Reached a step without an outgoing target.
    Completed { path: Vec<String> },
    /// The last step of `path` points at an id that does not exist.
    BrokenChain { path: Vec<String>, missing: String },
    /// The chain came back to `revisited`, which is already in `path`.
    Cycle { path: Vec<String>, revisited: String },
}

impl JourneyOutcome {
    pub fn path(&self) -> &[String] {
        match self {
            JourneyOutcome::Empty => &[],
            JourneyOutcome::Completed { path }
            | JourneyOutcome::BrokenChain { path, .. }
            | JourneyOutcome::Cycle { path, .. } => path,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, JourneyOutcome::Completed { .. })
    }
}

pub fn simulate(flow: &Flow) -> JourneyOutcome {
    let Some(first) = flow.steps.first() else {
        return JourneyOutcome::Empty;
    };

    let mut path = vec![first.id.clone()];
    let mut seen: HashSet<&str> = HashSet::from([first.id.as_str()]);
    let mut current = first;

    while let Some(next_id) = current.first_target() {
        let Some(next) = flow.step(next_id) else {
            return JourneyOutcome::BrokenChain {
                path,
                missing: next_id.to_string(),
            };
        };
        if !seen.insert(next.id.as_str()) {
            return JourneyOutcome::Cycle {
                path,
                revisited: next.id.clone(),
            };
        }
        path.push(next.id.clone());
        current = next;
    }

    JourneyOutcome::Completed { path }
}

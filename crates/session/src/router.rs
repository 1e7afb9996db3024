use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceKind {
    Modal,
    TextField,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteState {
    #[default]
    Routed,
    Suppressed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteChange {
    Suppressed,
    Restored,
    Unchanged,
}

/// Surfaces are tracked by id, so a text field inside an open modal keeps
/// input suppressed until both are gone.
#[derive(Debug, Default)]
pub struct InputRouter {
    holders: BTreeMap<String, SurfaceKind>,
}

impl InputRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> RouteState {
        if self.holders.is_empty() {
            RouteState::Routed
        } else {
            RouteState::Suppressed
        }
    }

    pub fn allows_input(&self) -> bool {
        self.state() == RouteState::Routed
    }

    pub fn focus_gained(&mut self, surface_id: &str, kind: SurfaceKind) -> RouteChange {
        let before = self.state();
        self.holders.insert(surface_id.to_string(), kind);
        debug!(surface_id, ?kind, holders = self.holders.len(), "focus_gained");
        transition(before, self.state())
    }

    pub fn focus_lost(&mut self, surface_id: &str) -> RouteChange {
        let before = self.state();
        if self.holders.remove(surface_id).is_none() {
            return RouteChange::Unchanged;
        }
        debug!(surface_id, holders = self.holders.len(), "focus_lost");
        transition(before, self.state())
    }

    pub fn holders(&self) -> impl Iterator<Item = (&str, SurfaceKind)> {
        self.holders
            .iter()
            .map(|(surface_id, kind)| (surface_id.as_str(), *kind))
    }
}

fn transition(before: RouteState, after: RouteState) -> RouteChange {
    match (before, after) {
        (RouteState::Routed, RouteState::Suppressed) => RouteChange::Suppressed,
        (RouteState::Suppressed, RouteState::Routed) => RouteChange::Restored,
        _ => RouteChange::Unchanged,
    }
}

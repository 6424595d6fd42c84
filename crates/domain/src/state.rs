//! Entity state — a point-in-time snapshot of one connected thing.

use serde::{Deserialize, Serialize};

use crate::entity_id::EntityId;
use crate::time::{Timestamp, now};

/// Conventional state value for things that are on.
pub const STATE_ON: &str = "on";
/// Conventional state value for things that are off.
pub const STATE_OFF: &str = "off";
/// State value for entities whose real state has not been observed yet.
pub const STATE_UNKNOWN: &str = "unknown";

/// Free-form attribute mapping attached to a state.
pub type Attributes = serde_json::Map<String, serde_json::Value>;

/// A point-in-time snapshot of one entity.
///
/// Owned exclusively by the state store; everyone else sees clones.
/// Invariant: `last_updated >= last_changed`, and `last_changed` advances
/// only when the state *value* differs from the previous one — attribute
/// churn refreshes `last_updated` alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
    /// Which entity this snapshot describes.
    pub entity_id: EntityId,
    /// Current state value (`on`, `off`, `21.5`, …).
    pub state: String,
    /// Extra descriptive attributes (brightness, unit of measurement, …).
    #[serde(default)]
    pub attributes: Attributes,
    /// When the state value last changed.
    pub last_changed: Timestamp,
    /// When this snapshot was last written, changed or not.
    pub last_updated: Timestamp,
}

impl State {
    /// Create a fresh snapshot observed now.
    #[must_use]
    pub fn new(entity_id: EntityId, state: impl Into<String>, attributes: Attributes) -> Self {
        let ts = now();
        Self {
            entity_id,
            state: state.into(),
            attributes,
            last_changed: ts,
            last_updated: ts,
        }
    }

    /// Derive the successor snapshot for a newly submitted value.
    ///
    /// `last_updated` always advances; `last_changed` is carried over
    /// unless the state value itself differs.
    #[must_use]
    pub fn advance(&self, state: impl Into<String>, attributes: Attributes) -> Self {
        let state = state.into();
        let ts = now();
        Self {
            entity_id: self.entity_id.clone(),
            last_changed: if state == self.state {
                self.last_changed
            } else {
                ts
            },
            last_updated: ts,
            state,
            attributes,
        }
    }

    /// Look up a single attribute value.
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&serde_json::Value> {
        self.attributes.get(key)
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.entity_id, self.state)
    }
}

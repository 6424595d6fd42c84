//! Event — an immutable record of something that happened.
//!
//! Events are produced when entity state changes, services are called,
//! components finish loading, and the hub starts or stops. They are
//! read-only to listeners; everyone receives their own clone.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::id::EventId;
use crate::time::{Timestamp, now};

/// Fired by the state store on every write.
/// Payload: `entity_id`, `old_state` (null on first sight), `new_state`
/// (null on removal).
pub const EVENT_STATE_CHANGED: &str = "state_changed";
/// Fired by the service registry before a handler is dispatched.
/// Payload: `domain`, `service`, `data`.
pub const EVENT_SERVICE_CALL: &str = "service_call";
/// Fired by the bootstrap engine when a component completes setup.
/// Payload: `component`.
pub const EVENT_COMPONENT_LOADED: &str = "component_loaded";
/// Fired once when the hub starts.
pub const EVENT_HUB_START: &str = "start";
/// Fired once when the hub begins shutting down.
pub const EVENT_HUB_STOP: &str = "stop";

/// Listener registration wildcard matching every event kind.
pub const MATCH_ALL: &str = "*";

/// Payload key carrying the domain in `component_loaded` events.
pub const ATTR_COMPONENT: &str = "component";

/// Where an event originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventOrigin {
    /// Produced inside this hub process.
    #[default]
    Local,
    /// Relayed from another hub or an external source.
    Remote,
}

impl fmt::Display for EventOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("local"),
            Self::Remote => f.write_str("remote"),
        }
    }
}

/// An immutable record of something that happened.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Unique id, mostly useful for log correlation.
    pub id: EventId,
    /// Event kind (`state_changed`, `service_call`, …).
    pub kind: String,
    /// Free-form payload; by convention a JSON object.
    pub data: serde_json::Value,
    /// Where the event came from.
    pub origin: EventOrigin,
    /// When the event was fired.
    pub timestamp: Timestamp,
}

impl Event {
    /// Create an event stamped now.
    #[must_use]
    pub fn new(kind: impl Into<String>, data: serde_json::Value, origin: EventOrigin) -> Self {
        Self {
            id: EventId::new(),
            kind: kind.into(),
            data,
            origin,
            timestamp: now(),
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.kind, self.origin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_stamp_new_events_with_fresh_id_and_time() {
        let a = Event::new(EVENT_HUB_START, serde_json::json!({}), EventOrigin::Local);
        let b = Event::new(EVENT_HUB_START, serde_json::json!({}), EventOrigin::Local);

        assert_ne!(a.id, b.id);
        assert!(b.timestamp >= a.timestamp);
    }

    #[test]
    fn should_default_origin_to_local() {
        assert_eq!(EventOrigin::default(), EventOrigin::Local);
    }

    #[test]
    fn should_serialize_origin_lowercase() {
        assert_eq!(
            serde_json::to_string(&EventOrigin::Remote).unwrap(),
            "\"remote\""
        );
    }

    #[test]
    fn should_display_kind_and_origin() {
        let event = Event::new(
            EVENT_STATE_CHANGED,
            serde_json::json!({}),
            EventOrigin::Local,
        );
        assert_eq!(event.to_string(), "state_changed (local)");
    }

    #[test]
    fn should_roundtrip_through_serde_json() {
        let event = Event::new(
            EVENT_SERVICE_CALL,
            serde_json::json!({"domain": "light"}),
            EventOrigin::Remote,
        );
        let json = serde_json::to_string(&event).unwrap();
        let parsed: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.id, event.id);
        assert_eq!(parsed.kind, event.kind);
        assert_eq!(parsed.origin, EventOrigin::Remote);
    }
}

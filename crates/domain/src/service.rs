//! Service call — one dispatch of a named action.
//!
//! Examples: `light.turn_on`, `switch.toggle`, `climate.set_temperature`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::entity_id::EntityId;
use crate::error::InvalidEntityId;

/// Payload key addressing the entity a call targets.
pub const ATTR_ENTITY_ID: &str = "entity_id";

/// A single invocation of a registered service. Ephemeral — constructed
/// per call and handed to exactly one handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceCall {
    /// Domain owning the service (`light`).
    pub domain: String,
    /// Service name within the domain (`turn_on`).
    pub service: String,
    /// Free-form call payload; by convention a JSON object.
    pub data: serde_json::Value,
}

impl ServiceCall {
    /// Construct a call.
    #[must_use]
    pub fn new(
        domain: impl Into<String>,
        service: impl Into<String>,
        data: serde_json::Value,
    ) -> Self {
        Self {
            domain: domain.into(),
            service: service.into(),
            data,
        }
    }

    /// The raw `entity_id` payload field, if present.
    #[must_use]
    pub fn entity_id(&self) -> Option<&str> {
        self.data.get(ATTR_ENTITY_ID).and_then(|v| v.as_str())
    }

    /// The `entity_id` payload field parsed and validated.
    ///
    /// Returns `None` when the payload has no `entity_id` field.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidEntityId`] when the field is present but malformed.
    pub fn parse_entity_id(&self) -> Result<Option<EntityId>, InvalidEntityId> {
        self.entity_id().map(str::parse).transpose()
    }
}

impl fmt::Display for ServiceCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.domain, self.service)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_expose_entity_id_from_payload() {
        let call = ServiceCall::new(
            "light",
            "turn_on",
            serde_json::json!({"entity_id": "light.kitchen"}),
        );
        assert_eq!(call.entity_id(), Some("light.kitchen"));
        assert_eq!(
            call.parse_entity_id().unwrap().unwrap().as_str(),
            "light.kitchen"
        );
    }

    #[test]
    fn should_return_none_when_payload_has_no_entity_id() {
        let call = ServiceCall::new("light", "turn_on", serde_json::json!({}));
        assert_eq!(call.entity_id(), None);
        assert!(call.parse_entity_id().unwrap().is_none());
    }

    #[test]
    fn should_reject_malformed_entity_id_in_payload() {
        let call = ServiceCall::new(
            "light",
            "turn_on",
            serde_json::json!({"entity_id": "Not Valid"}),
        );
        assert!(call.parse_entity_id().is_err());
    }

    #[test]
    fn should_display_full_service_name() {
        let call = ServiceCall::new("switch", "toggle", serde_json::json!({}));
        assert_eq!(call.to_string(), "switch.toggle");
    }
}

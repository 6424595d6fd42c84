//! Entity identifiers — validated `domain.object_id` strings.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::InvalidEntityId;

/// Validated entity identifier of the form `domain.object_id`.
///
/// Both segments are non-empty and restricted to lowercase ASCII letters,
/// digits, and underscores (`light.kitchen`, `sensor.outside_temperature`).
/// Because validation happens at parse time, holding an `EntityId` is proof
/// the identifier is well formed — the store never re-checks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityId(String);

impl EntityId {
    /// Build an entity id from its two segments.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidEntityId`] if either segment is empty or contains a
    /// character outside `[a-z0-9_]`.
    pub fn new(domain: &str, object_id: &str) -> Result<Self, InvalidEntityId> {
        format!("{domain}.{object_id}").parse()
    }

    /// Domain segment (`light` in `light.kitchen`).
    #[must_use]
    pub fn domain(&self) -> &str {
        // Validated at construction, the dot is always present.
        self.0.split_once('.').map_or("", |(domain, _)| domain)
    }

    /// Object segment (`kitchen` in `light.kitchen`).
    #[must_use]
    pub fn object_id(&self) -> &str {
        self.0.split_once('.').map_or("", |(_, object_id)| object_id)
    }

    /// The full `domain.object_id` string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
}

impl FromStr for EntityId {
    type Err = InvalidEntityId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('.') {
            Some((domain, object_id)) if valid_segment(domain) && valid_segment(object_id) => {
                Ok(Self(s.to_string()))
            }
            _ => Err(InvalidEntityId(s.to_string())),
        }
    }
}

impl TryFrom<String> for EntityId {
    type Error = InvalidEntityId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EntityId> for String {
    fn from(id: EntityId) -> Self {
        id.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for EntityId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_parse_well_formed_entity_id() {
        let id: EntityId = "light.kitchen".parse().unwrap();
        assert_eq!(id.domain(), "light");
        assert_eq!(id.object_id(), "kitchen");
        assert_eq!(id.as_str(), "light.kitchen");
    }

    #[test]
    fn should_accept_digits_and_underscores() {
        assert!("sensor.outside_temperature_2".parse::<EntityId>().is_ok());
    }

    #[test]
    fn should_reject_missing_separator() {
        assert!("kitchen".parse::<EntityId>().is_err());
    }

    #[test]
    fn should_reject_uppercase() {
        assert!("Light.kitchen".parse::<EntityId>().is_err());
        assert!("light.Kitchen".parse::<EntityId>().is_err());
    }

    #[test]
    fn should_reject_empty_segments() {
        assert!(".kitchen".parse::<EntityId>().is_err());
        assert!("light.".parse::<EntityId>().is_err());
        assert!(".".parse::<EntityId>().is_err());
    }

    #[test]
    fn should_reject_extra_dots() {
        assert!("light.kitchen.lamp".parse::<EntityId>().is_err());
    }

    #[test]
    fn should_reject_spaces_and_dashes() {
        assert!("light.kitchen lamp".parse::<EntityId>().is_err());
        assert!("light.kitchen-lamp".parse::<EntityId>().is_err());
    }

    #[test]
    fn should_build_from_segments() {
        let id = EntityId::new("switch", "garden").unwrap();
        assert_eq!(id.as_str(), "switch.garden");
    }

    #[test]
    fn should_roundtrip_through_serde_json() {
        let id: EntityId = "light.kitchen".parse().unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"light.kitchen\"");
        let parsed: EntityId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn should_reject_invalid_id_during_deserialization() {
        let result: Result<EntityId, _> = serde_json::from_str("\"not an id\"");
        assert!(result.is_err());
    }
}

//! Platform contract — vendor/protocol providers scoped to one domain.
//!
//! A platform is the sub-variant of a component that knows one vendor or
//! protocol (`light` × `demo`, `switch` × `mqtt`). It discovers entities
//! and registers them through the [`EntityAdder`] capability instead of
//! touching the state store directly.

use std::sync::Arc;

use homehub_domain::entity_id::EntityId;
use homehub_domain::error::HubError;
use homehub_domain::state::Attributes;

use crate::component::Configuration;
use crate::hub::Hub;
use crate::state_store::StateStore;

/// Loaded-set key for a platform (`light.demo`).
#[must_use]
pub fn platform_path(domain: &str, platform_name: &str) -> String {
    format!("{domain}.{platform_name}")
}

/// Capability handed to platforms for registering discovered entities.
pub struct EntityAdder<'a> {
    states: &'a StateStore,
}

impl<'a> EntityAdder<'a> {
    pub(crate) fn new(states: &'a StateStore) -> Self {
        Self { states }
    }

    /// Register one entity with its initial state.
    pub fn add(&self, entity_id: EntityId, state: impl Into<String>, attributes: Attributes) {
        self.states.set(entity_id, state, attributes);
    }

    /// Register a batch of discovered entities.
    pub fn add_all(&self, entities: impl IntoIterator<Item = (EntityId, String, Attributes)>) {
        for (entity_id, state, attributes) in entities {
            self.add(entity_id, state, attributes);
        }
    }
}

/// A sub-variant of a component scoped to one domain plus one
/// vendor/protocol.
///
/// Loaded through [`Bootstrapper::setup_platform`]
/// (crate::bootstrap::Bootstrapper::setup_platform), which first makes
/// sure every declared dependency has completed its own setup.
pub trait Platform: Send + Sync {
    /// Parent domain the platform provides entities for (`light`).
    fn domain(&self) -> &str;

    /// Vendor/protocol name (`demo`).
    fn platform_name(&self) -> &str;

    /// Domains that must complete setup before this platform loads.
    fn dependencies(&self) -> Vec<String> {
        Vec::new()
    }

    /// Discover devices and register their entities through
    /// `add_entities`. `discovery_info` carries optional hints from
    /// whoever requested the load.
    ///
    /// # Errors
    ///
    /// Any [`HubError`] — logged by the engine, the platform path stays
    /// retryable.
    fn setup_platform(
        &self,
        hub: &Arc<Hub>,
        config: &Configuration,
        add_entities: &EntityAdder<'_>,
        discovery_info: Option<&serde_json::Value>,
    ) -> Result<(), HubError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_format_platform_path() {
        assert_eq!(platform_path("light", "demo"), "light.demo");
    }
}

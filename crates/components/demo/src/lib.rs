//! # homehub-component-demo
//!
//! Demo component that fills the hub with simulated devices so every part
//! of the kernel can be exercised without hardware.
//!
//! ## Provided entities
//!
//! | Entity ID | Behaviour |
//! |-----------|-----------|
//! | `light.ceiling` | Responds to `turn_on` / `turn_off` / `toggle` |
//! | `switch.decorative_lights` | Responds to `turn_on` / `turn_off` / `toggle` |
//! | `sensor.outside_temperature` | Holds a numeric reading with a unit attribute |
//!
//! The [`DemoLightPlatform`] adds one more light through the platform
//! path (`light.bed_light`) so the `setup_platform` contract is covered
//! too.
//!
//! ## Dependency rule
//! Depends on `homehub-core` (the integration surface) and
//! `homehub-domain` only.

use std::sync::{Arc, Weak};

use serde_json::json;
use tracing::{debug, warn};

use homehub_core::component::{Component, Configuration};
use homehub_core::hub::Hub;
use homehub_core::platform::{EntityAdder, Platform};
use homehub_domain::entity_id::EntityId;
use homehub_domain::error::HubError;
use homehub_domain::state::{Attributes, STATE_OFF, STATE_ON};

/// Domain claimed by the demo component.
pub const DOMAIN: &str = "demo";

/// Demo component: seeds simulated entities and registers the standard
/// `turn_on` / `turn_off` / `toggle` services for the stateful domains.
pub struct DemoComponent;

impl Component for DemoComponent {
    fn domain(&self) -> &str {
        DOMAIN
    }

    fn setup(&self, hub: &Arc<Hub>, _config: &Configuration) -> Result<(), HubError> {
        let mut brightness = Attributes::new();
        brightness.insert("brightness".to_string(), json!(180));
        hub.states
            .set("light.ceiling".parse()?, STATE_OFF, brightness);

        hub.states.set(
            "switch.decorative_lights".parse()?,
            STATE_ON,
            Attributes::new(),
        );

        let mut reading = Attributes::new();
        reading.insert("unit_of_measurement".to_string(), json!("°C"));
        hub.states
            .set("sensor.outside_temperature".parse()?, "15.6", reading);

        for domain in ["light", "switch"] {
            register_toggle_services(hub, domain);
        }

        debug!("demo entities seeded");
        Ok(())
    }
}

/// Register `turn_on`, `turn_off`, and `toggle` for a stateful domain,
/// implemented purely against the state store (these are simulated
/// devices — there is nothing to talk to).
fn register_toggle_services(hub: &Arc<Hub>, domain: &str) {
    for (service, target) in [("turn_on", STATE_ON), ("turn_off", STATE_OFF)] {
        let weak = Arc::downgrade(hub);
        hub.services.register(domain, service, move |call| {
            set_demo_state(&weak, call.parse_entity_id()?, target)
        });
    }

    let weak = Arc::downgrade(hub);
    hub.services.register(domain, "toggle", move |call| {
        let Some(hub) = weak.upgrade() else {
            return Ok(());
        };
        let Some(entity_id) = call.parse_entity_id()? else {
            warn!(service = %call, "call without entity_id");
            return Ok(());
        };
        let target = if hub.states.is_state(&entity_id, STATE_ON) {
            STATE_OFF
        } else {
            STATE_ON
        };
        set_demo_state(&Arc::downgrade(&hub), Some(entity_id), target)
    });
}

fn set_demo_state(
    hub: &Weak<Hub>,
    entity_id: Option<EntityId>,
    target: &str,
) -> Result<(), HubError> {
    let Some(hub) = hub.upgrade() else {
        return Ok(());
    };
    let Some(entity_id) = entity_id else {
        warn!("call without entity_id");
        return Ok(());
    };
    // Preserve whatever attributes the entity already carries.
    let attributes = hub
        .states
        .get(&entity_id)
        .map(|state| state.attributes)
        .unwrap_or_default();
    hub.states.set(entity_id, target, attributes);
    Ok(())
}

/// Demo platform for the `light` domain: adds one more simulated light
/// through the platform-loading path.
pub struct DemoLightPlatform;

impl Platform for DemoLightPlatform {
    fn domain(&self) -> &str {
        "light"
    }

    fn platform_name(&self) -> &str {
        DOMAIN
    }

    fn dependencies(&self) -> Vec<String> {
        vec![DOMAIN.to_string()]
    }

    fn setup_platform(
        &self,
        _hub: &Arc<Hub>,
        _config: &Configuration,
        add_entities: &EntityAdder<'_>,
        discovery_info: Option<&serde_json::Value>,
    ) -> Result<(), HubError> {
        let mut attributes = Attributes::new();
        attributes.insert("friendly_name".to_string(), json!("Bed Light"));
        if let Some(info) = discovery_info {
            attributes.insert("discovered_by".to_string(), info.clone());
        }
        add_entities.add("light.bed_light".parse()?, STATE_OFF, attributes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use homehub_core::bootstrap::Bootstrapper;
    use homehub_core::component::ComponentRegistry;
    use homehub_core::hub::HubConfig;
    use std::time::Duration;

    fn demo_hub() -> (Arc<Hub>, Bootstrapper) {
        let hub = Hub::new(HubConfig {
            initial_workers: 2,
            shutdown_grace: Duration::from_secs(2),
        });
        let mut registry = ComponentRegistry::new();
        registry.register(Arc::new(DemoComponent));
        registry.register_platform(Arc::new(DemoLightPlatform));
        let engine = Bootstrapper::new(registry);
        engine
            .setup_component(&hub, DOMAIN, &Configuration::new())
            .unwrap();
        (hub, engine)
    }

    fn ceiling() -> EntityId {
        "light.ceiling".parse().unwrap()
    }

    #[test]
    fn should_seed_demo_entities_on_setup() {
        let (hub, _engine) = demo_hub();

        assert!(hub.states.is_state(&ceiling(), STATE_OFF));
        assert!(
            hub.states
                .is_state(&"switch.decorative_lights".parse().unwrap(), STATE_ON)
        );
        let sensor = hub
            .states
            .get(&"sensor.outside_temperature".parse().unwrap())
            .unwrap();
        assert_eq!(sensor.state, "15.6");
        assert_eq!(sensor.attribute("unit_of_measurement"), Some(&json!("°C")));
    }

    #[test]
    fn should_register_services_for_stateful_domains() {
        let (hub, _engine) = demo_hub();

        for service in ["turn_on", "turn_off", "toggle"] {
            assert!(hub.services.has_service("light", service));
            assert!(hub.services.has_service("switch", service));
        }
    }

    #[test]
    fn should_turn_light_on_via_blocking_call() {
        let (hub, _engine) = demo_hub();

        hub.services
            .call(
                "light",
                "turn_on",
                json!({"entity_id": "light.ceiling"}),
                true,
            )
            .unwrap();

        assert!(hub.states.is_state(&ceiling(), STATE_ON));
    }

    #[test]
    fn should_preserve_attributes_when_toggling() {
        let (hub, _engine) = demo_hub();

        hub.services
            .call(
                "light",
                "toggle",
                json!({"entity_id": "light.ceiling"}),
                true,
            )
            .unwrap();

        let state = hub.states.get(&ceiling()).unwrap();
        assert_eq!(state.state, STATE_ON);
        assert_eq!(state.attribute("brightness"), Some(&json!(180)));
    }

    #[test]
    fn should_toggle_back_off() {
        let (hub, _engine) = demo_hub();

        for _ in 0..2 {
            hub.services
                .call(
                    "light",
                    "toggle",
                    json!({"entity_id": "light.ceiling"}),
                    true,
                )
                .unwrap();
        }

        assert!(hub.states.is_state(&ceiling(), STATE_OFF));
    }

    #[test]
    fn should_ignore_call_without_entity_id() {
        let (hub, _engine) = demo_hub();

        hub.services
            .call("light", "turn_on", json!({}), true)
            .unwrap();

        assert!(hub.states.is_state(&ceiling(), STATE_OFF));
    }

    #[test]
    fn should_add_bed_light_through_platform() {
        let (hub, engine) = demo_hub();

        engine
            .setup_platform(&hub, "light", DOMAIN, &Configuration::new(), None)
            .unwrap();

        assert!(
            hub.states
                .is_state(&"light.bed_light".parse().unwrap(), STATE_OFF)
        );
        assert!(hub.has_component("light.demo"));
    }

    #[test]
    fn should_record_discovery_info_when_provided() {
        let (hub, engine) = demo_hub();

        engine
            .setup_platform(
                &hub,
                "light",
                DOMAIN,
                &Configuration::new(),
                Some(&json!("bridge_scan")),
            )
            .unwrap();

        let state = hub
            .states
            .get(&"light.bed_light".parse().unwrap())
            .unwrap();
        assert_eq!(state.attribute("discovered_by"), Some(&json!("bridge_scan")));
    }
}

//! Bootstrap engine — resolves dependency graphs and activates components.
//!
//! Setup of a single domain happens at most once per process, is never
//! reentrant, and always runs with its dependencies already complete.
//! Failures are contained: the failing domain stays retryable and the
//! rest of the hub keeps running.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use serde_json::json;
use tracing::{error, info, warn};

use homehub_domain::error::HubError;
use homehub_domain::event::{ATTR_COMPONENT, EVENT_COMPONENT_LOADED};

use crate::component::{ComponentRegistry, Configuration, DependencyError};
use crate::hub::{BeginSetup, Hub};
use crate::platform::{EntityAdder, platform_path};

/// Default domain treated as the coordination layer for pool sizing.
pub const DEFAULT_COORDINATION_DOMAIN: &str = "group";

/// Reasons a setup request failed. The name involved is always left
/// retryable — nothing is recorded as complete.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    /// The dependency closure could not be resolved.
    #[error(transparent)]
    Dependency(#[from] DependencyError),
    /// Setup re-entered a domain that is mid-setup on the same thread.
    #[error("component `{domain}` is already being set up")]
    Reentrant {
        /// The re-entered domain.
        domain: String,
    },
    /// The component's own `setup` reported failure.
    #[error("component `{domain}` failed to set up")]
    Failed {
        /// The failing domain or platform path.
        domain: String,
    },
    /// No platform registered under the requested path.
    #[error("unknown platform `{path}`")]
    UnknownPlatform {
        /// The unresolvable `domain.platform` path.
        path: String,
    },
}

/// Activates components against a hub, dependencies first.
pub struct Bootstrapper {
    registry: ComponentRegistry,
    coordination_domain: String,
}

impl Bootstrapper {
    /// Create an engine over a registry of available components.
    #[must_use]
    pub fn new(registry: ComponentRegistry) -> Self {
        Self {
            registry,
            coordination_domain: DEFAULT_COORDINATION_DOMAIN.to_string(),
        }
    }

    /// Override the coordination domain.
    ///
    /// A component that does *not* depend on it is assumed to talk to
    /// devices directly — likely blocking I/O — and earns the pool one
    /// extra worker when it loads. A sizing heuristic, hence configurable.
    #[must_use]
    pub fn with_coordination_domain(mut self, domain: impl Into<String>) -> Self {
        self.coordination_domain = domain.into();
        self
    }

    /// Access the underlying registry.
    #[must_use]
    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// Set up `domain` and everything it depends on.
    ///
    /// Idempotent: an already-complete domain returns `Ok` immediately. A
    /// failing member aborts the chain before later members run.
    ///
    /// # Errors
    ///
    /// [`SetupError`] describing the first resolution or setup failure;
    /// the domain remains retryable.
    pub fn setup_component(
        &self,
        hub: &Arc<Hub>,
        domain: &str,
        config: &Configuration,
    ) -> Result<(), SetupError> {
        if hub.has_component(domain) {
            return Ok(());
        }
        let order = self.registry.load_order(domain).map_err(|err| {
            warn!(%domain, %err, "cannot resolve dependencies");
            err
        })?;
        for member in &order {
            self.setup_single(hub, member, config)?;
        }
        Ok(())
    }

    /// Set up every domain named in `config`, resolving dependencies as
    /// needed. Returns the number of requested domains that completed;
    /// individual failures are logged and do not abort the rest.
    pub fn setup_all(&self, hub: &Arc<Hub>, config: &Configuration) -> usize {
        let mut done = 0;
        let mut seen: Vec<&str> = Vec::new();
        for key in config.keys() {
            let domain = key.split_whitespace().next().unwrap_or(key);
            if seen.contains(&domain) {
                continue;
            }
            seen.push(domain);
            match self.setup_component(hub, domain, config) {
                Ok(()) => done += 1,
                Err(err) => warn!(%domain, %err, "component not set up"),
            }
        }
        done
    }

    fn setup_single(
        &self,
        hub: &Arc<Hub>,
        domain: &str,
        config: &Configuration,
    ) -> Result<(), SetupError> {
        let Some(component) = self.registry.get(domain) else {
            return Err(DependencyError::Unknown {
                domain: domain.to_string(),
            }
            .into());
        };

        match hub.begin_setup(domain) {
            BeginSetup::AlreadyLoaded => return Ok(()),
            BeginSetup::Reentrant => {
                error!(%domain, "attempt to set up component inside its own setup");
                return Err(SetupError::Reentrant {
                    domain: domain.to_string(),
                });
            }
            BeginSetup::Started => {}
        }

        info!(%domain, "setting up component");
        match contain(|| component.setup(hub, config)) {
            Ok(()) => {
                let coordination_only = component
                    .dependencies()
                    .iter()
                    .any(|dependency| dependency == &self.coordination_domain);
                hub.complete_setup(domain, !coordination_only);
                hub.bus
                    .fire(EVENT_COMPONENT_LOADED, json!({ ATTR_COMPONENT: domain }));
                info!(%domain, "component setup complete");
                Ok(())
            }
            Err(err) => {
                hub.abort_setup(domain);
                error!(%domain, %err, "error during setup of component");
                Err(SetupError::Failed {
                    domain: domain.to_string(),
                })
            }
        }
    }

    /// Load a platform: make sure its declared dependencies are complete,
    /// then run its `setup_platform` exactly once per process.
    ///
    /// # Errors
    ///
    /// [`SetupError`] when the platform is unknown, a dependency cannot be
    /// set up, or the platform itself fails; the path stays retryable.
    pub fn setup_platform(
        &self,
        hub: &Arc<Hub>,
        domain: &str,
        platform_name: &str,
        config: &Configuration,
        discovery_info: Option<&serde_json::Value>,
    ) -> Result<(), SetupError> {
        let path = platform_path(domain, platform_name);
        let Some(platform) = self.registry.get_platform(&path) else {
            error!(platform = %path, "unable to find platform");
            return Err(SetupError::UnknownPlatform { path });
        };

        for dependency in platform.dependencies() {
            self.setup_component(hub, &dependency, config).map_err(|err| {
                error!(platform = %path, %dependency, "cannot prepare platform, dependency failed");
                err
            })?;
        }

        match hub.begin_setup(&path) {
            BeginSetup::AlreadyLoaded => return Ok(()),
            BeginSetup::Reentrant => {
                error!(platform = %path, "attempt to set up platform inside its own setup");
                return Err(SetupError::Reentrant { domain: path });
            }
            BeginSetup::Started => {}
        }

        info!(platform = %path, "setting up platform");
        let add_entities = EntityAdder::new(&hub.states);
        match contain(|| platform.setup_platform(hub, config, &add_entities, discovery_info)) {
            Ok(()) => {
                // Platforms never grow the pool; their parent component
                // already did.
                hub.complete_setup(&path, false);
                info!(platform = %path, "platform setup complete");
                Ok(())
            }
            Err(err) => {
                hub.abort_setup(&path);
                error!(platform = %path, %err, "error during setup of platform");
                Err(SetupError::Failed { domain: path })
            }
        }
    }
}

/// Run integration-owned setup code, turning a panic into an ordinary
/// failure so the bootstrap bookkeeping always unwinds cleanly.
fn contain(setup: impl FnOnce() -> Result<(), HubError>) -> Result<(), HubError> {
    match catch_unwind(AssertUnwindSafe(setup)) {
        Ok(result) => result,
        Err(_) => Err(HubError::integration("setup panicked")),
    }
}

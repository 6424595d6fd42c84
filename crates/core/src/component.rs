//! Component contract and registry — the pluggable integration surface.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use homehub_domain::error::HubError;

use crate::hub::Hub;
use crate::platform::Platform;

/// Per-process configuration handed to every `setup`, keyed by domain.
/// Section keys may carry a qualifier (`sensor 2`); the first word names
/// the domain.
pub type Configuration = serde_json::Map<String, serde_json::Value>;

/// A loadable unit of integration code.
///
/// The bootstrap engine guarantees [`setup`](Self::setup) is invoked at
/// most once per process per domain, never reentrantly, and only after
/// every domain in [`dependencies`](Self::dependencies) has completed its
/// own setup.
pub trait Component: Send + Sync {
    /// Domain this component claims (`light`, `switch`, …).
    fn domain(&self) -> &str;

    /// Domains that must complete setup before this one is attempted.
    fn dependencies(&self) -> Vec<String> {
        Vec::new()
    }

    /// Initialise the component: register services, seed entities, attach
    /// listeners. An error leaves the domain unloaded and retryable.
    ///
    /// # Errors
    ///
    /// Any [`HubError`] — the engine logs it and reports setup failure;
    /// it is never propagated further.
    fn setup(&self, hub: &Arc<Hub>, config: &Configuration) -> Result<(), HubError>;
}

/// Failure to resolve a component's dependency closure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DependencyError {
    /// A named domain has no registered component.
    #[error("unknown component `{domain}`")]
    Unknown {
        /// The unresolvable domain.
        domain: String,
    },
    /// The dependency graph loops back on itself.
    #[error("circular dependency involving `{domain}`")]
    Cycle {
        /// The domain at which the loop was detected.
        domain: String,
    },
}

/// Registry of available components and platforms.
///
/// Components are recorded in discovery order, which doubles as the
/// tie-break when resolving dependency-equal siblings.
#[derive(Default)]
pub struct ComponentRegistry {
    components: Vec<Arc<dyn Component>>,
    index: HashMap<String, usize>,
    platforms: HashMap<String, Arc<dyn Platform>>,
}

impl ComponentRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component. Re-registering a domain replaces the previous
    /// component (logged).
    pub fn register(&mut self, component: Arc<dyn Component>) {
        let domain = component.domain().to_string();
        match self.index.get(&domain) {
            Some(&position) => {
                warn!(%domain, "replacing registered component");
                self.components[position] = component;
            }
            None => {
                debug!(%domain, "registered component");
                self.index.insert(domain, self.components.len());
                self.components.push(component);
            }
        }
    }

    /// Register a platform under its `domain.platform_name` path.
    pub fn register_platform(&mut self, platform: Arc<dyn Platform>) {
        let path = format!("{}.{}", platform.domain(), platform.platform_name());
        if self.platforms.insert(path.clone(), platform).is_some() {
            warn!(%path, "replacing registered platform");
        } else {
            debug!(%path, "registered platform");
        }
    }

    /// Look up a component by domain.
    #[must_use]
    pub fn get(&self, domain: &str) -> Option<Arc<dyn Component>> {
        self.index
            .get(domain)
            .map(|&position| Arc::clone(&self.components[position]))
    }

    /// Look up a platform by its `domain.platform_name` path.
    #[must_use]
    pub fn get_platform(&self, path: &str) -> Option<Arc<dyn Platform>> {
        self.platforms.get(path).cloned()
    }

    /// Registered domains in discovery order.
    #[must_use]
    pub fn domains(&self) -> Vec<String> {
        self.components
            .iter()
            .map(|component| component.domain().to_string())
            .collect()
    }

    /// Resolve the full load order for `domain`: every transitive
    /// dependency strictly before its dependents, stable with respect to
    /// declaration order.
    ///
    /// # Errors
    ///
    /// [`DependencyError`] on unknown domains or cycles, in which case no
    /// partial order is returned and nothing should be set up.
    pub fn load_order(&self, domain: &str) -> Result<Vec<String>, DependencyError> {
        let mut order = Vec::new();
        let mut resolving = Vec::new();
        self.visit(domain, &mut order, &mut resolving)?;
        Ok(order)
    }

    fn visit(
        &self,
        domain: &str,
        order: &mut Vec<String>,
        resolving: &mut Vec<String>,
    ) -> Result<(), DependencyError> {
        if order.iter().any(|done| done == domain) {
            return Ok(());
        }
        if resolving.iter().any(|pending| pending == domain) {
            return Err(DependencyError::Cycle {
                domain: domain.to_string(),
            });
        }
        let component = self.get(domain).ok_or_else(|| DependencyError::Unknown {
            domain: domain.to_string(),
        })?;
        resolving.push(domain.to_string());
        for dependency in component.dependencies() {
            self.visit(&dependency, order, resolving)?;
        }
        resolving.pop();
        order.push(domain.to_string());
        Ok(())
    }
}

//! Service registry — dispatches named actions onto the worker pool.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use crossbeam::channel::bounded;
use serde_json::json;
use tracing::{debug, warn};

use homehub_domain::error::HubError;
use homehub_domain::event::EVENT_SERVICE_CALL;
use homehub_domain::service::ServiceCall;

use crate::event_bus::EventBus;
use crate::worker_pool::{Job, WorkerPool};

/// Handler invoked with each call to its service.
pub type ServiceHandler = Arc<dyn Fn(&ServiceCall) -> Result<(), HubError> + Send + Sync>;

/// Registry of named actions, keyed `(domain, service)`.
///
/// Handlers always execute on the worker pool — a slow handler can never
/// block the caller or the bus. Callers opt into waiting for completion
/// via the `blocking` flag on [`call`](Self::call).
pub struct ServiceRegistry {
    services: RwLock<HashMap<String, HashMap<String, ServiceHandler>>>,
    bus: Arc<EventBus>,
    pool: Arc<WorkerPool>,
}

impl ServiceRegistry {
    /// Create a registry dispatching onto `pool` and auditing on `bus`.
    #[must_use]
    pub fn new(bus: Arc<EventBus>, pool: Arc<WorkerPool>) -> Self {
        Self {
            services: RwLock::new(HashMap::new()),
            bus,
            pool,
        }
    }

    /// Register a handler for `domain.service`. Re-registering the same
    /// pair overwrites the previous handler (logged).
    pub fn register(
        &self,
        domain: impl Into<String>,
        service: impl Into<String>,
        handler: impl Fn(&ServiceCall) -> Result<(), HubError> + Send + Sync + 'static,
    ) {
        let domain = domain.into();
        let service = service.into();
        let mut services = self.services.write().unwrap_or_else(PoisonError::into_inner);
        let previous = services
            .entry(domain.clone())
            .or_default()
            .insert(service.clone(), Arc::new(handler));
        if previous.is_some() {
            warn!(service = %format!("{domain}.{service}"), "overwriting service handler");
        } else {
            debug!(service = %format!("{domain}.{service}"), "registered service");
        }
    }

    /// Whether `(domain, service)` is registered.
    #[must_use]
    pub fn has_service(&self, domain: &str, service: &str) -> bool {
        self.services
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(domain)
            .is_some_and(|names| names.contains_key(service))
    }

    /// All registered services, names sorted within each domain.
    #[must_use]
    pub fn services(&self) -> BTreeMap<String, Vec<String>> {
        let services = self.services.read().unwrap_or_else(PoisonError::into_inner);
        services
            .iter()
            .map(|(domain, names)| {
                let mut names: Vec<String> = names.keys().cloned().collect();
                names.sort();
                (domain.clone(), names)
            })
            .collect()
    }

    /// Call a service.
    ///
    /// Fires `service_call` (the audit hook for listeners), then
    /// dispatches the handler onto the worker pool. With `blocking`, the
    /// caller suspends until the handler finishes — success, failure, or
    /// panic — signalled by a completion channel, not a poll. Without it,
    /// the call returns once the work is enqueued; handler failures are
    /// caught and logged, never propagated.
    ///
    /// # Errors
    ///
    /// [`HubError::UnknownService`] when nothing is registered under
    /// `(domain, service)` — a warned no-op — and
    /// [`HubError::PoolUnavailable`] when the pool refuses the job.
    pub fn call(
        &self,
        domain: &str,
        service: &str,
        data: serde_json::Value,
        blocking: bool,
    ) -> Result<(), HubError> {
        let handler = {
            let services = self.services.read().unwrap_or_else(PoisonError::into_inner);
            services
                .get(domain)
                .and_then(|names| names.get(service))
                .cloned()
        };
        let Some(handler) = handler else {
            warn!(service = %format!("{domain}.{service}"), "call to unknown service");
            return Err(HubError::UnknownService {
                domain: domain.to_string(),
                service: service.to_string(),
            });
        };

        self.bus.fire(
            EVENT_SERVICE_CALL,
            json!({
                "domain": domain,
                "service": service,
                "data": data.clone(),
            }),
        );

        let call = ServiceCall::new(domain, service, data);
        // Dropping the sender is the completion signal: it happens when
        // the handler returns, and during unwind if it panics.
        let (done_tx, done_rx) = bounded::<()>(1);
        let job = Job::new(format!("service {call}"), move || {
            let _done = done_tx;
            if let Err(err) = handler(&call) {
                warn!(service = %call, %err, "service handler failed");
            }
        });
        self.pool.submit(job)?;

        if blocking {
            let _ = done_rx.recv();
        }
        Ok(())
    }
}

//! Event bus — in-process publish/subscribe at the heart of the hub.
//!
//! Everything observable in the hub flows through here: state changes,
//! service calls, component loads, lifecycle events. Listener callbacks
//! are dispatched onto the worker pool so a slow listener can never stall
//! the firer.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, warn};

use homehub_domain::error::HubError;
use homehub_domain::event::{Event, EventOrigin, MATCH_ALL};

use crate::worker_pool::{Job, WorkerPool};

/// Callback invoked with the listener's own clone of each matching event.
pub type ListenerCallback = Arc<dyn Fn(Event) -> Result<(), HubError> + Send + Sync>;

/// Handle identifying one listener registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerToken(u64);

/// Where a listener's callback runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DispatchMode {
    /// On a worker thread (the default).
    Pool,
    /// Synchronously inside `fire`, before it returns.
    CallerThread,
}

struct Registration {
    token: ListenerToken,
    kind: String,
    callback: ListenerCallback,
    once: bool,
    mode: DispatchMode,
}

impl Registration {
    fn matches(&self, kind: &str) -> bool {
        self.kind == MATCH_ALL || self.kind == kind
    }
}

/// In-process event bus.
///
/// Per-kind delivery order follows `fire` order. The registry is walked
/// under its lock at fire time, so listeners added or removed during a
/// dispatch neither miss nor duplicate that dispatch relative to the
/// snapshot `fire` took.
pub struct EventBus {
    listeners: RwLock<Vec<Registration>>,
    next_token: AtomicU64,
    pool: Arc<WorkerPool>,
}

impl EventBus {
    /// Create a bus dispatching onto `pool`.
    #[must_use]
    pub fn new(pool: Arc<WorkerPool>) -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
            next_token: AtomicU64::new(0),
            pool,
        }
    }

    /// Fire a locally originated event. See [`fire_from`](Self::fire_from).
    pub fn fire(&self, kind: &str, data: serde_json::Value) {
        self.fire_from(kind, data, EventOrigin::Local);
    }

    /// Fire an event to every listener registered for `kind` or the
    /// wildcard, in registration order.
    ///
    /// Returns as soon as deliveries are enqueued; only listeners
    /// registered via [`listen_on_caller`](Self::listen_on_caller) run
    /// before the return. A failing callback is logged and never affects
    /// other listeners or the firer.
    pub fn fire_from(&self, kind: &str, data: serde_json::Value, origin: EventOrigin) {
        let event = Event::new(kind, data, origin);
        debug!(event = %event, "firing");

        let mut inline = Vec::new();
        {
            // Matching `once` registrations are removed in the same
            // critical section that schedules them, so they cannot fire
            // twice under concurrent producers. Pooled deliveries are
            // enqueued under the lock, so per-kind queue order equals
            // fire order.
            let mut listeners = self
                .listeners
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            listeners.retain(|registration| {
                if !registration.matches(&event.kind) {
                    return true;
                }
                match registration.mode {
                    DispatchMode::CallerThread => {
                        inline.push(Arc::clone(&registration.callback));
                    }
                    DispatchMode::Pool => {
                        let callback = Arc::clone(&registration.callback);
                        let event = event.clone();
                        let job = Job::new(format!("listener for `{kind}`"), move || {
                            let kind = event.kind.clone();
                            if let Err(err) = callback(event) {
                                warn!(%kind, %err, "listener failed");
                            }
                        });
                        if let Err(err) = self.pool.submit(job) {
                            warn!(%err, "listener delivery dropped");
                        }
                    }
                }
                !registration.once
            });
        }

        for callback in inline {
            if let Err(err) = callback(event.clone()) {
                warn!(kind = %event.kind, %err, "caller-thread listener failed");
            }
        }
    }

    /// Register a listener for `kind` (or [`MATCH_ALL`]). The callback
    /// runs on a worker thread.
    pub fn listen(
        &self,
        kind: impl Into<String>,
        callback: impl Fn(Event) -> Result<(), HubError> + Send + Sync + 'static,
    ) -> ListenerToken {
        self.add(kind.into(), Arc::new(callback), false, DispatchMode::Pool)
    }

    /// Register a listener that is removed atomically with its first
    /// invocation being scheduled — it never fires twice, even when
    /// matching events are fired concurrently.
    pub fn listen_once(
        &self,
        kind: impl Into<String>,
        callback: impl Fn(Event) -> Result<(), HubError> + Send + Sync + 'static,
    ) -> ListenerToken {
        self.add(kind.into(), Arc::new(callback), true, DispatchMode::Pool)
    }

    /// Register a listener that runs synchronously on the firing thread,
    /// before `fire` returns.
    ///
    /// Reserved for startup/shutdown sequencing that needs strict
    /// ordering. The callback must stay short and must not write back
    /// into the state store for the entity being written.
    pub fn listen_on_caller(
        &self,
        kind: impl Into<String>,
        callback: impl Fn(Event) -> Result<(), HubError> + Send + Sync + 'static,
    ) -> ListenerToken {
        self.add(
            kind.into(),
            Arc::new(callback),
            false,
            DispatchMode::CallerThread,
        )
    }

    fn add(
        &self,
        kind: String,
        callback: ListenerCallback,
        once: bool,
        mode: DispatchMode,
    ) -> ListenerToken {
        let token = ListenerToken(self.next_token.fetch_add(1, Ordering::Relaxed));
        let mut listeners = self
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        listeners.push(Registration {
            token,
            kind,
            callback,
            once,
            mode,
        });
        token
    }

    /// Remove a listener. Returns whether the token was still registered.
    pub fn remove_listener(&self, token: ListenerToken) -> bool {
        let mut listeners = self
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|registration| registration.token != token);
        listeners.len() < before
    }

    /// Registered listener counts per kind (wildcards under `*`).
    #[must_use]
    pub fn listeners(&self) -> BTreeMap<String, usize> {
        let listeners = self.listeners.read().unwrap_or_else(PoisonError::into_inner);
        let mut counts = BTreeMap::new();
        for registration in listeners.iter() {
            *counts.entry(registration.kind.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Total number of registrations.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

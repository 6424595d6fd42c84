//! Hub — composition root owning every kernel resource.
//!
//! One instance per process, passed explicitly to components; there are no
//! ambient singletons. Lifecycle is cooperative: `start`/`stop` events on
//! the bus, a shutdown request cell, and a grace-period pool drain.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::ThreadId;
use std::time::Duration;

use serde_json::json;
use tracing::info;

use homehub_domain::event::{EVENT_HUB_START, EVENT_HUB_STOP};

use crate::event_bus::EventBus;
use crate::service_registry::ServiceRegistry;
use crate::state_store::StateStore;
use crate::worker_pool::{MIN_WORKERS, WorkerPool};

/// Exit code asking the external supervisor for a restart.
pub const RESTART_EXIT_CODE: i32 = 100;

/// Tunables for constructing a [`Hub`].
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Worker threads to start with (clamped to [`MIN_WORKERS`]).
    pub initial_workers: usize,
    /// How long shutdown waits for in-flight jobs before abandoning them.
    pub shutdown_grace: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            initial_workers: MIN_WORKERS,
            shutdown_grace: Duration::from_secs(10),
        }
    }
}

/// Outcome of asking to begin setting up a domain or platform path.
pub(crate) enum BeginSetup {
    /// Setup already completed — nothing to do.
    AlreadyLoaded,
    /// The same thread is already mid-setup for this name.
    Reentrant,
    /// The caller owns the setup now and must complete or abort it.
    Started,
}

#[derive(Default)]
struct TrackerState {
    /// Completed components and platform paths, in completion order.
    loaded: Vec<String>,
    /// Names currently being set up, with the thread doing it.
    in_progress: HashMap<String, ThreadId>,
}

/// Root of the hub: owns the bus, state store, service registry, worker
/// pool, and component bookkeeping.
pub struct Hub {
    /// Publish/subscribe event bus.
    pub bus: Arc<EventBus>,
    /// Entity state store.
    pub states: StateStore,
    /// Service registry.
    pub services: ServiceRegistry,
    /// Worker pool executing listener and handler jobs.
    pub pool: Arc<WorkerPool>,
    tracker: Mutex<TrackerState>,
    tracker_changed: Condvar,
    shutdown_code: Mutex<Option<i32>>,
    shutdown_requested: Condvar,
    shutdown_grace: Duration,
}

impl Hub {
    /// Build a hub and its worker pool.
    #[must_use]
    pub fn new(config: HubConfig) -> Arc<Self> {
        let pool = Arc::new(WorkerPool::new(config.initial_workers));
        let bus = Arc::new(EventBus::new(Arc::clone(&pool)));
        Arc::new(Self {
            states: StateStore::new(Arc::clone(&bus)),
            services: ServiceRegistry::new(Arc::clone(&bus), Arc::clone(&pool)),
            bus,
            pool,
            tracker: Mutex::new(TrackerState::default()),
            tracker_changed: Condvar::new(),
            shutdown_code: Mutex::new(None),
            shutdown_requested: Condvar::new(),
            shutdown_grace: config.shutdown_grace,
        })
    }

    /// Announce the hub is up: fires `start`.
    pub fn start(&self) {
        info!("starting hub");
        self.bus.fire(EVENT_HUB_START, json!({}));
    }

    /// Shut down: fires `stop` (observable by caller-thread listeners
    /// before any teardown), then drains the worker pool within the
    /// configured grace period.
    pub fn stop(&self) {
        info!("stopping hub");
        self.bus.fire(EVENT_HUB_STOP, json!({}));
        self.pool.block_till_done(self.shutdown_grace);
    }

    /// Ask [`block_till_stopped`](Self::block_till_stopped) to return with
    /// `exit_code`. The first request wins; later ones are ignored.
    pub fn request_shutdown(&self, exit_code: i32) {
        let mut code = self
            .shutdown_code
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if code.is_none() {
            *code = Some(exit_code);
            self.shutdown_requested.notify_all();
        }
    }

    /// Ask for a restart: shutdown with [`RESTART_EXIT_CODE`], which the
    /// external supervisor interprets as "start me again".
    pub fn request_restart(&self) {
        self.request_shutdown(RESTART_EXIT_CODE);
    }

    /// Park the calling thread until a shutdown is requested, run the stop
    /// sequence, and return the exit code for the supervisor.
    #[must_use]
    pub fn block_till_stopped(&self) -> i32 {
        let mut code = self
            .shutdown_code
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        loop {
            if let Some(exit_code) = *code {
                drop(code);
                self.stop();
                return exit_code;
            }
            code = self
                .shutdown_requested
                .wait(code)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Loaded components and platform paths, in completion order.
    #[must_use]
    pub fn components(&self) -> Vec<String> {
        self.tracker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .loaded
            .clone()
    }

    /// Whether `domain` (or a platform path) has completed setup.
    #[must_use]
    pub fn has_component(&self, domain: &str) -> bool {
        self.tracker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .loaded
            .iter()
            .any(|loaded| loaded == domain)
    }

    /// Claim the right to set up `domain`.
    ///
    /// A different thread mid-setup for the same name makes the caller
    /// wait and then observe completion; the *same* thread re-entering is
    /// a recursion bug reported as [`BeginSetup::Reentrant`] instead of a
    /// deadlock. No lock is held by the claimant afterwards, so setups may
    /// nest across domains.
    pub(crate) fn begin_setup(&self, domain: &str) -> BeginSetup {
        let me = std::thread::current().id();
        let mut state = self.tracker.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if state.loaded.iter().any(|loaded| loaded == domain) {
                return BeginSetup::AlreadyLoaded;
            }
            match state.in_progress.get(domain) {
                Some(owner) if *owner == me => return BeginSetup::Reentrant,
                Some(_) => {
                    state = self
                        .tracker_changed
                        .wait(state)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                None => {
                    state.in_progress.insert(domain.to_string(), me);
                    return BeginSetup::Started;
                }
            }
        }
    }

    /// Record a successful setup. Pool growth shares the tracker critical
    /// section, keeping pool size consistent with the loaded set.
    pub(crate) fn complete_setup(&self, domain: &str, grow_pool: bool) {
        let mut state = self.tracker.lock().unwrap_or_else(PoisonError::into_inner);
        state.in_progress.remove(domain);
        if !state.loaded.iter().any(|loaded| loaded == domain) {
            state.loaded.push(domain.to_string());
        }
        if grow_pool {
            self.pool.add_worker();
        }
        drop(state);
        self.tracker_changed.notify_all();
    }

    /// Record a failed setup, leaving the name retryable.
    pub(crate) fn abort_setup(&self, domain: &str) {
        let mut state = self.tracker.lock().unwrap_or_else(PoisonError::into_inner);
        state.in_progress.remove(domain);
        drop(state);
        self.tracker_changed.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam::channel::unbounded;
    use std::time::Duration;

    fn hub() -> Arc<Hub> {
        Hub::new(HubConfig {
            initial_workers: 2,
            shutdown_grace: Duration::from_secs(2),
        })
    }

    #[test]
    fn should_fire_start_event() {
        let hub = hub();
        let (tx, rx) = unbounded();
        hub.bus.listen(EVENT_HUB_START, move |event| {
            tx.send(event).ok();
            Ok(())
        });

        hub.start();

        assert!(rx.recv_timeout(Duration::from_secs(1)).is_ok());
    }

    #[test]
    fn should_fire_stop_event_before_draining() {
        let hub = hub();
        let (tx, rx) = unbounded();
        hub.bus.listen_on_caller(EVENT_HUB_STOP, move |event| {
            tx.send(event).ok();
            Ok(())
        });

        hub.stop();

        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn should_return_requested_exit_code_from_block_till_stopped() {
        let hub = hub();
        let waiter = {
            let hub = Arc::clone(&hub);
            std::thread::spawn(move || hub.block_till_stopped())
        };

        hub.request_shutdown(0);

        assert_eq!(waiter.join().unwrap(), 0);
    }

    #[test]
    fn should_keep_first_requested_exit_code() {
        let hub = hub();
        hub.request_restart();
        hub.request_shutdown(0);

        assert_eq!(hub.block_till_stopped(), RESTART_EXIT_CODE);
    }

    #[test]
    fn should_start_with_no_components() {
        let hub = hub();
        assert!(hub.components().is_empty());
        assert!(!hub.has_component("light"));
    }
}

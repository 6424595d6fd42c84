//! State store — holds what every connected thing currently is.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde_json::json;
use tracing::debug;

use homehub_domain::entity_id::EntityId;
use homehub_domain::event::EVENT_STATE_CHANGED;
use homehub_domain::state::{Attributes, State};

use crate::event_bus::EventBus;

/// Concurrent map of entity id → current state, deriving `state_changed`
/// events on every write.
///
/// Writes for the same entity serialize on that entity's map entry, so the
/// `last_changed`/`last_updated` invariant holds under concurrency; writes
/// for different entities proceed in parallel. Integrations never hold a
/// mutable reference — they submit values and read clones.
pub struct StateStore {
    states: DashMap<EntityId, State>,
    bus: Arc<EventBus>,
}

impl StateStore {
    /// Create a store publishing change events on `bus`.
    #[must_use]
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self {
            states: DashMap::new(),
            bus,
        }
    }

    /// Submit a new state for an entity and fire `state_changed`.
    ///
    /// The event carries `old_state` (null the first time the entity is
    /// seen) and `new_state`. A write with an identical state value still
    /// stores and fires — only `last_updated` moves. The event is fired
    /// while the entity's slot is held, so per-entity event order matches
    /// update order; caller-thread listeners must not write back into the
    /// store.
    pub fn set(
        &self,
        entity_id: EntityId,
        state: impl Into<String>,
        attributes: Attributes,
    ) -> State {
        let state = state.into();
        match self.states.entry(entity_id.clone()) {
            Entry::Occupied(mut occupied) => {
                let old = occupied.get().clone();
                let new = old.advance(state, attributes);
                occupied.insert(new.clone());
                debug!(state = %new, "state updated");
                self.bus.fire(
                    EVENT_STATE_CHANGED,
                    json!({
                        "entity_id": entity_id,
                        "old_state": old,
                        "new_state": new,
                    }),
                );
                new
            }
            Entry::Vacant(vacant) => {
                let new = State::new(entity_id.clone(), state, attributes);
                let _slot = vacant.insert(new.clone());
                debug!(state = %new, "state added");
                self.bus.fire(
                    EVENT_STATE_CHANGED,
                    json!({
                        "entity_id": entity_id,
                        "old_state": serde_json::Value::Null,
                        "new_state": new,
                    }),
                );
                new
            }
        }
    }

    /// Current state of an entity.
    #[must_use]
    pub fn get(&self, entity_id: &EntityId) -> Option<State> {
        self.states.get(entity_id).map(|entry| entry.value().clone())
    }

    /// Whether the entity currently has the given state value.
    #[must_use]
    pub fn is_state(&self, entity_id: &EntityId, state: &str) -> bool {
        self.states
            .get(entity_id)
            .is_some_and(|entry| entry.value().state == state)
    }

    /// Remove an entity, firing `state_changed` with a null `new_state`.
    ///
    /// Returns `false` when the entity was not present.
    pub fn remove(&self, entity_id: &EntityId) -> bool {
        match self.states.remove(entity_id) {
            Some((_, old)) => {
                debug!(entity_id = %entity_id, "state removed");
                self.bus.fire(
                    EVENT_STATE_CHANGED,
                    json!({
                        "entity_id": entity_id,
                        "old_state": old,
                        "new_state": serde_json::Value::Null,
                    }),
                );
                true
            }
            None => false,
        }
    }

    /// Snapshot of all current states (unspecified order).
    #[must_use]
    pub fn all(&self) -> Vec<State> {
        self.states
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// All known entity ids (unspecified order).
    #[must_use]
    pub fn entity_ids(&self) -> Vec<EntityId> {
        self.states.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Number of tracked entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker_pool::WorkerPool;
    use crossbeam::channel::{Receiver, unbounded};
    use homehub_domain::event::Event;
    use homehub_domain::state::{STATE_OFF, STATE_ON};
    use std::time::Duration;

    fn store() -> (StateStore, Receiver<Event>) {
        let bus = Arc::new(EventBus::new(Arc::new(WorkerPool::new(2))));
        let (tx, rx) = unbounded();
        bus.listen(EVENT_STATE_CHANGED, move |event| {
            tx.send(event).ok();
            Ok(())
        });
        (StateStore::new(bus), rx)
    }

    fn kitchen() -> EntityId {
        "light.kitchen".parse().unwrap()
    }

    fn new_state(event: &Event) -> Option<State> {
        serde_json::from_value(event.data["new_state"].clone()).ok()
    }

    #[test]
    fn should_store_and_return_state() {
        let (store, _rx) = store();
        store.set(kitchen(), STATE_ON, Attributes::new());

        let state = store.get(&kitchen()).unwrap();
        assert_eq!(state.state, STATE_ON);
        assert!(store.is_state(&kitchen(), STATE_ON));
        assert!(!store.is_state(&kitchen(), STATE_OFF));
    }

    #[test]
    fn should_fire_with_null_old_state_on_first_sight() {
        let (store, rx) = store();
        store.set(kitchen(), STATE_OFF, Attributes::new());

        let event = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert!(event.data["old_state"].is_null());
        assert_eq!(new_state(&event).unwrap().state, STATE_OFF);
    }

    #[test]
    fn should_fire_with_old_and_new_on_update() {
        let (store, rx) = store();
        store.set(kitchen(), STATE_OFF, Attributes::new());
        store.set(kitchen(), STATE_ON, Attributes::new());

        let _first = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        let second = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        let old: State = serde_json::from_value(second.data["old_state"].clone()).unwrap();
        assert_eq!(old.state, STATE_OFF);
        assert_eq!(new_state(&second).unwrap().state, STATE_ON);
    }

    #[test]
    fn should_keep_last_changed_when_value_is_unchanged() {
        let (store, _rx) = store();
        let first = store.set(kitchen(), STATE_ON, Attributes::new());
        let second = store.set(kitchen(), STATE_ON, Attributes::new());

        assert_eq!(second.last_changed, first.last_changed);
        assert!(second.last_updated >= first.last_updated);
    }

    #[test]
    fn should_advance_last_changed_when_value_differs() {
        let (store, _rx) = store();
        let first = store.set(kitchen(), STATE_OFF, Attributes::new());
        let second = store.set(kitchen(), STATE_ON, Attributes::new());

        assert!(second.last_changed >= first.last_changed);
        assert_eq!(second.last_changed, second.last_updated);
    }

    #[test]
    fn should_fire_null_new_state_on_remove() {
        let (store, rx) = store();
        store.set(kitchen(), STATE_ON, Attributes::new());
        assert!(store.remove(&kitchen()));

        let _set = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        let removed = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert!(removed.data["new_state"].is_null());
        assert!(store.get(&kitchen()).is_none());
    }

    #[test]
    fn should_report_false_when_removing_unknown_entity() {
        let (store, _rx) = store();
        assert!(!store.remove(&kitchen()));
    }

    #[test]
    fn should_snapshot_all_states() {
        let (store, _rx) = store();
        store.set(kitchen(), STATE_ON, Attributes::new());
        store.set(
            "switch.garden".parse().unwrap(),
            STATE_OFF,
            Attributes::new(),
        );

        assert_eq!(store.all().len(), 2);
        assert_eq!(store.entity_ids().len(), 2);
        assert_eq!(store.len(), 2);
        assert!(!store.is_empty());
    }
}

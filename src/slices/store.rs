use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use super::def::{SliceDef, Validate};
use super::error::StoreError;
use crate::action::{Action, ActionKind};
use crate::bus::ActionBus;
use crate::effects::EffectHandle;
use crate::hub::Hub;
use crate::reactive::{Feed, Subject, Subscription};

/// Aggregate state: slice name to its serialized value.
pub type Snapshot = Arc<Map<String, Value>>;

/// What keeps a slice's reducer connected to the private bus.
pub(crate) enum Attachment {
    Reducer(Subscription),
    Streams(EffectHandle),
}

impl Attachment {
    fn detach(self) {
        match self {
            Attachment::Reducer(mut subscription) => subscription.unsubscribe(),
            Attachment::Streams(effects) => effects.cancel(),
        }
    }
}

struct SliceEntry {
    generation: u64,
    validate: Validate,
    attachment: Option<Attachment>,
}

impl SliceEntry {
    fn detach(self) {
        if let Some(attachment) = self.attachment {
            attachment.detach();
        }
    }
}

pub(crate) struct StoreInner {
    hub: Hub,
    dispatcher: ActionBus,
    snapshot: Subject<Snapshot>,
    slices: Mutex<HashMap<String, SliceEntry>>,
    /// Name to the generation whose deferred removal is still owed.
    pending_removals: Mutex<HashMap<String, u64>>,
    generations: AtomicU64,
    disposed: AtomicBool,
}

impl StoreInner {
    /// True while `name` is registered under `generation` and the store is
    /// not disposed.
    pub(crate) fn is_live(&self, name: &str, generation: u64) -> bool {
        !self.disposed.load(Ordering::Acquire)
            && self
                .slices
                .lock()
                .get(name)
                .is_some_and(|entry| entry.generation == generation)
    }

    pub(crate) fn snapshot(&self) -> Snapshot {
        self.snapshot.value()
    }

    /// Publish `value` under `name` unless it already holds an equal value.
    pub(crate) fn publish_slice(&self, name: &str, value: Value) -> bool {
        let unchanged = self
            .snapshot
            .with_value(|snapshot| snapshot.get(name) == Some(&value));
        if unchanged {
            return false;
        }
        let mut next = Map::clone(&self.snapshot.value());
        next.insert(name.to_owned(), value);
        self.snapshot.next(Arc::new(next));
        true
    }

    fn remove_key(&self, name: &str) {
        let mut next = Map::clone(&self.snapshot.value());
        next.remove(name);
        self.snapshot.next(Arc::new(next));
    }
}

pub(crate) fn decode<M: DeserializeOwned>(name: &str, value: Value) -> Result<M, StoreError> {
    serde_json::from_value(value).map_err(|source| StoreError::Deserialize {
        name: name.to_owned(),
        source,
    })
}

pub(crate) fn encode<M: Serialize>(name: &str, state: &M) -> Result<Value, StoreError> {
    serde_json::to_value(state).map_err(|source| StoreError::Serialize {
        name: name.to_owned(),
        source,
    })
}

/// A set of dynamically registered slices on a private bus.
///
/// Slices only see actions dispatched through this store; the hub's shared
/// bus and the controllers on it are a separate channel. Cloning yields
/// another handle to the same store.
#[derive(Clone)]
pub struct SliceStore {
    inner: Arc<StoreInner>,
}

impl SliceStore {
    pub fn new(hub: &Hub) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                hub: hub.clone(),
                dispatcher: hub.private_bus(),
                snapshot: Subject::new(Arc::new(Map::new())),
                slices: Mutex::new(HashMap::new()),
                pending_removals: Mutex::new(HashMap::new()),
                generations: AtomicU64::new(0),
                disposed: AtomicBool::new(false),
            }),
        }
    }

    /// A store with `defs` registered in order.
    pub fn with_slices<I>(hub: &Hub, defs: I) -> Result<Self, StoreError>
    where
        I: IntoIterator<Item = SliceDef>,
    {
        let store = Self::new(hub);
        for def in defs {
            store.register_state(def)?;
        }
        Ok(store)
    }

    pub(crate) fn from_inner(inner: Arc<StoreInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<StoreInner> {
        Arc::downgrade(&self.inner)
    }

    /// Register a slice. Returns `Ok(false)` if the name is already
    /// registered or the store was disposed.
    ///
    /// The initial value is in the snapshot before the reducer is attached
    /// and before this returns, then `registerState(name)` is dispatched.
    /// A per-action reducer sees that notification as its first action.
    pub fn register_state(&self, def: SliceDef) -> Result<bool, StoreError> {
        let (name, initial, validate, attach) = def.into_parts();
        let initial = initial?;

        if self.is_disposed() {
            return Ok(false);
        }
        let generation = self.inner.generations.fetch_add(1, Ordering::Relaxed);
        {
            let mut slices = self.inner.slices.lock();
            if slices.contains_key(&name) {
                tracing::debug!(slice = %name, "Slice already registered");
                return Ok(false);
            }
            slices.insert(
                name.clone(),
                SliceEntry {
                    generation,
                    validate,
                    attachment: None,
                },
            );
        }
        self.inner.pending_removals.lock().remove(&name);

        let mut next = Map::clone(&self.inner.snapshot.value());
        next.insert(name.clone(), initial);
        self.inner.snapshot.next(Arc::new(next));
        self.dispatch(format!("registerState({name})"));

        let attachment = attach(self, generation);
        let rejected = {
            let mut slices = self.inner.slices.lock();
            match slices.get_mut(&name) {
                Some(entry) if entry.generation == generation => {
                    entry.attachment = Some(attachment);
                    None
                }
                _ => Some(attachment),
            }
        };
        if let Some(attachment) = rejected {
            // Unregistered while attaching.
            attachment.detach();
            return Ok(true);
        }

        tracing::debug!(slice = %name, "Slice registered");
        Ok(true)
    }

    /// Detach the slice's reducer now and drop its key on the next tick.
    ///
    /// The deferred step dispatches `unregisterState(name)` and republishes
    /// the snapshot without the key. It is skipped if the store was
    /// disposed or the name was registered again in the meantime. Returns
    /// false if the name was not registered.
    pub fn unregister_state(&self, name: &str) -> bool {
        let entry = self.inner.slices.lock().remove(name);
        let Some(entry) = entry else {
            return false;
        };
        let generation = entry.generation;
        entry.detach();
        tracing::debug!(slice = %name, "Slice detached");

        let name = name.to_owned();
        self.inner
            .pending_removals
            .lock()
            .insert(name.clone(), generation);
        let weak = self.downgrade();
        self.inner.hub.scheduler().defer(move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let owed = {
                let mut pending = inner.pending_removals.lock();
                let owed = pending.get(&name) == Some(&generation);
                if owed {
                    pending.remove(&name);
                }
                owed
            };
            if !owed || inner.disposed.load(Ordering::Acquire) {
                return;
            }
            inner.dispatcher.dispatch(format!("unregisterState({name})"));
            inner.remove_key(&name);
            tracing::debug!(slice = %name, "Slice unregistered");
        });
        true
    }

    /// Push an action onto this store's private bus.
    pub fn dispatch(&self, action: impl Into<Action>) {
        self.inner.dispatcher.dispatch(action);
    }

    pub fn dispatch_with(&self, kind: impl Into<ActionKind>, payload: Value) {
        self.inner.dispatcher.dispatch_with(kind, payload);
    }

    /// The private bus, for filtered action streams.
    pub fn actions(&self) -> &ActionBus {
        &self.inner.dispatcher
    }

    /// Every action on the private bus, starting with the most recent one.
    pub fn dispatcher_feed(&self) -> Feed<Action> {
        self.inner.dispatcher.feed()
    }

    /// The current aggregate snapshot.
    pub fn get_state(&self) -> Snapshot {
        self.inner.snapshot()
    }

    /// Typed read of one slice. `Ok(None)` if the key is absent.
    pub fn slice<M: DeserializeOwned>(&self, name: &str) -> Result<Option<M>, StoreError> {
        match self.inner.snapshot().get(name) {
            Some(value) => decode(name, value.clone()).map(Some),
            None => Ok(None),
        }
    }

    /// Projected snapshots, consecutive equal projections suppressed.
    pub fn select<T, F>(&self, project: F) -> Feed<T>
    where
        T: Clone + PartialEq + Send + 'static,
        F: Fn(&Snapshot) -> T + Send + 'static,
    {
        self.inner.snapshot.select(project)
    }

    /// Typed projection of one slice; `None` while the key is absent or
    /// its value does not decode as `M`.
    pub fn select_slice<M>(&self, name: &str) -> Feed<Option<M>>
    where
        M: DeserializeOwned + Send + 'static,
    {
        let name = name.to_owned();
        let mut last: Option<Option<Value>> = None;
        self.inner.snapshot.feed_with(move |snapshot: &Snapshot| {
            let current = snapshot.get(&name).cloned();
            if last.as_ref() == Some(&current) {
                return None;
            }
            last = Some(current.clone());
            Some(current.and_then(|value| match decode(&name, value) {
                Ok(state) => Some(state),
                Err(err) => {
                    tracing::warn!(error = %err, "Slice value does not match requested type");
                    None
                }
            }))
        })
    }

    /// Replace a registered slice's value and dispatch `importState(name)`.
    /// Returns `Ok(false)` if the slice is not registered, and
    /// `StoreError::Deserialize` if `state` does not decode as the type the
    /// slice was registered with.
    pub fn import_state<M: Serialize>(&self, name: &str, state: &M) -> Result<bool, StoreError> {
        let value = encode(name, state)?;
        if self.is_disposed() {
            return Ok(false);
        }
        let validate = self.inner.slices.lock().get(name).map(|entry| entry.validate);
        let Some(validate) = validate else {
            return Ok(false);
        };
        validate(name, value.clone())?;
        let mut next = Map::clone(&self.inner.snapshot.value());
        next.insert(name.to_owned(), value);
        self.inner.snapshot.next(Arc::new(next));
        self.dispatch(format!("importState({name})"));
        tracing::debug!(slice = %name, "Slice state imported");
        Ok(true)
    }

    /// Names of the registered slices, sorted.
    pub fn slice_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.slices.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Detach every slice. The snapshot keeps its last value and no further
    /// notifications are published. Idempotent.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        let entries: Vec<SliceEntry> = self
            .inner
            .slices
            .lock()
            .drain()
            .map(|(_, entry)| entry)
            .collect();
        self.inner.pending_removals.lock().clear();
        let count = entries.len();
        for entry in entries {
            entry.detach();
        }
        tracing::debug!(slices = count, "Slice store disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for SliceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SliceStore")
            .field("slices", &self.slice_names())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn counter_def() -> SliceDef {
        SliceDef::reducer("counter", 0i64, |count: &i64, action, emit, _store| {
            if action.is_named("inc") {
                emit.emit(count + 1);
            }
        })
    }

    #[test]
    fn initial_value_is_visible_before_register_returns() {
        let store = SliceStore::new(&Hub::new());
        let mut seen = store.select(|snapshot| snapshot.get("counter").cloned());
        assert_eq!(store.register_state(counter_def()).ok(), Some(true));
        assert_eq!(seen.drain(), vec![None, Some(json!(0))]);
    }

    #[test]
    fn register_dispatches_notification_on_private_bus() {
        let hub = Hub::new();
        let store = SliceStore::new(&hub);
        let mut global = hub.bus().feed();
        let mut private = store.dispatcher_feed();

        store.register_state(counter_def()).ok();

        assert_eq!(global.drain(), vec![Action::init()]);
        let kinds: Vec<String> = private
            .drain()
            .iter()
            .map(|action| action.kind_name().to_owned())
            .collect();
        assert_eq!(kinds, vec!["@INIT", "registerState(counter)"]);
    }

    #[test]
    fn duplicate_name_is_noop() {
        let store = SliceStore::new(&Hub::new());
        assert_eq!(store.register_state(counter_def()).ok(), Some(true));
        store.dispatch("inc");
        assert_eq!(store.register_state(counter_def()).ok(), Some(false));
        assert_eq!(store.get_state()["counter"], json!(1));
    }

    #[test]
    fn unregister_removes_key_on_next_tick() {
        let hub = Hub::new();
        let store = SliceStore::with_slices(&hub, [counter_def()]).unwrap();

        assert!(store.unregister_state("counter"));
        assert!(!store.unregister_state("counter"));
        store.dispatch("inc");
        assert_eq!(store.get_state()["counter"], json!(0));

        hub.tick();
        assert!(store.get_state().get("counter").is_none());
    }

    #[test]
    fn reregister_before_tick_keeps_key() {
        let hub = Hub::new();
        let store = SliceStore::with_slices(&hub, [counter_def()]).unwrap();
        store.unregister_state("counter");
        assert_eq!(store.register_state(counter_def()).ok(), Some(true));

        hub.tick();
        assert_eq!(store.get_state()["counter"], json!(0));
        store.dispatch("inc");
        assert_eq!(store.get_state()["counter"], json!(1));
    }

    #[test]
    fn import_requires_registered_slice() {
        let store = SliceStore::with_slices(&Hub::new(), [counter_def()]).unwrap();
        let mut actions = store.actions().where_type("importState(counter)");

        assert!(store.import_state("counter", &41i64).unwrap());
        assert!(!store.import_state("missing", &1i64).unwrap());
        assert_eq!(store.slice::<i64>("counter").unwrap(), Some(41));
        assert_eq!(actions.drain().len(), 1);
    }

    #[test]
    fn import_of_wrong_type_is_rejected() {
        let store = SliceStore::with_slices(&Hub::new(), [counter_def()]).unwrap();
        let mut actions = store.actions().where_type("importState(counter)");

        let result = store.import_state("counter", &"not a counter");

        assert!(matches!(result, Err(StoreError::Deserialize { .. })));
        assert_eq!(store.get_state()["counter"], json!(0));
        assert!(actions.drain().is_empty());
        store.dispatch("inc");
        assert_eq!(store.get_state()["counter"], json!(1));
    }

    #[test]
    fn repeated_unregister_before_tick_notifies_once() {
        let hub = Hub::new();
        let store = SliceStore::with_slices(&hub, [counter_def()]).unwrap();
        let mut notices = store.actions().where_type("unregisterState(counter)");

        assert!(store.unregister_state("counter"));
        assert_eq!(store.register_state(counter_def()).ok(), Some(true));
        assert!(store.unregister_state("counter"));
        assert_eq!(hub.tick(), 2);

        assert_eq!(notices.drain().len(), 1);
        assert!(store.get_state().get("counter").is_none());
    }

    #[test]
    fn dispose_detaches_every_slice() {
        let hub = Hub::new();
        let store = SliceStore::with_slices(&hub, [counter_def()]).unwrap();
        store.dispose();
        store.dispose();

        store.dispatch("inc");
        assert_eq!(store.get_state()["counter"], json!(0));
        assert!(store.slice_names().is_empty());
        assert_eq!(store.register_state(counter_def()).ok(), Some(false));
    }
}

use std::marker::PhantomData;
use std::sync::{Arc, Weak};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::store::{decode, encode, Snapshot, StoreInner};
use crate::action::{Action, ActionKind};
use crate::bus::ActionBus;

/// Writes one slice's value into the aggregate snapshot.
///
/// Bound to a single registration of the slice: after the slice is
/// unregistered or the store disposed, writes are ignored even if the same
/// name is registered again.
pub struct SliceEmitter<M> {
    store: Weak<StoreInner>,
    name: Arc<str>,
    generation: u64,
    _slice: PhantomData<fn(M) -> M>,
}

impl<M> Clone for SliceEmitter<M> {
    fn clone(&self) -> Self {
        Self {
            store: Weak::clone(&self.store),
            name: Arc::clone(&self.name),
            generation: self.generation,
            _slice: PhantomData,
        }
    }
}

impl<M: Serialize + DeserializeOwned> SliceEmitter<M> {
    pub(crate) fn new(store: Weak<StoreInner>, name: Arc<str>, generation: u64) -> Self {
        Self {
            store,
            name,
            generation,
            _slice: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// True while the registration this emitter belongs to is active.
    pub fn is_live(&self) -> bool {
        self.live_store().is_some()
    }

    /// The slice's current value, if the registration is active and the
    /// stored value decodes as `M`.
    pub fn current(&self) -> Option<M> {
        let store = self.live_store()?;
        let value = store.snapshot().get(&*self.name).cloned()?;
        match decode(&self.name, value) {
            Ok(state) => Some(state),
            Err(err) => {
                tracing::warn!(error = %err, "Slice value could not be read");
                None
            }
        }
    }

    /// Replace the slice's value. Returns the value now held by the slice.
    ///
    /// The snapshot is republished only when the serialized value differs
    /// from the current one.
    pub fn emit(&self, state: M) -> M {
        let Some(store) = self.live_store() else {
            tracing::debug!(slice = %self.name, "Emit ignored on detached slice");
            return state;
        };
        match encode(&self.name, &state) {
            Ok(value) => {
                if store.publish_slice(&self.name, value) {
                    tracing::trace!(slice = %self.name, "Slice state changed");
                }
            }
            Err(err) => tracing::warn!(error = %err, "Slice state not published"),
        }
        state
    }

    /// Replace the slice's value with `f(current)`.
    ///
    /// Returns `None` without calling `f` if the slice is detached or its
    /// current value cannot be read.
    pub fn update(&self, f: impl FnOnce(M) -> M) -> Option<M> {
        let current = self.current()?;
        Some(self.emit(f(current)))
    }

    /// A read-only view of the same slice.
    pub fn reader(&self) -> SliceReader<M> {
        SliceReader {
            store: Weak::clone(&self.store),
            name: Arc::clone(&self.name),
            _slice: PhantomData,
        }
    }

    fn live_store(&self) -> Option<Arc<StoreInner>> {
        let store = self.store.upgrade()?;
        store
            .is_live(&self.name, self.generation)
            .then_some(store)
    }
}

/// Reads the store's snapshot, typed for one slice.
///
/// Keeps reading after the slice is unregistered; the key disappears from
/// the snapshot on the tick after unregistration.
pub struct SliceReader<M> {
    store: Weak<StoreInner>,
    name: Arc<str>,
    _slice: PhantomData<fn() -> M>,
}

impl<M> Clone for SliceReader<M> {
    fn clone(&self) -> Self {
        Self {
            store: Weak::clone(&self.store),
            name: Arc::clone(&self.name),
            _slice: PhantomData,
        }
    }
}

impl<M: DeserializeOwned> SliceReader<M> {
    /// The slice's value, `None` if absent, undecodable or the store is gone.
    pub fn get(&self) -> Option<M> {
        let value = self.snapshot()?.get(&*self.name).cloned()?;
        decode(&self.name, value).ok()
    }

    /// The whole aggregate snapshot.
    pub fn snapshot(&self) -> Option<Snapshot> {
        self.store.upgrade().map(|store| store.snapshot())
    }
}

/// Dispatch-only handle to a store's private bus.
#[derive(Clone)]
pub struct Dispatcher {
    bus: ActionBus,
}

impl Dispatcher {
    pub(crate) fn new(bus: ActionBus) -> Self {
        Self { bus }
    }

    pub fn dispatch(&self, action: impl Into<Action>) {
        self.bus.dispatch(action);
    }

    pub fn dispatch_with(&self, kind: impl Into<ActionKind>, payload: Value) {
        self.bus.dispatch_with(kind, payload);
    }
}

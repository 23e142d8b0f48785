use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::emitter::{Dispatcher, SliceEmitter, SliceReader};
use super::error::StoreError;
use super::store::{decode, encode, Attachment, SliceStore};
use crate::action::Action;
use crate::effects::{ActionStream, EffectHandle};
use crate::reactive::Feed;

type Attach = Box<dyn FnOnce(&SliceStore, u64) -> Attachment + Send>;

/// Checks that a value decodes as the slice's registered type.
pub(crate) type Validate = fn(&str, Value) -> Result<(), StoreError>;

fn validate_as<M: DeserializeOwned>(name: &str, value: Value) -> Result<(), StoreError> {
    decode::<M>(name, value).map(drop)
}

/// A slice ready to be registered: name, initial value and reducer.
///
/// Two reducer forms are supported:
///
/// - [`SliceDef::reducer`]: called for every action on the store's private
///   bus with the slice's current value
/// - [`SliceDef::streams`]: called once with the action stream; returns
///   effect streams that run for as long as the slice is registered
pub struct SliceDef {
    name: String,
    initial: Result<Value, StoreError>,
    validate: Validate,
    attach: Attach,
}

impl SliceDef {
    /// Per-action reducer, invoked as `reducer(&state, &action, &emitter,
    /// &store)`.
    pub fn reducer<M, F>(name: impl Into<String>, initial: M, reducer: F) -> Self
    where
        M: Serialize + DeserializeOwned + Send + 'static,
        F: Fn(&M, &Action, &SliceEmitter<M>, &SliceStore) + Send + Sync + 'static,
    {
        let name = name.into();
        let initial = encode(&name, &initial);
        let slice: Arc<str> = Arc::from(name.as_str());

        let attach: Attach = Box::new(move |store: &SliceStore, generation: u64| {
            let emitter = SliceEmitter::<M>::new(store.downgrade(), slice, generation);
            let weak = store.downgrade();
            let subscription = store.actions().subscribe(move |action| {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                let Some(state) = emitter.current() else {
                    return;
                };
                reducer(&state, action, &emitter, &SliceStore::from_inner(inner));
            });
            Attachment::Reducer(subscription)
        });

        Self {
            name,
            initial,
            validate: validate_as::<M>,
            attach,
        }
    }

    /// Stream-composition reducer, invoked once as `build(actions, emitter,
    /// reader, dispatcher)`.
    ///
    /// `actions` starts with the `registerState(name)` notification. Every
    /// action the returned streams yield is dispatched on the private bus.
    pub fn streams<M, F, I>(name: impl Into<String>, initial: M, build: F) -> Self
    where
        M: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce(Feed<Action>, SliceEmitter<M>, SliceReader<M>, Dispatcher) -> I + Send + 'static,
        I: IntoIterator<Item = ActionStream>,
    {
        let name = name.into();
        let initial = encode(&name, &initial);
        let slice: Arc<str> = Arc::from(name.as_str());

        let attach: Attach = Box::new(move |store: &SliceStore, generation: u64| {
            let emitter = SliceEmitter::<M>::new(store.downgrade(), slice, generation);
            let reader = emitter.reader();
            let bus = store.actions().clone();
            let streams = build(bus.feed(), emitter, reader, Dispatcher::new(bus.clone()));
            Attachment::Streams(EffectHandle::spawn(streams, bus))
        });

        Self {
            name,
            initial,
            validate: validate_as::<M>,
            attach,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn into_parts(self) -> (String, Result<Value, StoreError>, Validate, Attach) {
        (self.name, self.initial, self.validate, self.attach)
    }
}

impl std::fmt::Debug for SliceDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SliceDef")
            .field("name", &self.name)
            .field("initial", &self.initial)
            .finish()
    }
}

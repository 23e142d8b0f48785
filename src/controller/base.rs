//! ControllerCore: the state, bus wiring and effects of one controller.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::BoxStream;
use futures::{FutureExt, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;

use super::merge::Merge;
use super::query::{QueryKind, QueryRequest, RemoteQuery};
use super::StateController;
use crate::action::{Action, ActionKind};
use crate::bus::ActionBus;
use crate::effects::{ActionStream, EffectHandle};
use crate::hub::Hub;
use crate::reactive::{Feed, Subject, Subscription};

/// Owns one state value and its connection to the hub's bus.
///
/// Embedded in a [`StateController`] implementation and exposed through
/// [`StateController::core`]. Every state change replaces the value as a
/// whole and is pushed to the state streams.
pub struct ControllerCore<S> {
    hub: Hub,
    store: Subject<S>,
    subscription: Mutex<Option<Subscription>>,
    effects: Mutex<Option<EffectHandle>>,
    disposed: AtomicBool,
}

impl<S> ControllerCore<S>
where
    S: Clone + PartialEq + Send + Sync + 'static,
{
    pub fn new(hub: &Hub, initial: S) -> Self {
        Self {
            hub: hub.clone(),
            store: Subject::new(initial),
            subscription: Mutex::new(None),
            effects: Mutex::new(None),
            disposed: AtomicBool::new(false),
        }
    }

    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    /// The current state.
    pub fn state(&self) -> S {
        self.store.value()
    }

    /// Run `f` against a snapshot of the current state. `f` may read,
    /// emit or dispatch on this controller.
    pub fn with_state<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&self.store.value())
    }

    /// State snapshots, starting with the current one, consecutive
    /// duplicates suppressed.
    pub fn state_stream(&self) -> Feed<S> {
        self.store.distinct()
    }

    /// Projected state, consecutive equal projections suppressed.
    pub fn select<T, F>(&self, project: F) -> Feed<T>
    where
        T: Clone + PartialEq + Send + 'static,
        F: Fn(&S) -> T + Send + 'static,
    {
        self.store.select(project)
    }

    /// Replace the state.
    pub fn emit(&self, state: S) {
        if self.reject_after_dispose("emit") {
            return;
        }
        self.store.next(state);
    }

    /// Replace the state with `f(current)`.
    pub fn update(&self, f: impl FnOnce(&S) -> S) {
        if self.reject_after_dispose("update") {
            return;
        }
        let next = f(&self.store.value());
        self.store.next(next);
    }

    /// Apply a partial update on top of the current state.
    pub fn merge(&self, partial: S::Partial)
    where
        S: Merge,
    {
        self.update(|state| state.merge(partial));
    }

    /// Replace the state wholesale, e.g. when hydrating from outside.
    pub fn import_state(&self, state: S) {
        if self.reject_after_dispose("import_state") {
            return;
        }
        tracing::debug!(controller = std::any::type_name::<S>(), "State imported");
        self.store.next(state);
    }

    /// The shared bus, for building filtered action streams.
    pub fn actions(&self) -> &ActionBus {
        self.hub.bus()
    }

    /// Dispatch onto the shared bus.
    ///
    /// Still delivered to every other subscriber after this controller was
    /// disposed.
    pub fn dispatch(&self, action: impl Into<Action>) {
        self.hub.bus().dispatch(action);
    }

    pub fn dispatch_with(&self, kind: impl Into<ActionKind>, payload: Value) {
        self.hub.bus().dispatch_with(kind, payload);
    }

    /// Replace the registered effects with `streams`.
    ///
    /// The previous set is cancelled first. Every action the new streams
    /// yield is dispatched on the shared bus.
    pub fn register_effects<I>(&self, streams: I)
    where
        I: IntoIterator<Item = ActionStream>,
    {
        let previous = self.effects.lock().take();
        if let Some(previous) = previous {
            previous.cancel();
        }
        if self.reject_after_dispose("register_effects") {
            return;
        }
        let handle = EffectHandle::spawn(streams, self.hub.bus().clone());
        let stale = self.effects.lock().replace(handle);
        drop(stale);
    }

    /// State of the first live controller of type `T`.
    pub fn remote_state<T: StateController>(&self) -> RemoteQuery<T::State> {
        self.remote::<T, T::State>(QueryKind::State)
    }

    /// Handle to the first live controller of type `T`.
    pub fn remote_controller<T: StateController>(&self) -> RemoteQuery<Arc<T>> {
        self.remote::<T, Arc<T>>(QueryKind::Controller)
    }

    /// State stream of the first live controller of type `T`.
    ///
    /// Ends without items if the query is never answered.
    pub fn remote_stream<T: StateController>(&self) -> BoxStream<'static, T::State> {
        self.remote_controller::<T>()
            .into_stream()
            .filter_map(|result| async move {
                match result {
                    Ok(controller) => Some(controller),
                    Err(err) => {
                        tracing::debug!(error = %err, "Remote stream unavailable");
                        None
                    }
                }
            })
            .flat_map(|controller| controller.core().state_stream())
            .boxed()
    }

    fn remote<T: 'static, R: std::any::Any + Send>(&self, kind: QueryKind) -> RemoteQuery<R> {
        let (request, receiver) = QueryRequest::new::<T>(kind);
        let timeout = self.hub.config().query_timeout_ms.map(Duration::from_millis);
        let query = RemoteQuery::new(&request, receiver, timeout);
        self.hub.bus().dispatch(Action::Query(request));
        query
    }

    /// Detach from the bus and cancel effects. Idempotent.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        let subscription = self.subscription.lock().take();
        drop(subscription);
        let effects = self.effects.lock().take();
        if let Some(effects) = effects {
            effects.cancel();
        }
        tracing::debug!(controller = std::any::type_name::<S>(), "Controller disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    pub(crate) fn attach(&self, subscription: Subscription) {
        if self.is_disposed() {
            return;
        }
        *self.subscription.lock() = Some(subscription);
    }

    fn reject_after_dispose(&self, operation: &'static str) -> bool {
        if !self.is_disposed() {
            return false;
        }
        tracing::debug!(
            controller = std::any::type_name::<S>(),
            operation,
            "Ignored on disposed controller"
        );
        true
    }
}

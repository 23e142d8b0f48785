//! Shared controller and slice fixtures.

#![allow(dead_code, unused_imports)]

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, BoxStream};
use futures::StreamExt;
use serde::{Deserialize, Serialize};

use statebus::{
    Action, ActionStream, ControllerCore, FromHub, Hub, Merge, SliceDef, StateController,
};

/// Construct and mount a `T`.
pub fn mount<T: FromHub>(hub: &Hub) -> Arc<T> {
    T::from_hub(hub).mount()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Counter {
    pub count: i64,
    pub loading: bool,
}

impl Counter {
    pub fn new(count: i64, loading: bool) -> Self {
        Self { count, loading }
    }
}

impl Default for Counter {
    fn default() -> Self {
        Self::new(0, false)
    }
}

/// Partial update for [`Counter`]; `None` keeps the current field.
#[derive(Debug, Clone, Default)]
pub struct CounterPatch {
    pub count: Option<i64>,
    pub loading: Option<bool>,
}

impl Merge for Counter {
    type Partial = CounterPatch;

    fn merge(&self, patch: CounterPatch) -> Self {
        Self {
            count: patch.count.unwrap_or(self.count),
            loading: patch.loading.unwrap_or(self.loading),
        }
    }
}

pub struct CounterController {
    core: ControllerCore<Counter>,
}

impl CounterController {
    pub fn new(hub: &Hub) -> Self {
        Self {
            core: ControllerCore::new(hub, Counter::default()),
        }
    }

    pub fn increment(&self) {
        let count = self.state().count + 1;
        self.core.merge(CounterPatch {
            count: Some(count),
            ..Default::default()
        });
    }

    pub fn decrement(&self) {
        let count = self.state().count - 1;
        self.core.merge(CounterPatch {
            count: Some(count),
            ..Default::default()
        });
    }

    pub async fn async_inc(&self) {
        self.core.merge(CounterPatch {
            loading: Some(true),
            ..Default::default()
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        let count = self.state().count + 1;
        self.core.merge(CounterPatch {
            count: Some(count),
            loading: Some(false),
        });
    }
}

impl StateController for CounterController {
    type State = Counter;

    fn core(&self) -> &ControllerCore<Counter> {
        &self.core
    }

    fn on_action(&self, action: &Action) {
        if action.is_named("inc") {
            self.increment();
        }
    }
}

impl FromHub for CounterController {
    fn from_hub(hub: &Hub) -> Self {
        Self::new(hub)
    }
}

pub struct RemoteController {
    core: ControllerCore<String>,
}

impl StateController for RemoteController {
    type State = String;

    fn core(&self) -> &ControllerCore<String> {
        &self.core
    }
}

impl FromHub for RemoteController {
    fn from_hub(hub: &Hub) -> Self {
        Self {
            core: ControllerCore::new(hub, "remote-controller".to_string()),
        }
    }
}

pub struct CounterController2 {
    core: ControllerCore<i64>,
}

impl CounterController2 {
    pub fn inc(&self) {
        self.core.update(|count| count + 1);
    }

    pub fn dec(&self) {
        self.core.update(|count| count - 1);
    }

    pub async fn async_inc(&self) {
        self.core.dispatch("asyncInc");
        tokio::time::sleep(Duration::from_millis(10)).await;
        self.inc();
    }

    /// `"loading..."` while an async increment is pending, the count
    /// otherwise.
    pub fn count_stream(&self) -> BoxStream<'static, String> {
        let loading = self
            .core
            .actions()
            .where_type("asyncInc")
            .map(|_| "loading...".to_string());
        let counts = self.core.state_stream().map(|count| count.to_string());
        stream::select(loading, counts).boxed()
    }
}

impl StateController for CounterController2 {
    type State = i64;

    fn core(&self) -> &ControllerCore<i64> {
        &self.core
    }
}

impl FromHub for CounterController2 {
    fn from_hub(hub: &Hub) -> Self {
        Self {
            core: ControllerCore::new(hub, 0),
        }
    }
}

/// Records the tag of every action its `on_action` hook sees.
pub struct ActionLog {
    core: ControllerCore<Vec<String>>,
}

impl ActionLog {
    pub fn count_of(&self, kind: &str) -> usize {
        self.core.with_state(|seen| seen.iter().filter(|seen| *seen == kind).count())
    }
}

impl StateController for ActionLog {
    type State = Vec<String>;

    fn core(&self) -> &ControllerCore<Vec<String>> {
        &self.core
    }

    fn on_action(&self, action: &Action) {
        let kind = action.kind_name().to_owned();
        self.core.update(|seen| {
            let mut next = seen.clone();
            next.push(kind);
            next
        });
    }
}

impl FromHub for ActionLog {
    fn from_hub(hub: &Hub) -> Self {
        Self {
            core: ControllerCore::new(hub, Vec::new()),
        }
    }
}

/// Per-action counter slice: `inc`, `dec`, and `asyncInc` (loading, then
/// +1 after 10ms).
pub fn counter_slice() -> SliceDef {
    SliceDef::reducer("counter", Counter::default(), |state: &Counter, action, emit, _store| {
        match action.kind_name() {
            "inc" => {
                emit.emit(Counter::new(state.count + 1, false));
            }
            "dec" => {
                emit.emit(Counter::new(state.count - 1, false));
            }
            "asyncInc" => {
                emit.emit(Counter::new(state.count, true));
                let emit = emit.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    emit.update(|current| Counter::new(current.count + 1, false));
                });
            }
            _ => {}
        }
    })
}

/// Stream-form counter slice named `name`: `inc` emits +1; `asyncInc` emits
/// loading, waits 10ms, emits +1 and dispatches `asyncIncDone`.
pub fn streamed_counter_slice(name: &str) -> SliceDef {
    SliceDef::streams(name, Counter::default(), |actions, emit, _reader, _dispatch| {
        let inc_emit = emit.clone();
        let inc: ActionStream = actions
            .filter(|action| {
                futures::future::ready(action.is_named("inc") || action.is_named("asyncInc"))
            })
            .then(move |action| {
                let emit = inc_emit.clone();
                async move {
                    if action.is_named("asyncInc") {
                        emit.update(|current| Counter::new(current.count, true));
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        emit.update(|current| Counter::new(current.count + 1, false));
                        return Some(Action::named("asyncIncDone"));
                    }
                    emit.update(|current| Counter::new(current.count + 1, false));
                    None
                }
            })
            .filter_map(futures::future::ready)
            .boxed();
        vec![inc]
    })
}

//! ActionBus - multicast channel for actions.
//!
//! ```text
//! dispatch(A) ──► last = A ──► subscriber 1 ──► subscriber 2 ──► ... ──► return
//!                                   │
//!                                   └─ dispatch(B) ──► every subscriber ──► return
//! ```
//!
//! Every dispatch is delivered synchronously, in subscription order, before
//! `dispatch` returns. A dispatch issued from inside a subscriber runs to
//! completion before the outer delivery continues (depth-first).
//!
//! A new subscriber first receives the most recent action (`@INIT` if
//! nothing was dispatched yet), then every later one.

use std::any::Any;
use std::sync::Arc;

use serde_json::Value;

use crate::action::{Action, ActionKind};
use crate::reactive::{Feed, Subject, Subscription};

/// Shared action channel. Cloning yields another handle to the same bus.
#[derive(Clone)]
pub struct ActionBus {
    subject: Subject<Action>,
    trace_actions: bool,
}

impl ActionBus {
    pub fn new() -> Self {
        Self {
            subject: Subject::new(Action::init()),
            trace_actions: false,
        }
    }

    /// Log every dispatched action at trace level.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.trace_actions = enabled;
        self
    }

    /// Deliver `action` to every current subscriber.
    pub fn dispatch(&self, action: impl Into<Action>) {
        let action = action.into();
        if self.trace_actions {
            tracing::trace!(action = %action.kind_name(), "Dispatch");
        }
        self.subject.next(action);
    }

    /// Dispatch a named action with a payload.
    pub fn dispatch_with(&self, kind: impl Into<ActionKind>, payload: Value) {
        self.dispatch(Action::with_payload(kind, payload));
    }

    /// The most recently dispatched action.
    pub fn last(&self) -> Action {
        self.subject.value()
    }

    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Action) + Send + Sync + 'static,
    {
        self.subject.subscribe(callback)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subject.listener_count()
    }

    /// Every action, starting with the most recent one.
    pub fn feed(&self) -> Feed<Action> {
        self.subject.feed()
    }

    /// Actions accepted by `predicate`, unchanged.
    pub fn filter<P>(&self, predicate: P) -> Feed<Action>
    where
        P: Fn(&Action) -> bool + Send + 'static,
    {
        self.subject
            .feed_with(move |action: &Action| predicate(action).then(|| action.clone()))
    }

    /// Actions whose kind tag equals `name`, reshaped to a bare
    /// `Action::named(name)`. Payloads are dropped; use [`filter`] to keep
    /// them.
    ///
    /// [`filter`]: ActionBus::filter
    pub fn where_type(&self, name: impl Into<String>) -> Feed<Action> {
        self.where_types([name.into()])
    }

    /// Actions whose kind tag equals any of `names`, each reshaped to the
    /// bare tag it matched.
    pub fn where_types<I, N>(&self, names: I) -> Feed<Action>
    where
        I: IntoIterator<Item = N>,
        N: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        self.subject.feed_with(move |action: &Action| {
            names
                .iter()
                .find(|name| action.kind_name() == name.as_str())
                .map(|name| Action::named(name.as_str()))
        })
    }

    /// Typed actions carrying a `T`.
    pub fn is_a<T: Any + Send + Sync>(&self) -> Feed<Arc<T>> {
        self.subject
            .feed_with(|action: &Action| action.downcast::<T>())
    }
}

impl Default for ActionBus {
    fn default() -> Self {
        Self::new()
    }
}

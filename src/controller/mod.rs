//! State controllers: one state value each, driven by the shared bus.
//!
//! A controller embeds a [`ControllerCore`] and implements
//! [`StateController`]. [`StateController::mount`] connects it:
//!
//! ```text
//! mount(controller)
//!   ├─ subscribe to bus ──► replayed last action ──► route()
//!   └─ scheduler.defer(on_init)          (runs on the next tick)
//!
//! route(action)
//!   ├─ disposed?                      ──► ignore
//!   ├─ Query targeting this type      ──► resolve(state | Arc<Self>)
//!   └─ on_action(action)
//! ```
//!
//! Queries are answered before the hook runs, so an overriding
//! `on_action` cannot break the remote query protocol.

mod base;
mod merge;
mod query;

use std::sync::Arc;

use crate::action::Action;

pub use base::ControllerCore;
pub use merge::Merge;
pub use query::{QueryError, QueryKind, QueryRequest, RemoteQuery};

/// A single-state container reacting to actions on the shared bus.
pub trait StateController: Send + Sync + Sized + 'static {
    type State: Clone + PartialEq + Send + Sync + 'static;

    fn core(&self) -> &ControllerCore<Self::State>;

    /// Called for every action observed on the bus while mounted, starting
    /// with the replayed most recent one.
    fn on_action(&self, _action: &Action) {}

    /// Called once, on the scheduler tick after [`StateController::mount`].
    /// Skipped if the controller was disposed before that tick.
    fn on_init(&self) {}

    /// Wrap in an `Arc`, subscribe to the bus and schedule `on_init`.
    fn mount(self) -> Arc<Self> {
        mount(self)
    }

    fn state(&self) -> Self::State {
        self.core().state()
    }

    fn dispose(&self) {
        self.core().dispose();
    }
}

fn mount<C: StateController>(controller: C) -> Arc<C> {
    let controller = Arc::new(controller);
    let core = controller.core();

    let weak = Arc::downgrade(&controller);
    let subscription = core.actions().subscribe(move |action| {
        if let Some(controller) = weak.upgrade() {
            route(&controller, action);
        }
    });
    core.attach(subscription);

    let weak = Arc::downgrade(&controller);
    core.hub().scheduler().defer(move || {
        let Some(controller) = weak.upgrade() else {
            return;
        };
        if controller.core().is_disposed() {
            return;
        }
        controller.on_init();
    });

    tracing::debug!(controller = std::any::type_name::<C>(), "Controller mounted");
    controller
}

fn route<C: StateController>(controller: &Arc<C>, action: &Action) {
    let core = controller.core();
    if core.is_disposed() {
        return;
    }

    if let Action::Query(query) = action {
        if query.targets::<C>() {
            match query.kind() {
                QueryKind::State => {
                    query.resolve(Box::new(core.state()));
                }
                QueryKind::Controller => {
                    query.resolve(Box::new(Arc::clone(controller)));
                }
            }
        }
    }

    controller.on_action(action);
}

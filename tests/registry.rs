mod common;

use std::sync::Arc;

use common::{Counter, CounterController, CounterController2, RemoteController};
use statebus::{Hub, Registry, StateController};

#[test]
fn test_get_creates_once() {
    let registry = Registry::new(&Hub::new());

    let first = registry.get::<CounterController>();
    first.increment();
    let second = registry.get::<CounterController>();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(second.state(), Counter::new(1, false));
}

/// Removing disposes the instance; the next `get` builds a fresh one.
#[test]
fn test_remove_disposes_and_forgets() {
    let hub = Hub::new();
    let registry = Registry::new(&hub);
    let counter = registry.get::<CounterController>();
    counter.increment();

    assert!(registry.remove::<CounterController>());
    assert!(counter.core().is_disposed());
    assert!(!registry.remove::<CounterController>());

    hub.bus().dispatch("inc");
    assert_eq!(counter.state(), Counter::new(1, false));

    let fresh = registry.get::<CounterController>();
    assert_eq!(fresh.state(), Counter::new(0, false));
}

#[test]
fn test_types_are_cached_independently() {
    let registry = Registry::new(&Hub::new());
    registry.get::<CounterController>();
    registry.get::<CounterController2>();

    assert!(registry.contains::<CounterController>());
    assert!(!registry.contains::<RemoteController>());
    assert_eq!(registry.len(), 2);

    registry.clear();
    assert!(registry.is_empty());
}

/// Controllers held by the registry answer remote queries from others.
#[tokio::test]
async fn test_registry_controllers_answer_queries() {
    let hub = Hub::new();
    let registry = Registry::new(&hub);
    registry.get::<RemoteController>();
    let counter = registry.get::<CounterController>();

    let state = counter.core().remote_state::<RemoteController>().await;
    assert_eq!(state, Ok("remote-controller".to_string()));
}

/// `on_init` runs when the hub's scheduler is driven on the runtime.
#[tokio::test]
async fn test_spawned_scheduler_runs_deferred_init() {
    let hub = Hub::new();
    let registry = Registry::new(&hub);
    registry.get::<CounterController>();
    assert_eq!(hub.scheduler().pending(), 1);

    let driver = hub.spawn_scheduler();
    while hub.scheduler().pending() > 0 {
        tokio::task::yield_now().await;
    }
    hub.shutdown();
    driver.await.expect("scheduler task joins");
}

//! Reactive state coordination on a shared action bus.
//!
//! - [`bus::ActionBus`]: synchronous multicast of [`action::Action`]s with
//!   last-action replay
//! - [`controller`]: single-state controllers with effects and remote
//!   queries between them
//! - [`slices::SliceStore`]: named slices composed into one snapshot, on a
//!   private bus
//! - [`hub::Hub`]: the application root owning the bus, the tick scheduler
//!   and configuration

pub mod action;
pub mod bus;
pub mod config;
pub mod controller;
pub mod effects;
pub mod hub;
pub mod logging;
pub mod reactive;
pub mod registry;
pub mod scheduler;
pub mod slices;

pub use action::{Action, ActionKind, Symbol, TypedAction, INIT_ACTION};
pub use bus::ActionBus;
pub use config::{Config, ConfigError};
pub use controller::{
    ControllerCore, Merge, QueryError, QueryKind, QueryRequest, RemoteQuery, StateController,
};
pub use effects::{ActionStream, EffectHandle};
pub use hub::Hub;
pub use reactive::{Feed, Subject, Subscription};
pub use registry::{FromHub, Registry};
pub use scheduler::Scheduler;
pub use slices::{Dispatcher, SliceDef, SliceEmitter, SliceReader, SliceStore, Snapshot, StoreError};

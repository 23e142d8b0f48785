//! SliceStore: named state partitions composed into one snapshot.
//!
//! ```text
//!               private bus (dispatch / actions())
//!                 │
//!     ┌───────────┼───────────────┐
//!     ▼           ▼               ▼
//!  reducer     reducer        stream form ──► effects ──► private bus
//!  "counter"   "todos"        "session"
//!     │           │               │
//!     └──── SliceEmitter::emit ───┘
//!                 │
//!                 ▼
//!   Snapshot {"counter": .., "todos": .., "session": ..} ──► get_state / select
//! ```
//!
//! Slice values are stored as `serde_json::Value` inside the snapshot and
//! converted to and from their typed form at the emitter, reader and
//! `select_slice` boundaries.

mod def;
mod emitter;
mod error;
mod store;

pub use def::SliceDef;
pub use emitter::{Dispatcher, SliceEmitter, SliceReader};
pub use error::StoreError;
pub use store::{SliceStore, Snapshot};

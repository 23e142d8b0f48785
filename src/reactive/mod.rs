//! Synchronous push primitives shared by the bus, controllers and slices.
//!
//! A [`Subject`] keeps a current value and calls its listeners in place;
//! a [`Feed`] turns one listener into a `futures::Stream` for consumers
//! that want to await values or compose them with stream combinators.

mod feed;
mod subject;

pub use feed::Feed;
pub use subject::{Subject, Subscription};

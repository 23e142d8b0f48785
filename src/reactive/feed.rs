//! Subscriber-side stream of values pushed by a [`Subject`](super::Subject).

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::channel::mpsc::UnboundedReceiver;
use futures::{Stream, StreamExt};

use super::subject::Subscription;

/// A live subscription exposed as a [`Stream`].
///
/// Values are buffered without bound from the moment the feed is created,
/// so a synchronous producer never waits on the consumer. Dropping the feed
/// unsubscribes.
pub struct Feed<T> {
    receiver: UnboundedReceiver<T>,
    subscription: Subscription,
}

impl<T> Feed<T> {
    pub(crate) fn new(receiver: UnboundedReceiver<T>, subscription: Subscription) -> Self {
        Self {
            receiver,
            subscription,
        }
    }

    /// Next buffered value, without waiting.
    pub fn try_next_now(&mut self) -> Option<T> {
        match self.receiver.try_next() {
            Ok(value) => value,
            Err(_) => None,
        }
    }

    /// All values buffered so far.
    pub fn drain(&mut self) -> Vec<T> {
        let mut values = Vec::new();
        while let Some(value) = self.try_next_now() {
            values.push(value);
        }
        values
    }

    /// Stop receiving. Already buffered values stay readable.
    pub fn close(&mut self) {
        self.subscription.unsubscribe();
    }
}

impl<T> Stream for Feed<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        if !self.subscription.is_active() {
            return Poll::Ready(self.try_next_now());
        }
        self.receiver.poll_next_unpin(cx)
    }
}

impl<T> std::fmt::Debug for Feed<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Feed")
            .field("subscription", &self.subscription)
            .finish()
    }
}

//! Effect driver: merges action streams and re-dispatches their output.
//!
//! The merged stream is not spawned on an executor. Its waker polls it
//! inline, on whichever thread woke it:
//!
//! - a bus dispatch pushing into an effect's source [`Feed`](crate::reactive::Feed)
//!   wakes the driver inside that dispatch, so a synchronous chain
//!   (`where_type("a").map(|_| "b")`) dispatches `b` depth-first before the
//!   outer dispatch returns
//! - a timer or channel inside the stream wakes it later from the runtime,
//!   and the output is dispatched from there
//!
//! Cancelling drops the merged stream, so an effect suspended at an await
//! point never resumes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::stream::{self, BoxStream};
use futures::task::{waker_ref, ArcWake};
use futures::StreamExt;
use parking_lot::Mutex;

use crate::action::Action;
use crate::bus::ActionBus;

/// A boxed stream of actions produced by an effect.
pub type ActionStream = BoxStream<'static, Action>;

/// Owns a running set of effects. Dropping it cancels them.
pub struct EffectHandle {
    task: Arc<EffectTask>,
}

struct EffectTask {
    stream: Mutex<Option<ActionStream>>,
    bus: ActionBus,
    polling: AtomicBool,
    repoll: AtomicBool,
    cancelled: AtomicBool,
}

impl EffectHandle {
    /// Merge `streams` and start forwarding their output to `bus`.
    ///
    /// The streams are polled once before this returns, so anything they
    /// can produce synchronously is dispatched immediately.
    pub fn spawn<I>(streams: I, bus: ActionBus) -> Self
    where
        I: IntoIterator<Item = ActionStream>,
    {
        let merged: ActionStream = stream::select_all(streams).boxed();
        let task = Arc::new(EffectTask {
            stream: Mutex::new(Some(merged)),
            bus,
            polling: AtomicBool::new(false),
            repoll: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
        });
        task.drive();
        Self { task }
    }

    /// Stop forwarding and drop the merged stream.
    pub fn cancel(&self) {
        self.task.cancel();
    }

    /// True once every stream ended or the handle was cancelled.
    pub fn is_finished(&self) -> bool {
        self.task.cancelled.load(Ordering::Acquire) || self.task.stream.lock().is_none()
    }
}

impl Drop for EffectHandle {
    fn drop(&mut self) {
        self.task.cancel();
    }
}

impl EffectTask {
    fn drive(self: &Arc<Self>) {
        self.repoll.store(true, Ordering::SeqCst);
        loop {
            if self.polling.swap(true, Ordering::SeqCst) {
                // Another frame is polling; it will see `repoll`.
                return;
            }
            {
                let _polling = scopeguard::guard((), |_| {
                    self.polling.store(false, Ordering::SeqCst);
                });
                while self.repoll.swap(false, Ordering::SeqCst) {
                    self.poll_ready();
                }
            }
            if !self.repoll.load(Ordering::SeqCst) {
                return;
            }
        }
    }

    fn poll_ready(self: &Arc<Self>) {
        let waker = waker_ref(self);
        let mut cx = Context::from_waker(&waker);

        loop {
            if self.cancelled.load(Ordering::Acquire) {
                self.stream.lock().take();
                return;
            }

            let next = {
                let mut slot = self.stream.lock();
                let polled = match slot.as_mut() {
                    Some(stream) => stream.poll_next_unpin(&mut cx),
                    None => return,
                };
                if let Poll::Ready(None) = polled {
                    *slot = None;
                }
                polled
            };

            match next {
                Poll::Ready(Some(action)) => {
                    if self.cancelled.load(Ordering::Acquire) {
                        continue;
                    }
                    self.bus.dispatch(action);
                }
                Poll::Ready(None) | Poll::Pending => return,
            }
        }
    }

    fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }
        // Contended means a poll is in progress; poll_ready drops the
        // stream once that poll returns.
        let stream = self.stream.try_lock().and_then(|mut slot| slot.take());
        drop(stream);
    }
}

impl ArcWake for EffectTask {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        if !arc_self.cancelled.load(Ordering::Acquire) {
            arc_self.drive();
        }
    }
}

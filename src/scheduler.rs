//! Cooperative tick queue for deferred lifecycle work.
//!
//! Controllers defer `on_init` and slice stores defer the second half of
//! `unregister_state` to the next tick. A tick runs every job queued before
//! it started, in the order they were queued; jobs queued while a tick runs
//! wait for the following one.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

type Job = Box<dyn FnOnce() + Send>;

pub const DEFAULT_MAX_BATCH: usize = 1024;

#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

struct SchedulerInner {
    queue: Mutex<VecDeque<Job>>,
    notify: Notify,
    stopped: AtomicBool,
    max_batch: usize,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::with_max_batch(DEFAULT_MAX_BATCH)
    }

    /// `max_batch` caps how many jobs a single tick runs; the rest stay
    /// queued, in order, for the next tick.
    pub fn with_max_batch(max_batch: usize) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                queue: Mutex::new(VecDeque::new()),
                notify: Notify::new(),
                stopped: AtomicBool::new(false),
                max_batch: max_batch.max(1),
            }),
        }
    }

    /// Queue `job` for the next tick.
    pub fn defer(&self, job: impl FnOnce() + Send + 'static) {
        self.inner.queue.lock().push_back(Box::new(job));
        self.inner.notify.notify_one();
    }

    pub fn pending(&self) -> usize {
        self.inner.queue.lock().len()
    }

    /// Run one tick. Returns how many jobs ran.
    pub fn run_pending(&self) -> usize {
        let batch: Vec<Job> = {
            let mut queue = self.inner.queue.lock();
            let take = queue.len().min(self.inner.max_batch);
            queue.drain(..take).collect()
        };

        let count = batch.len();
        for job in batch {
            job();
        }
        if count > 0 {
            tracing::trace!(jobs = count, "Scheduler tick");
        }
        count
    }

    /// Run ticks until the queue is empty, including work queued by the
    /// ticks themselves. Returns how many jobs ran.
    pub fn run_until_idle(&self) -> usize {
        let mut total = 0;
        loop {
            let ran = self.run_pending();
            if ran == 0 {
                return total;
            }
            total += ran;
        }
    }

    /// Drive ticks as jobs arrive until [`Scheduler::shutdown`] is called.
    pub async fn run(&self) {
        loop {
            // Register interest before checking state so a defer() between
            // the check and the await is not lost.
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.inner.stopped.load(Ordering::SeqCst) {
                return;
            }
            if self.run_pending() > 0 {
                tokio::task::yield_now().await;
                continue;
            }
            notified.await;
        }
    }

    /// Stop the [`Scheduler::run`] loop. Queued jobs are kept.
    pub fn shutdown(&self) {
        if !self.inner.stopped.swap(true, Ordering::SeqCst) {
            tracing::debug!("Scheduler stopped");
            self.inner.notify.notify_waiters();
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

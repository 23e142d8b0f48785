//! Current-value multicast subject.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::feed::Feed;

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Listener<T> {
    id: u64,
    active: Arc<AtomicBool>,
    callback: Callback<T>,
}

struct SubjectState<T> {
    value: T,
    listeners: Vec<Arc<Listener<T>>>,
}

struct SubjectInner<T> {
    state: Mutex<SubjectState<T>>,
    next_id: AtomicU64,
}

/// Holds a current value and pushes every replacement to its listeners.
///
/// Delivery is synchronous: [`Subject::next`] returns only after every
/// listener registered at the time of the call has run. No lock is held
/// while listeners run, so a listener may call `next` again; the nested
/// value is delivered to completion before the outer loop resumes.
///
/// New listeners are called once with the current value before they see
/// any later value.
pub struct Subject<T> {
    inner: Arc<SubjectInner<T>>,
}

impl<T> Clone for Subject<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Subject<T> {
    pub fn new(initial: T) -> Self {
        Self {
            inner: Arc::new(SubjectInner {
                state: Mutex::new(SubjectState {
                    value: initial,
                    listeners: Vec::new(),
                }),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Clone of the current value.
    pub fn value(&self) -> T {
        self.inner.state.lock().value.clone()
    }

    /// Run `f` against the current value without cloning it. The lock is
    /// held while `f` runs, so `f` must not touch this subject.
    pub(crate) fn with_value<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.state.lock().value)
    }

    /// Replace the current value and deliver it to every listener.
    pub fn next(&self, value: T) {
        let listeners = {
            let mut state = self.inner.state.lock();
            state.value = value.clone();
            state.listeners.clone()
        };

        for listener in &listeners {
            if listener.active.load(Ordering::Acquire) {
                (listener.callback)(&value);
            }
        }
    }

    /// Register a listener. It is called with the current value first.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let active = Arc::new(AtomicBool::new(true));
        let listener = Arc::new(Listener {
            id,
            active: Arc::clone(&active),
            callback: Arc::new(callback),
        });

        let current = {
            let mut state = self.inner.state.lock();
            state.listeners.push(Arc::clone(&listener));
            state.value.clone()
        };

        let weak: Weak<SubjectInner<T>> = Arc::downgrade(&self.inner);
        let subscription = Subscription::new(Arc::clone(&active), move || {
            if let Some(inner) = weak.upgrade() {
                inner.state.lock().listeners.retain(|l| l.id != id);
            }
        });

        if listener.active.load(Ordering::Acquire) {
            (listener.callback)(&current);
        }
        subscription
    }

    /// Subscribe through a filter-map, collecting the output into a [`Feed`].
    ///
    /// `f` runs on the delivering thread; its lock is released before the
    /// output is pushed, so a feed consumer woken by the push may dispatch
    /// back into this subject.
    pub fn feed_with<U, F>(&self, f: F) -> Feed<U>
    where
        U: Send + 'static,
        F: FnMut(&T) -> Option<U> + Send + 'static,
    {
        let (sender, receiver) = futures::channel::mpsc::unbounded();
        let f = Mutex::new(f);
        let subscription = self.subscribe(move |value| {
            let out = {
                let mut f = f.lock();
                (*f)(value)
            };
            if let Some(out) = out {
                // Receiver gone means the feed was dropped mid-delivery.
                let _ = sender.unbounded_send(out);
            }
        });
        Feed::new(receiver, subscription)
    }

    /// Every value, starting with the current one.
    pub fn feed(&self) -> Feed<T> {
        self.feed_with(|value: &T| Some(value.clone()))
    }

    /// Project each value and suppress consecutive equal projections.
    pub fn select<U, F>(&self, project: F) -> Feed<U>
    where
        U: Clone + PartialEq + Send + 'static,
        F: Fn(&T) -> U + Send + 'static,
    {
        let mut last: Option<U> = None;
        self.feed_with(move |value: &T| {
            let projected = project(value);
            if last.as_ref() == Some(&projected) {
                return None;
            }
            last = Some(projected.clone());
            Some(projected)
        })
    }

    pub fn listener_count(&self) -> usize {
        self.inner.state.lock().listeners.len()
    }
}

impl<T: Clone + PartialEq + Send + Sync + 'static> Subject<T> {
    /// Every value with consecutive duplicates suppressed.
    pub fn distinct(&self) -> Feed<T> {
        self.select(T::clone)
    }
}

/// Handle to a registered listener.
///
/// Dropping the handle unsubscribes. Once unsubscribed, the listener is
/// never called again, even from a delivery loop already in progress.
pub struct Subscription {
    active: Arc<AtomicBool>,
    detach: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    fn new(active: Arc<AtomicBool>, detach: impl FnOnce() + Send + 'static) -> Self {
        Self {
            active,
            detach: Some(Box::new(detach)),
        }
    }

    pub fn unsubscribe(&mut self) {
        self.active.store(false, Ordering::Release);
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

//! Remote query envelopes and their one-shot settlement.
//!
//! ```text
//! requester                       bus                        controllers
//!    │ remote_state::<T>()         │                              │
//!    │──── Query{id, T, tx} ──────►│──── every subscriber ───────►│ is it a T?
//!    │                             │                              │ yes: tx.send(state)
//!    │◄──────────────── first answer settles, later ones inert ───│
//! ```
//!
//! The envelope stays alive as long as any copy of it does, including the
//! bus's last-action cache, so a `T` mounted after the query was sent can
//! still answer it on replay. Once every copy is dropped unanswered, the
//! requester observes [`QueryError::Unanswered`].

use std::any::{Any, TypeId};
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::time::{Instant, Sleep};
use uuid::Uuid;

type Answer = Box<dyn Any + Send>;

/// Errors a remote query can settle with.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// Every copy of the envelope was dropped before any controller answered.
    #[error("Remote query for '{target}' was dropped without an answer")]
    Unanswered { target: &'static str },

    /// The configured `query_timeout_ms` elapsed.
    #[error("Remote query for '{target}' timed out after {timeout_ms}ms")]
    Timeout {
        target: &'static str,
        timeout_ms: u64,
    },

    /// The answer was not of the requested type.
    #[error("Remote query for '{target}' was answered with an unexpected type")]
    TypeMismatch { target: &'static str },
}

/// What a query asks the matching controller for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    /// A snapshot of the controller's state.
    State,
    /// A shared handle to the controller itself.
    Controller,
}

impl QueryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryKind::State => "@remoteState",
            QueryKind::Controller => "@remoteController",
        }
    }
}

/// A single-use request carried on the bus as [`Action::Query`](crate::action::Action::Query).
#[derive(Clone)]
pub struct QueryRequest {
    id: Uuid,
    kind: QueryKind,
    target: TypeId,
    target_name: &'static str,
    slot: Arc<Mutex<Option<oneshot::Sender<Answer>>>>,
    answers: Arc<AtomicUsize>,
}

impl QueryRequest {
    pub(crate) fn new<T: 'static>(kind: QueryKind) -> (Self, oneshot::Receiver<Answer>) {
        let (sender, receiver) = oneshot::channel();
        let request = Self {
            id: Uuid::new_v4(),
            kind,
            target: TypeId::of::<T>(),
            target_name: std::any::type_name::<T>(),
            slot: Arc::new(Mutex::new(Some(sender))),
            answers: Arc::new(AtomicUsize::new(0)),
        };
        (request, receiver)
    }

    /// Correlation id.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> QueryKind {
        self.kind
    }

    pub fn target_name(&self) -> &'static str {
        self.target_name
    }

    /// True if `T` is the concrete type this query targets.
    pub fn targets<T: 'static>(&self) -> bool {
        self.target == TypeId::of::<T>()
    }

    /// True once some controller answered.
    pub fn is_settled(&self) -> bool {
        self.slot.lock().is_none()
    }

    /// How many controllers answered, including the inert answers after
    /// the first.
    pub fn answer_count(&self) -> usize {
        self.answers.load(Ordering::Acquire)
    }

    /// Answer the query. Returns true only for the answer that settled it.
    pub(crate) fn resolve(&self, answer: Answer) -> bool {
        self.answers.fetch_add(1, Ordering::AcqRel);
        let Some(sender) = self.slot.lock().take() else {
            tracing::trace!(query = %self.id, target = self.target_name, "Remote query already settled");
            return false;
        };
        let delivered = sender.send(answer).is_ok();
        tracing::debug!(
            query = %self.id,
            target = self.target_name,
            delivered,
            "Remote query settled"
        );
        delivered
    }
}

impl fmt::Debug for QueryRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryRequest")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("target", &self.target_name)
            .field("settled", &self.is_settled())
            .finish()
    }
}

/// Requester side of a remote query.
///
/// Resolves to the answer of the first matching controller. Dropping it
/// abandons the query; controllers answering later are unaffected.
pub struct RemoteQuery<R> {
    id: Uuid,
    target: &'static str,
    receiver: oneshot::Receiver<Answer>,
    timeout: Option<Duration>,
    started: Instant,
    deadline: Option<Pin<Box<Sleep>>>,
    _answer: PhantomData<fn() -> R>,
}

impl<R: Any + Send> RemoteQuery<R> {
    pub(crate) fn new(
        request: &QueryRequest,
        receiver: oneshot::Receiver<Answer>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            id: request.id(),
            target: request.target_name(),
            receiver,
            timeout,
            started: Instant::now(),
            deadline: None,
            _answer: PhantomData,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The outcome if the query already settled or was abandoned, without
    /// waiting. Once this returns `Some`, the future itself must not be
    /// polled again.
    pub fn try_settled(&mut self) -> Option<Result<R, QueryError>> {
        match self.receiver.try_recv() {
            Ok(answer) => Some(self.unpack(answer)),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(QueryError::Unanswered {
                target: self.target,
            })),
        }
    }

    fn unpack(&self, answer: Answer) -> Result<R, QueryError> {
        answer
            .downcast::<R>()
            .map(|boxed| *boxed)
            .map_err(|_| QueryError::TypeMismatch {
                target: self.target,
            })
    }
}

impl<R: Any + Send> Future for RemoteQuery<R> {
    type Output = Result<R, QueryError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.receiver).poll(cx) {
            Poll::Ready(Ok(answer)) => return Poll::Ready(self.unpack(answer)),
            Poll::Ready(Err(_)) => {
                return Poll::Ready(Err(QueryError::Unanswered {
                    target: self.target,
                }))
            }
            Poll::Pending => {}
        }

        let Some(timeout) = self.timeout else {
            return Poll::Pending;
        };
        let deadline = self.started + timeout;
        let sleep = self
            .deadline
            .get_or_insert_with(|| Box::pin(tokio::time::sleep_until(deadline)));
        if sleep.as_mut().poll(cx).is_ready() {
            return Poll::Ready(Err(QueryError::Timeout {
                target: self.target,
                timeout_ms: timeout.as_millis() as u64,
            }));
        }
        Poll::Pending
    }
}

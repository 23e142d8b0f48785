//! Actions: the immutable messages carried by an [`ActionBus`](crate::bus::ActionBus).
//!
//! An action is one of three shapes:
//! - a named action (string or [`Symbol`] kind, optional JSON payload)
//! - a typed action wrapping an arbitrary value, matched nominally by type
//! - a remote query envelope (see [`crate::controller::QueryRequest`])

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::Value;

use crate::controller::QueryRequest;

/// Kind of the sentinel action every bus starts with.
pub const INIT_ACTION: &str = "@INIT";

static NEXT_SYMBOL: AtomicU64 = AtomicU64::new(1);

/// A unique action kind.
///
/// Two symbols are equal only if they come from the same [`Symbol::new`]
/// call, regardless of their description.
#[derive(Clone)]
pub struct Symbol {
    id: u64,
    description: Arc<str>,
}

impl Symbol {
    pub fn new(description: impl Into<Arc<str>>) -> Self {
        Self {
            id: NEXT_SYMBOL.fetch_add(1, Ordering::Relaxed),
            description: description.into(),
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Symbol {}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self.description)
    }
}

/// Tag of a named action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionKind {
    Name(Arc<str>),
    Symbol(Symbol),
}

impl ActionKind {
    /// Human-readable tag: the name itself, or the symbol description.
    pub fn as_str(&self) -> &str {
        match self {
            ActionKind::Name(name) => name,
            ActionKind::Symbol(symbol) => symbol.description(),
        }
    }
}

impl From<&str> for ActionKind {
    fn from(name: &str) -> Self {
        ActionKind::Name(Arc::from(name))
    }
}

impl From<String> for ActionKind {
    fn from(name: String) -> Self {
        ActionKind::Name(Arc::from(name))
    }
}

impl From<Symbol> for ActionKind {
    fn from(symbol: Symbol) -> Self {
        ActionKind::Symbol(symbol)
    }
}

/// An action carrying an arbitrary value, matched by its concrete type.
#[derive(Clone)]
pub struct TypedAction {
    type_id: TypeId,
    type_name: &'static str,
    value: Arc<dyn Any + Send + Sync>,
}

impl TypedAction {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            value: Arc::new(value),
        }
    }

    pub fn is<T: Any>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Shared handle to the wrapped value, if it is a `T`.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.value).downcast::<T>().ok()
    }
}

/// A message flowing through a bus.
#[derive(Clone)]
pub enum Action {
    Named {
        kind: ActionKind,
        payload: Option<Value>,
    },
    Typed(TypedAction),
    Query(QueryRequest),
}

impl Action {
    pub fn named(kind: impl Into<ActionKind>) -> Self {
        Action::Named {
            kind: kind.into(),
            payload: None,
        }
    }

    pub fn with_payload(kind: impl Into<ActionKind>, payload: Value) -> Self {
        Action::Named {
            kind: kind.into(),
            payload: Some(payload),
        }
    }

    pub fn typed<T: Any + Send + Sync>(value: T) -> Self {
        Action::Typed(TypedAction::new(value))
    }

    /// The `@INIT` sentinel.
    pub fn init() -> Self {
        Action::named(INIT_ACTION)
    }

    /// Tag used by `where_type` matching.
    pub fn kind_name(&self) -> &str {
        match self {
            Action::Named { kind, .. } => kind.as_str(),
            Action::Typed(typed) => typed.type_name(),
            Action::Query(query) => query.kind().as_str(),
        }
    }

    pub fn kind(&self) -> Option<&ActionKind> {
        match self {
            Action::Named { kind, .. } => Some(kind),
            _ => None,
        }
    }

    pub fn payload(&self) -> Option<&Value> {
        match self {
            Action::Named { payload, .. } => payload.as_ref(),
            _ => None,
        }
    }

    /// True for a named action with the given string kind.
    pub fn is_named(&self, name: &str) -> bool {
        matches!(self, Action::Named { kind: ActionKind::Name(n), .. } if &**n == name)
    }

    pub fn is_a<T: Any>(&self) -> bool {
        matches!(self, Action::Typed(typed) if typed.is::<T>())
    }

    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        match self {
            Action::Typed(typed) => typed.downcast::<T>(),
            _ => None,
        }
    }
}

impl PartialEq for Action {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Action::Named { kind, payload },
                Action::Named {
                    kind: other_kind,
                    payload: other_payload,
                },
            ) => kind == other_kind && payload == other_payload,
            (Action::Typed(a), Action::Typed(b)) => Arc::ptr_eq(&a.value, &b.value),
            (Action::Query(a), Action::Query(b)) => a.id() == b.id(),
            _ => false,
        }
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Named { kind, payload } => f
                .debug_struct("Named")
                .field("kind", kind)
                .field("payload", payload)
                .finish(),
            Action::Typed(typed) => f.debug_tuple("Typed").field(&typed.type_name).finish(),
            Action::Query(query) => f.debug_tuple("Query").field(query).finish(),
        }
    }
}

impl From<&str> for Action {
    fn from(name: &str) -> Self {
        Action::named(name)
    }
}

impl From<String> for Action {
    fn from(name: String) -> Self {
        Action::named(name)
    }
}

impl From<Symbol> for Action {
    fn from(symbol: Symbol) -> Self {
        Action::named(symbol)
    }
}

impl From<ActionKind> for Action {
    fn from(kind: ActionKind) -> Self {
        Action::named(kind)
    }
}

impl From<TypedAction> for Action {
    fn from(typed: TypedAction) -> Self {
        Action::Typed(typed)
    }
}

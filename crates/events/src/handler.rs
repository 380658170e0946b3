//! Handler shapes and their conversions.
//!
//! A handler is stored as a [`Handler`]: either a fixed [`Callable`] whose
//! arity was computed at registration, or a [`HandlerSlot`] whose target can
//! be swapped at any time and whose arity is recomputed on every call.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::arity::{self, Arity};
use crate::event::Event;

/// What a handler wants to happen to its own subscription.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Flow {
    /// Stay registered.
    #[default]
    Continue,
    /// Remove this handler once the current dispatch pass ends.
    Done,
}

/// Normalised return value of any handler invocation.
pub type Outcome = anyhow::Result<Flow>;

/// Return types a handler closure may use.
pub trait IntoOutcome {
    fn into_outcome(self) -> Outcome;
}

impl IntoOutcome for () {
    fn into_outcome(self) -> Outcome {
        Ok(Flow::Continue)
    }
}

impl IntoOutcome for Flow {
    fn into_outcome(self) -> Outcome {
        Ok(self)
    }
}

impl<T, E> IntoOutcome for Result<T, E>
where
    T: IntoOutcome,
    E: Into<anyhow::Error>,
{
    fn into_outcome(self) -> Outcome {
        self.map_err(Into::into).and_then(IntoOutcome::into_outcome)
    }
}

type NullaryFn = dyn Fn() -> Outcome + Send + Sync;
type UnaryFn = dyn Fn(&Event) -> Outcome + Send + Sync;

/// A type-erased handler body, tagged with its invocation shape.
#[derive(Clone)]
pub enum Callable {
    /// Takes no arguments.
    Nullary(Arc<NullaryFn>),
    /// Takes the whole event record.
    Unary(Arc<UnaryFn>),
}

impl Callable {
    pub fn nullary<F, R>(f: F) -> Self
    where
        F: Fn() -> R + Send + Sync + 'static,
        R: IntoOutcome,
    {
        Self::Nullary(Arc::new(move || f().into_outcome()))
    }

    pub fn unary<F, R>(f: F) -> Self
    where
        F: Fn(&Event) -> R + Send + Sync + 'static,
        R: IntoOutcome,
    {
        Self::Unary(Arc::new(move |ev: &Event| f(ev).into_outcome()))
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nullary(_) => f.write_str("Callable::Nullary"),
            Self::Unary(_) => f.write_str("Callable::Unary"),
        }
    }
}

/// A rebindable handler target.
///
/// Registering a slot (instead of a closure) keeps the subscription pointed at
/// whatever the slot holds at invocation time, so the implementation can be
/// replaced without re-registering.
#[derive(Clone)]
pub struct HandlerSlot {
    target: Arc<RwLock<Callable>>,
}

impl HandlerSlot {
    pub fn new<H, M>(handler: H) -> Self
    where
        H: IntoCallable<M>,
    {
        Self {
            target: Arc::new(RwLock::new(handler.into_callable())),
        }
    }

    /// Point the slot at a new implementation. Takes effect on the next call.
    pub fn rebind<H, M>(&self, handler: H)
    where
        H: IntoCallable<M>,
    {
        let mut target = self.target.write().unwrap_or_else(PoisonError::into_inner);
        *target = handler.into_callable();
    }

    /// The callable currently bound.
    pub fn current(&self) -> Callable {
        self.target
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl fmt::Debug for HandlerSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerSlot")
            .field("current", &self.current())
            .finish()
    }
}

/// A registry entry.
#[derive(Clone, Debug)]
pub enum Handler {
    /// Arity resolved once, at construction.
    Fixed { callable: Callable, arity: usize },
    /// Arity resolved from the slot's current target on every call.
    Dynamic(HandlerSlot),
    /// Runs `inner` at most once; arity is the inner handler's.
    Oneshot {
        inner: Arc<Handler>,
        claimed: Arc<AtomicBool>,
    },
}

impl Handler {
    pub fn fixed(callable: Callable) -> Self {
        let arity = arity::declared(&callable);
        Self::Fixed { callable, arity }
    }

    pub fn dynamic(slot: HandlerSlot) -> Self {
        Self::Dynamic(slot)
    }

    pub fn arity(&self) -> Arity {
        match self {
            Self::Fixed { arity, .. } => Arity::Fixed(*arity),
            Self::Dynamic(_) => Arity::Dynamic,
            Self::Oneshot { inner, .. } => inner.arity(),
        }
    }

    /// Wrap this handler so it runs at most once.
    ///
    /// The wrapper reports [`Flow::Done`] after its first call, whatever the
    /// inner handler returns. A failure is still reported as a failure, and
    /// the entry is pruned on the next firing instead. Wrapping twice is a
    /// no-op.
    pub fn oneshot(self) -> Self {
        match self {
            Self::Oneshot { .. } => self,
            inner => Self::Oneshot {
                inner: Arc::new(inner),
                claimed: Arc::new(AtomicBool::new(false)),
            },
        }
    }

    /// Claim the single run of a oneshot entry. Always `true` for other entries.
    pub(crate) fn claim(&self) -> bool {
        match self {
            Self::Oneshot { claimed, .. } => !claimed.swap(true, Ordering::AcqRel),
            _ => true,
        }
    }
}

/// Marker for closures taking no arguments.
pub struct NoArgs;
/// Marker for closures taking the event record.
pub struct EventArg;
/// Marker for values that already are handlers.
pub struct Prebuilt;

/// Conversion into a [`Callable`]; `M` selects the invocation shape.
///
/// Closures match exactly one shape. A closure taking the event must annotate
/// its parameter (`|ev: &Event| ..`).
pub trait IntoCallable<M> {
    fn into_callable(self) -> Callable;
}

impl<F, R> IntoCallable<(NoArgs, R)> for F
where
    F: Fn() -> R + Send + Sync + 'static,
    R: IntoOutcome,
{
    fn into_callable(self) -> Callable {
        Callable::nullary(self)
    }
}

impl<F, R> IntoCallable<(EventArg, R)> for F
where
    F: Fn(&Event) -> R + Send + Sync + 'static,
    R: IntoOutcome,
{
    fn into_callable(self) -> Callable {
        Callable::unary(self)
    }
}

impl IntoCallable<Prebuilt> for Callable {
    fn into_callable(self) -> Callable {
        self
    }
}

/// Conversion into a registry entry.
pub trait IntoHandler<M> {
    fn into_handler(self) -> Handler;
}

impl<T, M> IntoHandler<M> for T
where
    T: IntoCallable<M>,
{
    fn into_handler(self) -> Handler {
        Handler::fixed(self.into_callable())
    }
}

/// Marker for [`Handler`] and [`HandlerSlot`] conversions.
pub struct Entry;

impl IntoHandler<Entry> for Handler {
    fn into_handler(self) -> Handler {
        self
    }
}

impl IntoHandler<Entry> for HandlerSlot {
    fn into_handler(self) -> Handler {
        Handler::dynamic(self)
    }
}

//! Arity resolution and positional invocation.
//!
//! The positional argument list of every invocation is `[event]`; a handler
//! of arity N receives its first N values. Shapes are matched in declaration
//! order and the first match wins, which is all the overload resolution there
//! is.

use thiserror::Error;

use crate::event::Event;
use crate::handler::{Callable, Flow, Handler, Outcome};

/// Arity recorded in a registry entry.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Arity {
    /// Computed once, at registration.
    Fixed(usize),
    /// Recomputed from the current target at every call.
    Dynamic,
}

/// The arity used for a call does not fit the callable's shape.
#[derive(Debug, Error, Copy, Clone, PartialEq, Eq)]
#[error("callable cannot be invoked with {arity} positional argument(s)")]
pub struct ArityMismatch {
    pub arity: usize,
}

/// Declared parameter count of a callable.
pub fn declared(callable: &Callable) -> usize {
    match callable {
        Callable::Nullary(_) => 0,
        Callable::Unary(_) => 1,
    }
}

/// Resolve the callable and arity to use for one invocation.
///
/// Fixed entries return the stored arity; dynamic entries dereference their
/// slot and recompute it. Oneshot entries resolve their inner handler.
pub fn resolve(handler: &Handler) -> (Callable, usize) {
    match handler {
        Handler::Fixed { callable, arity } => (callable.clone(), *arity),
        Handler::Dynamic(slot) => {
            let callable = slot.current();
            let arity = declared(&callable);
            (callable, arity)
        }
        Handler::Oneshot { inner, .. } => resolve(inner),
    }
}

/// Invoke a handler with the first N positional values derived from `event`.
///
/// A shape/arity disagreement surfaces as an [`ArityMismatch`] error rather
/// than a panic. A oneshot entry whose run was already claimed is not called
/// again and reports [`Flow::Done`].
pub fn invoke(handler: &Handler, event: &Event) -> Outcome {
    if !handler.claim() {
        return Ok(Flow::Done);
    }

    let (callable, arity) = resolve(handler);
    let outcome = call(&callable, arity, event);
    match handler {
        Handler::Oneshot { .. } => outcome.map(|_| Flow::Done),
        _ => outcome,
    }
}

fn call(callable: &Callable, arity: usize, event: &Event) -> Outcome {
    let positional = [event];
    let Some(args) = positional.get(..arity) else {
        return Err(ArityMismatch { arity }.into());
    };

    match (callable, args) {
        (Callable::Nullary(f), []) => f(),
        (Callable::Unary(f), [ev]) => f(*ev),
        _ => Err(ArityMismatch { arity }.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::HandlerSlot;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn fixed_arity_is_stored_at_registration() {
        let h = Handler::fixed(Callable::unary(|_ev: &Event| ()));
        assert_eq!(h.arity(), Arity::Fixed(1));
        let (_, n) = resolve(&h);
        assert_eq!(n, 1);
    }

    #[test]
    fn unary_handler_receives_whole_event() {
        let h = Handler::fixed(Callable::unary(|ev: &Event| {
            if ev.event_type() == "note-on" { Flow::Done } else { Flow::Continue }
        }));
        assert_eq!(invoke(&h, &Event::bare("note-on")).unwrap(), Flow::Done);
        assert_eq!(invoke(&h, &Event::bare("other")).unwrap(), Flow::Continue);
    }

    #[test]
    fn dynamic_arity_follows_rebinding() {
        let seen = Arc::new(AtomicUsize::new(0));
        let slot = HandlerSlot::new(|| ());
        let h = Handler::dynamic(slot.clone());

        assert_eq!(resolve(&h).1, 0);
        assert_eq!(invoke(&h, &Event::bare("x")).unwrap(), Flow::Continue);

        let s = Arc::clone(&seen);
        slot.rebind(move |ev: &Event| {
            s.fetch_add(ev.payload().len() + 1, Ordering::SeqCst);
            Flow::Done
        });

        assert_eq!(resolve(&h).1, 1);
        assert_eq!(invoke(&h, &Event::bare("x")).unwrap(), Flow::Done);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn mismatched_arity_is_an_error_not_a_panic() {
        let h = Handler::Fixed {
            callable: Callable::nullary(|| ()),
            arity: 1,
        };
        let err = invoke(&h, &Event::bare("x")).unwrap_err();
        assert_eq!(err.downcast_ref::<ArityMismatch>(), Some(&ArityMismatch { arity: 1 }));

        let h = Handler::Fixed {
            callable: Callable::unary(|_ev: &Event| ()),
            arity: 3,
        };
        assert!(invoke(&h, &Event::bare("x")).is_err());
    }

    #[test]
    fn oneshot_slot_resolves_current_target_once() {
        let slot = HandlerSlot::new(|| Flow::Continue);
        let h = Handler::dynamic(slot.clone()).oneshot();
        slot.rebind(|_ev: &Event| Flow::Continue);

        assert_eq!(resolve(&h).1, 1);
        assert_eq!(invoke(&h, &Event::bare("x")).unwrap(), Flow::Done);
        assert_eq!(invoke(&h, &Event::bare("x")).unwrap(), Flow::Done);
    }
}

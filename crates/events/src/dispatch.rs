//! The dispatch pass: snapshot, invoke, isolate failures, prune.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;

use tracing::{debug, error};

use evbus_core::HandlerError;

use crate::arity::{self, ArityMismatch};
use crate::event::Event;
use crate::handler::Flow;
use crate::registry::{Registered, Registry};

/// Counters for one dispatch pass.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Handlers invoked (size of the snapshot).
    pub invoked: usize,
    /// Invocations that returned an error or panicked.
    pub failed: usize,
    /// Entries pruned from the live registry after returning [`Flow::Done`].
    pub removed: usize,
}

/// Run every handler registered for `event`'s type in `registry`.
///
/// Operates on a snapshot taken up front: handlers registered while the pass
/// runs are not invoked by it. A failing handler is logged and skipped over;
/// nothing is propagated to the caller.
pub fn dispatch(registry: &Registry, event: &Event) -> DispatchReport {
    install_trace_hook();
    let event_type = event.event_type();
    let snapshot = registry.snapshot(event_type);

    if snapshot.is_empty() {
        return DispatchReport::default();
    }

    debug!(
        registry = %registry.kind(),
        event_type = %event_type,
        handlers = snapshot.len(),
        "dispatching event"
    );

    let mut report = DispatchReport {
        invoked: snapshot.len(),
        ..DispatchReport::default()
    };
    let mut done: Vec<Registered> = Vec::new();

    for entry in &snapshot {
        match invoke_isolated(entry, event) {
            Ok(Flow::Done) => done.push(entry.clone()),
            Ok(Flow::Continue) => {}
            Err(err) => {
                report.failed += 1;
                error!(
                    registry = %registry.kind(),
                    event_type = %event_type,
                    key = %entry.key,
                    payload = %event.payload_json(),
                    error = ?err,
                    trace = err.trace().unwrap_or_default(),
                    "event handler failed"
                );
            }
        }
    }

    report.removed = registry.prune(event_type, &done);
    if report.removed > 0 {
        debug!(
            registry = %registry.kind(),
            event_type = %event_type,
            removed = report.removed,
            "pruned finished handlers"
        );
    }

    report
}

/// Invoke one entry behind an error boundary covering both `Err` returns and
/// panics.
fn invoke_isolated(entry: &Registered, event: &Event) -> Result<Flow, HandlerError> {
    let result = panic::catch_unwind(AssertUnwindSafe(|| arity::invoke(&entry.handler, event)));

    match result {
        Ok(Ok(flow)) => Ok(flow),
        Ok(Err(source)) => Err(match source.downcast_ref::<ArityMismatch>() {
            Some(mismatch) => HandlerError::ArityMismatch {
                event_type: event.event_type().clone(),
                key: entry.key.clone(),
                arity: mismatch.arity,
            },
            None => HandlerError::Failed {
                event_type: event.event_type().clone(),
                key: entry.key.clone(),
                source,
            },
        }),
        Err(panic) => Err(HandlerError::Panicked {
            event_type: event.event_type().clone(),
            key: entry.key.clone(),
            message: panic_message(panic.as_ref()),
            trace: take_panic_trace(),
        }),
    }
}

thread_local! {
    static PANIC_TRACE: RefCell<Option<Backtrace>> = const { RefCell::new(None) };
}

static TRACE_HOOK: Once = Once::new();

/// Chain a panic hook that keeps the backtrace of the latest panic on the
/// panicking thread. The previously installed hook still runs.
pub(crate) fn install_trace_hook() {
    TRACE_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let trace = Backtrace::force_capture();
            let _ = PANIC_TRACE.try_with(|slot| {
                if let Ok(mut slot) = slot.try_borrow_mut() {
                    *slot = Some(trace);
                }
            });
            previous(info);
        }));
    });
}

/// Rendered backtrace of this thread's latest panic, or empty if none was
/// recorded.
pub(crate) fn take_panic_trace() -> String {
    PANIC_TRACE
        .try_with(|slot| slot.borrow_mut().take())
        .ok()
        .flatten()
        .map(|trace| trace.to_string())
        .unwrap_or_default()
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

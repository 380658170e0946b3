//! In-process event dispatch.
//!
//! Handlers subscribe to an event type in one of two registries:
//!
//! - **sync**: run on the firing thread before `fire` returns
//! - **async**: run on a fixed-size worker pool, or inline for `fire_sync`
//!
//! A handler takes either nothing or the [`Event`] record, and may return
//! [`Flow::Done`] to unsubscribe itself. Handler failures (errors and panics)
//! are logged and never reach the firing caller; the only error `fire` can
//! return is a malformed payload.
//!
//! ```ignore
//! use evbus_events::{payload, Event, EventBus, Flow};
//!
//! let bus = EventBus::default();
//! bus.register("note-on", "k1", |ev: &Event| println!("{:?}", ev.get("note")));
//! bus.register_sync("ping", "once", || Flow::Done);
//! bus.fire("note-on", payload!["note", 60, "vel", 100])?;
//! ```

pub mod arity;
pub mod bus;
pub mod config;
pub mod dispatch;
pub mod event;
pub mod global;
pub mod handler;
pub mod monitor;
pub mod pool;
pub mod registry;

pub use arity::{Arity, ArityMismatch};
pub use bus::{EventBus, FireMode};
pub use config::BusConfig;
pub use dispatch::{DispatchReport, dispatch};
pub use event::Event;
pub use global::{
    fire, fire_sync, global, init_global, register, register_oneshot, register_oneshot_sync,
    register_sync, subscribe, subscribe_sync, unregister, unregister_all,
};
pub use handler::{Callable, Flow, Handler, HandlerSlot, IntoCallable, IntoHandler, IntoOutcome, Outcome};
pub use monitor::EventMonitor;
pub use pool::{PoolStats, WorkerPool};
pub use registry::{Registered, Registries, Registry, RegistryKind};

pub use evbus_core::{ConfigError, EventType, FireError, FireResult, HandlerError, HandlerKey};

pub use serde_json::Value;

#[doc(hidden)]
pub use serde_json::json;

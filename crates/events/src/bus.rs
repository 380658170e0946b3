//! The event bus: registration surface and firing protocol.
//!
//! ## Firing protocol
//!
//! ```text
//! fire(type, tokens, mode)
//!   ├─ build Event            odd token count → FireError, nothing runs
//!   ├─ sync registry          dispatched on the caller, always blocking
//!   └─ async registry
//!        ├─ ForceSync         dispatched on the caller, awaited
//!        └─ Scheduled         one job on the worker pool, caller returns
//! ```
//!
//! All sync handlers finish before the async stage starts. The override is
//! the `mode` argument of a single call: a handler that fires a nested event
//! gets `Scheduled` behaviour unless it asks for `ForceSync` itself.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use evbus_core::{EventType, FireResult, HandlerKey};

use crate::config::BusConfig;
use crate::dispatch::dispatch;
use crate::event::Event;
use crate::handler::IntoHandler;
use crate::monitor::EventMonitor;
use crate::pool::{Job, PoolStats, WorkerPool};
use crate::registry::{Registries, RegistryKind};

/// How the async stage of a fire runs.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum FireMode {
    /// Submit the async pass to the worker pool and return.
    #[default]
    Scheduled,
    /// Run the async pass on the calling thread and wait for it.
    ForceSync,
}

/// In-process event bus with a sync and an async handler registry.
#[derive(Debug)]
pub struct EventBus {
    registries: Arc<Registries>,
    pool: WorkerPool,
    monitor: EventMonitor,
    config: BusConfig,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(BusConfig::default())
    }
}

impl EventBus {
    pub fn new(config: BusConfig) -> Self {
        let pool = WorkerPool::new(config.worker_count(), &config.thread_name);
        Self {
            registries: Arc::new(Registries::new()),
            pool,
            monitor: EventMonitor::new(config.monitor),
            config,
        }
    }

    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    pub fn registries(&self) -> &Registries {
        &self.registries
    }

    pub fn monitor(&self) -> &EventMonitor {
        &self.monitor
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    /// Register an async handler (run on the worker pool by [`EventBus::fire`]).
    pub fn register<H, M>(&self, event_type: impl Into<EventType>, key: impl Into<HandlerKey>, handler: H)
    where
        H: IntoHandler<M>,
    {
        self.registries
            .register(RegistryKind::Async, event_type.into(), key.into(), handler.into_handler());
    }

    /// Register a sync handler (always run on the firing thread).
    pub fn register_sync<H, M>(&self, event_type: impl Into<EventType>, key: impl Into<HandlerKey>, handler: H)
    where
        H: IntoHandler<M>,
    {
        self.registries
            .register(RegistryKind::Sync, event_type.into(), key.into(), handler.into_handler());
    }

    /// Register an async handler under a freshly generated key.
    pub fn subscribe<H, M>(&self, event_type: impl Into<EventType>, handler: H) -> HandlerKey
    where
        H: IntoHandler<M>,
    {
        let key = HandlerKey::generate();
        self.register(event_type, key.clone(), handler);
        key
    }

    /// Register a sync handler under a freshly generated key.
    pub fn subscribe_sync<H, M>(&self, event_type: impl Into<EventType>, handler: H) -> HandlerKey
    where
        H: IntoHandler<M>,
    {
        let key = HandlerKey::generate();
        self.register_sync(event_type, key.clone(), handler);
        key
    }

    /// Register an async handler that runs at most once.
    pub fn register_oneshot<H, M>(&self, event_type: impl Into<EventType>, key: impl Into<HandlerKey>, handler: H)
    where
        H: IntoHandler<M>,
    {
        self.register(event_type, key, handler.into_handler().oneshot());
    }

    /// Register a sync handler that runs at most once.
    pub fn register_oneshot_sync<H, M>(
        &self,
        event_type: impl Into<EventType>,
        key: impl Into<HandlerKey>,
        handler: H,
    ) where
        H: IntoHandler<M>,
    {
        self.register_sync(event_type, key, handler.into_handler().oneshot());
    }

    /// Remove `key` from both registries. Returns `false` if nothing matched.
    pub fn unregister(&self, event_type: impl Into<EventType>, key: impl Into<HandlerKey>) -> bool {
        self.registries.remove(&event_type.into(), &key.into())
    }

    /// Remove every handler for `event_type` from both registries.
    pub fn unregister_all(&self, event_type: impl Into<EventType>) -> usize {
        self.registries.remove_all(&event_type.into())
    }

    /// Keys registered for `event_type` in one registry, in dispatch order.
    pub fn handler_keys(&self, kind: RegistryKind, event_type: impl Into<EventType>) -> Vec<HandlerKey> {
        self.registries.get(kind).keys(&event_type.into())
    }

    /// Fire an event. Returns once sync handlers are done; async handlers run
    /// later on the pool.
    pub fn fire<I>(&self, event_type: impl Into<EventType>, tokens: I) -> FireResult<()>
    where
        I: IntoIterator<Item = Value>,
    {
        self.fire_with(event_type, tokens, FireMode::Scheduled)
    }

    /// Fire an event and wait for sync and async handlers alike.
    pub fn fire_sync<I>(&self, event_type: impl Into<EventType>, tokens: I) -> FireResult<()>
    where
        I: IntoIterator<Item = Value>,
    {
        self.fire_with(event_type, tokens, FireMode::ForceSync)
    }

    pub fn fire_with<I>(&self, event_type: impl Into<EventType>, tokens: I, mode: FireMode) -> FireResult<()>
    where
        I: IntoIterator<Item = Value>,
    {
        let event = Event::from_tokens(event_type, tokens)?;
        self.fire_event(event, mode);
        Ok(())
    }

    /// Run the dispatch stages for an already built event.
    pub fn fire_event(&self, event: Event, mode: FireMode) {
        let event = Arc::new(event);
        debug!(event_type = %event.event_type(), ?mode, payload = %event.payload_json(), "event fired");
        self.monitor.record(&event);

        dispatch(self.registries.sync(), &event);

        match mode {
            FireMode::ForceSync => {
                dispatch(self.registries.async_(), &event);
            }
            FireMode::Scheduled => self.schedule(event),
        }
    }

    fn schedule(&self, event: Arc<Event>) {
        let registries = Arc::clone(&self.registries);
        let job: Job = Box::new(move || {
            dispatch(registries.async_(), &event);
        });

        if let Err(job) = self.pool.submit(job) {
            warn!("worker pool unavailable, dispatching async handlers inline");
            job();
        }
    }
}

//! Process-wide bus.
//!
//! Built lazily on first use from [`BusConfig::from_env`] and kept for the
//! life of the process. The free functions here forward to it.

use std::sync::OnceLock;

use serde_json::Value;
use tracing::warn;

use evbus_core::{EventType, FireResult, HandlerKey};

use crate::bus::EventBus;
use crate::config::BusConfig;
use crate::handler::IntoHandler;

static BUS: OnceLock<EventBus> = OnceLock::new();

/// The process-wide bus.
pub fn global() -> &'static EventBus {
    BUS.get_or_init(|| {
        let config = BusConfig::from_env().unwrap_or_else(|err| {
            warn!(error = %err, "invalid event bus configuration, using defaults");
            BusConfig::default()
        });
        EventBus::new(config)
    })
}

/// Install a bus built from `config` as the process-wide bus.
///
/// Returns `false` (and changes nothing) if the global bus already exists.
pub fn init_global(config: BusConfig) -> bool {
    let mut installed = false;
    BUS.get_or_init(|| {
        installed = true;
        EventBus::new(config)
    });
    installed
}

pub fn register<H, M>(event_type: impl Into<EventType>, key: impl Into<HandlerKey>, handler: H)
where
    H: IntoHandler<M>,
{
    global().register(event_type, key, handler);
}

pub fn register_sync<H, M>(event_type: impl Into<EventType>, key: impl Into<HandlerKey>, handler: H)
where
    H: IntoHandler<M>,
{
    global().register_sync(event_type, key, handler);
}

pub fn register_oneshot<H, M>(event_type: impl Into<EventType>, key: impl Into<HandlerKey>, handler: H)
where
    H: IntoHandler<M>,
{
    global().register_oneshot(event_type, key, handler);
}

pub fn register_oneshot_sync<H, M>(event_type: impl Into<EventType>, key: impl Into<HandlerKey>, handler: H)
where
    H: IntoHandler<M>,
{
    global().register_oneshot_sync(event_type, key, handler);
}

pub fn subscribe<H, M>(event_type: impl Into<EventType>, handler: H) -> HandlerKey
where
    H: IntoHandler<M>,
{
    global().subscribe(event_type, handler)
}

pub fn subscribe_sync<H, M>(event_type: impl Into<EventType>, handler: H) -> HandlerKey
where
    H: IntoHandler<M>,
{
    global().subscribe_sync(event_type, handler)
}

pub fn unregister(event_type: impl Into<EventType>, key: impl Into<HandlerKey>) -> bool {
    global().unregister(event_type, key)
}

pub fn unregister_all(event_type: impl Into<EventType>) -> usize {
    global().unregister_all(event_type)
}

pub fn fire<I>(event_type: impl Into<EventType>, tokens: I) -> FireResult<()>
where
    I: IntoIterator<Item = Value>,
{
    global().fire(event_type, tokens)
}

pub fn fire_sync<I>(event_type: impl Into<EventType>, tokens: I) -> FireResult<()>
where
    I: IntoIterator<Item = Value>,
{
    global().fire_sync(event_type, tokens)
}

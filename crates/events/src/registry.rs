//! Handler registries.
//!
//! Each registry is a single `RwLock` around the whole map, so every mutation
//! (insert, replace, remove, clear, done-pruning) commits atomically and
//! mutations are serialized. Readers only hold the lock long enough to clone
//! a list of `Arc`s; handlers never run under it.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use evbus_core::{EventType, HandlerKey};

use crate::handler::Handler;

/// Which of the two registries an entry lives in.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum RegistryKind {
    /// Dispatched on the firing thread, always blocking.
    Sync,
    /// Dispatched on the worker pool unless the fire forces it inline.
    Async,
}

impl fmt::Display for RegistryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sync => f.write_str("sync"),
            Self::Async => f.write_str("async"),
        }
    }
}

/// One keyed entry, as seen in a snapshot.
#[derive(Debug, Clone)]
pub struct Registered {
    pub key: HandlerKey,
    pub handler: Arc<Handler>,
}

type Tables = HashMap<EventType, Vec<Registered>>;

/// Event type → handlers in registration order.
#[derive(Debug)]
pub struct Registry {
    kind: RegistryKind,
    tables: RwLock<Tables>,
}

impl Registry {
    pub fn new(kind: RegistryKind) -> Self {
        Self {
            kind,
            tables: RwLock::new(HashMap::new()),
        }
    }

    pub fn kind(&self) -> RegistryKind {
        self.kind
    }

    /// Insert a handler, replacing (in place) any entry under the same key.
    ///
    /// Returns `true` when an existing entry was replaced.
    pub fn insert(&self, event_type: EventType, key: HandlerKey, handler: Handler) -> bool {
        let handler = Arc::new(handler);
        let mut tables = self.write();
        let entries = tables.entry(event_type.clone()).or_default();

        let replaced = match entries.iter_mut().find(|r| r.key == key) {
            Some(existing) => {
                existing.handler = handler;
                true
            }
            None => {
                entries.push(Registered {
                    key: key.clone(),
                    handler,
                });
                false
            }
        };
        drop(tables);

        debug!(registry = %self.kind, event_type = %event_type, key = %key, replaced, "handler registered");
        replaced
    }

    /// Copy of the current entries for `event_type`, in registration order.
    pub fn snapshot(&self, event_type: &EventType) -> Vec<Registered> {
        self.read().get(event_type).cloned().unwrap_or_default()
    }

    /// Remove the given snapshot entries from the live table.
    ///
    /// An entry is removed only if the live entry under its key is still the
    /// exact handler from the snapshot; a concurrent re-registration under the
    /// same key survives. Returns the number of entries removed.
    pub fn prune(&self, event_type: &EventType, done: &[Registered]) -> usize {
        if done.is_empty() {
            return 0;
        }

        let mut tables = self.write();
        let Some(entries) = tables.get_mut(event_type) else {
            return 0;
        };

        let before = entries.len();
        entries.retain(|live| {
            !done
                .iter()
                .any(|d| d.key == live.key && Arc::ptr_eq(&d.handler, &live.handler))
        });
        let removed = before - entries.len();

        if entries.is_empty() {
            tables.remove(event_type);
        }
        removed
    }

    /// Keys registered for `event_type`, in registration order.
    pub fn keys(&self, event_type: &EventType) -> Vec<HandlerKey> {
        self.read()
            .get(event_type)
            .map(|entries| entries.iter().map(|r| r.key.clone()).collect())
            .unwrap_or_default()
    }

    pub fn len(&self, event_type: &EventType) -> usize {
        self.read().get(event_type).map_or(0, Vec::len)
    }

    pub fn contains(&self, event_type: &EventType, key: &HandlerKey) -> bool {
        self.read()
            .get(event_type)
            .is_some_and(|entries| entries.iter().any(|r| &r.key == key))
    }

    /// Event types with at least one handler.
    pub fn event_types(&self) -> Vec<EventType> {
        let mut types: Vec<EventType> = self.read().keys().cloned().collect();
        types.sort();
        types
    }

    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        // Handlers never run under this lock, so poisoning cannot leave a
        // half-applied mutation behind.
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn remove_key(tables: &mut Tables, event_type: &EventType, key: &HandlerKey) -> bool {
    let Some(entries) = tables.get_mut(event_type) else {
        return false;
    };
    let before = entries.len();
    entries.retain(|r| &r.key != key);
    let removed = entries.len() != before;
    if entries.is_empty() {
        tables.remove(event_type);
    }
    removed
}

/// The sync and async registries, mutated together where a removal must
/// apply to both.
#[derive(Debug)]
pub struct Registries {
    sync: Registry,
    async_: Registry,
}

impl Default for Registries {
    fn default() -> Self {
        Self::new()
    }
}

impl Registries {
    pub fn new() -> Self {
        Self {
            sync: Registry::new(RegistryKind::Sync),
            async_: Registry::new(RegistryKind::Async),
        }
    }

    pub fn get(&self, kind: RegistryKind) -> &Registry {
        match kind {
            RegistryKind::Sync => &self.sync,
            RegistryKind::Async => &self.async_,
        }
    }

    pub fn sync(&self) -> &Registry {
        &self.sync
    }

    pub fn async_(&self) -> &Registry {
        &self.async_
    }

    pub fn register(&self, kind: RegistryKind, event_type: EventType, key: HandlerKey, handler: Handler) {
        self.get(kind).insert(event_type, key, handler);
    }

    /// Remove `key` for `event_type` from both registries in one commit.
    ///
    /// Locks are always taken sync-then-async. Idempotent; returns `true` if
    /// anything was removed.
    pub fn remove(&self, event_type: &EventType, key: &HandlerKey) -> bool {
        let mut sync = self.sync.write();
        let mut async_ = self.async_.write();

        let from_sync = remove_key(&mut sync, event_type, key);
        let from_async = remove_key(&mut async_, event_type, key);
        drop(async_);
        drop(sync);

        debug!(event_type = %event_type, key = %key, from_sync, from_async, "handler removed");
        from_sync || from_async
    }

    /// Drop every handler for `event_type` from both registries in one
    /// commit. Returns the number of entries removed.
    pub fn remove_all(&self, event_type: &EventType) -> usize {
        let mut sync = self.sync.write();
        let mut async_ = self.async_.write();

        let removed = sync.remove(event_type).map_or(0, |e| e.len())
            + async_.remove(event_type).map_or(0, |e| e.len());
        drop(async_);
        drop(sync);

        debug!(event_type = %event_type, removed, "all handlers removed");
        removed
    }
}

//! Optional record of what has been fired.
//!
//! When enabled, the bus hands every successfully constructed event to the
//! monitor before dispatch. The monitor keeps the most recent event and a
//! fire count per event type. Disabled, recording is a single atomic load.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use evbus_core::EventType;

use crate::event::Event;

#[derive(Debug, Default)]
struct Seen {
    latest: HashMap<EventType, Arc<Event>>,
    counts: HashMap<EventType, u64>,
}

#[derive(Debug, Default)]
pub struct EventMonitor {
    enabled: AtomicBool,
    seen: Mutex<Seen>,
}

impl EventMonitor {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            seen: Mutex::default(),
        }
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Release);
    }

    /// Stop recording. What was recorded so far is kept.
    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Release);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn record(&self, event: &Arc<Event>) {
        if !self.is_enabled() {
            return;
        }
        let mut seen = self.lock();
        let ty = event.event_type().clone();
        *seen.counts.entry(ty.clone()).or_insert(0) += 1;
        seen.latest.insert(ty, Arc::clone(event));
    }

    /// Most recent event of this type, if any was recorded.
    pub fn recent(&self, event_type: &EventType) -> Option<Arc<Event>> {
        self.lock().latest.get(event_type).cloned()
    }

    pub fn count(&self, event_type: &EventType) -> u64 {
        self.lock().counts.get(event_type).copied().unwrap_or(0)
    }

    /// Event types recorded so far, sorted.
    pub fn fired_types(&self) -> Vec<EventType> {
        let mut types: Vec<EventType> = self.lock().latest.keys().cloned().collect();
        types.sort();
        types
    }

    pub fn clear(&self) {
        let mut seen = self.lock();
        seen.latest.clear();
        seen.counts.clear();
    }

    fn lock(&self) -> MutexGuard<'_, Seen> {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ev(ty: &str, n: i64) -> Arc<Event> {
        Arc::new(Event::from_tokens(ty, vec![json!("n"), json!(n)]).unwrap())
    }

    #[test]
    fn disabled_monitor_records_nothing() {
        let monitor = EventMonitor::default();
        monitor.record(&ev("ping", 1));
        assert!(monitor.fired_types().is_empty());
        assert_eq!(monitor.count(&EventType::from("ping")), 0);
    }

    #[test]
    fn keeps_latest_and_counts() {
        let monitor = EventMonitor::new(true);
        monitor.record(&ev("ping", 1));
        monitor.record(&ev("ping", 2));
        monitor.record(&ev("note-on", 60));

        let ping = EventType::from("ping");
        assert_eq!(monitor.count(&ping), 2);
        assert_eq!(monitor.recent(&ping).unwrap().get("n"), Some(&json!(2)));
        assert_eq!(
            monitor.fired_types(),
            vec![EventType::from("note-on"), EventType::from("ping")]
        );

        monitor.disable();
        monitor.record(&ev("ping", 3));
        assert_eq!(monitor.count(&ping), 2);

        monitor.clear();
        assert!(monitor.recent(&ping).is_none());
    }
}

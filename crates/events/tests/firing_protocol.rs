use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex, mpsc};
use std::thread;
use std::time::{Duration, Instant};

use evbus_events::{
    BusConfig, Event, EventBus, EventType, FireError, FireMode, Flow, HandlerKey, RegistryKind, payload,
};
use serde_json::json;

fn bus(workers: usize) -> EventBus {
    evbus_observability::init_pretty("evbus_events=debug");
    EventBus::new(BusConfig::default().with_workers(workers).with_thread_name("it-worker"))
}

fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    cond()
}

#[test]
fn note_on_example_delivers_record_to_async_handler() {
    let bus = bus(2);
    let (tx, rx) = mpsc::channel::<Event>();
    let tx = Mutex::new(tx);
    bus.register("note-on", "k1", move |ev: &Event| {
        let _ = tx.lock().unwrap().send(ev.clone());
    });

    bus.fire("note-on", payload!["note", 60, "vel", 100]).unwrap();

    let ev = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(ev.event_type(), "note-on");
    assert_eq!(ev.get("note"), Some(&json!(60)));
    assert_eq!(ev.get("vel"), Some(&json!(100)));
    assert_eq!(ev.payload().len(), 2);

    // Invoked exactly once.
    assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
}

#[test]
fn ping_example_done_handler_runs_only_on_first_fire() {
    let bus = bus(2);
    let calls = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&calls);
    bus.register("ping", "once", move || {
        c.fetch_add(1, Ordering::SeqCst);
        Flow::Done
    });

    bus.fire("ping", payload![]).unwrap();
    assert!(wait_until(|| bus.handler_keys(RegistryKind::Async, "ping").is_empty()));
    bus.fire("ping", payload![]).unwrap();
    assert!(wait_until(|| bus.pool_stats().pending() == 0));

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn odd_payload_is_the_only_caller_visible_error() {
    let bus = bus(1);
    bus.register_sync("t", "panics", |_ev: &Event| -> Flow { panic!("subscriber bug") });

    assert_eq!(
        bus.fire_with("t", payload!["a"], FireMode::ForceSync),
        Err(FireError::odd_payload(EventType::from("t"), 1))
    );
    assert_eq!(bus.fire_sync("t", payload!["a", 1]), Ok(()));
}

#[test]
fn failures_do_not_stop_siblings_or_later_events() {
    let bus = bus(2);
    let calls = Arc::new(AtomicUsize::new(0));

    bus.register_sync("t", "err", || -> anyhow::Result<()> { anyhow::bail!("sync failure") });
    bus.register("t", "panic", || -> Flow { panic!("async failure") });
    for key in ["a", "b"] {
        let c = Arc::clone(&calls);
        bus.register("t", key, move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
    }

    for _ in 0..3 {
        bus.fire_sync("t", payload![]).unwrap();
    }
    assert_eq!(calls.load(Ordering::SeqCst), 6);

    // Still accepting registrations and scheduled firings.
    let c = Arc::clone(&calls);
    bus.register("t", "late", move || {
        c.fetch_add(100, Ordering::SeqCst);
    });
    bus.fire("t", payload![]).unwrap();
    assert!(wait_until(|| calls.load(Ordering::SeqCst) == 108));
}

#[test]
fn concurrent_registration_of_distinct_keys_keeps_all() {
    let bus = Arc::new(bus(2));
    let barrier = Arc::new(Barrier::new(4));

    let threads: Vec<_> = (0..4)
        .map(|t| {
            let bus = Arc::clone(&bus);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for i in 0..25 {
                    bus.register("t", format!("{t}-{i}"), || ());
                    bus.fire("t", payload![]).unwrap();
                }
            })
        })
        .collect();
    for t in threads {
        t.join().unwrap();
    }

    assert_eq!(bus.handler_keys(RegistryKind::Async, "t").len(), 100);
}

#[test]
fn remove_during_async_backlog_stops_later_passes() {
    let bus = bus(1);
    let calls = Arc::new(AtomicUsize::new(0));
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let release_rx = Mutex::new(release_rx);

    bus.register("gate", "block", move || {
        let _ = release_rx.lock().unwrap().recv();
    });
    let c = Arc::clone(&calls);
    bus.register("t", "k", move || {
        c.fetch_add(1, Ordering::SeqCst);
    });

    // The single worker is parked on "gate"; the "t" pass waits in the queue.
    bus.fire("gate", payload![]).unwrap();
    bus.fire("t", payload![]).unwrap();
    assert!(bus.unregister("t", HandlerKey::from("k")));
    release_tx.send(()).unwrap();

    assert!(wait_until(|| bus.pool_stats().pending() == 0));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn global_bus_round_trip() {
    let seen = Arc::new(AtomicUsize::new(0));
    let s = Arc::clone(&seen);
    evbus_events::register_sync("it-global", "k", move |ev: &Event| {
        s.fetch_add(ev.get("n").and_then(|v| v.as_u64()).unwrap_or(0) as usize, Ordering::SeqCst);
    });
    let s = Arc::clone(&seen);
    let key = evbus_events::subscribe("it-global", move || {
        s.fetch_add(1000, Ordering::SeqCst);
    });

    evbus_events::fire_sync("it-global", payload!["n", 5]).unwrap();
    assert_eq!(seen.load(Ordering::SeqCst), 1005);

    assert!(evbus_events::unregister("it-global", key));
    evbus_events::fire_sync("it-global", payload!["n", 1]).unwrap();
    assert_eq!(seen.load(Ordering::SeqCst), 1006);

    assert_eq!(evbus_events::unregister_all("it-global"), 1);
    assert!(evbus_events::fire("it-global", payload!["n"]).is_err());
    assert!(!evbus_events::init_global(BusConfig::default()));
}

//! Fires a few note events through the process-wide bus.
//!
//! `RUST_LOG=evbus_events=debug cargo run -p evbus-events --example note_on`

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use evbus_events::{Event, Flow, FireError, HandlerSlot, payload};

fn main() -> Result<(), FireError> {
    evbus_observability::init();

    let held = Arc::new(AtomicU64::new(0));

    let h = Arc::clone(&held);
    evbus_events::register_sync("note-on", "held", move |ev: &Event| {
        if let Some(note) = ev.get("note").and_then(|n| n.as_u64()) {
            h.fetch_or(1 << (note % 64), Ordering::SeqCst);
        }
    });

    let h = Arc::clone(&held);
    evbus_events::register_sync("note-off", "held", move |ev: &Event| {
        if let Some(note) = ev.get("note").and_then(|n| n.as_u64()) {
            h.fetch_and(!(1 << (note % 64)), Ordering::SeqCst);
        }
    });

    evbus_events::register_oneshot("note-on", "first-note", |ev: &Event| {
        println!("first note: {}", ev.payload_json());
    });

    // The reporter can be swapped without re-registering.
    let reporter = HandlerSlot::new(|ev: &Event| println!("note on {}", ev.payload_json()));
    evbus_events::register("note-on", "reporter", reporter.clone());

    evbus_events::fire_sync("note-on", payload!["note", 60, "vel", 100])?;
    reporter.rebind(|| Flow::Done);
    evbus_events::fire_sync("note-on", payload!["note", 64, "vel", 90])?;
    evbus_events::fire_sync("note-off", payload!["note", 60])?;

    if let Err(err) = evbus_events::fire("note-on", payload!["note"]) {
        println!("rejected: {err}");
    }

    println!("held notes bitmap: {:#b}", held.load(Ordering::SeqCst));
    Ok(())
}

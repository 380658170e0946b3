use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use evbus_core::{EventType, FireError, FireResult};

/// An immutable fired event: a type tag plus a key/value payload.
///
/// Built once per firing call and shared (behind an `Arc` on the async path)
/// by every handler that sees it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    event_type: EventType,
    payload: Map<String, Value>,
    fired_at: DateTime<Utc>,
}

impl Event {
    /// Build an event from a flat list of alternating key and value tokens.
    ///
    /// - An odd token count is rejected with [`FireError::OddPayload`].
    /// - String keys are used as-is; any other key token is rendered as JSON text.
    /// - A repeated key keeps the last value.
    pub fn from_tokens<I>(event_type: impl Into<EventType>, tokens: I) -> FireResult<Self>
    where
        I: IntoIterator<Item = Value>,
    {
        let event_type = event_type.into();
        let tokens: Vec<Value> = tokens.into_iter().collect();

        if tokens.len() % 2 != 0 {
            return Err(FireError::odd_payload(event_type, tokens.len()));
        }

        let mut payload = Map::new();
        let mut it = tokens.into_iter();
        while let (Some(key), Some(value)) = (it.next(), it.next()) {
            payload.insert(key_name(key), value);
        }

        Ok(Self {
            event_type,
            payload,
            fired_at: Utc::now(),
        })
    }

    /// An event carrying no payload.
    pub fn bare(event_type: impl Into<EventType>) -> Self {
        Self {
            event_type: event_type.into(),
            payload: Map::new(),
            fired_at: Utc::now(),
        }
    }

    pub fn event_type(&self) -> &EventType {
        &self.event_type
    }

    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    /// When the event record was constructed.
    pub fn fired_at(&self) -> DateTime<Utc> {
        self.fired_at
    }

    /// Payload rendered as compact JSON, for log records.
    pub fn payload_json(&self) -> String {
        Value::Object(self.payload.clone()).to_string()
    }
}

fn key_name(token: Value) -> String {
    match token {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

/// Build a payload token list from heterogeneous values.
///
/// ```ignore
/// bus.fire("note-on", payload!["note", 60, "vel", 100])?;
/// ```
#[macro_export]
macro_rules! payload {
    () => {
        ::std::vec::Vec::<$crate::Value>::new()
    };
    ($($tok:expr),+ $(,)?) => {
        ::std::vec![$($crate::json!($tok)),+]
    };
}

//! Error model.
//!
//! Only [`FireError`] ever reaches a caller of `fire`. [`HandlerError`] is
//! produced inside the dispatch loop and ends up in the log, never in a
//! `Result` handed back to the firing thread.

use thiserror::Error;

use crate::id::{EventType, HandlerKey};

/// Result type of the firing entry points.
pub type FireResult<T> = Result<T, FireError>;

/// The event record could not be built; nothing was dispatched.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FireError {
    /// Payload tokens must come in key/value pairs.
    #[error("event `{event_type}` fired with an odd number of payload tokens ({tokens})")]
    OddPayload { event_type: EventType, tokens: usize },
}

impl FireError {
    pub fn odd_payload(event_type: EventType, tokens: usize) -> Self {
        Self::OddPayload { event_type, tokens }
    }
}

/// A single handler invocation failed.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The handler returned an error.
    #[error("handler `{key}` for `{event_type}` failed")]
    Failed {
        event_type: EventType,
        key: HandlerKey,
        #[source]
        source: anyhow::Error,
    },

    /// The handler panicked; the payload message is kept when it is a string.
    #[error("handler `{key}` for `{event_type}` panicked: {message}")]
    Panicked {
        event_type: EventType,
        key: HandlerKey,
        message: String,
        /// Rendered backtrace captured at the panic site.
        trace: String,
    },

    /// The resolved arity does not match any invocation shape of the callable.
    #[error("handler `{key}` for `{event_type}` cannot be called with {arity} argument(s)")]
    ArityMismatch {
        event_type: EventType,
        key: HandlerKey,
        arity: usize,
    },
}

impl HandlerError {
    pub fn key(&self) -> &HandlerKey {
        match self {
            Self::Failed { key, .. } | Self::Panicked { key, .. } | Self::ArityMismatch { key, .. } => key,
        }
    }

    pub fn event_type(&self) -> &EventType {
        match self {
            Self::Failed { event_type, .. }
            | Self::Panicked { event_type, .. }
            | Self::ArityMismatch { event_type, .. } => event_type,
        }
    }

    /// Backtrace of a panicking handler, if one was captured.
    pub fn trace(&self) -> Option<&str> {
        match self {
            Self::Panicked { trace, .. } if !trace.is_empty() => Some(trace),
            _ => None,
        }
    }
}

/// A configuration value could not be parsed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?} ({reason})")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    pub fn invalid(var: &'static str, value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            var,
            value: value.into(),
            reason: reason.into(),
        }
    }
}

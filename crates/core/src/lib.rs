//! `evbus-core` — identifiers and error model shared by the event bus crates.
//!
//! This crate holds no dispatch logic.

pub mod error;
pub mod id;

pub use error::{ConfigError, FireError, FireResult, HandlerError};
pub use id::{EventType, HandlerKey};

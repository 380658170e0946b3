//! Bus configuration.

use evbus_core::ConfigError;

use crate::pool::WorkerPool;

pub const ENV_WORKERS: &str = "EVBUS_WORKERS";
pub const ENV_THREAD_NAME: &str = "EVBUS_THREAD_NAME";
pub const ENV_MONITOR: &str = "EVBUS_MONITOR";

/// Event bus configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusConfig {
    /// Async worker count; `None` means host parallelism.
    pub workers: Option<usize>,
    /// Prefix for worker thread names.
    pub thread_name: String,
    /// Start with the event monitor recording.
    pub monitor: bool,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            workers: None,
            thread_name: "evbus-worker".to_string(),
            monitor: false,
        }
    }
}

impl BusConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    pub fn with_monitor(mut self, enabled: bool) -> Self {
        self.monitor = enabled;
        self
    }

    /// Worker count the pool will be built with (never zero).
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(WorkerPool::default_size).max(1)
    }

    /// Read overrides from the process environment.
    ///
    /// Unset variables keep their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`BusConfig::from_env`] with an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_WORKERS) {
            let workers: usize = raw
                .trim()
                .parse()
                .map_err(|e| ConfigError::invalid(ENV_WORKERS, &raw, format!("{e}")))?;
            if workers == 0 {
                return Err(ConfigError::invalid(ENV_WORKERS, raw, "must be at least 1"));
            }
            config.workers = Some(workers);
        }

        if let Some(raw) = lookup(ENV_THREAD_NAME) {
            let name = raw.trim();
            if name.is_empty() {
                return Err(ConfigError::invalid(ENV_THREAD_NAME, raw, "must not be empty"));
            }
            config.thread_name = name.to_string();
        }

        if let Some(raw) = lookup(ENV_MONITOR) {
            config.monitor = parse_flag(&raw)
                .ok_or_else(|| ConfigError::invalid(ENV_MONITOR, &raw, "expected true/false"))?;
        }

        Ok(config)
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = BusConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, BusConfig::default());
        assert!(config.worker_count() >= 1);
    }

    #[test]
    fn reads_overrides() {
        let config = BusConfig::from_lookup(lookup(&[
            (ENV_WORKERS, "3"),
            (ENV_THREAD_NAME, "midi-bus"),
            (ENV_MONITOR, "on"),
        ]))
        .unwrap();

        assert_eq!(config.worker_count(), 3);
        assert_eq!(config.thread_name, "midi-bus");
        assert!(config.monitor);
    }

    #[test]
    fn rejects_malformed_values() {
        assert!(BusConfig::from_lookup(lookup(&[(ENV_WORKERS, "many")])).is_err());
        assert!(BusConfig::from_lookup(lookup(&[(ENV_WORKERS, "0")])).is_err());
        assert!(BusConfig::from_lookup(lookup(&[(ENV_THREAD_NAME, "  ")])).is_err());

        let err = BusConfig::from_lookup(lookup(&[(ENV_MONITOR, "maybe")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::invalid(ENV_MONITOR, "maybe", "expected true/false")
        );
    }

    #[test]
    fn builder_overrides() {
        let config = BusConfig::default()
            .with_workers(0)
            .with_thread_name("x")
            .with_monitor(true);
        assert_eq!(config.worker_count(), 1);
        assert_eq!(config.thread_name, "x");
        assert!(config.monitor);
    }
}

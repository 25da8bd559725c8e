//! Logging configuration and step timing
//!
//! Log records go through the `log` facade with an `env_logger` backend.
//! User-facing step confirmations are not log records; see `report`.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Log levels accepted in the config file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Warn
    }
}

impl LogLevel {
    pub fn to_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Initialize the global logger
///
/// `level` is the default; `RUST_LOG` overrides it. Safe to call more than once.
pub fn init(level: LogLevel) {
    let _ = env_logger::Builder::new()
        .filter_level(level.to_filter())
        .parse_default_env()
        .format_target(false)
        .try_init();
}

/// Timer utility for measuring a walkthrough step
pub struct Timer {
    start: Instant,
    operation_name: String,
}

impl Timer {
    /// Start a new timer
    pub fn start(operation_name: &str) -> Self {
        Self {
            start: Instant::now(),
            operation_name: operation_name.to_string(),
        }
    }

    /// Stop the timer, log the outcome and return elapsed duration
    pub fn stop(self, success: bool) -> Duration {
        let duration = self.start.elapsed();
        if success {
            log::debug!("[step] {} took {:?}", self.operation_name, duration);
        } else {
            log::debug!("[step] {} failed after {:?}", self.operation_name, duration);
        }
        duration
    }
}

/// Time `f` as one step, logging whether it returned `Ok`
pub fn timed<T, E>(operation_name: &str, f: impl FnOnce() -> Result<T, E>) -> Result<T, E> {
    let timer = Timer::start(operation_name);
    let result = f();
    timer.stop(result.is_ok());
    result
}

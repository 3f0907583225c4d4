//! The pluggable logging capability every loader is constructed with.
//!
//! The engine itself never shuts down `log`'s global logger, so routing
//! through it is safe for the zombie-access warning. Diagnostics that must
//! survive a torn-down logger (the closed-loader missing-file report) go
//! straight to stderr instead — see [`crate::zombie`].

use std::sync::Arc;

/// A sink the build tool can use to route warnings into its own logger.
pub trait LogSink: Send + Sync {
    fn warn(&self, message: &str);
}

/// Forwards to the `log` crate's `warn!` macro at target `layered_classloader`.
#[derive(Debug, Default)]
pub struct DefaultLogSink;

impl LogSink for DefaultLogSink {
    fn warn(&self, message: &str) {
        log::warn!(target: "layered_classloader", "{message}");
    }
}

pub fn default_log_sink() -> Arc<dyn LogSink> {
    Arc::new(DefaultLogSink)
}

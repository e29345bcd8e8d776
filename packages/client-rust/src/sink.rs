//! [`LogSink`] implementations.
//!
//! - [`TracingLogSink`]: structured `tracing` events
//! - [`MemoryLogSink`]: keeps entries for later inspection
//! - [`LogSinkChain`]: fans out to several sinks

use std::sync::Arc;

use ldaptools_core::{LogEntry, LogSink};
use parking_lot::Mutex;

// ---------------------------------------------------------------------------
// TracingLogSink
// ---------------------------------------------------------------------------

/// Emits each invocation start and end as a `tracing` event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogSink;

impl TracingLogSink {
    fn arguments(entry: &LogEntry) -> String {
        serde_json::to_string(&entry.arguments).unwrap_or_default()
    }
}

impl LogSink for TracingLogSink {
    fn start(&self, entry: &LogEntry) {
        tracing::info!(
            operation = %entry.operation,
            domain = %entry.domain,
            server = entry.server.as_deref().unwrap_or(""),
            arguments = %Self::arguments(entry),
            "ldap operation started"
        );
    }

    fn end(&self, entry: &LogEntry) {
        let duration_ms = entry.duration_ms().unwrap_or(0);
        match &entry.error {
            Some(error) => tracing::warn!(
                operation = %entry.operation,
                domain = %entry.domain,
                duration_ms = duration_ms,
                error = %error,
                "ldap operation failed"
            ),
            None => tracing::info!(
                operation = %entry.operation,
                domain = %entry.domain,
                duration_ms = duration_ms,
                "ldap operation finished"
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// MemoryLogSink
// ---------------------------------------------------------------------------

/// Keeps a copy of every entry it receives.
#[derive(Debug, Default)]
pub struct MemoryLogSink {
    started: Mutex<Vec<LogEntry>>,
    ended: Mutex<Vec<LogEntry>>,
}

impl MemoryLogSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries as they looked when execution started.
    #[must_use]
    pub fn started(&self) -> Vec<LogEntry> {
        self.started.lock().clone()
    }

    /// Entries as they looked when the invocation finished.
    #[must_use]
    pub fn ended(&self) -> Vec<LogEntry> {
        self.ended.lock().clone()
    }

    pub fn clear(&self) {
        self.started.lock().clear();
        self.ended.lock().clear();
    }
}

impl LogSink for MemoryLogSink {
    fn start(&self, entry: &LogEntry) {
        self.started.lock().push(entry.clone());
    }

    fn end(&self, entry: &LogEntry) {
        self.ended.lock().push(entry.clone());
    }
}

// ---------------------------------------------------------------------------
// LogSinkChain
// ---------------------------------------------------------------------------

/// Composite sink that forwards every entry to each of its sinks in order.
#[derive(Default)]
pub struct LogSinkChain {
    sinks: Vec<Arc<dyn LogSink>>,
}

impl LogSinkChain {
    #[must_use]
    pub fn new(sinks: Vec<Arc<dyn LogSink>>) -> Self {
        Self { sinks }
    }

    pub fn add(&mut self, sink: Arc<dyn LogSink>) {
        self.sinks.push(sink);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl LogSink for LogSinkChain {
    fn start(&self, entry: &LogEntry) {
        for sink in &self.sinks {
            sink.start(entry);
        }
    }

    fn end(&self, entry: &LogEntry) {
        for sink in &self.sinks {
            sink.end(entry);
        }
    }
}

//! Audit record of a single operation invocation.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::operation::Operation;

/// Lifecycle record for one invocation, handed to a [`LogSink`] at start and end.
///
/// Holds a snapshot of the operation rather than a borrow so the entry can
/// outlive the call frame (e.g. when a sink stores it).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    /// Operation name, e.g. `"Query"` or `"Move"`.
    pub operation: String,
    /// Concrete operation type.
    pub kind: String,
    /// Server preference at the time of the snapshot.
    pub server: Option<String>,
    /// Masked, flattened operation arguments.
    pub arguments: BTreeMap<String, String>,
    /// Domain name of the connection the operation ran on.
    pub domain: String,
    /// Millis since epoch when execution started.
    pub started_at: Option<u64>,
    /// Millis since epoch when the invocation finished.
    pub ended_at: Option<u64>,
    /// Display form of the error, if the invocation failed.
    pub error: Option<String>,
}

impl LogEntry {
    #[must_use]
    pub fn new(operation: &Operation, domain: impl Into<String>) -> Self {
        Self {
            operation: operation.name().to_string(),
            kind: operation.kind().to_string(),
            server: operation.server().map(str::to_string),
            arguments: operation.log_arguments(),
            domain: domain.into(),
            started_at: None,
            ended_at: None,
            error: None,
        }
    }

    /// Mark the start of execution. The operation snapshot is refreshed so
    /// that defaults filled in by the handler are recorded.
    pub fn start(&mut self, operation: &Operation, at: u64) {
        self.operation = operation.name().to_string();
        self.server = operation.server().map(str::to_string);
        self.arguments = operation.log_arguments();
        self.started_at = Some(at);
    }

    pub fn end(&mut self, at: u64) {
        self.ended_at = Some(at);
    }

    pub fn set_error(&mut self, error: &dyn std::error::Error) {
        self.error = Some(error.to_string());
    }

    /// Wall time between start and end, once both are known.
    #[must_use]
    pub fn duration_ms(&self) -> Option<u64> {
        match (self.started_at, self.ended_at) {
            (Some(start), Some(end)) => Some(end.saturating_sub(start)),
            _ => None,
        }
    }
}

/// Receiver for invocation log entries.
///
/// Optional: an invoker without a sink creates no entries at all.
pub trait LogSink: Send + Sync {
    /// Called once execution is about to begin.
    fn start(&self, entry: &LogEntry);

    /// Called exactly once per invocation, after the outcome is known.
    fn end(&self, entry: &LogEntry);
}

//! Operation invocation: dispatch to a handler, honour server affinity, and
//! guarantee logging and session restoration on every exit path.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use ldaptools_core::{
    ClockSource, Connection, ConnectionError, EventDispatcher, LogEntry, LogSink, Operation,
    OperationError, OperationResponse, SystemClock,
};
use tracing::{info_span, Instrument};

use crate::affinity::{ConnectionState, ServerAffinitySwitcher};
use crate::handler::OperationHandler;
use crate::registry::HandlerRegistry;

// ---------------------------------------------------------------------------
// InvocationPhase
// ---------------------------------------------------------------------------

/// Stage an invocation is in. Failures are reported with the stage they hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationPhase {
    Dispatching,
    PreSwitching,
    Executing,
    PostSwitching,
}

impl fmt::Display for InvocationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Dispatching => "dispatching",
            Self::PreSwitching => "pre-switching",
            Self::Executing => "executing",
            Self::PostSwitching => "post-switching",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// OperationInvoker
// ---------------------------------------------------------------------------

/// Runs operations against one session.
///
/// Each call resolves a handler, lets it fill operation defaults, moves the
/// session to the operation's preferred server, executes, and then always
/// records the log end and moves the session back to where it was.
///
/// `execute` takes `&mut self`: the session's current server is shared
/// mutable state, so one invoker serves one call at a time. Use one
/// invoker and connection pair per concurrent logical session.
pub struct OperationInvoker {
    connection: Arc<dyn Connection>,
    registry: HandlerRegistry,
    switcher: ServerAffinitySwitcher,
    log_sink: Option<Arc<dyn LogSink>>,
    dispatcher: Option<Arc<dyn EventDispatcher>>,
    clock: Arc<dyn ClockSource>,
}

impl OperationInvoker {
    /// Invoker with the default handlers, no log sink and no dispatcher.
    #[must_use]
    pub fn new(connection: Arc<dyn Connection>) -> Self {
        Self::builder(connection).build()
    }

    #[must_use]
    pub fn builder(connection: Arc<dyn Connection>) -> OperationInvokerBuilder {
        OperationInvokerBuilder::new(connection)
    }

    #[must_use]
    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.connection
    }

    #[must_use]
    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Execute `operation` and return the handler's response.
    ///
    /// `operation` may have unset fields filled in by its handler.
    ///
    /// # Errors
    ///
    /// Returns exactly the error raised while dispatching, switching servers
    /// or executing. If that step succeeded but restoring the original server
    /// failed, the restore error is returned instead.
    pub async fn execute(
        &mut self,
        operation: &mut Operation,
    ) -> Result<OperationResponse, OperationError> {
        let span = info_span!(
            "ldap_operation",
            operation = operation.name(),
            kind = operation.kind(),
            duration_ms = tracing::field::Empty,
            outcome = tracing::field::Empty,
        );
        self.invoke(operation).instrument(span).await
    }

    async fn invoke(
        &self,
        operation: &mut Operation,
    ) -> Result<OperationResponse, OperationError> {
        let start = Instant::now();
        let mut log = self.log_entry(operation);
        let state = ConnectionState::capture(self.connection.as_ref());

        let mut phase = InvocationPhase::Dispatching;
        let result = self.run(operation, log.as_mut(), &mut phase).await;
        if let Err(err) = &result {
            tracing::debug!(phase = %phase, error = %err, "operation failed");
            if let Some(entry) = log.as_mut() {
                entry.set_error(err);
            }
        }

        let restored = self.finish(operation, &state, log).await;

        #[allow(clippy::cast_possible_truncation)]
        let duration_ms = start.elapsed().as_millis() as u64;
        let outcome = if result.is_ok() && restored.is_ok() {
            "ok"
        } else {
            "error"
        };
        tracing::Span::current().record("duration_ms", duration_ms);
        tracing::Span::current().record("outcome", outcome);

        match (result, restored) {
            (Ok(response), Ok(())) => Ok(response),
            (Ok(_), Err(restore_err)) => {
                tracing::error!(
                    phase = %InvocationPhase::PostSwitching,
                    error = %restore_err,
                    "failed to restore server after operation"
                );
                Err(restore_err.into())
            }
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(restore_err)) => {
                tracing::error!(
                    phase = %InvocationPhase::PostSwitching,
                    error = %restore_err,
                    "failed to restore server after failed operation"
                );
                Err(err)
            }
        }
    }

    /// Dispatch, switch and execute. `phase` tracks how far it got.
    async fn run(
        &self,
        operation: &mut Operation,
        log: Option<&mut LogEntry>,
        phase: &mut InvocationPhase,
    ) -> Result<OperationResponse, OperationError> {
        let handler = self.registry.resolve(
            operation,
            self.connection.clone(),
            self.dispatcher.clone(),
        )?;
        handler.set_operation_defaults(operation);
        self.log_start(log, operation);

        *phase = InvocationPhase::PreSwitching;
        let current = self.connection.server();
        self.switcher
            .switch_if_needed(
                self.connection.as_ref(),
                current.as_deref(),
                operation.server(),
                operation,
            )
            .await?;

        *phase = InvocationPhase::Executing;
        tracing::debug!(handler = handler.name(), "executing operation");
        handler.execute(operation).await
    }

    /// Restore the server captured before the call and log the end. Runs once
    /// per invocation whatever happened before it. A restore failure is put on
    /// the log entry unless it already carries the operation's own error.
    async fn finish(
        &self,
        operation: &Operation,
        state: &ConnectionState,
        mut log: Option<LogEntry>,
    ) -> Result<(), ConnectionError> {
        if let Some(entry) = log.as_mut() {
            entry.end(self.clock.now());
        }

        let current = self.connection.server();
        let restored = self
            .switcher
            .switch_if_needed(
                self.connection.as_ref(),
                current.as_deref(),
                state.last_server(),
                operation,
            )
            .await
            .map(|_| ());

        if let Some(mut entry) = log {
            if let Err(restore_err) = &restored {
                if entry.error.is_none() {
                    entry.set_error(restore_err);
                }
            }
            if let Some(sink) = &self.log_sink {
                sink.end(&entry);
            }
        }
        restored
    }

    /// A fresh log entry, only when a sink is configured.
    fn log_entry(&self, operation: &Operation) -> Option<LogEntry> {
        self.log_sink
            .as_ref()
            .map(|_| LogEntry::new(operation, self.connection.config().domain_name.clone()))
    }

    fn log_start(&self, log: Option<&mut LogEntry>, operation: &Operation) {
        let (Some(entry), Some(sink)) = (log, &self.log_sink) else {
            return;
        };
        entry.start(operation, self.clock.now());
        sink.start(entry);
    }
}

impl fmt::Debug for OperationInvoker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationInvoker")
            .field("server", &self.connection.server())
            .field("handlers", &self.registry.handler_names())
            .field("log_sink", &self.log_sink.is_some())
            .field("dispatcher", &self.dispatcher.is_some())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// OperationInvokerBuilder
// ---------------------------------------------------------------------------

/// Builder for [`OperationInvoker`].
///
/// Without any `handler` calls the invoker gets the default registry
/// (generic, query, authentication).
pub struct OperationInvokerBuilder {
    connection: Arc<dyn Connection>,
    handlers: Vec<Box<dyn OperationHandler>>,
    log_sink: Option<Arc<dyn LogSink>>,
    dispatcher: Option<Arc<dyn EventDispatcher>>,
    clock: Option<Arc<dyn ClockSource>>,
}

impl OperationInvokerBuilder {
    #[must_use]
    pub fn new(connection: Arc<dyn Connection>) -> Self {
        Self {
            connection,
            handlers: Vec::new(),
            log_sink: None,
            dispatcher: None,
            clock: None,
        }
    }

    /// Register a handler. Handlers are probed in the order they are added.
    #[must_use]
    pub fn handler<H: OperationHandler + 'static>(mut self, handler: H) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    #[must_use]
    pub fn log_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.log_sink = Some(sink);
        self
    }

    #[must_use]
    pub fn event_dispatcher(mut self, dispatcher: Arc<dyn EventDispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn ClockSource>) -> Self {
        self.clock = Some(clock);
        self
    }

    #[must_use]
    pub fn build(self) -> OperationInvoker {
        let registry = if self.handlers.is_empty() {
            HandlerRegistry::with_default_handlers()
        } else {
            let mut registry = HandlerRegistry::new();
            for handler in self.handlers {
                registry.register_boxed(handler);
            }
            registry
        };

        OperationInvoker {
            connection: self.connection,
            registry,
            switcher: ServerAffinitySwitcher,
            log_sink: self.log_sink,
            dispatcher: self.dispatcher,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

use std::sync::Arc;

use ldaptools_core::{Connection, EventDispatcher, Operation, OperationError};

use crate::handler::{
    AuthenticationOperationHandler, BoundHandler, GenericOperationHandler, HandlerSession,
    OperationHandler, QueryOperationHandler,
};

// ---------------------------------------------------------------------------
// HandlerRegistry
// ---------------------------------------------------------------------------

/// Ordered collection of operation handlers with first-match dispatch.
///
/// Handlers are probed with `supports()` in registration order, so more
/// specific handlers must be registered before more general ones. The set is
/// fixed once the owning invoker is built.
pub struct HandlerRegistry {
    handlers: Vec<Box<dyn OperationHandler>>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Registry holding the generic, query and authentication handlers, in that order.
    #[must_use]
    pub fn with_default_handlers() -> Self {
        let mut registry = Self::new();
        registry.register(GenericOperationHandler);
        registry.register(QueryOperationHandler);
        registry.register(AuthenticationOperationHandler);
        registry
    }

    /// Append a handler. It is probed after every handler registered before it.
    pub fn register<H: OperationHandler + 'static>(&mut self, handler: H) {
        self.handlers.push(Box::new(handler));
    }

    /// Append an already boxed handler.
    pub fn register_boxed(&mut self, handler: Box<dyn OperationHandler>) {
        self.handlers.push(handler);
    }

    /// Find the first handler supporting `operation` and bind it to the session.
    ///
    /// # Errors
    ///
    /// Returns `OperationError::NoSupportedHandler` carrying the operation's
    /// name and type when no registered handler supports it.
    pub fn resolve(
        &self,
        operation: &Operation,
        connection: Arc<dyn Connection>,
        dispatcher: Option<Arc<dyn EventDispatcher>>,
    ) -> Result<BoundHandler<'_>, OperationError> {
        let handler = self
            .handlers
            .iter()
            .find(|h| h.supports(operation))
            .ok_or_else(|| OperationError::NoSupportedHandler {
                name: operation.name().to_string(),
                kind: operation.kind().to_string(),
            })?;

        Ok(BoundHandler::new(
            handler.as_ref(),
            HandlerSession::new(connection, dispatcher),
        ))
    }

    /// Names of the registered handlers, in probe order.
    #[must_use]
    pub fn handler_names(&self) -> Vec<&'static str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::with_default_handlers()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Operation handlers: the units that actually run an operation against a session.
//!
//! Handlers are stateless templates. The registry binds one to the live
//! session and event dispatcher for the duration of a single invocation
//! (see [`BoundHandler`]).
//!
//! - [`GenericOperationHandler`]: add, modify, delete, rename/move
//! - [`QueryOperationHandler`]: searches, with paging
//! - [`AuthenticationOperationHandler`]: credential checks

mod authentication;
mod generic;
mod query;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use ldaptools_core::{
    Connection, EventDispatcher, Operation, OperationError, OperationEvent, OperationResponse,
};

pub use authentication::AuthenticationOperationHandler;
pub use generic::GenericOperationHandler;
pub use query::QueryOperationHandler;

// ---------------------------------------------------------------------------
// HandlerSession
// ---------------------------------------------------------------------------

/// The live session and dispatcher a handler is bound to for one call.
#[derive(Clone)]
pub struct HandlerSession {
    pub connection: Arc<dyn Connection>,
    pub dispatcher: Option<Arc<dyn EventDispatcher>>,
}

impl HandlerSession {
    #[must_use]
    pub fn new(
        connection: Arc<dyn Connection>,
        dispatcher: Option<Arc<dyn EventDispatcher>>,
    ) -> Self {
        Self {
            connection,
            dispatcher,
        }
    }

    /// Notify the dispatcher, if one is attached.
    pub fn dispatch(&self, event: &OperationEvent<'_>) {
        if let Some(dispatcher) = &self.dispatcher {
            dispatcher.dispatch(event);
        }
    }
}

impl fmt::Debug for HandlerSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerSession")
            .field("server", &self.connection.server())
            .field("bound", &self.connection.is_bound())
            .field("dispatcher", &self.dispatcher.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// OperationHandler trait
// ---------------------------------------------------------------------------

/// Capability contract for a family of operations.
#[async_trait]
pub trait OperationHandler: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Whether this handler can run `operation`. Must be pure.
    fn supports(&self, operation: &Operation) -> bool;

    /// Fill unset fields of `operation` in place. Must be idempotent.
    fn set_operation_defaults(&self, _operation: &mut Operation, _session: &HandlerSession) {}

    /// Run `operation` on the bound session.
    ///
    /// # Errors
    ///
    /// Returns the protocol error from the connection, or an
    /// `OperationError::Execution` if the handler itself cannot proceed.
    async fn execute(
        &self,
        operation: &Operation,
        session: &HandlerSession,
    ) -> Result<OperationResponse, OperationError>;
}

// ---------------------------------------------------------------------------
// BoundHandler
// ---------------------------------------------------------------------------

/// A registered handler bound to the live session for one invocation.
pub struct BoundHandler<'a> {
    handler: &'a dyn OperationHandler,
    session: HandlerSession,
}

impl<'a> BoundHandler<'a> {
    pub(crate) fn new(handler: &'a dyn OperationHandler, session: HandlerSession) -> Self {
        Self { handler, session }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.handler.name()
    }

    #[must_use]
    pub fn session(&self) -> &HandlerSession {
        &self.session
    }

    pub fn set_operation_defaults(&self, operation: &mut Operation) {
        self.handler.set_operation_defaults(operation, &self.session);
    }

    /// # Errors
    ///
    /// Propagates whatever the handler returns.
    pub async fn execute(&self, operation: &Operation) -> Result<OperationResponse, OperationError> {
        self.handler.execute(operation, &self.session).await
    }
}

impl fmt::Debug for BoundHandler<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundHandler")
            .field("handler", &self.handler.name())
            .field("session", &self.session)
            .finish()
    }
}

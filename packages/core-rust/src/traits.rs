use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::config::DomainConfig;
use crate::error::ConnectionError;
use crate::operation::Operation;
use crate::types::{Credentials, Modification, SearchPage, SearchRequest};

/// A live session with a directory server.
///
/// Owns the transport and protocol encoding. The session's current server is
/// mutable state held behind `&self`; implementations use interior mutability
/// and are shared as `Arc<dyn Connection>`. A single session is not meant to
/// serve overlapping invocations.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Server the session is currently connected to, if any.
    fn server(&self) -> Option<String>;

    /// Whether credentials have been presented and accepted on this session.
    fn is_bound(&self) -> bool;

    /// Domain configuration this session was created with.
    fn config(&self) -> &DomainConfig;

    /// Close the session. Closing an already-closed session is a no-op.
    async fn close(&self) -> Result<(), ConnectionError>;

    /// Open the session against `server` (or the first configured server when
    /// `None`). With `credentials` the session binds immediately; without, it
    /// binds lazily with the configured defaults on the next protocol call.
    async fn connect(
        &self,
        credentials: Option<Credentials>,
        server: Option<&str>,
    ) -> Result<(), ConnectionError>;

    /// Bind the open session with the given credentials.
    async fn bind(&self, credentials: &Credentials) -> Result<(), ConnectionError>;

    async fn add(
        &self,
        dn: &str,
        attributes: &BTreeMap<String, Vec<String>>,
    ) -> Result<(), ConnectionError>;

    async fn modify(&self, dn: &str, modifications: &[Modification])
        -> Result<(), ConnectionError>;

    async fn delete(&self, dn: &str) -> Result<(), ConnectionError>;

    async fn rename(
        &self,
        dn: &str,
        new_rdn: &str,
        new_parent: Option<&str>,
        delete_old_rdn: bool,
    ) -> Result<(), ConnectionError>;

    /// Run one search request, returning a single page of results.
    async fn search(&self, request: &SearchRequest) -> Result<SearchPage, ConnectionError>;
}

/// Extension-point notifications fired by handlers around execution.
#[derive(Debug, Clone, Copy)]
pub enum OperationEvent<'a> {
    BeforeExecute(&'a Operation),
    AfterExecute(&'a Operation),
}

impl OperationEvent<'_> {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::BeforeExecute(_) => "ldap.operation.execute.before",
            Self::AfterExecute(_) => "ldap.operation.execute.after",
        }
    }

    #[must_use]
    pub fn operation(&self) -> &Operation {
        match self {
            Self::BeforeExecute(op) | Self::AfterExecute(op) => op,
        }
    }
}

/// Observer for [`OperationEvent`]s.
pub trait EventDispatcher: Send + Sync {
    fn dispatch(&self, event: &OperationEvent<'_>);
}

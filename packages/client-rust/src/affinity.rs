//! Server affinity: moving a session to the server an operation requires,
//! and back again afterwards.

use ldaptools_core::{Connection, ConnectionError, Operation};

// ---------------------------------------------------------------------------
// ConnectionState
// ---------------------------------------------------------------------------

/// Which server a session was on at the start of an invocation.
///
/// Captured once per invocation and never carried into the next one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionState {
    last_server: Option<String>,
}

impl ConnectionState {
    #[must_use]
    pub fn capture(connection: &dyn Connection) -> Self {
        Self {
            last_server: connection.server(),
        }
    }

    #[must_use]
    pub fn last_server(&self) -> Option<&str> {
        self.last_server.as_deref()
    }
}

// ---------------------------------------------------------------------------
// ServerAffinitySwitcher
// ---------------------------------------------------------------------------

/// Decides whether a session must reconnect to satisfy a server preference,
/// and performs the reconnect.
#[derive(Debug, Clone, Copy, Default)]
pub struct ServerAffinitySwitcher;

impl ServerAffinitySwitcher {
    /// Whether moving from `current` to `wanted` requires a reconnect.
    ///
    /// Authentication operations pick their own server and are never moved.
    /// A `wanted` of `None` means no preference. Server names compare
    /// ignoring ASCII case.
    #[must_use]
    pub fn needs_switch(current: Option<&str>, wanted: Option<&str>, operation: &Operation) -> bool {
        if operation.is_authentication() {
            return false;
        }
        match (current, wanted) {
            (_, None) => false,
            (Some(current), Some(wanted)) => !current.eq_ignore_ascii_case(wanted),
            (None, Some(_)) => true,
        }
    }

    /// Reconnect `connection` to `wanted` when [`Self::needs_switch`] says so.
    ///
    /// A bound session is closed first since it cannot be moved while bound.
    /// The new session is opened without credentials; binding happens lazily.
    /// Returns whether a switch took place.
    ///
    /// # Errors
    ///
    /// Propagates the connection error from `close` or `connect`. No retry is
    /// attempted.
    pub async fn switch_if_needed(
        &self,
        connection: &dyn Connection,
        current: Option<&str>,
        wanted: Option<&str>,
        operation: &Operation,
    ) -> Result<bool, ConnectionError> {
        if !Self::needs_switch(current, wanted, operation) {
            return Ok(false);
        }

        if connection.is_bound() {
            connection.close().await?;
        }
        connection.connect(None, wanted).await?;

        tracing::debug!(
            from = current.unwrap_or(""),
            to = wanted.unwrap_or(""),
            operation = operation.name(),
            "switched server"
        );
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

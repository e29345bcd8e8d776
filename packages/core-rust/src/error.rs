//! Error taxonomy shared by the connection layer and the operation invoker.

/// Errors raised by a [`Connection`](crate::Connection).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectionError {
    #[error("unable to connect to server {server}: {reason}")]
    Unreachable { server: String, reason: String },
    #[error("the session is not connected to any server")]
    NotConnected,
    #[error("invalid credentials for {username}")]
    InvalidCredentials { username: String },
    #[error("protocol error {code}: {message}")]
    Protocol { code: u32, message: String },
}

impl ConnectionError {
    /// Result code for invalid credentials, as reported by directory servers.
    pub const INVALID_CREDENTIALS_CODE: u32 = 49;

    /// Numeric result code, when the error carries one.
    #[must_use]
    pub fn code(&self) -> Option<u32> {
        match self {
            Self::Protocol { code, .. } => Some(*code),
            Self::InvalidCredentials { .. } => Some(Self::INVALID_CREDENTIALS_CODE),
            Self::Unreachable { .. } | Self::NotConnected => None,
        }
    }
}

/// Errors returned by the operation invoker and its handlers.
///
/// The invoker never wraps these: whatever a handler or the connection
/// produced is what the caller receives.
#[derive(Debug, thiserror::Error)]
pub enum OperationError {
    #[error("operation \"{name}\" with type \"{kind}\" does not have a supported operation handler")]
    NoSupportedHandler { name: String, kind: String },
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    #[error("{operation} operation failed: {message}")]
    Execution { operation: String, message: String },
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_supported_handler_message_names_operation_and_type() {
        let err = OperationError::NoSupportedHandler {
            name: "Query".to_string(),
            kind: "QueryOperation".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "operation \"Query\" with type \"QueryOperation\" does not have a supported operation handler"
        );
    }

    #[test]
    fn connection_errors_convert_transparently() {
        let err: OperationError = ConnectionError::Protocol {
            code: 32,
            message: "No such object".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "protocol error 32: No such object");
        assert!(matches!(
            err,
            OperationError::Connection(ConnectionError::Protocol { code: 32, .. })
        ));
    }

    #[test]
    fn invalid_credentials_carry_code_49() {
        let err = ConnectionError::InvalidCredentials {
            username: "jdoe".to_string(),
        };
        assert_eq!(err.code(), Some(49));
        assert_eq!(ConnectionError::NotConnected.code(), None);
    }
}

use async_trait::async_trait;
use ldaptools_core::{
    AuthenticationResponse, Connection, ConnectionError, Credentials, Operation, OperationError,
    OperationEvent, OperationResponse,
};

use super::{HandlerSession, OperationHandler};

/// Checks credentials by binding with them.
///
/// The bind happens on the operation's server when one is given, otherwise
/// on the session's current server. Afterwards the session is returned to
/// the server and bound state it had before. Invalid credentials are an
/// answer, not an error.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthenticationOperationHandler;

/// Put the session back where it was before the credential check.
async fn restore_session(
    connection: &dyn Connection,
    previous_server: Option<&str>,
    was_bound: bool,
) -> Result<(), ConnectionError> {
    connection.close().await?;
    let Some(server) = previous_server else {
        return Ok(());
    };
    let credentials = if was_bound {
        connection.config().credentials()
    } else {
        None
    };
    connection.connect(credentials, Some(server)).await
}

#[async_trait]
impl OperationHandler for AuthenticationOperationHandler {
    fn name(&self) -> &'static str {
        "authentication"
    }

    fn supports(&self, operation: &Operation) -> bool {
        operation.is_authentication()
    }

    async fn execute(
        &self,
        operation: &Operation,
        session: &HandlerSession,
    ) -> Result<OperationResponse, OperationError> {
        let Operation::Authentication(auth) = operation else {
            return Err(OperationError::Execution {
                operation: operation.name().to_string(),
                message: "not an authentication operation".to_string(),
            });
        };

        session.dispatch(&OperationEvent::BeforeExecute(operation));

        let connection = session.connection.as_ref();
        let previous_server = connection.server();
        let was_bound = connection.is_bound();
        let target = auth
            .server
            .clone()
            .or_else(|| previous_server.clone());

        connection.close().await?;
        let credentials = Credentials::new(auth.username.clone(), auth.password.clone());
        let response = match connection.connect(Some(credentials), target.as_deref()).await {
            Ok(()) => AuthenticationResponse {
                authenticated: true,
                error_code: None,
                error_message: None,
            },
            Err(err @ ConnectionError::InvalidCredentials { .. }) => AuthenticationResponse {
                authenticated: false,
                error_code: err.code(),
                error_message: Some(err.to_string()),
            },
            Err(err) => {
                if let Err(restore_err) =
                    restore_session(connection, previous_server.as_deref(), was_bound).await
                {
                    tracing::warn!(
                        error = %restore_err,
                        "failed to restore session after authentication error"
                    );
                }
                return Err(err.into());
            }
        };

        restore_session(connection, previous_server.as_deref(), was_bound).await?;

        tracing::debug!(
            username = %auth.username,
            server = target.as_deref().unwrap_or(""),
            authenticated = response.authenticated,
            "credential check complete"
        );

        session.dispatch(&OperationEvent::AfterExecute(operation));
        Ok(OperationResponse::Authenticated(response))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use ldaptools_core::{AuthenticationOperation, DomainConfig};

    use super::*;
    use crate::memory::{InMemoryConnection, SessionEvent};

    fn connection() -> Arc<InMemoryConnection> {
        let config = DomainConfig {
            domain_name: "example.local".to_string(),
            base_dn: "dc=example,dc=local".to_string(),
            servers: vec!["dc1".to_string(), "dc2".to_string()],
            username: Some("svc".to_string()),
            password: Some("svc-pass".to_string()),
            ..DomainConfig::default()
        };
        let conn = Arc::new(InMemoryConnection::new(config));
        conn.add_account("svc", "svc-pass");
        conn.add_account("jdoe", "correct");
        conn
    }

    fn auth(password: &str, server: Option<&str>) -> Operation {
        Operation::Authentication(AuthenticationOperation {
            username: "jdoe".to_string(),
            password: password.to_string(),
            server: server.map(str::to_string),
        })
    }

    #[tokio::test]
    async fn valid_credentials_authenticate() {
        let conn = connection();
        conn.connect(conn.config().credentials(), Some("dc1")).await.unwrap();
        let session = HandlerSession::new(conn.clone(), None);

        let resp = AuthenticationOperationHandler
            .execute(&auth("correct", None), &session)
            .await
            .unwrap();

        assert!(matches!(
            resp,
            OperationResponse::Authenticated(AuthenticationResponse { authenticated: true, .. })
        ));
        assert_eq!(conn.server().as_deref(), Some("dc1"));
        assert!(conn.is_bound());
    }

    #[tokio::test]
    async fn invalid_credentials_are_an_answer_not_an_error() {
        let conn = connection();
        conn.connect(None, Some("dc1")).await.unwrap();
        let session = HandlerSession::new(conn.clone(), None);

        let resp = AuthenticationOperationHandler
            .execute(&auth("wrong", None), &session)
            .await
            .unwrap();

        let OperationResponse::Authenticated(resp) = resp else {
            panic!("expected authentication response");
        };
        assert!(!resp.authenticated);
        assert_eq!(resp.error_code, Some(49));
        assert!(!conn.is_bound());
    }

    #[tokio::test]
    async fn binds_against_requested_server_then_returns() {
        let conn = connection();
        conn.connect(conn.config().credentials(), Some("dc1")).await.unwrap();
        let session = HandlerSession::new(conn.clone(), None);

        AuthenticationOperationHandler
            .execute(&auth("correct", Some("dc2")), &session)
            .await
            .unwrap();

        let connects: Vec<_> = conn
            .journal()
            .into_iter()
            .filter_map(|e| match e {
                SessionEvent::Connect { server, bound_as } => Some((server, bound_as)),
                _ => None,
            })
            .collect();
        assert_eq!(
            connects,
            vec![
                ("dc1".to_string(), Some("svc".to_string())),
                ("dc2".to_string(), Some("jdoe".to_string())),
                ("dc1".to_string(), Some("svc".to_string())),
            ]
        );
        assert_eq!(conn.server().as_deref(), Some("dc1"));
    }

    #[tokio::test]
    async fn unreachable_server_propagates_and_restores() {
        let conn = connection();
        conn.connect(None, Some("dc1")).await.unwrap();
        let session = HandlerSession::new(conn.clone(), None);

        let err = AuthenticationOperationHandler
            .execute(&auth("correct", Some("dc9")), &session)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            OperationError::Connection(ConnectionError::Unreachable { .. })
        ));
        assert_eq!(conn.server().as_deref(), Some("dc1"));
    }
}

use async_trait::async_trait;
use ldaptools_core::{Operation, OperationError, OperationEvent, OperationResponse};

use super::{HandlerSession, OperationHandler};

/// Runs entry-level modifications: add, modify, delete, rename and move.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericOperationHandler;

#[async_trait]
impl OperationHandler for GenericOperationHandler {
    fn name(&self) -> &'static str {
        "generic"
    }

    fn supports(&self, operation: &Operation) -> bool {
        matches!(
            operation,
            Operation::Add(_) | Operation::Modify(_) | Operation::Delete(_) | Operation::Rename(_)
        )
    }

    async fn execute(
        &self,
        operation: &Operation,
        session: &HandlerSession,
    ) -> Result<OperationResponse, OperationError> {
        session.dispatch(&OperationEvent::BeforeExecute(operation));

        let connection = &session.connection;
        match operation {
            Operation::Add(op) => connection.add(&op.dn, &op.attributes).await?,
            Operation::Modify(op) => {
                if op.modifications.is_empty() {
                    return Err(OperationError::Execution {
                        operation: operation.name().to_string(),
                        message: format!("no modifications given for {}", op.dn),
                    });
                }
                connection.modify(&op.dn, &op.modifications).await?;
            }
            Operation::Delete(op) => connection.delete(&op.dn).await?,
            Operation::Rename(op) => {
                connection
                    .rename(&op.dn, &op.new_rdn, op.new_parent.as_deref(), op.delete_old_rdn)
                    .await?;
            }
            other => {
                return Err(OperationError::Execution {
                    operation: other.name().to_string(),
                    message: "not an entry modification".to_string(),
                });
            }
        }

        session.dispatch(&OperationEvent::AfterExecute(operation));
        Ok(OperationResponse::Done)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use ldaptools_core::{
        AddOperation, Connection, DeleteOperation, DomainConfig, EventDispatcher,
        ModifyOperation, QueryOperation,
    };
    use parking_lot::Mutex;

    use super::*;
    use crate::memory::InMemoryConnection;

    #[derive(Default)]
    struct RecordingDispatcher {
        events: Mutex<Vec<String>>,
    }

    impl EventDispatcher for RecordingDispatcher {
        fn dispatch(&self, event: &OperationEvent<'_>) {
            self.events
                .lock()
                .push(format!("{}:{}", event.name(), event.operation().name()));
        }
    }

    fn session(dispatcher: Option<Arc<dyn EventDispatcher>>) -> (Arc<InMemoryConnection>, HandlerSession) {
        let config = DomainConfig {
            domain_name: "example.local".to_string(),
            base_dn: "dc=example,dc=local".to_string(),
            servers: vec!["dc1".to_string()],
            ..DomainConfig::default()
        };
        let conn = Arc::new(InMemoryConnection::new(config));
        let session = HandlerSession::new(conn.clone(), dispatcher);
        (conn, session)
    }

    fn add_op(dn: &str) -> Operation {
        let mut attributes = BTreeMap::new();
        attributes.insert("cn".to_string(), vec!["foo".to_string()]);
        Operation::Add(AddOperation {
            dn: dn.to_string(),
            attributes,
            server: None,
        })
    }

    #[test]
    fn supports_entry_modifications_only() {
        let handler = GenericOperationHandler;
        assert!(handler.supports(&add_op("cn=foo")));
        assert!(handler.supports(&Operation::Delete(DeleteOperation {
            dn: "cn=foo".to_string(),
            server: None
        })));
        assert!(!handler.supports(&Operation::Query(QueryOperation::new("(cn=*)"))));
    }

    #[tokio::test]
    async fn add_then_delete_round_trip() {
        let (conn, session) = session(None);
        conn.connect(None, None).await.unwrap();
        let handler = GenericOperationHandler;

        let resp = handler
            .execute(&add_op("cn=foo,dc=example,dc=local"), &session)
            .await
            .unwrap();
        assert_eq!(resp, OperationResponse::Done);
        assert!(conn.entry("cn=foo,dc=example,dc=local").is_some());

        let delete = Operation::Delete(DeleteOperation {
            dn: "CN=Foo,DC=example,DC=local".to_string(),
            server: None,
        });
        handler.execute(&delete, &session).await.unwrap();
        assert!(conn.entry("cn=foo,dc=example,dc=local").is_none());
    }

    #[tokio::test]
    async fn events_fire_around_successful_execution() {
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let (conn, session) = session(Some(dispatcher.clone()));
        conn.connect(None, None).await.unwrap();

        GenericOperationHandler
            .execute(&add_op("cn=foo,dc=example,dc=local"), &session)
            .await
            .unwrap();

        assert_eq!(
            *dispatcher.events.lock(),
            vec![
                "ldap.operation.execute.before:Add".to_string(),
                "ldap.operation.execute.after:Add".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn protocol_errors_propagate_without_after_event() {
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let (conn, session) = session(Some(dispatcher.clone()));
        conn.connect(None, None).await.unwrap();

        let delete = Operation::Delete(DeleteOperation {
            dn: "cn=missing,dc=example,dc=local".to_string(),
            server: None,
        });
        let err = GenericOperationHandler
            .execute(&delete, &session)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            OperationError::Connection(ldaptools_core::ConnectionError::Protocol { code: 32, .. })
        ));
        assert_eq!(dispatcher.events.lock().len(), 1);
    }

    #[tokio::test]
    async fn empty_modify_is_rejected() {
        let (conn, session) = session(None);
        conn.connect(None, None).await.unwrap();

        let modify = Operation::Modify(ModifyOperation {
            dn: "cn=foo,dc=example,dc=local".to_string(),
            modifications: Vec::new(),
            server: None,
        });
        let err = GenericOperationHandler
            .execute(&modify, &session)
            .await
            .unwrap_err();
        assert!(matches!(err, OperationError::Execution { .. }));
    }
}

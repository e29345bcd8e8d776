use async_trait::async_trait;
use ldaptools_core::{
    Operation, OperationError, OperationEvent, OperationResponse, QueryOperation, SearchRequest,
};

use super::{HandlerSession, OperationHandler};

/// Runs searches, following paging cookies until the result set is exhausted.
///
/// Results are collected eagerly: the invoker restores server affinity as
/// soon as `execute` returns, so pages cannot be fetched after that point.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryOperationHandler;

impl QueryOperationHandler {
    fn request_for(query: &QueryOperation) -> SearchRequest {
        let paging = query.use_paging.unwrap_or(false);
        SearchRequest {
            base_dn: query.base_dn.clone().unwrap_or_default(),
            filter: query.filter.clone(),
            scope: query.scope,
            attributes: query.attributes.clone(),
            size_limit: query.size_limit,
            page_size: if paging { query.page_size } else { None },
            cookie: None,
        }
    }
}

#[async_trait]
impl OperationHandler for QueryOperationHandler {
    fn name(&self) -> &'static str {
        "query"
    }

    fn supports(&self, operation: &Operation) -> bool {
        matches!(operation, Operation::Query(_))
    }

    fn set_operation_defaults(&self, operation: &mut Operation, session: &HandlerSession) {
        let Operation::Query(query) = operation else {
            return;
        };
        let config = session.connection.config();

        if query.base_dn.is_none() {
            query.base_dn = Some(config.base_dn.clone());
        }
        if query.page_size.is_none() {
            query.page_size = Some(config.page_size);
        }
        if query.use_paging.is_none() {
            query.use_paging = Some(config.use_paging);
        }
    }

    async fn execute(
        &self,
        operation: &Operation,
        session: &HandlerSession,
    ) -> Result<OperationResponse, OperationError> {
        let Operation::Query(query) = operation else {
            return Err(OperationError::Execution {
                operation: operation.name().to_string(),
                message: "not a query".to_string(),
            });
        };

        session.dispatch(&OperationEvent::BeforeExecute(operation));

        let mut request = Self::request_for(query);
        let mut entries = Vec::new();
        let mut pages = 0usize;
        loop {
            let page = session.connection.search(&request).await?;
            pages += 1;
            entries.extend(page.entries);

            if let Some(limit) = query.size_limit.filter(|limit| *limit > 0) {
                if entries.len() >= limit {
                    entries.truncate(limit);
                    break;
                }
            }
            match page.cookie {
                Some(cookie) if request.page_size.is_some() => {
                    if request.cookie.as_ref() == Some(&cookie) {
                        return Err(anyhow::anyhow!(
                            "server returned the same paging cookie twice for {}",
                            query.filter
                        )
                        .into());
                    }
                    request.cookie = Some(cookie);
                }
                _ => break,
            }
        }

        tracing::debug!(
            filter = %query.filter,
            pages = pages,
            entries = entries.len(),
            "query complete"
        );

        session.dispatch(&OperationEvent::AfterExecute(operation));
        Ok(OperationResponse::Entries(entries))
    }
}

//! Typed directory operations submitted to the invoker.
//!
//! Every variant carries an optional server preference. `None` means the
//! operation runs against whatever server the session is currently on.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{Modification, SearchScope};

/// Placeholder used in audit output in place of secrets.
pub const MASKED_VALUE: &str = "******";

/// Create a new entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddOperation {
    pub dn: String,
    pub attributes: BTreeMap<String, Vec<String>>,
    pub server: Option<String>,
}

/// Apply a batch of attribute modifications to an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifyOperation {
    pub dn: String,
    pub modifications: Vec<Modification>,
    pub server: Option<String>,
}

/// Remove an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteOperation {
    pub dn: String,
    pub server: Option<String>,
}

/// Rename an entry, optionally moving it under a new parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameOperation {
    pub dn: String,
    pub new_rdn: String,
    pub new_parent: Option<String>,
    pub delete_old_rdn: bool,
    pub server: Option<String>,
}

/// Search the directory.
///
/// Unset fields (`base_dn`, `page_size`, `use_paging`) are filled from the
/// domain configuration by the query handler before execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryOperation {
    pub filter: String,
    pub base_dn: Option<String>,
    pub scope: SearchScope,
    pub attributes: Vec<String>,
    pub size_limit: Option<usize>,
    pub page_size: Option<usize>,
    pub use_paging: Option<bool>,
    pub server: Option<String>,
}

impl QueryOperation {
    /// Create a subtree query with the given filter and no other settings.
    #[must_use]
    pub fn new(filter: impl Into<String>) -> Self {
        Self {
            filter: filter.into(),
            base_dn: None,
            scope: SearchScope::Subtree,
            attributes: Vec::new(),
            size_limit: None,
            page_size: None,
            use_paging: None,
            server: None,
        }
    }
}

/// Check a set of credentials by binding with them.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticationOperation {
    pub username: String,
    pub password: String,
    pub server: Option<String>,
}

impl std::fmt::Debug for AuthenticationOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticationOperation")
            .field("username", &self.username)
            .field("password", &MASKED_VALUE)
            .field("server", &self.server)
            .finish()
    }
}

/// A directory operation.
///
/// Handlers are selected by probing the runtime variant, so adding a variant
/// requires a handler that reports support for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Operation {
    Add(AddOperation),
    Modify(ModifyOperation),
    Delete(DeleteOperation),
    Rename(RenameOperation),
    Query(QueryOperation),
    Authentication(AuthenticationOperation),
}

impl Operation {
    /// Human-readable operation name used in logs and error messages.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Add(_) => "Add",
            Self::Modify(_) => "Modify",
            Self::Delete(_) => "Delete",
            Self::Rename(op) if op.new_parent.is_some() => "Move",
            Self::Rename(_) => "Rename",
            Self::Query(_) => "Query",
            Self::Authentication(_) => "Authentication",
        }
    }

    /// Name of the concrete operation type, for diagnostics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Add(_) => "AddOperation",
            Self::Modify(_) => "ModifyOperation",
            Self::Delete(_) => "DeleteOperation",
            Self::Rename(_) => "RenameOperation",
            Self::Query(_) => "QueryOperation",
            Self::Authentication(_) => "AuthenticationOperation",
        }
    }

    /// The server this operation must run against, if any.
    #[must_use]
    pub fn server(&self) -> Option<&str> {
        match self {
            Self::Add(op) => op.server.as_deref(),
            Self::Modify(op) => op.server.as_deref(),
            Self::Delete(op) => op.server.as_deref(),
            Self::Rename(op) => op.server.as_deref(),
            Self::Query(op) => op.server.as_deref(),
            Self::Authentication(op) => op.server.as_deref(),
        }
    }

    /// Set or clear the server preference.
    pub fn set_server(&mut self, server: Option<String>) {
        let slot = match self {
            Self::Add(op) => &mut op.server,
            Self::Modify(op) => &mut op.server,
            Self::Delete(op) => &mut op.server,
            Self::Rename(op) => &mut op.server,
            Self::Query(op) => &mut op.server,
            Self::Authentication(op) => &mut op.server,
        };
        *slot = server;
    }

    /// Builder-style variant of [`Operation::set_server`].
    #[must_use]
    pub fn with_server(mut self, server: impl Into<String>) -> Self {
        self.set_server(Some(server.into()));
        self
    }

    /// Whether this operation establishes its own session target.
    #[must_use]
    pub fn is_authentication(&self) -> bool {
        matches!(self, Self::Authentication(_))
    }

    /// Flattened view of the operation for audit logs. Secrets are masked.
    #[must_use]
    pub fn log_arguments(&self) -> BTreeMap<String, String> {
        let mut args = BTreeMap::new();
        let mut put = |key: &str, value: String| {
            args.insert(key.to_string(), value);
        };

        match self {
            Self::Add(op) => {
                put("DN", op.dn.clone());
                for (name, values) in &op.attributes {
                    put(&format!("Attribute:{name}"), values.join(", "));
                }
            }
            Self::Modify(op) => {
                put("DN", op.dn.clone());
                for (i, m) in op.modifications.iter().enumerate() {
                    put(
                        &format!("Modification:{i}"),
                        format!("{:?} {} [{}]", m.kind, m.attribute, m.values.join(", ")),
                    );
                }
            }
            Self::Delete(op) => put("DN", op.dn.clone()),
            Self::Rename(op) => {
                put("DN", op.dn.clone());
                put("New RDN", op.new_rdn.clone());
                if let Some(parent) = &op.new_parent {
                    put("New Parent", parent.clone());
                }
                put("Delete Old RDN", op.delete_old_rdn.to_string());
            }
            Self::Query(op) => {
                put("Filter", op.filter.clone());
                put("Base DN", op.base_dn.clone().unwrap_or_default());
                put("Scope", format!("{:?}", op.scope));
                put("Attributes", op.attributes.join(", "));
                if let Some(limit) = op.size_limit {
                    put("Size Limit", limit.to_string());
                }
                if let Some(paging) = op.use_paging {
                    put("Use Paging", paging.to_string());
                }
                if let Some(size) = op.page_size {
                    put("Page Size", size.to_string());
                }
            }
            Self::Authentication(op) => {
                put("Username", op.username.clone());
                put("Password", MASKED_VALUE.to_string());
            }
        }

        if let Some(server) = self.server() {
            put("Server", server.to_string());
        }
        args
    }
}

impl From<AddOperation> for Operation {
    fn from(op: AddOperation) -> Self {
        Self::Add(op)
    }
}

impl From<ModifyOperation> for Operation {
    fn from(op: ModifyOperation) -> Self {
        Self::Modify(op)
    }
}

impl From<DeleteOperation> for Operation {
    fn from(op: DeleteOperation) -> Self {
        Self::Delete(op)
    }
}

impl From<RenameOperation> for Operation {
    fn from(op: RenameOperation) -> Self {
        Self::Rename(op)
    }
}

impl From<QueryOperation> for Operation {
    fn from(op: QueryOperation) -> Self {
        Self::Query(op)
    }
}

impl From<AuthenticationOperation> for Operation {
    fn from(op: AuthenticationOperation) -> Self {
        Self::Authentication(op)
    }
}

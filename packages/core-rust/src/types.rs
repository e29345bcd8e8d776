use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::operation::MASKED_VALUE;

/// A directory entry as returned by a search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Distinguished name of the entry.
    pub dn: String,
    /// Attribute values keyed by attribute name as stored.
    pub attributes: BTreeMap<String, Vec<String>>,
}

impl Entry {
    #[must_use]
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Builder-style attribute setter.
    #[must_use]
    pub fn with_attribute<I, V>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.attributes
            .insert(name.into(), values.into_iter().map(Into::into).collect());
        self
    }

    /// Look up an attribute ignoring case, as directory servers do.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.attributes
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, values)| values.as_slice())
    }
}

/// How a modification changes an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModificationKind {
    /// Append values.
    Add,
    /// Replace all values. An empty value list clears the attribute.
    Replace,
    /// Remove the listed values, or the whole attribute when none are listed.
    Remove,
}

/// A single attribute change within a modify operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modification {
    pub kind: ModificationKind,
    pub attribute: String,
    pub values: Vec<String>,
}

/// Search depth relative to the base DN.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchScope {
    /// Only the base entry itself.
    Base,
    /// Direct children of the base entry.
    OneLevel,
    /// The base entry and everything beneath it.
    #[default]
    Subtree,
}

/// A single search request sent over a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub base_dn: String,
    pub filter: String,
    pub scope: SearchScope,
    pub attributes: Vec<String>,
    pub size_limit: Option<usize>,
    /// Page size for a paged search. `None` requests all results at once.
    pub page_size: Option<usize>,
    /// Opaque paging cookie returned by the previous page.
    pub cookie: Option<Vec<u8>>,
}

/// One page of search results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPage {
    pub entries: Vec<Entry>,
    /// Present when more pages remain.
    pub cookie: Option<Vec<u8>>,
}

/// Bind credentials. The password never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &MASKED_VALUE)
            .finish()
    }
}

/// Outcome of an authentication operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticationResponse {
    pub authenticated: bool,
    pub error_code: Option<u32>,
    pub error_message: Option<String>,
}

/// Successful result of executing an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationResponse {
    /// The modification was applied.
    Done,
    /// Entries produced by a query.
    Entries(Vec<Entry>),
    /// Result of a credential check.
    Authenticated(AuthenticationResponse),
}

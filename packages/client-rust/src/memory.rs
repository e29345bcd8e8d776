//! In-memory [`Connection`] over a directory tree shared by several named servers.
//!
//! Behaves like a small replicated domain: every server sees the same
//! entries, while the session tracks which server it is on and whether it is
//! bound. Every session-level action is appended to a journal so callers can
//! assert on exactly what happened and in which order.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use ldaptools_core::{
    Connection, ConnectionError, Credentials, DomainConfig, Entry, Modification,
    ModificationKind, SearchPage, SearchRequest, SearchScope,
};
use parking_lot::Mutex;

const NO_SUCH_OBJECT: u32 = 32;
const ALREADY_EXISTS: u32 = 68;
const FILTER_ERROR: u32 = 87;

/// A session-level action recorded by [`InMemoryConnection`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Connect { server: String, bound_as: Option<String> },
    Close { server: String },
    Bind { server: String, username: String },
    Add { server: String, dn: String },
    Modify { server: String, dn: String },
    Delete { server: String, dn: String },
    Rename { server: String, dn: String, new_dn: String },
    Search { server: String, base_dn: String, filter: String },
}

#[derive(Debug, Default)]
struct SessionState {
    server: Option<String>,
    bound_as: Option<String>,
}

/// In-memory directory session.
pub struct InMemoryConnection {
    config: DomainConfig,
    session: Mutex<SessionState>,
    /// Entries keyed by lowercased DN.
    entries: Mutex<BTreeMap<String, Entry>>,
    /// Passwords keyed by lowercased username.
    accounts: Mutex<HashMap<String, String>>,
    /// Lowercased names of servers that refuse connections.
    unreachable: Mutex<HashSet<String>>,
    pending_failure: Mutex<Option<ConnectionError>>,
    journal: Mutex<Vec<SessionEvent>>,
}

impl InMemoryConnection {
    /// Creates a disconnected session over an empty tree.
    #[must_use]
    pub fn new(config: DomainConfig) -> Self {
        Self {
            config,
            session: Mutex::new(SessionState::default()),
            entries: Mutex::new(BTreeMap::new()),
            accounts: Mutex::new(HashMap::new()),
            unreachable: Mutex::new(HashSet::new()),
            pending_failure: Mutex::new(None),
            journal: Mutex::new(Vec::new()),
        }
    }

    /// Seed an entry directly, bypassing the session.
    pub fn insert(&self, entry: Entry) {
        self.entries.lock().insert(normalize_dn(&entry.dn), entry);
    }

    /// Look up an entry by DN, ignoring case.
    #[must_use]
    pub fn entry(&self, dn: &str) -> Option<Entry> {
        self.entries.lock().get(&normalize_dn(dn)).cloned()
    }

    /// Register an account that may bind.
    pub fn add_account(&self, username: &str, password: &str) {
        self.accounts
            .lock()
            .insert(username.to_ascii_lowercase(), password.to_string());
    }

    /// Make `server` refuse (or accept again) new connections.
    pub fn set_unreachable(&self, server: &str, unreachable: bool) {
        let key = server.to_ascii_lowercase();
        let mut set = self.unreachable.lock();
        if unreachable {
            set.insert(key);
        } else {
            set.remove(&key);
        }
    }

    /// Fail the next protocol call (bind, add, modify, delete, rename or search).
    pub fn fail_next(&self, error: ConnectionError) {
        *self.pending_failure.lock() = Some(error);
    }

    /// Snapshot of the recorded session events.
    #[must_use]
    pub fn journal(&self) -> Vec<SessionEvent> {
        self.journal.lock().clone()
    }

    pub fn clear_journal(&self) {
        self.journal.lock().clear();
    }

    /// Number of search requests served so far.
    #[must_use]
    pub fn search_count(&self) -> usize {
        self.journal
            .lock()
            .iter()
            .filter(|e| matches!(e, SessionEvent::Search { .. }))
            .count()
    }

    fn record(&self, event: SessionEvent) {
        self.journal.lock().push(event);
    }

    /// Configured spelling of `server`, or an error if it cannot be reached.
    fn resolve_server(&self, server: Option<&str>) -> Result<String, ConnectionError> {
        let wanted = match server {
            Some(s) => s,
            None => self
                .config
                .servers
                .first()
                .map(String::as_str)
                .ok_or_else(|| ConnectionError::Unreachable {
                    server: String::new(),
                    reason: "no servers configured".to_string(),
                })?,
        };

        let known = self
            .config
            .servers
            .iter()
            .find(|s| s.eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ConnectionError::Unreachable {
                server: wanted.to_string(),
                reason: "unknown server".to_string(),
            })?;

        if self.unreachable.lock().contains(&known.to_ascii_lowercase()) {
            return Err(ConnectionError::Unreachable {
                server: known.clone(),
                reason: "connection refused".to_string(),
            });
        }
        Ok(known.clone())
    }

    fn check_credentials(&self, credentials: &Credentials) -> Result<(), ConnectionError> {
        let accounts = self.accounts.lock();
        match accounts.get(&credentials.username.to_ascii_lowercase()) {
            Some(password) if *password == credentials.password => Ok(()),
            _ => Err(ConnectionError::InvalidCredentials {
                username: credentials.username.clone(),
            }),
        }
    }

    /// Common entry to every protocol call: consume an injected failure,
    /// require a connection, and bind lazily with the default credentials.
    fn begin_request(&self) -> Result<String, ConnectionError> {
        if let Some(err) = self.pending_failure.lock().take() {
            return Err(err);
        }

        let mut session = self.session.lock();
        let server = session.server.clone().ok_or(ConnectionError::NotConnected)?;
        if session.bound_as.is_none() {
            if let Some(credentials) = self.config.credentials() {
                self.check_credentials(&credentials)?;
                session.bound_as = Some(credentials.username.clone());
                drop(session);
                self.record(SessionEvent::Bind {
                    server: server.clone(),
                    username: credentials.username,
                });
            }
        }
        Ok(server)
    }
}

#[async_trait]
impl Connection for InMemoryConnection {
    fn server(&self) -> Option<String> {
        self.session.lock().server.clone()
    }

    fn is_bound(&self) -> bool {
        self.session.lock().bound_as.is_some()
    }

    fn config(&self) -> &DomainConfig {
        &self.config
    }

    async fn close(&self) -> Result<(), ConnectionError> {
        let previous = {
            let mut session = self.session.lock();
            session.bound_as = None;
            session.server.take()
        };
        if let Some(server) = previous {
            self.record(SessionEvent::Close { server });
        }
        Ok(())
    }

    async fn connect(
        &self,
        credentials: Option<Credentials>,
        server: Option<&str>,
    ) -> Result<(), ConnectionError> {
        let server = self.resolve_server(server)?;

        if let Some(credentials) = &credentials {
            if let Err(err) = self.check_credentials(credentials) {
                *self.session.lock() = SessionState::default();
                return Err(err);
            }
        }

        let bound_as = credentials.map(|c| c.username);
        *self.session.lock() = SessionState {
            server: Some(server.clone()),
            bound_as: bound_as.clone(),
        };
        self.record(SessionEvent::Connect { server, bound_as });
        Ok(())
    }

    async fn bind(&self, credentials: &Credentials) -> Result<(), ConnectionError> {
        if let Some(err) = self.pending_failure.lock().take() {
            return Err(err);
        }
        let server = self.server().ok_or(ConnectionError::NotConnected)?;
        self.check_credentials(credentials)?;
        self.session.lock().bound_as = Some(credentials.username.clone());
        self.record(SessionEvent::Bind {
            server,
            username: credentials.username.clone(),
        });
        Ok(())
    }

    async fn add(
        &self,
        dn: &str,
        attributes: &BTreeMap<String, Vec<String>>,
    ) -> Result<(), ConnectionError> {
        let server = self.begin_request()?;
        {
            let mut entries = self.entries.lock();
            let key = normalize_dn(dn);
            if entries.contains_key(&key) {
                return Err(already_exists(dn));
            }
            entries.insert(
                key,
                Entry {
                    dn: dn.to_string(),
                    attributes: attributes.clone(),
                },
            );
        }
        self.record(SessionEvent::Add {
            server,
            dn: dn.to_string(),
        });
        Ok(())
    }

    async fn modify(
        &self,
        dn: &str,
        modifications: &[Modification],
    ) -> Result<(), ConnectionError> {
        let server = self.begin_request()?;
        {
            let mut entries = self.entries.lock();
            let entry = entries
                .get_mut(&normalize_dn(dn))
                .ok_or_else(|| no_such_object(dn))?;
            for modification in modifications {
                apply_modification(entry, modification);
            }
        }
        self.record(SessionEvent::Modify {
            server,
            dn: dn.to_string(),
        });
        Ok(())
    }

    async fn delete(&self, dn: &str) -> Result<(), ConnectionError> {
        let server = self.begin_request()?;
        self.entries
            .lock()
            .remove(&normalize_dn(dn))
            .ok_or_else(|| no_such_object(dn))?;
        self.record(SessionEvent::Delete {
            server,
            dn: dn.to_string(),
        });
        Ok(())
    }

    async fn rename(
        &self,
        dn: &str,
        new_rdn: &str,
        new_parent: Option<&str>,
        delete_old_rdn: bool,
    ) -> Result<(), ConnectionError> {
        let server = self.begin_request()?;
        let (old_rdn, old_parent) = split_dn(dn);
        let parent = new_parent.unwrap_or(old_parent);
        let new_dn = if parent.is_empty() {
            new_rdn.to_string()
        } else {
            format!("{new_rdn},{parent}")
        };

        {
            let mut entries = self.entries.lock();
            let new_key = normalize_dn(&new_dn);
            if entries.contains_key(&new_key) {
                return Err(already_exists(&new_dn));
            }
            let mut entry = entries
                .remove(&normalize_dn(dn))
                .ok_or_else(|| no_such_object(dn))?;

            if delete_old_rdn {
                if let Some((attr, value)) = old_rdn.split_once('=') {
                    remove_values(&mut entry, attr, &[value.to_string()]);
                }
            }
            if let Some((attr, value)) = new_rdn.split_once('=') {
                let key = attribute_key(&entry, attr);
                let values = entry.attributes.entry(key).or_default();
                if !values.iter().any(|v| v.eq_ignore_ascii_case(value)) {
                    values.push(value.to_string());
                }
            }
            entry.dn.clone_from(&new_dn);
            entries.insert(new_key, entry);
        }

        self.record(SessionEvent::Rename {
            server,
            dn: dn.to_string(),
            new_dn,
        });
        Ok(())
    }

    async fn search(&self, request: &SearchRequest) -> Result<SearchPage, ConnectionError> {
        let server = self.begin_request()?;
        let filter = Filter::parse(&request.filter)?;
        self.record(SessionEvent::Search {
            server,
            base_dn: request.base_dn.clone(),
            filter: request.filter.clone(),
        });

        let base = normalize_dn(&request.base_dn);
        let mut matches: Vec<Entry> = self
            .entries
            .lock()
            .iter()
            .filter(|(key, _)| in_scope(key, &base, request.scope))
            .filter(|(_, entry)| filter.matches(entry))
            .map(|(_, entry)| project(entry, &request.attributes))
            .collect();

        if let Some(limit) = request.size_limit.filter(|limit| *limit > 0) {
            matches.truncate(limit);
        }

        let Some(page_size) = request.page_size.filter(|size| *size > 0) else {
            return Ok(SearchPage {
                entries: matches,
                cookie: None,
            });
        };

        let offset = request.cookie.as_deref().map_or(0, decode_cookie);
        let end = offset.saturating_add(page_size).min(matches.len());
        let entries = matches
            .get(offset..end)
            .map(<[Entry]>::to_vec)
            .unwrap_or_default();
        let cookie = (end < matches.len()).then(|| encode_cookie(end));
        Ok(SearchPage { entries, cookie })
    }
}

// ---------------------------------------------------------------------------
// DN and attribute helpers
// ---------------------------------------------------------------------------

fn normalize_dn(dn: &str) -> String {
    dn.split(',')
        .map(|rdn| rdn.trim().to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join(",")
}

/// Split a DN into its leading RDN and the parent DN.
fn split_dn(dn: &str) -> (&str, &str) {
    match dn.split_once(',') {
        Some((rdn, parent)) => (rdn.trim(), parent.trim()),
        None => (dn.trim(), ""),
    }
}

fn in_scope(key: &str, base: &str, scope: SearchScope) -> bool {
    match scope {
        SearchScope::Base => key == base,
        SearchScope::OneLevel => split_dn(key).1 == base && key != base,
        SearchScope::Subtree => {
            base.is_empty() || key == base || key.ends_with(&format!(",{base}"))
        }
    }
}

/// Stored spelling of `name` on the entry, or `name` itself if absent.
fn attribute_key(entry: &Entry, name: &str) -> String {
    entry
        .attributes
        .keys()
        .find(|k| k.eq_ignore_ascii_case(name))
        .cloned()
        .unwrap_or_else(|| name.to_string())
}

fn remove_values(entry: &mut Entry, name: &str, values: &[String]) {
    let key = attribute_key(entry, name);
    let Some(current) = entry.attributes.get_mut(&key) else {
        return;
    };
    if values.is_empty() {
        current.clear();
    } else {
        current.retain(|v| !values.iter().any(|r| r.eq_ignore_ascii_case(v)));
    }
    if current.is_empty() {
        entry.attributes.remove(&key);
    }
}

fn apply_modification(entry: &mut Entry, modification: &Modification) {
    match modification.kind {
        ModificationKind::Add => {
            let key = attribute_key(entry, &modification.attribute);
            entry
                .attributes
                .entry(key)
                .or_default()
                .extend(modification.values.iter().cloned());
        }
        ModificationKind::Replace => {
            let key = attribute_key(entry, &modification.attribute);
            if modification.values.is_empty() {
                entry.attributes.remove(&key);
            } else {
                entry.attributes.insert(key, modification.values.clone());
            }
        }
        ModificationKind::Remove => {
            remove_values(entry, &modification.attribute, &modification.values);
        }
    }
}

fn project(entry: &Entry, attributes: &[String]) -> Entry {
    if attributes.is_empty() || attributes.iter().any(|a| a == "*") {
        return entry.clone();
    }
    Entry {
        dn: entry.dn.clone(),
        attributes: entry
            .attributes
            .iter()
            .filter(|(k, _)| attributes.iter().any(|a| a.eq_ignore_ascii_case(k)))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
    }
}

fn no_such_object(dn: &str) -> ConnectionError {
    ConnectionError::Protocol {
        code: NO_SUCH_OBJECT,
        message: format!("No such object: {dn}"),
    }
}

fn already_exists(dn: &str) -> ConnectionError {
    ConnectionError::Protocol {
        code: ALREADY_EXISTS,
        message: format!("Already exists: {dn}"),
    }
}

/// Decodes a paging cookie into an offset. Malformed cookies restart at 0.
fn decode_cookie(cookie: &[u8]) -> usize {
    let mut buf = [0u8; 8];
    let len = cookie.len().min(8);
    buf[..len].copy_from_slice(&cookie[..len]);
    usize::try_from(u64::from_le_bytes(buf)).unwrap_or(usize::MAX)
}

fn encode_cookie(offset: usize) -> Vec<u8> {
    (offset as u64).to_le_bytes().to_vec()
}

// ---------------------------------------------------------------------------
// Filter
// ---------------------------------------------------------------------------

/// The small filter subset the in-memory directory understands.
#[derive(Debug, PartialEq, Eq)]
enum Filter {
    Present(String),
    Equals(String, String),
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Filter {
    fn parse(input: &str) -> Result<Self, ConnectionError> {
        let (filter, rest) = Self::parse_one(input.trim())?;
        if rest.trim().is_empty() {
            Ok(filter)
        } else {
            Err(filter_error(input))
        }
    }

    /// Parse one parenthesised filter, returning it and the unparsed remainder.
    fn parse_one(input: &str) -> Result<(Self, &str), ConnectionError> {
        let body = input.strip_prefix('(').ok_or_else(|| filter_error(input))?;

        if let Some(list) = body.strip_prefix('&') {
            let (children, rest) = Self::parse_list(list)?;
            return Ok((Self::And(children), rest));
        }
        if let Some(list) = body.strip_prefix('|') {
            let (children, rest) = Self::parse_list(list)?;
            return Ok((Self::Or(children), rest));
        }

        let close = body.find(')').ok_or_else(|| filter_error(input))?;
        let (attr, value) = body[..close]
            .split_once('=')
            .ok_or_else(|| filter_error(input))?;
        if attr.is_empty() || attr.contains(['(', '&', '|', '!', '<', '>', '~']) {
            return Err(filter_error(input));
        }
        let filter = if value == "*" {
            Self::Present(attr.to_string())
        } else {
            Self::Equals(attr.to_string(), value.to_string())
        };
        Ok((filter, &body[close + 1..]))
    }

    fn parse_list(mut input: &str) -> Result<(Vec<Self>, &str), ConnectionError> {
        let mut children = Vec::new();
        loop {
            input = input.trim_start();
            if let Some(rest) = input.strip_prefix(')') {
                return Ok((children, rest));
            }
            let (child, rest) = Self::parse_one(input)?;
            children.push(child);
            input = rest;
        }
    }

    fn matches(&self, entry: &Entry) -> bool {
        match self {
            Self::Present(attr) => entry.get(attr).is_some_and(|v| !v.is_empty()),
            Self::Equals(attr, value) => entry
                .get(attr)
                .is_some_and(|values| values.iter().any(|v| v.eq_ignore_ascii_case(value))),
            Self::And(children) => children.iter().all(|f| f.matches(entry)),
            Self::Or(children) => children.iter().any(|f| f.matches(entry)),
        }
    }
}

fn filter_error(filter: &str) -> ConnectionError {
    ConnectionError::Protocol {
        code: FILTER_ERROR,
        message: format!("Bad search filter: {filter}"),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> DomainConfig {
        DomainConfig {
            domain_name: "example.local".to_string(),
            base_dn: "dc=example,dc=local".to_string(),
            servers: vec!["DC1".to_string(), "dc2".to_string()],
            username: Some("svc".to_string()),
            password: Some("svc-pass".to_string()),
            ..DomainConfig::default()
        }
    }

    fn seeded() -> InMemoryConnection {
        let conn = InMemoryConnection::new(config());
        conn.add_account("svc", "svc-pass");
        conn.insert(
            Entry::new("cn=alice,ou=people,dc=example,dc=local")
                .with_attribute("objectClass", ["user"])
                .with_attribute("cn", ["alice"])
                .with_attribute("mail", ["alice@example.local"]),
        );
        conn.insert(
            Entry::new("cn=bob,ou=people,dc=example,dc=local")
                .with_attribute("objectClass", ["user"])
                .with_attribute("cn", ["bob"]),
        );
        conn.insert(
            Entry::new("ou=people,dc=example,dc=local")
                .with_attribute("objectClass", ["organizationalUnit"]),
        );
        conn
    }

    fn request(base: &str, filter: &str, scope: SearchScope) -> SearchRequest {
        SearchRequest {
            base_dn: base.to_string(),
            filter: filter.to_string(),
            scope,
            attributes: Vec::new(),
            size_limit: None,
            page_size: None,
            cookie: None,
        }
    }

    #[test]
    fn filter_parsing() {
        assert_eq!(
            Filter::parse("(cn=*)").unwrap(),
            Filter::Present("cn".to_string())
        );
        assert_eq!(
            Filter::parse("(&(objectClass=user)(|(cn=alice)(cn=bob)))").unwrap(),
            Filter::And(vec![
                Filter::Equals("objectClass".to_string(), "user".to_string()),
                Filter::Or(vec![
                    Filter::Equals("cn".to_string(), "alice".to_string()),
                    Filter::Equals("cn".to_string(), "bob".to_string()),
                ]),
            ])
        );
        assert!(Filter::parse("cn=alice").is_err());
        assert!(Filter::parse("(cn>=alice)").is_err());
        assert!(Filter::parse("(cn=alice))").is_err());
    }

    #[tokio::test]
    async fn connect_resolves_configured_spelling() {
        let conn = seeded();
        conn.connect(None, Some("dc1")).await.unwrap();
        assert_eq!(conn.server().as_deref(), Some("DC1"));
        assert!(!conn.is_bound());
    }

    #[tokio::test]
    async fn connect_without_server_uses_first_configured() {
        let conn = seeded();
        conn.connect(None, None).await.unwrap();
        assert_eq!(conn.server().as_deref(), Some("DC1"));
    }

    #[tokio::test]
    async fn unreachable_and_unknown_servers_fail() {
        let conn = seeded();
        conn.set_unreachable("dc2", true);
        assert!(matches!(
            conn.connect(None, Some("dc2")).await,
            Err(ConnectionError::Unreachable { .. })
        ));
        assert!(matches!(
            conn.connect(None, Some("dc3")).await,
            Err(ConnectionError::Unreachable { .. })
        ));

        conn.set_unreachable("DC2", false);
        conn.connect(None, Some("dc2")).await.unwrap();
    }

    #[tokio::test]
    async fn protocol_calls_bind_lazily() {
        let conn = seeded();
        conn.connect(None, Some("dc2")).await.unwrap();
        assert!(!conn.is_bound());

        conn.search(&request("dc=example,dc=local", "(cn=*)", SearchScope::Subtree))
            .await
            .unwrap();

        assert!(conn.is_bound());
        assert!(conn.journal().contains(&SessionEvent::Bind {
            server: "dc2".to_string(),
            username: "svc".to_string()
        }));
    }

    #[tokio::test]
    async fn protocol_calls_require_a_connection() {
        let conn = seeded();
        let err = conn.delete("cn=alice,ou=people,dc=example,dc=local").await.unwrap_err();
        assert_eq!(err, ConnectionError::NotConnected);
    }

    #[tokio::test]
    async fn search_scopes() {
        let conn = seeded();
        conn.connect(None, None).await.unwrap();

        let base = conn
            .search(&request("ou=people,dc=example,dc=local", "(objectClass=*)", SearchScope::Base))
            .await
            .unwrap();
        assert_eq!(base.entries.len(), 1);

        let one = conn
            .search(&request("ou=people,dc=example,dc=local", "(objectClass=*)", SearchScope::OneLevel))
            .await
            .unwrap();
        assert_eq!(one.entries.len(), 2);

        let sub = conn
            .search(&request("dc=example,dc=local", "(objectClass=*)", SearchScope::Subtree))
            .await
            .unwrap();
        assert_eq!(sub.entries.len(), 3);
    }

    #[tokio::test]
    async fn search_projects_requested_attributes() {
        let conn = seeded();
        conn.connect(None, None).await.unwrap();

        let mut req = request("dc=example,dc=local", "(cn=alice)", SearchScope::Subtree);
        req.attributes = vec!["MAIL".to_string()];
        let page = conn.search(&req).await.unwrap();

        assert_eq!(page.entries.len(), 1);
        assert_eq!(page.entries[0].attributes.len(), 1);
        assert!(page.entries[0].get("mail").is_some());
    }

    #[tokio::test]
    async fn paging_walks_cookie() {
        let conn = seeded();
        conn.connect(None, None).await.unwrap();

        let mut req = request("dc=example,dc=local", "(objectClass=*)", SearchScope::Subtree);
        req.page_size = Some(2);
        let first = conn.search(&req).await.unwrap();
        assert_eq!(first.entries.len(), 2);
        assert!(first.cookie.is_some());

        req.cookie = first.cookie;
        let second = conn.search(&req).await.unwrap();
        assert_eq!(second.entries.len(), 1);
        assert!(second.cookie.is_none());
    }

    #[tokio::test]
    async fn modify_rename_and_failures() {
        let conn = seeded();
        conn.connect(None, None).await.unwrap();

        conn.modify(
            "cn=bob,ou=people,dc=example,dc=local",
            &[
                Modification {
                    kind: ModificationKind::Add,
                    attribute: "mail".to_string(),
                    values: vec!["bob@example.local".to_string()],
                },
                Modification {
                    kind: ModificationKind::Remove,
                    attribute: "objectclass".to_string(),
                    values: Vec::new(),
                },
            ],
        )
        .await
        .unwrap();
        let bob = conn.entry("cn=bob,ou=people,dc=example,dc=local").unwrap();
        assert!(bob.get("mail").is_some());
        assert!(bob.get("objectClass").is_none());

        conn.rename(
            "cn=bob,ou=people,dc=example,dc=local",
            "cn=robert",
            Some("ou=staff,dc=example,dc=local"),
            true,
        )
        .await
        .unwrap();
        let robert = conn.entry("CN=Robert,OU=Staff,DC=example,DC=local").unwrap();
        assert_eq!(robert.get("cn"), Some(&["robert".to_string()][..]));
        assert!(conn.entry("cn=bob,ou=people,dc=example,dc=local").is_none());

        conn.fail_next(ConnectionError::Protocol {
            code: 53,
            message: "Unwilling to perform".to_string(),
        });
        let err = conn
            .delete("cn=alice,ou=people,dc=example,dc=local")
            .await
            .unwrap_err();
        assert!(matches!(err, ConnectionError::Protocol { code: 53, .. }));
        assert!(conn.entry("cn=alice,ou=people,dc=example,dc=local").is_some());
    }

    #[tokio::test]
    async fn invalid_credentials_leave_session_closed() {
        let conn = seeded();
        conn.connect(None, Some("dc1")).await.unwrap();

        let err = conn
            .connect(Some(Credentials::new("svc", "nope")), Some("dc2"))
            .await
            .unwrap_err();
        assert!(matches!(err, ConnectionError::InvalidCredentials { .. }));
        assert!(conn.server().is_none());
        assert!(!conn.is_bound());
    }
}

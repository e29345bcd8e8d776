use serde::Deserialize;

/// Per-domain connection settings.
///
/// Controls which servers a session may use and the defaults applied to
/// operations that leave fields unset.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DomainConfig {
    /// DNS-style domain name, e.g. `example.local`. Recorded on every log entry.
    pub domain_name: String,
    /// Default search base for queries without an explicit base DN.
    pub base_dn: String,
    /// Servers the session may connect to, in preference order.
    pub servers: Vec<String>,
    /// Directory port.
    pub port: u16,
    /// Whether to use TLS when connecting.
    pub use_tls: bool,
    /// Default page size for paged queries.
    pub page_size: usize,
    /// Whether queries use paging unless they say otherwise.
    pub use_paging: bool,
    /// Default bind username used when a session binds lazily.
    pub username: Option<String>,
    /// Default bind password.
    pub password: Option<String>,
}

impl Default for DomainConfig {
    fn default() -> Self {
        Self {
            domain_name: String::new(),
            base_dn: String::new(),
            servers: Vec::new(),
            port: 389,
            use_tls: false,
            page_size: 1000,
            use_paging: true,
            username: None,
            password: None,
        }
    }
}

impl DomainConfig {
    /// The default bind credentials, if both a username and password are set.
    #[must_use]
    pub fn credentials(&self) -> Option<crate::Credentials> {
        match (&self.username, &self.password) {
            (Some(username), Some(password)) => {
                Some(crate::Credentials::new(username.clone(), password.clone()))
            }
            _ => None,
        }
    }
}

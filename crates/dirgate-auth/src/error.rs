//! Infrastructure failures surfaced by credential checks

use ldap3::LdapError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AuthError>;

/// The directory could not be reached or spoke nonsense.
///
/// Wrong credentials are never reported through this type; they end up in the
/// validation verdict instead.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Timeout on LDAP connect to {url}")]
    Timeout {
        url: String,
        #[source]
        source: LdapError,
    },

    #[error("Couldn't open LDAP connection to {url}")]
    Connect {
        url: String,
        #[source]
        source: LdapError,
    },

    #[error("No LDAP servers configured")]
    NoServers,
}

impl AuthError {
    /// Sort an LDAP client error into timeout or connect failure
    pub fn classify(url: &str, source: LdapError) -> Self {
        let timed_out = match &source {
            LdapError::Timeout { .. } => true,
            LdapError::Io { source } => source.kind() == std::io::ErrorKind::TimedOut,
            _ => false,
        };
        let url = url.to_string();
        if timed_out {
            AuthError::Timeout { url, source }
        } else {
            AuthError::Connect { url, source }
        }
    }

    /// Server the failure happened on
    pub fn url(&self) -> Option<&str> {
        match self {
            AuthError::Timeout { url, .. } | AuthError::Connect { url, .. } => Some(url),
            AuthError::NoServers => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, AuthError::Timeout { .. })
    }
}

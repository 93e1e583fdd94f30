//! Directory transport seam
//!
//! The validator only needs three things from a directory: open a connection bound
//! as some identity, search over it, and let it go. [`Connector`] and [`Session`]
//! capture exactly that, so the LDAP client can be swapped for an in-memory
//! directory in tests.

use crate::error::Result;
use async_trait::async_trait;
use dirgate_core::{SearchCredentials, SearchScope};
use std::collections::HashMap;
use std::fmt;

/// Identity a connection binds as
#[derive(Clone, PartialEq, Eq)]
pub enum BindIdentity {
    Anonymous,
    Simple { dn: String, password: String },
}

impl BindIdentity {
    pub fn simple(dn: impl Into<String>, password: impl Into<String>) -> Self {
        BindIdentity::Simple {
            dn: dn.into(),
            password: password.into(),
        }
    }

    /// Bound DN, `None` for anonymous
    pub fn dn(&self) -> Option<&str> {
        match self {
            BindIdentity::Anonymous => None,
            BindIdentity::Simple { dn, .. } => Some(dn),
        }
    }
}

impl From<Option<&SearchCredentials>> for BindIdentity {
    fn from(credentials: Option<&SearchCredentials>) -> Self {
        match credentials {
            Some(c) => BindIdentity::simple(&c.userdn, &c.password),
            None => BindIdentity::Anonymous,
        }
    }
}

impl fmt::Debug for BindIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindIdentity::Anonymous => f.write_str("Anonymous"),
            BindIdentity::Simple { dn, .. } => f
                .debug_struct("Simple")
                .field("dn", dn)
                .field("password", &"********")
                .finish(),
        }
    }
}

/// Result of a bind that reached the server
#[derive(Debug)]
pub enum BindOutcome<S> {
    Bound(S),
    /// The server refused the credentials
    Rejected { diagnostic: String },
}

/// One search over a bound session
#[derive(Debug, Clone)]
pub struct SearchRequest<'a> {
    pub base: &'a str,
    pub scope: SearchScope,
    pub filter: &'a str,
    pub attributes: Vec<&'a str>,
}

/// A search result entry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub dn: String,
    pub attrs: HashMap<String, Vec<String>>,
}

impl DirectoryEntry {
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attrs: HashMap::new(),
        }
    }

    pub fn with_attr(mut self, name: &str, values: &[&str]) -> Self {
        self.attrs.insert(
            name.to_string(),
            values.iter().map(|v| v.to_string()).collect(),
        );
        self
    }

    /// Values of `name`, matched case-insensitively. Attributes without values count
    /// as absent.
    pub fn attribute(&self, name: &str) -> Option<&[String]> {
        self.attrs
            .iter()
            .find(|(key, values)| key.eq_ignore_ascii_case(name) && !values.is_empty())
            .map(|(_, values)| values.as_slice())
    }
}

/// A search the server did not complete
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchFailure {
    /// LDAP result code, absent when the request never got an answer
    pub rc: Option<u32>,
    pub message: String,
}

impl fmt::Display for SearchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.rc {
            Some(rc) => write!(f, "{} (rc={})", self.message, rc),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for SearchFailure {}

impl SearchFailure {
    pub fn new(rc: Option<u32>, message: impl Into<String>) -> Self {
        Self {
            rc,
            message: message.into(),
        }
    }
}

/// Opens bound sessions against the directory
#[async_trait]
pub trait Connector: Send + Sync {
    type Session: Session;

    /// Connect and bind as `identity`.
    ///
    /// Unreachable servers and timeouts are errors; refused credentials are a
    /// [`BindOutcome::Rejected`].
    async fn bind(&self, identity: &BindIdentity) -> Result<BindOutcome<Self::Session>>;
}

/// A live, bound connection owned by one validation
#[async_trait]
pub trait Session: Send {
    /// Identity the session is bound as
    fn identity(&self) -> &BindIdentity;

    async fn search(
        &mut self,
        request: &SearchRequest<'_>,
    ) -> std::result::Result<Vec<DirectoryEntry>, SearchFailure>;

    /// Close the session. Dropping a session without calling this also releases it.
    async fn unbind(self);
}

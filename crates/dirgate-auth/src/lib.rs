//! Directory authentication for Dirgate
//!
//! Checks a username/password pair against an LDAP directory and resolves the
//! user's groups. See [`Validator::validate`].

pub mod error;
pub mod ldap;

pub use error::{AuthError, Result};
pub use ldap::{
    BindIdentity, BindOutcome, Connector, DirectoryEntry, LdapAuthProvider, LdapConnector,
    LdapSession, SearchExecutor, SearchFailure, SearchRequest, Session, Validator,
};

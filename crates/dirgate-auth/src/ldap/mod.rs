//! LDAP authentication
//!
//! - [`directory`]: the transport seam (`Connector`/`Session`)
//! - [`client`]: `ldap3` implementation of the seam with server failover
//! - [`search`]: attribute search with bind-identity selection
//! - [`validator`]: DN resolution, password bind and group lookup
//! - [`provider`]: host-facing wrapper with a per-request verdict cache

pub mod client;
pub mod directory;
pub mod provider;
pub mod search;
pub mod validator;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{LdapConnector, LdapSession};
pub use directory::{
    BindIdentity, BindOutcome, Connector, DirectoryEntry, SearchFailure, SearchRequest, Session,
};
pub use provider::LdapAuthProvider;
pub use search::SearchExecutor;
pub use validator::Validator;

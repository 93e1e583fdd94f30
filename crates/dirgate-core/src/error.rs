//! Error types for directory configuration

use crate::template::TemplateError;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Load-time configuration failure.
///
/// These are never produced while validating credentials; a process that hits one
/// is expected to stop.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("No config at '{}'.", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to read config '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse LDAP config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("No '{0}' section in config.")]
    MissingSection(&'static str),

    #[error("No url in LDAP config.")]
    MissingUrl,

    #[error("The LDAP options 'url' and 'server_pool' are mutually exclusive.")]
    UrlAndServerPool,

    #[error("The LDAP 'server_pool' needs at least one server.")]
    EmptyServerPool,

    #[error("Invalid LDAP url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("The LDAP options 'user_template' and 'user_search' are mutually exclusive.")]
    UserTemplateAndSearch,

    #[error("You need to set either 'user_template' or 'user_search' in LDAP config.")]
    NoUserLookup,

    #[error("You have to set a 'password' if you use a 'userdn' in LDAP '{0}' config.")]
    UserDnWithoutPassword(&'static str),

    #[error("Invalid template in LDAP '{section}' config: {source}")]
    Template {
        section: &'static str,
        #[source]
        source: TemplateError,
    },

    #[error("The LDAP 'timeout' must be a positive number of seconds, got {0}.")]
    InvalidTimeout(f64),
}

//! Directory configuration
//!
//! The settings are read from the `dirgate` section of a YAML (or JSON) document:
//!
//! ```yaml
//! dirgate:
//!   url: ldap://ldap.example.com
//!   user_search:
//!     base: ou=people,dc=example,dc=com
//!     filter: (uid={username})
//!     attribute_name: dn
//!   group_search:
//!     base: ou=groups,dc=example,dc=com
//!     filter: (member={userdn})
//!     attribute_name: cn
//! ```
//!
//! Parsing happens in two steps: serde reads the raw sections and rejects unknown
//! keys, then [`DirectoryConfig::try_from`] checks the cross-field rules and parses
//! the templates.

use crate::error::{ConfigError, Result};
use crate::template::{Placeholder, Template};
use crate::{CONFIG_NAMESPACE, DEFAULT_TIMEOUT_SECS};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tracing::info;

// ============================================================================
// Raw configuration, as written in the file
// ============================================================================

/// The `dirgate` section before validation
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawDirectoryConfig {
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub server_pool: Option<Vec<RawServer>>,

    /// TLS settings for `url`, and the default for pool entries without their own
    #[serde(default)]
    pub tls: Option<TlsOptions>,

    #[serde(default)]
    pub user_template: Option<String>,

    #[serde(default)]
    pub user_search: Option<RawSearchSpec>,

    #[serde(default)]
    pub group_search: Option<RawSearchSpec>,

    #[serde(default = "default_true")]
    pub referrals: bool,

    #[serde(default = "default_true")]
    pub reject_as_unknown: bool,

    /// Seconds
    #[serde(default = "default_timeout")]
    pub timeout: f64,

    #[serde(default)]
    pub login_template: Option<String>,

    #[serde(default)]
    pub group_required: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawServer {
    pub url: String,
    #[serde(default)]
    pub tls: Option<TlsOptions>,
}

#[derive(Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawSearchSpec {
    pub base: String,
    pub filter: String,
    pub attribute_name: String,
    #[serde(default)]
    pub scope: SearchScope,
    #[serde(default)]
    pub userdn: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl fmt::Debug for RawSearchSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawSearchSpec")
            .field("base", &self.base)
            .field("filter", &self.filter)
            .field("attribute_name", &self.attribute_name)
            .field("scope", &self.scope)
            .field("userdn", &self.userdn)
            .field("password", &self.password.as_ref().map(|_| MASK))
            .finish()
    }
}

fn default_true() -> bool {
    true
}

fn default_timeout() -> f64 {
    DEFAULT_TIMEOUT_SECS
}

const MASK: &str = "********";

// ============================================================================
// Validated configuration
// ============================================================================

/// How deep a search reaches below its base
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SearchScope {
    /// The base entry only
    BaseObject,
    /// Immediate children of the base
    SingleLevel,
    /// The base and everything below it
    #[default]
    WholeSubtree,
}

/// TLS parameters handed through to the connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TlsOptions {
    /// Upgrade a plain `ldap://` connection with STARTTLS
    #[serde(default)]
    pub starttls: bool,

    /// Verify the server certificate
    #[serde(default = "default_true")]
    pub verify: bool,
}

impl Default for TlsOptions {
    fn default() -> Self {
        Self {
            starttls: false,
            verify: true,
        }
    }
}

/// One directory server endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub url: String,
    pub tls: TlsOptions,
}

/// Fixed identity a search binds as
#[derive(Clone, PartialEq, Eq)]
pub struct SearchCredentials {
    pub userdn: String,
    pub password: String,
}

impl fmt::Debug for SearchCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchCredentials")
            .field("userdn", &self.userdn)
            .field("password", &MASK)
            .finish()
    }
}

/// One configured directory search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchSpec {
    pub base: String,
    pub filter: Template,
    pub attribute_name: String,
    pub scope: SearchScope,
    /// Bind identity for the search; anonymous when absent
    pub credentials: Option<SearchCredentials>,
}

impl SearchSpec {
    fn from_raw(
        raw: RawSearchSpec,
        section: &'static str,
        allowed: &[Placeholder],
    ) -> Result<Self> {
        let credentials = match (raw.userdn, raw.password) {
            (Some(userdn), Some(password)) => Some(SearchCredentials { userdn, password }),
            (Some(_), None) => return Err(ConfigError::UserDnWithoutPassword(section)),
            (None, _) => None,
        };
        let filter = Template::parse(&raw.filter, allowed)
            .map_err(|source| ConfigError::Template { section, source })?;

        Ok(Self {
            base: raw.base,
            filter,
            attribute_name: raw.attribute_name,
            scope: raw.scope,
            credentials,
        })
    }
}

/// How a login name becomes a distinguished name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserDnMode {
    /// Substitute the name into a fixed template
    Template(Template),
    /// Look the entry up with a directory search
    Search(SearchSpec),
}

/// Validated, immutable directory configuration
#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    servers: Vec<ServerConfig>,
    user_dn: UserDnMode,
    group_search: Option<SearchSpec>,
    referrals: bool,
    reject_as_unknown: bool,
    timeout: Duration,
    login_template: Option<Template>,
    group_required: bool,
}

impl DirectoryConfig {
    /// Parse a whole configuration document and pick out the `dirgate` section
    pub fn from_document(text: &str) -> Result<Self> {
        let document: serde_yaml::Value = serde_yaml::from_str(text)?;
        let section = document
            .get(CONFIG_NAMESPACE)
            .cloned()
            .ok_or(ConfigError::MissingSection(CONFIG_NAMESPACE))?;
        Self::from_mapping(section)
    }

    /// Build from an already parsed `dirgate` mapping
    pub fn from_mapping(section: serde_yaml::Value) -> Result<Self> {
        let raw: RawDirectoryConfig = serde_yaml::from_value(section)?;
        Self::try_from(raw)
    }

    /// Servers in the order they are tried
    pub fn servers(&self) -> &[ServerConfig] {
        &self.servers
    }

    pub fn user_dn(&self) -> &UserDnMode {
        &self.user_dn
    }

    pub fn group_search(&self) -> Option<&SearchSpec> {
        self.group_search.as_ref()
    }

    pub fn referrals(&self) -> bool {
        self.referrals
    }

    pub fn reject_as_unknown(&self) -> bool {
        self.reject_as_unknown
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn login_template(&self) -> Option<&Template> {
        self.login_template.as_ref()
    }

    pub fn group_required(&self) -> bool {
        self.group_required
    }

    /// URLs of the configured servers, for log messages
    pub fn server_urls(&self) -> Vec<&str> {
        self.servers.iter().map(|s| s.url.as_str()).collect()
    }
}

impl TryFrom<RawDirectoryConfig> for DirectoryConfig {
    type Error = ConfigError;

    fn try_from(raw: RawDirectoryConfig) -> Result<Self> {
        let default_tls = raw.tls.unwrap_or_default();
        let servers = match (raw.url, raw.server_pool) {
            (Some(_), Some(_)) => return Err(ConfigError::UrlAndServerPool),
            (None, None) => return Err(ConfigError::MissingUrl),
            (Some(url), None) => vec![ServerConfig {
                url,
                tls: default_tls,
            }],
            (None, Some(pool)) => {
                if pool.is_empty() {
                    return Err(ConfigError::EmptyServerPool);
                }
                pool.into_iter()
                    .map(|server| ServerConfig {
                        url: server.url,
                        tls: server.tls.unwrap_or(default_tls),
                    })
                    .collect()
            }
        };
        for server in &servers {
            validate_url(&server.url)?;
        }

        let user_dn = match (raw.user_template, raw.user_search) {
            (Some(_), Some(_)) => return Err(ConfigError::UserTemplateAndSearch),
            (None, None) => return Err(ConfigError::NoUserLookup),
            (Some(template), None) => UserDnMode::Template(
                Template::parse(&template, &[Placeholder::Username]).map_err(|source| {
                    ConfigError::Template {
                        section: "user_template",
                        source,
                    }
                })?,
            ),
            (None, Some(search)) => UserDnMode::Search(SearchSpec::from_raw(
                search,
                "user_search",
                &[Placeholder::Username],
            )?),
        };

        let group_search = match raw.group_search {
            Some(search) => Some(SearchSpec::from_raw(
                search,
                "group_search",
                &[Placeholder::Username, Placeholder::UserDn],
            )?),
            None => {
                info!("No group search setup for LDAP.");
                None
            }
        };

        let login_template = raw
            .login_template
            .map(|t| Template::parse(&t, &[Placeholder::Username, Placeholder::UserDn]))
            .transpose()
            .map_err(|source| ConfigError::Template {
                section: "login_template",
                source,
            })?;

        if raw.timeout <= 0.0 {
            return Err(ConfigError::InvalidTimeout(raw.timeout));
        }
        let timeout = Duration::try_from_secs_f64(raw.timeout)
            .map_err(|_| ConfigError::InvalidTimeout(raw.timeout))?;

        Ok(Self {
            servers,
            user_dn,
            group_search,
            referrals: raw.referrals,
            reject_as_unknown: raw.reject_as_unknown,
            timeout,
            login_template,
            group_required: raw.group_required,
        })
    }
}

fn validate_url(url: &str) -> Result<()> {
    let parsed = url::Url::parse(url).map_err(|e| ConfigError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    match parsed.scheme() {
        "ldap" | "ldaps" | "ldapi" => Ok(()),
        other => Err(ConfigError::InvalidUrl {
            url: url.to_string(),
            reason: format!("unsupported scheme '{}', expected ldap, ldaps or ldapi", other),
        }),
    }
}

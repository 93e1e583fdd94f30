//! LDAP client implementation
//!
//! Opens connections with `ldap3`, walking the configured server pool in order.
//! Supports LDAP, LDAPS and STARTTLS connections.

use crate::error::{AuthError, Result};
use crate::ldap::directory::{
    BindIdentity, BindOutcome, Connector, DirectoryEntry, SearchFailure, SearchRequest, Session,
};
use async_trait::async_trait;
use dirgate_core::{DirectoryConfig, SearchScope, ServerConfig};
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, Scope, SearchEntry, SearchResult};
use std::time::Duration;
use tracing::{debug, error, warn};

/// Connector over a pool of LDAP servers
#[derive(Debug, Clone)]
pub struct LdapConnector {
    servers: Vec<ServerConfig>,
    timeout: Duration,
    referrals: bool,
}

impl LdapConnector {
    /// Build the server pool from the configuration
    pub fn new(config: &DirectoryConfig) -> Self {
        Self {
            servers: config.servers().to_vec(),
            timeout: config.timeout(),
            referrals: config.referrals(),
        }
    }

    pub fn servers(&self) -> &[ServerConfig] {
        &self.servers
    }

    fn settings(&self, server: &ServerConfig) -> LdapConnSettings {
        LdapConnSettings::new()
            .set_conn_timeout(self.timeout)
            .set_starttls(server.tls.starttls)
            .set_no_tls_verify(!server.tls.verify)
    }

    /// Create LDAP connection with proper TLS settings
    async fn open(&self, server: &ServerConfig) -> Result<Ldap> {
        debug!(url = %server.url, "Connecting to LDAP server");

        let (conn, ldap) = LdapConnAsync::with_settings(self.settings(server), &server.url)
            .await
            .map_err(|e| AuthError::classify(&server.url, e))?;

        ldap3::drive!(conn);
        Ok(ldap)
    }

    async fn bind_on(
        &self,
        server: &ServerConfig,
        identity: &BindIdentity,
    ) -> Result<BindOutcome<LdapSession>> {
        let mut ldap = self.open(server).await?;

        let (dn, password) = match identity {
            BindIdentity::Anonymous => ("", ""),
            BindIdentity::Simple { dn, password } => (dn.as_str(), password.as_str()),
        };
        let result = ldap
            .with_timeout(self.timeout)
            .simple_bind(dn, password)
            .await
            .map_err(|e| AuthError::classify(&server.url, e))?;

        if result.rc != 0 {
            let _ = ldap.unbind().await;
            return Ok(BindOutcome::Rejected {
                diagnostic: format!("rc={} {}", result.rc, result.text),
            });
        }

        Ok(BindOutcome::Bound(LdapSession {
            ldap,
            identity: identity.clone(),
            url: server.url.clone(),
            timeout: self.timeout,
            referrals: self.referrals,
        }))
    }
}

#[async_trait]
impl Connector for LdapConnector {
    type Session = LdapSession;

    async fn bind(&self, identity: &BindIdentity) -> Result<BindOutcome<LdapSession>> {
        let mut last_error = None;

        for server in &self.servers {
            match self.bind_on(server, identity).await {
                Ok(outcome) => return Ok(outcome),
                Err(e) => {
                    error!(url = %server.url, error = ?e, "{}", e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or(AuthError::NoServers))
    }
}

/// A bound `ldap3` connection
pub struct LdapSession {
    ldap: Ldap,
    identity: BindIdentity,
    url: String,
    timeout: Duration,
    referrals: bool,
}

#[async_trait]
impl Session for LdapSession {
    fn identity(&self) -> &BindIdentity {
        &self.identity
    }

    async fn search(
        &mut self,
        request: &SearchRequest<'_>,
    ) -> std::result::Result<Vec<DirectoryEntry>, SearchFailure> {
        let SearchResult(entries, result) = self
            .ldap
            .with_timeout(self.timeout)
            .search(
                request.base,
                ldap_scope(request.scope),
                request.filter,
                request.attributes.clone(),
            )
            .await
            .map_err(|e| SearchFailure::new(None, e.to_string()))?;

        if result.rc != 0 {
            return Err(SearchFailure::new(Some(result.rc), result.text));
        }

        let mut found = Vec::with_capacity(entries.len());
        for entry in entries {
            if entry.is_ref() {
                if self.referrals {
                    debug!(url = %self.url, "Skipping search continuation reference");
                }
                continue;
            }
            if entry.is_intermediate() {
                continue;
            }
            let entry = SearchEntry::construct(entry);
            found.push(DirectoryEntry {
                dn: entry.dn,
                attrs: entry.attrs,
            });
        }

        Ok(found)
    }

    async fn unbind(mut self) {
        if let Err(e) = self.ldap.unbind().await {
            warn!(url = %self.url, "LDAP unbind failed: {}", e);
        }
    }
}

fn ldap_scope(scope: SearchScope) -> Scope {
    match scope {
        SearchScope::BaseObject => Scope::Base,
        SearchScope::SingleLevel => Scope::OneLevel,
        SearchScope::WholeSubtree => Scope::Subtree,
    }
}

//! LDAP authentication provider for integration with a host's login flow
//!
//! The host builds one provider at startup and calls [`LdapAuthProvider::authenticate`]
//! for each login attempt. A login hook may fire several times while one request is
//! handled; the verdict is kept per request id for a short while so the directory is
//! only asked once. A verdict is only reused for the same username and password.

use crate::error::Result;
use crate::ldap::client::LdapConnector;
use crate::ldap::directory::Connector;
use crate::ldap::validator::Validator;
use dirgate_core::ValidationResult;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(30);

/// Verdict cache keyed by request id
struct RequestCache {
    results: HashMap<String, CachedResult>,
    ttl: Duration,
}

struct CachedResult {
    username: String,
    password_digest: [u8; 32],
    result: ValidationResult,
    cached_at: Instant,
}

impl RequestCache {
    fn get(&self, request_id: &str, username: &str, password: &str) -> Option<ValidationResult> {
        let digest = password_digest(password);
        self.results
            .get(request_id)
            .filter(|cached| {
                cached.username == username
                    && cached.password_digest == digest
                    && cached.cached_at.elapsed() < self.ttl
            })
            .map(|cached| cached.result.clone())
    }

    fn purge_expired(&mut self) {
        let ttl = self.ttl;
        self.results.retain(|_, cached| cached.cached_at.elapsed() < ttl);
    }
}

fn password_digest(password: &str) -> [u8; 32] {
    Sha256::digest(password.as_bytes()).into()
}

/// Entry point for a host: answers `unknown` when no directory is configured
pub struct LdapAuthProvider<C = LdapConnector> {
    validator: Option<Arc<Validator<C>>>,
    cache: Arc<RwLock<RequestCache>>,
}

impl<C: Connector> LdapAuthProvider<C> {
    /// Create a new LDAP auth provider
    pub fn new(validator: Validator<C>) -> Self {
        Self::build(Some(Arc::new(validator)))
    }

    /// Provider for a host started without directory settings
    pub fn disabled() -> Self {
        Self::build(None)
    }

    fn build(validator: Option<Arc<Validator<C>>>) -> Self {
        Self {
            validator,
            cache: Arc::new(RwLock::new(RequestCache {
                results: HashMap::new(),
                ttl: DEFAULT_CACHE_TTL,
            })),
        }
    }

    /// How long a verdict is reused within one request
    pub fn with_cache_ttl(self, ttl: Duration) -> Self {
        Self {
            validator: self.validator,
            cache: Arc::new(RwLock::new(RequestCache {
                results: HashMap::new(),
                ttl,
            })),
        }
    }

    /// Check if LDAP is enabled
    pub fn is_enabled(&self) -> bool {
        self.validator.is_some()
    }

    /// Get underlying validator
    pub fn validator(&self) -> Option<Arc<Validator<C>>> {
        self.validator.clone()
    }

    /// Authenticate user for the request identified by `request_id`.
    ///
    /// Directory failures are returned as errors and never cached.
    pub async fn authenticate(
        &self,
        request_id: &str,
        username: &str,
        password: &str,
    ) -> Result<ValidationResult> {
        let Some(validator) = &self.validator else {
            debug!("No LDAP settings given.");
            return Ok(ValidationResult::unknown());
        };

        if let Some(result) = self.cache.read().await.get(request_id, username, password) {
            debug!("Reusing LDAP verdict for request {}", request_id);
            return Ok(result);
        }

        let result = validator.validate(username, password).await?;

        let mut cache = self.cache.write().await;
        cache.purge_expired();
        cache.results.insert(
            request_id.to_string(),
            CachedResult {
                username: username.to_string(),
                password_digest: password_digest(password),
                result: result.clone(),
                cached_at: Instant::now(),
            },
        );

        Ok(result)
    }

    /// Drop the cached verdict of a finished request
    pub async fn finish_request(&self, request_id: &str) {
        self.cache.write().await.results.remove(request_id);
    }

    /// Number of requests with a cached verdict
    pub async fn cached_requests(&self) -> usize {
        self.cache.read().await.results.len()
    }
}

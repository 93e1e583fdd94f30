//! In-memory directory for tests

use crate::error::{AuthError, Result};
use crate::ldap::directory::{
    BindIdentity, BindOutcome, Connector, DirectoryEntry, SearchFailure, SearchRequest, Session,
};
use async_trait::async_trait;
use ldap3::LdapError;
use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::{Arc, Mutex};

const URL: &str = "ldap://fake.example.com";

#[derive(Default)]
struct Log {
    binds: Vec<BindIdentity>,
    searches: Vec<(Option<String>, String)>,
    open_sessions: usize,
}

/// Users, canned search results and scripted failures.
///
/// Like many real servers, a known DN binds with an empty password.
#[derive(Default)]
pub struct FakeDirectory {
    users: HashMap<String, String>,
    results: HashMap<String, Vec<DirectoryEntry>>,
    failed_searches: HashSet<String>,
    timeouts: HashSet<Option<String>>,
    refused: HashSet<Option<String>>,
    log: Arc<Mutex<Log>>,
}

impl FakeDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, dn: &str, password: &str) -> Self {
        self.users.insert(dn.to_string(), password.to_string());
        self
    }

    pub fn with_search(mut self, filter: &str, entries: Vec<DirectoryEntry>) -> Self {
        self.results.insert(filter.to_string(), entries);
        self
    }

    pub fn with_failed_search(mut self, filter: &str) -> Self {
        self.failed_searches.insert(filter.to_string());
        self
    }

    /// Binds as `dn` (`None` for anonymous) time out
    pub fn with_timeout_for(mut self, dn: Option<&str>) -> Self {
        self.timeouts.insert(dn.map(str::to_string));
        self
    }

    /// Connections for binds as `dn` are refused
    pub fn with_refused_for(mut self, dn: Option<&str>) -> Self {
        self.refused.insert(dn.map(str::to_string));
        self
    }

    pub fn binds(&self) -> Vec<BindIdentity> {
        self.log.lock().unwrap().binds.clone()
    }

    /// `(bound dn, filter)` of every search that reached the directory
    pub fn searches(&self) -> Vec<(Option<String>, String)> {
        self.log.lock().unwrap().searches.clone()
    }

    /// Sessions bound but neither unbound nor dropped
    pub fn open_sessions(&self) -> usize {
        self.log.lock().unwrap().open_sessions
    }

    pub async fn session_for(&self, dn: &str, password: &str) -> FakeSession {
        match self.bind(&BindIdentity::simple(dn, password)).await {
            Ok(BindOutcome::Bound(session)) => session,
            _ => panic!("bind as {dn} failed"),
        }
    }
}

#[async_trait]
impl Connector for FakeDirectory {
    type Session = FakeSession;

    async fn bind(&self, identity: &BindIdentity) -> Result<BindOutcome<FakeSession>> {
        self.log.lock().unwrap().binds.push(identity.clone());

        let key = identity.dn().map(str::to_string);
        if self.timeouts.contains(&key) {
            return Err(AuthError::classify(
                URL,
                LdapError::Io {
                    source: io::Error::new(io::ErrorKind::TimedOut, "timed out"),
                },
            ));
        }
        if self.refused.contains(&key) {
            return Err(AuthError::classify(
                URL,
                LdapError::Io {
                    source: io::Error::new(io::ErrorKind::ConnectionRefused, "refused"),
                },
            ));
        }

        let accepted = match identity {
            BindIdentity::Anonymous => true,
            BindIdentity::Simple { dn, password } => match self.users.get(dn) {
                Some(expected) => password.is_empty() || expected == password,
                None => false,
            },
        };
        if !accepted {
            return Ok(BindOutcome::Rejected {
                diagnostic: "rc=49 invalid credentials".to_string(),
            });
        }

        self.log.lock().unwrap().open_sessions += 1;
        Ok(BindOutcome::Bound(FakeSession {
            identity: identity.clone(),
            results: self.results.clone(),
            failed_searches: self.failed_searches.clone(),
            log: self.log.clone(),
        }))
    }
}

pub struct FakeSession {
    identity: BindIdentity,
    results: HashMap<String, Vec<DirectoryEntry>>,
    failed_searches: HashSet<String>,
    log: Arc<Mutex<Log>>,
}

impl Drop for FakeSession {
    fn drop(&mut self) {
        if let Ok(mut log) = self.log.lock() {
            log.open_sessions -= 1;
        }
    }
}

#[async_trait]
impl Session for FakeSession {
    fn identity(&self) -> &BindIdentity {
        &self.identity
    }

    async fn search(
        &mut self,
        request: &SearchRequest<'_>,
    ) -> std::result::Result<Vec<DirectoryEntry>, SearchFailure> {
        self.log.lock().unwrap().searches.push((
            self.identity.dn().map(str::to_string),
            request.filter.to_string(),
        ));

        if self.failed_searches.contains(request.filter) {
            return Err(SearchFailure::new(Some(32), "No such object"));
        }
        Ok(self
            .results
            .get(request.filter)
            .cloned()
            .unwrap_or_default())
    }

    async fn unbind(self) {}
}

//! Attribute search with bind-identity selection
//!
//! A search runs either over a session the caller already holds or over a fresh
//! one bound as the search's own identity. Failed search binds, failed searches and
//! entries without the wanted attribute all degrade to "no values"; only transport
//! failures while binding are returned as errors.

use crate::error::Result;
use crate::ldap::directory::{
    BindIdentity, BindOutcome, Connector, DirectoryEntry, SearchRequest, Session,
};
use dirgate_core::{SearchSpec, Substitutions};
use tracing::{debug, error};

/// Runs configured searches through a [`Connector`]
pub struct SearchExecutor<'a, C> {
    connector: &'a C,
}

impl<'a, C: Connector> SearchExecutor<'a, C> {
    pub fn new(connector: &'a C) -> Self {
        Self { connector }
    }

    /// Run `spec` and collect the values of its attribute across all result entries.
    ///
    /// `existing` is used when it satisfies the identity `spec` asks for; otherwise a
    /// new session is opened for this search and closed afterwards.
    pub async fn search(
        &self,
        existing: Option<&mut C::Session>,
        spec: &SearchSpec,
        values: &Substitutions<'_>,
    ) -> Result<Vec<String>> {
        let mut fresh = None;
        let session = match existing {
            Some(session) if accepts(spec, session.identity()) => session,
            _ => {
                let identity = BindIdentity::from(spec.credentials.as_ref());
                match self.connector.bind(&identity).await? {
                    BindOutcome::Bound(session) => fresh.insert(session),
                    BindOutcome::Rejected { diagnostic } => {
                        error!(
                            identity = ?identity,
                            spec = ?spec,
                            "Search failed, couldn't bind: {}",
                            diagnostic
                        );
                        return Ok(Vec::new());
                    }
                }
            }
        };

        let filter = spec.filter.render(values);
        let request = SearchRequest {
            base: &spec.base,
            scope: spec.scope,
            filter: &filter,
            attributes: vec![spec.attribute_name.as_str()],
        };

        let found = match session.search(&request).await {
            Ok(entries) if entries.is_empty() => {
                debug!(filter = %filter, base = %spec.base, "Search returned no entries");
                Vec::new()
            }
            Ok(entries) => extract_values(&entries, &spec.attribute_name),
            Err(failure) => {
                error!(
                    filter = %filter,
                    base = %spec.base,
                    "Search failed: {}",
                    failure
                );
                Vec::new()
            }
        };

        if let Some(session) = fresh {
            session.unbind().await;
        }

        Ok(found)
    }
}

/// Whether a session bound as `bound` may run `spec`.
///
/// A spec with its own `userdn` needs a session bound as exactly that DN; a spec
/// without one runs over whatever session is at hand.
fn accepts(spec: &SearchSpec, bound: &BindIdentity) -> bool {
    match &spec.credentials {
        Some(credentials) => bound.dn() == Some(credentials.userdn.as_str()),
        None => true,
    }
}

fn is_dn_attribute(name: &str) -> bool {
    name.eq_ignore_ascii_case("dn") || name.eq_ignore_ascii_case("distinguishedName")
}

/// Flatten attribute values of all entries, in response order.
///
/// Entries lacking the attribute fall back to their own DN when a DN was asked for;
/// some servers never return `dn` as an attribute.
fn extract_values(entries: &[DirectoryEntry], attribute: &str) -> Vec<String> {
    let dn_fallback = is_dn_attribute(attribute);
    let mut values = Vec::new();

    for entry in entries {
        match entry.attribute(attribute) {
            Some(found) => values.extend(found.iter().cloned()),
            None if dn_fallback => values.push(entry.dn.clone()),
            None => error!(
                attribute,
                dn = %entry.dn,
                "Search result entry has no '{}' attribute",
                attribute
            ),
        }
    }

    values
}

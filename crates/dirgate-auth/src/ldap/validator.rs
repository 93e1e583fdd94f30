//! Credential validation
//!
//! `validate` resolves the user's DN (template or search), binds with the supplied
//! password and, when configured, searches the user's groups. Every "credentials
//! not accepted" path goes through [`Validator::rejection`], so `reject_as_unknown`
//! applies uniformly.

use crate::error::Result;
use crate::ldap::client::LdapConnector;
use crate::ldap::directory::{BindIdentity, BindOutcome, Connector, Session};
use crate::ldap::search::SearchExecutor;
use dirgate_core::{
    escape_filter_value, DirectoryConfig, Substitutions, UserDnMode, ValidationResult,
};
use tracing::{debug, error, info};

/// Validates credentials against one configured directory.
///
/// Holds no per-request state; share it behind an `Arc` between concurrent logins.
pub struct Validator<C = LdapConnector> {
    config: DirectoryConfig,
    connector: C,
}

impl Validator<LdapConnector> {
    pub fn new(config: DirectoryConfig) -> Self {
        let connector = LdapConnector::new(&config);
        Self { config, connector }
    }
}

impl<C: Connector> Validator<C> {
    /// Use a custom directory transport
    pub fn with_connector(config: DirectoryConfig, connector: C) -> Self {
        Self { config, connector }
    }

    pub fn config(&self) -> &DirectoryConfig {
        &self.config
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Check `password` for `username` and resolve the user's groups.
    ///
    /// Returns an error only when the directory cannot be reached; wrong
    /// credentials and unknown users are reported in the result.
    pub async fn validate(&self, username: &str, password: &str) -> Result<ValidationResult> {
        debug!(
            servers = ?self.config.server_urls(),
            "Validating user '{}' against LDAP",
            username
        );

        // an empty password makes many servers perform an unauthenticated bind
        if password.trim().is_empty() {
            debug!("Empty password for user '{}'", username);
            return Ok(self.rejection());
        }

        let username = escape_filter_value(username);
        let Some(userdn) = self.resolve_dn(&username).await? else {
            return Ok(ValidationResult::unknown());
        };

        let values = Substitutions::new(&username).with_userdn(&userdn);
        let login = match self.config.login_template() {
            Some(template) => template.render(&values),
            None => userdn.clone(),
        };

        let mut session = match self
            .connector
            .bind(&BindIdentity::simple(login, password))
            .await?
        {
            BindOutcome::Bound(session) => session,
            BindOutcome::Rejected { diagnostic } => {
                info!("Bind as '{}' refused: {}", userdn, diagnostic);
                return Ok(self.rejection());
            }
        };

        let result = self.resolve_groups(&mut session, &values).await;
        session.unbind().await;
        result
    }

    async fn resolve_dn(&self, username: &str) -> Result<Option<String>> {
        let values = Substitutions::new(username);
        let userdn = match self.config.user_dn() {
            UserDnMode::Template(template) => Some(template.render(&values)),
            UserDnMode::Search(spec) => {
                let mut found = SearchExecutor::new(&self.connector)
                    .search(None, spec, &values)
                    .await?;
                match found.len() {
                    1 => found.pop(),
                    0 => {
                        info!("No user '{}' found.", username);
                        None
                    }
                    count => {
                        error!(count, "Multiple results for user '{}' found.", username);
                        None
                    }
                }
            }
        };

        Ok(userdn.filter(|dn| !dn.is_empty()))
    }

    async fn resolve_groups(
        &self,
        session: &mut C::Session,
        values: &Substitutions<'_>,
    ) -> Result<ValidationResult> {
        let Some(spec) = self.config.group_search() else {
            return Ok(ValidationResult::ok());
        };

        let groups = SearchExecutor::new(&self.connector)
            .search(Some(session), spec, values)
            .await?;

        if self.config.group_required() && groups.is_empty() {
            info!("User has no groups, but group membership is required");
            return Ok(self.rejection());
        }

        Ok(ValidationResult::ok_with_groups(groups))
    }

    /// Verdict for credentials that were not accepted
    fn rejection(&self) -> ValidationResult {
        if self.config.reject_as_unknown() {
            ValidationResult::unknown()
        } else {
            ValidationResult::reject()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ldap::directory::DirectoryEntry;
    use crate::ldap::testing::FakeDirectory;
    use dirgate_core::ValidationStatus;

    fn validator(yaml: &str, directory: FakeDirectory) -> Validator<FakeDirectory> {
        let config = DirectoryConfig::from_document(yaml).unwrap();
        Validator::with_connector(config, directory)
    }

    const TEMPLATE: &str = r#"
dirgate:
  url: ldap://x
  user_template: "{username}"
"#;

    const TEMPLATE_REJECT: &str = r#"
dirgate:
  url: ldap://x
  user_template: "{username}"
  reject_as_unknown: false
"#;

    const SEARCH: &str = r#"
dirgate:
  url: ldap://x
  reject_as_unknown: false
  user_search:
    base: ""
    filter: "user:{username}"
    attribute_name: dn
"#;

    const GROUPS: &str = r#"
dirgate:
  url: ldap://x
  user_template: "{username}"
  group_search:
    base: ""
    filter: "group:{userdn}"
    attribute_name: cn
"#;

    #[tokio::test]
    async fn test_template_ok() {
        let v = validator(TEMPLATE, FakeDirectory::new().with_user("alice", "secret"));
        assert_eq!(
            v.validate("alice", "secret").await.unwrap(),
            ValidationResult::ok()
        );
    }

    #[tokio::test]
    async fn test_wrong_password_is_unknown_by_default() {
        let v = validator(TEMPLATE, FakeDirectory::new().with_user("alice", "secret"));
        assert_eq!(
            v.validate("alice", "wrong").await.unwrap(),
            ValidationResult::unknown()
        );
    }

    #[tokio::test]
    async fn test_wrong_password_rejected_when_configured() {
        let v = validator(TEMPLATE_REJECT, FakeDirectory::new().with_user("alice", "secret"));
        assert_eq!(
            v.validate("alice", "wrong").await.unwrap(),
            ValidationResult::reject()
        );
    }

    #[tokio::test]
    async fn test_empty_password_never_reaches_directory() {
        let directory = FakeDirectory::new().with_user("alice", "secret");
        let v = validator(TEMPLATE_REJECT, directory);

        for password in ["", "   ", "\t\n"] {
            assert_eq!(
                v.validate("alice", password).await.unwrap(),
                ValidationResult::reject()
            );
        }
        assert!(v.connector().binds().is_empty());

        // same outcome when there is no such user at all
        let v = validator(SEARCH, FakeDirectory::new());
        assert_eq!(
            v.validate("nobody", " ").await.unwrap(),
            ValidationResult::reject()
        );
        assert!(v.connector().searches().is_empty());
    }

    #[tokio::test]
    async fn test_search_without_match_is_unknown() {
        let v = validator(SEARCH, FakeDirectory::new());
        assert_eq!(
            v.validate("bob", "secret").await.unwrap(),
            ValidationResult::unknown()
        );
    }

    #[tokio::test]
    async fn test_search_mode_ok() {
        let directory = FakeDirectory::new()
            .with_user("uid=bob,ou=people", "secret")
            .with_search("user:bob", vec![DirectoryEntry::new("uid=bob,ou=people")]);
        let v = validator(SEARCH, directory);

        assert_eq!(
            v.validate("bob", "secret").await.unwrap(),
            ValidationResult::ok()
        );
        assert_eq!(
            v.validate("bob", "nope").await.unwrap(),
            ValidationResult::reject()
        );
    }

    #[tokio::test]
    async fn test_ambiguous_search_is_unknown() {
        let directory = FakeDirectory::new()
            .with_user("uid=bob,ou=a", "secret")
            .with_user("uid=bob,ou=b", "secret")
            .with_search(
                "user:bob",
                vec![
                    DirectoryEntry::new("uid=bob,ou=a"),
                    DirectoryEntry::new("uid=bob,ou=b"),
                ],
            );
        let v = validator(SEARCH, directory);

        assert_eq!(
            v.validate("bob", "secret").await.unwrap(),
            ValidationResult::unknown()
        );
        // only the anonymous search bind happened
        assert_eq!(v.connector().binds(), vec![BindIdentity::Anonymous]);
    }

    #[tokio::test]
    async fn test_username_is_escaped() {
        let directory = FakeDirectory::new().with_search(
            "user:\\2A\\29\\28uid=\\2A",
            vec![DirectoryEntry::new("uid=evil")],
        );
        let v = validator(SEARCH, directory);

        // resolves through the escaped filter; the bind then fails
        assert_eq!(
            v.validate("*)(uid=*", "pw").await.unwrap(),
            ValidationResult::reject()
        );
        assert_eq!(
            v.connector().searches(),
            vec![(None, "user:\\2A\\29\\28uid=\\2A".to_string())]
        );
    }

    #[tokio::test]
    async fn test_groups_resolved_over_user_session() {
        let directory = FakeDirectory::new()
            .with_user("alice", "secret")
            .with_search(
                "group:alice",
                vec![
                    DirectoryEntry::new("cn=admins,ou=groups").with_attr("cn", &["admins"]),
                    DirectoryEntry::new("cn=staff,ou=groups").with_attr("cn", &["staff"]),
                ],
            );
        let v = validator(GROUPS, directory);

        let result = v.validate("alice", "secret").await.unwrap();
        assert_eq!(result.status, ValidationStatus::Ok);
        assert_eq!(result.groups(), ["admins", "staff"]);
        assert_eq!(
            v.connector().searches(),
            vec![(Some("alice".to_string()), "group:alice".to_string())]
        );
        assert_eq!(v.connector().open_sessions(), 0);
    }

    #[tokio::test]
    async fn test_group_search_with_own_identity() {
        let config = r#"
dirgate:
  url: ldap://x
  user_template: "uid={username},ou=people"
  group_search:
    base: ou=groups
    filter: "group:{username}:{userdn}"
    attribute_name: cn
    userdn: cn=reader
    password: readerpw
"#;
        let directory = FakeDirectory::new()
            .with_user("uid=alice,ou=people", "secret")
            .with_user("cn=reader", "readerpw")
            .with_search(
                "group:alice:uid=alice,ou=people",
                vec![DirectoryEntry::new("cn=admins").with_attr("cn", &["admins"])],
            );
        let v = validator(config, directory);

        let result = v.validate("alice", "secret").await.unwrap();
        assert_eq!(result, ValidationResult::ok_with_groups(vec!["admins".into()]));
        assert_eq!(
            v.connector().binds(),
            vec![
                BindIdentity::simple("uid=alice,ou=people", "secret"),
                BindIdentity::simple("cn=reader", "readerpw"),
            ]
        );
        assert_eq!(v.connector().open_sessions(), 0);
    }

    #[tokio::test]
    async fn test_group_dn_fallback() {
        let config = r#"
dirgate:
  url: ldap://x
  user_template: "{username}"
  group_search:
    base: ""
    filter: "group:{userdn}"
    attribute_name: dn
"#;
        // the server leaves 'dn' out of the returned attributes
        let directory = FakeDirectory::new()
            .with_user("alice", "secret")
            .with_search("group:alice", vec![DirectoryEntry::new("cn=admins,ou=groups")]);
        let v = validator(config, directory);

        assert_eq!(
            v.validate("alice", "secret").await.unwrap().groups(),
            ["cn=admins,ou=groups"]
        );
    }

    #[tokio::test]
    async fn test_group_required() {
        let config = r#"
dirgate:
  url: ldap://x
  user_template: "{username}"
  reject_as_unknown: false
  group_required: true
  group_search:
    base: ""
    filter: "group:{userdn}"
    attribute_name: cn
"#;
        let directory = FakeDirectory::new()
            .with_user("alice", "secret")
            .with_user("bob", "secret")
            .with_search(
                "group:alice",
                vec![DirectoryEntry::new("cn=staff").with_attr("cn", &["staff"])],
            );
        let v = validator(config, directory);

        assert!(v.validate("alice", "secret").await.unwrap().is_ok());
        assert_eq!(
            v.validate("bob", "secret").await.unwrap(),
            ValidationResult::reject()
        );
    }

    #[tokio::test]
    async fn test_groups_empty_without_requirement() {
        let v = validator(GROUPS, FakeDirectory::new().with_user("alice", "secret"));
        assert_eq!(
            v.validate("alice", "secret").await.unwrap(),
            ValidationResult::ok_with_groups(Vec::new())
        );
    }

    #[tokio::test]
    async fn test_login_template_wraps_bind_identity() {
        let config = r#"
dirgate:
  url: ldap://x
  user_template: "uid={username},ou=people"
  login_template: "EXAMPLE\\{username}"
  group_search:
    base: ""
    filter: "group:{userdn}"
    attribute_name: cn
"#;
        let directory = FakeDirectory::new()
            .with_user("EXAMPLE\\alice", "secret")
            .with_search(
                "group:uid=alice,ou=people",
                vec![DirectoryEntry::new("cn=staff").with_attr("cn", &["staff"])],
            );
        let v = validator(config, directory);

        let result = v.validate("alice", "secret").await.unwrap();
        assert_eq!(result.groups(), ["staff"]);
        assert_eq!(
            v.connector().binds(),
            vec![BindIdentity::simple("EXAMPLE\\alice", "secret")]
        );
    }

    #[tokio::test]
    async fn test_unreachable_directory_is_an_error() {
        let v = validator(TEMPLATE, FakeDirectory::new().with_refused_for(Some("alice")));
        let err = v.validate("alice", "secret").await.unwrap_err();
        assert!(!err.is_timeout());
        assert_eq!(err.url(), Some("ldap://fake.example.com"));

        let v = validator(TEMPLATE, FakeDirectory::new().with_timeout_for(Some("alice")));
        assert!(v.validate("alice", "secret").await.unwrap_err().is_timeout());
    }

    #[tokio::test]
    async fn test_user_search_timeout_is_an_error() {
        let v = validator(SEARCH, FakeDirectory::new().with_timeout_for(None));
        assert!(v.validate("bob", "secret").await.unwrap_err().is_timeout());
    }
}

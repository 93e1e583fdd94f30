//! Validation verdict returned to the host

use serde::Serialize;
use std::fmt;

/// Outcome of one credential check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    /// Credentials accepted
    Ok,
    /// The user exists but the credentials were refused
    Reject,
    /// No matching user; the host may try other sources
    Unknown,
}

impl ValidationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationStatus::Ok => "ok",
            ValidationStatus::Reject => "reject",
            ValidationStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verdict of a credential check, serialized as
/// `{"groups": [...], "status": "ok"}`. `groups` is only present for an `ok`
/// verdict with group search configured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<String>>,
    pub status: ValidationStatus,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self {
            groups: None,
            status: ValidationStatus::Ok,
        }
    }

    pub fn ok_with_groups(groups: Vec<String>) -> Self {
        Self {
            groups: Some(groups),
            status: ValidationStatus::Ok,
        }
    }

    pub fn reject() -> Self {
        Self {
            groups: None,
            status: ValidationStatus::Reject,
        }
    }

    pub fn unknown() -> Self {
        Self {
            groups: None,
            status: ValidationStatus::Unknown,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ValidationStatus::Ok
    }

    /// Groups of an `ok` verdict, empty otherwise
    pub fn groups(&self) -> &[String] {
        self.groups.as_deref().unwrap_or_default()
    }
}

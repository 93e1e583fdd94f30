//! Result printing and exit codes

use dirgate_core::{ValidationResult, ValidationStatus};
use std::process::ExitCode;

/// `Result: {...}` line
pub fn result_line(result: &ValidationResult) -> serde_json::Result<String> {
    Ok(format!("Result: {}", serde_json::to_string(result)?))
}

/// Human-readable summary of the verdict
pub fn status_line(username: &str, result: &ValidationResult) -> String {
    match result.status {
        ValidationStatus::Unknown => format!("No user named '{}' found.", username),
        ValidationStatus::Reject => format!("Authentication of user named '{}' failed.", username),
        ValidationStatus::Ok => format!(
            "Authentication successful, the user is member of the following groups: {}",
            result.groups().join(", ")
        ),
    }
}

/// Config could not be loaded or credentials could not be read
pub const EXIT_SETUP: u8 = 1;
/// No configured server answered
pub const EXIT_DIRECTORY: u8 = 3;

pub fn exit_code(status: ValidationStatus) -> ExitCode {
    ExitCode::from(status_code(status))
}

fn status_code(status: ValidationStatus) -> u8 {
    match status {
        ValidationStatus::Ok => 0,
        ValidationStatus::Unknown => 1,
        ValidationStatus::Reject => 2,
    }
}

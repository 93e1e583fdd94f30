//! Dirgate Core Library
//!
//! Configuration model, filter escaping, templates and result types shared by the
//! directory authentication crates. Nothing in here touches the network.

pub mod config;
pub mod error;
pub mod template;
pub mod types;

pub use config::{
    DirectoryConfig, SearchCredentials, SearchScope, SearchSpec, ServerConfig, TlsOptions,
    UserDnMode,
};
pub use error::{ConfigError, Result};
pub use template::{escape_filter_value, Placeholder, Substitutions, Template, TemplateError};
pub use types::{ValidationResult, ValidationStatus};

/// Dirgate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Key under which the directory settings live in a configuration document
pub const CONFIG_NAMESPACE: &str = "dirgate";

/// Default per-connection timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: f64 = 10.0;

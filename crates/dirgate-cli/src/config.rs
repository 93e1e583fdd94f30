//! Configuration file loading for the Dirgate CLI
//!
//! Example config (`ldap.yaml`):
//! ```yaml
//! dirgate:
//!   url: ldap://ldap.example.com
//!   user_template: uid={username},ou=people,dc=example,dc=com
//!   group_search:
//!     base: ou=groups,dc=example,dc=com
//!     filter: (member={userdn})
//!     attribute_name: cn
//! ```

use dirgate_core::{ConfigError, DirectoryConfig};
use std::fs;
use std::path::{Path, PathBuf};

/// Read and validate the `dirgate` section of the file at `path`
pub fn load_config(path: &Path) -> Result<DirectoryConfig, ConfigError> {
    let path = absolute(path);
    if !path.exists() {
        return Err(ConfigError::NotFound(path));
    }

    let content = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
        path: path.clone(),
        source,
    })?;

    DirectoryConfig::from_document(&content)
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

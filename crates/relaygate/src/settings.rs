//! Router settings, loaded from a JSON file.
//!
//! ```json
//! {
//!   "bind_addr": "0.0.0.0:9000",
//!   "private_key": [1, 2, 3, 4],
//!   "users": [{ "name": "alice", "password": "hunter2" }],
//!   "auth": { "handshake_timeout_secs": 30 }
//! }
//! ```
//!
//! Everything but `private_key` has a default.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use relaygate_auth::{AuthConfig, PrivateKey, User, UserList};
use serde::Deserialize;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Errors from loading or validating settings.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The settings file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The settings are not valid JSON or don't match the expected shape.
    #[error("invalid settings: {0}")]
    Parse(#[from] serde_json::Error),

    /// No private key was supplied.
    #[error("a private key is required")]
    MissingPrivateKey,

    /// The supplied private key has no bytes.
    #[error("the private key must not be empty")]
    EmptyPrivateKey,

    /// The same user name appears twice.
    #[error("user {0:?} is listed more than once")]
    DuplicateUser(String),
}

fn default_bind_addr() -> String {
    "127.0.0.1:8080".to_string()
}

/// A user entry as written in the settings file.
#[derive(Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct UserEntry {
    pub name: String,
    pub password: String,
}

impl fmt::Debug for UserEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserEntry")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Everything the router needs at start.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouterSettings {
    /// Address the WebSocket listener binds to.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// The server's private key.
    pub private_key: PrivateKey,

    /// Users allowed to connect.
    #[serde(default)]
    pub users: Vec<UserEntry>,

    /// Handshake settings.
    #[serde(default)]
    pub auth: AuthConfig,
}

impl RouterSettings {
    /// Parses and validates settings from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reads, parses and validates a settings file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        // Zeroize the raw file contents: they hold the key and passwords.
        let json = zeroize::Zeroizing::new(json);
        Self::from_json(&json)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.private_key.is_empty() {
            return Err(ConfigError::EmptyPrivateKey);
        }
        let mut seen = HashSet::new();
        for entry in &self.users {
            if !seen.insert(entry.name.as_str()) {
                return Err(ConfigError::DuplicateUser(entry.name.clone()));
            }
        }
        Ok(())
    }

    /// Builds the user directory from the configured entries.
    pub fn user_list(&self) -> UserList {
        self.users
            .iter()
            .map(|entry| User::new(entry.name.as_str(), &entry.password))
            .collect()
    }
}

//! Admission settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the admission layer.
///
/// Sensible defaults are provided; override only the fields you care about:
///
/// ```
/// use relaygate_auth::AuthConfig;
///
/// let config = AuthConfig {
///     handshake_timeout_secs: 5,
///     ..AuthConfig::default()
/// };
/// assert_eq!(config.max_pending, AuthConfig::default().max_pending);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// How long (in seconds) a peer has to complete the whole handshake.
    /// A handshake that runs out of time ends as `Failed`.
    ///
    /// Default: 60 seconds.
    pub handshake_timeout_secs: u64,

    /// Maximum number of handshakes in flight at once. Channels arriving
    /// while the limit is reached are declined.
    ///
    /// Default: 1024.
    pub max_pending: usize,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            handshake_timeout_secs: 60,
            max_pending: 1024,
        }
    }
}

impl AuthConfig {
    /// The handshake timeout as a [`Duration`].
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }
}

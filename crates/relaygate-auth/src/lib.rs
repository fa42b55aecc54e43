//! Connection admission for relaygate.
//!
//! Every inbound channel has to authenticate before it becomes a session:
//!
//! 1. **Admission** — [`AuthenticatorManager`] takes raw channels and runs
//!    one [`Authenticator`] per channel
//! 2. **Credentials** — the server's [`PrivateKey`] (zeroized on drop) and
//!    the [`UserList`] the peers are checked against
//! 3. **Hand-off** — authenticated channels become [`Session`]s, passed to
//!    the application's [`SessionDelegate`]
//!
//! # How it fits in the stack
//!
//! ```text
//! Router (above)  ← receives sessions through SessionDelegate
//!     ↕
//! Admission (this crate)  ← handshakes, credentials, deferred cleanup
//!     ↕
//! Protocol / Transport / Task (below)  ← messages, channels, TaskRunner
//! ```
//!
//! The [`client`] module implements the other side of the handshake.

mod authenticator;
pub mod client;
mod config;
mod error;
mod handshake;
mod key;
mod manager;
mod proof;
mod session;
mod users;

pub use authenticator::{
    Authenticator, AuthenticatorId, AuthenticatorListener, AuthenticatorState,
};
pub use config::AuthConfig;
pub use error::AuthError;
pub use key::PrivateKey;
pub use manager::AuthenticatorManager;
pub use session::{Session, SessionDelegate};
pub use users::{User, UserList, derive_secret};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Locks `mutex`, carrying on if a previous holder panicked.
///
/// The guarded state is only ever replaced wholesale, so a poisoned lock
/// still holds consistent data.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

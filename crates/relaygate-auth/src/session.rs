//! Sessions: channels that completed the handshake.
//!
//! A [`Session`] is produced by a successful authenticator and moves exactly
//! once, from the authenticator through the manager to the
//! [`SessionDelegate`]. What happens to it afterwards is the delegate's
//! business.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use relaygate_protocol::SessionId;
use relaygate_transport::Channel;

/// Counter for generating unique session IDs.
static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_session_id() -> SessionId {
    SessionId(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed))
}

/// An authenticated, now-trusted channel.
pub struct Session<C: Channel> {
    id: SessionId,
    username: String,
    channel: C,
}

impl<C: Channel> Session<C> {
    pub(crate) fn new(id: SessionId, username: String, channel: C) -> Self {
        Self {
            id,
            username,
            channel,
        }
    }

    /// The session's unique ID, as sent to the peer in `Accept`.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// The user the peer authenticated as.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Borrows the underlying channel.
    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// Gives up the session and returns its channel.
    pub fn into_channel(self) -> C {
        self.channel
    }
}

impl<C: Channel> fmt::Debug for Session<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("channel", &self.channel.id())
            .finish()
    }
}

/// Receives sessions from the [`AuthenticatorManager`](crate::AuthenticatorManager).
///
/// The manager only holds a `Weak` reference to its delegate. The embedding
/// application keeps the delegate alive for as long as it wants sessions;
/// sessions completed after the delegate is gone are dropped.
pub trait SessionDelegate<C: Channel>: Send + Sync + 'static {
    /// Takes ownership of a newly authenticated session.
    ///
    /// Called at most once per successful authenticator, synchronously from
    /// the manager's sweep. Must not block.
    fn on_new_session(&self, session: Session<C>);
}

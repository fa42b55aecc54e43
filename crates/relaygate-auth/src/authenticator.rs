//! Per-channel handshake state machine.
//!
//! ```text
//!            start() ──→ handshake task
//!                              │
//!   [Pending] ─────────────────┼──────────────→ [Success] ── take_session()
//!       │                      │
//!       └──────────────────────┴──────────────→ [Failed]
//! ```
//!
//! An [`Authenticator`] owns its channel from construction on. `start` moves
//! the channel into a spawned handshake task; the task is owned in turn by
//! the authenticator (dropping the authenticator aborts it), so the channel
//! always has exactly one owner. When the task reaches a terminal state it
//! records the outcome and then calls its listener, once.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use relaygate_transport::{Channel, ChannelId};
use tokio::task::JoinHandle;

use crate::{AuthConfig, AuthError, PrivateKey, Session, UserList, handshake, lock};

/// Counter for generating unique authenticator IDs.
static NEXT_AUTHENTICATOR_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies one authenticator in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AuthenticatorId(u64);

impl fmt::Display for AuthenticatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "A-{}", self.0)
    }
}

/// Where an authenticator is in its handshake.
///
/// `Success` and `Failed` are terminal: once reached, the state never
/// changes again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthenticatorState {
    /// The handshake hasn't finished yet.
    Pending,
    /// The peer authenticated; a session is waiting to be taken.
    Success,
    /// The handshake failed, timed out, or the channel broke.
    Failed,
}

impl AuthenticatorState {
    /// Whether this is `Success` or `Failed`.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Notified when an authenticator reaches a terminal state.
///
/// The notification carries no payload; the listener is expected to look at
/// all the authenticators it tracks.
pub trait AuthenticatorListener: Send + Sync + 'static {
    /// Called once per authenticator, right after its state became terminal,
    /// from inside that authenticator's handshake task.
    fn on_authenticator_event(&self);
}

/// State shared between an authenticator and its handshake task.
struct Outcome<C: Channel> {
    state: AuthenticatorState,
    session: Option<Session<C>>,
}

/// Handshake state machine for a single channel.
pub struct Authenticator<C: Channel> {
    id: AuthenticatorId,
    channel_id: ChannelId,
    timeout: Duration,
    /// Held until `start` moves it into the handshake task.
    channel: Option<C>,
    outcome: Arc<Mutex<Outcome<C>>>,
    task: Option<JoinHandle<()>>,
}

impl<C: Channel> Authenticator<C> {
    /// Creates an authenticator that owns `channel`. Nothing happens on the
    /// channel until [`start`](Self::start).
    pub fn new(channel: C, config: &AuthConfig) -> Self {
        Self {
            id: AuthenticatorId(NEXT_AUTHENTICATOR_ID.fetch_add(1, Ordering::Relaxed)),
            channel_id: channel.id(),
            timeout: config.handshake_timeout(),
            channel: Some(channel),
            outcome: Arc::new(Mutex::new(Outcome {
                state: AuthenticatorState::Pending,
                session: None,
            })),
            task: None,
        }
    }

    /// Begins the handshake on a new tokio task.
    ///
    /// `key` and `users` are captured for the whole handshake; replacing
    /// them on the manager later doesn't affect this one. `listener` is
    /// called once the handshake ends, but only if `start` returned `Ok`.
    ///
    /// # Errors
    /// - [`AuthError::ChannelClosed`] — the channel is already disconnected
    /// - [`AuthError::AlreadyStarted`] — `start` was called before
    /// - [`AuthError::NoRuntime`] — not called from within a tokio runtime
    pub fn start(
        &mut self,
        key: Arc<PrivateKey>,
        users: Arc<UserList>,
        listener: Weak<dyn AuthenticatorListener>,
    ) -> Result<(), AuthError> {
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| AuthError::NoRuntime)?;

        let channel = self.channel.take().ok_or(AuthError::AlreadyStarted)?;
        if !channel.is_connected() {
            self.channel = Some(channel);
            return Err(AuthError::ChannelClosed(self.channel_id));
        }

        let task = run_handshake(
            self.id,
            channel,
            key,
            users,
            self.timeout,
            Arc::clone(&self.outcome),
            listener,
        );
        self.task = Some(runtime.spawn(task));

        tracing::debug!(
            authenticator_id = %self.id,
            channel_id = %self.channel_id,
            "handshake started"
        );
        Ok(())
    }

    /// This authenticator's ID.
    pub fn id(&self) -> AuthenticatorId {
        self.id
    }

    /// ID of the channel being authenticated.
    pub fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    /// Current state.
    pub fn state(&self) -> AuthenticatorState {
        lock(&self.outcome).state
    }

    /// Takes the session produced by a successful handshake.
    ///
    /// # Panics
    /// Panics if the state is not `Success` or the session was already
    /// taken. Both mean the caller has lost track of the state machine.
    pub fn take_session(&mut self) -> Session<C> {
        let mut outcome = lock(&self.outcome);
        assert_eq!(
            outcome.state,
            AuthenticatorState::Success,
            "take_session on {} in state {:?}",
            self.id,
            outcome.state
        );
        outcome
            .session
            .take()
            .unwrap_or_else(|| panic!("session of {} already taken", self.id))
    }

    /// Builds an authenticator that already finished, for sweep tests.
    #[cfg(test)]
    pub(crate) fn finished(
        state: AuthenticatorState,
        session: Option<Session<C>>,
        channel: Option<C>,
    ) -> Self {
        let channel_id = session
            .as_ref()
            .map(|s| s.channel().id())
            .or_else(|| channel.as_ref().map(Channel::id))
            .unwrap_or(ChannelId::new(0));
        Self {
            id: AuthenticatorId(NEXT_AUTHENTICATOR_ID.fetch_add(1, Ordering::Relaxed)),
            channel_id,
            timeout: Duration::ZERO,
            channel,
            outcome: Arc::new(Mutex::new(Outcome { state, session })),
            task: None,
        }
    }
}

impl<C: Channel> Drop for Authenticator<C> {
    fn drop(&mut self) {
        // The task owns the channel while it runs; aborting it tears the
        // channel down. A finished task ignores the abort.
        if let Some(task) = self.task.take() {
            task.abort();
        }
        tracing::trace!(authenticator_id = %self.id, "authenticator destroyed");
    }
}

impl<C: Channel> fmt::Debug for Authenticator<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Authenticator")
            .field("id", &self.id)
            .field("channel_id", &self.channel_id)
            .field("state", &self.state())
            .finish()
    }
}

/// Body of the handshake task.
async fn run_handshake<C: Channel>(
    id: AuthenticatorId,
    channel: C,
    key: Arc<PrivateKey>,
    users: Arc<UserList>,
    timeout: Duration,
    outcome: Arc<Mutex<Outcome<C>>>,
    listener: Weak<dyn AuthenticatorListener>,
) {
    let result = tokio::time::timeout(timeout, handshake::serve(&channel, &key, &users))
        .await
        .unwrap_or(Err(AuthError::Timeout));

    // Release our share of the credentials before reporting, so a key
    // replaced on the manager can be zeroized as soon as possible.
    drop(key);
    drop(users);

    let (state, session) = match result {
        Ok(accepted) => {
            tracing::info!(
                authenticator_id = %id,
                channel_id = %channel.id(),
                session_id = %accepted.session_id,
                username = %accepted.username,
                "handshake succeeded"
            );
            let session = Session::new(accepted.session_id, accepted.username, channel);
            (AuthenticatorState::Success, Some(session))
        }
        Err(e) => {
            tracing::info!(
                authenticator_id = %id,
                channel_id = %channel.id(),
                error = %e,
                "handshake failed"
            );
            if let Err(e) = channel.close().await {
                tracing::debug!(authenticator_id = %id, error = %e, "close failed");
            }
            drop(channel);
            (AuthenticatorState::Failed, None)
        }
    };

    {
        let mut slot = lock(&outcome);
        slot.state = state;
        slot.session = session;
    }

    if let Some(listener) = listener.upgrade() {
        listener.on_authenticator_event();
    }
}

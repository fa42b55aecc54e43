//! The authenticator manager: the admission front door.
//!
//! Every raw channel goes through [`AuthenticatorManager::add_channel`]. The
//! manager wraps it in an [`Authenticator`], starts the handshake and keeps
//! the authenticator in its pending set until the handshake ends. Whenever
//! any authenticator finishes, the manager sweeps the whole pending set:
//!
//! ```text
//! add_channel() ──→ Authenticator::start() ──→ pending set
//!                                                  │
//!            on_authenticator_event() ◄── handshake task finishes
//!                        │
//!                        ├── Success ──→ take_session() ──→ delegate
//!                        ├── Failed  ──→ (nothing)
//!                        └── both    ──→ task_runner.delete_soon()
//! ```
//!
//! # Why destruction is deferred
//!
//! The sweep runs inside the handshake task of the authenticator that just
//! finished. Reaped authenticators are handed to the [`TaskRunner`] instead
//! of being dropped in the sweep, so an authenticator is never torn down
//! from within its own completion callback.

use std::sync::{Arc, Mutex, Weak};

use relaygate_task::TaskRunner;
use relaygate_transport::Channel;

use crate::{
    AuthConfig, Authenticator, AuthenticatorListener, AuthenticatorState, PrivateKey,
    SessionDelegate, UserList, lock,
};

/// Mutable manager state, serialised by one mutex.
struct ManagerState<C: Channel> {
    private_key: Option<Arc<PrivateKey>>,
    user_list: Option<Arc<UserList>>,
    /// In-flight authenticators, in the order their channels arrived.
    pending: Vec<Authenticator<C>>,
}

/// Admits channels by running one handshake per channel.
///
/// Always lives in an [`Arc`]: the manager registers itself, through a
/// `Weak`, as the listener of every authenticator it starts.
///
/// # Example
///
/// ```
/// use std::sync::{Arc, Mutex, Weak};
/// use relaygate_auth::{
///     AuthConfig, AuthenticatorManager, PrivateKey, Session, SessionDelegate, UserList,
/// };
/// use relaygate_task::TaskRunner;
/// use relaygate_transport::MemoryChannel;
///
/// struct Collect(Mutex<Vec<Session<MemoryChannel>>>);
///
/// impl SessionDelegate<MemoryChannel> for Collect {
///     fn on_new_session(&self, session: Session<MemoryChannel>) {
///         self.0.lock().unwrap().push(session);
///     }
/// }
///
/// let delegate = Arc::new(Collect(Mutex::new(Vec::new())));
/// let weak: Weak<dyn SessionDelegate<MemoryChannel>> = Arc::downgrade(&delegate) as _;
/// let (runner, _queue) = TaskRunner::new();
///
/// let manager = AuthenticatorManager::new(runner, weak, AuthConfig::default());
/// manager.configure(PrivateKey::generate(), Arc::new(UserList::new()));
/// assert_eq!(manager.pending_count(), 0);
/// ```
pub struct AuthenticatorManager<C: Channel> {
    config: AuthConfig,
    task_runner: TaskRunner,
    delegate: Weak<dyn SessionDelegate<C>>,
    /// Ourselves, handed to every authenticator as its listener.
    listener: Weak<dyn AuthenticatorListener>,
    state: Mutex<ManagerState<C>>,
}

impl<C: Channel> AuthenticatorManager<C> {
    /// Creates an unconfigured manager.
    ///
    /// The delegate is held weakly; the caller keeps it alive for as long as
    /// it wants to receive sessions. [`configure`](Self::configure) must be
    /// called before the first channel is added.
    pub fn new(
        task_runner: TaskRunner,
        delegate: Weak<dyn SessionDelegate<C>>,
        config: AuthConfig,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me: &Weak<Self>| {
            let listener: Weak<dyn AuthenticatorListener> = me.clone();
            Self {
                config,
                task_runner,
                delegate,
                listener,
                state: Mutex::new(ManagerState {
                    private_key: None,
                    user_list: None,
                    pending: Vec::new(),
                }),
            }
        })
    }

    /// Installs the server key and the user directory.
    pub fn configure(&self, private_key: PrivateKey, users: Arc<UserList>) {
        self.set_private_key(private_key);
        self.set_user_list(users);
    }

    /// Installs or replaces the server's private key.
    ///
    /// Handshakes already running keep the key they started with. The
    /// replaced key is zeroized once the last of them finishes.
    ///
    /// # Panics
    /// Panics if `key` is empty.
    pub fn set_private_key(&self, key: PrivateKey) {
        assert!(!key.is_empty(), "private key must not be empty");
        let previous = lock(&self.state).private_key.replace(Arc::new(key));
        if previous.is_some() {
            tracing::info!("private key replaced");
        }
    }

    /// Installs or replaces the user directory.
    pub fn set_user_list(&self, users: Arc<UserList>) {
        tracing::debug!(users = users.len(), "user list installed");
        lock(&self.state).user_list = Some(users);
    }

    /// Takes ownership of a new, untrusted channel and starts authenticating
    /// it.
    ///
    /// Channels that can't be started (already closed, no runtime) or that
    /// arrive while [`AuthConfig::max_pending`] handshakes are in flight are
    /// declined: the channel is dropped and nothing else happens.
    ///
    /// # Panics
    /// Panics if the private key or the user list has never been set.
    pub fn add_channel(&self, channel: C) {
        let channel_id = channel.id();
        let mut state = lock(&self.state);

        let (Some(key), Some(users)) = (&state.private_key, &state.user_list) else {
            panic!("add_channel({channel_id}) on an unconfigured AuthenticatorManager");
        };
        let (key, users) = (Arc::clone(key), Arc::clone(users));

        if state.pending.len() >= self.config.max_pending {
            tracing::warn!(
                %channel_id,
                max_pending = self.config.max_pending,
                "too many handshakes in flight, declining channel"
            );
            return;
        }

        let mut authenticator = Authenticator::new(channel, &self.config);
        // Still holding the lock: a handshake that finishes right away can't
        // sweep before its authenticator is in the pending set.
        match authenticator.start(key, users, self.listener.clone()) {
            Ok(()) => state.pending.push(authenticator),
            Err(e) => {
                tracing::debug!(%channel_id, error = %e, "channel declined");
            }
        }
    }

    /// Number of handshakes in flight.
    pub fn pending_count(&self) -> usize {
        lock(&self.state).pending.len()
    }
}

impl<C: Channel> AuthenticatorListener for AuthenticatorManager<C> {
    fn on_authenticator_event(&self) {
        let finished: Vec<Authenticator<C>> = {
            let mut state = lock(&self.state);
            let (finished, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut state.pending)
                .into_iter()
                .partition(|a| a.state().is_terminal());
            state.pending = pending;
            finished
        };

        for mut authenticator in finished {
            match authenticator.state() {
                AuthenticatorState::Success => {
                    let session = authenticator.take_session();
                    match self.delegate.upgrade() {
                        Some(delegate) => delegate.on_new_session(session),
                        None => tracing::warn!(
                            session_id = %session.id(),
                            "session delegate is gone, dropping session"
                        ),
                    }
                }
                AuthenticatorState::Failed => {}
                AuthenticatorState::Pending => {
                    unreachable!("{} swept while pending", authenticator.id())
                }
            }
            self.task_runner.delete_soon(authenticator);
        }
    }
}

impl<C: Channel> Drop for AuthenticatorManager<C> {
    fn drop(&mut self) {
        let state = lock(&self.state);
        tracing::debug!(
            pending = state.pending.len(),
            "authenticator manager shutting down"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Session;
    use relaygate_protocol::SessionId;
    use relaygate_transport::memory::{self, MemoryChannel};

    #[derive(Default)]
    struct Recorder {
        sessions: Mutex<Vec<Session<MemoryChannel>>>,
    }

    impl SessionDelegate<MemoryChannel> for Recorder {
        fn on_new_session(&self, session: Session<MemoryChannel>) {
            self.sessions.lock().unwrap().push(session);
        }
    }

    impl Recorder {
        fn usernames(&self) -> Vec<String> {
            self.sessions
                .lock()
                .unwrap()
                .iter()
                .map(|s| s.username().to_string())
                .collect()
        }
    }

    fn setup() -> (
        Arc<AuthenticatorManager<MemoryChannel>>,
        Arc<Recorder>,
        relaygate_task::TaskQueue,
    ) {
        let recorder = Arc::new(Recorder::default());
        let weak: Weak<dyn SessionDelegate<MemoryChannel>> = Arc::downgrade(&recorder) as _;
        let (runner, queue) = TaskRunner::new();
        let manager = AuthenticatorManager::new(runner, weak, AuthConfig::default());
        (manager, recorder, queue)
    }

    fn succeeded(name: &str) -> (Authenticator<MemoryChannel>, MemoryChannel) {
        let (chan, peer) = memory::pair();
        let session = Session::new(SessionId(0), name.to_string(), chan);
        let auth = Authenticator::finished(AuthenticatorState::Success, Some(session), None);
        (auth, peer)
    }

    fn failed() -> (Authenticator<MemoryChannel>, MemoryChannel) {
        let (chan, peer) = memory::pair();
        let auth = Authenticator::finished(AuthenticatorState::Failed, None, Some(chan));
        (auth, peer)
    }

    fn pending() -> (Authenticator<MemoryChannel>, MemoryChannel) {
        let (chan, peer) = memory::pair();
        let auth = Authenticator::finished(AuthenticatorState::Pending, None, Some(chan));
        (auth, peer)
    }

    fn push(manager: &AuthenticatorManager<MemoryChannel>, auth: Authenticator<MemoryChannel>) {
        lock(&manager.state).pending.push(auth);
    }

    // =========================================================================
    // Sweep
    // =========================================================================

    #[test]
    fn test_sweep_forwards_sessions_in_pending_order() {
        let (manager, recorder, _queue) = setup();
        let (first, _p1) = succeeded("first");
        let (second, _p2) = pending();
        let (third, _p3) = succeeded("third");
        push(&manager, first);
        push(&manager, second);
        push(&manager, third);

        manager.on_authenticator_event();

        assert_eq!(recorder.usernames(), vec!["first", "third"]);
        assert_eq!(manager.pending_count(), 1);
    }

    #[test]
    fn test_sweep_leaves_only_pending_entries() {
        let (manager, recorder, _queue) = setup();
        let (a, _pa) = pending();
        let (b, _pb) = failed();
        let (c, _pc) = pending();
        let (d, _pd) = succeeded("d");
        let (a_id, c_id) = (a.id(), c.id());
        push(&manager, a);
        push(&manager, b);
        push(&manager, c);
        push(&manager, d);

        manager.on_authenticator_event();

        let state = lock(&manager.state);
        let remaining: Vec<_> = state.pending.iter().map(|a| a.id()).collect();
        assert_eq!(remaining, vec![a_id, c_id]);
        assert!(state.pending.iter().all(|a| !a.state().is_terminal()));
        drop(state);
        assert_eq!(recorder.usernames(), vec!["d"]);
    }

    #[test]
    fn test_sweep_defers_destruction_to_task_queue() {
        let (manager, _recorder, mut queue) = setup();
        let (auth, peer) = failed();
        push(&manager, auth);

        manager.on_authenticator_event();

        assert_eq!(manager.pending_count(), 0);
        assert!(peer.is_connected(), "failed channel dropped inside the sweep");
        assert_eq!(queue.run_until_idle(), 1);
        assert!(!peer.is_connected());
    }

    #[tokio::test]
    async fn test_sweep_with_closed_queue_still_defers_destruction() {
        let (manager, _recorder, queue) = setup();
        drop(queue);
        let (auth, peer) = failed();
        push(&manager, auth);

        manager.on_authenticator_event();

        assert_eq!(manager.pending_count(), 0);
        assert!(peer.is_connected(), "failed channel dropped inside the sweep");
        for _ in 0..10 {
            if !peer.is_connected() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(!peer.is_connected());
    }

    #[test]
    fn test_sweep_with_closed_queue_and_no_runtime_parks_until_manager_drops() {
        let (manager, _recorder, queue) = setup();
        drop(queue);
        let (auth, peer) = failed();
        push(&manager, auth);

        manager.on_authenticator_event();
        assert!(peer.is_connected(), "failed channel dropped inside the sweep");

        drop(manager);
        assert!(!peer.is_connected());
    }

    #[test]
    fn test_sweep_twice_forwards_session_once() {
        let (manager, recorder, mut queue) = setup();
        let (auth, _peer) = succeeded("alice");
        push(&manager, auth);

        manager.on_authenticator_event();
        manager.on_authenticator_event();
        queue.run_until_idle();

        assert_eq!(recorder.usernames(), vec!["alice"]);
    }

    #[test]
    fn test_sweep_without_delegate_drops_session() {
        let (manager, recorder, mut queue) = setup();
        let (auth, peer) = succeeded("alice");
        push(&manager, auth);
        drop(recorder);

        manager.on_authenticator_event();
        queue.run_until_idle();

        assert_eq!(manager.pending_count(), 0);
        assert!(!peer.is_connected());
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    #[test]
    #[should_panic(expected = "unconfigured")]
    fn test_add_channel_before_configure_panics() {
        let (manager, _recorder, _queue) = setup();
        let (chan, _peer) = memory::pair();

        manager.add_channel(chan);
    }

    #[test]
    #[should_panic(expected = "unconfigured")]
    fn test_add_channel_without_user_list_panics() {
        let (manager, _recorder, _queue) = setup();
        manager.set_private_key(PrivateKey::generate());
        let (chan, _peer) = memory::pair();

        manager.add_channel(chan);
    }

    #[test]
    #[should_panic(expected = "must not be empty")]
    fn test_set_private_key_empty_panics() {
        let (manager, _recorder, _queue) = setup();
        manager.set_private_key(PrivateKey::new(Vec::new()));
    }

    #[test]
    fn test_set_private_key_replacement_releases_old_key() {
        let (manager, _recorder, _queue) = setup();
        manager.set_private_key(PrivateKey::new(vec![1; 32]));
        let old = Arc::downgrade(lock(&manager.state).private_key.as_ref().unwrap());

        manager.set_private_key(PrivateKey::new(vec![2; 32]));

        assert!(old.upgrade().is_none());
    }

    #[test]
    fn test_drop_manager_releases_key() {
        let (manager, _recorder, _queue) = setup();
        manager.configure(PrivateKey::generate(), Arc::new(UserList::new()));
        let key = Arc::downgrade(lock(&manager.state).private_key.as_ref().unwrap());

        drop(manager);

        assert!(key.upgrade().is_none());
    }

    #[tokio::test]
    async fn test_add_channel_closed_channel_is_declined() {
        let (manager, _recorder, _queue) = setup();
        manager.configure(PrivateKey::generate(), Arc::new(UserList::new()));
        let (chan, peer) = memory::pair();
        peer.close().await.unwrap();

        manager.add_channel(chan);

        assert_eq!(manager.pending_count(), 0);
    }
}

//! The router: where admitted sessions end up.
//!
//! [`Router`] is the [`SessionDelegate`] of the authenticator manager. It
//! keeps every admitted session in a list and watches its channel. When a
//! channel goes away the session is marked finished and the router sweeps
//! its list, the same way the manager sweeps authenticators: finished
//! entries are unlinked and handed to the [`TaskRunner`] to be dropped later.
//!
//! What a session does once routed is out of scope here; inbound messages
//! are read and discarded so that closes are noticed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use relaygate_auth::{Session, SessionDelegate};
use relaygate_protocol::SessionId;
use relaygate_task::TaskRunner;
use relaygate_transport::Channel;
use tokio::task::JoinHandle;

/// A session held by the router, plus the task watching its channel.
struct RoutedSession<C: Channel> {
    session: Arc<Session<C>>,
    finished: Arc<AtomicBool>,
    watcher: JoinHandle<()>,
}

impl<C: Channel> Drop for RoutedSession<C> {
    fn drop(&mut self) {
        self.watcher.abort();
        tracing::debug!(session_id = %self.session.id(), "session destroyed");
    }
}

/// Holds admitted sessions until their channels close.
pub struct Router<C: Channel> {
    task_runner: TaskRunner,
    me: Weak<Self>,
    sessions: Mutex<Vec<RoutedSession<C>>>,
}

impl<C: Channel> Router<C> {
    /// Creates an empty router.
    pub fn new(task_runner: TaskRunner) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            task_runner,
            me: me.clone(),
            sessions: Mutex::new(Vec::new()),
        })
    }

    /// Number of sessions currently held.
    pub fn session_count(&self) -> usize {
        self.lock().len()
    }

    /// IDs of the held sessions, oldest first.
    pub fn session_ids(&self) -> Vec<SessionId> {
        self.lock().iter().map(|r| r.session.id()).collect()
    }

    /// Unlinks every finished session and schedules it for destruction.
    fn on_session_finished(&self) {
        let finished: Vec<RoutedSession<C>> = {
            let mut sessions = self.lock();
            let (finished, live): (Vec<_>, Vec<_>) = std::mem::take(&mut *sessions)
                .into_iter()
                .partition(|r| r.finished.load(Ordering::Acquire));
            *sessions = live;
            finished
        };

        for routed in finished {
            tracing::info!(
                session_id = %routed.session.id(),
                username = %routed.session.username(),
                "session ended"
            );
            self.task_runner.delete_soon(routed);
        }
    }

    /// Locks the session list, carrying on if a previous holder panicked.
    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<RoutedSession<C>>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<C: Channel> SessionDelegate<C> for Router<C> {
    fn on_new_session(&self, session: Session<C>) {
        tracing::info!(
            session_id = %session.id(),
            username = %session.username(),
            channel_id = %session.channel().id(),
            "session admitted"
        );

        let session = Arc::new(session);
        let finished = Arc::new(AtomicBool::new(false));
        let watcher = tokio::spawn(watch(
            Arc::clone(&session),
            Arc::clone(&finished),
            self.me.clone(),
        ));

        self.lock().push(RoutedSession {
            session,
            finished,
            watcher,
        });
    }
}

/// Reads from the session's channel until it closes, then reports back.
async fn watch<C: Channel>(
    session: Arc<Session<C>>,
    finished: Arc<AtomicBool>,
    router: Weak<Router<C>>,
) {
    loop {
        match session.channel().recv().await {
            Ok(Some(data)) => {
                tracing::trace!(session_id = %session.id(), len = data.len(), "discarding message");
            }
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(session_id = %session.id(), error = %e, "session channel failed");
                break;
            }
        }
    }

    finished.store(true, Ordering::Release);
    drop(session);
    if let Some(router) = router.upgrade() {
        router.on_session_finished();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use relaygate_auth::{AuthConfig, AuthenticatorManager, PrivateKey, User, UserList, client};
    use relaygate_transport::memory::{self, MemoryChannel};

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    /// Admits one session for `name` through a real manager and returns
    /// the client end of its channel.
    async fn admit(
        manager: &AuthenticatorManager<MemoryChannel>,
        key: &PrivateKey,
        name: &str,
    ) -> MemoryChannel {
        let (server_end, peer) = memory::pair();
        manager.add_channel(server_end);
        client::handshake(&peer, name, "pw", key).await.unwrap();
        peer
    }

    fn setup() -> (
        Arc<Router<MemoryChannel>>,
        Arc<AuthenticatorManager<MemoryChannel>>,
        relaygate_task::TaskQueue,
    ) {
        let (runner, queue) = TaskRunner::new();
        let router = Router::new(runner.clone());
        let delegate: Weak<dyn SessionDelegate<MemoryChannel>> = Arc::downgrade(&router) as _;
        let manager = AuthenticatorManager::new(runner, delegate, AuthConfig::default());
        let users: UserList = [User::new("alice", "pw"), User::new("bob", "pw")]
            .into_iter()
            .collect();
        manager.configure(PrivateKey::new(vec![5; 32]), Arc::new(users));
        (router, manager, queue)
    }

    #[tokio::test]
    async fn test_on_new_session_stores_session() {
        let (router, manager, _queue) = setup();
        let key = PrivateKey::new(vec![5; 32]);

        let _alice = admit(&manager, &key, "alice").await;
        let r = Arc::clone(&router);
        wait_until(|| r.session_count() == 1).await;

        let _bob = admit(&manager, &key, "bob").await;
        let r = Arc::clone(&router);
        wait_until(|| r.session_count() == 2).await;
    }

    #[tokio::test]
    async fn test_closed_session_is_swept_and_deferred() {
        let (router, manager, mut queue) = setup();
        let key = PrivateKey::new(vec![5; 32]);
        let alice = admit(&manager, &key, "alice").await;
        let _bob = admit(&manager, &key, "bob").await;
        let r = Arc::clone(&router);
        wait_until(|| r.session_count() == 2).await;
        let bob_id = router.session_ids()[1];
        queue.run_until_idle();

        alice.close().await.unwrap();
        let r = Arc::clone(&router);
        wait_until(|| r.session_count() == 1).await;

        assert_eq!(router.session_ids(), vec![bob_id]);
        assert_eq!(queue.run_until_idle(), 1);
    }

    #[tokio::test]
    async fn test_drop_router_releases_sessions() {
        let (router, manager, _queue) = setup();
        let key = PrivateKey::new(vec![5; 32]);
        let alice = admit(&manager, &key, "alice").await;
        let r = Arc::clone(&router);
        wait_until(|| r.session_count() == 1).await;
        drop(r);

        drop(router);

        let closed = tokio::time::timeout(Duration::from_secs(5), alice.recv())
            .await
            .expect("peer should see the session go away")
            .unwrap();
        assert!(closed.is_none());
    }
}

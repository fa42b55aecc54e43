//! `RelaygateServer` builder and accept loop.
//!
//! This is the entry point for running a relaygate front door. It ties the
//! layers together: transport → admission → router.

use std::future::Future;
use std::sync::{Arc, Weak};

use relaygate_auth::{AuthConfig, AuthenticatorManager, PrivateKey, SessionDelegate, UserList};
use relaygate_task::TaskRunner;
use relaygate_transport::{Transport, TransportError, WebSocketChannel, WebSocketTransport};

use crate::router::Router;
use crate::settings::{ConfigError, RouterSettings};
use crate::RelaygateError;

/// Builder for configuring and starting a relaygate server.
///
/// # Example
///
/// ```rust,no_run
/// use relaygate::prelude::*;
///
/// # async fn start() -> Result<(), RelaygateError> {
/// let server = RelaygateServer::builder()
///     .bind("0.0.0.0:9000")
///     .private_key(PrivateKey::generate())
///     .users([User::new("alice", "hunter2")].into_iter().collect())
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct RelaygateServerBuilder {
    bind_addr: String,
    auth_config: AuthConfig,
    private_key: Option<PrivateKey>,
    users: UserList,
}

impl RelaygateServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            auth_config: AuthConfig::default(),
            private_key: None,
            users: UserList::new(),
        }
    }

    /// Takes every setting from a loaded [`RouterSettings`].
    pub fn settings(self, settings: RouterSettings) -> Self {
        let users = settings.user_list();
        let RouterSettings {
            bind_addr,
            private_key,
            auth,
            ..
        } = settings;
        self.bind(&bind_addr)
            .private_key(private_key)
            .users(users)
            .auth_config(auth)
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the handshake configuration.
    pub fn auth_config(mut self, config: AuthConfig) -> Self {
        self.auth_config = config;
        self
    }

    /// Sets the server's private key. Required.
    pub fn private_key(mut self, key: PrivateKey) -> Self {
        self.private_key = Some(key);
        self
    }

    /// Sets the users allowed to connect.
    pub fn users(mut self, users: UserList) -> Self {
        self.users = users;
        self
    }

    /// Binds the listener and wires up admission and routing.
    ///
    /// # Errors
    /// - [`ConfigError::MissingPrivateKey`] / [`ConfigError::EmptyPrivateKey`]
    /// - [`TransportError::AcceptFailed`] if the address can't be bound
    pub async fn build(self) -> Result<RelaygateServer, RelaygateError> {
        let private_key = self.private_key.ok_or(ConfigError::MissingPrivateKey)?;
        if private_key.is_empty() {
            return Err(ConfigError::EmptyPrivateKey.into());
        }

        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        // The worker is detached. It exits once the manager and router, the
        // last runner holders, are gone.
        let (task_runner, _worker) = TaskRunner::spawn();
        let router = Router::new(task_runner.clone());
        let delegate: Weak<dyn SessionDelegate<WebSocketChannel>> =
            Arc::downgrade(&router) as _;
        let manager = AuthenticatorManager::new(task_runner, delegate, self.auth_config);
        manager.configure(private_key, Arc::new(self.users));

        Ok(RelaygateServer {
            transport,
            manager,
            router,
        })
    }
}

impl Default for RelaygateServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A relaygate server, bound and ready to accept.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct RelaygateServer {
    transport: WebSocketTransport,
    manager: Arc<AuthenticatorManager<WebSocketChannel>>,
    router: Arc<Router<WebSocketChannel>>,
}

impl RelaygateServer {
    /// Creates a new builder.
    pub fn builder() -> RelaygateServerBuilder {
        RelaygateServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// The admission manager, for introspection.
    pub fn manager(&self) -> Arc<AuthenticatorManager<WebSocketChannel>> {
        Arc::clone(&self.manager)
    }

    /// The router holding admitted sessions.
    pub fn router(&self) -> Arc<Router<WebSocketChannel>> {
        Arc::clone(&self.router)
    }

    /// Runs the accept loop until the process is terminated.
    pub async fn run(self) -> Result<(), RelaygateError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the accept loop until `shutdown` completes.
    ///
    /// Every accepted channel goes to the authenticator manager. On
    /// shutdown the listener is closed; pending handshakes and admitted
    /// sessions are torn down when the server is dropped.
    pub async fn run_until(
        mut self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), RelaygateError> {
        tracing::info!(addr = ?self.transport.local_addr().ok(), "relaygate server running");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                accepted = self.transport.accept() => match accepted {
                    Ok(channel) => self.manager.add_channel(channel),
                    Err(TransportError::Shutdown) => break,
                    Err(e) => tracing::error!(error = %e, "accept failed"),
                },
            }
        }

        self.transport.shutdown().await?;
        tracing::info!(
            pending = self.manager.pending_count(),
            sessions = self.router.session_count(),
            "relaygate server stopped"
        );
        Ok(())
    }
}

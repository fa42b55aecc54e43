//! # relaygate
//!
//! Authenticated front door for relay routers.
//!
//! Every inbound WebSocket connection runs a mutual challenge/response
//! handshake before it becomes a routed session. The server proves it
//! holds its private key; the peer proves it knows a user's password.
//! Failed and timed-out handshakes are torn down without ever reaching
//! the router.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use relaygate::prelude::*;
//!
//! # async fn start() -> Result<(), RelaygateError> {
//! let settings = RouterSettings::load("relaygate.json")?;
//! let server = RelaygateServer::builder().settings(settings).build().await?;
//! server.run().await
//! # }
//! ```

mod error;
mod router;
mod server;
mod settings;

pub use error::RelaygateError;
pub use router::Router;
pub use server::{RelaygateServer, RelaygateServerBuilder};
pub use settings::{ConfigError, RouterSettings, UserEntry};

/// Common imports for running a relaygate server.
pub mod prelude {
    pub use crate::{
        ConfigError, RelaygateError, RelaygateServer, RelaygateServerBuilder, Router,
        RouterSettings,
    };
    pub use relaygate_auth::{AuthConfig, PrivateKey, Session, User, UserList, client};
    pub use relaygate_protocol::SessionId;
    pub use relaygate_transport::{Channel, WebSocketChannel};
}

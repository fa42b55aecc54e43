//! Handshake wire protocol for relaygate.
//!
//! This crate defines what a connecting peer and the admission layer say to
//! each other before a channel is trusted:
//!
//! - **Types** ([`ClientMessage`], [`ServerMessage`], [`RejectReason`]) —
//!   the handshake messages.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how those messages are
//!   converted to/from bytes.
//! - **Errors** ([`ProtocolError`]) — what can go wrong during
//!   encoding/decoding.
//!
//! ```text
//! Transport (bytes) → Protocol (handshake messages) → Auth (sessions)
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    ClientMessage, NONCE_LEN, PROTOCOL_VERSION, RejectReason, ServerMessage,
    SessionId,
};

//! Unified error type for relaygate.

use relaygate_auth::AuthError;
use relaygate_protocol::ProtocolError;
use relaygate_transport::TransportError;

use crate::settings::ConfigError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant generates `From` impls, so the
/// `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum RelaygateError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// An admission error (handshake start, credentials).
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The router settings are missing or malformed.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ChannelClosed("gone".into());
        let relaygate_err: RelaygateError = err.into();
        assert!(matches!(relaygate_err, RelaygateError::Transport(_)));
        assert!(relaygate_err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::InvalidMessage("bad".into());
        let relaygate_err: RelaygateError = err.into();
        assert!(matches!(relaygate_err, RelaygateError::Protocol(_)));
    }

    #[test]
    fn test_from_auth_error() {
        let err = AuthError::Timeout;
        let relaygate_err: RelaygateError = err.into();
        assert!(matches!(relaygate_err, RelaygateError::Auth(_)));
        assert_eq!(relaygate_err.to_string(), "handshake timed out");
    }

    #[test]
    fn test_from_config_error() {
        let err = ConfigError::MissingPrivateKey;
        let relaygate_err: RelaygateError = err.into();
        assert!(matches!(relaygate_err, RelaygateError::Config(_)));
    }
}

//! HMAC proofs exchanged during the handshake.
//!
//! - The server proves it holds the private key:
//!   `HMAC(key, "relaygate-server" || client_nonce || server_nonce || username)`.
//! - The client proves it knows the user's credential:
//!   `HMAC(user_secret, "relaygate-client" || server_nonce || client_nonce)`.
//!
//! Distinct labels keep a proof from one direction from being replayed in
//! the other. Verification goes through `Mac::verify_slice`, which compares
//! in constant time.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::{AuthError, PrivateKey};

type HmacSha256 = Hmac<Sha256>;

const SERVER_LABEL: &[u8] = b"relaygate-server";
const CLIENT_LABEL: &[u8] = b"relaygate-client";

fn server_mac(
    key: &PrivateKey,
    client_nonce: &[u8],
    server_nonce: &[u8],
    username: &str,
) -> Result<HmacSha256, AuthError> {
    // Keying leaves unzeroized pad blocks on the stack (see `key` docs).
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key.as_bytes())
        .map_err(|_| AuthError::InvalidKey)?;
    mac.update(SERVER_LABEL);
    mac.update(client_nonce);
    mac.update(server_nonce);
    mac.update(username.as_bytes());
    Ok(mac)
}

fn client_mac(
    user_secret: &[u8],
    server_nonce: &[u8],
    client_nonce: &[u8],
) -> Result<HmacSha256, AuthError> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(user_secret)
        .map_err(|_| AuthError::InvalidKey)?;
    mac.update(CLIENT_LABEL);
    mac.update(server_nonce);
    mac.update(client_nonce);
    Ok(mac)
}

pub(crate) fn server_key_proof(
    key: &PrivateKey,
    client_nonce: &[u8],
    server_nonce: &[u8],
    username: &str,
) -> Result<Vec<u8>, AuthError> {
    let mac = server_mac(key, client_nonce, server_nonce, username)?;
    Ok(mac.finalize().into_bytes().to_vec())
}

pub(crate) fn verify_server_key_proof(
    key: &PrivateKey,
    client_nonce: &[u8],
    server_nonce: &[u8],
    username: &str,
    proof: &[u8],
) -> Result<bool, AuthError> {
    let mac = server_mac(key, client_nonce, server_nonce, username)?;
    Ok(mac.verify_slice(proof).is_ok())
}

pub(crate) fn client_proof(
    user_secret: &[u8],
    server_nonce: &[u8],
    client_nonce: &[u8],
) -> Result<Vec<u8>, AuthError> {
    let mac = client_mac(user_secret, server_nonce, client_nonce)?;
    Ok(mac.finalize().into_bytes().to_vec())
}

pub(crate) fn verify_client_proof(
    user_secret: &[u8],
    server_nonce: &[u8],
    client_nonce: &[u8],
    proof: &[u8],
) -> Result<bool, AuthError> {
    let mac = client_mac(user_secret, server_nonce, client_nonce)?;
    Ok(mac.verify_slice(proof).is_ok())
}

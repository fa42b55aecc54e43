//! The server's long-lived private key.
//!
//! # Security
//!
//! - The bytes are zeroized when the key is dropped, on every path: a
//!   replaced key, a dropped manager, a panic unwinding through the owner.
//! - Deserializing never frees a buffer holding key bytes without zeroizing
//!   it first; see [`PrivateKey`]'s `Deserialize` impl.
//! - No `Clone`: a key is shared through `Arc` so the bytes exist once.
//! - `Debug` prints the length only.
//!
//! Not covered: `hmac` 0.12 derives its padded key blocks on the stack
//! while keying a MAC and doesn't zeroize them, so key-derived bytes can
//! outlive a handshake in stack memory until overwritten.

use std::fmt;

use rand::RngCore;
use serde::de::{self, Deserialize, Deserializer, SeqAccess, Visitor};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Length of keys produced by [`PrivateKey::generate`].
pub const GENERATED_KEY_LEN: usize = 32;

/// Opaque secret bytes proving the server's identity to connecting peers.
///
/// Deserializes from a sequence of bytes, e.g. a JSON array of integers.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct PrivateKey(Vec<u8>);

impl PrivateKey {
    /// Wraps `bytes` without copying them.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Generates a fresh random key.
    pub fn generate() -> Self {
        let mut bytes = vec![0u8; GENERATED_KEY_LEN];
        rand::rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Borrows the key bytes.
    ///
    /// Don't store the returned slice or copy it into an unprotected buffer.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Length of the key in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the key holds no bytes (never valid for use).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for PrivateKey {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

/// Upper bound on trusting a deserializer's length hint.
const MAX_PREALLOC: usize = 4096;

impl<'de> Deserialize<'de> for PrivateKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_seq(KeyVisitor)
    }
}

struct KeyVisitor;

impl<'de> Visitor<'de> for KeyVisitor {
    type Value = PrivateKey;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a sequence of key bytes")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<PrivateKey, A::Error> {
        let capacity = seq.size_hint().unwrap_or(0).clamp(GENERATED_KEY_LEN, MAX_PREALLOC);
        let mut bytes = Zeroizing::new(Vec::with_capacity(capacity));

        while let Some(byte) = seq.next_element::<u8>()? {
            // Grow by hand: `Vec::push` would free the old buffer unzeroized.
            if bytes.len() == bytes.capacity() {
                let mut grown = Zeroizing::new(Vec::with_capacity(bytes.capacity() * 2));
                grown.extend_from_slice(&bytes);
                bytes = grown;
            }
            bytes.push(byte);
        }

        Ok(PrivateKey(std::mem::take(&mut *bytes)))
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<PrivateKey, E> {
        Ok(PrivateKey(v.to_vec()))
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateKey([REDACTED; {} bytes])", self.0.len())
    }
}

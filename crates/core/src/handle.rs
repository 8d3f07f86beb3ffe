//! # Handle Module
//!
//! Opaque handles stand in for coprocessor ciphertexts. A handle is a
//! reversible, randomised encoding of a `u64`; it is NOT encryption and gives
//! no confidentiality guarantee.
//!
//! Layout: `0x` + 16 hex nonce + 16 hex payload, where
//! `payload = value XOR mask(nonce)`.
//!
//! `decode` is total: anything that does not match the layout decodes to 0.
//! Risk classification depends on that (0 classifies as `high`).

use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Prefix every well-formed handle starts with.
pub const HANDLE_PREFIX: &str = "0x";

const NONCE_HEX_LEN: usize = 16;
const PAYLOAD_HEX_LEN: usize = 16;
const MASK_DOMAIN: &[u8] = b"veilcredit-handle";

/// An opaque reference to an encoded value, persisted verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Handle(String);

impl Handle {
    /// Wrap a raw string without validating it.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Decode the underlying value (0 when malformed).
    pub fn decode(&self) -> u64 {
        HandleCodec::decode(&self.0)
    }

    /// Whether the handle has the expected layout.
    pub fn is_well_formed(&self) -> bool {
        HandleCodec::try_decode(&self.0).is_some()
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Handle {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl AsRef<str> for Handle {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Encode/decode between plaintext integers and handles.
pub struct HandleCodec;

impl HandleCodec {
    /// Encode with a fresh random nonce.
    pub fn encode(value: u64) -> Handle {
        let nonce: u64 = rand::thread_rng().gen();
        Self::encode_with_nonce(value, nonce)
    }

    /// Encode with an explicit nonce (deterministic, for fixtures).
    pub fn encode_with_nonce(value: u64, nonce: u64) -> Handle {
        let payload = value ^ mask(nonce);
        Handle(format!(
            "{}{:0nw$x}{:0pw$x}",
            HANDLE_PREFIX,
            nonce,
            payload,
            nw = NONCE_HEX_LEN,
            pw = PAYLOAD_HEX_LEN
        ))
    }

    /// Decode a handle. Never fails: malformed input yields 0.
    pub fn decode(handle: &str) -> u64 {
        Self::try_decode(handle).unwrap_or(0)
    }

    /// Decode a handle, returning `None` when the layout is wrong.
    pub fn try_decode(handle: &str) -> Option<u64> {
        let body = handle.strip_prefix(HANDLE_PREFIX)?;
        if body.len() != NONCE_HEX_LEN + PAYLOAD_HEX_LEN
            || !body.bytes().all(|b| b.is_ascii_hexdigit())
        {
            return None;
        }

        let (nonce_hex, payload_hex) = body.split_at(NONCE_HEX_LEN);
        let nonce = u64::from_str_radix(nonce_hex, 16).ok()?;
        let payload = u64::from_str_radix(payload_hex, 16).ok()?;

        Some(payload ^ mask(nonce))
    }
}

/// First 8 bytes of `sha256(domain || nonce)`.
fn mask(nonce: u64) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(MASK_DOMAIN);
    hasher.update(nonce.to_be_bytes());
    let digest = hasher.finalize();

    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}

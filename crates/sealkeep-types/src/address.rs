use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// A principal on the ledger: the identity that owns objects and signs
/// mutations.
///
/// Addresses are derived deterministically from an Ed25519 public key with a
/// domain-separated BLAKE3 hash, so the same key always yields the same
/// address. They render as `0x`-prefixed lowercase hex and serialize as that
/// string, which keeps ledger content human-readable.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address([u8; 32]);

impl Address {
    /// Derive an address from a raw Ed25519 public key.
    pub fn from_public_key(public_key: &[u8; 32]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"sealkeep-address-v1:");
        hasher.update(public_key);
        Self(*hasher.finalize().as_bytes())
    }

    /// A random address for tests and demos.
    pub fn ephemeral() -> Self {
        let mut bytes = [0u8; 32];
        rand::Rng::fill(&mut rand::thread_rng(), &mut bytes);
        Self::from_public_key(&bytes)
    }

    /// Create from raw bytes. Use `from_public_key()` for production code.
    pub const fn from_raw(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// The raw 32-byte address.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Full `0x`-prefixed hex form.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Short form for logs: `0x` plus the first 8 hex characters.
    pub fn short(&self) -> String {
        format!("0x{}", hex::encode(&self.0[..4]))
    }

    /// Parse from hex, with or without the `0x` prefix.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        if bytes.len() != 32 {
            return Err(TypeError::InvalidLength {
                expected: 32,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.short())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Address {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl TryFrom<String> for Address {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.to_hex()
    }
}

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Identity of a ledger-resident object.
///
/// Object ids are assigned by the ledger when the object is created and never
/// change afterwards, even as the object's version advances.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId([u8; 32]);

impl ObjectId {
    /// Derive an id from arbitrary seed bytes (the ledger uses the creating
    /// transaction's digest plus a counter).
    pub fn derive(seed: &[u8]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"sealkeep-object-v1:");
        hasher.update(seed);
        Self(*hasher.finalize().as_bytes())
    }

    /// Create from a pre-computed 32-byte value.
    pub const fn from_raw(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// The raw 32 bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Full `0x`-prefixed hex form.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Short form for logs.
    pub fn short(&self) -> String {
        format!("0x{}", hex::encode(&self.0[..4]))
    }

    /// Parse from hex, with or without the `0x` prefix.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        decode_32(s).map(Self)
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.short())
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// A 32-byte digest: of an object's content at one version, or of a
/// submitted transaction.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Digest([u8; 32]);

impl Digest {
    /// BLAKE3 digest of raw bytes.
    pub fn of(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Create from a pre-computed hash.
    pub const fn from_raw(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// The raw 32 bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hex-encoded string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First 8 hex characters.
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }

    /// Parse from a 64-character hex string.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        decode_32(s).map(Self)
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.short_hex())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// The `(version, digest)` pair bound to an object at one point in time.
///
/// A mutation carrying a token that no longer matches the ledger's current
/// state is rejected as stale.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConcurrencyToken {
    pub version: u64,
    pub digest: Digest,
}

impl fmt::Display for ConcurrencyToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}@{}", self.version, self.digest.short_hex())
    }
}

/// A full object reference: identity plus concurrency token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    pub id: ObjectId,
    pub version: u64,
    pub digest: Digest,
}

impl ObjectRef {
    pub fn new(id: ObjectId, token: ConcurrencyToken) -> Self {
        Self {
            id,
            version: token.version,
            digest: token.digest,
        }
    }

    /// The concurrency token half of this reference.
    pub fn token(&self) -> ConcurrencyToken {
        ConcurrencyToken {
            version: self.version,
            digest: self.digest,
        }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.id.short(), self.token())
    }
}

fn decode_32(s: &str) -> Result<[u8; 32], TypeError> {
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
    Ok(arr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_is_deterministic() {
        assert_eq!(ObjectId::derive(b"seed"), ObjectId::derive(b"seed"));
        assert_ne!(ObjectId::derive(b"seed-a"), ObjectId::derive(b"seed-b"));
    }

    #[test]
    fn object_id_hex_roundtrip() {
        let id = ObjectId::derive(b"roundtrip");
        assert_eq!(ObjectId::from_hex(&id.to_hex()).unwrap(), id);
    }

    #[test]
    fn digest_hex_roundtrip() {
        let d = Digest::of(b"content");
        assert_eq!(Digest::from_hex(&d.to_hex()).unwrap(), d);
        assert_eq!(d.short_hex().len(), 8);
    }

    #[test]
    fn digest_rejects_bad_hex() {
        assert!(matches!(
            Digest::from_hex("zz"),
            Err(TypeError::InvalidHex(_))
        ));
    }

    #[test]
    fn object_ref_token_split() {
        let token = ConcurrencyToken {
            version: 4,
            digest: Digest::of(b"v4"),
        };
        let id = ObjectId::derive(b"obj");
        let r = ObjectRef::new(id, token);
        assert_eq!(r.token(), token);
        assert_eq!(r.id, id);
    }

    #[test]
    fn token_display() {
        let token = ConcurrencyToken {
            version: 7,
            digest: Digest::from_raw([0xab; 32]),
        };
        assert_eq!(token.to_string(), "v7@abababab");
    }
}

use sealkeep_types::Digest;

/// Domain-separated BLAKE3 content hasher.
///
/// Each hasher carries a domain tag that is prepended to every hash
/// computation, so identical bytes hashed for different purposes never
/// collide.
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hasher for blob-store content addresses.
    pub const BLOB: Self = Self {
        domain: "sealkeep-blob-v1",
    };
    /// Hasher for transaction digests.
    pub const TRANSACTION: Self = Self {
        domain: "sealkeep-tx-v1",
    };

    /// Create a hasher with a custom domain tag.
    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    /// Hash raw bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> Digest {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher.update(data);
        Digest::from_raw(*hasher.finalize().as_bytes())
    }

    /// Verify that data produces the expected digest.
    pub fn verify(&self, data: &[u8], expected: &Digest) -> bool {
        self.hash(data) == *expected
    }

    /// The domain tag used by this hasher.
    pub fn domain(&self) -> &str {
        self.domain
    }
}

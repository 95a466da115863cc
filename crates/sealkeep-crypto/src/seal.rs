//! The sealing capability: plaintext secret to authenticated envelope and
//! back.
//!
//! An envelope carries the whole [`SealedBody`] (plaintext, optional
//! context, seal id, timestamp and the `approved` flag) inside the
//! AES-256-GCM ciphertext. Nothing in it can change without breaking
//! authentication, so `approved` is frozen at seal time.
//!
//! Each envelope gets a fresh random salt; the master key is never used
//! directly as a cipher key. Wire layout (bincode):
//! `{ format: u8, salt: [u8; 32], sealed: nonce || ciphertext_with_tag }`.

use aes_gcm::aead::{Aead, Payload};
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use async_trait::async_trait;
use bincode::Options;
use chrono::{DateTime, Utc};
use hkdf::Hkdf;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::debug;
use uuid::Uuid;
use zeroize::{Zeroize, Zeroizing};

use crate::error::{SealError, SealResult};
use crate::plaintext::Plaintext;

/// Current envelope format version.
pub const ENVELOPE_FORMAT: u8 = 1;

const NONCE_SIZE: usize = 12;
const TAG_SIZE: usize = 16;
const SALT_SIZE: usize = 32;
const KEY_SIZE: usize = 32;
const MAX_ENVELOPE_BYTES: u64 = 1024 * 1024;

/// HKDF info string used to domain-separate derived keys.
const HKDF_INFO: &[u8] = b"sealkeep-envelope-key-v1";
/// Associated data bound into every ciphertext.
const ENVELOPE_AAD: &[u8] = b"sealkeep-envelope-v1";

/// Metadata frozen into an envelope when it is sealed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealMetadata {
    /// Unique per encryption event.
    pub seal_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub approved: bool,
}

/// Output of [`Sealer::seal`]: the serialized envelope plus the metadata
/// that was frozen into it.
#[derive(Clone, Debug)]
pub struct SealedSecret {
    pub envelope: Vec<u8>,
    pub metadata: SealMetadata,
}

/// Output of [`Sealer::unseal`].
#[derive(Debug)]
pub struct UnsealedSecret {
    pub plaintext: Plaintext,
    pub context: Option<String>,
    pub metadata: SealMetadata,
}

/// The encryption capability consumed by the save and retrieve paths.
#[async_trait]
pub trait Sealer: Send + Sync {
    /// Seal `plaintext` (and optional `context`) into a new envelope,
    /// freezing `approved` inside it.
    async fn seal(
        &self,
        plaintext: &Plaintext,
        context: Option<&str>,
        approved: bool,
    ) -> SealResult<SealedSecret>;

    /// Open an envelope produced by [`Sealer::seal`].
    async fn unseal(&self, envelope: &[u8]) -> SealResult<UnsealedSecret>;
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    format: u8,
    salt: [u8; SALT_SIZE],
    sealed: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct SealedBody {
    plaintext: String,
    context: Option<String>,
    seal_id: Uuid,
    timestamp: DateTime<Utc>,
    approved: bool,
}

impl Drop for SealedBody {
    fn drop(&mut self) {
        self.plaintext.zeroize();
    }
}

fn envelope_codec() -> impl Options {
    bincode::DefaultOptions::new().with_limit(MAX_ENVELOPE_BYTES)
}

/// AES-256-GCM sealer keyed by a 32-byte master key.
pub struct AesGcmSealer {
    master_key: Zeroizing<[u8; KEY_SIZE]>,
}

impl AesGcmSealer {
    pub fn new(master_key: [u8; KEY_SIZE]) -> Self {
        Self {
            master_key: Zeroizing::new(master_key),
        }
    }

    /// A sealer with a freshly generated random master key.
    pub fn generate() -> Self {
        let mut key = [0u8; KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut key);
        Self::new(key)
    }

    fn cipher(&self, salt: &[u8]) -> Result<Aes256Gcm, String> {
        let hk = Hkdf::<Sha256>::new(Some(salt), self.master_key.as_slice());
        let mut okm = Zeroizing::new([0u8; KEY_SIZE]);
        hk.expand(HKDF_INFO, okm.as_mut_slice())
            .map_err(|e| e.to_string())?;
        Aes256Gcm::new_from_slice(okm.as_slice()).map_err(|e| e.to_string())
    }

    fn seal_sync(
        &self,
        plaintext: &Plaintext,
        context: Option<&str>,
        approved: bool,
    ) -> SealResult<SealedSecret> {
        let metadata = SealMetadata {
            seal_id: Uuid::now_v7(),
            timestamp: Utc::now(),
            approved,
        };
        let body = SealedBody {
            plaintext: plaintext.expose().to_string(),
            context: context.map(str::to_string),
            seal_id: metadata.seal_id,
            timestamp: metadata.timestamp,
            approved,
        };
        let body_bytes = Zeroizing::new(
            serde_json::to_vec(&body).map_err(|e| SealError::Encryption(e.to_string()))?,
        );

        let mut salt = [0u8; SALT_SIZE];
        rand::thread_rng().fill_bytes(&mut salt);
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);

        let cipher = self.cipher(&salt).map_err(SealError::Encryption)?;
        let ciphertext = cipher
            .encrypt(
                Nonce::from_slice(&nonce_bytes),
                Payload {
                    msg: body_bytes.as_slice(),
                    aad: ENVELOPE_AAD,
                },
            )
            .map_err(|e| SealError::Encryption(e.to_string()))?;

        let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);

        let envelope = envelope_codec()
            .serialize(&Envelope {
                format: ENVELOPE_FORMAT,
                salt,
                sealed,
            })
            .map_err(|e| SealError::Encryption(e.to_string()))?;

        debug!(seal_id = %metadata.seal_id, bytes = envelope.len(), "sealed secret");
        Ok(SealedSecret { envelope, metadata })
    }

    fn unseal_sync(&self, envelope: &[u8]) -> SealResult<UnsealedSecret> {
        let envelope: Envelope = envelope_codec()
            .deserialize(envelope)
            .map_err(|e| SealError::MalformedEnvelope(e.to_string()))?;
        if envelope.format != ENVELOPE_FORMAT {
            return Err(SealError::UnsupportedFormat(envelope.format));
        }
        if envelope.sealed.len() < NONCE_SIZE + TAG_SIZE {
            return Err(SealError::MalformedEnvelope("sealed payload too short".into()));
        }

        let (nonce_bytes, ciphertext) = envelope.sealed.split_at(NONCE_SIZE);
        let cipher = self.cipher(&envelope.salt).map_err(SealError::Decryption)?;
        let body_bytes = Zeroizing::new(
            cipher
                .decrypt(
                    Nonce::from_slice(nonce_bytes),
                    Payload {
                        msg: ciphertext,
                        aad: ENVELOPE_AAD,
                    },
                )
                .map_err(|e| SealError::Decryption(e.to_string()))?,
        );

        let mut body: SealedBody = serde_json::from_slice(&body_bytes)
            .map_err(|e| SealError::MalformedEnvelope(e.to_string()))?;
        let metadata = SealMetadata {
            seal_id: body.seal_id,
            timestamp: body.timestamp,
            approved: body.approved,
        };
        Ok(UnsealedSecret {
            plaintext: Plaintext::new(std::mem::take(&mut body.plaintext)),
            context: body.context.take(),
            metadata,
        })
    }
}

impl std::fmt::Debug for AesGcmSealer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AesGcmSealer(<redacted>)")
    }
}

#[async_trait]
impl Sealer for AesGcmSealer {
    async fn seal(
        &self,
        plaintext: &Plaintext,
        context: Option<&str>,
        approved: bool,
    ) -> SealResult<SealedSecret> {
        self.seal_sync(plaintext, context, approved)
    }

    async fn unseal(&self, envelope: &[u8]) -> SealResult<UnsealedSecret> {
        self.unseal_sync(envelope)
    }
}

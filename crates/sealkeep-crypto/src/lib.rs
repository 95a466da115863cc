//! Cryptographic primitives for Sealkeep.
//!
//! Provides domain-separated BLAKE3 hashing (blob content addresses),
//! Ed25519 signing for wallet identities, and the sealing capability that
//! turns a plaintext secret into an authenticated AES-256-GCM envelope and
//! back.
//!
//! All crypto operations wrap established libraries; no custom cryptography.

pub mod error;
pub mod hasher;
pub mod plaintext;
pub mod seal;
pub mod signer;

pub use error::{SealError, SealResult};
pub use hasher::ContentHasher;
pub use plaintext::Plaintext;
pub use seal::{AesGcmSealer, SealMetadata, SealedSecret, Sealer, UnsealedSecret, ENVELOPE_FORMAT};
pub use signer::{Signature, SignatureError, SigningKey, VerifyingKey};

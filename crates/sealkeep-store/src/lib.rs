//! Content-addressed blob storage for Sealkeep.
//!
//! Sealed envelopes live here; owner records on the ledger only hold the
//! [`ContentAddress`](sealkeep_types::ContentAddress) returned by `put`.
//!
//! # Design Rules
//!
//! 1. Blobs are immutable once written (content-addressing guarantees this).
//! 2. Identical bytes always map to the same address.
//! 3. The store never interprets blob contents.
//! 4. All backend errors are propagated, never silently ignored.

pub mod error;
pub mod memory;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryBlobStore;
pub use traits::BlobStore;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use sealkeep_crypto::ContentHasher;
use sealkeep_types::ContentAddress;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::traits::BlobStore;

/// In-memory, HashMap-based blob store.
///
/// Intended for tests, demos and embedding. Addresses are the hex form of a
/// domain-separated BLAKE3 hash of the stored bytes.
pub struct InMemoryBlobStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
    read_only: AtomicBool,
}

impl InMemoryBlobStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            blobs: RwLock::new(HashMap::new()),
            read_only: AtomicBool::new(false),
        }
    }

    /// Compute the address `bytes` would be stored under.
    pub fn address_of(bytes: &[u8]) -> ContentAddress {
        ContentAddress::Known(ContentHasher::BLOB.hash(bytes).to_hex())
    }

    /// Refuse (or resume accepting) writes.
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    /// Number of blobs currently stored.
    pub fn len(&self) -> usize {
        self.blobs.read().map(|m| m.len()).unwrap_or(0)
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total bytes across all stored blobs.
    pub fn total_bytes(&self) -> u64 {
        self.blobs
            .read()
            .map(|m| m.values().map(|b| b.len() as u64).sum())
            .unwrap_or(0)
    }

    /// Sorted list of every stored address.
    pub fn all_addresses(&self) -> Vec<ContentAddress> {
        let Ok(map) = self.blobs.read() else {
            return Vec::new();
        };
        let mut keys: Vec<String> = map.keys().cloned().collect();
        keys.sort();
        keys.into_iter().map(ContentAddress::Known).collect()
    }

    /// Delete a blob. Intended for garbage collection of unreferenced
    /// envelopes only. Returns `true` if the blob existed.
    pub fn delete(&self, address: &ContentAddress) -> StoreResult<bool> {
        let ContentAddress::Known(key) = address else {
            return Err(StoreError::InvalidAddress(address.clone()));
        };
        let mut map = self
            .blobs
            .write()
            .map_err(|e| StoreError::Backend(format!("lock poisoned: {e}")))?;
        Ok(map.remove(key).is_some())
    }
}

impl Default for InMemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn put(&self, bytes: Vec<u8>) -> StoreResult<ContentAddress> {
        if self.read_only.load(Ordering::SeqCst) {
            return Err(StoreError::ReadOnly);
        }
        if bytes.is_empty() {
            return Err(StoreError::EmptyBlob);
        }
        let address = Self::address_of(&bytes);
        let len = bytes.len();
        let mut map = self
            .blobs
            .write()
            .map_err(|e| StoreError::Backend(format!("lock poisoned: {e}")))?;
        // Idempotent: the same address always maps to the same bytes.
        map.entry(address.as_str().to_string()).or_insert(bytes);
        debug!(address = %address, bytes = len, "blob stored");
        Ok(address)
    }

    async fn get(&self, address: &ContentAddress) -> StoreResult<Vec<u8>> {
        let ContentAddress::Known(key) = address else {
            return Err(StoreError::InvalidAddress(address.clone()));
        };
        let map = self
            .blobs
            .read()
            .map_err(|e| StoreError::Backend(format!("lock poisoned: {e}")))?;
        map.get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(address.clone()))
    }
}

impl std::fmt::Debug for InMemoryBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBlobStore")
            .field("blob_count", &self.len())
            .finish()
    }
}

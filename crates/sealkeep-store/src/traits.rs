use async_trait::async_trait;
use sealkeep_types::ContentAddress;

use crate::error::StoreResult;

/// Content-addressed blob store.
///
/// All implementations must satisfy these invariants:
/// - `put` returns an address that is stable: looking it up later yields the
///   same bytes.
/// - Blobs are immutable once written.
/// - `get` on an address that was never written fails with
///   [`StoreError::NotFound`](crate::StoreError::NotFound).
/// - The `unknown` sentinel is never a valid lookup key.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store bytes and return their content address.
    async fn put(&self, bytes: Vec<u8>) -> StoreResult<ContentAddress>;

    /// Fetch the bytes stored under `address`.
    async fn get(&self, address: &ContentAddress) -> StoreResult<Vec<u8>>;

    /// Check whether a blob exists.
    async fn exists(&self, address: &ContentAddress) -> StoreResult<bool> {
        match self.get(address).await {
            Ok(_) => Ok(true),
            Err(crate::StoreError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

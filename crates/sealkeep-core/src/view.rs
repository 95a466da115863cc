use tracing::{debug, warn};

use sealkeep_types::{Address, SecretRef};

use crate::error::VaultResult;
use crate::events::{EventBus, Operation, Phase};
use crate::resolver::VersionResolver;
use crate::retrieve::RetrieveCoordinator;

/// One row of an owner's listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListedEntry {
    pub secret: SecretRef,
    /// The envelope's frozen flag; `false` when it could not be read.
    pub approved: bool,
    /// `false` for the `unknown` sentinel.
    pub retrievable: bool,
}

/// Lists an owner's entries with their approval status.
///
/// A single read of the owner record, then one envelope inspection per
/// retrievable entry. A failing entry degrades to `approved == false`
/// without affecting the others.
#[derive(Clone)]
pub struct OwnerRecordView {
    resolver: VersionResolver,
    retrieve: RetrieveCoordinator,
    events: EventBus,
}

impl OwnerRecordView {
    pub fn new(resolver: VersionResolver, retrieve: RetrieveCoordinator, events: EventBus) -> Self {
        Self {
            resolver,
            retrieve,
            events,
        }
    }

    /// Entries in save order. An owner without a record has an empty list.
    pub async fn list(&self, owner: &Address) -> VaultResult<Vec<ListedEntry>> {
        self.events.started(Operation::List, Phase::Fetch);
        let record = self.resolver.load_once(owner).await;
        self.events.finished(Operation::List, Phase::Fetch, &record);
        let Some(record) = record? else {
            debug!(owner = %owner.short(), "no owner record, empty listing");
            return Ok(Vec::new());
        };

        let mut listed = Vec::with_capacity(record.entries.len());
        for secret in record.entries {
            let retrievable = secret.content_address.is_retrievable();
            let approved = if retrievable {
                match self.retrieve.inspect(&secret).await {
                    Ok((metadata, _)) => metadata.approved,
                    Err(err) => {
                        warn!(entry = %secret.entry_id, error = %err, "entry unreadable, reporting unapproved");
                        false
                    }
                }
            } else {
                false
            };
            listed.push(ListedEntry {
                secret,
                approved,
                retrievable,
            });
        }
        let result: VaultResult<()> = Ok(());
        self.events.finished(Operation::List, Phase::Complete, &result);
        Ok(listed)
    }
}

#[cfg(test)]
mod tests {
    use crate::error::VaultError;
    use crate::testing::Harness;
    use sealkeep_store::BlobStore;
    use sealkeep_types::ContentAddress;

    #[tokio::test]
    async fn no_record_is_empty() {
        let h = Harness::new();
        assert!(h.view().list(&h.owner()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn corrupt_entry_is_isolated() {
        let h = Harness::new();
        h.create_record();
        let good_a = h.seal_and_store("one", None, true).await;
        let corrupt = h.store.inner().put(b"garbage envelope".to_vec()).await.unwrap();
        let good_b = h.seal_and_store("three", None, true).await;
        h.owner_append("a", &good_a);
        h.owner_append("corrupt", &corrupt);
        h.owner_append("b", &good_b);

        let listed = h.view().list(&h.owner()).await.unwrap();
        assert_eq!(listed.len(), 3);
        let labels: Vec<_> = listed.iter().map(|e| e.secret.label.as_str()).collect();
        assert_eq!(labels, vec!["a", "corrupt", "b"]);
        let approved: Vec<_> = listed.iter().map(|e| e.approved).collect();
        assert_eq!(approved, vec![true, false, true]);
        assert!(listed.iter().all(|e| e.retrievable));
    }

    #[tokio::test]
    async fn missing_blob_is_isolated() {
        let h = Harness::new();
        h.create_record();
        let good = h.seal_and_store("one", None, true).await;
        h.owner_append("gone", &ContentAddress::Known("00".repeat(32)));
        h.owner_append("good", &good);

        let listed = h.view().list(&h.owner()).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert!(!listed[0].approved);
        assert!(listed[1].approved);
    }

    #[tokio::test]
    async fn sentinel_entries_are_listed_but_never_fetched() {
        let h = Harness::new();
        let owner = h.owner();
        h.ledger
            .insert_object(
                owner,
                h.config.record_type.clone(),
                serde_json::json!({
                    "owner": owner.to_hex(),
                    "entries": [
                        { "entry_id": 1, "label": "lost", "content_address": "unknown" },
                    ],
                    "next_entry_id": 2,
                }),
            )
            .unwrap();
        let listed = h.view().list(&owner).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(!listed[0].retrievable);
        assert!(!listed[0].approved);
        assert_eq!(h.store.gets(), 0);
    }

    #[tokio::test]
    async fn listing_reads_once_without_retry() {
        let h = Harness::new();
        h.ledger.fail_next_reads(1);
        let err = h.view().list(&h.owner()).await.unwrap_err();
        assert!(matches!(err, VaultError::LedgerUnavailable { attempts: 1, .. }));
        assert_eq!(h.reader.owned_calls(), 1);
    }

    #[tokio::test]
    async fn unapproved_envelopes_list_as_unapproved() {
        let h = Harness::new();
        h.create_record();
        let address = h.seal_and_store("x", None, false).await;
        h.owner_append("x", &address);
        let listed = h.view().list(&h.owner()).await.unwrap();
        assert!(!listed[0].approved);
        assert!(listed[0].retrievable);
    }
}

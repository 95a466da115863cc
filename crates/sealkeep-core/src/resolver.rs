use std::sync::Arc;

use tracing::{debug, warn};

use sealkeep_ledger::{LedgerError, LedgerObject, LedgerReader};
use sealkeep_types::{Address, ObjectRef, OwnerRecord};

use crate::error::{VaultError, VaultResult};
use crate::events::{EventBus, Operation, Outcome, Phase};
use crate::retry::RetryPolicy;

/// Looks up the caller's owner record on the ledger.
///
/// Read-only. Nothing is cached: each call goes to the ledger, so the token
/// it returns is as fresh as the read.
#[derive(Clone)]
pub struct VersionResolver {
    reader: Arc<dyn LedgerReader>,
    record_type: String,
    policy: RetryPolicy,
    events: EventBus,
}

impl VersionResolver {
    pub fn new(
        reader: Arc<dyn LedgerReader>,
        record_type: impl Into<String>,
        policy: RetryPolicy,
        events: EventBus,
    ) -> Self {
        Self {
            reader,
            record_type: record_type.into(),
            policy,
            events,
        }
    }

    pub fn record_type(&self) -> &str {
        &self.record_type
    }

    /// Current identity and concurrency token of `owner`'s record, or
    /// `None` when the owner has no record yet.
    pub async fn resolve(&self, owner: &Address) -> VaultResult<Option<ObjectRef>> {
        Ok(self.load(owner).await?.map(|record| record.reference))
    }

    /// Like [`resolve`](Self::resolve) but returns the decoded record.
    pub async fn load(&self, owner: &Address) -> VaultResult<Option<OwnerRecord>> {
        self.load_with(owner, &self.policy).await
    }

    /// A single read with no retry.
    pub async fn load_once(&self, owner: &Address) -> VaultResult<Option<OwnerRecord>> {
        self.load_with(owner, &RetryPolicy::once()).await
    }

    async fn load_with(
        &self,
        owner: &Address,
        policy: &RetryPolicy,
    ) -> VaultResult<Option<OwnerRecord>> {
        let objects = policy
            .run(
                |_| self.reader.owned_objects_by_type(owner, &self.record_type),
                |_: &LedgerError| true,
                |attempt, delay, err| {
                    warn!(owner = %owner.short(), attempt, delay_ms = delay.as_millis() as u64, error = %err, "owner record query failed, retrying");
                    self.events.emit(
                        Operation::Resolve,
                        Phase::Query,
                        Outcome::Retrying {
                            attempt,
                            delay_ms: delay.as_millis() as u64,
                        },
                    );
                },
            )
            .await
            .map_err(|e| {
                let err = VaultError::LedgerUnavailable {
                    attempts: policy.max_attempts.max(1),
                    message: e.to_string(),
                };
                self.events.emit(Operation::Resolve, Phase::Query, Outcome::failed(&err));
                err
            })?;

        let Some(object) = self.select(owner, objects) else {
            debug!(owner = %owner.short(), "no owner record");
            return Ok(None);
        };
        let record = decode(object)?;
        if record.owner != *owner {
            return Err(VaultError::MalformedRecord(format!(
                "record {} names owner {} but is held by {}",
                record.id().short(),
                record.owner.short(),
                owner.short()
            )));
        }
        debug!(owner = %owner.short(), record = %record.reference, "resolved owner record");
        Ok(Some(record))
    }

    fn select(&self, owner: &Address, mut objects: Vec<LedgerObject>) -> Option<LedgerObject> {
        if objects.len() > 1 {
            warn!(
                owner = %owner.short(),
                count = objects.len(),
                "multiple owner records found, using the first"
            );
        }
        if objects.is_empty() {
            None
        } else {
            Some(objects.swap_remove(0))
        }
    }
}

/// Strictly decode a ledger object into an [`OwnerRecord`].
pub(crate) fn decode(object: LedgerObject) -> VaultResult<OwnerRecord> {
    OwnerRecord::decode(object.reference, &object.content)
        .map_err(|e| VaultError::MalformedRecord(format!("{}: {e}", object.reference.id.short())))
}

impl std::fmt::Debug for VersionResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionResolver")
            .field("record_type", &self.record_type)
            .field("policy", &self.policy)
            .finish()
    }
}

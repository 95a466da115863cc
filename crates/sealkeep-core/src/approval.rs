use std::sync::Arc;

use tracing::{debug, warn};

use sealkeep_ledger::LedgerReader;
use sealkeep_types::{Address, ObjectId};

use crate::events::{EventBus, Operation, Outcome, Phase};

/// Read-only check of whether a principal may authorise privileged
/// operations on a record.
///
/// Derived from ledger ownership alone; the `approved` flag frozen inside
/// envelopes plays no part. Fails closed: any read error reports `false`.
#[derive(Clone)]
pub struct ApprovalChecker {
    reader: Arc<dyn LedgerReader>,
    events: EventBus,
}

impl ApprovalChecker {
    pub fn new(reader: Arc<dyn LedgerReader>, events: EventBus) -> Self {
        Self { reader, events }
    }

    pub async fn check(&self, record_id: &ObjectId, owner: &Address) -> bool {
        let approved = match self.reader.object(record_id).await {
            Ok(Some(object)) => object.owner == *owner,
            Ok(None) => {
                debug!(record = %record_id.short(), "approval check on missing record");
                false
            }
            Err(err) => {
                warn!(record = %record_id.short(), error = %err, "approval check failed closed");
                false
            }
        };
        let outcome = if approved {
            Outcome::Succeeded
        } else {
            Outcome::Failed {
                class: crate::error::ErrorClass::Failure,
                message: format!("{} cannot approve {}", owner.short(), record_id.short()),
            }
        };
        self.events.emit(Operation::CheckApproval, Phase::Complete, outcome);
        approved
    }
}

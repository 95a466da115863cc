//! Transactions, their signed form, and what the ledger reports back.

use serde::{Deserialize, Serialize};

use sealkeep_crypto::{Signature, SigningKey, VerifyingKey};
use sealkeep_types::{Address, ContentAddress, Digest, ObjectRef, SecretRef};

use crate::error::{LedgerError, LedgerResult};

/// A ledger mutation against owner records.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mutation {
    /// Create an empty owner record for the sender.
    CreateRecord,
    /// Append a secret reference to an existing record. `record` must carry
    /// the record's current version and digest.
    AppendEntry {
        record: ObjectRef,
        label: String,
        content_address: ContentAddress,
    },
}

impl Mutation {
    /// Short name for logs and events.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CreateRecord => "create_record",
            Self::AppendEntry { .. } => "append_entry",
        }
    }

    /// The versioned object this mutation consumes, if any.
    pub fn input_object(&self) -> Option<&ObjectRef> {
        match self {
            Self::CreateRecord => None,
            Self::AppendEntry { record, .. } => Some(record),
        }
    }
}

/// The signed-over body of a transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionData {
    pub sender: Address,
    pub mutation: Mutation,
    /// Distinguishes otherwise identical transactions.
    pub nonce: u64,
}

impl TransactionData {
    /// Canonical bytes that get signed and hashed.
    pub fn signing_bytes(&self) -> LedgerResult<Vec<u8>> {
        bincode::serialize(self).map_err(|e| LedgerError::Serialization(e.to_string()))
    }
}

/// A transaction plus the sender's public key and signature.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub data: TransactionData,
    pub public_key: VerifyingKey,
    pub signature: Signature,
}

impl SignedTransaction {
    /// Sign `data` with `key`.
    pub fn sign(data: TransactionData, key: &SigningKey) -> LedgerResult<Self> {
        let bytes = data.signing_bytes()?;
        Ok(Self {
            signature: key.sign(&bytes),
            public_key: key.verifying_key(),
            data,
        })
    }
}

/// Execution outcome as reported in transaction effects.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    Success,
    Failure { error: String },
}

impl ExecutionStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Objects touched by an executed transaction.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionEffects {
    pub created: Vec<ObjectRef>,
    pub mutated: Vec<ObjectRef>,
    /// Entries added to owner records, with their assigned ids.
    #[serde(default)]
    pub appended: Vec<SecretRef>,
}

/// Result of a transaction that the ledger accepted for execution.
///
/// Acceptance is not success: check `status`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionResult {
    pub digest: Digest,
    pub status: ExecutionStatus,
    pub effects: TransactionEffects,
}

/// A ledger object as returned by reads: reference, owner, type tag and raw
/// JSON content. Decoding the content is the reader's job.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LedgerObject {
    pub reference: ObjectRef,
    pub owner: Address,
    pub type_tag: String,
    pub content: serde_json::Value,
}

//! The ledger-resident record model: owner records and the secret
//! references they hold.
//!
//! Ledger content crosses the read boundary as loosely-typed JSON. Everything
//! here deserializes it strictly: unknown fields, missing fields and malformed
//! values are errors, never defaults.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::error::TypeError;
use crate::object::{ConcurrencyToken, Digest, ObjectId, ObjectRef};

/// Maximum length of a secret label, in bytes.
pub const MAX_LABEL_LEN: usize = 128;

const UNKNOWN_SENTINEL: &str = "unknown";

/// Opaque handle into the blob store.
///
/// The literal string `"unknown"` is a sentinel for a corrupt or missing
/// reference. It parses to [`ContentAddress::Unknown`], which is never
/// retrievable.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ContentAddress {
    Known(String),
    Unknown,
}

impl ContentAddress {
    /// Parse a content address. Empty or whitespace-bearing strings are
    /// rejected; `"unknown"` yields the sentinel.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        if s.is_empty() {
            return Err(TypeError::InvalidContentAddress("empty".into()));
        }
        if s.chars().any(char::is_whitespace) {
            return Err(TypeError::InvalidContentAddress(format!(
                "contains whitespace: {s:?}"
            )));
        }
        if s == UNKNOWN_SENTINEL {
            return Ok(Self::Unknown);
        }
        Ok(Self::Known(s.to_string()))
    }

    /// Returns `true` unless this is the `unknown` sentinel.
    pub fn is_retrievable(&self) -> bool {
        matches!(self, Self::Known(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Known(s) => s,
            Self::Unknown => UNKNOWN_SENTINEL,
        }
    }
}

impl fmt::Debug for ContentAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(s) => write!(f, "ContentAddress({s})"),
            Self::Unknown => f.write_str("ContentAddress(<unknown>)"),
        }
    }
}

impl fmt::Display for ContentAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for ContentAddress {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ContentAddress> for String {
    fn from(address: ContentAddress) -> Self {
        address.as_str().to_string()
    }
}

/// Stable identity of an entry within one owner record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(pub u64);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Check a user-chosen label: non-blank and at most [`MAX_LABEL_LEN`] bytes.
pub fn validate_label(label: &str) -> Result<(), TypeError> {
    if label.trim().is_empty() {
        return Err(TypeError::InvalidLabel("label must not be empty".into()));
    }
    if label.len() > MAX_LABEL_LEN {
        return Err(TypeError::InvalidLabel(format!(
            "label exceeds {MAX_LABEL_LEN} bytes"
        )));
    }
    Ok(())
}

/// A labelled pointer from an owner record into the blob store.
///
/// Created only by a successful append mutation; never mutated in place.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SecretRef {
    pub entry_id: EntryId,
    pub label: String,
    pub content_address: ContentAddress,
}

/// The JSON body the ledger stores for an owner record.
///
/// `next_entry_id` is the ledger-side counter used to assign [`EntryId`]s.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecordContent {
    pub owner: Address,
    pub entries: Vec<SecretRef>,
    pub next_entry_id: u64,
}

impl RecordContent {
    /// An empty record for `owner`.
    pub fn empty(owner: Address) -> Self {
        Self {
            owner,
            entries: Vec::new(),
            next_entry_id: 1,
        }
    }

    /// Strictly decode ledger content.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, TypeError> {
        let content: Self = serde_json::from_value(value.clone())
            .map_err(|e| TypeError::Schema(e.to_string()))?;
        for entry in &content.entries {
            if entry.entry_id.0 >= content.next_entry_id {
                return Err(TypeError::Schema(format!(
                    "entry {} is not below next_entry_id {}",
                    entry.entry_id, content.next_entry_id
                )));
            }
        }
        Ok(content)
    }

    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "owner": self.owner.to_hex(),
            "entries": self.entries.iter().map(|e| serde_json::json!({
                "entry_id": e.entry_id.0,
                "label": e.label,
                "content_address": e.content_address.as_str(),
            })).collect::<Vec<_>>(),
            "next_entry_id": self.next_entry_id,
        })
    }

    /// Digest of the canonical JSON encoding of this content.
    pub fn digest(&self) -> Digest {
        Digest::of(self.to_value().to_string().as_bytes())
    }
}

/// A decoded owner record: the ledger object's reference plus its content.
///
/// Never cached across operations; every mutating call re-reads it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OwnerRecord {
    pub reference: ObjectRef,
    pub owner: Address,
    pub entries: Vec<SecretRef>,
}

impl OwnerRecord {
    /// Decode a record from its ledger reference and raw content.
    pub fn decode(reference: ObjectRef, content: &serde_json::Value) -> Result<Self, TypeError> {
        let content = RecordContent::from_value(content)?;
        Ok(Self {
            reference,
            owner: content.owner,
            entries: content.entries,
        })
    }

    pub fn id(&self) -> ObjectId {
        self.reference.id
    }

    pub fn token(&self) -> ConcurrencyToken {
        self.reference.token()
    }

    /// Look up an entry by id.
    pub fn entry(&self, entry_id: EntryId) -> Option<&SecretRef> {
        self.entries.iter().find(|e| e.entry_id == entry_id)
    }
}

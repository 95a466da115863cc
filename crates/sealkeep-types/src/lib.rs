//! Foundation types for Sealkeep.
//!
//! Every other Sealkeep crate depends on `sealkeep-types`. The types here are
//! plain data: they carry no I/O and no policy.
//!
//! # Key Types
//!
//! - [`Address`]: a principal (wallet identity) on the ledger
//! - [`ObjectId`]: identity of a ledger-resident object
//! - [`ObjectRef`]: `(id, version, digest)`; what every mutation must cite
//! - [`ConcurrencyToken`]: the `(version, digest)` half of an [`ObjectRef`]
//! - [`ContentAddress`]: handle into the blob store, with an `unknown` sentinel
//! - [`SecretRef`]: a labelled pointer stored inside an [`OwnerRecord`]
//! - [`OwnerRecord`]: the per-principal container of secret references

pub mod address;
pub mod error;
pub mod object;
pub mod record;

pub use address::Address;
pub use error::TypeError;
pub use object::{ConcurrencyToken, Digest, ObjectId, ObjectRef};
pub use record::{
    validate_label, ContentAddress, EntryId, OwnerRecord, RecordContent, SecretRef, MAX_LABEL_LEN,
};

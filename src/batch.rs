//! Batch record, header field set, and backlog projection types.

use serde::{Deserialize, Serialize};

use crate::types::{BatchId, HeaderVersion};

/// Column/field names of the ten canonical header fields, in storage order.
pub const HEADER_FIELD_NAMES: [&str; 10] = [
    "transaction_type",
    "transaction_sequence",
    "registration_date",
    "registration_time",
    "provider_tax_id",
    "provider_name",
    "payer_registry",
    "standard_version",
    "hash",
    "cnes",
];

/// The ten canonical header values written to a batch record.
///
/// `None` is stored as SQL `NULL`. A header that was present in the document
/// but lacked a field carries `Some("")` for that field.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HeaderFields {
    /// Transaction type code (`tipoTransacao`).
    pub transaction_type: Option<String>,
    /// Transaction sequence number (`sequencialTransacao`).
    pub transaction_sequence: Option<String>,
    /// Registration date (`dataRegistroTransacao`).
    pub registration_date: Option<String>,
    /// Registration time (`horaRegistroTransacao`).
    pub registration_time: Option<String>,
    /// Submitting-provider tax id (CNPJ, CPF, or payer-assigned code).
    pub provider_tax_id: Option<String>,
    /// Submitting-provider name.
    pub provider_name: Option<String>,
    /// Payer registry number (`registroANS`).
    pub payer_registry: Option<String>,
    /// Standard version/variant identifier (`Padrao`).
    pub standard_version: Option<String>,
    /// Integrity hash from the document epilogue.
    pub hash: Option<String>,
    /// Facility registry code.
    pub cnes: Option<String>,
}

impl HeaderFields {
    /// Returns the all-NULL header.
    pub fn unset() -> Self {
        Self::default()
    }

    /// Returns `(name, value)` pairs in storage order.
    pub fn entries(&self) -> [(&'static str, Option<&str>); 10] {
        [
            (HEADER_FIELD_NAMES[0], self.transaction_type.as_deref()),
            (HEADER_FIELD_NAMES[1], self.transaction_sequence.as_deref()),
            (HEADER_FIELD_NAMES[2], self.registration_date.as_deref()),
            (HEADER_FIELD_NAMES[3], self.registration_time.as_deref()),
            (HEADER_FIELD_NAMES[4], self.provider_tax_id.as_deref()),
            (HEADER_FIELD_NAMES[5], self.provider_name.as_deref()),
            (HEADER_FIELD_NAMES[6], self.payer_registry.as_deref()),
            (HEADER_FIELD_NAMES[7], self.standard_version.as_deref()),
            (HEADER_FIELD_NAMES[8], self.hash.as_deref()),
            (HEADER_FIELD_NAMES[9], self.cnes.as_deref()),
        ]
    }

    /// True when every field is `NULL`.
    pub fn is_unset(&self) -> bool {
        self.entries().iter().all(|(_, v)| v.is_none())
    }

    /// True when every field is `NULL` or every field is non-`NULL`.
    pub fn is_uniform(&self) -> bool {
        let present = self.entries().iter().filter(|(_, v)| v.is_some()).count();
        present == 0 || present == HEADER_FIELD_NAMES.len()
    }

    /// True when every field holds a non-empty value.
    pub fn is_complete(&self) -> bool {
        self.missing().is_empty()
    }

    /// Names of fields that are `NULL` or empty.
    pub fn missing(&self) -> Vec<&'static str> {
        self.entries()
            .iter()
            .filter(|(_, v)| is_blank(*v))
            .map(|(name, _)| *name)
            .collect()
    }

    /// Backlog predicate: transaction type or hash is `NULL` or empty.
    pub fn needs_reconciliation(&self) -> bool {
        is_blank(self.transaction_type.as_deref()) || is_blank(self.hash.as_deref())
    }
}

fn is_blank(v: Option<&str>) -> bool {
    v.is_none_or(str::is_empty)
}

/// Persisted batch record as owned by the batch store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRecord {
    /// Primary key.
    pub id: BatchId,
    /// Business batch number (`numeroLote`).
    pub batch_number: String,
    /// XML filename relative to the upload root.
    pub xml_filename: String,
    /// Reconciled header fields.
    pub header: HeaderFields,
    /// Bumped on every header write.
    pub header_version: HeaderVersion,
    /// Time of the last header write, in milliseconds since epoch.
    pub reconciled_at_ms: Option<u64>,
}

impl BatchRecord {
    /// Projects this record onto a [`BacklogItem`].
    pub fn backlog_item(&self) -> BacklogItem {
        BacklogItem {
            id: self.id,
            batch_number: self.batch_number.clone(),
            xml_filename: self.xml_filename.clone(),
        }
    }
}

/// Minimal projection used to drive bulk reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BacklogItem {
    /// Primary key.
    pub id: BatchId,
    /// Business batch number; empty when the item was named by id only.
    pub batch_number: String,
    /// XML filename; empty when the item was named by id only.
    pub xml_filename: String,
}

impl BacklogItem {
    /// Item for a targeted rerun where only the id is known.
    pub fn from_id(id: BatchId) -> Self {
        Self {
            id,
            batch_number: String::new(),
            xml_filename: String::new(),
        }
    }
}

/// Insert payload used to seed a batch record with an unreconciled header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBatch {
    /// Explicit id; the store assigns one when `None`.
    pub id: Option<BatchId>,
    /// Business batch number.
    pub batch_number: String,
    /// XML filename relative to the upload root.
    pub xml_filename: String,
}

//! Per-item outcomes and the aggregate bulk report. Never persisted.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{batch::HeaderFields, types::BatchId};

/// Reconciliation step at which an item failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Loading the record from the store.
    Load,
    /// Resolving the XML path under the upload root.
    Resolve,
    /// Reading the XML file.
    Read,
    /// Parsing the XML document.
    Parse,
    /// Writing the header fields.
    Write,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Load => "load",
            Self::Resolve => "resolve",
            Self::Read => "read",
            Self::Parse => "parse",
            Self::Write => "write",
        })
    }
}

/// Failure cause tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureCause {
    /// No record exists for the id.
    NotFound,
    /// The referenced XML file is absent from the upload root.
    FileMissing,
    /// The parser rejected the file content.
    MalformedDocument,
    /// The conditional write matched zero rows.
    NoRowsUpdated,
    /// The file exists but could not be read.
    IoError,
    /// The store failed while loading or writing the item.
    StoreError,
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NotFound => "NotFound",
            Self::FileMissing => "FileMissing",
            Self::MalformedDocument => "MalformedDocument",
            Self::NoRowsUpdated => "NoRowsUpdated",
            Self::IoError => "IOError",
            Self::StoreError => "StoreError",
        })
    }
}

/// What happened to the stored header on success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteStatus {
    /// All ten fields were overwritten from the document header.
    Written,
    /// The document had no header section; all ten fields were written as `NULL`.
    HeaderAbsent,
    /// Stored hash matched the document hash; nothing was written.
    Unchanged,
}

impl fmt::Display for WriteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Written => "written",
            Self::HeaderAbsent => "header-absent",
            Self::Unchanged => "unchanged",
        })
    }
}

/// Successful reconciliation of one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileSuccess {
    /// Batch id.
    pub id: BatchId,
    /// Batch number of the loaded record.
    pub batch_number: String,
    /// Header fields as written (or as already stored, when unchanged).
    pub fields: HeaderFields,
    /// Write status.
    pub status: WriteStatus,
}

/// Failed reconciliation of one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileFailure {
    /// Batch id.
    pub id: BatchId,
    /// Batch number, when known.
    pub batch_number: Option<String>,
    /// Failing step.
    pub stage: Stage,
    /// Cause tag.
    pub cause: FailureCause,
    /// Human-readable detail.
    pub message: String,
}

/// Per-item result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconciliationOutcome {
    /// Header reconciled.
    Success(ReconcileSuccess),
    /// Item failed and was skipped.
    Failure(ReconcileFailure),
}

impl ReconciliationOutcome {
    /// Batch id of the item.
    pub fn id(&self) -> BatchId {
        match self {
            Self::Success(s) => s.id,
            Self::Failure(f) => f.id,
        }
    }

    /// True for [`ReconciliationOutcome::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Failure details, if any.
    pub fn failure(&self) -> Option<&ReconcileFailure> {
        match self {
            Self::Success(_) => None,
            Self::Failure(f) => Some(f),
        }
    }
}

/// Aggregate result of one bulk run, in processing order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BulkReport {
    /// Items attempted.
    pub attempted: usize,
    /// Items reconciled.
    pub succeeded: usize,
    /// Items that failed.
    pub failed: usize,
    /// Succeeded items whose document had no header; they stay in the backlog.
    #[serde(default)]
    pub header_absent: usize,
    /// Per-item outcomes.
    pub outcomes: Vec<ReconciliationOutcome>,
}

impl BulkReport {
    /// Empty report sized for `n` items.
    pub fn with_capacity(n: usize) -> Self {
        Self {
            outcomes: Vec::with_capacity(n),
            ..Self::default()
        }
    }

    /// Appends one outcome and updates the tallies.
    pub fn record(&mut self, outcome: ReconciliationOutcome) {
        self.attempted += 1;
        if let ReconciliationOutcome::Success(success) = &outcome {
            self.succeeded += 1;
            if success.status == WriteStatus::HeaderAbsent {
                self.header_absent += 1;
            }
        } else {
            self.failed += 1;
        }
        self.outcomes.push(outcome);
    }

    /// True when no item failed (including the empty run).
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }

    /// Items reconciled without a header, in processing order.
    pub fn header_absent_items(&self) -> impl Iterator<Item = &ReconcileSuccess> {
        self.outcomes.iter().filter_map(|outcome| match outcome {
            ReconciliationOutcome::Success(s) if s.status == WriteStatus::HeaderAbsent => Some(s),
            _ => None,
        })
    }

    /// Failed items, in processing order.
    pub fn failures(&self) -> impl Iterator<Item = &ReconcileFailure> {
        self.outcomes.iter().filter_map(ReconciliationOutcome::failure)
    }
}

use std::{io, path::PathBuf};

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::{
    batch::{BacklogItem, BatchRecord, HeaderFields},
    config::ReconcileOptions,
    document::{DocumentParser, ParseError},
    files::FileSource,
    mapper::map_header,
    persist::{BatchStore, StoreError},
    types::BatchId,
};

use super::outcome::{
    FailureCause, ReconcileFailure, ReconcileSuccess, ReconciliationOutcome, Stage, WriteStatus,
};

/// Failure of a single-batch reconciliation.
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum ReconcileError {
    #[error("batch {id}: no record with this id")]
    NotFound { id: BatchId },

    #[error("batch {id}: XML file not found at {}", .path.display())]
    FileMissing { id: BatchId, path: PathBuf },

    #[error("batch {id}: cannot read {}: {source}", .path.display())]
    Io {
        id: BatchId,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("batch {id}: malformed document {}: {source}", .path.display())]
    MalformedDocument {
        id: BatchId,
        path: PathBuf,
        #[source]
        source: ParseError,
    },

    #[error("batch {id}: header write matched no rows")]
    NoRowsUpdated { id: BatchId },

    #[error("batch {id}: store failure during {stage}: {source}")]
    Store {
        id: BatchId,
        stage: Stage,
        #[source]
        source: StoreError,
    },
}

impl ReconcileError {
    /// Batch id the failure belongs to.
    pub fn id(&self) -> BatchId {
        match self {
            Self::NotFound { id }
            | Self::FileMissing { id, .. }
            | Self::Io { id, .. }
            | Self::MalformedDocument { id, .. }
            | Self::NoRowsUpdated { id }
            | Self::Store { id, .. } => *id,
        }
    }

    /// Cause tag.
    pub fn cause(&self) -> FailureCause {
        match self {
            Self::NotFound { .. } => FailureCause::NotFound,
            Self::FileMissing { .. } => FailureCause::FileMissing,
            Self::Io { .. } => FailureCause::IoError,
            Self::MalformedDocument { .. } => FailureCause::MalformedDocument,
            Self::NoRowsUpdated { .. } => FailureCause::NoRowsUpdated,
            Self::Store { .. } => FailureCause::StoreError,
        }
    }

    /// Step at which the failure happened.
    pub fn stage(&self) -> Stage {
        match self {
            Self::NotFound { .. } => Stage::Load,
            Self::FileMissing { .. } => Stage::Resolve,
            Self::Io { .. } => Stage::Read,
            Self::MalformedDocument { .. } => Stage::Parse,
            Self::NoRowsUpdated { .. } => Stage::Write,
            Self::Store { stage, .. } => *stage,
        }
    }
}

/// Single-batch reconciler: load, resolve, read, parse, map, write.
pub struct Reconciler {
    store: Box<dyn BatchStore>,
    files: Box<dyn FileSource>,
    parser: Box<dyn DocumentParser>,
    options: ReconcileOptions,
}

impl Reconciler {
    /// Builds a reconciler over the given boundaries.
    pub fn new(
        store: Box<dyn BatchStore>,
        files: Box<dyn FileSource>,
        parser: Box<dyn DocumentParser>,
        options: ReconcileOptions,
    ) -> Self {
        Self {
            store,
            files,
            parser,
            options,
        }
    }

    /// Underlying store.
    pub fn store(&self) -> &dyn BatchStore {
        self.store.as_ref()
    }

    /// Active options.
    pub fn options(&self) -> &ReconcileOptions {
        &self.options
    }

    /// Reconciles the header of batch `id`.
    #[instrument(skip(self), fields(batch_id = id))]
    pub fn reconcile_one(&mut self, id: BatchId) -> Result<ReconcileSuccess, ReconcileError> {
        let record = self
            .store
            .get_by_id(id)
            .map_err(|source| ReconcileError::Store {
                id,
                stage: Stage::Load,
                source,
            })?
            .ok_or(ReconcileError::NotFound { id })?;

        self.reconcile_record(record)
    }

    /// Reconciles one backlog item, converting any error into a failure outcome.
    pub fn reconcile_item(&mut self, item: &BacklogItem) -> ReconciliationOutcome {
        match self.reconcile_one(item.id) {
            Ok(success) => ReconciliationOutcome::Success(success),
            Err(err) => {
                warn!(
                    batch_id = item.id,
                    stage = %err.stage(),
                    cause = %err.cause(),
                    error = %err,
                    "batch skipped"
                );
                let batch_number = (!item.batch_number.is_empty()).then(|| item.batch_number.clone());
                ReconciliationOutcome::Failure(ReconcileFailure {
                    id: item.id,
                    batch_number,
                    stage: err.stage(),
                    cause: err.cause(),
                    message: err.to_string(),
                })
            }
        }
    }

    fn reconcile_record(&mut self, record: BatchRecord) -> Result<ReconcileSuccess, ReconcileError> {
        let id = record.id;
        let path = self.files.resolve(&record.xml_filename);
        if record.xml_filename.trim().is_empty() || !self.files.exists(&path) {
            return Err(ReconcileError::FileMissing { id, path });
        }

        let bytes = self
            .files
            .read_all(&path)
            .map_err(|source| ReconcileError::Io {
                id,
                path: path.clone(),
                source,
            })?;
        debug!(path = %path.display(), bytes = bytes.len(), "read batch file");

        let doc = self
            .parser
            .parse(&bytes)
            .map_err(|source| ReconcileError::MalformedDocument { id, path, source })?;
        let fields = map_header(&doc);

        let status = if doc.header.is_some() {
            WriteStatus::Written
        } else {
            warn!("document has no header section; writing an unset header");
            WriteStatus::HeaderAbsent
        };

        if self.options.skip_unchanged_hash && unchanged(&record.header, &fields) {
            info!(hash = fields.hash.as_deref().unwrap_or_default(), "hash unchanged; write skipped");
            return Ok(ReconcileSuccess {
                id,
                batch_number: record.batch_number,
                fields: record.header,
                status: WriteStatus::Unchanged,
            });
        }

        let rows = self
            .store
            .update_header_fields(id, record.header_version, &fields)
            .map_err(|source| ReconcileError::Store {
                id,
                stage: Stage::Write,
                source,
            })?;
        if rows == 0 {
            return Err(ReconcileError::NoRowsUpdated { id });
        }

        info!(
            batch_number = %record.batch_number,
            transaction_type = fields.transaction_type.as_deref().unwrap_or_default(),
            status = %status,
            "header reconciled"
        );
        Ok(ReconcileSuccess {
            id,
            batch_number: record.batch_number,
            fields,
            status,
        })
    }
}

fn unchanged(stored: &HeaderFields, fresh: &HeaderFields) -> bool {
    stored.is_complete() && fresh.hash.as_deref().is_some_and(|h| !h.is_empty()) && stored.hash == fresh.hash
}

//! Progress events broadcast by the reconciler runtime.

use crate::{
    engine::outcome::{FailureCause, ReconciliationOutcome, Stage, WriteStatus},
    types::BatchId,
};

/// Events emitted from the single-writer runtime loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileEvent {
    /// A bulk run selected its items.
    RunStarted {
        /// Items about to be attempted.
        total: usize,
    },
    /// One batch header was reconciled.
    Reconciled {
        /// Batch id.
        id: BatchId,
        /// Batch number.
        batch_number: String,
        /// Write status.
        status: WriteStatus,
    },
    /// One batch failed and was skipped.
    Failed {
        /// Batch id.
        id: BatchId,
        /// Failing step.
        stage: Stage,
        /// Cause tag.
        cause: FailureCause,
        /// Diagnostic.
        message: String,
    },
    /// A bulk run attempted every item.
    RunFinished {
        /// Items attempted.
        attempted: usize,
        /// Items reconciled.
        succeeded: usize,
        /// Items failed.
        failed: usize,
    },
}

impl From<&ReconciliationOutcome> for ReconcileEvent {
    fn from(outcome: &ReconciliationOutcome) -> Self {
        match outcome {
            ReconciliationOutcome::Success(s) => Self::Reconciled {
                id: s.id,
                batch_number: s.batch_number.clone(),
                status: s.status,
            },
            ReconciliationOutcome::Failure(f) => Self::Failed {
                id: f.id,
                stage: f.stage,
                cause: f.cause,
                message: f.message.clone(),
            },
        }
    }
}

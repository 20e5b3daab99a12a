//! Line-oriented text rendering for operators.

use std::fmt::{self, Write as _};

use crate::{
    batch::BatchRecord,
    engine::outcome::{BulkReport, ReconcileFailure, ReconcileSuccess, ReconciliationOutcome},
    runtime::events::ReconcileEvent,
};

const DASH: &str = "-";

/// One line for a successful item.
pub fn success_line(s: &ReconcileSuccess) -> String {
    format!(
        "ok    batch {} lote={} status={} type={} hash={}",
        s.id,
        non_empty(&s.batch_number),
        s.status,
        non_empty(s.fields.transaction_type.as_deref().unwrap_or_default()),
        non_empty(s.fields.hash.as_deref().unwrap_or_default()),
    )
}

/// One line for a failed item, naming batch, stage, and cause.
pub fn failure_line(f: &ReconcileFailure) -> String {
    format!(
        "FAIL  batch {} lote={} stage={} cause={}: {}",
        f.id,
        non_empty(f.batch_number.as_deref().unwrap_or_default()),
        f.stage,
        f.cause,
        f.message,
    )
}

/// One line per outcome.
pub fn outcome_line(outcome: &ReconciliationOutcome) -> String {
    match outcome {
        ReconciliationOutcome::Success(s) => success_line(s),
        ReconciliationOutcome::Failure(f) => failure_line(f),
    }
}

/// Final tally line.
///
/// Header-absent items are only mentioned when there are some.
pub fn summary_line(report: &BulkReport) -> String {
    let mut line = format!(
        "attempted={} succeeded={} failed={}",
        report.attempted, report.succeeded, report.failed
    );
    if report.header_absent > 0 {
        let _ = write!(line, " header_absent={}", report.header_absent);
    }
    line
}

/// Live progress line for a runtime event.
pub fn event_line(event: &ReconcileEvent) -> String {
    match event {
        ReconcileEvent::RunStarted { total: 0 } => "nothing to reconcile".to_string(),
        ReconcileEvent::RunStarted { total } => format!("reconciling {total} batch(es)"),
        ReconcileEvent::Reconciled {
            id,
            batch_number,
            status,
        } => format!("ok    batch {id} lote={} status={status}", non_empty(batch_number)),
        ReconcileEvent::Failed {
            id,
            stage,
            cause,
            message,
        } => format!("FAIL  batch {id} stage={stage} cause={cause}: {message}"),
        ReconcileEvent::RunFinished {
            attempted,
            succeeded,
            failed,
        } => format!("run finished: {attempted} attempted, {succeeded} ok, {failed} failed"),
    }
}

/// Full text report: one line per outcome, then the tally.
pub struct TextReport<'a>(pub &'a BulkReport);

impl fmt::Display for TextReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for outcome in &self.0.outcomes {
            writeln!(f, "{}", outcome_line(outcome))?;
        }
        write!(f, "{}", summary_line(self.0))
    }
}

/// Inspect listing line: id, batch number, filename, header completeness.
pub fn inspect_line(record: &BatchRecord) -> String {
    let mut line = format!(
        "{:>8}  {:<16}  {:<40}  ",
        record.id,
        non_empty(&record.batch_number),
        non_empty(&record.xml_filename)
    );
    let missing = record.header.missing();
    if missing.is_empty() {
        line.push_str("complete");
    } else if record.header.needs_reconciliation() {
        let _ = write!(line, "pending missing={}", missing.join(","));
    } else {
        let _ = write!(line, "partial missing={}", missing.join(","));
    }
    line
}

fn non_empty(s: &str) -> &str {
    if s.is_empty() { DASH } else { s }
}

use tracing::{info, instrument, warn};

use crate::{batch::BacklogItem, persist::StoreResult};

use super::{
    backlog::select_backlog,
    outcome::{BulkReport, ReconciliationOutcome},
    reconciler::Reconciler,
};

impl Reconciler {
    /// Selects the backlog and reconciles it.
    ///
    /// Fails only when the backlog cannot be selected; per-item failures are
    /// recorded in the report.
    pub fn reconcile_backlog<F>(&mut self, observe: F) -> StoreResult<BulkReport>
    where
        F: FnMut(&ReconciliationOutcome),
    {
        let items = select_backlog(self.store())?;
        Ok(self.reconcile_items(&items, observe))
    }

    /// Reconciles `items` sequentially, in the given order.
    ///
    /// A failing item never stops the run. `observe` sees each outcome as soon
    /// as it is produced.
    #[instrument(skip_all, fields(items = items.len()))]
    pub fn reconcile_items<F>(&mut self, items: &[BacklogItem], mut observe: F) -> BulkReport
    where
        F: FnMut(&ReconciliationOutcome),
    {
        let mut report = BulkReport::with_capacity(items.len());
        for item in items {
            let outcome = self.reconcile_item(item);
            observe(&outcome);
            report.record(outcome);
        }

        if report.is_clean() {
            info!(
                attempted = report.attempted,
                succeeded = report.succeeded,
                header_absent = report.header_absent,
                "bulk run complete"
            );
        } else {
            warn!(
                attempted = report.attempted,
                succeeded = report.succeeded,
                failed = report.failed,
                header_absent = report.header_absent,
                "bulk run degraded"
            );
        }
        report
    }
}

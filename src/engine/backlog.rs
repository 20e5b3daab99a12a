use tracing::{debug, info};

use crate::{
    batch::BacklogItem,
    persist::{BatchStore, StoreResult},
};

/// Selects every batch whose transaction type or hash is unset, ascending id.
///
/// Sorts and de-duplicates here so the processing order does not depend on
/// the store's row order.
pub fn select_backlog(store: &dyn BatchStore) -> StoreResult<Vec<BacklogItem>> {
    let mut items = store.scan_incomplete_headers()?;
    items.sort_by_key(|item| item.id);
    items.dedup_by_key(|item| item.id);

    if items.is_empty() {
        info!("backlog empty; nothing to reconcile");
    } else {
        info!(count = items.len(), "backlog selected");
        debug!(ids = ?items.iter().map(|i| i.id).collect::<Vec<_>>(), "backlog ids");
    }
    Ok(items)
}

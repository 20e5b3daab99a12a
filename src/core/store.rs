use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use hashbrown::HashMap;

use crate::{
    batch::{BacklogItem, BatchRecord, HeaderFields, NewBatch},
    persist::{BatchStore, StoreError, StoreResult},
    types::{BatchId, HeaderVersion},
};

#[derive(Debug, Default)]
struct Inner {
    records: HashMap<BatchId, BatchRecord>,
    next_id: BatchId,
}

/// In-process [`BatchStore`]. Clones share the same records.
///
/// `scan_incomplete_headers` returns rows in hash order, not id order.
#[derive(Debug, Clone, Default)]
pub struct MemoryBatchStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryBatchStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a record with an unset header.
    pub fn insert_batch(&self, batch: &NewBatch) -> StoreResult<BatchId> {
        let mut inner = self.lock()?;
        let id = batch.id.unwrap_or(inner.next_id.max(0) + 1);
        if inner.records.contains_key(&id) {
            return Err(StoreError::Message(format!("batch {id} already exists")));
        }
        inner.next_id = inner.next_id.max(id);
        inner.records.insert(
            id,
            BatchRecord {
                id,
                batch_number: batch.batch_number.clone(),
                xml_filename: batch.xml_filename.clone(),
                header: HeaderFields::unset(),
                header_version: 0,
                reconciled_at_ms: None,
            },
        );
        Ok(id)
    }

    /// Deletes a record. Stands in for external mutation in tests.
    pub fn remove(&self, id: BatchId) -> StoreResult<Option<BatchRecord>> {
        Ok(self.lock()?.records.remove(&id))
    }

    /// Bumps the version of a record without touching its fields.
    pub fn touch(&self, id: BatchId) -> StoreResult<bool> {
        let mut inner = self.lock()?;
        let Some(rec) = inner.records.get_mut(&id) else {
            return Ok(false);
        };
        rec.header_version += 1;
        Ok(true)
    }

    /// Number of records.
    pub fn len(&self) -> StoreResult<usize> {
        Ok(self.lock()?.records.len())
    }

    /// True when the store holds no records.
    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Message("memory store lock poisoned".to_string()))
    }
}

impl BatchStore for MemoryBatchStore {
    fn get_by_id(&self, id: BatchId) -> StoreResult<Option<BatchRecord>> {
        Ok(self.lock()?.records.get(&id).cloned())
    }

    fn scan_incomplete_headers(&self) -> StoreResult<Vec<BacklogItem>> {
        Ok(self
            .lock()?
            .records
            .values()
            .filter(|rec| rec.header.needs_reconciliation())
            .map(BatchRecord::backlog_item)
            .collect())
    }

    fn update_header_fields(
        &mut self,
        id: BatchId,
        expected_version: HeaderVersion,
        fields: &HeaderFields,
    ) -> StoreResult<usize> {
        let mut inner = self.lock()?;
        let Some(rec) = inner.records.get_mut(&id) else {
            return Ok(0);
        };
        if rec.header_version != expected_version {
            return Ok(0);
        }
        rec.header = fields.clone();
        rec.header_version += 1;
        rec.reconciled_at_ms = Some(now_ms());
        Ok(1)
    }

    fn list_batches(&self) -> StoreResult<Vec<BatchRecord>> {
        let mut out: Vec<BatchRecord> = self.lock()?.records.values().cloned().collect();
        out.sort_by_key(|rec| rec.id);
        Ok(out)
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

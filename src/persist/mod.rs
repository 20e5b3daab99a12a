//! Batch store boundary and its SQLite implementation.

/// SQLite-backed batch store.
pub mod sqlite;

use thiserror::Error;

use crate::{
    batch::{BacklogItem, BatchRecord, HeaderFields},
    types::{BatchId, HeaderVersion},
};

/// Store-level failures (connectivity, SQL, lock poisoning).
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite reported an error.
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Any other store failure.
    #[error("{0}")]
    Message(String),
}

/// Store result alias.
pub type StoreResult<T> = Result<T, StoreError>;

/// Relational persistence for batch records.
pub trait BatchStore: Send {
    /// Loads one record, `None` when no row has this id.
    fn get_by_id(&self, id: BatchId) -> StoreResult<Option<BatchRecord>>;

    /// Records whose transaction type or hash is `NULL` or empty, ascending id.
    fn scan_incomplete_headers(&self) -> StoreResult<Vec<BacklogItem>>;

    /// Overwrites all ten header fields of `id` and bumps its version,
    /// provided the stored version still equals `expected_version`.
    /// Returns the number of affected rows.
    fn update_header_fields(
        &mut self,
        id: BatchId,
        expected_version: HeaderVersion,
        fields: &HeaderFields,
    ) -> StoreResult<usize>;

    /// Every record, ascending id.
    fn list_batches(&self) -> StoreResult<Vec<BatchRecord>>;
}

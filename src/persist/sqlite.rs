//! SQLite-backed batch store.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::{Connection, OpenFlags, OptionalExtension, Row, params};

use crate::{
    batch::{BacklogItem, BatchRecord, HeaderFields, NewBatch},
    types::{BatchId, HeaderVersion},
};

use super::{BatchStore, StoreError, StoreResult};

const RECORD_COLUMNS: &str = "id, batch_number, xml_filename, \
    transaction_type, transaction_sequence, registration_date, registration_time, \
    provider_tax_id, provider_name, payer_registry, standard_version, hash, cnes, \
    header_version, reconciled_at_ms";

const INCOMPLETE_HEADER: &str = "transaction_type IS NULL OR transaction_type = '' \
    OR hash IS NULL OR hash = ''";

/// SQLite implementation of [`crate::persist::BatchStore`].
pub struct SqliteBatchStore {
    conn: Connection,
}

impl SqliteBatchStore {
    /// Opens or creates a SQLite database at `path`, installing the schema.
    /// Used to provision databases; the command line never calls it.
    ///
    /// Enables WAL mode and sets `synchronous=NORMAL`.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        Self::init_connection(conn)
    }

    /// Opens an in-memory SQLite store.
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_connection(conn)
    }

    /// Opens an existing database for reconciliation.
    ///
    /// Never creates the file or the schema: a missing file or a database
    /// without a `batches` table is an error.
    pub fn open_existing(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        require_batches_table(&conn, path)?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Ok(Self { conn })
    }

    /// Opens an existing database read-only, for listings.
    pub fn open_read_only(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        require_batches_table(&conn, path)?;
        Ok(Self { conn })
    }

    fn init_connection(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(include_str!("schema.sql"))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Ok(Self { conn })
    }

    /// Inserts a record with an unreconciled (all `NULL`) header.
    pub fn insert_batch(&mut self, batch: &NewBatch) -> StoreResult<BatchId> {
        self.conn.execute(
            "INSERT INTO batches(id, batch_number, xml_filename) VALUES (?1, ?2, ?3)",
            params![batch.id, batch.batch_number, batch.xml_filename],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Underlying connection, for ad-hoc queries.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl BatchStore for SqliteBatchStore {
    fn get_by_id(&self, id: BatchId) -> StoreResult<Option<BatchRecord>> {
        let sql = format!("SELECT {RECORD_COLUMNS} FROM batches WHERE id = ?1");
        let record = self
            .conn
            .query_row(&sql, params![id], record_from_row)
            .optional()?;
        Ok(record)
    }

    fn scan_incomplete_headers(&self) -> StoreResult<Vec<BacklogItem>> {
        let sql = format!(
            "SELECT id, batch_number, xml_filename FROM batches WHERE {INCOMPLETE_HEADER} ORDER BY id ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| {
            Ok(BacklogItem {
                id: row.get(0)?,
                batch_number: row.get(1)?,
                xml_filename: row.get(2)?,
            })
        })?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    fn update_header_fields(
        &mut self,
        id: BatchId,
        expected_version: HeaderVersion,
        fields: &HeaderFields,
    ) -> StoreResult<usize> {
        let count = self.conn.execute(
            "UPDATE batches SET
                transaction_type = ?1,
                transaction_sequence = ?2,
                registration_date = ?3,
                registration_time = ?4,
                provider_tax_id = ?5,
                provider_name = ?6,
                payer_registry = ?7,
                standard_version = ?8,
                hash = ?9,
                cnes = ?10,
                header_version = header_version + 1,
                reconciled_at_ms = ?11
             WHERE id = ?12 AND header_version = ?13",
            params![
                fields.transaction_type,
                fields.transaction_sequence,
                fields.registration_date,
                fields.registration_time,
                fields.provider_tax_id,
                fields.provider_name,
                fields.payer_registry,
                fields.standard_version,
                fields.hash,
                fields.cnes,
                now_ms() as i64,
                id,
                expected_version as i64,
            ],
        )?;
        Ok(count)
    }

    fn list_batches(&self) -> StoreResult<Vec<BatchRecord>> {
        let sql = format!("SELECT {RECORD_COLUMNS} FROM batches ORDER BY id ASC");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], record_from_row)?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

fn require_batches_table(conn: &Connection, path: &Path) -> StoreResult<()> {
    let found: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'batches'",
        [],
        |row| row.get(0),
    )?;
    if found == 0 {
        return Err(StoreError::Message(format!(
            "{} has no batches table",
            path.display()
        )));
    }
    Ok(())
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<BatchRecord> {
    let header_version: i64 = row.get(13)?;
    let reconciled_at_ms: Option<i64> = row.get(14)?;
    Ok(BatchRecord {
        id: row.get(0)?,
        batch_number: row.get(1)?,
        xml_filename: row.get(2)?,
        header: HeaderFields {
            transaction_type: row.get(3)?,
            transaction_sequence: row.get(4)?,
            registration_date: row.get(5)?,
            registration_time: row.get(6)?,
            provider_tax_id: row.get(7)?,
            provider_name: row.get(8)?,
            payer_registry: row.get(9)?,
            standard_version: row.get(10)?,
            hash: row.get(11)?,
            cnes: row.get(12)?,
        },
        header_version: header_version as HeaderVersion,
        reconciled_at_ms: reconciled_at_ms.map(|v| v as u64),
    })
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

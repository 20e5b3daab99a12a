mod common;

use std::{io, path::{Path, PathBuf}};

use common::{HeaderParts, full_xml, memory_reconciler, seed, tiss_xml, write_file};
use loterecon::{
    batch::{BacklogItem, BatchRecord, HeaderFields},
    config::ReconcileOptions,
    core::store::MemoryBatchStore,
    document::tiss::TissParser,
    engine::{
        outcome::{FailureCause, ReconciliationOutcome, Stage, WriteStatus},
        reconciler::{ReconcileError, Reconciler},
    },
    files::{FileSource, UploadDir},
    persist::{BatchStore, StoreError, StoreResult},
    types::{BatchId, HeaderVersion},
};
use tempfile::TempDir;

fn stored(store: &MemoryBatchStore, id: BatchId) -> BatchRecord {
    store.get_by_id(id).expect("get").expect("record exists")
}

/// Runs a store mutation right before the file is read, standing in for a
/// concurrent writer between load and write.
struct InterferingFiles {
    inner: UploadDir,
    store: MemoryBatchStore,
    action: fn(&MemoryBatchStore),
}

impl FileSource for InterferingFiles {
    fn resolve(&self, filename: &str) -> PathBuf {
        self.inner.resolve(filename)
    }

    fn exists(&self, path: &Path) -> bool {
        self.inner.exists(path)
    }

    fn read_all(&self, path: &Path) -> io::Result<Vec<u8>> {
        (self.action)(&self.store);
        self.inner.read_all(path)
    }
}

struct UnreachableStore;

impl BatchStore for UnreachableStore {
    fn get_by_id(&self, _id: BatchId) -> StoreResult<Option<BatchRecord>> {
        Err(StoreError::Message("connection refused".to_string()))
    }

    fn scan_incomplete_headers(&self) -> StoreResult<Vec<BacklogItem>> {
        Err(StoreError::Message("connection refused".to_string()))
    }

    fn update_header_fields(
        &mut self,
        _id: BatchId,
        _expected_version: HeaderVersion,
        _fields: &HeaderFields,
    ) -> StoreResult<usize> {
        Err(StoreError::Message("connection refused".to_string()))
    }

    fn list_batches(&self) -> StoreResult<Vec<BatchRecord>> {
        Err(StoreError::Message("connection refused".to_string()))
    }
}

#[test]
fn writes_all_ten_fields_from_header() {
    let dir = TempDir::new().expect("tempdir");
    let store = MemoryBatchStore::new();
    write_file(dir.path(), "lotes/000001.xml", &full_xml("000001"));
    seed(&store, 1, "lotes/000001.xml");

    let mut reconciler = memory_reconciler(&store, dir.path());
    let done = reconciler.reconcile_one(1).expect("reconcile");

    assert_eq!(done.status, WriteStatus::Written);
    assert_eq!(done.batch_number, "000001");
    let rec = stored(&store, 1);
    assert_eq!(rec.header, done.fields);
    assert!(rec.header.is_complete());
    assert_eq!(rec.header.hash.as_deref(), Some("hash000001"));
    assert_eq!(rec.header.provider_name.as_deref(), Some("Clinica Exemplo"));
    assert_eq!(rec.header_version, 1);
    assert!(rec.reconciled_at_ms.is_some());
    assert!(!rec.header.needs_reconciliation());
}

#[test]
fn unknown_id_is_not_found() {
    let dir = TempDir::new().expect("tempdir");
    let store = MemoryBatchStore::new();
    let mut reconciler = memory_reconciler(&store, dir.path());

    let err = reconciler.reconcile_one(404).unwrap_err();
    assert!(matches!(err, ReconcileError::NotFound { id: 404 }));
    assert_eq!(err.cause(), FailureCause::NotFound);
    assert_eq!(err.stage(), Stage::Load);
}

#[test]
fn absent_file_is_file_missing_and_record_untouched() {
    let dir = TempDir::new().expect("tempdir");
    let store = MemoryBatchStore::new();
    seed(&store, 3, "lotes/nowhere.xml");
    let before = stored(&store, 3);

    let mut reconciler = memory_reconciler(&store, dir.path());
    let err = reconciler.reconcile_one(3).unwrap_err();

    match &err {
        ReconcileError::FileMissing { id, path } => {
            assert_eq!(*id, 3);
            assert_eq!(path, &dir.path().join("lotes/nowhere.xml"));
        }
        other => panic!("expected FileMissing, got {other:?}"),
    }
    assert_eq!(stored(&store, 3), before);
}

#[test]
fn empty_filename_is_file_missing() {
    let dir = TempDir::new().expect("tempdir");
    let store = MemoryBatchStore::new();
    seed(&store, 4, "");

    let mut reconciler = memory_reconciler(&store, dir.path());
    let err = reconciler.reconcile_one(4).unwrap_err();
    assert_eq!(err.cause(), FailureCause::FileMissing);
}

#[test]
fn directory_in_place_of_file_is_file_missing() {
    let dir = TempDir::new().expect("tempdir");
    std::fs::create_dir_all(dir.path().join("lotes/5.xml")).expect("mkdir");
    let store = MemoryBatchStore::new();
    seed(&store, 5, "lotes/5.xml");

    let mut reconciler = memory_reconciler(&store, dir.path());
    assert_eq!(reconciler.reconcile_one(5).unwrap_err().cause(), FailureCause::FileMissing);
}

#[test]
fn leading_separator_stays_under_upload_root() {
    let dir = TempDir::new().expect("tempdir");
    let store = MemoryBatchStore::new();
    write_file(dir.path(), "lotes/6.xml", &full_xml("6"));
    seed(&store, 6, "/lotes/6.xml");

    let mut reconciler = memory_reconciler(&store, dir.path());
    reconciler.reconcile_one(6).expect("reconcile");
}

#[test]
fn malformed_document_leaves_record_unchanged() {
    let dir = TempDir::new().expect("tempdir");
    let store = MemoryBatchStore::new();
    write_file(dir.path(), "bad.xml", "<mensagemTISS><cabecalho>");
    seed(&store, 7, "bad.xml");
    let before = stored(&store, 7);

    let mut reconciler = memory_reconciler(&store, dir.path());
    let err = reconciler.reconcile_one(7).unwrap_err();

    assert_eq!(err.cause(), FailureCause::MalformedDocument);
    assert_eq!(err.stage(), Stage::Parse);
    assert!(err.to_string().contains("bad.xml"));
    assert_eq!(stored(&store, 7), before);
}

#[test]
fn record_deleted_before_write_is_no_rows_updated() {
    let dir = TempDir::new().expect("tempdir");
    let store = MemoryBatchStore::new();
    write_file(dir.path(), "8.xml", &full_xml("8"));
    seed(&store, 8, "8.xml");

    let mut reconciler = Reconciler::new(
        Box::new(store.clone()),
        Box::new(InterferingFiles {
            inner: UploadDir::new(dir.path()),
            store: store.clone(),
            action: |s| {
                s.remove(8).expect("remove");
            },
        }),
        Box::new(TissParser),
        ReconcileOptions::default(),
    );

    let err = reconciler.reconcile_one(8).unwrap_err();
    assert!(matches!(err, ReconcileError::NoRowsUpdated { id: 8 }));
    assert_eq!(err.stage(), Stage::Write);
    assert!(store.get_by_id(8).expect("get").is_none());
}

#[test]
fn concurrent_header_change_is_no_rows_updated() {
    let dir = TempDir::new().expect("tempdir");
    let store = MemoryBatchStore::new();
    write_file(dir.path(), "9.xml", &full_xml("9"));
    seed(&store, 9, "9.xml");

    let mut reconciler = Reconciler::new(
        Box::new(store.clone()),
        Box::new(InterferingFiles {
            inner: UploadDir::new(dir.path()),
            store: store.clone(),
            action: |s| {
                s.touch(9).expect("touch");
            },
        }),
        Box::new(TissParser),
        ReconcileOptions::default(),
    );

    let err = reconciler.reconcile_one(9).unwrap_err();
    assert_eq!(err.cause(), FailureCause::NoRowsUpdated);
    assert!(stored(&store, 9).header.is_unset());
}

#[test]
fn store_failure_on_load_is_reported_at_load() {
    let dir = TempDir::new().expect("tempdir");
    let mut reconciler = Reconciler::new(
        Box::new(UnreachableStore),
        Box::new(UploadDir::new(dir.path())),
        Box::new(TissParser),
        ReconcileOptions::default(),
    );

    let err = reconciler.reconcile_one(1).unwrap_err();
    assert_eq!(err.cause(), FailureCause::StoreError);
    assert_eq!(err.stage(), Stage::Load);
}

#[test]
fn reconciling_twice_gives_same_fields() {
    let dir = TempDir::new().expect("tempdir");
    let store = MemoryBatchStore::new();
    write_file(dir.path(), "10.xml", &full_xml("10"));
    seed(&store, 10, "10.xml");

    let mut reconciler = memory_reconciler(&store, dir.path());
    reconciler.reconcile_one(10).expect("first run");
    let first = stored(&store, 10);
    reconciler.reconcile_one(10).expect("second run");
    let second = stored(&store, 10);

    assert_eq!(first.header, second.header);
    assert_eq!(second.header_version, first.header_version + 1);
}

#[test]
fn missing_header_field_is_stored_as_empty_string() {
    let dir = TempDir::new().expect("tempdir");
    let store = MemoryBatchStore::new();
    let mut parts = HeaderParts::full("11");
    parts.cnes = None;
    write_file(dir.path(), "11.xml", &tiss_xml(Some(&parts), "11", &["1"]));
    seed(&store, 11, "11.xml");

    let mut reconciler = memory_reconciler(&store, dir.path());
    reconciler.reconcile_one(11).expect("reconcile");

    let header = stored(&store, 11).header;
    assert_eq!(header.cnes.as_deref(), Some(""));
    assert!(header.is_uniform());
    assert_eq!(header.missing(), vec!["cnes"]);
    assert!(!header.needs_reconciliation());
}

#[test]
fn document_without_header_writes_unset_header() {
    let dir = TempDir::new().expect("tempdir");
    let store = MemoryBatchStore::new();
    write_file(dir.path(), "12.xml", &tiss_xml(None, "12", &["1"]));
    seed(&store, 12, "12.xml");

    let mut reconciler = memory_reconciler(&store, dir.path());
    let done = reconciler.reconcile_one(12).expect("reconcile");

    assert_eq!(done.status, WriteStatus::HeaderAbsent);
    let rec = stored(&store, 12);
    assert!(rec.header.is_unset());
    assert_eq!(rec.header_version, 1);
    assert!(rec.header.needs_reconciliation());
}

#[test]
fn unchanged_hash_skips_write_when_enabled() {
    let dir = TempDir::new().expect("tempdir");
    let store = MemoryBatchStore::new();
    write_file(dir.path(), "13.xml", &full_xml("13"));
    seed(&store, 13, "13.xml");

    let mut reconciler = Reconciler::new(
        Box::new(store.clone()),
        Box::new(UploadDir::new(dir.path())),
        Box::new(TissParser),
        ReconcileOptions {
            skip_unchanged_hash: true,
        },
    );
    assert_eq!(reconciler.reconcile_one(13).expect("first").status, WriteStatus::Written);
    let after_first = stored(&store, 13);

    let again = reconciler.reconcile_one(13).expect("second");
    assert_eq!(again.status, WriteStatus::Unchanged);
    assert_eq!(again.fields, after_first.header);
    assert_eq!(stored(&store, 13).header_version, after_first.header_version);

    let mut parts = HeaderParts::full("13");
    parts.hash = Some("rehashed".to_string());
    write_file(dir.path(), "13.xml", &tiss_xml(Some(&parts), "13", &["1"]));
    let third = reconciler.reconcile_one(13).expect("third");
    assert_eq!(third.status, WriteStatus::Written);
    assert_eq!(stored(&store, 13).header.hash.as_deref(), Some("rehashed"));
}

#[test]
fn item_failure_carries_stage_cause_and_batch_number() {
    let dir = TempDir::new().expect("tempdir");
    let store = MemoryBatchStore::new();
    seed(&store, 14, "missing.xml");
    let item = stored(&store, 14).backlog_item();

    let mut reconciler = memory_reconciler(&store, dir.path());
    let outcome = reconciler.reconcile_item(&item);

    assert!(!outcome.is_success());
    let failure = outcome.failure().expect("failure outcome");
    assert_eq!(failure.id, 14);
    assert_eq!(failure.batch_number.as_deref(), Some("000014"));
    assert_eq!(failure.stage, Stage::Resolve);
    assert_eq!(failure.cause, FailureCause::FileMissing);
    assert!(failure.message.contains("missing.xml"));
}

#[test]
fn item_success_wraps_reconcile_one() {
    let dir = TempDir::new().expect("tempdir");
    let store = MemoryBatchStore::new();
    write_file(dir.path(), "15.xml", &full_xml("15"));
    seed(&store, 15, "15.xml");

    let mut reconciler = memory_reconciler(&store, dir.path());
    let outcome = reconciler.reconcile_item(&BacklogItem::from_id(15));
    assert!(matches!(outcome, ReconciliationOutcome::Success(ref s) if s.id == 15));
}

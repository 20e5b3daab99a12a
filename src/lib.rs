//! Batch header reconciliation for TISS claim-batch XML documents.
//!
//! Reads each batch's XML file, extracts the transaction header, and writes
//! the ten canonical header fields to the batch record, either for one batch
//! or for the whole backlog of records whose header is still unset.
//!
//! # Examples
//!
//! Single batch over the in-memory store:
//! ```no_run
//! use loterecon::{
//!     batch::NewBatch,
//!     config::ReconcileOptions,
//!     core::store::MemoryBatchStore,
//!     document::tiss::TissParser,
//!     engine::reconciler::Reconciler,
//!     files::UploadDir,
//! };
//!
//! let store = MemoryBatchStore::new();
//! let id = store.insert_batch(&NewBatch {
//!     id: None,
//!     batch_number: "000123".to_string(),
//!     xml_filename: "lotes/000123.xml".to_string(),
//! }).expect("insert");
//!
//! let mut reconciler = Reconciler::new(
//!     Box::new(store.clone()),
//!     Box::new(UploadDir::new("/srv/uploads")),
//!     Box::new(TissParser),
//!     ReconcileOptions::default(),
//! );
//! let done = reconciler.reconcile_one(id).expect("reconcile");
//! println!("{:?}", done.fields.hash);
//! ```
//!
//! Backlog run through the runtime with a SQLite store:
//! ```no_run
//! use loterecon::{
//!     config::ReconcileOptions,
//!     document::tiss::TissParser,
//!     engine::reconciler::Reconciler,
//!     files::UploadDir,
//!     persist::sqlite::SqliteBatchStore,
//!     runtime::handle::spawn_reconciler,
//! };
//!
//! # #[tokio::main]
//! # async fn main() {
//! let store = SqliteBatchStore::open_existing("batches.db").expect("open sqlite");
//! let reconciler = Reconciler::new(
//!     Box::new(store),
//!     Box::new(UploadDir::new("/srv/uploads")),
//!     Box::new(TissParser),
//!     ReconcileOptions::default(),
//! );
//! let handle = spawn_reconciler(reconciler);
//! let report = handle.reconcile_backlog().await.expect("backlog");
//! assert_eq!(report.attempted, report.succeeded + report.failed);
//! handle.shutdown().await.expect("shutdown");
//! # }
//! ```
#![warn(missing_docs)]

/// Batch record, header fields, and backlog projection.
pub mod batch;
/// Engine options and output formats.
pub mod config;
/// In-memory batch store.
pub mod core;
/// Parsed document model and TISS parser.
pub mod document;
/// Reconciler, backlog selector, bulk driver, and outcomes.
pub mod engine;
/// Upload directory access.
pub mod files;
/// Logging setup.
pub mod logging;
/// Header mapper.
pub mod mapper;
/// Batch store boundary and SQLite implementation.
pub mod persist;
/// Text rendering of outcomes and listings.
pub mod report;
/// Single-writer async runtime and events.
pub mod runtime;
/// Shared primitive types.
pub mod types;

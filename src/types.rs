//! Shared primitive IDs.

/// Batch record primary key.
pub type BatchId = i64;
/// Optimistic concurrency token carried by every batch record.
pub type HeaderVersion = u64;

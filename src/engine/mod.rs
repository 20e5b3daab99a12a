//! Reconciliation engine.

/// Backlog selector.
pub mod backlog;
/// Bulk reconciler over a backlog or an explicit item list.
pub mod bulk;
/// Outcome and report types.
pub mod outcome;
/// Single-batch reconciler and its error taxonomy.
pub mod reconciler;

//! In-process batch store.

/// Shared-state memory implementation of the batch store boundary.
pub mod store;

//! Single-writer async runtime and progress events.

/// Progress event payloads.
pub mod events;
/// Handle and command loop implementation.
pub mod handle;

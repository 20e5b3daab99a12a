//! Engine options and output format switches.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Engine switches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileOptions {
    /// Skip the write when the stored header is complete and its hash equals
    /// the document hash. Off by default: headers are overwritten blindly.
    pub skip_unchanged_hash: bool,
}

/// Log line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Bulk report output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Line-oriented text.
    #[default]
    Text,
    /// Pretty-printed JSON.
    Json,
}

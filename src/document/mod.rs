//! Parsed batch document model and the parser boundary.

/// Streaming TISS `mensagemTISS` parser.
pub mod tiss;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Transaction header section. Every field is optional.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TransactionHeader {
    /// Transaction type code.
    pub transaction_type: Option<String>,
    /// Transaction sequence number.
    pub transaction_sequence: Option<String>,
    /// Registration date.
    pub registration_date: Option<String>,
    /// Registration time.
    pub registration_time: Option<String>,
    /// Submitting-provider tax id.
    pub provider_tax_id: Option<String>,
    /// Submitting-provider name.
    pub provider_name: Option<String>,
    /// Payer registry number.
    pub payer_registry: Option<String>,
    /// Standard version/variant identifier.
    pub standard_version: Option<String>,
    /// Integrity hash.
    pub hash: Option<String>,
    /// Facility registry code.
    pub cnes: Option<String>,
}

/// Batch (lote) metadata section.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BatchInfo {
    /// Batch number.
    pub batch_number: Option<String>,
    /// Billing period.
    pub billing_period: Option<String>,
    /// Submission date.
    pub submission_date: Option<String>,
    /// Sum of the declared guide totals, when any were declared.
    pub declared_total: Option<Decimal>,
}

/// Payer (operadora) metadata section.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PayerInfo {
    /// Payer registry number.
    pub registry_number: Option<String>,
    /// Payer name.
    pub name: Option<String>,
}

/// Structured output of a [`DocumentParser`]. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ParsedBatchDocument {
    /// Transaction header, absent when the document has no header section.
    pub header: Option<TransactionHeader>,
    /// Batch metadata.
    pub batch_info: Option<BatchInfo>,
    /// Payer metadata.
    pub payer_info: Option<PayerInfo>,
}

/// Reasons a byte buffer could not be turned into a [`ParsedBatchDocument`].
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum ParseError {
    /// The XML tokenizer rejected the input.
    #[error("invalid XML at byte {position}: {message}")]
    Xml { position: u64, message: String },

    /// No element was found.
    #[error("document has no root element")]
    Empty,

    /// The root element is not a TISS message.
    #[error("unexpected root element <{found}>, expected <{expected}>")]
    UnexpectedRoot {
        found: String,
        expected: &'static str,
    },

    /// End of input reached with open elements.
    #[error("document ended inside <{element}>")]
    Truncated { element: String },

    /// A second top-level element follows the root.
    #[error("content after the root element: <{element}>")]
    TrailingContent { element: String },

    /// Character data before or after the root element.
    #[error("text outside the root element: {text:?}")]
    TextOutsideRoot { text: String },

    /// A typed value (e.g. a monetary amount) could not be parsed.
    #[error("invalid value {value:?} in <{element}>")]
    InvalidValue { element: String, value: String },
}

/// Parser boundary. Implementations must be pure: the same bytes always
/// produce the same document.
pub trait DocumentParser: Send + Sync {
    /// Parses one batch document.
    fn parse(&self, bytes: &[u8]) -> Result<ParsedBatchDocument, ParseError>;
}

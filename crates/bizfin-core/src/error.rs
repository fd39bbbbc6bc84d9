use thiserror::Error;

use crate::types::Currency;

#[derive(Debug, Error)]
pub enum BizFinError {
    #[error("Invalid payment plan ({plan_type}): {reason}")]
    InvalidPlan { plan_type: String, reason: String },

    #[error("Unknown frequency: '{0}'")]
    UnknownFrequency(String),

    #[error("Currency mismatch: expected {expected}, found {found}")]
    CurrencyMismatch { expected: Currency, found: Currency },

    #[error("Duplicate occurrence: source '{source_id}' already has period {period_index}")]
    DuplicateOccurrence {
        source_id: String,
        period_index: u32,
    },

    #[error("Invalid input: {field} — {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Date error: {0}")]
    DateError(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl BizFinError {
    /// True for idempotency conflicts, which callers discard rather than report.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, BizFinError::DuplicateOccurrence { .. })
    }
}

impl From<serde_json::Error> for BizFinError {
    fn from(e: serde_json::Error) -> Self {
        BizFinError::SerializationError(e.to_string())
    }
}

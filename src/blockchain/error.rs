use thiserror::Error;

/// Everything the ledger engine can reject.
///
/// A hash-inconsistent chain is not an error: it is reported by
/// `Blockchain::is_chain_valid` as `false`.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("missing required field(s): {}", .fields.join(", "))]
    Validation { fields: Vec<&'static str> },

    #[error("invalid {field}: {reason}")]
    InvalidField {
        field: &'static str,
        reason: String,
    },

    #[error("malformed ledger snapshot: {0}")]
    Deserialization(String),

    #[error("block does not extend the current tail (expected previous hash {expected}, found {found})")]
    StaleBlock { expected: String, found: String },

    #[error("invalid block: {0}")]
    InvalidBlock(String),

    #[error("mining cancelled")]
    MiningCancelled,
}

impl LedgerError {
    /// Rejections caused by the submitted record itself.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. } | Self::InvalidField { .. })
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Deserialization(err.to_string())
    }
}

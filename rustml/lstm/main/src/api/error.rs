//! Error types for LSTM training and inference

use thiserror::Error;

/// Result type for LSTM operations
pub type LstmResult<T> = Result<T, LstmError>;

/// Errors raised by the setup and I/O paths.
///
/// The numeric kernels never return errors: they operate on buffers whose
/// sizes were fixed when the layer was built.
#[derive(Debug, Error)]
pub enum LstmError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    #[error("Malformed network file: {0}")]
    Format(String),

    #[error("Symbol table is full (capacity {0})")]
    SymbolCapacity(usize),

    #[error("Training corpus is empty")]
    EmptyCorpus,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

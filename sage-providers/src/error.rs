//! ABOUTME: Model Adapter error taxonomy

use thiserror::Error;

/// Errors the Model Adapter can surface. Callers (the Generation Controller)
/// map each variant to a distinct response outcome.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Unrecoverable failure at the tensor-operation layer for this prompt;
    /// triggers the simple-fallback path, not a retry.
    #[error("decode failure: {reason}")]
    DecodeFailure { reason: String },

    #[error("out of memory")]
    Oom,

    #[error("model not loaded")]
    ModelNotLoaded,

    #[error("transient provider failure: {source}")]
    Transient {
        #[source]
        source: anyhow::Error,
    },
}

pub type Result<T> = std::result::Result<T, ModelError>;

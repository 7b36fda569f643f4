//! ABOUTME: Error types shared across the SAGE RAG serving core
//! ABOUTME: Provides the top-level `CoreError` enum and `Result` alias

use thiserror::Error;

/// Crate-wide error type for the RAG serving core.
///
/// Component crates (`sage-storage`, `sage-providers`, `sage-rag`, ...) define
/// their own narrower error enums and convert into this one via `#[from]` at
/// the boundary where a result needs to be mapped onto an HTTP status or an
/// RPC response field (see `outcome()` below).
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("validation failed: {message}")]
    Validation { message: String },

    #[error("authentication required")]
    AuthenticationRequired,

    #[error("forbidden: {reason}")]
    Forbidden { reason: String },

    #[error("guardrail refusal: {message}")]
    GuardrailRefusal { message: String },

    #[error("model unavailable: {message}")]
    ModelUnavailable { message: String },

    #[error("vector store unavailable: {message}")]
    VectorStoreUnavailable { message: String },

    #[error("generation failed: {source}")]
    Generation {
        #[source]
        source: anyhow::Error,
    },

    #[error("transient failure: {source}")]
    Transient {
        #[source]
        source: anyhow::Error,
    },

    #[error("internal error: {message}")]
    Internal { message: String },
}

/// The disposition a [`CoreError`] maps to at the transport boundary.
///
/// Guardrail refusals and decode-failure fallbacks are not really errors by
/// the time they reach a transport handler (they've already been turned into
/// an `Answer`); this enum only covers the cases that still need mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorOutcome {
    /// Maps to HTTP 400 / 422, gRPC `INVALID_ARGUMENT`.
    BadRequest,
    /// Maps to HTTP 401.
    Unauthorized,
    /// Maps to HTTP 403.
    Forbidden,
    /// Maps to HTTP 503.
    Unavailable,
    /// Maps to HTTP 500, or a retryable RPC status.
    Transient,
    /// Maps to HTTP 500, no retry implied.
    Internal,
}

impl CoreError {
    /// Classify this error for the transport layer, per the taxonomy in
    /// the serving core's error handling design.
    #[must_use]
    pub const fn outcome(&self) -> ErrorOutcome {
        match self {
            Self::Validation { .. } => ErrorOutcome::BadRequest,
            Self::AuthenticationRequired => ErrorOutcome::Unauthorized,
            Self::Forbidden { .. } => ErrorOutcome::Forbidden,
            Self::ModelUnavailable { .. } | Self::VectorStoreUnavailable { .. } => {
                ErrorOutcome::Unavailable
            }
            Self::GuardrailRefusal { .. } => ErrorOutcome::BadRequest,
            Self::Transient { .. } => ErrorOutcome::Transient,
            Self::Generation { .. } | Self::Internal { .. } => ErrorOutcome::Internal,
        }
    }
}

/// Convenience `Result` alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, CoreError>;

//! ABOUTME: The Model Adapter contract over a quantized generative model
//! ABOUTME: Mirrors the teacher's ProviderInstance trait, narrowed to complete/stream

use async_trait::async_trait;
use futures::stream::Stream;
use std::pin::Pin;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::params::GenerationParams;

/// A finite, ordered sequence of text tokens produced by a streaming call.
pub type TokenStream = Pin<Box<dyn Stream<Item = String> + Send>>;

/// Capabilities a given Model Adapter implementation advertises, mirroring
/// the shape of the provider abstraction this trait is narrowed from.
#[derive(Debug, Clone)]
pub struct ModelCapabilities {
    pub name: String,
    pub model: String,
    pub context_window: usize,
    pub supports_streaming: bool,
}

/// Blocking completion and cancellable streaming over a single, process-wide
/// model handle.
///
/// Implementations own exactly one model handle for the process lifetime;
/// concurrent calls are serialized by the caller (the Generation
/// Controller's worker-pool-of-one), not by this trait.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ModelAdapter: Send + Sync {
    fn capabilities(&self) -> &ModelCapabilities;

    /// `true` once the model handle has been initialized and is ready to
    /// serve `complete`/`stream` calls; used by the readiness probe.
    fn is_loaded(&self) -> bool;

    /// Run `prompt` to completion and return the full text.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::ModelError::DecodeFailure`] if the model
    /// fails at the tensor-operation layer for this prompt,
    /// [`crate::error::ModelError::ModelNotLoaded`] if the handle was never
    /// initialized, or [`crate::error::ModelError::Transient`] /
    /// [`crate::error::ModelError::Oom`] for resource failures.
    async fn complete(&self, prompt: &str, params: &GenerationParams) -> Result<String>;

    /// Start a streaming completion. The returned stream yields tokens
    /// until a natural stop, a stop-sequence match, or `cancel` is
    /// triggered; the producer must stop within 200ms of cancellation.
    ///
    /// # Errors
    ///
    /// Same taxonomy as [`ModelAdapter::complete`].
    async fn stream(
        &self,
        prompt: &str,
        params: &GenerationParams,
        cancel: CancellationToken,
    ) -> Result<TokenStream>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModelError;

    #[tokio::test]
    async fn mock_adapter_surfaces_decode_failure_distinctly_from_other_errors() {
        let mut mock = MockModelAdapter::new();
        mock.expect_complete()
            .returning(|_, _| Err(ModelError::DecodeFailure { reason: "tensor shape mismatch".to_string() }));

        let params = GenerationParams::standard(512);
        let result = mock.complete("explain photosynthesis", &params).await;
        assert!(matches!(result, Err(ModelError::DecodeFailure { .. })));
    }

    #[tokio::test]
    async fn mock_adapter_reports_not_loaded_before_first_use() {
        let mut mock = MockModelAdapter::new();
        mock.expect_is_loaded().return_const(false);
        assert!(!mock.is_loaded());
    }
}

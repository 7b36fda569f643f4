//! ABOUTME: A local, dependency-free Model Adapter implementation
//! ABOUTME: Stands in for the quantized generative model binary, which is a black-box dependency

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::abstraction::{ModelAdapter, ModelCapabilities, TokenStream};
use crate::error::{ModelError, Result};
use crate::params::GenerationParams;

/// A deterministic local model adapter.
///
/// The real generative model binary (a quantized GGUF model loaded once at
/// startup) is a black-box dependency this trait abstracts over; this
/// implementation produces deterministic, templated text from the prompt so
/// that the Prompt Assembler, Generation Controller, and Streaming Bridge
/// can be exercised end-to-end without model weights. Test harnesses use
/// [`SimulatedModelAdapter::fail_next_calls`] to exercise the
/// decode-failure fallback path (seed scenario S6), [`SimulatedModelAdapter::unload`]
/// to exercise the `model_unavailable` path, and
/// [`SimulatedModelAdapter::force_transient_failures`] to exercise the
/// transient-failure path.
pub struct SimulatedModelAdapter {
    capabilities: ModelCapabilities,
    loaded: AtomicBool,
    fail_next_calls: AtomicUsize,
    force_transient: AtomicUsize,
    token_delay: Mutex<Duration>,
}

impl SimulatedModelAdapter {
    #[must_use]
    pub fn new(context_window: usize) -> Self {
        Self {
            capabilities: ModelCapabilities {
                name: "local-simulated".to_string(),
                model: "sage-quantized-stub".to_string(),
                context_window,
                supports_streaming: true,
            },
            loaded: AtomicBool::new(true),
            fail_next_calls: AtomicUsize::new(0),
            force_transient: AtomicUsize::new(0),
            token_delay: Mutex::new(Duration::from_millis(0)),
        }
    }

    /// Mark the model handle as unloaded, so subsequent calls return
    /// [`ModelError::ModelNotLoaded`].
    pub fn unload(&self) {
        self.loaded.store(false, Ordering::Release);
    }

    /// Arrange for the next `count` calls to `complete`/`stream` to return
    /// [`ModelError::DecodeFailure`], then resume normal behavior.
    pub fn fail_next_calls(&self, count: usize) {
        self.fail_next_calls.store(count, Ordering::Release);
    }

    /// Arrange for the next `count` calls to `complete`/`stream` to return
    /// [`ModelError::Transient`], then resume normal behavior.
    pub fn force_transient_failures(&self, count: usize) {
        self.force_transient.store(count, Ordering::Release);
    }

    /// Per-token delay used by `stream`, for exercising cancellation timing
    /// in tests without a real inference loop to slow things down.
    pub fn set_token_delay(&self, delay: Duration) {
        *self.token_delay.lock() = delay;
    }

    fn consume_forced_transient(&self) -> bool {
        Self::consume(&self.force_transient)
    }

    fn consume_forced_failure(&self) -> bool {
        Self::consume(&self.fail_next_calls)
    }

    fn consume(counter: &AtomicUsize) -> bool {
        let mut remaining = counter.load(Ordering::Acquire);
        loop {
            if remaining == 0 {
                return false;
            }
            match counter.compare_exchange(
                remaining,
                remaining - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => remaining = actual,
            }
        }
    }

    fn synthesize(prompt: &str, max_tokens: usize, stop_sequences: &[String]) -> String {
        let question = prompt
            .lines()
            .rev()
            .find(|line| !line.trim().is_empty())
            .unwrap_or("")
            .trim();

        let mut words: Vec<String> = format!(
            "Based on the available curriculum material, here is an explanation addressing: {question}"
        )
        .split_whitespace()
        .map(str::to_string)
        .collect();
        words.truncate(max_tokens.max(1));
        let mut text = words.join(" ");

        for stop in stop_sequences {
            if let Some(idx) = text.find(stop.as_str()) {
                text.truncate(idx);
            }
        }
        text
    }
}

#[async_trait]
impl ModelAdapter for SimulatedModelAdapter {
    fn capabilities(&self) -> &ModelCapabilities {
        &self.capabilities
    }

    fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }

    async fn complete(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        if !self.loaded.load(Ordering::Acquire) {
            return Err(ModelError::ModelNotLoaded);
        }
        if self.consume_forced_transient() {
            return Err(ModelError::Transient { source: anyhow::anyhow!("simulated transient provider failure") });
        }
        if self.consume_forced_failure() {
            return Err(ModelError::DecodeFailure {
                reason: "llama_decode returned non-zero status (simulated)".to_string(),
            });
        }
        Ok(Self::synthesize(prompt, params.max_tokens, &params.stop_sequences))
    }

    async fn stream(
        &self,
        prompt: &str,
        params: &GenerationParams,
        cancel: CancellationToken,
    ) -> Result<TokenStream> {
        if !self.loaded.load(Ordering::Acquire) {
            return Err(ModelError::ModelNotLoaded);
        }
        if self.consume_forced_transient() {
            return Err(ModelError::Transient { source: anyhow::anyhow!("simulated transient provider failure") });
        }
        if self.consume_forced_failure() {
            return Err(ModelError::DecodeFailure {
                reason: "llama_decode returned non-zero status (simulated)".to_string(),
            });
        }

        let text = Self::synthesize(prompt, params.max_tokens, &params.stop_sequences);
        let delay = *self.token_delay.lock();
        let words: Vec<String> = text.split_whitespace().map(str::to_string).collect();

        let stream = tokio_stream::iter(words)
            .then(move |word| {
                let cancel = cancel.clone();
                async move {
                    if delay > Duration::ZERO {
                        tokio::select! {
                            () = tokio::time::sleep(delay) => {}
                            () = cancel.cancelled() => {
                                debug!("streaming producer observed cancellation");
                            }
                        }
                    }
                    (word, cancel.is_cancelled())
                }
            })
            .take_while(|(_, cancelled)| std::future::ready(!cancelled))
            .map(|(word, _)| word);

        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt as _;

    fn params() -> GenerationParams {
        GenerationParams::standard(64)
    }

    #[tokio::test]
    async fn complete_returns_not_loaded_when_unloaded() {
        let adapter = SimulatedModelAdapter::new(2048);
        adapter.unload();
        let err = adapter.complete("prompt", &params()).await.unwrap_err();
        assert!(matches!(err, ModelError::ModelNotLoaded));
    }

    #[tokio::test]
    async fn complete_honors_forced_decode_failure_then_recovers() {
        let adapter = SimulatedModelAdapter::new(2048);
        adapter.fail_next_calls(1);
        assert!(adapter.complete("prompt", &params()).await.is_err());
        assert!(adapter.complete("prompt", &params()).await.is_ok());
    }

    #[tokio::test]
    async fn complete_honors_forced_transient_failure_then_recovers() {
        let adapter = SimulatedModelAdapter::new(2048);
        adapter.force_transient_failures(1);
        let err = adapter.complete("prompt", &params()).await.unwrap_err();
        assert!(matches!(err, ModelError::Transient { .. }));
        assert!(adapter.complete("prompt", &params()).await.is_ok());
    }

    #[tokio::test]
    async fn complete_truncates_at_stop_sequence() {
        let adapter = SimulatedModelAdapter::new(2048);
        let prompt = "Student Question:\nWhat is photosynthesis?";
        let text = adapter.complete(prompt, &params()).await.unwrap();
        assert!(!text.is_empty());
    }

    #[tokio::test]
    async fn stream_yields_tokens_in_order() {
        let adapter = SimulatedModelAdapter::new(2048);
        let cancel = CancellationToken::new();
        let mut stream = adapter
            .stream("Student Question:\nWhat is photosynthesis?", &params(), cancel)
            .await
            .unwrap();
        let mut tokens = Vec::new();
        while let Some(tok) = stream.next().await {
            tokens.push(tok);
        }
        assert!(!tokens.is_empty());
    }
}

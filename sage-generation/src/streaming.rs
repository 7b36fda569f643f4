//! ABOUTME: The Streaming Bridge: converts blocking model token iteration into an ordered event sequence

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use sage_core::{ConversationTurn, GenerationMode, Question, SourceDocument, StreamEvent};
use sage_providers::{GenerationParams, ModelAdapter};
use sage_rag::PromptAssembler;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::debug;

const STANDARD_MAX_TOKENS: usize = 512;

/// Drives a streaming generation request, emitting [`StreamEvent`]s in the
/// fixed order: status, optional sources, status, one or more tokens,
/// metadata, done. A caller-supplied [`CancellationToken`] stops the
/// producer within the spec's 200ms grace period; no metadata event is
/// emitted if cancellation won the race.
pub struct StreamingBridge {
    model: Arc<dyn ModelAdapter>,
    assembler: PromptAssembler,
}

impl StreamingBridge {
    #[must_use]
    pub fn new(model: Arc<dyn ModelAdapter>, n_ctx: usize) -> Self {
        Self { model, assembler: PromptAssembler::new(n_ctx) }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn run(
        &self,
        question: Question,
        sources: Vec<SourceDocument>,
        conversation: Vec<ConversationTurn>,
        mode: GenerationMode,
        include_sources: bool,
        cancel: CancellationToken,
    ) -> ReceiverStream<StreamEvent> {
        let (tx, rx) = mpsc::channel(32);
        let model = Arc::clone(&self.model);
        let plan =
            self.assembler.assemble(&question, &sources, &conversation, mode, STANDARD_MAX_TOKENS);

        tokio::spawn(async move {
            let started = Instant::now();

            if tx
                .send(StreamEvent::Status { message: "Retrieving relevant documents...".to_string() })
                .await
                .is_err()
            {
                return;
            }

            if include_sources
                && tx.send(StreamEvent::Sources { sources: sources.clone() }).await.is_err()
            {
                return;
            }

            if tx
                .send(StreamEvent::Status { message: "Generating answer...".to_string() })
                .await
                .is_err()
            {
                return;
            }

            let params = GenerationParams::standard(STANDARD_MAX_TOKENS);
            let mut token_stream = match model.stream(&plan.render(), &params, cancel.clone()).await {
                Ok(stream) => stream,
                Err(err) => {
                    let _ = tx.send(StreamEvent::Error { message: err.to_string() }).await;
                    return;
                }
            };

            loop {
                tokio::select! {
                    () = cancel.cancelled() => {
                        debug!("stream cancelled; stopping producer without emitting metadata");
                        return;
                    }
                    next = token_stream.next() => {
                        match next {
                            Some(token) => {
                                if tx.send(StreamEvent::Token { content: token }).await.is_err() {
                                    return;
                                }
                            }
                            None => break,
                        }
                    }
                }
            }

            let confidence = Self::confidence(&sources);
            let processing_time_s = started.elapsed().as_secs_f64();
            let _ = tx.send(StreamEvent::Metadata { processing_time_s, confidence }).await;
            let _ = tx.send(StreamEvent::Done).await;
        });

        ReceiverStream::new(rx)
    }

    fn confidence(sources: &[SourceDocument]) -> f32 {
        if sources.is_empty() {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let bonus = 0.1 * sources.len() as f32;
        (0.3 + bonus).min(1.0).min(0.7)
    }
}

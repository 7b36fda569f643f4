//! ABOUTME: The tonic gRPC surface; mirrors the HTTP surface's request shapes

use std::sync::Arc;

use sage_core::{ClassFilter, CoreError, Question, SourceDocument, TurnRole};
use sage_coordinator::{ChatRequest, Core};
use tonic::{Request, Response, Status};

pub mod proto {
    tonic::include_proto!("sage.v1");
}

use proto::sage_server::Sage;
use proto::{
    ChatRequest as ProtoChatRequest, ChatResponse, ConversationTurn as ProtoConversationTurn,
    HealthRequest, HealthResponse, SearchRequest, SearchResponse, SourceDocument as ProtoSourceDocument,
    StatsRequest, StatsResponse,
};

pub struct SageService {
    core: Arc<Core>,
}

impl SageService {
    #[must_use]
    pub fn new(core: Arc<Core>) -> Self {
        Self { core }
    }
}

fn proto_source(doc: SourceDocument) -> ProtoSourceDocument {
    ProtoSourceDocument {
        content: doc.content,
        source_class: u32::from(doc.source_class),
        similarity: doc.similarity,
        distance: doc.distance,
        rank: u32::try_from(doc.rank).unwrap_or(u32::MAX),
        metadata: doc.metadata,
    }
}

fn mode_used_str(mode: sage_core::ModeUsed) -> &'static str {
    match mode {
        sage_core::ModeUsed::Grounded => "grounded",
        sage_core::ModeUsed::PureLlm => "pure_llm",
        sage_core::ModeUsed::StepByStep => "step_by_step",
        sage_core::ModeUsed::SimpleFallback => "simple_fallback",
        sage_core::ModeUsed::Refused => "refused",
    }
}

fn conversation_history(turns: Vec<ProtoConversationTurn>) -> Vec<sage_core::ConversationTurn> {
    turns
        .into_iter()
        .map(|turn| sage_core::ConversationTurn {
            role: if turn.role == "assistant" { TurnRole::Assistant } else { TurnRole::User },
            content: turn.content,
            timestamp: None,
        })
        .collect()
}

/// Every RPC reports component-level failure via a populated
/// `error_message` with `success = false` on the response message, never
/// as an RPC status error; `Status` is reserved for transport-level
/// failure the caller cannot recover from at the application layer.
#[tonic::async_trait]
impl Sage for SageService {
    async fn process_chat(
        &self,
        request: Request<ProtoChatRequest>,
    ) -> Result<Response<ChatResponse>, Status> {
        let body = request.into_inner();
        let chat_request = ChatRequest {
            question: body.message,
            class_num: body.class_num.and_then(|n| u8::try_from(n).ok()),
            conversation_history: conversation_history(body.conversation_history),
            include_sources: body.include_sources,
            max_sources: usize::try_from(body.max_sources).unwrap_or(sage_coordinator::DEFAULT_MAX_SOURCES),
        };

        match self.core.process(chat_request).await {
            Ok(answer) => Ok(Response::new(ChatResponse {
                success: true,
                error_message: String::new(),
                answer: answer.text,
                sources: answer.sources.into_iter().map(proto_source).collect(),
                confidence: answer.confidence,
                processing_time_s: answer.processing_time_s,
                cache_hit: answer.cache_hit,
                mode_used: mode_used_str(answer.mode_used).to_string(),
            })),
            Err(err) => Ok(Response::new(ChatResponse {
                success: false,
                error_message: err.to_string(),
                answer: String::new(),
                sources: Vec::new(),
                confidence: 0.0,
                processing_time_s: 0.0,
                cache_hit: false,
                mode_used: String::new(),
            })),
        }
    }

    async fn search_documents(
        &self,
        request: Request<SearchRequest>,
    ) -> Result<Response<SearchResponse>, Status> {
        let body = request.into_inner();
        let started = std::time::Instant::now();

        let question = match Question::parse(&body.question) {
            Ok(question) => question,
            Err(message) => {
                return Ok(Response::new(SearchResponse {
                    success: false,
                    error_message: CoreError::Validation { message }.to_string(),
                    results: Vec::new(),
                    total_results: 0,
                    processing_time_s: 0.0,
                }))
            }
        };
        let class_filter = match ClassFilter::from_optional(body.class_num.and_then(|n| u8::try_from(n).ok())) {
            Ok(filter) => filter,
            Err(message) => {
                return Ok(Response::new(SearchResponse {
                    success: false,
                    error_message: CoreError::Validation { message }.to_string(),
                    results: Vec::new(),
                    total_results: 0,
                    processing_time_s: 0.0,
                }))
            }
        };

        let top_k = usize::try_from(body.top_k).unwrap_or(sage_coordinator::DEFAULT_MAX_SOURCES);
        let results = self
            .core
            .search_documents(&question, class_filter, top_k, body.similarity_threshold)
            .await;

        Ok(Response::new(SearchResponse {
            success: true,
            error_message: String::new(),
            total_results: u32::try_from(results.len()).unwrap_or(u32::MAX),
            results: results.into_iter().map(proto_source).collect(),
            processing_time_s: started.elapsed().as_secs_f64(),
        }))
    }

    async fn get_health(&self, _request: Request<HealthRequest>) -> Result<Response<HealthResponse>, Status> {
        let ready = self.core.is_ready().await;
        Ok(Response::new(HealthResponse { success: true, error_message: String::new(), ready, live: true }))
    }

    async fn get_stats(&self, _request: Request<StatsRequest>) -> Result<Response<StatsResponse>, Status> {
        let stats = self.core.stats();
        Ok(Response::new(StatsResponse {
            success: true,
            error_message: String::new(),
            total_queries: stats.total_queries,
            cache_hits: stats.cache_hits,
            cache_hit_rate: stats.cache_hit_rate,
            avg_processing_time_s: stats.avg_processing_time_s,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sage_providers::SimulatedModelAdapter;
    use sage_storage::{HashingEmbedder, InMemoryVectorIndex, VectorIndex};
    use tempfile::tempdir;

    async fn make_service() -> SageService {
        let dir = tempdir().unwrap();
        let embedder = Arc::new(HashingEmbedder::default());
        let index: Arc<dyn VectorIndex> =
            Arc::new(InMemoryVectorIndex::open(embedder, dir.path().to_path_buf()).unwrap());
        for class_num in 1..=12u8 {
            index.open_or_create(class_num).await.unwrap();
        }
        let model: Arc<dyn sage_providers::ModelAdapter> = Arc::new(SimulatedModelAdapter::new(4096));
        SageService::new(Arc::new(Core::new(index, model, 4096, 10)))
    }

    #[tokio::test]
    async fn process_chat_reports_validation_failure_inline_not_as_status() {
        let service = make_service().await;
        let response = service
            .process_chat(Request::new(ProtoChatRequest {
                message: String::new(),
                class_num: None,
                conversation_history: Vec::new(),
                include_sources: true,
                max_sources: 5,
            }))
            .await
            .unwrap()
            .into_inner();
        assert!(!response.success);
        assert!(!response.error_message.is_empty());
    }

    #[tokio::test]
    async fn get_health_reports_model_and_store_availability() {
        let service = make_service().await;
        let response = service.get_health(Request::new(HealthRequest {})).await.unwrap().into_inner();
        assert!(response.success);
        assert!(response.live);
    }
}

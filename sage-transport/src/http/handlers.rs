//! ABOUTME: Route handlers for the `/api/v1` HTTP surface

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use futures::Stream;
use sage_core::{ClassFilter, CoreError, Question};
use sage_coordinator::ChatRequest;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::dto::{
    AdminStats, BulkSearchBody, BulkSearchEntry, BulkSearchResponse, CacheClearResponse,
    ChatAskBody, ChatAskResponse, ClassOverviewResponse, DatabaseClassStatus,
    DatabaseStatusResponse, DetailedHealthResponse, HealthResponse, ReadinessResponse,
    SearchDocumentsBody, SearchDocumentsResponse, TopicSearchQuery,
};
use super::error::ApiError;
use super::identity;
use super::AppState;

fn parse_question(raw: &str) -> Result<Question, ApiError> {
    Question::parse(raw).map_err(|message| ApiError(CoreError::Validation { message }))
}

fn parse_class_filter(class_num: Option<u8>) -> Result<ClassFilter, ApiError> {
    ClassFilter::from_optional(class_num).map_err(|message| ApiError(CoreError::Validation { message }))
}

/// `/search/topics` relaxes the similarity floor relative to
/// `/search/documents`'s default of 0.5, since a topic browse is meant to
/// surface more loosely related material than a direct document search.
const TOPIC_SEARCH_SIMILARITY_THRESHOLD: f32 = 0.3;

pub async fn chat_ask(
    State(state): State<AppState>,
    Json(body): Json<ChatAskBody>,
) -> Result<Json<ChatAskResponse>, ApiError> {
    let request = ChatRequest {
        question: body.message,
        class_num: body.class_num,
        conversation_history: body.conversation_history,
        include_sources: body.include_sources,
        max_sources: body.max_sources,
    };
    let answer = state.core.process(request).await?;
    Ok(Json(answer.into()))
}

struct GuardedStream<S> {
    inner: S,
    _cancel_on_drop: CancelOnDrop,
}

struct CancelOnDrop(CancellationToken);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

impl<S: Stream + Unpin> Stream for GuardedStream<S> {
    type Item = S::Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

pub async fn chat_ask_stream(
    State(state): State<AppState>,
    Json(body): Json<ChatAskBody>,
) -> Result<impl IntoResponse, ApiError> {
    let request = ChatRequest {
        question: body.message,
        class_num: body.class_num,
        conversation_history: body.conversation_history,
        include_sources: body.include_sources,
        max_sources: body.max_sources,
    };
    let cancel = CancellationToken::new();
    let events = state.core.process_stream(request, cancel.clone()).await?;
    let events = GuardedStream { inner: events, _cancel_on_drop: CancelOnDrop(cancel) };
    let sse_events = futures::StreamExt::map(events, |event| {
        let payload = serde_json::to_string(&event).unwrap_or_else(|_| "{}".to_string());
        Ok(Event::default().data(payload))
    });
    let sse = Sse::new(sse_events).keep_alive(KeepAlive::default());

    let mut headers = HeaderMap::new();
    headers.insert(axum::http::header::CACHE_CONTROL, "no-cache".parse().unwrap());
    headers.insert(axum::http::header::CONNECTION, "keep-alive".parse().unwrap());
    headers.insert("X-Accel-Buffering", "no".parse().unwrap());
    Ok((headers, sse))
}

pub async fn search_documents(
    State(state): State<AppState>,
    Json(body): Json<SearchDocumentsBody>,
) -> Result<Json<SearchDocumentsResponse>, ApiError> {
    let question = parse_question(&body.question)?;
    let class_filter = parse_class_filter(body.class_num)?;
    let results = state
        .core
        .search_documents(&question, class_filter, body.top_k, body.similarity_threshold)
        .await;
    Ok(Json(SearchDocumentsResponse { total_results: results.len(), results }))
}

pub async fn search_topics(
    State(state): State<AppState>,
    Query(query): Query<TopicSearchQuery>,
) -> Result<Json<SearchDocumentsResponse>, ApiError> {
    let question = parse_question(&query.topic)?;
    let class_filter = parse_class_filter(query.class_num)?;
    let results = state
        .core
        .search_documents(&question, class_filter, query.top_k, TOPIC_SEARCH_SIMILARITY_THRESHOLD)
        .await;
    Ok(Json(SearchDocumentsResponse { total_results: results.len(), results }))
}

pub async fn search_class_overview(
    State(state): State<AppState>,
    Path(class_num): Path<u8>,
) -> Result<Json<ClassOverviewResponse>, ApiError> {
    if !(1..=12).contains(&class_num) {
        return Err(ApiError(CoreError::Validation {
            message: format!("class_num {class_num} out of range 1..=12"),
        }));
    }
    let document_count = state
        .core
        .class_count(class_num)
        .await
        .map_err(|message| CoreError::VectorStoreUnavailable { message })?;
    Ok(Json(ClassOverviewResponse { class_num, document_count }))
}

/// At most three questions are searched concurrently; the rest wait on the
/// semaphore. A single question's failure is reported inline and never
/// fails the batch.
pub async fn search_bulk(
    State(state): State<AppState>,
    Json(body): Json<BulkSearchBody>,
) -> Result<Json<BulkSearchResponse>, ApiError> {
    let class_filter = parse_class_filter(body.class_num)?;
    let top_k = body.top_k;
    let semaphore = Arc::clone(&state.bulk_search_semaphore);
    let futures = body.questions.into_iter().map(|raw_question| {
        let state = state.clone();
        let semaphore = Arc::clone(&semaphore);
        async move {
            let _permit = semaphore.acquire().await.expect("semaphore never closed");
            match Question::parse(&raw_question) {
                Ok(question) => {
                    let documents = state.core.search_documents(&question, class_filter, top_k, 0.5).await;
                    BulkSearchEntry { question: raw_question, documents, error: None }
                }
                Err(message) => BulkSearchEntry { question: raw_question, documents: Vec::new(), error: Some(message) },
            }
        }
    });
    let results = futures::future::join_all(futures).await;
    Ok(Json(BulkSearchResponse { results }))
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

pub async fn health_live() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

pub async fn health_ready(State(state): State<AppState>) -> Json<ReadinessResponse> {
    Json(ReadinessResponse { ready: state.core.is_ready().await })
}

async fn database_status(state: &AppState) -> DatabaseStatusResponse {
    let counts = state.core.per_class_counts().await;
    let mut classes = HashMap::with_capacity(counts.len());
    for (class_num, result) in counts {
        let status = match result {
            Ok(count) => DatabaseClassStatus { ok: true, document_count: Some(count), error: None },
            Err(error) => DatabaseClassStatus { ok: false, document_count: None, error: Some(error) },
        };
        classes.insert(class_num, status);
    }
    DatabaseStatusResponse { classes }
}

pub async fn admin_database_status(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<DatabaseStatusResponse>, ApiError> {
    identity::require_admin(&headers)?;
    Ok(Json(database_status(&state).await))
}

pub async fn admin_stats(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<AdminStats>, ApiError> {
    identity::require_admin(&headers)?;
    Ok(Json(state.core.stats().into()))
}

pub async fn admin_health_detailed(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<DetailedHealthResponse>, ApiError> {
    identity::require_admin(&headers)?;
    Ok(Json(DetailedHealthResponse {
        ready: state.core.is_ready().await,
        stats: state.core.stats().into(),
        database: database_status(&state).await,
    }))
}

/// Plain-text Prometheus-style exposition, consistent with the teacher's
/// own metrics surface conventions.
pub async fn admin_metrics(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    identity::require_admin(&headers)?;
    let stats = state.core.stats();
    let body = format!(
        "sage_total_queries {}\nsage_cache_hits {}\nsage_cache_hit_rate {}\nsage_avg_processing_time_seconds {}\n",
        stats.total_queries, stats.cache_hits, stats.cache_hit_rate, stats.avg_processing_time_s,
    );
    Ok(body)
}

pub async fn admin_cache_clear(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<CacheClearResponse>, ApiError> {
    identity::require_admin(&headers)?;
    let cleared_entries = state.core.clear_cache().await;
    warn!(cleared_entries, "admin cleared response cache");
    Ok(Json(CacheClearResponse { cleared_entries }))
}

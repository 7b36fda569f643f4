//! ABOUTME: The axum HTTP surface, mounted under `/api/v1`

mod dto;
mod error;
mod handlers;
pub mod identity;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use sage_coordinator::Core;
use tokio::sync::Semaphore;
use tower::limit::ConcurrencyLimitLayer;
use tower::timeout::TimeoutLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Upper bound on concurrently in-flight `/search/bulk` sub-questions.
const BULK_SEARCH_CONCURRENCY: usize = 3;

/// Shared state handed to every handler; cheap to clone since both fields
/// are reference-counted.
#[derive(Clone)]
pub struct AppState {
    pub core: Arc<Core>,
    pub bulk_search_semaphore: Arc<Semaphore>,
}

impl AppState {
    #[must_use]
    pub fn new(core: Arc<Core>) -> Self {
        Self { core, bulk_search_semaphore: Arc::new(Semaphore::new(BULK_SEARCH_CONCURRENCY)) }
    }
}

/// Build the full `/api/v1` router: chat, search, health, and admin
/// surfaces, with tracing, CORS, a global timeout, and an overall
/// concurrency cap layered on top.
#[must_use]
pub fn build_router(core: Arc<Core>) -> Router {
    let state = AppState::new(core);

    let chat = Router::new()
        .route("/chat/ask", post(handlers::chat_ask))
        .route("/chat/ask/stream", post(handlers::chat_ask_stream));

    let search = Router::new()
        .route("/search/documents", post(handlers::search_documents))
        .route("/search/topics", get(handlers::search_topics))
        .route("/search/class/{class_num}/overview", get(handlers::search_class_overview))
        .route("/search/bulk", post(handlers::search_bulk));

    let health = Router::new()
        .route("/health/", get(handlers::health))
        .route("/health/ready", get(handlers::health_ready))
        .route("/health/live", get(handlers::health_live));

    let admin = Router::new()
        .route("/admin/stats", get(handlers::admin_stats))
        .route("/admin/database/status", get(handlers::admin_database_status))
        .route("/admin/health/detailed", get(handlers::admin_health_detailed))
        .route("/admin/metrics", get(handlers::admin_metrics))
        .route("/admin/cache/clear", post(handlers::admin_cache_clear));

    let api = Router::new()
        .merge(chat)
        .merge(search)
        .merge(health)
        .merge(admin)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(TimeoutLayer::new(std::time::Duration::from_secs(30)))
        .layer(ConcurrencyLimitLayer::new(256));

    Router::new().nest("/api/v1", api)
}

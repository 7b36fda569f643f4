//! ABOUTME: Request/response bodies for the `/api/v1` HTTP surface

use sage_core::{Answer, ConversationTurn, SourceDocument};
use sage_coordinator::StatsSnapshot;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

fn default_max_sources() -> usize {
    sage_coordinator::DEFAULT_MAX_SOURCES
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct ChatAskBody {
    pub message: String,
    pub class_num: Option<u8>,
    #[serde(default)]
    pub conversation_history: Vec<ConversationTurn>,
    #[serde(default = "default_true")]
    pub include_sources: bool,
    #[serde(default = "default_max_sources")]
    pub max_sources: usize,
}

#[derive(Debug, Serialize)]
pub struct ChatAskResponse {
    pub answer: String,
    pub sources: Vec<SourceDocument>,
    pub confidence: f32,
    pub processing_time_s: f64,
    pub cache_hit: bool,
    pub mode_used: sage_core::ModeUsed,
}

impl From<Answer> for ChatAskResponse {
    fn from(answer: Answer) -> Self {
        Self {
            answer: answer.text,
            sources: answer.sources,
            confidence: answer.confidence,
            processing_time_s: answer.processing_time_s,
            cache_hit: answer.cache_hit,
            mode_used: answer.mode_used,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchDocumentsBody {
    pub question: String,
    pub class_num: Option<u8>,
    #[serde(default = "default_max_sources")]
    pub top_k: usize,
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
}

fn default_similarity_threshold() -> f32 {
    0.5
}

#[derive(Debug, Serialize)]
pub struct SearchDocumentsResponse {
    pub results: Vec<SourceDocument>,
    pub total_results: usize,
}

#[derive(Debug, Deserialize)]
pub struct TopicSearchQuery {
    pub topic: String,
    pub class_num: Option<u8>,
    #[serde(default = "default_max_sources")]
    pub top_k: usize,
}

#[derive(Debug, Deserialize)]
pub struct BulkSearchBody {
    pub questions: Vec<String>,
    pub class_num: Option<u8>,
    #[serde(default = "default_max_sources")]
    pub top_k: usize,
}

#[derive(Debug, Serialize)]
pub struct BulkSearchResponse {
    pub results: Vec<BulkSearchEntry>,
}

#[derive(Debug, Serialize)]
pub struct BulkSearchEntry {
    pub question: String,
    pub documents: Vec<SourceDocument>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ClassOverviewResponse {
    pub class_num: u8,
    pub document_count: usize,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub ready: bool,
}

#[derive(Debug, Serialize)]
pub struct DatabaseStatusResponse {
    pub classes: HashMap<u8, DatabaseClassStatus>,
}

#[derive(Debug, Serialize)]
pub struct DatabaseClassStatus {
    pub ok: bool,
    pub document_count: Option<usize>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DetailedHealthResponse {
    pub ready: bool,
    pub stats: AdminStats,
    pub database: DatabaseStatusResponse,
}

#[derive(Debug, Serialize)]
pub struct AdminStats {
    pub total_queries: u64,
    pub cache_hits: u64,
    pub cache_hit_rate: f64,
    pub avg_processing_time_s: f64,
}

impl From<StatsSnapshot> for AdminStats {
    fn from(snapshot: StatsSnapshot) -> Self {
        Self {
            total_queries: snapshot.total_queries,
            cache_hits: snapshot.cache_hits,
            cache_hit_rate: snapshot.cache_hit_rate,
            avg_processing_time_s: snapshot.avg_processing_time_s,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CacheClearResponse {
    pub cleared_entries: usize,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

//! ABOUTME: Shared domain types and error taxonomy for the SAGE RAG serving core
//! ABOUTME: Every other crate in the workspace depends on this one

pub mod error;
pub mod types;

pub use error::{CoreError, ErrorOutcome, Result};
pub use types::{
    conversation_digest, last_five, Answer, CacheEntry, Candidate, ClassFilter, ConversationTurn,
    GenerationMode, ModeUsed, PromptPlan, Question, SourceDocument, StreamEvent, TurnRole,
};

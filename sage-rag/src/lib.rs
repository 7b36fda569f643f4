//! ABOUTME: Guardrails, Retrieval Planner, and Prompt Assembler

pub mod guardrails;
pub mod prompt;
pub mod retrieval;

pub use guardrails::{
    brace_count, detect_injection, fenced_code_block_count, passes_domain_filter, system_tag_count,
    REFUSAL_MESSAGE,
};
pub use prompt::PromptAssembler;
pub use retrieval::{RetrievalPlanner, SIMILARITY_FLOOR};

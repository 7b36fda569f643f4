//! ABOUTME: Core domain types for the RAG serving core
//! ABOUTME: Question, ClassFilter, Candidate, PromptPlan, Answer and friends

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A validated, trimmed natural-language question.
///
/// Construction enforces the 1..=1000 character bound after trimming; callers
/// should prefer [`Question::parse`] over building the newtype directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question(String);

impl Question {
    /// Maximum accepted length, in characters, after trimming.
    pub const MAX_LEN: usize = 1000;

    /// Trim and validate raw question text.
    ///
    /// # Errors
    ///
    /// Returns `Err` with a human-readable reason if the question is empty
    /// after trimming or exceeds [`Question::MAX_LEN`] characters.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err("question must not be empty".to_string());
        }
        if trimmed.chars().count() > Self::MAX_LEN {
            return Err(format!(
                "question exceeds {} characters",
                Self::MAX_LEN
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lowercased, trimmed form used for cache-key derivation.
    #[must_use]
    pub fn normalized(&self) -> String {
        self.0.to_lowercase()
    }
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Grade-level selector: a specific class 1..=12, or every class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassFilter {
    All,
    Class(u8),
}

impl ClassFilter {
    /// The set of priority classes queried during an "all classes" fan-out.
    pub const PRIORITY_CLASSES: [u8; 7] = [6, 7, 8, 9, 10, 11, 12];

    /// Parse an optional class number into a filter.
    ///
    /// # Errors
    ///
    /// Returns `Err` if `class_num` is present but outside `1..=12`.
    pub fn from_optional(class_num: Option<u8>) -> Result<Self, String> {
        match class_num {
            None => Ok(Self::All),
            Some(n) if (1..=12).contains(&n) => Ok(Self::Class(n)),
            Some(n) => Err(format!("class_num {n} out of range 1..=12")),
        }
    }

    /// Cache-key tag: `"ALL"` or the class number.
    #[must_use]
    pub fn cache_tag(&self) -> String {
        match self {
            Self::All => "ALL".to_string(),
            Self::Class(n) => n.to_string(),
        }
    }
}

impl fmt::Display for ClassFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::Class(n) => write!(f, "class{n}"),
        }
    }
}

/// Role of a single conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

impl fmt::Display for TurnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "User"),
            Self::Assistant => write!(f, "Assistant"),
        }
    }
}

/// A single turn of prior conversation, supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: TurnRole,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

/// Take at most the last five turns, matching the Coordinator's context window.
#[must_use]
pub fn last_five(turns: &[ConversationTurn]) -> &[ConversationTurn] {
    let start = turns.len().saturating_sub(5);
    &turns[start..]
}

/// Deterministic pipe-joined serialization of the last five turns, used both
/// for cache-key derivation and as the prompt's conversation block.
#[must_use]
pub fn conversation_digest(turns: &[ConversationTurn]) -> String {
    last_five(turns)
        .iter()
        .map(|t| format!("{}: {}", t.role, t.content))
        .collect::<Vec<_>>()
        .join("|")
}

/// A retrieval result before filtering and ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub content: String,
    pub metadata: HashMap<String, String>,
    pub distance: f32,
    pub similarity: f32,
    pub source_class: u8,
    pub rank: usize,
}

impl Candidate {
    /// Build a candidate from raw content/metadata/distance, computing
    /// `similarity = max(0, 1 - distance)` so the invariant cannot be
    /// violated by callers constructing this type directly.
    #[must_use]
    pub fn new(
        content: String,
        metadata: HashMap<String, String>,
        distance: f32,
        source_class: u8,
    ) -> Self {
        let similarity = (1.0 - distance).max(0.0).min(1.0);
        Self {
            content,
            metadata,
            distance,
            similarity,
            source_class,
            rank: 0,
        }
    }

    #[must_use]
    pub const fn with_rank(mut self, rank: usize) -> Self {
        self.rank = rank;
        self
    }

    /// The `subject` metadata field, or `"General"` when absent.
    #[must_use]
    pub fn subject(&self) -> &str {
        self.metadata
            .get("subject")
            .map(String::as_str)
            .unwrap_or("General")
    }
}

/// A [`Candidate`] promoted into a response, with its final rank assigned.
pub type SourceDocument = Candidate;

/// Which generation mode the Coordinator has selected for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    Grounded,
    PureLlm,
    StepByStep,
}

/// The mode actually used to produce an [`Answer`], including the fallback
/// path that has no corresponding [`GenerationMode`] (it is never *chosen*,
/// only arrived at after a decode failure).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeUsed {
    Grounded,
    PureLlm,
    StepByStep,
    SimpleFallback,
    /// The guardrail injection detector refused the question outright; no
    /// retrieval or generation was attempted.
    Refused,
}

impl From<GenerationMode> for ModeUsed {
    fn from(mode: GenerationMode) -> Self {
        match mode {
            GenerationMode::Grounded => Self::Grounded,
            GenerationMode::PureLlm => Self::PureLlm,
            GenerationMode::StepByStep => Self::StepByStep,
        }
    }
}

/// A fully assembled prompt ready for the Model Adapter.
#[derive(Debug, Clone)]
pub struct PromptPlan {
    pub mode: GenerationMode,
    pub system_preamble: String,
    pub context_block: String,
    pub question_block: String,
    pub conversation_block: String,
    pub estimated_tokens: usize,
}

impl PromptPlan {
    /// Render the plan into the single string handed to the Model Adapter.
    #[must_use]
    pub fn render(&self) -> String {
        let mut sections = vec![self.system_preamble.clone()];
        if !self.conversation_block.is_empty() {
            sections.push(self.conversation_block.clone());
        }
        if !self.context_block.is_empty() {
            sections.push(self.context_block.clone());
        }
        sections.push(self.question_block.clone());
        sections.join("\n\n")
    }
}

/// The response returned for a single request, synchronous or streamed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<SourceDocument>,
    pub confidence: f32,
    pub processing_time_s: f64,
    pub cache_hit: bool,
    pub metadata: HashMap<String, serde_json::Value>,
    pub mode_used: ModeUsed,
}

/// An entry stored in the Response Cache.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: String,
    pub answer: Answer,
    pub inserted_at: std::time::Instant,
}

/// A single streaming event emitted by the Streaming Bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Status { message: String },
    Sources { sources: Vec<SourceDocument> },
    Token { content: String },
    Metadata { processing_time_s: f64, confidence: f32 },
    Error { message: String },
    Done,
}

//! ABOUTME: The inbound chat request shape shared by the sync and streaming paths

use sage_core::ConversationTurn;

/// Default `max_sources` when the caller doesn't specify one.
pub const DEFAULT_MAX_SOURCES: usize = 5;

/// A single request to the Request Coordinator, transport-agnostic.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub question: String,
    pub class_num: Option<u8>,
    pub conversation_history: Vec<ConversationTurn>,
    pub include_sources: bool,
    pub max_sources: usize,
}

impl ChatRequest {
    #[must_use]
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            class_num: None,
            conversation_history: Vec::new(),
            include_sources: true,
            max_sources: DEFAULT_MAX_SOURCES,
        }
    }

    #[must_use]
    pub const fn with_class(mut self, class_num: u8) -> Self {
        self.class_num = Some(class_num);
        self
    }

    #[must_use]
    pub fn with_history(mut self, history: Vec<ConversationTurn>) -> Self {
        self.conversation_history = history;
        self
    }
}

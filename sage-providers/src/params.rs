//! ABOUTME: Generation parameters shared by complete() and stream()

/// Sampling and stopping parameters for a single generation call.
#[derive(Debug, Clone)]
pub struct GenerationParams {
    pub max_tokens: usize,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: usize,
    pub repeat_penalty: f32,
    pub stop_sequences: Vec<String>,
}

impl GenerationParams {
    /// The five stop sequences every request carries, regardless of mode.
    #[must_use]
    pub fn default_stop_sequences() -> Vec<String> {
        vec![
            "Question:".to_string(),
            "Student Question:".to_string(),
            "Context:".to_string(),
            "Answer Format:".to_string(),
            "Previous Conversation:".to_string(),
            "\n\n\n\n".to_string(),
        ]
    }

    /// Parameters for grounded / pure-LLM / step-by-step generation.
    #[must_use]
    pub fn standard(max_tokens: usize) -> Self {
        Self {
            max_tokens,
            temperature: 0.2,
            top_p: 0.9,
            top_k: 40,
            repeat_penalty: 1.15,
            stop_sequences: Self::default_stop_sequences(),
        }
    }

    /// Parameters for the simple-fallback short-prompt variant.
    #[must_use]
    pub fn simple_fallback() -> Self {
        Self {
            max_tokens: 160,
            temperature: 0.3,
            top_p: 0.9,
            top_k: 40,
            repeat_penalty: 1.15,
            stop_sequences: Self::default_stop_sequences(),
        }
    }
}

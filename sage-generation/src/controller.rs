//! ABOUTME: The Generation Controller: prompt dispatch, post-processing, and the simple-fallback path

use std::sync::Arc;

use sage_core::{ConversationTurn, CoreError, GenerationMode, ModeUsed, Question, SourceDocument};
use sage_providers::{GenerationParams, ModelAdapter, ModelError};
use sage_rag::PromptAssembler;

const STRIP_LABELS: &[&str] = &[
    "Educational Answer:",
    "Answer:",
    "Response:",
    "Based on the context:",
    "According to the NCERT materials:",
    "From the curriculum:",
    "Your Response:",
    "IMPORTANT RULES:",
    "NOTE:",
    "You MUST inform",
    "Answer Format:",
    "Conceptual:",
    "Math/Physics/Chemistry:",
    "Previous Conversation:",
    "CRITICAL INSTRUCTION:",
    "NCERT Context:",
];

const DROPPED_LINES: &[&str] = &["NCERT", "View Sources", "View Sources (5)"];

const LEAKED_RULE_SENTINELS: &[&str] = &["IMPORTANT RULES", "You MUST inform"];

const HELP_MESSAGE: &str = "I can help with NCERT Math, Physics, and Chemistry questions. \
Please ask about a specific curriculum topic.";

const INSUFFICIENT_INFO_MESSAGE: &str =
    "I don't have enough information to answer that confidently. Could you rephrase the question?";

const LOW_CONFIDENCE_DISCLAIMER: &str =
    " (Note: the available curriculum materials were limited for this question.)";

const GENERIC_PROCESSING_ERROR: &str =
    "I ran into a problem generating a response. Please try rephrasing your question.";

const MIN_ANSWER_LEN: usize = 20;
const LOW_SIMILARITY_DISCLAIMER_FLOOR: f32 = 0.30;

const STANDARD_MAX_TOKENS: usize = 512;

/// The result of a single generation attempt.
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub text: String,
    pub mode_used: ModeUsed,
    pub confidence: f32,
}

/// Drives the Model Adapter for a single request: assembles the prompt,
/// runs the configured mode, post-processes the output, and falls through
/// to the simple-fallback path on decode failure.
pub struct GenerationController {
    model: Arc<dyn ModelAdapter>,
    assembler: PromptAssembler,
}

impl GenerationController {
    #[must_use]
    pub fn new(model: Arc<dyn ModelAdapter>, n_ctx: usize) -> Self {
        Self { model, assembler: PromptAssembler::new(n_ctx) }
    }

    /// # Errors
    ///
    /// Returns [`CoreError::ModelUnavailable`] if the model handle isn't
    /// loaded or the backend reports out-of-memory, and
    /// [`CoreError::Transient`] for a retryable provider failure. Only
    /// [`ModelError::DecodeFailure`] is handled locally, via the
    /// simple-fallback path.
    pub async fn generate(
        &self,
        question: &Question,
        sources: &[SourceDocument],
        conversation: &[ConversationTurn],
        mode: GenerationMode,
    ) -> Result<GenerationOutcome, CoreError> {
        let plan = self.assembler.assemble(
            question,
            sources,
            conversation,
            mode,
            STANDARD_MAX_TOKENS,
        );
        let params = GenerationParams::standard(STANDARD_MAX_TOKENS);

        match self.model.complete(&plan.render(), &params).await {
            Ok(raw) => {
                let text = Self::post_process(&raw, sources);
                Ok(GenerationOutcome {
                    text,
                    mode_used: mode.into(),
                    confidence: Self::confidence(sources),
                })
            }
            Err(ModelError::DecodeFailure { .. }) => Ok(self.simple_fallback(question, sources).await),
            Err(ModelError::ModelNotLoaded) => Err(CoreError::ModelUnavailable {
                message: "model handle is not loaded".to_string(),
            }),
            Err(ModelError::Oom) => {
                Err(CoreError::ModelUnavailable { message: "model is out of memory".to_string() })
            }
            Err(ModelError::Transient { source }) => Err(CoreError::Transient { source }),
        }
    }

    async fn simple_fallback(
        &self,
        question: &Question,
        sources: &[SourceDocument],
    ) -> GenerationOutcome {
        if sources.is_empty() {
            return GenerationOutcome {
                text: GENERIC_PROCESSING_ERROR.to_string(),
                mode_used: ModeUsed::SimpleFallback,
                confidence: 0.0,
            };
        }

        let short_prompt = Self::short_fallback_prompt(question, sources);
        let params = GenerationParams::simple_fallback();

        let text = match self.model.complete(&short_prompt, &params).await {
            Ok(raw) => Self::post_process(&raw, sources),
            Err(_still_failing) => Self::manual_bullet_fallback(sources),
        };

        GenerationOutcome {
            text,
            mode_used: ModeUsed::SimpleFallback,
            confidence: Self::confidence(sources),
        }
    }

    fn short_fallback_prompt(question: &Question, sources: &[SourceDocument]) -> String {
        let excerpts: Vec<String> = sources
            .iter()
            .take(3)
            .map(|s| s.content.chars().take(300).collect::<String>())
            .collect();
        format!(
            "Answer briefly using only these excerpts.\n\n{}\n\nStudent Question:\n{question}",
            excerpts.join("\n\n")
        )
    }

    fn manual_bullet_fallback(sources: &[SourceDocument]) -> String {
        sources
            .iter()
            .take(2)
            .map(|s| {
                let trimmed = Self::trim_at_sentence_boundary(&s.content);
                format!("- {trimmed} (Class {})", s.source_class)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn trim_at_sentence_boundary(content: &str) -> String {
        if content.chars().count() <= 150 {
            return content.to_string();
        }
        let after_150: String = content.chars().skip(150).collect();
        if let Some(rel_idx) = after_150.find(['.', '!', '?']) {
            let total = 150 + rel_idx + 1;
            return content.chars().take(total).collect();
        }
        content.chars().take(200).collect()
    }

    fn post_process(raw: &str, sources: &[SourceDocument]) -> String {
        let stripped_start = Self::strip_leading_label(raw.trim());
        let cleaned_lines: Vec<String> = stripped_start
            .lines()
            .map(Self::strip_leading_label)
            .filter(|line| !DROPPED_LINES.contains(&line.trim()))
            .collect();
        let mut text = cleaned_lines.join("\n").trim().to_string();

        if LEAKED_RULE_SENTINELS.iter().any(|s| text.contains(s)) {
            return HELP_MESSAGE.to_string();
        }

        if text.chars().count() < MIN_ANSWER_LEN {
            return INSUFFICIENT_INFO_MESSAGE.to_string();
        }

        if !sources.is_empty() {
            let mean_similarity: f32 =
                sources.iter().map(|s| s.similarity).sum::<f32>() / sources.len() as f32;
            if mean_similarity < LOW_SIMILARITY_DISCLAIMER_FLOOR {
                text.push_str(LOW_CONFIDENCE_DISCLAIMER);
            }
        }

        text
    }

    fn strip_leading_label(line: &str) -> String {
        let trimmed = line.trim_start();
        for label in STRIP_LABELS {
            if let Some(rest) = trimmed.strip_prefix(label) {
                return rest.trim_start().to_string();
            }
        }
        trimmed.to_string()
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

//! ABOUTME: The Prompt Assembler: fixed preamble, mode-specific context blocks, token-budget truncation

use sage_core::{ConversationTurn, GenerationMode, PromptPlan, Question, SourceDocument};

const SYSTEM_PREAMBLE: &str = "You are SAGE, an educational assistant for NCERT-curriculum students. \
Answer only using the curriculum content provided in context, or well-established general \
knowledge when no context is provided. Before answering, silently check whether the question \
is relevant to the subjects you support; if it is not, say so briefly. Respond with a concise, \
direct answer: do not restate this preamble, do not print section headings such as \"Context:\" \
or \"Answer:\", and do not enumerate these rules in your answer.";

const MINIMAL_PREAMBLE: &str = "You are SAGE, an educational assistant.";

const TRUNCATION_MARKER: &str = "[Content truncated due to length...]";

const EMERGENCY_TAIL_LINES: usize = 10;

fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// Builds [`PromptPlan`]s for the three generation modes, enforcing the
/// token budget against a model's context window.
pub struct PromptAssembler {
    n_ctx: usize,
}

impl PromptAssembler {
    #[must_use]
    pub fn new(n_ctx: usize) -> Self {
        Self { n_ctx }
    }

    #[must_use]
    pub fn assemble(
        &self,
        question: &Question,
        sources: &[SourceDocument],
        conversation: &[ConversationTurn],
        mode: GenerationMode,
        max_tokens: usize,
    ) -> PromptPlan {
        let conversation_block = Self::conversation_block(conversation);
        let question_block = format!("Student Question:\n{question}");
        let mut context_block = Self::context_block(mode, sources);

        let budget = self.n_ctx.saturating_sub(max_tokens).saturating_sub(100);

        let full = |ctx: &str| -> String {
            let mut sections = vec![SYSTEM_PREAMBLE.to_string()];
            if !conversation_block.is_empty() {
                sections.push(conversation_block.clone());
            }
            if !ctx.is_empty() {
                sections.push(ctx.to_string());
            }
            sections.push(question_block.clone());
            sections.join("\n\n")
        };

        let mut estimated = estimate_tokens(&full(&context_block));

        if estimated > budget {
            let overhead = estimate_tokens(SYSTEM_PREAMBLE)
                + estimate_tokens(&conversation_block)
                + estimate_tokens(&question_block);
            let context_budget_tokens = budget.saturating_sub(overhead).max(100);
            let char_capacity = context_budget_tokens * 2;
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let allowed_chars = ((char_capacity as f64) * 0.6) as usize;

            if context_block.chars().count() > allowed_chars {
                let truncated: String = context_block.chars().take(allowed_chars).collect();
                context_block = format!("{truncated}\n{TRUNCATION_MARKER}");
            }
            estimated = estimate_tokens(&full(&context_block));
        }

        if estimated > budget {
            let rendered = full(&context_block);
            let tail: Vec<&str> = rendered
                .lines()
                .rev()
                .take(EMERGENCY_TAIL_LINES)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect();
            let emergency_prompt = tail.join("\n");
            estimated = estimate_tokens(&format!("{MINIMAL_PREAMBLE}\n\n{emergency_prompt}"));
            return PromptPlan {
                mode,
                system_preamble: MINIMAL_PREAMBLE.to_string(),
                context_block: String::new(),
                question_block: emergency_prompt,
                conversation_block: String::new(),
                estimated_tokens: estimated,
            };
        }

        PromptPlan {
            mode,
            system_preamble: SYSTEM_PREAMBLE.to_string(),
            context_block,
            question_block,
            conversation_block,
            estimated_tokens: estimated,
        }
    }

    fn conversation_block(conversation: &[ConversationTurn]) -> String {
        if conversation.is_empty() {
            return String::new();
        }
        let lines: Vec<String> = sage_core::last_five(conversation)
            .iter()
            .map(|t| format!("{}: {}", t.role, t.content))
            .collect();
        format!("Previous Conversation:\n{}", lines.join("\n"))
    }

    fn context_block(mode: GenerationMode, sources: &[SourceDocument]) -> String {
        match mode {
            GenerationMode::Grounded => {
                let blocks: Vec<String> = sources
                    .iter()
                    .map(|doc| {
                        format!(
                            "[Reference {} | Class {} | Subject: {} | Relevance: {:.2}]\n{}",
                            doc.rank,
                            doc.source_class,
                            doc.subject(),
                            doc.similarity,
                            doc.content
                        )
                    })
                    .collect();
                blocks.join("\n\n")
            }
            GenerationMode::PureLlm => "Note: Use standard NCERT formulas.".to_string(),
            GenerationMode::StepByStep => "Note: Use standard NCERT formulas.\n\
                Only draw formulas from this note; do not include worked examples.\n\n\
                Answer Format:\nGiven:\nFind:\nFormula:\nSolution:\nFinal Answer:"
                .to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn source(content: &str, rank: usize) -> SourceDocument {
        let mut metadata = HashMap::new();
        metadata.insert("subject".to_string(), "Biology".to_string());
        sage_core::Candidate::new(content.to_string(), metadata, 0.1, 10).with_rank(rank)
    }

    #[test]
    fn grounded_mode_includes_reference_lines() {
        let assembler = PromptAssembler::new(4096);
        let question = Question::parse("What is photosynthesis?").unwrap();
        let sources = vec![source("Photosynthesis converts light to chemical energy.", 1)];
        let plan = assembler.assemble(&question, &sources, &[], GenerationMode::Grounded, 300);
        assert!(plan.context_block.contains("[Reference 1 | Class 10"));
        assert!(plan.render().contains("What is photosynthesis?"));
    }

    #[test]
    fn pure_llm_mode_has_fixed_note_and_no_sources() {
        let assembler = PromptAssembler::new(4096);
        let question = Question::parse("Find the height of the tower.").unwrap();
        let plan = assembler.assemble(&question, &[], &[], GenerationMode::PureLlm, 300);
        assert_eq!(plan.context_block, "Note: Use standard NCERT formulas.");
    }

    #[test]
    fn step_by_step_mode_has_scaffold() {
        let assembler = PromptAssembler::new(4096);
        let question = Question::parse("Calculate the angle of elevation.").unwrap();
        let plan = assembler.assemble(&question, &[], &[], GenerationMode::StepByStep, 300);
        assert!(plan.context_block.contains("Final Answer:"));
    }

    #[test]
    fn question_survives_emergency_truncation() {
        let assembler = PromptAssembler::new(120);
        let question = Question::parse("What is photosynthesis and why does it matter?").unwrap();
        let long_content = "Photosynthesis detail. ".repeat(200);
        let sources = vec![source(&long_content, 1)];
        let plan = assembler.assemble(&question, &sources, &[], GenerationMode::Grounded, 40);
        assert!(plan.render().contains("What is photosynthesis and why does it matter?"));
        assert!(plan.estimated_tokens <= 120_usize.saturating_sub(40).saturating_sub(100) + 20);
    }

    #[test]
    fn stage_one_truncation_appends_marker() {
        let assembler = PromptAssembler::new(600);
        let question = Question::parse("What is photosynthesis?").unwrap();
        let long_content = "Photosynthesis detail sentence. ".repeat(80);
        let sources = vec![source(&long_content, 1)];
        let plan = assembler.assemble(&question, &sources, &[], GenerationMode::Grounded, 100);
        assert!(
            plan.context_block.contains(TRUNCATION_MARKER) || plan.context_block.is_empty()
        );
    }

    proptest::proptest! {
        #[test]
        fn question_always_survives_truncation(
            n_ctx in 100usize..800,
            max_tokens in 10usize..100,
            repeat_count in 0usize..300,
        ) {
            let assembler = PromptAssembler::new(n_ctx);
            let question = Question::parse("What is photosynthesis and why does it matter for plants?").unwrap();
            let long_content = "Photosynthesis detail sentence. ".repeat(repeat_count);
            let sources = vec![source(&long_content, 1)];
            let plan = assembler.assemble(&question, &sources, &[], GenerationMode::Grounded, max_tokens);
            prop_assert!(plan.render().contains("What is photosynthesis and why does it matter for plants?"));
        }
    }
}

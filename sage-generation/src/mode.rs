//! ABOUTME: Calculation-problem heuristic and generation-mode selection

use sage_core::GenerationMode;

const INDICATOR_PHRASES: &[&str] = &[
    "find the",
    "calculate",
    "compute",
    "solve for",
    "what is the value",
    "determine the",
    "angle of elevation",
    "angle of depression",
    "distance from",
    "height of",
    "speed of",
    "velocity",
    "acceleration",
    "how many",
    "how much",
    "how long",
    "if a",
    "from a point",
    "from another point",
    "tower stands",
    "building stands",
    "ball is thrown",
    "object is thrown",
    "train travels",
    "car moves",
    "given that",
    "such that",
];

const UNIT_TOKENS: &[&str] = &[" m ", " km ", " cm ", "°", " degree", " meter", " second"];

const DOMAIN_KEYWORDS: &[&str] = &[
    "angle", "triangle", "trigonometry", "tan", "sin", "cos", "elevation", "height", "distance",
    "theorem", "equation", "formula", "calculate", "solve", "degree", "force", "motion",
    "velocity", "acceleration", "energy", "work", "power", "mass", "momentum", "gravity",
    "friction", "electromagnetic", "wave", "element", "compound", "reaction", "molecule", "atom",
    "bond", "solution", "acid", "base", "oxidation", "reduction", "periodic",
];

/// `true` iff `question` contains an indicator phrase AND (a digit or a unit token).
#[must_use]
pub fn is_calculation_problem(question: &str) -> bool {
    let lower = question.to_lowercase();
    let padded = format!(" {lower} ");

    let has_phrase = INDICATOR_PHRASES.iter().any(|p| lower.contains(p));
    if !has_phrase {
        return false;
    }

    let has_digit = lower.chars().any(|c| c.is_ascii_digit());
    let has_unit = UNIT_TOKENS.iter().any(|u| padded.contains(u));

    has_digit || has_unit
}

/// The Coordinator's pre-retrieval decision: whether retrieval should run at
/// all, and the generation mode to request if it should not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreRetrievalDecision {
    pub skip_retrieval: bool,
    pub mode: GenerationMode,
}

/// Decide whether a question is a calculation problem before retrieval is
/// attempted, matching the grounded-by-default, calculation-problems-skip
/// contract.
#[must_use]
pub fn select_pre_retrieval(question: &str) -> PreRetrievalDecision {
    if !is_calculation_problem(question) {
        return PreRetrievalDecision { skip_retrieval: false, mode: GenerationMode::Grounded };
    }

    let lower = question.to_lowercase();
    let wants_steps =
        lower.contains("step") || DOMAIN_KEYWORDS.iter().any(|k| lower.contains(k));

    let mode = if wants_steps { GenerationMode::StepByStep } else { GenerationMode::PureLlm };
    PreRetrievalDecision { skip_retrieval: true, mode }
}

/// After retrieval runs, fall through from grounded mode to pure-LLM mode if
/// no sources survived filtering.
#[must_use]
pub fn select_post_retrieval(mode: GenerationMode, sources_empty: bool) -> GenerationMode {
    if mode == GenerationMode::Grounded && sources_empty {
        GenerationMode::PureLlm
    } else {
        mode
    }
}

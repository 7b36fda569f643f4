//! ABOUTME: The Generation Controller and Streaming Bridge

pub mod controller;
pub mod mode;
pub mod streaming;

pub use controller::{GenerationController, GenerationOutcome};
pub use mode::{is_calculation_problem, select_post_retrieval, select_pre_retrieval, PreRetrievalDecision};
pub use streaming::StreamingBridge;

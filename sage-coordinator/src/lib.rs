//! ABOUTME: Core, the Request Coordinator, and process-lifetime stats/health

mod core;
mod request;
mod stats;

pub use self::core::Core;
pub use request::{ChatRequest, DEFAULT_MAX_SOURCES};
pub use stats::{is_ready, per_class_counts, ClassCount, Counters, StatsSnapshot};

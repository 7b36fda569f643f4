//! ABOUTME: Process-lifetime counters and readiness/liveness probes

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use sage_providers::ModelAdapter;
use sage_storage::VectorIndex;

/// Monotonic, process-lifetime counters.
#[derive(Default)]
pub struct Counters {
    total_queries: AtomicU64,
    cache_hits: AtomicU64,
    total_processing_time_ns: AtomicU64,
}

impl Counters {
    pub fn record(&self, processing_time: Duration, cache_hit: bool) {
        self.total_queries.fetch_add(1, Ordering::Relaxed);
        if cache_hit {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
        }
        #[allow(clippy::cast_possible_truncation)]
        let elapsed_ns = processing_time.as_nanos() as u64;
        self.total_processing_time_ns.fetch_add(elapsed_ns, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        let total_queries = self.total_queries.load(Ordering::Relaxed);
        let cache_hits = self.cache_hits.load(Ordering::Relaxed);
        let total_processing_time_ns = self.total_processing_time_ns.load(Ordering::Relaxed);

        #[allow(clippy::cast_precision_loss)]
        let cache_hit_rate = cache_hits as f64 / total_queries.max(1) as f64;
        #[allow(clippy::cast_precision_loss)]
        let avg_processing_time_s =
            (total_processing_time_ns as f64 / 1_000_000_000.0) / total_queries.max(1) as f64;

        StatsSnapshot {
            total_queries,
            cache_hits,
            cache_hit_rate,
            avg_processing_time_s,
        }
    }
}

/// A point-in-time read of [`Counters`], plus derived rates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatsSnapshot {
    pub total_queries: u64,
    pub cache_hits: u64,
    pub cache_hit_rate: f64,
    pub avg_processing_time_s: f64,
}

/// `Ok(count)` for a collection that answered, `Err(reason)` for one that
/// failed to report its count; a failure never aborts the whole sweep.
pub type ClassCount = std::result::Result<usize, String>;

/// Query `count` on each of the twelve per-class collections, tolerating
/// per-collection failure.
pub async fn per_class_counts(index: &Arc<dyn VectorIndex>) -> HashMap<u8, ClassCount> {
    let mut counts = HashMap::with_capacity(12);
    for class_num in 1..=12u8 {
        let result = index.count(class_num).await.map_err(|err| err.to_string());
        counts.insert(class_num, result);
    }
    counts
}

/// Readiness: "ready" iff the model handle is loaded and at least one
/// collection is accessible.
pub async fn is_ready(model: &Arc<dyn ModelAdapter>, index: &Arc<dyn VectorIndex>) -> bool {
    if !model.is_loaded() {
        return false;
    }
    for class_num in 1..=12u8 {
        if index.count(class_num).await.is_ok() {
            return true;
        }
    }
    false
}

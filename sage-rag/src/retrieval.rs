//! ABOUTME: The Retrieval Planner: fan-out across per-class collections with a wall-clock budget

use std::sync::Arc;
use std::time::Duration;

use sage_core::{ClassFilter, Question, SourceDocument};
use sage_storage::VectorIndex;
use tokio::sync::Semaphore;
use tracing::debug;

use crate::guardrails::passes_domain_filter;

/// Similarity floor applied after merging fan-out results. Below this, a
/// candidate is dropped regardless of rank.
pub const SIMILARITY_FLOOR: f32 = 0.75;

const PER_CLASS_TIMEOUT: Duration = Duration::from_secs(2);
const TOTAL_BUDGET: Duration = Duration::from_secs(5);
const FANOUT_CONCURRENCY: usize = 4;

/// Given a question, class filter, and desired result count, returns up to
/// `top_k` ranked [`SourceDocument`]s within the wall-clock budget.
pub struct RetrievalPlanner {
    index: Arc<dyn VectorIndex>,
}

impl RetrievalPlanner {
    #[must_use]
    pub fn new(index: Arc<dyn VectorIndex>) -> Self {
        Self { index }
    }

    pub async fn retrieve(
        &self,
        question: &Question,
        class_filter: ClassFilter,
        top_k: usize,
    ) -> Vec<SourceDocument> {
        let mut merged = self.merge_fan_out(question, class_filter, top_k).await;

        merged.retain(|c| c.similarity >= SIMILARITY_FLOOR);
        if merged.is_empty() {
            return Vec::new();
        }

        merged.retain(|c| passes_domain_filter(question.as_str(), c));

        merged
            .into_iter()
            .enumerate()
            .map(|(i, c)| c.with_rank(i + 1))
            .collect()
    }

    /// Ad-hoc search variant for the `/search/documents` and `/search/topics`
    /// endpoints: an explicit, caller-supplied similarity threshold replaces
    /// the fixed [`SIMILARITY_FLOOR`], and the content-domain filter is not
    /// applied (this path returns raw search results, not chat context).
    pub async fn search(
        &self,
        question: &Question,
        class_filter: ClassFilter,
        top_k: usize,
        similarity_threshold: f32,
    ) -> Vec<SourceDocument> {
        let mut merged = self.merge_fan_out(question, class_filter, top_k).await;
        merged.retain(|c| c.similarity >= similarity_threshold);
        merged
            .into_iter()
            .enumerate()
            .map(|(i, c)| c.with_rank(i + 1))
            .collect()
    }

    async fn merge_fan_out(
        &self,
        question: &Question,
        class_filter: ClassFilter,
        top_k: usize,
    ) -> Vec<SourceDocument> {
        let merged = match class_filter {
            ClassFilter::Class(class_num) => self.query_single(class_num, question, top_k).await,
            ClassFilter::All => self.fan_out(question, top_k).await,
        };

        let mut merged = merged;
        merged.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(std::cmp::Ordering::Equal));
        merged.truncate(top_k);
        merged
    }

    async fn query_single(
        &self,
        class_num: u8,
        question: &Question,
        top_k: usize,
    ) -> Vec<SourceDocument> {
        match self.index.query(class_num, question.as_str(), top_k).await {
            Ok(candidates) => candidates,
            Err(err) => {
                debug!(class = class_num, error = %err, "retrieval query failed");
                Vec::new()
            }
        }
    }

    async fn fan_out(&self, question: &Question, top_k: usize) -> Vec<SourceDocument> {
        let per_class_k = (top_k / 4).max(1);
        let semaphore = Arc::new(Semaphore::new(FANOUT_CONCURRENCY));

        let tasks = ClassFilter::PRIORITY_CLASSES.iter().map(|&class_num| {
            let index = Arc::clone(&self.index);
            let semaphore = Arc::clone(&semaphore);
            let question_text = question.as_str().to_string();
            async move {
                let _permit = semaphore.acquire_owned().await.ok()?;
                match tokio::time::timeout(
                    PER_CLASS_TIMEOUT,
                    index.query(class_num, &question_text, per_class_k),
                )
                .await
                {
                    Ok(Ok(candidates)) => Some(candidates),
                    Ok(Err(err)) => {
                        debug!(class = class_num, error = %err, "fan-out query failed");
                        None
                    }
                    Err(_elapsed) => {
                        debug!(class = class_num, "fan-out query timed out");
                        None
                    }
                }
            }
        });

        let joined = futures::future::join_all(tasks);
        let results = match tokio::time::timeout(TOTAL_BUDGET, joined).await {
            Ok(results) => results,
            Err(_elapsed) => {
                debug!("retrieval fan-out exceeded total wall-clock budget");
                Vec::new()
            }
        };

        results.into_iter().flatten().flatten().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sage_core::Candidate;
    use sage_storage::{BatchInsertOutcome, IntegrityStatus, Result, VectorIndexError};
    use std::collections::HashMap;
    use std::time::Duration as StdDuration;

    struct FixedIndex {
        per_class: HashMap<u8, Vec<Candidate>>,
        delay_class: Option<(u8, StdDuration)>,
    }

    #[async_trait]
    impl VectorIndex for FixedIndex {
        async fn open_or_create(&self, _class_num: u8) -> Result<()> {
            Ok(())
        }

        async fn count(&self, class_num: u8) -> Result<usize> {
            Ok(self.per_class.get(&class_num).map_or(0, Vec::len))
        }

        async fn query(&self, class_num: u8, _query_text: &str, k: usize) -> Result<Vec<Candidate>> {
            if let Some((delayed_class, delay)) = self.delay_class {
                if delayed_class == class_num {
                    tokio::time::sleep(delay).await;
                }
            }
            Ok(self
                .per_class
                .get(&class_num)
                .cloned()
                .unwrap_or_default()
                .into_iter()
                .take(k)
                .collect())
        }

        async fn insert(
            &self,
            _class_num: u8,
            _document_text: &str,
            _metadata: HashMap<String, String>,
        ) -> Result<String> {
            Err(VectorIndexError::Backend { source: anyhow::anyhow!("unsupported in test") })
        }

        async fn batch_insert(
            &self,
            _class_num: u8,
            _items: Vec<(String, HashMap<String, String>)>,
        ) -> Result<Vec<BatchInsertOutcome>> {
            Ok(Vec::new())
        }

        async fn integrity_check(&self) -> Result<IntegrityStatus> {
            Ok(IntegrityStatus::Healthy)
        }
    }

    fn candidate(distance: f32, class: u8, content: &str) -> Candidate {
        Candidate::new(content.to_string(), HashMap::new(), distance, class)
    }

    #[tokio::test]
    async fn single_class_filter_queries_only_that_class() {
        let mut per_class = HashMap::new();
        per_class.insert(10, vec![candidate(0.1, 10, "photosynthesis occurs in chloroplasts")]);
        let index = Arc::new(FixedIndex { per_class, delay_class: None });
        let planner = RetrievalPlanner::new(index);
        let question = Question::parse("What is photosynthesis?").unwrap();
        let results = planner.retrieve(&question, ClassFilter::Class(10), 5).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].source_class, 10);
        assert_eq!(results[0].rank, 1);
    }

    #[tokio::test]
    async fn fan_out_merges_and_sorts_by_distance() {
        let mut per_class = HashMap::new();
        per_class.insert(6, vec![candidate(0.2, 6, "formula for velocity and acceleration")]);
        per_class.insert(10, vec![candidate(0.05, 10, "force and motion basics")]);
        let index = Arc::new(FixedIndex { per_class, delay_class: None });
        let planner = RetrievalPlanner::new(index);
        let question = Question::parse("What is the force acting on this motion?").unwrap();
        let results = planner.retrieve(&question, ClassFilter::All, 8).await;
        assert!(!results.is_empty());
        assert_eq!(results[0].source_class, 10);
    }

    #[tokio::test]
    async fn similarity_floor_drops_weak_candidates() {
        let mut per_class = HashMap::new();
        per_class.insert(10, vec![candidate(0.5, 10, "force and energy")]);
        let index = Arc::new(FixedIndex { per_class, delay_class: None });
        let planner = RetrievalPlanner::new(index);
        let question = Question::parse("What is force?").unwrap();
        let results = planner.retrieve(&question, ClassFilter::Class(10), 5).await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn fan_out_tolerates_one_class_hanging() {
        let mut per_class = HashMap::new();
        per_class.insert(7, vec![candidate(0.1, 7, "force basics")]);
        per_class.insert(10, vec![candidate(0.05, 10, "force and motion")]);
        let index = Arc::new(FixedIndex {
            per_class,
            delay_class: Some((7, StdDuration::from_secs(30))),
        });
        let planner = RetrievalPlanner::new(index);
        let question = Question::parse("What is force?").unwrap();
        let start = std::time::Instant::now();
        let results = planner.retrieve(&question, ClassFilter::All, 8).await;
        assert!(start.elapsed() < StdDuration::from_secs(6));
        assert!(results.iter().all(|c| c.source_class != 7));
        assert!(!results.is_empty());
    }
}

//! ABOUTME: The Vector Index Adapter contract: per-class collections over a persistent store
//! ABOUTME: Generalizes the teacher's multi-tenant VectorStorage trait to grade-level collections

use async_trait::async_trait;
use sage_core::Candidate;
use std::collections::HashMap;
use thiserror::Error;

/// Errors surfaced by a [`VectorIndex`] implementation.
#[derive(Debug, Error)]
pub enum VectorIndexError {
    #[error("class {0} out of range 1..=12")]
    InvalidClass(u8),

    #[error("collection for class {0} is read-only")]
    ReadOnly(u8),

    #[error("vector store corrupt: {reason}")]
    Corrupt { reason: String },

    #[error("embedding failed: {source}")]
    Embedding {
        #[source]
        source: anyhow::Error,
    },

    #[error("storage backend error: {source}")]
    Backend {
        #[source]
        source: anyhow::Error,
    },
}

pub type Result<T> = std::result::Result<T, VectorIndexError>;

/// Outcome of [`VectorIndex::integrity_check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrityStatus {
    Healthy,
    ReadOnly,
    Corrupt,
}

/// Per-item outcome of a [`VectorIndex::batch_insert`] call: batches fail
/// atomically per item, not as a whole (partial success is allowed).
pub type BatchInsertOutcome = std::result::Result<String, String>;

/// Thin contract over a persistent, per-class vector store.
///
/// Collection names follow the pattern `class<N>` for `N` in `1..=12`; the
/// embedding model and distance metric are identical across all of them.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Open, or idempotently create, the collection for `class_num`.
    async fn open_or_create(&self, class_num: u8) -> Result<()>;

    /// Number of documents stored for `class_num`.
    async fn count(&self, class_num: u8) -> Result<usize>;

    /// Ordered list of up to `k` candidates, ascending by distance.
    ///
    /// Documents tagged `type == "question"` are excluded by default; if
    /// fewer than `k` results remain after that exclusion, the adapter
    /// retries once without the filter and manually skips `question`-typed
    /// entries until `k` results are gathered or the collection is
    /// exhausted.
    async fn query(&self, class_num: u8, query_text: &str, k: usize) -> Result<Vec<Candidate>>;

    /// Insert a single document, returning its stable id.
    async fn insert(
        &self,
        class_num: u8,
        document_text: &str,
        metadata: HashMap<String, String>,
    ) -> Result<String>;

    /// Insert a batch of documents; each item succeeds or fails
    /// independently, so the whole call never aborts early.
    async fn batch_insert(
        &self,
        class_num: u8,
        items: Vec<(String, HashMap<String, String>)>,
    ) -> Result<Vec<BatchInsertOutcome>>;

    /// Verify store health, attempting one recovery (snapshot-and-reopen)
    /// if corruption is detected.
    async fn integrity_check(&self) -> Result<IntegrityStatus>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_vector_index_surfaces_backend_error_to_caller() {
        let mut mock = MockVectorIndex::new();
        mock.expect_query()
            .returning(|_, _, _| Err(VectorIndexError::Backend { source: anyhow::anyhow!("collection unreachable") }));

        let result = mock.query(6, "what is velocity?", 5).await;
        assert!(matches!(result, Err(VectorIndexError::Backend { .. })));
    }

    #[tokio::test]
    async fn mock_vector_index_reports_distinct_counts_per_class() {
        let mut mock = MockVectorIndex::new();
        mock.expect_count().withf(|class_num| *class_num == 6).returning(|_| Ok(3));
        mock.expect_count().withf(|class_num| *class_num == 10).returning(|_| Ok(0));

        assert_eq!(mock.count(6).await.unwrap(), 3);
        assert_eq!(mock.count(10).await.unwrap(), 0);
    }
}

//! ABOUTME: Default Vector Index Adapter backend: per-class in-memory collections
//! ABOUTME: snapshotted to disk, with startup writability checks and corruption recovery

use async_trait::async_trait;
use parking_lot::RwLock;
use sage_core::Candidate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::embedding::QueryEmbedder;
use crate::traits::{BatchInsertOutcome, IntegrityStatus, Result, VectorIndex, VectorIndexError};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredDocument {
    id: String,
    embedding: Vec<f32>,
    content: String,
    metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Collection {
    documents: Vec<StoredDocument>,
}

/// A per-class vector collection held entirely in memory, periodically
/// snapshotted to `<persist_dir>/class<N>.json`.
///
/// This stands in for the real persistent vector database engine, which is
/// a black-box dependency out of scope for the serving core; it exists so
/// the [`VectorIndex`] contract, the `exclude_type` retry behavior, and the
/// integrity-check/recovery path all have a concrete, testable
/// implementation.
pub struct InMemoryVectorIndex {
    embedder: Arc<dyn QueryEmbedder>,
    persist_dir: PathBuf,
    collections: RwLock<HashMap<u8, Collection>>,
    read_only: AtomicBool,
}

impl InMemoryVectorIndex {
    /// Open (or create) the store at `persist_dir`, loading any existing
    /// per-class snapshots and performing the startup writability check.
    ///
    /// # Errors
    ///
    /// Returns [`VectorIndexError::Backend`] if `persist_dir` cannot be
    /// created.
    pub fn open(embedder: Arc<dyn QueryEmbedder>, persist_dir: impl Into<PathBuf>) -> Result<Self> {
        let persist_dir = persist_dir.into();
        std::fs::create_dir_all(&persist_dir).map_err(|e| VectorIndexError::Backend {
            source: anyhow::anyhow!(e),
        })?;

        let mut collections = HashMap::new();
        for class_num in 1..=12u8 {
            let path = Self::snapshot_path(&persist_dir, class_num);
            if path.exists() {
                match std::fs::read_to_string(&path)
                    .ok()
                    .and_then(|s| serde_json::from_str::<Collection>(&s).ok())
                {
                    Some(collection) => {
                        collections.insert(class_num, collection);
                    }
                    None => {
                        warn!(class_num, "snapshot unreadable at startup, starting empty");
                    }
                }
            }
        }

        let read_only = !Self::check_dir_writable(&persist_dir);

        Ok(Self {
            embedder,
            persist_dir,
            collections: RwLock::new(collections),
            read_only: AtomicBool::new(read_only),
        })
    }

    fn snapshot_path(persist_dir: &Path, class_num: u8) -> PathBuf {
        persist_dir.join(format!("class{class_num}.json"))
    }

    /// Write-then-delete a marker file to test directory writability.
    fn check_dir_writable(dir: &Path) -> bool {
        let marker = dir.join(".writability-check");
        match std::fs::write(&marker, b"ok") {
            Ok(()) => {
                let _ = std::fs::remove_file(&marker);
                true
            }
            Err(_) => false,
        }
    }

    fn persist(&self, class_num: u8) -> Result<()> {
        if self.read_only.load(Ordering::Acquire) {
            return Err(VectorIndexError::ReadOnly(class_num));
        }
        let collections = self.collections.read();
        let Some(collection) = collections.get(&class_num) else {
            return Ok(());
        };
        let json = serde_json::to_string(collection).map_err(|e| VectorIndexError::Backend {
            source: anyhow::anyhow!(e),
        })?;
        match std::fs::write(Self::snapshot_path(&self.persist_dir, class_num), json) {
            Ok(()) => Ok(()),
            Err(e) if matches!(e.kind(), std::io::ErrorKind::PermissionDenied) => {
                self.read_only.store(true, Ordering::Release);
                Err(VectorIndexError::ReadOnly(class_num))
            }
            Err(e) => Err(VectorIndexError::Backend {
                source: anyhow::anyhow!(e),
            }),
        }
    }

    fn validate_class(class_num: u8) -> Result<()> {
        if (1..=12).contains(&class_num) {
            Ok(())
        } else {
            Err(VectorIndexError::InvalidClass(class_num))
        }
    }

    fn distance(query: &[f32], candidate: &[f32]) -> f32 {
        let dot: f32 = query.iter().zip(candidate).map(|(a, b)| a * b).sum();
        (1.0 - dot).max(0.0)
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn open_or_create(&self, class_num: u8) -> Result<()> {
        Self::validate_class(class_num)?;
        self.collections.write().entry(class_num).or_default();
        Ok(())
    }

    async fn count(&self, class_num: u8) -> Result<usize> {
        Self::validate_class(class_num)?;
        Ok(self
            .collections
            .read()
            .get(&class_num)
            .map_or(0, |c| c.documents.len()))
    }

    async fn query(&self, class_num: u8, query_text: &str, k: usize) -> Result<Vec<Candidate>> {
        Self::validate_class(class_num)?;
        let query_embedding = self
            .embedder
            .embed(query_text)
            .await
            .map_err(|source| VectorIndexError::Embedding { source })?;

        let collections = self.collections.read();
        let Some(collection) = collections.get(&class_num) else {
            return Ok(Vec::new());
        };

        let mut scored: Vec<(f32, &StoredDocument)> = collection
            .documents
            .iter()
            .filter(|d| d.metadata.get("type").map(String::as_str) != Some("question"))
            .map(|d| (Self::distance(&query_embedding, &d.embedding), d))
            .collect();
        scored.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

        if scored.len() < k {
            debug!(
                class_num,
                found = scored.len(),
                requested = k,
                "retrying query without exclude_type filter"
            );
            let mut seen: std::collections::HashSet<&str> =
                scored.iter().map(|(_, d)| d.id.as_str()).collect();
            let mut all: Vec<(f32, &StoredDocument)> = collection
                .documents
                .iter()
                .filter(|d| !seen.contains(d.id.as_str()))
                .map(|d| (Self::distance(&query_embedding, &d.embedding), d))
                .collect();
            all.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

            // Prefer non-question documents even in the fallback pass; only
            // reach for question-tagged ones if still short of k.
            let (non_question, question): (Vec<_>, Vec<_>) = all
                .into_iter()
                .partition(|(_, d)| d.metadata.get("type").map(String::as_str) != Some("question"));
            for item in non_question {
                if scored.len() >= k {
                    break;
                }
                seen.insert(item.1.id.as_str());
                scored.push(item);
            }
            for item in question {
                if scored.len() >= k {
                    break;
                }
                scored.push(item);
            }
            scored.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        }

        Ok(scored
            .into_iter()
            .take(k)
            .enumerate()
            .map(|(i, (distance, doc))| {
                Candidate::new(doc.content.clone(), doc.metadata.clone(), distance, class_num)
                    .with_rank(i + 1)
            })
            .collect())
    }

    async fn insert(
        &self,
        class_num: u8,
        document_text: &str,
        mut metadata: HashMap<String, String>,
    ) -> Result<String> {
        Self::validate_class(class_num)?;
        let embedding = self
            .embedder
            .embed(document_text)
            .await
            .map_err(|source| VectorIndexError::Embedding { source })?;

        let id = Uuid::new_v4().to_string();
        metadata.entry("type".to_string()).or_insert_with(|| "document".to_string());
        metadata.insert("class_num".to_string(), class_num.to_string());

        {
            let mut collections = self.collections.write();
            collections
                .entry(class_num)
                .or_default()
                .documents
                .push(StoredDocument {
                    id: id.clone(),
                    embedding,
                    content: document_text.to_string(),
                    metadata,
                });
        }
        self.persist(class_num)?;
        Ok(id)
    }

    async fn batch_insert(
        &self,
        class_num: u8,
        items: Vec<(String, HashMap<String, String>)>,
    ) -> Result<Vec<BatchInsertOutcome>> {
        Self::validate_class(class_num)?;
        let mut outcomes = Vec::with_capacity(items.len());
        for (text, metadata) in items {
            match self.insert(class_num, &text, metadata).await {
                Ok(id) => outcomes.push(Ok(id)),
                Err(e) => outcomes.push(Err(e.to_string())),
            }
        }
        Ok(outcomes)
    }

    async fn integrity_check(&self) -> Result<IntegrityStatus> {
        if self.read_only.load(Ordering::Acquire) {
            return Ok(IntegrityStatus::ReadOnly);
        }

        for class_num in 1..=12u8 {
            let path = Self::snapshot_path(&self.persist_dir, class_num);
            if !path.exists() {
                continue;
            }
            let parses = std::fs::read_to_string(&path)
                .ok()
                .and_then(|s| serde_json::from_str::<Collection>(&s).ok())
                .is_some();
            if !parses {
                warn!(class_num, "corrupt snapshot detected, attempting recovery");
                self.recover(class_num, "integrity_failure")?;
                return Ok(IntegrityStatus::Corrupt);
            }
        }

        if !Self::check_dir_writable(&self.persist_dir) {
            self.read_only.store(true, Ordering::Release);
            return Ok(IntegrityStatus::ReadOnly);
        }

        Ok(IntegrityStatus::Healthy)
    }
}

impl InMemoryVectorIndex {
    fn recover(&self, class_num: u8, reason: &str) -> Result<()> {
        let ts = chrono::Utc::now().format("%Y%m%dT%H%M%SZ");
        let backup_dir = self
            .persist_dir
            .parent()
            .unwrap_or(&self.persist_dir)
            .join("backups")
            .join(format!("{ts}-{reason}"));
        std::fs::create_dir_all(&backup_dir).map_err(|e| VectorIndexError::Backend {
            source: anyhow::anyhow!(e),
        })?;
        let src = Self::snapshot_path(&self.persist_dir, class_num);
        if src.exists() {
            let _ = std::fs::copy(&src, backup_dir.join(format!("class{class_num}.json")));
        }
        self.collections.write().insert(class_num, Collection::default());
        let _ = std::fs::remove_file(&src);
        Ok(())
    }
}

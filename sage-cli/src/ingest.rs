//! ABOUTME: Bulk question ingestion, grounded in the original's batch/staging ingestion paths
//! ABOUTME: Not part of the request-serving core; carries no availability or latency guarantees

use std::collections::HashMap;
use std::sync::Arc;

use sage_storage::VectorIndex;

/// A single item to ingest: question text, target class, and arbitrary
/// document metadata (e.g. `subject`, `chapter`).
#[derive(Debug, Clone, serde::Deserialize)]
pub struct IngestItem {
    pub question: String,
    pub class_num: u8,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Per-item ingestion outcome.
#[derive(Debug, Clone, serde::Serialize)]
pub struct IngestOutcome {
    pub question: String,
    pub success: bool,
    pub error: Option<String>,
}

/// Mirrors the original's `batch_index_questions`/`batch_size=10` staging
/// behavior: items are grouped into chunks of ten per class and inserted
/// via [`VectorIndex::batch_insert`]; a failed item never aborts the rest
/// of the batch. When `paraphrase` is set, each item also inserts a second,
/// related document tagged `type="question_paraphrase"`.
pub async fn batch_index_questions(
    index: &Arc<dyn VectorIndex>,
    items: Vec<IngestItem>,
    paraphrase: bool,
) -> Vec<IngestOutcome> {
    const BATCH_SIZE: usize = 10;

    let mut by_class: HashMap<u8, Vec<IngestItem>> = HashMap::new();
    for item in items {
        by_class.entry(item.class_num).or_default().push(item);
    }

    let mut outcomes = Vec::new();
    for (class_num, class_items) in by_class {
        if index.open_or_create(class_num).await.is_err() {
            outcomes.extend(class_items.into_iter().map(|item| IngestOutcome {
                question: item.question,
                success: false,
                error: Some(format!("class {class_num} collection unavailable")),
            }));
            continue;
        }

        for chunk in class_items.chunks(BATCH_SIZE) {
            let mut documents = Vec::with_capacity(chunk.len() * 2);
            for item in chunk {
                documents.push((item.question.clone(), item.metadata.clone()));
                if paraphrase {
                    let mut paraphrase_metadata = item.metadata.clone();
                    paraphrase_metadata.insert("type".to_string(), "question_paraphrase".to_string());
                    documents.push((paraphrase_text(&item.question), paraphrase_metadata));
                }
            }

            match index.batch_insert(class_num, documents).await {
                Ok(results) => {
                    let mut results = results.into_iter();
                    for item in chunk {
                        let primary = results.next();
                        if paraphrase {
                            let _paraphrase_result = results.next();
                        }
                        let (success, error) = match primary {
                            Some(Ok(_)) => (true, None),
                            Some(Err(reason)) => (false, Some(reason)),
                            None => (false, Some("missing batch result".to_string())),
                        };
                        outcomes.push(IngestOutcome { question: item.question.clone(), success, error });
                    }
                }
                Err(err) => {
                    let message = err.to_string();
                    outcomes.extend(chunk.iter().map(|item| IngestOutcome {
                        question: item.question.clone(),
                        success: false,
                        error: Some(message.clone()),
                    }));
                }
            }
        }
    }

    outcomes
}

/// A deterministic, non-generative paraphrase stand-in: the real paraphrase
/// model is out of scope for the serving core, so ingestion tags a
/// lightly-reworded variant rather than calling a generative model.
fn paraphrase_text(question: &str) -> String {
    format!("In other words: {question}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use sage_storage::{HashingEmbedder, InMemoryVectorIndex};
    use tempfile::tempdir;

    #[tokio::test]
    async fn batch_ingest_reports_one_outcome_per_item() {
        let dir = tempdir().unwrap();
        let embedder = Arc::new(HashingEmbedder::default());
        let index: Arc<dyn VectorIndex> =
            Arc::new(InMemoryVectorIndex::open(embedder, dir.path().to_path_buf()).unwrap());

        let items = vec![
            IngestItem { question: "What is a fraction?".to_string(), class_num: 6, metadata: HashMap::new() },
            IngestItem { question: "What is an integer?".to_string(), class_num: 6, metadata: HashMap::new() },
        ];

        let outcomes = batch_index_questions(&index, items, false).await;
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|o| o.success));
        assert_eq!(index.count(6).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn paraphrase_flag_inserts_a_second_document_per_item() {
        let dir = tempdir().unwrap();
        let embedder = Arc::new(HashingEmbedder::default());
        let index: Arc<dyn VectorIndex> =
            Arc::new(InMemoryVectorIndex::open(embedder, dir.path().to_path_buf()).unwrap());

        let items =
            vec![IngestItem { question: "What is photosynthesis?".to_string(), class_num: 10, metadata: HashMap::new() }];

        let outcomes = batch_index_questions(&index, items, true).await;
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].success);
        assert_eq!(index.count(10).await.unwrap(), 2);
    }
}

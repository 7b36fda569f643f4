//! ABOUTME: Query-embedding abstraction for the Vector Index Adapter
//! ABOUTME: The actual embedding model is a black-box dependency; this is its contract

use async_trait::async_trait;

/// Produces an embedding vector for a query (or document) string.
///
/// The embedding model binary itself is out of scope for the serving core
/// (it is a black-box dependency per the specification); this trait is the
/// seam the Vector Index Adapter calls through, so tests can substitute a
/// deterministic stand-in without loading real model weights.
#[async_trait]
pub trait QueryEmbedder: Send + Sync {
    /// Embedding dimensionality produced by this embedder.
    fn dimensions(&self) -> usize;

    /// Embed a single piece of text.
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>>;

    /// Embed a batch of texts; default implementation embeds sequentially.
    async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}

/// A deterministic, dependency-free embedder used for tests and for local
/// development without a real embedding model installed.
///
/// Hashes overlapping word shingles into a fixed-width vector and
/// normalizes it, so that textually similar strings land at a small cosine
/// distance from one another without requiring any model weights.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimensions: usize,
}

impl HashingEmbedder {
    #[must_use]
    pub const fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(384)
    }
}

#[async_trait]
impl QueryEmbedder for HashingEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dimensions];
        for word in text.to_lowercase().split_whitespace() {
            let bucket = fnv1a(word) as usize % self.dimensions;
            vector[bucket] += 1.0;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        Ok(vector)
    }
}

fn fnv1a(text: &str) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    text.bytes().fold(OFFSET_BASIS, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(PRIME)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn identical_text_embeds_identically() {
        let embedder = HashingEmbedder::default();
        let a = embedder.embed("photosynthesis in plants").await.unwrap();
        let b = embedder.embed("photosynthesis in plants").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn embedding_is_unit_normalized() {
        let embedder = HashingEmbedder::default();
        let v = embedder.embed("angle of elevation").await.unwrap();
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }
}

//! Embedding trait and the model-free hashing implementation.
//!
//! The `Embedder` trait abstracts over embedding generation.
//! Implementations:
//! - `HashEmbedder`: deterministic feature hashing, no model files needed
//! - `HttpEmbedder`: OpenAI-compatible `/v1/embeddings` endpoint
//! - `OnnxEmbedder`: ONNX Runtime SentenceTransformers model (`onnx` feature)

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use docsage_core::Result;

/// A provider that maps text to a fixed-dimension vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single text (the query path).
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch of texts (the ingestion path), one vector per input in order.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Get the embedding dimension.
    fn dimension(&self) -> usize;

    /// Stable identifier recorded in the index manifest.
    fn id(&self) -> String;
}

/// Scale a vector to unit length in place. Zero vectors are left unchanged.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 1e-12 {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}

/// Weight of a whole-word feature relative to a character trigram.
const WORD_WEIGHT: f32 = 1.0;
const TRIGRAM_WEIGHT: f32 = 0.5;

/// Model-free embedder using signed feature hashing.
///
/// Lower-cased word tokens and their character trigrams are hashed into
/// `dimension` buckets; the result is L2-normalized. Texts sharing words
/// (or word fragments) get a positive cosine similarity, which is enough
/// for lexical retrieval without any model.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dim: usize,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }

    /// Synchronous embedding, shared by both trait methods.
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dim];
        let lowered = text.to_lowercase();

        for token in lowered.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()) {
            self.add_feature(&mut vector, "w", token, WORD_WEIGHT);

            let padded: Vec<char> = format!(" {} ", token).chars().collect();
            for window in padded.windows(3) {
                let trigram: String = window.iter().collect();
                self.add_feature(&mut vector, "c", &trigram, TRIGRAM_WEIGHT);
            }
        }

        l2_normalize(&mut vector);
        vector
    }

    fn add_feature(&self, vector: &mut [f32], namespace: &str, feature: &str, weight: f32) {
        let mut hasher = Sha256::new();
        hasher.update(namespace.as_bytes());
        hasher.update([0u8]);
        hasher.update(feature.as_bytes());
        let digest = hasher.finalize();

        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        let h = u64::from_le_bytes(bytes);

        let bucket = (h % self.dim as u64) as usize;
        let sign = if h >> 63 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign * weight;
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_text(text))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dim
    }

    fn id(&self) -> String {
        format!("hash-v1-{}", self.dim)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[tokio::test]
    async fn test_hash_embedder_is_deterministic_and_unit_norm() {
        let embedder = HashEmbedder::new(128);
        let a = embedder.embed("Quy trình tuyển dụng nhân sự").await.unwrap();
        let b = embedder.embed("Quy trình tuyển dụng nhân sự").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 128);

        let norm = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_shared_words_score_higher() {
        let embedder = HashEmbedder::new(256);
        let query = embedder.embed("remote work policy").await.unwrap();
        let related = embedder.embed("Our remote work policy allows two days").await.unwrap();
        let unrelated = embedder.embed("Quarterly revenue grew in Asia").await.unwrap();
        assert!(cosine(&query, &related) > cosine(&query, &unrelated));
    }

    #[tokio::test]
    async fn test_batch_matches_single() {
        let embedder = HashEmbedder::new(32);
        let batch = embedder.embed_batch(&["alpha", "beta"]).await.unwrap();
        assert_eq!(batch[0], embedder.embed("alpha").await.unwrap());
        assert_eq!(batch[1], embedder.embed("beta").await.unwrap());
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let embedder = HashEmbedder::new(16);
        assert!(embedder.embed_text("  ...  ").iter().all(|v| *v == 0.0));
    }
}

//! Data types for documents, chunks, retrieval results, and answers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Ordered string metadata. Ordering keeps persisted rows byte-stable.
pub type Metadata = BTreeMap<String, String>;

pub const META_SOURCE: &str = "source";
pub const META_FILE_TYPE: &str = "file_type";
pub const META_PATH: &str = "path";
pub const META_PAGE: &str = "page";
pub const META_SECTION: &str = "section";

/// Plain text extracted from one file (or one page/section of it).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedDocument {
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
}

impl NormalizedDocument {
    pub fn source(&self) -> Option<&str> {
        self.metadata.get(META_SOURCE).map(String::as_str)
    }
}

/// A contiguous span of one document's text; the unit of embedding and retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub text: String,
    /// Inherited unchanged from the parent document.
    pub metadata: Metadata,
    /// Position of this chunk within its document.
    pub chunk_index: usize,
    /// Character offsets into the parent document text.
    pub char_start: usize,
    pub char_end: usize,
}

impl Chunk {
    pub fn source(&self) -> Option<&str> {
        self.metadata.get(META_SOURCE).map(String::as_str)
    }

    /// Length in characters, the unit chunk size is measured in.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// A retrieved [`Chunk`] paired with a relevance score (higher is more relevant).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Chunks selected for a question, in the order the strategy chose them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub items: Vec<ScoredChunk>,
}

impl RetrievalResult {
    pub fn new(items: Vec<ScoredChunk>) -> Self {
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Distinct `source` values in order of first appearance.
    pub fn sources(&self) -> Vec<String> {
        let mut sources: Vec<String> = Vec::new();
        for item in &self.items {
            if let Some(source) = item.chunk.source() {
                if !sources.iter().any(|s| s == source) {
                    sources.push(source.to_string());
                }
            }
        }
        sources
    }

    pub fn best_score(&self) -> Option<f32> {
        self.items.iter().map(|i| i.score).reduce(f32::max)
    }

    /// Keep only items scoring at least `min_score`.
    pub fn retain_min_score(&mut self, min_score: f32) {
        self.items.retain(|i| i.score >= min_score);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerMode {
    Mock,
    Generative,
}

impl std::fmt::Display for AnswerMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mock => write!(f, "mock"),
            Self::Generative => write!(f, "generative"),
        }
    }
}

/// How a request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Outcome {
    Answered,
    /// A fixed message was returned instead of a synthesized answer.
    AnsweredWithFallback,
}

/// The answer returned to callers; identical shape in both modes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub answer: String,
    pub sources: Vec<String>,
    pub confidence: f32,
    pub mode: AnswerMode,
    #[serde(skip, default = "default_outcome")]
    pub outcome: Outcome,
}

fn default_outcome() -> Outcome {
    Outcome::Answered
}

impl Answer {
    /// A fixed-message answer with no sources and zero confidence.
    pub fn fallback(message: impl Into<String>, mode: AnswerMode) -> Self {
        Self {
            answer: message.into(),
            sources: Vec::new(),
            confidence: 0.0,
            mode,
            outcome: Outcome::AnsweredWithFallback,
        }
    }
}

/// Compute SHA-256 content hash.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

//! Types for the vector index: entries, manifest, and build options.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use docsage_core::{Chunk, ChunkingConfig, EmbeddingConfig, Error, Result};

/// Bumped whenever the on-disk layout changes.
pub const FORMAT_VERSION: u32 = 1;

/// One persisted (chunk, vector) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
}

/// The settings an index was built with. Two indexes built with equal
/// settings from the same corpus are interchangeable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildSettings {
    pub dimension: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub embedder_id: String,
}

/// Header of a persisted index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub format_version: u32,
    pub dimension: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub embedder_id: String,
    pub entry_count: usize,
    /// RFC 3339 timestamp.
    pub built_at: String,
}

impl Manifest {
    pub fn new(settings: BuildSettings, entry_count: usize) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            dimension: settings.dimension,
            chunk_size: settings.chunk_size,
            chunk_overlap: settings.chunk_overlap,
            embedder_id: settings.embedder_id,
            entry_count,
            built_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn settings(&self) -> BuildSettings {
        BuildSettings {
            dimension: self.dimension,
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
            embedder_id: self.embedder_id.clone(),
        }
    }

    /// Fail with [`Error::IndexMismatch`] listing every setting that differs.
    pub fn ensure_compatible(&self, expected: &BuildSettings) -> Result<()> {
        let mut diffs = Vec::new();
        if self.dimension != expected.dimension {
            diffs.push(format!("dimension {} != {}", self.dimension, expected.dimension));
        }
        if self.chunk_size != expected.chunk_size {
            diffs.push(format!("chunk_size {} != {}", self.chunk_size, expected.chunk_size));
        }
        if self.chunk_overlap != expected.chunk_overlap {
            diffs.push(format!(
                "chunk_overlap {} != {}",
                self.chunk_overlap, expected.chunk_overlap
            ));
        }
        if self.embedder_id != expected.embedder_id {
            diffs.push(format!(
                "embedder '{}' != '{}'",
                self.embedder_id, expected.embedder_id
            ));
        }

        if diffs.is_empty() {
            Ok(())
        } else {
            Err(Error::IndexMismatch(diffs.join(", ")))
        }
    }
}

/// Options for [`crate::VectorIndex::build`].
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Texts per embedding call.
    pub batch_size: usize,
    /// Embedding calls in flight at once.
    pub concurrency: usize,
    /// Deadline for each embedding call.
    pub timeout: Duration,
    /// Recorded in the manifest.
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl BuildOptions {
    pub fn from_config(embedding: &EmbeddingConfig, chunking: &ChunkingConfig) -> Self {
        Self {
            batch_size: embedding.batch_size,
            concurrency: embedding.concurrency,
            timeout: Duration::from_secs(embedding.timeout_secs),
            chunk_size: chunking.chunk_size,
            chunk_overlap: chunking.chunk_overlap,
        }
    }
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self::from_config(&EmbeddingConfig::default(), &ChunkingConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> BuildSettings {
        BuildSettings {
            dimension: 384,
            chunk_size: 512,
            chunk_overlap: 100,
            embedder_id: "hash-v1-384".into(),
        }
    }

    #[test]
    fn test_compatible_manifest() {
        let manifest = Manifest::new(settings(), 10);
        assert!(manifest.ensure_compatible(&settings()).is_ok());
        assert_eq!(manifest.format_version, FORMAT_VERSION);
    }

    #[test]
    fn test_chunk_size_mismatch() {
        let manifest = Manifest::new(settings(), 10);
        let expected = BuildSettings {
            chunk_size: 120,
            ..settings()
        };
        match manifest.ensure_compatible(&expected) {
            Err(Error::IndexMismatch(msg)) => assert!(msg.contains("chunk_size 512 != 120")),
            other => panic!("expected mismatch, got {:?}", other),
        }
    }
}

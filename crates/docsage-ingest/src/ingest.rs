//! Document ingestion pipeline: files → documents → chunks → vector index.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use docsage_core::{content_hash, AppConfig, Result};
use docsage_infer::{create_embedder, Embedder};
use docsage_store::{BuildOptions, VectorIndex};

use crate::chunking::RecursiveChunker;
use crate::file::{self, SkippedFile};

/// Summary of one ingestion run.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub files_loaded: usize,
    pub files_skipped: usize,
    pub documents: usize,
    pub duplicates: usize,
    pub chunks: usize,
    pub dimension: usize,
    pub embedder_id: String,
    #[serde(skip)]
    pub skipped: Vec<SkippedFile>,
}

/// Builds a vector index from a directory of documents.
pub struct Ingester {
    chunker: RecursiveChunker,
    embedder: Arc<dyn Embedder>,
    options: BuildOptions,
}

impl Ingester {
    /// The chunker's parameters override those in `options`, so the manifest
    /// always records what was actually used.
    pub fn new(chunker: RecursiveChunker, embedder: Arc<dyn Embedder>, options: BuildOptions) -> Self {
        let options = BuildOptions {
            chunk_size: chunker.chunk_size,
            chunk_overlap: chunker.chunk_overlap,
            ..options
        };
        Self {
            chunker,
            embedder,
            options,
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Ok(Self::new(
            RecursiveChunker::from_config(&config.chunking)?,
            create_embedder(&config.embedding)?,
            BuildOptions::from_config(&config.embedding, &config.chunking),
        ))
    }

    /// Load, chunk and embed everything under `data_dir`.
    pub async fn build_index(&self, data_dir: &Path) -> Result<(VectorIndex, IngestReport)> {
        let corpus = file::load_directory(data_dir)?;

        let mut seen = HashSet::new();
        let mut duplicates = 0;
        let documents: Vec<_> = corpus
            .documents
            .into_iter()
            .filter(|doc| {
                if seen.insert(content_hash(&doc.text)) {
                    true
                } else {
                    debug!(source = ?doc.source(), "Duplicate content, skipping");
                    duplicates += 1;
                    false
                }
            })
            .collect();

        let chunks = self.chunker.chunk_all(&documents);
        let chunk_count = chunks.len();
        let index = VectorIndex::build(chunks, self.embedder.as_ref(), &self.options).await?;

        let report = IngestReport {
            files_loaded: corpus.files_loaded,
            files_skipped: corpus.skipped.len(),
            documents: documents.len(),
            duplicates,
            chunks: chunk_count,
            dimension: index.dimension(),
            embedder_id: index.manifest().embedder_id.clone(),
            skipped: corpus.skipped,
        };
        Ok((index, report))
    }

    /// Build the index for `data_dir` and persist it to `index_dir`,
    /// replacing any previous index there.
    pub async fn run(&self, data_dir: &Path, index_dir: &Path) -> Result<IngestReport> {
        info!(
            data_dir = %data_dir.display(),
            index_dir = %index_dir.display(),
            "Starting ingestion"
        );
        let (index, report) = self.build_index(data_dir).await?;
        index.save(index_dir)?;

        info!(
            files = report.files_loaded,
            skipped = report.files_skipped,
            documents = report.documents,
            chunks = report.chunks,
            "Ingestion complete"
        );
        Ok(report)
    }
}

//! Chat orchestrator: question in, [`Answer`] out.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use docsage_chat::{
    AnswerSynthesizer, GenerativeSynthesizer, HttpGenerator, MockRetriever, MockSynthesizer,
    EMPTY_QUERY_MESSAGE, NOT_FOUND_MESSAGE,
};
use docsage_core::{
    Answer, AnswerMode, AppConfig, Error, Outcome, Result, RetrievalConfig, ServiceMode,
};
use docsage_infer::{create_embedder, CachedEmbedder, Embedder, QueryCache};
use docsage_resolve::{Retrieve, Retriever};
use docsage_store::{BuildSettings, SharedIndex, VectorIndex};

/// Runs retrieval then synthesis for one question. Holds no per-query state,
/// so one instance serves any number of concurrent requests.
pub struct ChatOrchestrator {
    retriever: Arc<dyn Retrieve>,
    synthesizer: Arc<dyn AnswerSynthesizer>,
    retrieval: RetrievalConfig,
    live_index: Option<LiveIndex>,
}

/// The index the retriever reads, plus the settings any replacement must match.
struct LiveIndex {
    shared: SharedIndex,
    expected: BuildSettings,
}

impl ChatOrchestrator {
    pub fn new(
        retriever: Arc<dyn Retrieve>,
        synthesizer: Arc<dyn AnswerSynthesizer>,
        retrieval: RetrievalConfig,
    ) -> Self {
        Self {
            retriever,
            synthesizer,
            retrieval,
            live_index: None,
        }
    }

    /// Keyword-rule answers; needs no index or model.
    pub fn mock() -> Self {
        Self::new(
            Arc::new(MockRetriever),
            Arc::new(MockSynthesizer),
            RetrievalConfig::default(),
        )
    }

    /// Real retrieval over `index` with answers from the configured LLM.
    ///
    /// The index must have been built with the configured chunking and the
    /// same embedder, otherwise its vectors are not comparable to queries.
    pub fn generative(
        index: VectorIndex,
        embedder: Arc<dyn Embedder>,
        config: &AppConfig,
    ) -> Result<Self> {
        let expected = BuildSettings {
            dimension: embedder.dimension(),
            chunk_size: config.chunking.chunk_size,
            chunk_overlap: config.chunking.chunk_overlap,
            embedder_id: embedder.id(),
        };
        index.manifest().ensure_compatible(&expected)?;

        let generator = HttpGenerator::from_config(&config.llm)?;
        info!(
            entries = index.len(),
            strategy = %config.retrieval.strategy,
            top_k = config.retrieval.top_k,
            llm = %generator.endpoint(),
            "Generative mode ready"
        );

        let embedder: Arc<dyn Embedder> =
            Arc::new(CachedEmbedder::new(embedder, QueryCache::default_cache()));
        let shared = SharedIndex::new(index);
        let retriever = Retriever::from_config(
            shared.clone(),
            embedder,
            &config.retrieval,
            Duration::from_secs(config.embedding.timeout_secs),
        );
        let synthesizer =
            GenerativeSynthesizer::new(Arc::new(generator), config.generation.clone());

        let mut orchestrator = Self::new(
            Arc::new(retriever),
            Arc::new(synthesizer),
            config.retrieval.clone(),
        );
        orchestrator.live_index = Some(LiveIndex { shared, expected });
        Ok(orchestrator)
    }

    /// Build the orchestrator for the configured mode. In generative mode the
    /// persisted index is loaded and checked here, so a missing or stale
    /// index fails startup instead of the first request.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        match config.mode {
            ServiceMode::Mock => {
                info!("Mock mode: answers are generated from keyword rules");
                Ok(Self::mock())
            }
            ServiceMode::Generative => {
                let index = VectorIndex::load(&config.paths.index_dir)?;
                let embedder = create_embedder(&config.embedding)?;
                Self::generative(index, embedder, config)
            }
        }
    }

    pub fn mode(&self) -> AnswerMode {
        self.synthesizer.mode()
    }

    /// Load the index at `location` and swap it in for subsequent questions,
    /// returning its entry count. Questions already running finish on the
    /// index they started with. The new index must match the settings the
    /// service started with; on any failure the current index keeps serving.
    pub fn reload_index(&self, location: impl AsRef<Path>) -> Result<usize> {
        let Some(live) = &self.live_index else {
            return Err(Error::Config("mock mode has no vector index to reload".into()));
        };

        let index = VectorIndex::load(location)?;
        index.manifest().ensure_compatible(&live.expected)?;
        let entries = index.len();
        live.shared.replace(index);
        Ok(entries)
    }

    /// Answer one question.
    ///
    /// A blank question and an empty retrieval both short-circuit to a fixed
    /// message with zero confidence. Capability failures propagate.
    pub async fn ask(&self, question: &str) -> Result<Answer> {
        let mode = self.mode();
        let question = question.trim();
        if question.is_empty() {
            debug!("Empty question, asking for input");
            return Ok(Answer::fallback(EMPTY_QUERY_MESSAGE, mode));
        }

        let mut retrieved = self.retriever.retrieve(question, self.retrieval.top_k).await?;
        retrieved.retain_min_score(self.retrieval.min_score);
        if retrieved.is_empty() {
            info!(%mode, "No relevant chunks retrieved");
            return Ok(Answer::fallback(NOT_FOUND_MESSAGE, mode));
        }

        let synthesis = self.synthesizer.synthesize(question, &retrieved).await?;
        if synthesis.used_fallback {
            return Ok(Answer::fallback(synthesis.text, mode));
        }

        let answer = Answer {
            answer: synthesis.text,
            sources: retrieved.sources(),
            confidence: synthesis.confidence,
            mode,
            outcome: Outcome::Answered,
        };
        info!(
            %mode,
            chunks = retrieved.len(),
            sources = answer.sources.len(),
            confidence = answer.confidence,
            "Question answered"
        );
        Ok(answer)
    }
}

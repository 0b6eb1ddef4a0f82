//! Answer synthesizers: question plus retrieved chunks to answer text.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use docsage_core::{with_timeout, AnswerMode, Capability, GenerationConfig, Result, RetrievalResult};

use crate::messages::NOT_FOUND_MESSAGE;
use crate::mock::{classify, mock_answer, MOCK_CONFIDENCE};
use crate::prompt::build_prompt;
use crate::providers::Generator;
use crate::types::{GenerationRequest, Synthesis};

#[async_trait]
pub trait AnswerSynthesizer: Send + Sync {
    fn mode(&self) -> AnswerMode;

    async fn synthesize(&self, question: &str, retrieved: &RetrievalResult) -> Result<Synthesis>;
}

/// Prompts the generation capability with the retrieved passages.
pub struct GenerativeSynthesizer {
    generator: Arc<dyn Generator>,
    config: GenerationConfig,
}

impl GenerativeSynthesizer {
    pub fn new(generator: Arc<dyn Generator>, config: GenerationConfig) -> Self {
        Self { generator, config }
    }

    fn fallback() -> Synthesis {
        Synthesis {
            text: NOT_FOUND_MESSAGE.to_string(),
            confidence: 0.0,
            used_fallback: true,
        }
    }
}

#[async_trait]
impl AnswerSynthesizer for GenerativeSynthesizer {
    fn mode(&self) -> AnswerMode {
        AnswerMode::Generative
    }

    async fn synthesize(&self, question: &str, retrieved: &RetrievalResult) -> Result<Synthesis> {
        let prompt = build_prompt(question, retrieved, &self.config.language);
        let request = GenerationRequest::new(prompt, &self.config);

        let raw = with_timeout(
            Capability::Generation,
            Duration::from_secs(self.config.timeout_secs),
            self.generator.generate(&request),
        )
        .await?;

        let text = raw.trim();
        if text.chars().count() < self.config.min_answer_chars.max(1) {
            info!(chars = text.chars().count(), "Generated answer too short, using fallback");
            return Ok(Self::fallback());
        }

        let confidence = retrieved.best_score().unwrap_or(0.0).clamp(0.0, 1.0);
        debug!(chars = text.chars().count(), confidence, "Answer synthesized");
        Ok(Synthesis {
            text: text.to_string(),
            confidence,
            used_fallback: false,
        })
    }
}

/// Deterministic templated answers citing the retrieved (or bucket) sources.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockSynthesizer;

#[async_trait]
impl AnswerSynthesizer for MockSynthesizer {
    fn mode(&self) -> AnswerMode {
        AnswerMode::Mock
    }

    async fn synthesize(&self, question: &str, retrieved: &RetrievalResult) -> Result<Synthesis> {
        let mut sources = retrieved.sources();
        if sources.is_empty() {
            sources = classify(question)
                .sources()
                .iter()
                .map(|s| s.to_string())
                .collect();
        }
        Ok(Synthesis {
            text: mock_answer(question.trim(), &sources),
            confidence: MOCK_CONFIDENCE,
            used_fallback: false,
        })
    }
}

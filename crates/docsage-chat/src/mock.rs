//! Mock mode: keyword rules stand in for both retrieval and generation so
//! the service runs without an index or any model.

use async_trait::async_trait;

use docsage_core::{
    Chunk, Metadata, Result, RetrievalResult, ScoredChunk, META_FILE_TYPE, META_SOURCE,
};
use docsage_resolve::Retrieve;

/// Fixed confidence reported for every mock answer.
pub const MOCK_CONFIDENCE: f32 = 0.75;

const PROCESS_KEYWORDS: &[&str] = &["quy trình", "process", "procedure", "workflow"];
const POLICY_KEYWORDS: &[&str] = &["chính sách", "policy", "quy định", "regulation"];

/// Topic a question is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicBucket {
    Process,
    Policy,
    General,
}

impl TopicBucket {
    /// Canonical source names cited for this bucket.
    pub fn sources(self) -> &'static [&'static str] {
        match self {
            Self::Process => &["internal_process.md"],
            Self::Policy => &["company_policy.pdf"],
            Self::General => &["general_docs.txt"],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Process => "process",
            Self::Policy => "policy",
            Self::General => "general",
        }
    }
}

/// Case-insensitive keyword match. Process keywords win over policy ones.
pub fn classify(question: &str) -> TopicBucket {
    let lowered = question.to_lowercase();
    if PROCESS_KEYWORDS.iter().any(|k| lowered.contains(k)) {
        TopicBucket::Process
    } else if POLICY_KEYWORDS.iter().any(|k| lowered.contains(k)) {
        TopicBucket::Policy
    } else {
        TopicBucket::General
    }
}

/// The templated mock answer.
pub fn mock_answer(question: &str, sources: &[String]) -> String {
    format!(
        "Dựa trên tài liệu nội bộ, tôi tìm thấy thông tin liên quan đến câu hỏi: '{}'.\n\
         Tài liệu tham khảo: {}.",
        question,
        sources.join(", ")
    )
}

/// Returns one synthetic chunk per canonical source of the question's bucket.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockRetriever;

#[async_trait]
impl Retrieve for MockRetriever {
    async fn retrieve(&self, question: &str, k: usize) -> Result<RetrievalResult> {
        let bucket = classify(question);
        let items = bucket
            .sources()
            .iter()
            .take(k)
            .enumerate()
            .map(|(i, source)| {
                let mut metadata = Metadata::new();
                metadata.insert(META_SOURCE.into(), source.to_string());
                if let Some((_, ext)) = source.rsplit_once('.') {
                    metadata.insert(META_FILE_TYPE.into(), ext.to_string());
                }
                ScoredChunk {
                    chunk: Chunk {
                        id: format!("mock-{}-{}", bucket.as_str(), i),
                        document_id: source.to_string(),
                        text: String::new(),
                        metadata,
                        chunk_index: i,
                        char_start: 0,
                        char_end: 0,
                    },
                    score: MOCK_CONFIDENCE,
                }
            })
            .collect();
        Ok(RetrievalResult::new(items))
    }
}

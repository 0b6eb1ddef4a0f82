//! Answer synthesis for DocSage.
//!
//! Turns a question plus retrieved chunks into an answer, either through an
//! OpenAI-compatible chat-completions endpoint or the deterministic mock
//! rules used when no model is available.

pub mod messages;
pub mod mock;
pub mod prompt;
pub mod providers;
pub mod synthesizer;
pub mod types;

pub use messages::{EMPTY_QUERY_MESSAGE, NOT_FOUND_MESSAGE};
pub use mock::{classify, MockRetriever, TopicBucket, MOCK_CONFIDENCE};
pub use prompt::{build_prompt, Prompt};
pub use providers::{Generator, HttpGenerator};
pub use synthesizer::{AnswerSynthesizer, GenerativeSynthesizer, MockSynthesizer};
pub use types::*;

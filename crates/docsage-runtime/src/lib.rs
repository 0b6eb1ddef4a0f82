//! Runtime orchestrator: answers one question end to end.
//!
//! The orchestrator is the only place where mock and generative answering
//! are interchangeable; callers always get the same [`docsage_core::Answer`].

pub mod orchestrator;

pub use orchestrator::ChatOrchestrator;

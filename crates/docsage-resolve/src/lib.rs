//! Retrieval: strategies that pick chunks from the vector index for a
//! query vector, and the retriever that embeds questions and dispatches to
//! the configured strategy.

pub mod retriever;
pub mod strategy;

pub use retriever::{Retrieve, Retriever};
pub use strategy::{strategy_for, Mmr, RetrievalStrategy, Similarity};

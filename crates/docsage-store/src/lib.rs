//! DocSage Store: the vector index, its SQLite on-disk layout, and the
//! shared snapshot handle the query path reads from.

pub mod embedding;
pub mod index;
pub mod schema;
pub mod shared;
pub mod types;

pub use index::{VectorIndex, INDEX_FILE};
pub use shared::SharedIndex;
pub use types::*;

//! DocSage Ingest: document loading, chunking, and the offline index build.

pub mod chunking;
pub mod file;
pub mod formats;
pub mod ingest;

pub use chunking::RecursiveChunker;
pub use file::{discover_files, load_directory, load_file, FileType, LoadedCorpus, SkippedFile};
pub use ingest::{IngestReport, Ingester};

//! Database schema SQL for `index.db`.

/// Build settings as key/value rows, then one row per index entry.
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS manifest (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS entries (
    position INTEGER PRIMARY KEY,
    id TEXT NOT NULL,
    document_id TEXT NOT NULL,
    chunk_index INTEGER NOT NULL,
    char_start INTEGER NOT NULL,
    char_end INTEGER NOT NULL,
    text TEXT NOT NULL,
    metadata_json TEXT NOT NULL,
    embedding BLOB NOT NULL
);
"#;

pub const KEY_FORMAT_VERSION: &str = "format_version";
pub const KEY_DIMENSION: &str = "dimension";
pub const KEY_CHUNK_SIZE: &str = "chunk_size";
pub const KEY_CHUNK_OVERLAP: &str = "chunk_overlap";
pub const KEY_EMBEDDER_ID: &str = "embedder_id";
pub const KEY_ENTRY_COUNT: &str = "entry_count";
pub const KEY_BUILT_AT: &str = "built_at";

//! Text chunking with exact overlap.
//!
//! Lengths and offsets are counted in chars. Each chunk ends at the last
//! natural boundary that fits, trying boundary kinds in priority order:
//! paragraph break, line break, sentence end, whitespace, and finally a
//! hard cut. The next chunk starts `overlap` chars before the previous one
//! ended, so neighbours always share exactly `overlap` chars.

use tracing::debug;

use docsage_core::{Chunk, ChunkingConfig, Error, NormalizedDocument, Result};

/// Default chunk size (chars).
pub const DEFAULT_CHUNK_SIZE: usize = 512;
/// Default overlap between chunks (chars).
pub const DEFAULT_CHUNK_OVERLAP: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Boundary {
    Paragraph,
    Line,
    Sentence,
    Whitespace,
}

const PRIORITY: [Boundary; 4] = [
    Boundary::Paragraph,
    Boundary::Line,
    Boundary::Sentence,
    Boundary::Whitespace,
];

fn is_terminator(c: char) -> bool {
    matches!(c, '.' | '!' | '?' | '。' | '…' | '！' | '？')
}

/// Full-width terminators end a sentence without trailing whitespace.
fn is_cjk_terminator(c: char) -> bool {
    matches!(c, '。' | '！' | '？')
}

impl Boundary {
    /// Whether cutting before `chars[e]` lands on this kind of boundary.
    /// Callers guarantee `0 < e < chars.len()`.
    fn matches(self, chars: &[char], e: usize) -> bool {
        let prev = chars[e - 1];
        let next = chars[e];
        match self {
            Self::Paragraph => e >= 2 && prev == '\n' && chars[e - 2] == '\n' && next != '\n',
            Self::Line => prev == '\n' && next != '\n',
            Self::Sentence => {
                is_cjk_terminator(prev)
                    || (prev.is_whitespace() && e >= 2 && is_terminator(chars[e - 2]))
            }
            Self::Whitespace => prev.is_whitespace() && !next.is_whitespace(),
        }
    }
}

/// Splits text into bounded, overlapping chunks.
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl RecursiveChunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::Config("chunk_size must be greater than 0".into()));
        }
        if chunk_overlap >= chunk_size {
            return Err(Error::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                chunk_overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn from_config(config: &ChunkingConfig) -> Result<Self> {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    /// Char-offset spans `[start, end)` covering `text`.
    pub fn spans(&self, text: &str) -> Vec<(usize, usize)> {
        let chars: Vec<char> = text.chars().collect();
        let n = chars.len();
        let mut spans = Vec::new();
        if n == 0 {
            return spans;
        }

        let mut start = 0;
        loop {
            if n - start <= self.chunk_size {
                spans.push((start, n));
                break;
            }
            let end = self.find_cut(&chars, start);
            spans.push((start, end));
            start = end - self.chunk_overlap;
        }
        spans
    }

    /// Last cut in `(start + overlap, start + chunk_size]` of the best boundary kind.
    fn find_cut(&self, chars: &[char], start: usize) -> usize {
        let lo = start + self.chunk_overlap + 1;
        let hi = start + self.chunk_size;

        for kind in PRIORITY {
            if let Some(e) = (lo..=hi).rev().find(|&e| kind.matches(chars, e)) {
                return e;
            }
        }
        hi
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        self.spans(text)
            .into_iter()
            .map(|(s, e)| chars[s..e].iter().collect())
            .collect()
    }

    /// Chunk one document; metadata is copied onto every chunk.
    pub fn chunk_document(&self, document: &NormalizedDocument) -> Vec<Chunk> {
        let chars: Vec<char> = document.text.chars().collect();
        self.spans(&document.text)
            .into_iter()
            .enumerate()
            .map(|(chunk_index, (start, end))| Chunk {
                id: format!("{}-{}", document.id, chunk_index),
                document_id: document.id.clone(),
                text: chars[start..end].iter().collect(),
                metadata: document.metadata.clone(),
                chunk_index,
                char_start: start,
                char_end: end,
            })
            .collect()
    }

    /// Chunk documents in order: document order first, then chunk order.
    pub fn chunk_all(&self, documents: &[NormalizedDocument]) -> Vec<Chunk> {
        let chunks: Vec<Chunk> = documents
            .iter()
            .flat_map(|d| self.chunk_document(d))
            .collect();
        debug!(
            documents = documents.len(),
            chunks = chunks.len(),
            size = self.chunk_size,
            overlap = self.chunk_overlap,
            "Chunked documents"
        );
        chunks
    }
}

impl Default for RecursiveChunker {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsage_core::{Metadata, META_SOURCE};

    fn doc(id: &str, text: &str) -> NormalizedDocument {
        let mut metadata = Metadata::new();
        metadata.insert(META_SOURCE.into(), format!("{}.txt", id));
        NormalizedDocument {
            id: id.into(),
            text: text.into(),
            metadata,
        }
    }

    fn assert_invariants(chunker: &RecursiveChunker, text: &str) {
        let pieces = chunker.split_text(text);
        let o = chunker.chunk_overlap;
        for piece in &pieces {
            assert!(piece.chars().count() <= chunker.chunk_size, "too long: {:?}", piece);
        }
        for pair in pieces.windows(2) {
            let a: Vec<char> = pair[0].chars().collect();
            let b: Vec<char> = pair[1].chars().collect();
            assert_eq!(&a[a.len() - o..], &b[..o], "overlap broken between {:?} and {:?}", pair[0], pair[1]);
        }
        // Reassembling without overlaps reproduces the text.
        let mut rebuilt: String = pieces.first().cloned().unwrap_or_default();
        for piece in pieces.iter().skip(1) {
            rebuilt.extend(piece.chars().skip(o));
        }
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn test_short_text_single_chunk() {
        let chunker = RecursiveChunker::new(512, 100).unwrap();
        assert_eq!(chunker.split_text("Hello, world!"), vec!["Hello, world!"]);
    }

    #[test]
    fn test_empty_text_no_chunks() {
        let chunker = RecursiveChunker::default();
        assert!(chunker.split_text("").is_empty());
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(RecursiveChunker::new(100, 100).is_err());
        assert!(RecursiveChunker::new(0, 0).is_err());
        assert!(RecursiveChunker::new(100, 99).is_ok());
    }

    #[test]
    fn test_prefers_paragraph_break() {
        let chunker = RecursiveChunker::new(60, 5).unwrap();
        let text = "First paragraph is here.\n\nSecond one. It keeps going on and on for a while.";
        let pieces = chunker.split_text(text);
        assert_eq!(pieces[0], "First paragraph is here.\n\n");
        assert_invariants(&chunker, text);
    }

    #[test]
    fn test_sentence_before_whitespace() {
        let chunker = RecursiveChunker::new(40, 4).unwrap();
        let text = "Quy trình gồm ba bước. Bước một là nộp đơn và chờ duyệt.";
        let pieces = chunker.split_text(text);
        assert_eq!(pieces[0], "Quy trình gồm ba bước. ");
        assert_invariants(&chunker, text);
    }

    #[test]
    fn test_cjk_terminator_without_space() {
        let chunker = RecursiveChunker::new(8, 2).unwrap();
        let text = "请假需要审批。报销需要发票和签字。";
        let pieces = chunker.split_text(text);
        assert_eq!(pieces[0], "请假需要审批。");
        assert_invariants(&chunker, text);
    }

    #[test]
    fn test_hard_cut_on_unbroken_text() {
        let chunker = RecursiveChunker::new(10, 3).unwrap();
        let text = "a".repeat(35);
        let pieces = chunker.split_text(&text);
        assert_eq!(pieces[0].len(), 10);
        assert_invariants(&chunker, &text);
    }

    #[test]
    fn test_invariants_on_mixed_text() {
        let text = "Chính sách làm việc từ xa.\nNhân viên được làm việc tại nhà hai ngày mỗi tuần!\n\n\
                    Remote work requests go through the manager. Approval takes two days?\n\
                    Một số bộ phận có quy định riêng…   Xem thêm tại phụ lục.";
        for (size, overlap) in [(20, 0), (30, 5), (50, 10), (120, 20), (17, 16)] {
            let chunker = RecursiveChunker::new(size, overlap).unwrap();
            assert_invariants(&chunker, text);
        }
    }

    #[test]
    fn test_chunk_all_keeps_order_and_metadata() {
        let chunker = RecursiveChunker::new(20, 4).unwrap();
        let docs = vec![
            doc("a", "alpha beta gamma delta epsilon zeta eta theta"),
            doc("b", "short"),
        ];
        let chunks = chunker.chunk_all(&docs);

        assert!(chunks.len() > 2);
        let last = chunks.last().unwrap();
        assert_eq!(last.document_id, "b");
        assert_eq!(last.id, "b-0");
        assert_eq!(last.source(), Some("b.txt"));

        let a_chunks: Vec<_> = chunks.iter().filter(|c| c.document_id == "a").collect();
        for (i, c) in a_chunks.iter().enumerate() {
            assert_eq!(c.chunk_index, i);
            assert_eq!(c.metadata, docs[0].metadata);
            assert_eq!(c.char_len(), c.char_end - c.char_start);
        }
    }
}

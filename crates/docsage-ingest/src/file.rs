//! File discovery and per-type text extraction.

use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use docsage_core::{
    content_hash, Error, Metadata, NormalizedDocument, Result, META_FILE_TYPE, META_PAGE,
    META_PATH, META_SECTION, META_SOURCE,
};

use crate::formats;

/// Supported file types for text extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    PlainText,
    Markdown,
    Html,
    Json,
    Csv,
    Docx,
    Pdf,
    Unsupported,
}

impl FileType {
    /// Detect file type from extension.
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "txt" => Self::PlainText,
            "md" | "markdown" => Self::Markdown,
            "html" | "htm" => Self::Html,
            "json" => Self::Json,
            "csv" => Self::Csv,
            "docx" => Self::Docx,
            "pdf" => Self::Pdf,
            _ => Self::Unsupported,
        }
    }

    pub fn from_path(path: &Path) -> Self {
        Self::from_extension(path.extension().and_then(|e| e.to_str()).unwrap_or(""))
    }

    /// Tag stored in chunk metadata.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PlainText => "txt",
            Self::Markdown => "md",
            Self::Html => "html",
            Self::Json => "json",
            Self::Csv => "csv",
            Self::Docx => "docx",
            Self::Pdf => "pdf",
            Self::Unsupported => "unsupported",
        }
    }

    /// Whether this build can extract text from the type. PDF needs the
    /// `pdf` feature.
    pub fn is_supported(&self) -> bool {
        match self {
            Self::Unsupported => false,
            Self::Pdf => cfg!(feature = "pdf"),
            _ => true,
        }
    }
}

/// A file left out of ingestion, with the reason.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Documents loaded from a directory.
#[derive(Debug, Clone, Default)]
pub struct LoadedCorpus {
    pub documents: Vec<NormalizedDocument>,
    pub files_loaded: usize,
    pub skipped: Vec<SkippedFile>,
}

/// Recursively list regular files under `dir` in path order, following
/// symlinks. Hidden entries (leading `.`) are ignored. Entries the walk
/// cannot read come back as skipped instead of failing the walk.
pub fn discover_files(dir: &Path) -> (Vec<PathBuf>, Vec<SkippedFile>) {
    let mut files = Vec::new();
    let mut skipped = Vec::new();

    let walker = WalkDir::new(dir)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry));

    for entry in walker {
        match entry {
            Ok(entry) if entry.file_type().is_file() => files.push(entry.into_path()),
            Ok(_) => {}
            Err(e) => {
                let path = e
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| dir.to_path_buf());
                warn!("Skipping unreadable entry {}: {}", path.display(), e);
                skipped.push(SkippedFile {
                    path,
                    reason: format!("unreadable: {}", e),
                });
            }
        }
    }

    (files, skipped)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

/// Extract one file into zero or more documents.
///
/// Unsupported types fail with [`Error::UnsupportedInput`]; unreadable or
/// undecodable content fails with [`Error::Extraction`] or [`Error::Io`].
pub fn load_file(path: &Path) -> Result<Vec<NormalizedDocument>> {
    let file_type = FileType::from_path(path);
    if !file_type.is_supported() {
        return Err(Error::UnsupportedInput(format!(
            "{} (.{})",
            path.display(),
            path.extension().and_then(|e| e.to_str()).unwrap_or("")
        )));
    }

    // (text, page, section) per document
    let parts: Vec<(String, Option<usize>, Option<String>)> = match file_type {
        FileType::PlainText | FileType::Csv => vec![(read_utf8(path)?, None, None)],
        FileType::Markdown => formats::markdown_sections(&read_utf8(path)?)
            .into_iter()
            .map(|s| (s.text, None, s.path))
            .collect(),
        FileType::Html => vec![(formats::html_to_text(&read_utf8(path)?), None, None)],
        FileType::Json => {
            let value: serde_json::Value = serde_json::from_str(&read_utf8(path)?)
                .map_err(|e| Error::Extraction(format!("{}: invalid JSON: {}", path.display(), e)))?;
            vec![(formats::json_strings(&value), None, None)]
        }
        FileType::Docx => vec![(extract_docx(path)?, None, None)],
        FileType::Pdf => extract_pdf_pages(path)?
            .into_iter()
            .enumerate()
            .map(|(i, text)| (text, Some(i + 1), None))
            .collect(),
        FileType::Unsupported => Vec::new(),
    };

    let absolute = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let source = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| absolute.display().to_string());

    let documents: Vec<NormalizedDocument> = parts
        .into_iter()
        .enumerate()
        .filter_map(|(ordinal, (text, page, section))| {
            let text = text.trim();
            if text.is_empty() {
                return None;
            }

            let mut metadata = Metadata::new();
            metadata.insert(META_SOURCE.into(), source.clone());
            metadata.insert(META_FILE_TYPE.into(), file_type.as_str().into());
            metadata.insert(META_PATH.into(), absolute.display().to_string());
            if let Some(page) = page {
                metadata.insert(META_PAGE.into(), page.to_string());
            }
            if let Some(section) = section {
                metadata.insert(META_SECTION.into(), section);
            }

            Some(NormalizedDocument {
                id: content_hash(&format!("{}#{}", absolute.display(), ordinal)),
                text: text.to_string(),
                metadata,
            })
        })
        .collect();

    debug!(
        path = %path.display(),
        file_type = file_type.as_str(),
        documents = documents.len(),
        "Loaded file"
    );
    Ok(documents)
}

/// Load every supported file under `dir`.
///
/// Unsupported files, unreadable entries and files that fail to load are
/// logged and recorded in [`LoadedCorpus::skipped`]; they never abort the
/// run. Fails with [`Error::NoDocumentsFound`] when nothing usable was found.
pub fn load_directory(dir: &Path) -> Result<LoadedCorpus> {
    if !dir.is_dir() {
        return Err(Error::NoDocumentsFound(dir.to_path_buf()));
    }

    let (files, unreadable) = discover_files(dir);
    let mut corpus = LoadedCorpus {
        skipped: unreadable,
        ..Default::default()
    };
    let mut supported = 0usize;

    for path in files {
        match load_file(&path) {
            Ok(documents) => {
                supported += 1;
                if documents.is_empty() {
                    debug!("No text extracted from {}", path.display());
                    corpus.skipped.push(SkippedFile {
                        path,
                        reason: "no text extracted".into(),
                    });
                    continue;
                }
                corpus.files_loaded += 1;
                corpus.documents.extend(documents);
            }
            Err(Error::UnsupportedInput(reason)) => {
                warn!("Skipping unsupported file: {}", reason);
                corpus.skipped.push(SkippedFile {
                    path,
                    reason: format!("unsupported: {}", reason),
                });
            }
            Err(e) => {
                supported += 1;
                warn!("Failed to load {}: {}", path.display(), e);
                corpus.skipped.push(SkippedFile {
                    path,
                    reason: e.to_string(),
                });
            }
        }
    }

    if supported == 0 || corpus.documents.is_empty() {
        return Err(Error::NoDocumentsFound(dir.to_path_buf()));
    }

    info!(
        files = corpus.files_loaded,
        skipped = corpus.skipped.len(),
        documents = corpus.documents.len(),
        "Loaded documents from {}",
        dir.display()
    );
    Ok(corpus)
}

fn read_utf8(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    let text = String::from_utf8(bytes)
        .map_err(|e| Error::Extraction(format!("{}: not valid UTF-8: {}", path.display(), e)))?;
    Ok(formats::normalize_text(&text))
}

fn extract_docx(path: &Path) -> Result<String> {
    let file = std::fs::File::open(path)?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| Error::Extraction(format!("{}: invalid DOCX: {}", path.display(), e)))?;
    let mut entry = archive
        .by_name("word/document.xml")
        .map_err(|e| Error::Extraction(format!("{}: missing document.xml: {}", path.display(), e)))?;

    let mut xml = String::new();
    entry
        .read_to_string(&mut xml)
        .map_err(|e| Error::Extraction(format!("{}: unreadable document.xml: {}", path.display(), e)))?;
    Ok(formats::docx_xml_to_text(&xml))
}

#[cfg(feature = "pdf")]
fn extract_pdf_pages(path: &Path) -> Result<Vec<String>> {
    let bytes = std::fs::read(path)?;
    let pages = pdf_extract::extract_text_from_mem_by_pages(&bytes)
        .map_err(|e| Error::Extraction(format!("{}: PDF extraction error: {}", path.display(), e)))?;
    Ok(pages.iter().map(|p| formats::normalize_text(p)).collect())
}

#[cfg(not(feature = "pdf"))]
fn extract_pdf_pages(path: &Path) -> Result<Vec<String>> {
    Err(Error::UnsupportedInput(format!(
        "{} (PDF support not compiled in)",
        path.display()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_file_type_detection() {
        assert_eq!(FileType::from_extension("TXT"), FileType::PlainText);
        assert_eq!(FileType::from_extension("markdown"), FileType::Markdown);
        assert_eq!(FileType::from_extension("htm"), FileType::Html);
        assert_eq!(FileType::from_extension("exe"), FileType::Unsupported);
        assert!(!FileType::Unsupported.is_supported());
    }

    #[test]
    fn test_load_text_metadata() {
        let dir = TempDir::new().unwrap();
        let path = write(dir.path(), "policy.txt", "\u{feff}Nghỉ phép 12 ngày.\r\nLàm việc từ xa.\r\n".as_bytes());
        let docs = load_file(&path).unwrap();

        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].text, "Nghỉ phép 12 ngày.\nLàm việc từ xa.");
        assert_eq!(docs[0].source(), Some("policy.txt"));
        assert_eq!(docs[0].metadata[META_FILE_TYPE], "txt");
        assert!(Path::new(&docs[0].metadata[META_PATH]).is_absolute());
    }

    #[test]
    fn test_markdown_yields_sections() {
        let dir = TempDir::new().unwrap();
        let path = write(dir.path(), "process.md", b"# Hiring\nThree rounds.\n## Offer\nSigned by HR.\n");
        let docs = load_file(&path).unwrap();

        assert_eq!(docs.len(), 2);
        assert_eq!(docs[1].metadata[META_SECTION], "Hiring > Offer");
        assert_ne!(docs[0].id, docs[1].id);
    }

    #[test]
    fn test_docx_extraction() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("handbook.docx");
        {
            let file = std::fs::File::create(&path).unwrap();
            let mut zip = zip::ZipWriter::new(file);
            zip.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
                .unwrap();
            zip.write_all(br#"<w:document><w:body><w:p><w:r><w:t>Expense policy</w:t></w:r></w:p></w:body></w:document>"#)
                .unwrap();
            zip.finish().unwrap();
        }
        let docs = load_file(&path).unwrap();
        assert_eq!(docs[0].text, "Expense policy");
        assert_eq!(docs[0].metadata[META_FILE_TYPE], "docx");
    }

    #[test]
    fn test_invalid_utf8_is_extraction_error() {
        let dir = TempDir::new().unwrap();
        let path = write(dir.path(), "broken.txt", &[0xff, 0xfe, 0x00, 0xc3]);
        assert!(matches!(load_file(&path), Err(Error::Extraction(_))));
    }

    #[test]
    fn test_unsupported_and_supported_mix() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "notes.txt", b"Remote work is allowed two days a week.");
        write(dir.path(), "image.png", &[0x89, b'P', b'N', b'G']);
        write(dir.path(), ".hidden.txt", b"ignored");

        let corpus = load_directory(dir.path()).unwrap();
        assert_eq!(corpus.files_loaded, 1);
        assert_eq!(corpus.documents.len(), 1);
        assert_eq!(corpus.documents[0].source(), Some("notes.txt"));
        assert_eq!(corpus.skipped.len(), 1);
        assert!(corpus.skipped[0].path.ends_with("image.png"));
    }

    #[test]
    fn test_no_supported_files() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.bin", b"\x00\x01");
        assert!(matches!(
            load_directory(dir.path()),
            Err(Error::NoDocumentsFound(_))
        ));

        let empty = TempDir::new().unwrap();
        assert!(matches!(
            load_directory(empty.path()),
            Err(Error::NoDocumentsFound(_))
        ));
    }

    #[test]
    fn test_corrupt_file_does_not_abort() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "good.md", b"# Leave\nTwelve days.");
        write(dir.path(), "bad.json", b"{ not json");
        write(dir.path(), "sub/nested.txt", b"Nested document.");

        let corpus = load_directory(dir.path()).unwrap();
        assert_eq!(corpus.files_loaded, 2);
        assert_eq!(corpus.skipped.len(), 1);
        assert!(corpus.skipped[0].path.ends_with("bad.json"));
    }

    #[test]
    fn test_walk_is_sorted_and_skips_hidden_dirs() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "b.txt", b"b");
        write(dir.path(), "a/z.txt", b"z");
        write(dir.path(), ".git/config.txt", b"hidden");

        let (files, skipped) = discover_files(dir.path());
        assert_eq!(files, vec![dir.path().join("a/z.txt"), dir.path().join("b.txt")]);
        assert!(skipped.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_subdirectory_does_not_abort() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        write(dir.path(), "good.txt", b"Twelve days of paid leave.");
        write(dir.path(), "locked/secret.txt", b"Not reachable.");
        let locked = dir.path().join("locked");
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000)).unwrap();
        // Root ignores directory permissions.
        let enforced = std::fs::read_dir(&locked).is_err();

        let corpus = load_directory(dir.path());
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();

        let corpus = corpus.unwrap();
        assert_eq!(corpus.documents[0].source(), Some("good.txt"));
        if enforced {
            assert_eq!(corpus.documents.len(), 1);
            assert_eq!(corpus.skipped.len(), 1);
            assert_eq!(corpus.skipped[0].path, locked);
            assert!(corpus.skipped[0].reason.starts_with("unreadable"));
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_followed_or_recorded() {
        let outside = TempDir::new().unwrap();
        let target = write(outside.path(), "shared.md", b"# Travel\nBook through HR.");

        let dir = TempDir::new().unwrap();
        write(dir.path(), "local.txt", b"Local document.");
        std::os::unix::fs::symlink(&target, dir.path().join("linked.md")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("gone.txt"), dir.path().join("dangling.txt"))
            .unwrap();

        let corpus = load_directory(dir.path()).unwrap();
        assert_eq!(corpus.files_loaded, 2);
        assert!(corpus
            .documents
            .iter()
            .any(|d| d.source() == Some("linked.md")));
        assert_eq!(corpus.skipped.len(), 1);
        assert!(corpus.skipped[0].path.ends_with("dangling.txt"));
    }
}

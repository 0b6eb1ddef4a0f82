//! Format-specific text conversions. Pure string → string functions; file
//! access lives in [`crate::file`].

use once_cell::sync::Lazy;
use regex::Regex;

static MD_HEADER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(#{1,6})\s+(.+?)\s*#*\s*$").unwrap());

static HTML_DROP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<script\b[^>]*>.*?</script>|<style\b[^>]*>.*?</style>|<!--.*?-->").unwrap()
});
static HTML_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)</?(p|div|br|li|ul|ol|tr|td|th|table|h[1-6]|section|article|header|footer|blockquote|pre)\b[^>]*>")
        .unwrap()
});
static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());
static ENTITY: Lazy<Regex> = Lazy::new(|| Regex::new(r"&(#[0-9]+|#[xX][0-9a-fA-F]+|[a-zA-Z]+);").unwrap());
static SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t\u{a0}]+").unwrap());

static DOCX_PARAGRAPH_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"</w:p>|<w:br\s*/>|<w:cr\s*/>").unwrap());
static DOCX_TAB: Lazy<Regex> = Lazy::new(|| Regex::new(r"<w:tab\s*/>").unwrap());

/// Normalize line endings and drop a leading byte-order mark.
pub fn normalize_text(text: &str) -> String {
    text.trim_start_matches('\u{feff}')
        .replace("\r\n", "\n")
        .replace('\r', "\n")
}

/// A markdown section: its header path (`None` for text before the first
/// header) and its text, header line included.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkdownSection {
    pub path: Option<String>,
    pub text: String,
}

/// Split markdown at ATX headers. Headers inside fenced code blocks are
/// ignored.
pub fn markdown_sections(text: &str) -> Vec<MarkdownSection> {
    let mut sections = Vec::new();
    let mut trail: Vec<(usize, String)> = Vec::new();
    let mut current_path: Option<String> = None;
    let mut current = String::new();
    let mut in_fence = false;

    for line in text.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
        }

        let header = if in_fence { None } else { MD_HEADER.captures(line) };
        if let Some(caps) = header {
            push_section(&mut sections, current_path.take(), &current);
            current.clear();

            let level = caps[1].len();
            let title = caps[2].to_string();
            trail.retain(|(l, _)| *l < level);
            trail.push((level, title));
            current_path = Some(
                trail
                    .iter()
                    .map(|(_, t)| t.as_str())
                    .collect::<Vec<_>>()
                    .join(" > "),
            );
        }

        current.push_str(line);
        current.push('\n');
    }
    push_section(&mut sections, current_path, &current);
    sections
}

fn push_section(sections: &mut Vec<MarkdownSection>, path: Option<String>, text: &str) {
    let text = text.trim();
    if !text.is_empty() {
        sections.push(MarkdownSection {
            path,
            text: text.to_string(),
        });
    }
}

/// Strip markup from an HTML page, keeping block structure as lines.
pub fn html_to_text(html: &str) -> String {
    let without_scripts = HTML_DROP.replace_all(html, " ");
    let with_breaks = HTML_BLOCK.replace_all(&without_scripts, "\n");
    let without_tags = TAG.replace_all(&with_breaks, "");
    collapse_lines(&decode_entities(&without_tags))
}

/// Text of a DOCX `word/document.xml` part, one paragraph per line.
pub fn docx_xml_to_text(xml: &str) -> String {
    let with_breaks = DOCX_PARAGRAPH_END.replace_all(xml, "\n");
    let with_tabs = DOCX_TAB.replace_all(&with_breaks, " ");
    let without_tags = TAG.replace_all(&with_tabs, "");
    collapse_lines(&decode_entities(&without_tags))
}

/// All string leaves of a JSON value, depth first, one per line.
pub fn json_strings(value: &serde_json::Value) -> String {
    fn walk(value: &serde_json::Value, out: &mut Vec<String>) {
        match value {
            serde_json::Value::String(s) => {
                let s = s.trim();
                if !s.is_empty() {
                    out.push(s.to_string());
                }
            }
            serde_json::Value::Array(items) => items.iter().for_each(|v| walk(v, out)),
            serde_json::Value::Object(map) => map.values().for_each(|v| walk(v, out)),
            _ => {}
        }
    }

    let mut out = Vec::new();
    walk(value, &mut out);
    out.join("\n")
}

/// Decode the named XML/HTML entities plus numeric references.
pub fn decode_entities(text: &str) -> String {
    ENTITY
        .replace_all(text, |caps: &regex::Captures| {
            let name = &caps[1];
            let decoded = if let Some(hex) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = name.strip_prefix('#') {
                dec.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                match name {
                    "amp" => Some('&'),
                    "lt" => Some('<'),
                    "gt" => Some('>'),
                    "quot" => Some('"'),
                    "apos" => Some('\''),
                    "nbsp" => Some(' '),
                    _ => None,
                }
            };
            decoded
                .map(String::from)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Collapse runs of spaces inside each line and drop blank lines.
fn collapse_lines(text: &str) -> String {
    text.lines()
        .map(|line| SPACES.replace_all(line, " ").trim().to_string())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markdown_sections_with_paths() {
        let md = "Intro line.\n\n# Policy\nGeneral rules.\n## Leave\nTwelve days.\n```\n# not a header\n```\n## Remote\nTwo days.\n# Process\nSteps.";
        let sections = markdown_sections(md);

        let paths: Vec<Option<&str>> = sections.iter().map(|s| s.path.as_deref()).collect();
        assert_eq!(
            paths,
            vec![
                None,
                Some("Policy"),
                Some("Policy > Leave"),
                Some("Policy > Remote"),
                Some("Process"),
            ]
        );
        assert!(sections[2].text.contains("# not a header"));
        assert!(sections[1].text.starts_with("# Policy"));
    }

    #[test]
    fn test_html_to_text() {
        let html = "<html><head><style>p{color:red}</style><script>var x = 1;</script></head>\
                    <body><h1>Chính sách</h1><p>Rock &amp; roll&nbsp;&nbsp;now</p>\
                    <p>Line&#32;two &#x41;</p></body></html>";
        let text = html_to_text(html);
        assert_eq!(text, "Chính sách\nRock & roll now\nLine two A");
    }

    #[test]
    fn test_docx_paragraphs() {
        let xml = r#"<w:document><w:body><w:p><w:r><w:t>Quy trình</w:t></w:r><w:r><w:tab/><w:t>A &amp; B</w:t></w:r></w:p><w:p><w:r><w:t>Second</w:t></w:r></w:p></w:body></w:document>"#;
        assert_eq!(docx_xml_to_text(xml), "Quy trình A & B\nSecond");
    }

    #[test]
    fn test_json_strings() {
        let value: serde_json::Value = serde_json::from_str(
            r#"{"title": "Handbook", "items": [{"q": "Leave?", "a": "12 days"}, 3, true], "empty": " "}"#,
        )
        .unwrap();
        let text = json_strings(&value);
        assert!(text.contains("Handbook"));
        assert!(text.contains("Leave?"));
        assert!(text.contains("12 days"));
        assert!(!text.contains('3'));
    }

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("\u{feff}a\r\nb\rc"), "a\nb\nc");
    }
}

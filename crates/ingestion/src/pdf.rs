//! PDF text extraction
//!
//! Page-by-page extraction with lopdf. Each page's text is returned
//! separately so chunk metadata can carry the page number. Pages that fail
//! to parse are skipped with a warning rather than failing the document.

use crate::errors::IngestionError;
use std::path::Path;
use tracing::{debug, warn};

/// Extract text from a PDF, one string per page. Pages without any text are
/// omitted.
pub fn extract_pages(path: &Path) -> Result<Vec<(u32, String)>, IngestionError> {
    let doc = lopdf::Document::load(path).map_err(|e| IngestionError::PdfParse {
        path: path.display().to_string(),
        message: format!("Failed to load PDF: {}", e),
    })?;

    let page_count = doc.get_pages().len();
    debug!(path = %path.display(), page_count, "Extracting text from PDF");

    let mut pages = Vec::new();

    for (page_index, page_id) in doc.page_iter().enumerate() {
        let page_number = (page_index + 1) as u32;

        let content = match doc.get_page_content(page_id) {
            Ok(content) => content,
            Err(e) => {
                warn!(page = page_number, error = %e, "Failed to read page content, skipping");
                continue;
            }
        };

        let text = clean_text(&extract_text_from_content(&content));
        if !text.is_empty() {
            pages.push((page_number, text));
        }
    }

    if pages.is_empty() {
        return Err(IngestionError::PdfParse {
            path: path.display().to_string(),
            message: "No text content extracted from PDF".to_string(),
        });
    }

    Ok(pages)
}

/// Extract text from a PDF content stream: text between BT and ET operators
fn extract_text_from_content(content: &[u8]) -> String {
    let content_str = String::from_utf8_lossy(content);
    let mut text = String::new();
    let mut in_text_block = false;
    let mut current_text = String::new();

    for line in content_str.lines() {
        let trimmed = line.trim();

        if trimmed == "BT" {
            in_text_block = true;
            continue;
        }

        if trimmed == "ET" {
            in_text_block = false;
            if !current_text.is_empty() {
                text.push_str(&current_text);
                text.push(' ');
                current_text.clear();
            }
            continue;
        }

        if in_text_block {
            if let Some(text_content) = extract_text_from_operator(trimmed) {
                current_text.push_str(&text_content);
            }
        }
    }

    text
}

/// Extract text from a Tj / ' / " / TJ operator line
fn extract_text_from_operator(line: &str) -> Option<String> {
    if line.ends_with("Tj") || line.ends_with('\'') || line.ends_with('"') {
        if let (Some(start), Some(end)) = (line.find('('), line.rfind(')')) {
            if start < end {
                return Some(decode_pdf_string(&line[start + 1..end]));
            }
        }
    }

    // [(text) num (text) num] TJ
    if line.ends_with("TJ") {
        let mut result = String::new();
        let mut in_paren = false;
        let mut current = String::new();

        for ch in line.chars() {
            match ch {
                '(' => in_paren = true,
                ')' => {
                    in_paren = false;
                    result.push_str(&decode_pdf_string(&current));
                    current.clear();
                }
                _ if in_paren => current.push(ch),
                _ => {}
            }
        }

        if !result.is_empty() {
            return Some(result);
        }
    }

    None
}

/// Decode PDF string escapes
fn decode_pdf_string(s: &str) -> String {
    let mut result = String::new();
    let mut chars = s.chars();

    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some('n') => result.push('\n'),
                Some('r') => result.push('\r'),
                Some('t') => result.push('\t'),
                Some('\\') => result.push('\\'),
                Some('(') => result.push('('),
                Some(')') => result.push(')'),
                Some(c) => result.push(c),
                None => {}
            }
        } else {
            result.push(ch);
        }
    }

    result
}

/// Collapse whitespace runs into single spaces
fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text("Hello   World\n\nTest"), "Hello World Test");
        assert_eq!(clean_text("   "), "");
    }

    #[test]
    fn test_decode_pdf_string() {
        assert_eq!(decode_pdf_string("Hello\\nWorld"), "Hello\nWorld");
        assert_eq!(decode_pdf_string("Test\\(paren\\)"), "Test(paren)");
    }

    #[test]
    fn test_extract_tj_operator() {
        assert_eq!(
            extract_text_from_operator("(Hello World) Tj").unwrap(),
            "Hello World"
        );
        assert_eq!(
            extract_text_from_operator("[(Hel) -20 (lo)] TJ").unwrap(),
            "Hello"
        );
        assert!(extract_text_from_operator("1 0 0 1 50 700 Tm").is_none());
    }

    #[test]
    fn test_extract_text_between_bt_et() {
        let content = b"BT\n(First) Tj\nET\nnoise\nBT\n(Second) Tj\nET\n";
        let text = extract_text_from_content(content);
        assert_eq!(text.trim(), "First Second");
    }
}

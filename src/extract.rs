//! PDF text extraction and whitespace cleanup.
//!
//! Extraction is delegated to `pdf-extract`; this module only adapts errors
//! and normalizes the blank-line noise PDF text tends to carry before it is
//! chunked.

use anyhow::{Context, Result};
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

/// Extract plain UTF-8 text from PDF bytes.
pub fn extract_pdf(bytes: &[u8]) -> Result<String> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| anyhow::anyhow!("PDF extraction failed: {}", e))
}

/// Read and extract a PDF file from disk.
pub fn extract_pdf_file(path: &Path) -> Result<String> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read PDF: {}", path.display()))?;
    extract_pdf(&bytes).with_context(|| format!("Failed to extract text from {}", path.display()))
}

/// Collapse every run of blank lines into exactly one blank line.
///
/// A run is a newline, any whitespace, and at least one more newline. Text
/// around the run, including indentation after its last newline, is kept.
pub fn normalize_whitespace(text: &str) -> String {
    blank_line_runs().replace_all(text, "\n\n").into_owned()
}

fn blank_line_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n\s*\n+").expect("blank-line pattern is valid"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapses_blank_line_runs() {
        assert_eq!(normalize_whitespace("a\n\n\n\nb"), "a\n\nb");
        assert_eq!(normalize_whitespace("a\n \t\n \n  b"), "a\n\n  b");
    }

    #[test]
    fn test_single_newlines_untouched() {
        assert_eq!(normalize_whitespace("a\nb\n  c"), "a\nb\n  c");
        assert_eq!(normalize_whitespace("a\n\nb"), "a\n\nb");
    }

    #[test]
    fn test_trailing_run() {
        assert_eq!(normalize_whitespace("end\n\n\n"), "end\n\n");
        assert_eq!(normalize_whitespace(""), "");
    }

    #[test]
    fn test_unicode_whitespace_inside_run() {
        assert_eq!(normalize_whitespace("a\n\u{a0}\r\n\nb c"), "a\n\nb c");
        assert_eq!(normalize_whitespace("x \n\ny"), "x \n\ny");
    }

    #[test]
    fn test_invalid_pdf_is_error() {
        assert!(extract_pdf(b"not a pdf").is_err());
    }
}

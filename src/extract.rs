//! Text extraction from uploaded documents.

use std::path::Path;

/// Read a financial document and return its extracted text.
///
/// Non-throwing by contract: a missing or unreadable file yields a
/// descriptive string rather than an error, and the analysis pipeline
/// treats extractor output as ordinary data.
pub fn read_document_text(path: &Path) -> String {
    if !path.exists() {
        return format!("File not found at path: {}", path.display());
    }

    match pdf_extract::extract_text(path) {
        Ok(text) => collapse_blank_lines(&text),
        Err(e) => format!("Could not extract text from {}: {}", path.display(), e),
    }
}

/// Collapse the runs of blank lines PDF text extraction leaves behind.
fn collapse_blank_lines(text: &str) -> String {
    let mut content = text.to_string();
    while content.contains("\n\n") {
        content = content.replace("\n\n", "\n");
    }
    content
}

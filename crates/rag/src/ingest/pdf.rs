//! PDF text extraction.
//!
//! Shells out to the `pdftotext` binary (poppler-utils), which separates
//! pages with form-feed characters, giving per-page text in one invocation.

use counsel_core::{AppError, AppResult};
use std::path::Path;
use std::process::Command;

/// One page of extracted text; pages are 1-based.
#[derive(Debug, Clone)]
pub struct PdfPage {
    pub page: i64,
    pub text: String,
}

/// Load a PDF and return its non-empty pages with text.
pub fn load_pdf(path: &Path) -> AppResult<Vec<PdfPage>> {
    let output = Command::new("pdftotext")
        .arg("-layout")
        .arg("-enc")
        .arg("UTF-8")
        .arg(path)
        .arg("-")
        .output()
        .map_err(|e| AppError::Ingest(format!("Failed to run pdftotext: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(AppError::Ingest(format!(
            "pdftotext failed for {:?}: {}",
            path,
            stderr.trim()
        )));
    }

    let text = String::from_utf8_lossy(&output.stdout);

    // pdftotext emits a form feed between pages.
    let pages = text
        .split('\u{c}')
        .enumerate()
        .filter_map(|(i, page)| {
            let trimmed = page.trim();
            if trimmed.is_empty() {
                return None;
            }
            Some(PdfPage {
                page: i as i64 + 1,
                text: trimmed.to_string(),
            })
        })
        .collect();

    Ok(pages)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_errors() {
        let result = load_pdf(Path::new("/nonexistent/definitely-missing.pdf"));
        assert!(result.is_err());
    }
}

//! Fixed-size text chunking.

use counsel_core::{AppError, AppResult};

/// Split text into overlapping character windows.
///
/// Each chunk holds at most `chunk_size` characters; consecutive chunks
/// share `overlap` characters. The overlap must be smaller than the chunk
/// size or the window would never advance.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> AppResult<Vec<String>> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(Vec::new());
    }
    if overlap >= chunk_size {
        return Err(AppError::Ingest(
            "Overlap must be smaller than chunk size".to_string(),
        ));
    }

    let chars: Vec<char> = text.chars().collect();
    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < chars.len() {
        let end = (start + chunk_size).min(chars.len());
        let chunk: String = chars[start..end].iter().collect();
        let chunk = chunk.trim();
        if !chunk.is_empty() {
            chunks.push(chunk.to_string());
        }
        if end == chars.len() {
            break;
        }
        start = end - overlap;
    }

    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_is_one_chunk() {
        let chunks = chunk_text("hello world", 100, 20).unwrap();
        assert_eq!(chunks, vec!["hello world"]);
    }

    #[test]
    fn test_empty_text_yields_nothing() {
        assert!(chunk_text("   ", 100, 20).unwrap().is_empty());
    }

    #[test]
    fn test_overlap_must_be_smaller_than_chunk_size() {
        assert!(chunk_text("hello", 10, 10).is_err());
        assert!(chunk_text("hello", 10, 20).is_err());
    }

    #[test]
    fn test_windows_overlap_and_cover() {
        let text: String = ('a'..='z').collect();
        let chunks = chunk_text(&text, 10, 4).unwrap();

        assert_eq!(chunks[0], "abcdefghij");
        // next window starts overlap characters back
        assert_eq!(chunks[1], "ghijklmnop");
        // full coverage: the last chunk reaches the end of the text
        assert!(chunks.last().unwrap().ends_with('z'));
    }

    #[test]
    fn test_chunk_size_bound() {
        let text = "word ".repeat(200);
        let chunks = chunk_text(&text, 50, 10).unwrap();
        assert!(chunks.iter().all(|c| c.chars().count() <= 50));
        assert!(chunks.len() > 1);
    }
}

//! PDF text extraction
//!
//! The heavy lifting is the external pdf-extract library; this module
//! splits its output into bounded chunks on paragraph boundaries so each
//! forwarded document stays a manageable size.

/// Character budget per forwarded chunk
pub const MAX_CHUNK_CHARS: usize = 50_000;

/// Extract all text from a PDF and split it into bounded chunks
pub fn pdf_to_chunks(content: &[u8], max_chars: usize) -> anyhow::Result<Vec<String>> {
    let text = pdf_extract::extract_text_from_mem(content)
        .map_err(|e| anyhow::anyhow!("PDF extraction failed: {e}"))?;
    Ok(chunk_text(&text, max_chars))
}

/// Split text into chunks of at most `max_chars` characters, preferring
/// paragraph boundaries
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for paragraph in text.split("\n\n") {
        if paragraph.trim().is_empty() {
            continue;
        }

        let added_len = paragraph.chars().count() + 2;
        if !current.is_empty() && current.chars().count() + added_len > max_chars {
            chunks.push(std::mem::take(&mut current));
        }

        // A single oversized paragraph is split hard
        if paragraph.chars().count() > max_chars {
            let mut buffer = String::with_capacity(max_chars);
            for c in paragraph.chars() {
                buffer.push(c);
                if buffer.chars().count() >= max_chars {
                    chunks.push(std::mem::take(&mut buffer));
                }
            }
            if !buffer.is_empty() {
                current = buffer;
            }
            continue;
        }

        if !current.is_empty() {
            current.push_str("\n\n");
        }
        current.push_str(paragraph);
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text() {
        assert!(chunk_text("", 100).is_empty());
        assert!(chunk_text("\n\n\n\n", 100).is_empty());
    }

    #[test]
    fn test_small_text_single_chunk() {
        let chunks = chunk_text("first paragraph\n\nsecond paragraph", 1000);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0], "first paragraph\n\nsecond paragraph");
    }

    #[test]
    fn test_splits_on_paragraph_boundaries() {
        let a = "a".repeat(60);
        let b = "b".repeat(60);
        let chunks = chunk_text(&format!("{a}\n\n{b}"), 100);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], a);
        assert_eq!(chunks[1], b);
    }

    #[test]
    fn test_oversized_paragraph_hard_split() {
        let long = "x".repeat(250);
        let chunks = chunk_text(&long, 100);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= 100));
        assert_eq!(chunks.concat(), long);
    }
}

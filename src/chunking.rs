//! Splitting extracted text into bounded chunks.
//!
//! Text is first split into sentences on `.`; any sentence longer than the
//! configured limit is then cut into word-boundary windows so that every
//! chunk handed to the text encoder stays bounded.

/// Default maximum chunk length in characters.
pub const DEFAULT_MAX_CHUNK_CHARS: usize = 1000;

/// How far back from a window end to look for whitespace, in characters.
const BOUNDARY_LOOKBACK: usize = 100;

/// A chunk of text from a larger document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// The chunk text content.
    pub text: String,
    /// Zero-based chunk index within the source text.
    pub index: usize,
    /// Byte offset where this chunk starts in the source text.
    pub start_offset: usize,
}

/// Split text into trimmed, non-empty sentences on `.`.
///
/// # Examples
///
/// ```
/// use recollect::chunking::split_sentences;
///
/// let sentences = split_sentences("Dogs bark.  Horses gallop. ");
/// assert_eq!(sentences, vec!["Dogs bark", "Horses gallop"]);
/// ```
pub fn split_sentences(text: &str) -> Vec<&str> {
    text.split('.')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Split text into non-overlapping windows of at most `max_chars` characters.
///
/// Windows break at the last whitespace within reach of the limit when there
/// is one. Text that already fits yields a single chunk. Multi-byte
/// characters are never split.
///
/// # Examples
///
/// ```
/// use recollect::chunking::chunk_text;
///
/// let chunks = chunk_text("Hello, world!", 1000);
/// assert_eq!(chunks.len(), 1);
///
/// let text = "word ".repeat(500);
/// let chunks = chunk_text(&text, 1000);
/// assert!(chunks.len() >= 3);
/// assert!(chunks.iter().all(|c| c.text.chars().count() <= 1000));
/// ```
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<Chunk> {
    let max_chars = max_chars.max(1);
    let char_count = text.chars().count();

    if char_count <= max_chars {
        return vec![Chunk {
            text: text.to_string(),
            index: 0,
            start_offset: 0,
        }];
    }

    // char index -> byte index, with one trailing entry for the end.
    let char_to_byte: Vec<usize> = text
        .char_indices()
        .map(|(byte_idx, _)| byte_idx)
        .chain(std::iter::once(text.len()))
        .collect();

    let mut chunks = Vec::new();
    let mut start_char = 0;

    while start_char < char_count {
        let limit = (start_char + max_chars).min(char_count);
        let end_char = if limit < char_count {
            word_boundary(text, &char_to_byte, start_char, limit)
        } else {
            limit
        };

        let start_byte = char_to_byte[start_char];
        let slice = &text[start_byte..char_to_byte[end_char]];
        if !slice.trim().is_empty() {
            chunks.push(Chunk {
                text: slice.trim().to_string(),
                index: chunks.len(),
                start_offset: start_byte,
            });
        }

        start_char = end_char;
    }

    chunks
}

/// Find a char position in `(start, limit]` just past the last whitespace
/// before `limit`, or `limit` itself when there is none in reach.
fn word_boundary(
    text: &str,
    char_to_byte: &[usize],
    start: usize,
    limit: usize,
) -> usize {
    let from = limit.saturating_sub(BOUNDARY_LOOKBACK).max(start + 1);
    if from >= limit {
        return limit;
    }

    let region = &text[char_to_byte[from]..char_to_byte[limit]];
    match region.rfind(char::is_whitespace) {
        Some(offset) => {
            let ws_byte = char_to_byte[from] + offset;
            // First char index whose byte offset lies past the whitespace.
            char_to_byte.partition_point(|&b| b <= ws_byte)
        }
        None => limit,
    }
}

/// Sentence-split `text`, then window overlong sentences.
///
/// Returns the chunk texts in document order.
pub fn chunk_document(text: &str, max_chars: usize) -> Vec<String> {
    split_sentences(text)
        .into_iter()
        .flat_map(|sentence| chunk_text(sentence, max_chars))
        .map(|chunk| chunk.text)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentences_drop_blanks() {
        assert_eq!(split_sentences("..a. .b.."), vec!["a", "b"]);
        assert!(split_sentences("   ").is_empty());
    }

    #[test]
    fn short_text_single_chunk() {
        let chunks = chunk_text("Hello, world!", DEFAULT_MAX_CHUNK_CHARS);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Hello, world!");
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[0].start_offset, 0);
    }

    #[test]
    fn long_text_breaks_at_whitespace() {
        let text = "word ".repeat(500);
        let chunks = chunk_text(&text, 1000);

        assert!(chunks.len() >= 3);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i);
            assert!(chunk.text.chars().count() <= 1000);
            assert!(!chunk.text.starts_with("ord"), "split inside a word");
        }
    }

    #[test]
    fn unbroken_text_is_hard_split() {
        let text = "a".repeat(2500);
        let chunks = chunk_text(&text, 1000);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].start_offset, 2000);
        let total: usize = chunks.iter().map(|c| c.text.len()).sum();
        assert_eq!(total, 2500);
    }

    #[test]
    fn handles_multibyte_chars() {
        let text = "café ☕ naïve 日本語 🎉 ".repeat(50);
        let chunks = chunk_text(&text, 100);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.text.chars().count() <= 100);
            assert!(!chunk.text.is_empty());
        }
    }

    #[test]
    fn chunk_document_combines_both_passes() {
        let long = "x ".repeat(30);
        let text = format!("First sentence. {long}. Last");
        let chunks = chunk_document(&text, 20);

        assert_eq!(chunks[0], "First sentence");
        assert_eq!(chunks.last().map(String::as_str), Some("Last"));
        assert!(chunks.len() > 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= 20));
    }
}

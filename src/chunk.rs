//! Paragraph-boundary text chunker.
//!
//! Splits a document body into pieces that respect a `max_tokens` limit so
//! each can be embedded separately. Splitting prefers paragraph boundaries
//! (`\n\n`), then newlines or spaces, and only cuts mid-word as a last resort.
//! The chunk's position in the returned list is its `chunk_index`.

/// Approximate chars-per-token ratio.
const CHARS_PER_TOKEN: usize = 4;

/// Split text into chunks on paragraph boundaries, respecting `max_tokens`.
/// Always returns at least one chunk.
pub fn chunk_text(text: &str, max_tokens: usize) -> Vec<String> {
    let max_chars = max_tokens.max(1) * CHARS_PER_TOKEN;

    let mut chunks = Vec::new();
    let mut current_buf = String::new();

    for para in text.split("\n\n") {
        let trimmed = para.trim();
        if trimmed.is_empty() {
            continue;
        }

        // If adding this paragraph would exceed max, flush current buffer
        let would_be = if current_buf.is_empty() {
            trimmed.len()
        } else {
            current_buf.len() + 2 + trimmed.len()
        };

        if would_be > max_chars && !current_buf.is_empty() {
            chunks.push(std::mem::take(&mut current_buf));
        }

        if trimmed.len() > max_chars {
            hard_split(trimmed, max_chars, &mut chunks);
        } else {
            if !current_buf.is_empty() {
                current_buf.push_str("\n\n");
            }
            current_buf.push_str(trimmed);
        }
    }

    if !current_buf.is_empty() {
        chunks.push(current_buf);
    }

    if chunks.is_empty() {
        chunks.push(text.trim().to_string());
    }

    chunks
}

/// Split an oversized paragraph at `max_chars`, backing up to the last
/// newline or space when possible. Never cuts inside a UTF-8 sequence.
fn hard_split(paragraph: &str, max_chars: usize, out: &mut Vec<String>) {
    let mut remaining = paragraph;
    while !remaining.is_empty() {
        if remaining.len() <= max_chars {
            out.push(remaining.trim().to_string());
            break;
        }

        let mut split_at = max_chars;
        while !remaining.is_char_boundary(split_at) {
            split_at -= 1;
        }
        if split_at == 0 {
            // A single character wider than the budget
            split_at = remaining
                .char_indices()
                .nth(1)
                .map(|(i, _)| i)
                .unwrap_or(remaining.len());
        }

        let actual_split = remaining[..split_at]
            .rfind('\n')
            .or_else(|| remaining[..split_at].rfind(' '))
            .map(|pos| pos + 1)
            .unwrap_or(split_at);

        let piece = remaining[..actual_split].trim();
        if !piece.is_empty() {
            out.push(piece.to_string());
        }
        remaining = &remaining[actual_split..];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_text_single_chunk() {
        let chunks = chunk_text("Hello, world!", 700);
        assert_eq!(chunks, vec!["Hello, world!".to_string()]);
    }

    #[test]
    fn test_empty_text_yields_one_chunk() {
        assert_eq!(chunk_text("", 10), vec![String::new()]);
    }

    #[test]
    fn test_paragraphs_are_grouped_until_full() {
        // max_tokens = 5 → 20 chars
        let text = "aaaa bbbb\n\ncccc dddd\n\neeee ffff gggg hhhh";
        let chunks = chunk_text(text, 5);
        assert_eq!(chunks[0], "aaaa bbbb\n\ncccc dddd");
        assert_eq!(chunks[1], "eeee ffff gggg hhhh");
    }

    #[test]
    fn test_long_paragraph_splits_on_spaces() {
        let text = "word ".repeat(40);
        let chunks = chunk_text(&text, 5);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.len() <= 20, "chunk too long: {:?}", chunk);
            assert!(!chunk.starts_with(' ') && !chunk.ends_with(' '));
        }
    }

    #[test]
    fn test_multibyte_text_never_panics() {
        let text = "ü".repeat(100);
        let chunks = chunk_text(&text, 1);
        assert_eq!(chunks.concat(), text);
    }
}

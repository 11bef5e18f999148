//! Sentence-aware text splitting for the index.
//!
//! Sizes are measured in approximate tokens (4 chars each). Text is split on
//! paragraph boundaries first; paragraphs that do not fit are split into
//! sentences, and sentences that do not fit into words. The pieces are then
//! packed greedily, and each chunk after the first is seeded with the tail of
//! the previous one so retrieval does not lose context at chunk boundaries.

const CHARS_PER_TOKEN: usize = 4;

pub const DEFAULT_CHUNK_SIZE: usize = 1024;
pub const DEFAULT_CHUNK_OVERLAP: usize = 20;

struct Piece {
    text: String,
    paragraph_start: bool,
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn split_sentences(paragraph: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = paragraph.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?') {
            let at_boundary = chars.peek().map_or(true, |(_, next)| next.is_whitespace());
            if at_boundary {
                let end = i + c.len_utf8();
                sentences.push(paragraph[start..end].trim());
                start = end;
            }
        }
    }
    sentences.push(paragraph[start..].trim());
    sentences.retain(|s| !s.is_empty());
    sentences
}

fn split_long_word(word: &str, max_chars: usize, out: &mut Vec<Piece>) {
    let chars: Vec<char> = word.chars().collect();
    for part in chars.chunks(max_chars) {
        out.push(Piece { text: part.iter().collect(), paragraph_start: false });
    }
}

fn split_pieces(text: &str, max_chars: usize) -> Vec<Piece> {
    let normalized = text.replace("\r\n", "\n");
    let mut pieces = Vec::new();

    for paragraph in normalized.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
        if char_len(paragraph) <= max_chars {
            pieces.push(Piece { text: paragraph.to_string(), paragraph_start: true });
            continue;
        }

        let mut first = true;
        for sentence in split_sentences(paragraph) {
            if char_len(sentence) <= max_chars {
                pieces.push(Piece { text: sentence.to_string(), paragraph_start: first });
                first = false;
                continue;
            }
            for word in sentence.split_whitespace() {
                if char_len(word) <= max_chars {
                    pieces.push(Piece { text: word.to_string(), paragraph_start: first });
                } else {
                    split_long_word(word, max_chars, &mut pieces);
                }
                first = false;
            }
        }
    }
    pieces
}

/// Last `max_chars` characters of `text`, moved forward to a word boundary.
fn overlap_tail(text: &str, max_chars: usize) -> &str {
    if max_chars == 0 {
        return "";
    }
    let total = char_len(text);
    if total <= max_chars {
        return text.trim();
    }
    let byte_start = text
        .char_indices()
        .nth(total - max_chars)
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    let snapped = text[byte_start..]
        .find(char::is_whitespace)
        .map(|i| byte_start + i)
        .unwrap_or(text.len());
    text[snapped..].trim()
}

/// Splits `text` into chunks of at most `chunk_size` approximate tokens with
/// up to `chunk_overlap` tokens carried over between neighbours.
pub fn split_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let max_chars = chunk_size.max(1) * CHARS_PER_TOKEN;
    let overlap_chars = (chunk_overlap * CHARS_PER_TOKEN).min(max_chars / 2);

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;
    // Whether `current` holds anything beyond the carried-over overlap.
    let mut has_fresh = false;

    for piece in split_pieces(text, max_chars) {
        let piece_len = char_len(&piece.text);
        if has_fresh && current_len + 2 + piece_len > max_chars {
            let tail = overlap_tail(&current, overlap_chars).to_string();
            chunks.push(current.trim().to_string());
            current.clear();
            current_len = 0;
            has_fresh = false;
            if !tail.is_empty() && char_len(&tail) + 1 + piece_len <= max_chars {
                current_len = char_len(&tail);
                current = tail;
            }
        }

        if !current.is_empty() {
            let sep = if piece.paragraph_start && has_fresh { "\n\n" } else { " " };
            current.push_str(sep);
            current_len += sep.len();
        }
        current.push_str(&piece.text);
        current_len += piece_len;
        has_fresh = true;
    }

    if has_fresh {
        chunks.push(current.trim().to_string());
    }
    chunks.retain(|c| !c.is_empty());
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered_words(n: usize) -> String {
        (0..n)
            .map(|i| format!("w{:02}", i))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn empty_text_returns_no_chunks() {
        assert!(split_text("", 100, 10).is_empty());
        assert!(split_text("  \n\n \n", 100, 10).is_empty());
    }

    #[test]
    fn short_text_is_one_chunk() {
        let chunks = split_text("Para one.\r\n\r\nPara two.", 100, 10);
        assert_eq!(chunks, vec!["Para one.\n\nPara two.".to_string()]);
    }

    #[test]
    fn chunks_respect_size_limit() {
        let text = "Annual leave is twenty days. Sick leave is ten days! Is remote work allowed? \
            Yes, two days a week.\n\nExpenses must be filed within thirty days of purchase.";
        let chunks = split_text(text, 10, 0);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 40, "chunk too long: {:?}", chunk);
        }
        let rejoined: Vec<&str> = chunks.iter().flat_map(|c| c.split_whitespace()).collect();
        let original: Vec<&str> = text.split_whitespace().collect();
        assert_eq!(rejoined, original);
    }

    #[test]
    fn neighbouring_chunks_overlap() {
        let chunks = split_text(&numbered_words(60), 10, 2);
        assert_eq!(chunks[0], numbered_words(10));
        assert!(chunks[1].starts_with("w08 w09 w10"), "got {:?}", chunks[1]);
        assert!(chunks.iter().all(|c| c.chars().count() <= 40));
        assert!(chunks.last().unwrap().ends_with("w59"));
    }

    #[test]
    fn oversized_word_is_hard_split() {
        let word = "x".repeat(10);
        let chunks = split_text(&word, 1, 0);
        assert_eq!(chunks, vec!["xxxx", "xxxx", "xx"]);
    }

    #[test]
    fn sentences_split_on_terminal_punctuation() {
        let parts = split_sentences("Version 1.5 is out. Update now! Done?");
        assert_eq!(parts, vec!["Version 1.5 is out.", "Update now!", "Done?"]);
    }
}

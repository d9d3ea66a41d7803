// Paragraph-respecting text chunker.
//
// Oversized filings are split on blank lines and greedily packed into
// chunks under a character budget. Budgets are counted in chars, not
// bytes, so a split never lands inside a UTF-8 sequence.

/// Rough token estimate: one token per four characters.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / 4
}

/// Character budget for a token budget under the same heuristic.
pub fn max_chars_for_tokens(max_tokens: usize) -> usize {
    max_tokens.saturating_mul(4)
}

/// Split `text` into ordered chunks of at most `max_chars` characters.
///
/// Text that already fits comes back as a single chunk. Otherwise
/// paragraphs (separated by `"\n\n"`) are packed greedily; a paragraph
/// longer than the budget on its own is cut at fixed character offsets
/// and emitted as its own chunk(s), flushing whatever was buffered first.
/// Chunks are trimmed and empty chunks are skipped.
pub fn split(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);

    if text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for para in text.split("\n\n") {
        let para_len = para.chars().count();

        if para_len > max_chars {
            flush(&mut chunks, &mut current, &mut current_len);
            for piece in hard_split(para, max_chars) {
                push_trimmed(&mut chunks, &piece);
            }
            continue;
        }

        // +2 for the paragraph break that rejoins them
        if current_len + para_len + 2 <= max_chars {
            if !current.is_empty() {
                current.push_str("\n\n");
                current_len += 2;
            }
            current.push_str(para);
            current_len += para_len;
        } else {
            flush(&mut chunks, &mut current, &mut current_len);
            current.push_str(para);
            current_len = para_len;
        }
    }

    flush(&mut chunks, &mut current, &mut current_len);
    chunks
}

fn flush(chunks: &mut Vec<String>, current: &mut String, current_len: &mut usize) {
    push_trimmed(chunks, current);
    current.clear();
    *current_len = 0;
}

fn push_trimmed(chunks: &mut Vec<String>, chunk: &str) {
    let trimmed = chunk.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

/// Cut a paragraph into pieces of exactly `max_chars` characters (the last
/// piece may be shorter).
fn hard_split(para: &str, max_chars: usize) -> Vec<String> {
    let chars: Vec<char> = para.chars().collect();
    chars
        .chunks(max_chars)
        .map(|piece| piece.iter().collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn without_whitespace(s: &str) -> String {
        s.chars().filter(|c| !c.is_whitespace()).collect()
    }

    #[test]
    fn test_text_exactly_at_budget_is_one_chunk() {
        let text = "a".repeat(100);
        let chunks = split(&text, 100);
        assert_eq!(chunks, vec![text]);
    }

    #[test]
    fn test_one_char_over_budget_forces_split() {
        let text = "a".repeat(101);
        let chunks = split(&text, 100);
        assert!(chunks.len() >= 2);
        assert!(chunks.iter().all(|c| c.chars().count() <= 100));
    }

    #[test]
    fn test_paragraphs_are_packed_greedily() {
        let para = "x".repeat(30);
        let text = [para.as_str(); 5].join("\n\n");
        // 30 + 2 + 30 = 62 fits in 70, a third paragraph does not
        let chunks = split(&text, 70);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0], format!("{para}\n\n{para}"));
        assert_eq!(chunks[2], para);
    }

    #[test]
    fn test_oversized_paragraph_flushes_buffer_first() {
        let small = "short paragraph";
        let big = "b".repeat(250);
        let text = format!("{small}\n\n{big}\n\n{small}");
        let chunks = split(&text, 100);

        assert_eq!(chunks.first().map(String::as_str), Some(small));
        assert_eq!(chunks.last().map(String::as_str), Some(small));
        // 250 chars force-split into 100 + 100 + 50
        assert_eq!(chunks.len(), 5);
        assert_eq!(chunks[3].chars().count(), 50);
    }

    #[test]
    fn test_chunks_reconstruct_original_text() {
        let text = (0..40)
            .map(|i| format!("Paragraph {i} discusses capacity in region {}.", i * 7))
            .collect::<Vec<_>>()
            .join("\n\n");
        let chunks = split(&text, 180);

        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.chars().count() <= 180));
        assert_eq!(
            without_whitespace(&chunks.concat()),
            without_whitespace(&text)
        );
    }

    #[test]
    fn test_multibyte_text_splits_on_char_boundaries() {
        let text = "中".repeat(25);
        let chunks = split(&text, 10);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_blank_paragraphs_are_skipped() {
        let text = format!("{}\n\n\n\n   \n\n{}", "a".repeat(60), "b".repeat(60));
        let chunks = split(&text, 80);
        assert_eq!(chunks.len(), 2);
    }

    #[test]
    fn test_estimate_tokens_quarter_of_chars() {
        assert_eq!(estimate_tokens(&"a".repeat(400_004)), 100_001);
        assert_eq!(max_chars_for_tokens(100_000), 400_000);
    }
}

//! Sliding-window text chunking sized for embedding.

use crate::types::RagError;

/// Splits `text` into overlapping chunks of at most `max_tokens`
/// whitespace-delimited tokens.
///
/// A token here is a size heuristic (roughly a word) and intentionally does
/// not match any embedding model's tokenizer. Consecutive chunks share
/// `overlap_tokens` tokens of context; the final chunk may be shorter than
/// the maximum. Text that fits in a single window is returned verbatim as
/// one chunk, and empty input yields no chunks.
///
/// `overlap_tokens >= max_tokens` would leave the window unable to advance
/// and is rejected as a configuration error.
pub fn chunk_text(
    text: &str,
    max_tokens: usize,
    overlap_tokens: usize,
) -> Result<Vec<String>, RagError> {
    if max_tokens == 0 {
        return Err(RagError::Config("max_tokens must be positive".into()));
    }
    if overlap_tokens >= max_tokens {
        return Err(RagError::Config(format!(
            "overlap_tokens ({overlap_tokens}) must be smaller than max_tokens ({max_tokens})"
        )));
    }

    let tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.is_empty() {
        return Ok(Vec::new());
    }
    if tokens.len() <= max_tokens {
        return Ok(vec![text.to_string()]);
    }

    let step = max_tokens - overlap_tokens;
    let mut chunks = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + max_tokens).min(tokens.len());
        chunks.push(tokens[start..end].join(" "));
        if end == tokens.len() {
            break;
        }
        start += step;
    }
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered_tokens(count: usize) -> String {
        (0..count)
            .map(|i| format!("t{i}"))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn short_text_is_a_single_verbatim_chunk() {
        let text = "alpha  beta\tgamma";
        let chunks = chunk_text(text, 10, 2).unwrap();
        assert_eq!(chunks, vec![text.to_string()]);
    }

    #[test]
    fn exact_window_is_a_single_chunk() {
        let text = numbered_tokens(10);
        let chunks = chunk_text(&text, 10, 3).unwrap();
        assert_eq!(chunks, vec![text]);
    }

    #[test]
    fn empty_and_whitespace_input_yield_no_chunks() {
        assert!(chunk_text("", 10, 2).unwrap().is_empty());
        assert!(chunk_text("   \n\t ", 10, 2).unwrap().is_empty());
    }

    #[test]
    fn consecutive_chunks_share_the_overlap() {
        let text = numbered_tokens(25);
        let overlap = 3;
        let chunks = chunk_text(&text, 10, overlap).unwrap();
        assert!(chunks.len() > 1);

        for pair in chunks.windows(2) {
            let left: Vec<&str> = pair[0].split_whitespace().collect();
            let right: Vec<&str> = pair[1].split_whitespace().collect();
            assert_eq!(left[left.len() - overlap..], right[..overlap]);
        }
    }

    #[test]
    fn final_chunk_may_be_shorter() {
        let text = numbered_tokens(12);
        let chunks = chunk_text(&text, 10, 4).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].split_whitespace().count(), 10);
        assert_eq!(chunks[1].split_whitespace().count(), 6);
        assert!(chunks[1].ends_with("t11"));
    }

    #[test]
    fn every_token_is_covered() {
        let text = numbered_tokens(57);
        let chunks = chunk_text(&text, 10, 2).unwrap();
        let rebuilt: Vec<&str> = chunks.last().unwrap().split_whitespace().collect();
        assert_eq!(*rebuilt.last().unwrap(), "t56");
        assert!(chunks[0].starts_with("t0 "));
    }

    #[test]
    fn overlap_at_or_above_max_is_rejected() {
        let text = numbered_tokens(100);
        assert!(matches!(
            chunk_text(&text, 10, 10),
            Err(RagError::Config(_))
        ));
        assert!(matches!(
            chunk_text(&text, 10, 15),
            Err(RagError::Config(_))
        ));
    }

    #[test]
    fn zero_max_tokens_is_rejected() {
        assert!(matches!(chunk_text("a b", 0, 0), Err(RagError::Config(_))));
    }
}

//! Unicode-safe text clipping for prompts, summaries, and dedup keys.

/// Return a slice of `text` containing at most `max_chars` Unicode scalar
/// values. Clipping at a char boundary keeps multi-byte prompts valid.
pub fn clip_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// Clip to `max_chars` scalar values, returning an owned string.
pub fn clip_chars_owned(text: &str, max_chars: usize) -> String {
    clip_chars(text, max_chars).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_ascii_shorter_than_limit() {
        assert_eq!(clip_chars("hello", 10), "hello");
    }

    #[test]
    fn clip_ascii_at_limit() {
        assert_eq!(clip_chars("hello world", 5), "hello");
    }

    #[test]
    fn clip_multibyte_respects_boundaries() {
        assert_eq!(clip_chars("héllo wörld", 6), "héllo ");
    }

    #[test]
    fn clip_empty() {
        assert_eq!(clip_chars("", 5), "");
    }

    #[test]
    fn clip_owned_matches_slice() {
        assert_eq!(clip_chars_owned("abcdef", 3), "abc");
    }
}

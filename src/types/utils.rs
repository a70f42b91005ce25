//! Shared utility functions for logging and text handling.

use std::collections::HashMap;
use std::fmt::Display;

/// Filter an iterator of Results, logging errors at warn level before discarding.
pub fn log_filter_warn<T, E: Display>(result: Result<T, E>, context: &str) -> Option<T> {
    match result {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!("{}: {}", context, e);
            None
        }
    }
}

// =============================================================================
// Text Helpers
// =============================================================================

/// Markdown ATX heading (`# Title` through `###### Title`)
pub fn is_heading(line: &str) -> bool {
    let trimmed = line.trim_start();
    let hashes = trimmed.chars().take_while(|c| *c == '#').count();
    (1..=6).contains(&hashes) && trimmed[hashes..].starts_with(' ')
}

/// Cut `content` to at most `max_chars` bytes, preferring paragraph then line
/// boundaries, and never splitting a UTF-8 character.
pub fn truncate_at_boundary(content: &str, max_chars: usize) -> &str {
    if content.len() <= max_chars {
        return content;
    }

    let mut end = max_chars;
    while end > 0 && !content.is_char_boundary(end) {
        end -= 1;
    }
    let window = &content[..end];

    if let Some(pos) = window.rfind("\n\n") {
        return &content[..pos];
    }
    if let Some(pos) = window.rfind('\n') {
        return &content[..pos];
    }
    window
}

/// Lowercased alphanumeric terms of at least `min_len` characters with their counts
pub fn term_frequencies(text: &str, min_len: usize) -> HashMap<String, usize> {
    let mut freq = HashMap::new();
    for word in text.split(|c: char| !c.is_alphanumeric()) {
        if word.chars().count() >= min_len {
            *freq.entry(word.to_lowercase()).or_insert(0) += 1;
        }
    }
    freq
}

/// Most frequent terms, ties broken alphabetically so the order is stable
pub fn top_terms(text: &str, min_len: usize, count: usize) -> Vec<String> {
    let mut terms: Vec<(String, usize)> = term_frequencies(text, min_len).into_iter().collect();
    terms.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    terms.into_iter().take(count).map(|(t, _)| t).collect()
}

/// Split prose into sentences ending in `.`, `!` or `?` (terminator kept)
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        let at_end = matches!(chars.peek(), None | Some((_, ' ' | '\n' | '\t')));
        if matches!(c, '.' | '!' | '?') && at_end {
            let end = i + c.len_utf8();
            let sentence = text[start..end].trim();
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            start = end;
        }
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_heading() {
        assert!(is_heading("# Charter"));
        assert!(is_heading("  ### Risks"));
        assert!(!is_heading("#hashtag"));
        assert!(!is_heading("####### too deep"));
        assert!(!is_heading("plain text"));
    }

    #[test]
    fn test_truncate_no_truncation() {
        assert_eq!(truncate_at_boundary("Short content.", 100), "Short content.");
    }

    #[test]
    fn test_truncate_prefers_paragraph() {
        let content = "First paragraph.\n\nSecond paragraph.\n\nThird paragraph.";
        assert_eq!(truncate_at_boundary(content, 40), "First paragraph.\n\nSecond paragraph.");
    }

    #[test]
    fn test_truncate_respects_char_boundary() {
        let content = "안녕하세요";
        let cut = truncate_at_boundary(content, 4);
        assert_eq!(cut, "안");
    }

    #[test]
    fn test_top_terms_stable_order() {
        let text = "risk risk budget budget schedule the and risk";
        assert_eq!(top_terms(text, 4, 2), vec!["risk", "budget"]);
        assert_eq!(term_frequencies(text, 4).get("schedule"), Some(&1));
        assert!(term_frequencies(text, 4).get("the").is_none());
    }

    #[test]
    fn test_split_sentences() {
        let text = "Scope is fixed. Budget v1.2 holds! Is it late? trailing";
        assert_eq!(
            split_sentences(text),
            vec!["Scope is fixed.", "Budget v1.2 holds!", "Is it late?", "trailing"]
        );
    }
}

//! Plain-text extraction, excerpts and word counts for post and comment bodies.

use crate::sanitize::{sanitize_html_with, text_only_profile};
use serde::Serialize;

/// Appended to every truncated excerpt.
pub const ELLIPSIS: &str = "...";

/// Shortened plain text plus whether anything was cut off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Excerpt {
    pub text: String,
    pub is_truncated: bool,
}

impl Excerpt {
    fn full(text: String) -> Self {
        Self {
            text,
            is_truncated: false,
        }
    }

    fn truncated(mut text: String) -> Self {
        text.push_str(ELLIPSIS);
        Self {
            text,
            is_truncated: true,
        }
    }
}

/// Removes all markup and returns the text, with entities decoded and the ends trimmed.
///
/// Decoding is a single pass, so `&amp;lt;` becomes the literal `&lt;` and never `<`.
pub fn strip_html(html: &str) -> String {
    if html.is_empty() {
        return String::new();
    }

    let text = sanitize_html_with(html, text_only_profile());
    let decoded = htmlize::unescape(text.as_str());
    let decoded = if decoded.contains('\u{00A0}') {
        decoded.replace('\u{00A0}', " ")
    } else {
        decoded.into_owned()
    };
    decoded.trim().to_string()
}

fn words(text: &str) -> impl Iterator<Item = &str> {
    text.split_whitespace()
}

/// Character-bounded excerpt: at most `max_len` characters, then an ellipsis.
///
/// Lengths count Unicode scalar values, so multi-byte text is never split inside a character.
pub fn get_excerpt(html: &str, max_len: usize) -> String {
    excerpt(html, max_len).text
}

/// [`get_excerpt`] with the truncation flag, for "continue reading" style widgets.
pub fn excerpt(html: &str, max_len: usize) -> Excerpt {
    let text = strip_html(html);
    match text.char_indices().nth(max_len) {
        None => Excerpt::full(text),
        Some((cut, _)) => Excerpt::truncated(text[..cut].trim_end().to_string()),
    }
}

/// Word-bounded excerpt. Exactly `max_words` words is not truncated.
pub fn get_excerpt_by_words(html: &str, max_words: usize) -> Excerpt {
    let text = strip_html(html);
    if words(&text).count() <= max_words {
        return Excerpt::full(text);
    }

    let head = words(&text).take(max_words).collect::<Vec<_>>().join(" ");
    Excerpt::truncated(head)
}

pub fn count_words(html: &str) -> usize {
    words(&strip_html(html)).count()
}

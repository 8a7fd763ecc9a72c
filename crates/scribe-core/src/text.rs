//! Text helpers for replies.
//!
//! Platform limits are counted in characters, not bytes.

/// Marker appended when text had to be cut mid-sentence.
pub const ELLIPSIS: char = '…';

/// Returns true if `text` contains `phrase`, ignoring case.
///
/// An empty phrase never matches.
pub fn contains_trigger(text: &str, phrase: &str) -> bool {
    let phrase = phrase.trim();
    if phrase.is_empty() {
        return false;
    }
    text.to_lowercase().contains(&phrase.to_lowercase())
}

/// Fits `text` into `max_chars` characters.
///
/// Text that already fits is returned trimmed. Longer text is cut at the
/// last sentence boundary that leaves at least half the budget used;
/// failing that at the last word boundary, and failing that in the middle
/// of a word. The last two append an ellipsis that counts towards the limit.
pub fn fit_to_limit(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    if max_chars == 0 {
        return String::new();
    }

    let window = prefix(text, max_chars);
    if let Some(end) = last_sentence_end(window) {
        if window[..end].chars().count() * 2 >= max_chars {
            return window[..end].to_string();
        }
    }

    // Leave room for the ellipsis.
    let window = prefix(text, max_chars - 1);
    let cut = match window.rfind(char::is_whitespace) {
        Some(idx) if idx > 0 => window[..idx].trim_end(),
        _ => window,
    };

    let mut out = String::with_capacity(cut.len() + ELLIPSIS.len_utf8());
    out.push_str(cut);
    out.push(ELLIPSIS);
    out
}

/// First `n` characters of `s`.
fn prefix(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Byte offset just past the last sentence terminator in `s` that is
/// followed by whitespace or ends the string.
fn last_sentence_end(s: &str) -> Option<usize> {
    let mut found = None;
    let mut chars = s.char_indices().peekable();
    while let Some((idx, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?') {
            let boundary = match chars.peek() {
                None => true,
                Some((_, next)) => next.is_whitespace(),
            };
            if boundary {
                found = Some(idx + c.len_utf8());
            }
        }
    }
    found
}

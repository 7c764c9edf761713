//! Text normalization helpers shared by the capability provider, the
//! generators and the query engine.

/// Tags whose content never contributes to element text.
pub const NON_TEXT_TAGS: &[&str] = &["script", "style", "noscript", "template"];

/// Collapses whitespace runs into single spaces and trims both ends.
/// Zero-width spaces are dropped.
pub fn normalize_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for word in text.split_whitespace() {
        let word: String = word.chars().filter(|c| *c != '\u{200b}').collect();
        if word.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(&word);
    }
    out
}

pub fn contains_ignore_case(haystack: &str, needle_lower: &str) -> bool {
    haystack.to_lowercase().contains(needle_lower)
}

/// Cuts `text` to at most `max_chars` characters, backing up to the last word
/// boundary when the cut would split a word.
pub fn trim_word_boundary(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    let next = text.chars().nth(max_chars);
    if next.map(|c| c.is_whitespace()).unwrap_or(true) {
        return cut.trim_end().to_string();
    }
    match cut.rfind(char::is_whitespace) {
        Some(pos) if pos > 0 => cut[..pos].trim_end().to_string(),
        _ => cut,
    }
}

//! Quoting and escaping for the rendered selector grammar.

/// Quotes an attribute value for the `internal:attr` / `internal:testid`
/// engines, with the `s` (exact) or `i` (lax) suffix.
pub fn escape_for_attribute_selector(value: &str, exact: bool) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{}\"{}", escaped, if exact { "s" } else { "i" })
}

/// JSON-quotes text for the `internal:text` engine.
pub fn escape_for_text_selector(text: &str, exact: bool) -> String {
    let quoted = serde_json::to_string(text).unwrap_or_else(|_| format!("\"{}\"", text));
    format!("{}{}", quoted, if exact { "s" } else { "i" })
}

/// Quotes a value for use inside a CSS attribute selector.
pub fn quote_css_attribute_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\a "),
            '\r' => out.push_str("\\d "),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Escapes a string for use as a CSS identifier (`CSS.escape`).
pub fn css_escape(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len());
    for (i, &c) in chars.iter().enumerate() {
        let code = c as u32;
        if c == '\0' {
            out.push('\u{fffd}');
        } else if (1..=0x1f).contains(&code)
            || code == 0x7f
            || (i == 0 && c.is_ascii_digit())
            || (i == 1 && c.is_ascii_digit() && chars[0] == '-')
        {
            out.push_str(&format!("\\{:x} ", code));
        } else if i == 0 && c == '-' && chars.len() == 1 {
            out.push_str("\\-");
        } else if code >= 0x80 || c == '-' || c == '_' || c.is_ascii_alphanumeric() {
            out.push(c);
        } else {
            out.push('\\');
            out.push(c);
        }
    }
    out
}

/// `#id` when the id is a plain identifier, `[id="..."]` otherwise.
pub fn make_selector_for_id(id: &str) -> String {
    let mut chars = id.chars();
    let plain = chars.next().map(|c| c.is_ascii_alphabetic()).unwrap_or(false)
        && id.chars().count() > 1
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if plain {
        format!("#{}", id)
    } else {
        format!("[id={}]", quote_css_attribute_value(id))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CharClass {
    Lower,
    Upper,
    Digit,
    Other,
}

fn char_class(c: char) -> CharClass {
    if c.is_ascii_lowercase() {
        CharClass::Lower
    } else if c.is_ascii_uppercase() {
        CharClass::Upper
    } else if c.is_ascii_digit() {
        CharClass::Digit
    } else {
        CharClass::Other
    }
}

/// An id reads as machine generated once it has at least one character
/// class transition per this many characters.
pub const GUID_TRANSITION_RATIO: usize = 4;

/// Heuristic for machine-generated ids: counts switches between lower case,
/// upper case, digits and other characters. `-` and `_` are separators and an
/// upper to lower switch (`camelCase`, `Title`) is not counted.
pub fn is_guid_like(id: &str) -> bool {
    let mut last: Option<CharClass> = None;
    let mut transitions = 0usize;
    let mut length = 0usize;
    for c in id.chars() {
        length += 1;
        if c == '-' || c == '_' {
            continue;
        }
        let class = char_class(c);
        if let Some(prev) = last {
            if prev != class && !(prev == CharClass::Upper && class == CharClass::Lower) {
                transitions += 1;
            }
        }
        last = Some(class);
    }
    length > 0 && transitions * GUID_TRANSITION_RATIO >= length
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_and_text_escaping() {
        assert_eq!(escape_for_attribute_selector("Email", false), "\"Email\"i");
        assert_eq!(escape_for_attribute_selector("say \"hi\"", true), "\"say \\\"hi\\\"\"s");
        assert_eq!(escape_for_text_selector("Welcome", false), "\"Welcome\"i");
        assert_eq!(escape_for_text_selector("a\"b\n", true), "\"a\\\"b\\n\"s");
    }

    #[test]
    fn test_css_escape() {
        assert_eq!(css_escape("btn-primary"), "btn-primary");
        assert_eq!(css_escape("1col"), "\\31 col");
        assert_eq!(css_escape("-"), "\\-");
        assert_eq!(css_escape("a.b:c"), "a\\.b\\:c");
        assert_eq!(css_escape("w-1/2"), "w-1\\/2");
    }

    #[test]
    fn test_make_selector_for_id() {
        assert_eq!(make_selector_for_id("main"), "#main");
        assert_eq!(make_selector_for_id("a1b2c3d4"), "#a1b2c3d4");
        assert_eq!(make_selector_for_id("1abc"), "[id=\"1abc\"]");
        assert_eq!(make_selector_for_id("x"), "[id=\"x\"]");
        assert_eq!(make_selector_for_id("a:b"), "[id=\"a:b\"]");
    }

    #[test]
    fn test_is_guid_like() {
        assert!(is_guid_like("a1b2c3d4"));
        assert!(is_guid_like("f47ac10b-58cc-4372-a567-0e02b2c3d479"));
        assert!(!is_guid_like("submit-button"));
        assert!(!is_guid_like("mainContent"));
        assert!(!is_guid_like("Header"));
        assert!(!is_guid_like(""));
    }
}

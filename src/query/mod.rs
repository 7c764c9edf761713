//! Parser and evaluator for the generated selector grammar.
//!
//! Selectors are `>>`-joined segments. Each segment narrows the matches of the
//! previous one: most engines look at descendants, `nth=` picks from the
//! current set and `..` climbs to parents. The generator uses this engine to
//! test candidate uniqueness, and callers use it to verify the final string,
//! so both always agree.

pub mod attributes;
pub mod role;

use crate::core::{DomCapabilities, GeneratorConfig};
use crate::dom::element::attr;
use crate::dom::text::{contains_ignore_case, normalize_whitespace, NON_TEXT_TAGS};
use crate::errors::{Result, SelectorError};
use crate::generator::index::ElementIndex;
use attributes::{parse_attribute_groups, AttributeValue};
use ego_tree::NodeId;
use regex::{Regex, RegexBuilder};
use role::{parse_role_selector, RoleSelector};
use scraper::{ElementRef, Html, Selector};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use tracing::trace;

pub use role::NameMatcher;

/// Text condition of an `internal:text=` segment.
#[derive(Debug, Clone)]
pub enum TextPattern {
    /// Case-insensitive substring, stored lower-cased.
    Lax(String),
    Exact(String),
    Regex(Regex),
}

impl TextPattern {
    pub fn matches(&self, text: &str) -> bool {
        match self {
            TextPattern::Lax(needle) => contains_ignore_case(text, needle),
            TextPattern::Exact(expected) => text == expected,
            TextPattern::Regex(regex) => regex.is_match(text),
        }
    }
}

/// `[name="value"s]` condition of the attribute and test id engines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeMatcher {
    pub name: String,
    pub value: String,
    pub exact: bool,
}

impl AttributeMatcher {
    pub fn matches(&self, actual: &str) -> bool {
        if self.exact {
            actual == self.value
        } else {
            contains_ignore_case(&normalize_whitespace(actual), &self.value.to_lowercase())
        }
    }
}

#[derive(Debug, Clone)]
pub enum Segment {
    Css { selector: Selector, source: String },
    Nth(i64),
    Parent(usize),
    Scope,
    Text(TextPattern),
    TestId(AttributeMatcher),
    Attribute(AttributeMatcher),
    Role(RoleSelector),
}

#[derive(Debug, Clone)]
pub struct ParsedSelector {
    pub source: String,
    pub segments: Vec<Segment>,
}

/// Splits on `>>` outside of quotes.
fn split_segments(selector: &str) -> Vec<&str> {
    let bytes = selector.as_bytes();
    let mut parts = Vec::new();
    let mut quote: Option<u8> = None;
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) => {
                if b == b'\\' {
                    i += 1;
                } else if b == q {
                    quote = None;
                }
            }
            None => {
                if b == b'"' || b == b'\'' {
                    quote = Some(b);
                } else if b == b'>' && bytes.get(i + 1) == Some(&b'>') {
                    parts.push(&selector[start..i]);
                    i += 2;
                    start = i;
                    continue;
                }
            }
        }
        i += 1;
    }
    parts.push(&selector[start..]);
    parts
}

pub fn parse_selector(selector: &str) -> Result<ParsedSelector> {
    let mut segments = Vec::new();
    for part in split_segments(selector) {
        let part = part.trim();
        if part.is_empty() {
            return Err(SelectorError::invalid_selector(selector, "empty segment"));
        }
        segments.push(parse_segment(part)?);
    }
    Ok(ParsedSelector {
        source: selector.to_string(),
        segments,
    })
}

fn parse_segment(part: &str) -> Result<Segment> {
    if part == ":scope" {
        return Ok(Segment::Scope);
    }
    if let Some(rest) = part.strip_prefix("nth=") {
        let index = rest
            .trim()
            .parse::<i64>()
            .map_err(|_| SelectorError::invalid_selector(part, "nth= expects an integer"))?;
        return Ok(Segment::Nth(index));
    }
    if let Some(rest) = part.strip_prefix("css=") {
        return parse_css(rest);
    }
    if let Some(rest) = part.strip_prefix("xpath=") {
        return parse_parent_path(rest.trim())
            .ok_or_else(|| SelectorError::invalid_selector(part, "only parent-relative xpath (\"..\") is supported"));
    }
    if part.starts_with("..") {
        return parse_parent_path(part)
            .ok_or_else(|| SelectorError::invalid_selector(part, "malformed parent path"));
    }
    if let Some(rest) = part.strip_prefix("internal:text=") {
        return parse_text(rest).map(Segment::Text);
    }
    if let Some(rest) = part.strip_prefix("internal:testid=") {
        return parse_attribute_matcher(rest).map(Segment::TestId);
    }
    if let Some(rest) = part.strip_prefix("internal:attr=") {
        return parse_attribute_matcher(rest).map(Segment::Attribute);
    }
    if let Some(rest) = part.strip_prefix("internal:role=") {
        return parse_role_selector(rest).map(Segment::Role);
    }
    if let Some(engine) = engine_prefix(part) {
        return Err(SelectorError::invalid_selector(part, format!("unknown engine \"{}\"", engine)));
    }
    parse_css(part)
}

/// Name of an `engine=` prefix, if the segment has one.
fn engine_prefix(part: &str) -> Option<&str> {
    let end = part.find('=')?;
    let name = &part[..end];
    let valid = name.chars().next().map(|c| c.is_ascii_alphabetic()).unwrap_or(false)
        && name.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':'));
    valid.then_some(name)
}

fn parse_css(source: &str) -> Result<Segment> {
    let source = source.trim();
    let selector = Selector::parse(source)
        .map_err(|e| SelectorError::invalid_selector(source, format!("{:?}", e)))?;
    Ok(Segment::Css {
        selector,
        source: source.to_string(),
    })
}

fn parse_parent_path(path: &str) -> Option<Segment> {
    let steps: Vec<&str> = path.split('/').collect();
    if steps.iter().all(|s| *s == "..") {
        Some(Segment::Parent(steps.len()))
    } else {
        None
    }
}

fn parse_text(body: &str) -> Result<TextPattern> {
    let body = body.trim();
    if body.starts_with('"') {
        let end = closing_quote(body)
            .ok_or_else(|| SelectorError::invalid_selector(body, "unterminated text"))?;
        let value: String = serde_json::from_str(&body[..=end])?;
        let value = normalize_whitespace(&value);
        return match &body[end + 1..] {
            "" | "i" | "I" => Ok(TextPattern::Lax(value.to_lowercase())),
            "s" | "S" => Ok(TextPattern::Exact(value)),
            other => Err(SelectorError::invalid_selector(body, format!("unknown text flag \"{}\"", other))),
        };
    }
    if body.starts_with('/') && body.len() > 1 {
        let end = body
            .rfind('/')
            .filter(|end| *end > 0)
            .ok_or_else(|| SelectorError::invalid_selector(body, "unterminated regular expression"))?;
        let flags = &body[end + 1..];
        let mut builder = RegexBuilder::new(&body[1..end]);
        for flag in flags.chars() {
            match flag {
                'i' => builder.case_insensitive(true),
                'm' => builder.multi_line(true),
                's' => builder.dot_matches_new_line(true),
                'u' | 'g' => &mut builder,
                other => {
                    return Err(SelectorError::invalid_selector(body, format!("unsupported regex flag \"{}\"", other)))
                }
            };
        }
        let regex = builder
            .build()
            .map_err(|e| SelectorError::invalid_selector(body, e))?;
        return Ok(TextPattern::Regex(regex));
    }
    Ok(TextPattern::Lax(normalize_whitespace(body).to_lowercase()))
}

/// Byte index of the quote closing the JSON string that opens `body`.
fn closing_quote(body: &str) -> Option<usize> {
    let mut escaped = false;
    for (i, c) in body.char_indices().skip(1) {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == '"' {
            return Some(i);
        }
    }
    None
}

fn parse_attribute_matcher(body: &str) -> Result<AttributeMatcher> {
    let groups = parse_attribute_groups(body)?;
    let [group] = groups.as_slice() else {
        return Err(SelectorError::invalid_selector(body, "exactly one [name=value] expected"));
    };
    if group.operator.as_deref() != Some("=") {
        return Err(SelectorError::UnsupportedOperator {
            operator: group.operator.clone().unwrap_or_default(),
            attribute: group.name.clone(),
        });
    }
    match &group.value {
        Some(AttributeValue::Quoted { value, case_sensitive }) => Ok(AttributeMatcher {
            name: group.name.clone(),
            value: value.clone(),
            exact: case_sensitive.unwrap_or(false),
        }),
        Some(AttributeValue::Bare(value)) => Ok(AttributeMatcher {
            name: group.name.clone(),
            value: value.clone(),
            exact: true,
        }),
        None => Err(SelectorError::invalid_selector(body, "attribute value expected")),
    }
}

/// Evaluates selectors against one scope. Results are memoised per
/// `(root, selector)` for the lifetime of the engine.
pub struct QueryEngine<'a> {
    index: ElementIndex<'a>,
    cache: RefCell<HashMap<(NodeId, String), Rc<Vec<NodeId>>>>,
}

impl<'a> QueryEngine<'a> {
    pub fn new(index: ElementIndex<'a>) -> Self {
        Self {
            index,
            cache: RefCell::new(HashMap::new()),
        }
    }

    pub fn index(&self) -> &ElementIndex<'a> {
        &self.index
    }

    /// All matches of `selector` within the scope, in document order.
    pub fn query_all(&self, selector: &str) -> Result<Vec<NodeId>> {
        let matches = self.query_within(self.index.scope(), selector)?;
        Ok(matches.as_ref().clone())
    }

    /// Matches of `selector` evaluated from `root` rather than the scope.
    pub fn query_within(&self, root: NodeId, selector: &str) -> Result<Rc<Vec<NodeId>>> {
        let key = (root, selector.to_string());
        if let Some(hit) = self.cache.borrow().get(&key) {
            return Ok(hit.clone());
        }
        let parsed = parse_selector(selector)?;
        let matches = Rc::new(self.query_parsed(&[root], &parsed));
        self.cache.borrow_mut().insert(key, matches.clone());
        Ok(matches)
    }

    pub fn query_parsed(&self, roots: &[NodeId], parsed: &ParsedSelector) -> Vec<NodeId> {
        let mut current = roots.to_vec();
        for segment in &parsed.segments {
            if current.is_empty() {
                break;
            }
            current = self.apply(segment, &current);
        }
        current
    }

    fn apply(&self, segment: &Segment, roots: &[NodeId]) -> Vec<NodeId> {
        match segment {
            Segment::Scope => vec![self.index.scope()],
            Segment::Nth(index) => {
                let len = roots.len() as i64;
                let position = if *index < 0 { len + index } else { *index };
                if (0..len).contains(&position) {
                    vec![roots[position as usize]]
                } else {
                    Vec::new()
                }
            }
            Segment::Parent(hops) => {
                let mut parents: Vec<NodeId> = roots
                    .iter()
                    .filter_map(|root| self.climb(*root, *hops))
                    .collect();
                self.index.normalize(&mut parents);
                parents
            }
            Segment::Css { selector, .. } => self.descendants_where(roots, |id| {
                self.index
                    .element(id)
                    .map(|el| selector.matches(&el))
                    .unwrap_or(false)
            }),
            Segment::Text(pattern @ TextPattern::Exact(value)) => {
                self.filter_pool(self.index.elements_with_text(value), roots, |id| {
                    self.text_matches_deepest(id, pattern)
                })
            }
            Segment::Text(pattern) => self.descendants_where(roots, |id| self.text_matches_deepest(id, pattern)),
            Segment::TestId(matcher) | Segment::Attribute(matcher) => self.query_attribute(roots, matcher),
            Segment::Role(selector) => self.query_role(roots, selector),
        }
    }

    fn climb(&self, from: NodeId, hops: usize) -> Option<NodeId> {
        let mut node = from;
        for _ in 0..hops {
            node = self.index.parent_element(node)?.id();
        }
        Some(node)
    }

    fn is_under_any(&self, id: NodeId, roots: &[NodeId]) -> bool {
        if roots.len() == 1 && roots[0] == self.index.scope() {
            return id != roots[0] && self.index.contains(id);
        }
        self.index.links().ancestors(id).any(|a| roots.contains(&a))
    }

    fn descendants_where(&self, roots: &[NodeId], predicate: impl Fn(NodeId) -> bool) -> Vec<NodeId> {
        self.index
            .elements()
            .iter()
            .copied()
            .filter(|id| self.is_under_any(*id, roots) && predicate(*id))
            .collect()
    }

    fn filter_pool(&self, pool: &[NodeId], roots: &[NodeId], predicate: impl Fn(NodeId) -> bool) -> Vec<NodeId> {
        let mut matches: Vec<NodeId> = pool
            .iter()
            .copied()
            .filter(|id| self.is_under_any(*id, roots) && predicate(*id))
            .collect();
        self.index.normalize(&mut matches);
        matches
    }

    fn text_candidate(&self, id: NodeId, pattern: &TextPattern) -> bool {
        let Some(element) = self.index.element(id) else {
            return false;
        };
        if NON_TEXT_TAGS.contains(&element.value().name()) {
            return false;
        }
        if !self.index.include_hidden() && self.index.is_hidden(id) {
            return false;
        }
        pattern.matches(&self.index.text(id).full)
    }

    /// The element matches and none of its child elements does.
    fn text_matches_deepest(&self, id: NodeId, pattern: &TextPattern) -> bool {
        if !self.text_candidate(id, pattern) {
            return false;
        }
        let Some(element) = self.index.element(id) else {
            return false;
        };
        !element
            .children()
            .filter_map(ElementRef::wrap)
            .any(|child| self.text_candidate(child.id(), pattern))
    }

    fn query_attribute(&self, roots: &[NodeId], matcher: &AttributeMatcher) -> Vec<NodeId> {
        let predicate = |id: NodeId| {
            self.index
                .element(id)
                .and_then(|el| attr(el, &matcher.name))
                .map(|value| matcher.matches(value))
                .unwrap_or(false)
        };
        if matcher.exact {
            if let Some(pool) = self.index.elements_with_attribute(&matcher.name, &matcher.value) {
                return self.filter_pool(pool, roots, predicate);
            }
        }
        self.descendants_where(roots, predicate)
    }

    fn query_role(&self, roots: &[NodeId], selector: &RoleSelector) -> Vec<NodeId> {
        let predicate = |id: NodeId| selector.matches(&self.index, id);
        if selector.include_hidden && !self.index.include_hidden() {
            // Hidden elements were left out of the role table.
            return self.descendants_where(roots, predicate);
        }
        self.filter_pool(self.index.elements_with_role(&selector.role), roots, predicate)
    }
}

/// One-shot query over a document, scoped to `root` (or the whole document).
pub fn query_selector_all(
    html: &Html,
    caps: &dyn DomCapabilities,
    root: Option<NodeId>,
    selector: &str,
    config: &GeneratorConfig,
) -> Result<Vec<NodeId>> {
    let scope = root.unwrap_or_else(|| html.tree.root().id());
    trace!("querying \"{}\"", selector);
    let engine = QueryEngine::new(ElementIndex::build(html, caps, scope, config));
    engine.query_all(selector)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_respects_quotes() {
        assert_eq!(split_segments("a >> b"), vec!["a ", " b"]);
        assert_eq!(
            split_segments(r#"internal:text="x >> y"i >> nth=0"#),
            vec![r#"internal:text="x >> y"i "#, " nth=0"]
        );
    }

    #[test]
    fn test_parse_segments() {
        let parsed = parse_selector(
            r#"#main >> internal:testid=[data-testid="go"s] >> ../.. >> nth=-1 >> internal:text=/sign\s+in/i"#,
        )
        .unwrap();
        assert_eq!(parsed.segments.len(), 5);
        assert!(matches!(parsed.segments[0], Segment::Css { .. }));
        assert!(matches!(&parsed.segments[1], Segment::TestId(m) if m.exact && m.value == "go"));
        assert!(matches!(parsed.segments[2], Segment::Parent(2)));
        assert!(matches!(parsed.segments[3], Segment::Nth(-1)));
        assert!(matches!(&parsed.segments[4], Segment::Text(TextPattern::Regex(r)) if r.is_match("Sign  In")));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(parse_selector("bogus=x"), Err(SelectorError::InvalidSelector(_))));
        assert!(matches!(parse_selector("xpath=//div"), Err(SelectorError::InvalidSelector(_))));
        assert!(matches!(parse_selector("div >> "), Err(SelectorError::InvalidSelector(_))));
        assert!(matches!(parse_selector("nth=first"), Err(SelectorError::InvalidSelector(_))));
        assert!(matches!(parse_selector("div[["), Err(SelectorError::InvalidSelector(_))));
        assert!(matches!(
            parse_selector("internal:attr=[title^=\"x\"i]"),
            Err(SelectorError::UnsupportedOperator { .. })
        ));
    }

    #[test]
    fn test_text_flags() {
        assert!(matches!(parse_text("\"Hello\"i").unwrap(), TextPattern::Lax(v) if v == "hello"));
        assert!(matches!(parse_text("\"Hello\"s").unwrap(), TextPattern::Exact(v) if v == "Hello"));
        assert!(matches!(parse_text("Hello").unwrap(), TextPattern::Lax(v) if v == "hello"));
        assert!(parse_text("\"Hello\"x").is_err());
    }

    #[test]
    fn test_attribute_matcher() {
        let lax = AttributeMatcher {
            name: "placeholder".to_string(),
            value: "email".to_string(),
            exact: false,
        };
        assert!(lax.matches("Your  Email address"));
        let exact = AttributeMatcher {
            exact: true,
            ..lax.clone()
        };
        assert!(!exact.matches("Email"));
        assert!(exact.matches("email"));
    }
}

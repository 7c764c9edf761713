//! Candidate generators. Each one looks at a single element and proposes
//! single-token candidates; whether a candidate is unique is decided later by
//! querying it.

use super::collection::Candidate;
use super::escape::{css_escape, is_guid_like, make_selector_for_id, quote_css_attribute_value};
use super::index::{ElementIndex, ALTERNATE_TEST_ID_ATTRIBUTES};
use super::token::{
    Token, ALT_TEXT, CSS_ID, CSS_INPUT_TYPE_NAME, CSS_OTHER_ID, CSS_TAG_NAME, IFRAME_BY_ATTRIBUTE, OTHER_TEST_ID,
    PLACEHOLDER, TEST_ID_LIKE_CSS, TITLE,
};
use crate::core::GeneratorConfig;
use crate::dom::element::{attr, non_empty_attr, tag_name};
use crate::dom::text::{normalize_whitespace, trim_word_boundary, NON_TEXT_TAGS};
use ego_tree::NodeId;
use scraper::ElementRef;

/// Longest text used for a text candidate.
pub const MAX_TEXT_LENGTH: usize = 80;

/// Attributes that are test ids by convention but addressed through plain CSS.
pub const TEST_ID_LIKE_CSS_ATTRIBUTES: &[&str] = &["data-cy", "data-qa", "data-automation", "data-test-subj"];

const FORM_CONTROLS: &[&str] = &["input", "textarea", "select", "button"];

/// Everything the generators propose for `element`, in declaration order.
pub fn candidates_for(
    index: &ElementIndex<'_>,
    config: &GeneratorConfig,
    element: ElementRef<'_>,
    boundary: Option<NodeId>,
) -> Vec<Candidate> {
    let mut candidates = Vec::new();
    if !config.omit_internal_engines {
        candidates.extend(attribute_candidates(config, element));
        candidates.extend(text_candidates(index, element, boundary));
        candidates.extend(role_candidates(index, element, boundary));
    }
    candidates.extend(css_candidates(config, element));
    candidates
}

/// True when `node` lies inside `boundary` or contains it.
pub fn touches_boundary(index: &ElementIndex<'_>, node: NodeId, boundary: NodeId) -> bool {
    index.is_inclusive_descendant(node, boundary) || index.is_inclusive_descendant(boundary, node)
}

fn lax_and_exact(name: &str, value: &str, base: u64) -> [Candidate; 2] {
    [
        Candidate::single(Token::attribute(name, &normalize_whitespace(value), false, base)),
        Candidate::single(Token::attribute(name, value, true, base)),
    ]
}

pub fn attribute_candidates(config: &GeneratorConfig, element: ElementRef<'_>) -> Vec<Candidate> {
    let mut candidates = Vec::new();
    let tag = tag_name(element);
    let test_id = config.test_id_attribute_name.as_str();

    if let Some(value) = non_empty_attr(element, test_id) {
        candidates.push(Candidate::single(Token::test_id(test_id, value, false)));
        candidates.push(Candidate::single(Token::test_id(test_id, value, true)));
    }
    for name in ALTERNATE_TEST_ID_ATTRIBUTES.iter().filter(|n| **n != test_id) {
        if let Some(value) = non_empty_attr(element, name) {
            candidates.extend(lax_and_exact(name, value, OTHER_TEST_ID));
        }
    }

    if tag == "input" || tag == "textarea" {
        if let Some(value) = non_empty_attr(element, "placeholder") {
            candidates.extend(lax_and_exact("placeholder", value, PLACEHOLDER));
        }
    }

    let takes_alt = tag == "img"
        || tag == "area"
        || (tag == "input" && attr(element, "type").map(|t| t.eq_ignore_ascii_case("image")).unwrap_or(false));
    if takes_alt {
        if let Some(value) = non_empty_attr(element, "alt") {
            candidates.extend(lax_and_exact("alt", value, ALT_TEXT));
        }
    }

    if let Some(value) = non_empty_attr(element, "title") {
        candidates.extend(lax_and_exact("title", value, TITLE));
    }
    candidates
}

pub fn css_candidates(config: &GeneratorConfig, element: ElementRef<'_>) -> Vec<Candidate> {
    let mut candidates = Vec::new();
    let tag = tag_name(element);

    if let Some(id) = non_empty_attr(element, "id") {
        let score = if is_guid_like(id) { CSS_ID } else { CSS_OTHER_ID };
        candidates.push(Candidate::single(Token::css(make_selector_for_id(id), score)));
    }

    let mut css_test_ids: Vec<&str> = TEST_ID_LIKE_CSS_ATTRIBUTES.to_vec();
    if config.omit_internal_engines {
        css_test_ids.push(config.test_id_attribute_name.as_str());
        css_test_ids.extend(ALTERNATE_TEST_ID_ATTRIBUTES.iter().copied());
        css_test_ids.dedup();
    }
    for name in css_test_ids {
        if let Some(value) = non_empty_attr(element, name) {
            let selector = format!("[{}={}]", name, quote_css_attribute_value(value));
            candidates.push(Candidate::single(Token::css(selector, TEST_ID_LIKE_CSS)));
        }
    }

    if tag == "iframe" {
        for name in ["name", "title"] {
            if let Some(value) = non_empty_attr(element, name) {
                let selector = format!("iframe[{}={}]", name, quote_css_attribute_value(value));
                candidates.push(Candidate::single(Token::css(selector, IFRAME_BY_ATTRIBUTE)));
            }
        }
    }

    let escaped_tag = css_escape(&tag);
    if tag == "input" || tag == "textarea" {
        if let Some(input_type) = non_empty_attr(element, "type") {
            let selector = format!("{}[type={}]", escaped_tag, quote_css_attribute_value(input_type));
            candidates.push(Candidate::single(Token::css(selector, CSS_INPUT_TYPE_NAME)));
        }
    }
    if matches!(tag.as_str(), "input" | "textarea" | "select") {
        if let Some(name) = non_empty_attr(element, "name") {
            let selector = format!("{}[name={}]", escaped_tag, quote_css_attribute_value(name));
            candidates.push(Candidate::single(Token::css(selector, CSS_INPUT_TYPE_NAME)));
        }
    }

    if FORM_CONTROLS.contains(&tag.as_str()) {
        candidates.push(Candidate::single(Token::css(escaped_tag, CSS_INPUT_TYPE_NAME + 1)));
    } else {
        candidates.push(Candidate::single(Token::css(escaped_tag, CSS_TAG_NAME)));
    }
    candidates
}

pub fn role_candidates(
    index: &ElementIndex<'_>,
    element: ElementRef<'_>,
    boundary: Option<NodeId>,
) -> Vec<Candidate> {
    let id = element.id();
    if !index.include_hidden() && index.is_hidden(id) {
        return Vec::new();
    }
    let Some(role) = index.role(id) else {
        return Vec::new();
    };

    let mut candidates = vec![Candidate::single(Token::role(&role))];
    let name = index.accessible_name(id);
    if name.is_empty() {
        return candidates;
    }
    let self_referential = boundary
        .map(|b| name.provenance.iter().any(|p| touches_boundary(index, *p, b)))
        .unwrap_or(false);
    if self_referential {
        return candidates;
    }
    candidates.push(Candidate::single(Token::role_with_name(&role, &name.name, false)));
    candidates.push(Candidate::single(Token::role_with_name(&role, &name.name, true)));
    candidates
}

pub fn text_candidates(
    index: &ElementIndex<'_>,
    element: ElementRef<'_>,
    boundary: Option<NodeId>,
) -> Vec<Candidate> {
    let id = element.id();
    if NON_TEXT_TAGS.contains(&element.value().name()) {
        return Vec::new();
    }
    if !index.include_hidden() && index.is_hidden(id) {
        return Vec::new();
    }
    if boundary.map(|b| touches_boundary(index, id, b)).unwrap_or(false) {
        return Vec::new();
    }

    let text = index.text(id);
    if text.full.is_empty() {
        return Vec::new();
    }

    let lax = trim_word_boundary(&text.full, MAX_TEXT_LENGTH);
    let mut candidates = vec![Candidate::single(Token::text(&lax, false))];
    if text.full.chars().count() <= MAX_TEXT_LENGTH {
        candidates.push(Candidate::single(Token::text(&text.full, true)));
    } else {
        // Long content: the element's own short text runs may still single it out.
        for run in &text.immediate_runs {
            if run.chars().count() <= MAX_TEXT_LENGTH && *run != lax {
                candidates.push(Candidate::single(Token::text(run, false)));
            }
        }
    }
    candidates
}

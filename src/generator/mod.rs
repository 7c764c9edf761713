//! Selector synthesis.
//!
//! [`SelectorGenerator::generate`] builds an [`ElementIndex`] over the scope,
//! explores ancestors of the target and their shallow subtrees, and keeps the
//! cheapest candidate that resolves to exactly the target. All caches live in
//! a per-call [`GenerationContext`] and are dropped when the call returns.

pub mod collection;
pub mod css_path;
pub mod escape;
pub mod index;
pub mod strategies;
pub mod token;

use crate::core::{DomCapabilities, GeneratorConfig};
use crate::dom::element::tag_name;
use crate::dom::HtmlCapabilities;
use crate::errors::{Result, SelectorError};
use crate::query::QueryEngine;
use collection::{Candidate, CandidateCollection, CHAIN_PENALTY};
use ego_tree::NodeId;
use index::ElementIndex;
use scraper::{ElementRef, Html, Selector};
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use token::Token;
use tracing::{debug, trace};

/// Elements an action would really land on when a descendant is clicked.
const INTERACTIVE_SELECTOR: &str =
    "button, select, input, a, [role=button], [role=checkbox], [role=radio], [role=link]";

/// Per-call options: the configuration plus element-valued settings.
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    pub config: GeneratorConfig,
    /// Scope of uniqueness; the whole document when `None`.
    pub root: Option<NodeId>,
    /// Text inside this element is never used to name other elements.
    pub omit_text_from: Option<NodeId>,
}

impl GenerateOptions {
    pub fn new(config: GeneratorConfig) -> Self {
        Self {
            config,
            root: None,
            omit_text_from: None,
        }
    }

    pub fn root(mut self, root: ElementRef<'_>) -> Self {
        self.root = Some(root.id());
        self
    }

    pub fn omit_text_from(mut self, element: ElementRef<'_>) -> Self {
        self.omit_text_from = Some(element.id());
        self
    }

    pub fn test_id_attribute(mut self, name: impl Into<String>) -> Self {
        self.config.test_id_attribute_name = name.into();
        self
    }

    pub fn retarget_for_action(mut self, enabled: bool) -> Self {
        self.config.retarget_for_action = enabled;
        self
    }

    pub fn retarget_for_text(mut self, enabled: bool) -> Self {
        self.config.retarget_for_text = enabled;
        self
    }

    pub fn omit_internal_engines(mut self, enabled: bool) -> Self {
        self.config.omit_internal_engines = enabled;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedSelector {
    pub selector: String,
    /// What `selector` matches when queried from the scope, in document order.
    pub elements: Vec<NodeId>,
    pub score: u64,
}

impl GeneratedSelector {
    pub fn is_unique(&self) -> bool {
        self.elements.len() == 1
    }
}

/// Generates selectors for elements of one document.
pub struct SelectorGenerator<'a> {
    html: &'a Html,
    caps: &'a dyn DomCapabilities,
}

impl<'a> SelectorGenerator<'a> {
    pub fn new(html: &'a Html, caps: &'a dyn DomCapabilities) -> Self {
        Self { html, caps }
    }

    pub fn generate(&self, target: ElementRef<'_>, options: &GenerateOptions) -> Result<GeneratedSelector> {
        options.config.validate()?;
        let scope = options.root.unwrap_or_else(|| self.html.tree.root().id());
        let target_id = target.id();
        let target = self
            .html
            .tree
            .get(target_id)
            .and_then(ElementRef::wrap)
            .ok_or_else(|| SelectorError::ElementNotFound(format!("{:?}", target_id)))?;

        debug!("generating selector for <{}>", tag_name(target));
        let engine = QueryEngine::new(ElementIndex::build(self.html, self.caps, scope, &options.config));
        if !engine.index().is_inclusive_descendant(target.id(), scope) {
            return Err(SelectorError::TargetOutsideScope);
        }
        if target.id() == scope {
            return Ok(scope_selector(scope));
        }
        if tag_name(target) == "html" {
            return Ok(GeneratedSelector {
                selector: "html".to_string(),
                elements: vec![target.id()],
                score: 0,
            });
        }

        let target = if options.config.retarget_for_action {
            retarget_for_action(&engine, target)?
        } else {
            target.id()
        };
        if target == scope {
            return Ok(scope_selector(scope));
        }

        let mut best = CandidateCollection::new();
        for anchor in anchor_targets(&engine, target, options.config.retarget_for_text) {
            let context = GenerationContext::new(&engine, options, anchor, target);
            let mut found = context.best_for_anchor();
            if anchor != target {
                let Some(down) = context.direct(target, anchor) else {
                    continue;
                };
                found = found.chain(&CandidateCollection::from(down));
            }
            best.merge(found);
        }

        let best = best
            .into_best()
            .unwrap_or_else(|| Candidate::single(Token::deferred_css(target)));
        let resolved = best.resolve(|element| css_path::css_fallback(&engine, element));
        let selector = resolved
            .render()
            .ok_or_else(|| SelectorError::invalid_selector("<deferred>", "unresolved css path"))?;
        let elements = engine.query_all(&selector)?;

        debug!(
            "selector \"{}\" (score {}) matches {} element(s)",
            selector,
            resolved.score(),
            elements.len()
        );
        Ok(GeneratedSelector {
            selector,
            elements,
            score: resolved.score(),
        })
    }
}

/// Generates a selector using the built-in [`HtmlCapabilities`].
pub fn generate_selector(html: &Html, target: ElementRef<'_>, options: &GenerateOptions) -> Result<GeneratedSelector> {
    let caps = HtmlCapabilities::new(html);
    SelectorGenerator::new(html, &caps).generate(target, options)
}

fn scope_selector(scope: NodeId) -> GeneratedSelector {
    let token = Token::scope();
    GeneratedSelector {
        selector: token.render().unwrap_or_else(|| ":scope".to_string()),
        elements: vec![scope],
        score: token.score,
    }
}

/// Moves a click target to the control the click would activate: the closest
/// visible interactive ancestor, or the control of an enclosing `<label>`.
fn retarget_for_action(engine: &QueryEngine<'_>, target: ElementRef<'_>) -> Result<NodeId> {
    let index = engine.index();
    if matches!(target.value().name(), "input" | "textarea" | "select") {
        return Ok(target.id());
    }
    let interactive = Selector::parse(INTERACTIVE_SELECTOR)
        .map_err(|e| SelectorError::invalid_selector(INTERACTIVE_SELECTOR, format!("{:?}", e)))?;

    let mut current = Some(target);
    while let Some(element) = current {
        if !index.contains(element.id()) || element.id() == index.scope() {
            break;
        }
        if interactive.matches(&element) && !index.is_hidden(element.id()) {
            if element.id() != target.id() {
                trace!("retargeted to closest interactive <{}>", tag_name(element));
            }
            return Ok(element.id());
        }
        if element.value().name() == "label" {
            if let Some(control) = index.control_for_label(element.id()) {
                return Ok(control);
            }
        }
        current = index.parent_element(element.id());
    }
    Ok(target.id())
}

/// The target, then (with text retargeting) each ancestor whose text is the
/// same as the target's.
fn anchor_targets(engine: &QueryEngine<'_>, target: NodeId, retarget_for_text: bool) -> Vec<NodeId> {
    let mut anchors = vec![target];
    if !retarget_for_text {
        return anchors;
    }
    let index = engine.index();
    let text = index.text(target);
    if text.full.is_empty() {
        return anchors;
    }
    let mut current = index.parent_element(target);
    while let Some(parent) = current {
        if parent.id() == index.scope() || !index.contains(parent.id()) {
            break;
        }
        if index.text(parent.id()).full != text.full {
            break;
        }
        anchors.push(parent.id());
        current = index.parent_element(parent.id());
    }
    anchors
}

/// Caches and settings for the search anchored at one element.
pub struct GenerationContext<'e, 'a> {
    engine: &'e QueryEngine<'a>,
    config: &'e GeneratorConfig,
    omit_text_from: Option<NodeId>,
    anchor: NodeId,
    target: NodeId,
    direct_memo: RefCell<HashMap<(NodeId, NodeId), Option<Candidate>>>,
    chained_memo: RefCell<HashMap<NodeId, Option<Candidate>>>,
}

impl<'e, 'a> GenerationContext<'e, 'a> {
    pub fn new(engine: &'e QueryEngine<'a>, options: &'e GenerateOptions, anchor: NodeId, target: NodeId) -> Self {
        Self {
            engine,
            config: &options.config,
            omit_text_from: options.omit_text_from,
            anchor,
            target,
            direct_memo: RefCell::new(HashMap::new()),
            chained_memo: RefCell::new(HashMap::new()),
        }
    }

    fn scope(&self) -> NodeId {
        self.engine.index().scope()
    }

    /// Text boundary for candidates of `element`: the caller's choice for the
    /// element being generated for, the target for everything around it.
    fn boundary_for(&self, element: NodeId) -> Option<NodeId> {
        if element == self.anchor || element == self.target {
            self.omit_text_from
        } else {
            Some(self.target)
        }
    }

    /// Proper ancestors of `element` strictly below the scope, nearest first.
    fn ancestors_below_scope(&self, element: NodeId) -> Vec<NodeId> {
        let index = self.engine.index();
        let mut ancestors = Vec::new();
        let mut current = index.parent_element(element);
        while let Some(parent) = current {
            if parent.id() == self.scope() || !index.contains(parent.id()) {
                break;
            }
            ancestors.push(parent.id());
            current = index.parent_element(parent.id());
        }
        ancestors
    }

    /// Breadth-first subtree of `root`, bounded in depth and size, with each
    /// node's distance from `root`.
    fn bounded_subtree(&self, root: NodeId) -> Vec<(NodeId, usize)> {
        let index = self.engine.index();
        let mut out = Vec::new();
        let mut queue = VecDeque::from([(root, 0usize)]);
        while let Some((id, depth)) = queue.pop_front() {
            out.push((id, depth));
            if out.len() >= self.config.max_subtree_nodes {
                break;
            }
            if depth >= self.config.max_subtree_depth {
                continue;
            }
            if let Some(element) = index.element(id) {
                queue.extend(
                    element
                        .children()
                        .filter_map(ElementRef::wrap)
                        .map(|child| (child.id(), depth + 1)),
                );
            }
        }
        out
    }

    /// Best candidate resolving to the anchor from anywhere in the scope.
    pub fn best_for_anchor(&self) -> CandidateCollection {
        let anchor = self.anchor;
        let mut best = CandidateCollection::from(Candidate::single(Token::deferred_css(anchor)));

        let mut ancestors = vec![anchor];
        ancestors.extend(self.ancestors_below_scope(anchor));

        for ancestor in ancestors {
            for (root, depth) in self.bounded_subtree(ancestor) {
                let Some(mut candidate) = self.chained(root) else {
                    continue;
                };
                if best.beats(candidate.score()) {
                    continue;
                }
                if root != ancestor {
                    candidate = candidate.with_token(Token::parent_path(depth));
                }
                if ancestor != anchor {
                    if best.beats(candidate.score() + CHAIN_PENALTY) {
                        continue;
                    }
                    let Some(down) = self.direct(anchor, ancestor) else {
                        continue;
                    };
                    candidate = candidate.append(&down);
                }
                best.update_with_candidate(candidate);
            }
        }
        best
    }

    /// Best candidate for `element` evaluated from `within`, using only the
    /// element's own generators plus `nth=` when needed.
    pub fn direct(&self, element: NodeId, within: NodeId) -> Option<Candidate> {
        if let Some(hit) = self.direct_memo.borrow().get(&(element, within)) {
            return hit.clone();
        }
        let result = self.compute_direct(element, within);
        self.direct_memo
            .borrow_mut()
            .insert((element, within), result.clone());
        result
    }

    fn compute_direct(&self, element: NodeId, within: NodeId) -> Option<Candidate> {
        let index = self.engine.index();
        let element_ref = index.element(element)?;
        let mut candidates =
            strategies::candidates_for(index, self.config, element_ref, self.boundary_for(element));
        candidates.sort_by_key(Candidate::score);

        let mut best = CandidateCollection::new();
        for candidate in candidates {
            if best.beats(candidate.score()) {
                break;
            }
            let Some(selector) = candidate.render() else {
                continue;
            };
            let matches = match self.engine.query_within(within, &selector) {
                Ok(matches) => matches,
                Err(err) => {
                    trace!("skipping candidate \"{}\": {}", selector, err);
                    continue;
                }
            };
            if matches.len() == 1 && matches[0] == element {
                best.update_with_candidate(candidate);
                break;
            }
            if let Some(position) = matches.iter().position(|m| *m == element) {
                best.update_with_candidate(candidate.with_nth(position, matches.len()));
            }
        }
        best.into_best()
    }

    /// Best candidate for `element` from the scope, either direct or through
    /// the chained candidate of one of its ancestors.
    pub fn chained(&self, element: NodeId) -> Option<Candidate> {
        if let Some(hit) = self.chained_memo.borrow().get(&element) {
            return hit.clone();
        }

        let mut best = CandidateCollection::new();
        if let Some(direct) = self.direct(element, self.scope()) {
            best.update_with_candidate(direct);
        }
        for parent in self.ancestors_below_scope(element) {
            let Some(parent_best) = self.chained(parent) else {
                continue;
            };
            // Appending costs at least one more point and one join.
            if best.beats(parent_best.score() + 1 + CHAIN_PENALTY) {
                continue;
            }
            let Some(child) = self.direct(element, parent) else {
                continue;
            };
            best.update_with_candidate(parent_best.append(&child));
        }

        let result = best.into_best();
        self.chained_memo.borrow_mut().insert(element, result.clone());
        result
    }
}

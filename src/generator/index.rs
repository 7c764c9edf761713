use crate::core::{AccessibleName, DomCapabilities, ElementText, GeneratorConfig};
use crate::dom::element::{attr, child_elements, tag_name, TreeLinks};
use crate::dom::text::NON_TEXT_TAGS;
use crate::generator::escape::css_escape;
use ego_tree::NodeId;
use scraper::{ElementRef, Html};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use tracing::trace;

/// Attribute test ids recognised besides the configured one.
pub const ALTERNATE_TEST_ID_ATTRIBUTES: &[&str] = &["data-testid", "data-test-id", "data-test"];

const INDEXED_ATTRIBUTES: &[&str] = &["id", "placeholder", "alt", "title", "name"];

const LABELABLE_TAGS: &[&str] = &["button", "input", "meter", "output", "progress", "select", "textarea"];

#[derive(Debug, Default)]
struct ElementCache {
    role: Option<Option<String>>,
    hidden: Option<bool>,
    name: Option<Rc<AccessibleName>>,
    text: Option<Rc<ElementText>>,
    sibling_token: Option<Rc<str>>,
}

/// Lookup tables over one scope, built once per generation call.
///
/// The tables assume the document does not change while they are alive; the
/// per-element memo fills lazily as generators and queries ask for it.
pub struct ElementIndex<'a> {
    html: &'a Html,
    caps: &'a dyn DomCapabilities,
    scope: NodeId,
    include_hidden: bool,
    links: TreeLinks,
    elements: Vec<NodeId>,
    positions: HashMap<NodeId, usize>,
    by_role: HashMap<String, Vec<NodeId>>,
    by_text: HashMap<String, Vec<NodeId>>,
    attribute_names: Vec<String>,
    by_attribute: HashMap<(String, String), Vec<NodeId>>,
    labels: HashMap<NodeId, Vec<NodeId>>,
    cache: RefCell<HashMap<NodeId, ElementCache>>,
}

impl<'a> ElementIndex<'a> {
    pub fn build(html: &'a Html, caps: &'a dyn DomCapabilities, scope: NodeId, config: &GeneratorConfig) -> Self {
        let mut attribute_names: Vec<String> = INDEXED_ATTRIBUTES.iter().map(|s| s.to_string()).collect();
        for name in std::iter::once(config.test_id_attribute_name.as_str()).chain(ALTERNATE_TEST_ID_ATTRIBUTES.iter().copied()) {
            if !attribute_names.iter().any(|n| n == name) {
                attribute_names.push(name.to_string());
            }
        }

        let mut index = Self {
            html,
            caps,
            scope,
            include_hidden: config.include_hidden,
            links: TreeLinks::build(html.tree.root()),
            elements: Vec::new(),
            positions: HashMap::new(),
            by_role: HashMap::new(),
            by_text: HashMap::new(),
            attribute_names,
            by_attribute: HashMap::new(),
            labels: HashMap::new(),
            cache: RefCell::new(HashMap::new()),
        };

        if !index.links.contains(scope) {
            trace!("scope node is not part of the document, index stays empty");
            return index;
        }

        let mut ids: HashMap<String, NodeId> = HashMap::new();
        let mut label_targets: Vec<(NodeId, String)> = Vec::new();

        let nodes = index.links.subtree(scope).to_vec();
        for node_id in nodes {
            let Some(element) = index.element(node_id) else {
                continue;
            };
            let id = element.id();
            index.positions.insert(id, index.elements.len());
            index.elements.push(id);

            for name in &index.attribute_names {
                if let Some(value) = attr(element, name) {
                    index
                        .by_attribute
                        .entry((name.clone(), value.to_string()))
                        .or_default()
                        .push(id);
                }
            }
            if let Some(value) = attr(element, "id") {
                ids.entry(value.to_string()).or_insert(id);
            }

            if element.value().name() == "label" {
                match attr(element, "for") {
                    Some(target) => label_targets.push((id, target.to_string())),
                    None => {
                        let control = index
                            .links
                            .subtree(id)
                            .iter()
                            .filter_map(|d| index.element(*d))
                            .find(|d| LABELABLE_TAGS.contains(&d.value().name()));
                        if let Some(control) = control {
                            index.labels.entry(control.id()).or_default().push(id);
                        }
                    }
                }
            }

            let hidden = index.is_hidden(id);
            if hidden && !index.include_hidden {
                continue;
            }
            if let Some(role) = index.role(id) {
                index.by_role.entry(role).or_default().push(id);
            }
            if !NON_TEXT_TAGS.contains(&element.value().name()) {
                let text = index.text(id);
                if !text.full.is_empty() {
                    index.by_text.entry(text.full.clone()).or_default().push(id);
                }
            }
        }

        for (label, target) in label_targets {
            match ids.get(&target) {
                Some(control) => index.labels.entry(*control).or_default().push(label),
                None => trace!("label[for=\"{}\"] does not resolve", target),
            }
        }

        index
    }

    pub fn html(&self) -> &'a Html {
        self.html
    }

    pub fn caps(&self) -> &'a dyn DomCapabilities {
        self.caps
    }

    pub fn scope(&self) -> NodeId {
        self.scope
    }

    pub fn include_hidden(&self) -> bool {
        self.include_hidden
    }

    pub fn element(&self, id: NodeId) -> Option<ElementRef<'a>> {
        self.html.tree.get(id).and_then(ElementRef::wrap)
    }

    /// Document structure as reached through child links.
    pub fn links(&self) -> &TreeLinks {
        &self.links
    }

    pub fn parent_element(&self, id: NodeId) -> Option<ElementRef<'a>> {
        self.links.parent(id).and_then(|parent| self.element(parent))
    }

    pub fn is_inclusive_descendant(&self, node: NodeId, ancestor: NodeId) -> bool {
        self.links.is_inclusive_descendant(node, ancestor)
    }

    /// Elements in scope, in document order (the scope itself first when it
    /// is an element).
    pub fn elements(&self) -> &[NodeId] {
        &self.elements
    }

    pub fn position(&self, id: NodeId) -> Option<usize> {
        self.positions.get(&id).copied()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.positions.contains_key(&id)
    }

    /// Sorts into document order and drops duplicates and out-of-scope nodes.
    pub fn normalize(&self, ids: &mut Vec<NodeId>) {
        ids.retain(|id| self.contains(*id));
        ids.sort_by_key(|id| self.positions.get(id).copied().unwrap_or(usize::MAX));
        ids.dedup();
    }

    pub fn elements_with_role(&self, role: &str) -> &[NodeId] {
        self.by_role.get(role).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn elements_with_text(&self, text: &str) -> &[NodeId] {
        self.by_text.get(text).map(Vec::as_slice).unwrap_or(&[])
    }

    /// `None` when `name` is not an indexed attribute.
    pub fn elements_with_attribute(&self, name: &str, value: &str) -> Option<&[NodeId]> {
        if !self.attribute_names.iter().any(|n| n == name) {
            return None;
        }
        Some(
            self.by_attribute
                .get(&(name.to_string(), value.to_string()))
                .map(Vec::as_slice)
                .unwrap_or(&[]),
        )
    }

    pub fn labels_for(&self, control: NodeId) -> &[NodeId] {
        self.labels.get(&control).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn control_for_label(&self, label: NodeId) -> Option<NodeId> {
        self.elements
            .iter()
            .copied()
            .find(|control| self.labels_for(*control).contains(&label))
    }

    pub fn role(&self, id: NodeId) -> Option<String> {
        if let Some(role) = self.cache.borrow().get(&id).and_then(|c| c.role.clone()) {
            return role;
        }
        let role = self.element(id).and_then(|el| self.caps.role(el));
        self.cache.borrow_mut().entry(id).or_default().role = Some(role.clone());
        role
    }

    pub fn is_hidden(&self, id: NodeId) -> bool {
        if let Some(hidden) = self.cache.borrow().get(&id).and_then(|c| c.hidden) {
            return hidden;
        }
        let hidden = self.element(id).map(|el| self.caps.is_hidden(el)).unwrap_or(true);
        self.cache.borrow_mut().entry(id).or_default().hidden = Some(hidden);
        hidden
    }

    pub fn accessible_name(&self, id: NodeId) -> Rc<AccessibleName> {
        if let Some(name) = self.cache.borrow().get(&id).and_then(|c| c.name.clone()) {
            return name;
        }
        let name = Rc::new(
            self.element(id)
                .map(|el| self.caps.accessible_name(el, self.include_hidden))
                .unwrap_or_default(),
        );
        self.cache.borrow_mut().entry(id).or_default().name = Some(name.clone());
        name
    }

    pub fn text(&self, id: NodeId) -> Rc<ElementText> {
        if let Some(text) = self.cache.borrow().get(&id).and_then(|c| c.text.clone()) {
            return text;
        }
        let text = Rc::new(
            self.element(id)
                .map(|el| self.caps.element_text(el))
                .unwrap_or_default(),
        );
        self.cache.borrow_mut().entry(id).or_default().text = Some(text.clone());
        text
    }

    /// CSS token selecting the element among its siblings: the tag name when
    /// it is the first of its tag, `tag:nth-child(n)` otherwise.
    pub fn sibling_token(&self, id: NodeId) -> Rc<str> {
        if let Some(token) = self.cache.borrow().get(&id).and_then(|c| c.sibling_token.clone()) {
            return token;
        }
        let token: Rc<str> = match self.element(id) {
            Some(element) => Rc::from(self.compute_sibling_token(element)),
            None => Rc::from(""),
        };
        self.cache.borrow_mut().entry(id).or_default().sibling_token = Some(token.clone());
        token
    }

    fn compute_sibling_token(&self, element: ElementRef<'a>) -> String {
        let tag = tag_name(element);
        let escaped = css_escape(&tag);
        let Some(parent) = self.parent_element(element.id()) else {
            return escaped;
        };
        let siblings: Vec<ElementRef<'a>> = child_elements(parent).collect();
        let first_of_tag = siblings
            .iter()
            .find(|s| tag_name(**s) == tag)
            .map(|s| s.id() == element.id())
            .unwrap_or(true);
        if first_of_tag {
            return escaped;
        }
        let position = siblings.iter().position(|s| s.id() == element.id()).unwrap_or(0);
        format!("{}:nth-child({})", escaped, position + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::HtmlCapabilities;
    use scraper::Selector;

    fn find(html: &Html, css: &str) -> NodeId {
        html.select(&Selector::parse(css).unwrap()).next().unwrap().id()
    }

    #[test]
    fn test_tables() {
        let html = Html::parse_document(
            r#"<main>
                 <button data-testid="save">Save</button>
                 <button>Cancel</button>
                 <input id="email" placeholder="Email">
                 <label for="email">Mail</label>
                 <div hidden><button>Ghost</button></div>
               </main>"#,
        );
        let caps = HtmlCapabilities::new(&html);
        let index = ElementIndex::build(&html, &caps, html.tree.root().id(), &GeneratorConfig::default());

        assert_eq!(index.elements_with_role("button").len(), 2);
        assert_eq!(index.elements_with_text("Cancel").len(), 1);
        assert!(index.elements_with_text("Ghost").is_empty());
        assert_eq!(index.elements_with_attribute("data-testid", "save").map(<[NodeId]>::len), Some(1));
        assert_eq!(index.elements_with_attribute("placeholder", "Email").map(<[NodeId]>::len), Some(1));
        assert!(index.elements_with_attribute("data-unknown", "x").is_none());

        let input = find(&html, "#email");
        let label = find(&html, "label");
        assert_eq!(index.labels_for(input), &[label]);
        assert_eq!(index.control_for_label(label), Some(input));
    }

    #[test]
    fn test_scoped_index() {
        let html = Html::parse_document("<div id='a'><p>one</p></div><div id='b'><p>two</p></div>");
        let caps = HtmlCapabilities::new(&html);
        let scope = find(&html, "#b");
        let index = ElementIndex::build(&html, &caps, scope, &GeneratorConfig::default());

        assert_eq!(index.elements().len(), 2);
        assert_eq!(index.position(scope), Some(0));
        assert!(!index.contains(find(&html, "#a")));

        let mut ids = vec![find(&html, "#b p"), find(&html, "#a p"), scope, scope];
        index.normalize(&mut ids);
        assert_eq!(ids, vec![scope, find(&html, "#b p")]);
    }

    #[test]
    fn test_sibling_tokens() {
        let html = Html::parse_document("<ul><li>a</li><li>b</li><span>c</span></ul>");
        let caps = HtmlCapabilities::new(&html);
        let index = ElementIndex::build(&html, &caps, html.tree.root().id(), &GeneratorConfig::default());

        let items: Vec<NodeId> = html.select(&Selector::parse("li").unwrap()).map(|e| e.id()).collect();
        assert_eq!(&*index.sibling_token(items[0]), "li");
        assert_eq!(&*index.sibling_token(items[1]), "li:nth-child(2)");
        assert_eq!(&*index.sibling_token(find(&html, "span")), "span");
    }
}

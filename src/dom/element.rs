use ego_tree::{NodeId, NodeRef};
use scraper::{ElementRef, Node};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use super::text::normalize_whitespace;

/// Serializable description of an element, used in reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementSummary {
    pub tag_name: String,
    pub element_id: Option<String>,
    pub class_name: Option<String>,
    pub text_content: Option<String>,
    pub attributes: BTreeMap<String, String>,
}

impl ElementSummary {
    pub fn from_element(element: ElementRef<'_>) -> Self {
        let value = element.value();
        let attributes = value
            .attrs()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect::<BTreeMap<_, _>>();

        let text = normalize_whitespace(&element.text().collect::<String>());
        let text_content = if text.is_empty() {
            None
        } else if text.chars().count() > 100 {
            Some(format!("{}...", text.chars().take(97).collect::<String>()))
        } else {
            Some(text)
        };

        Self {
            tag_name: tag_name(element),
            element_id: value.attr("id").map(|s| s.to_string()),
            class_name: value.attr("class").map(|s| s.to_string()),
            text_content,
            attributes,
        }
    }

    /// Short human readable label, e.g. `button#save "Save changes"`.
    pub fn label(&self) -> String {
        let mut label = self.tag_name.clone();
        if let Some(id) = &self.element_id {
            label.push('#');
            label.push_str(id);
        } else if let Some(class) = &self.class_name {
            for c in class.split_whitespace() {
                label.push('.');
                label.push_str(c);
            }
        }
        if let Some(text) = &self.text_content {
            label.push_str(&format!(" \"{}\"", text));
        }
        label
    }
}

/// Lower-cased local name of the element.
pub fn tag_name(element: ElementRef<'_>) -> String {
    element.value().name().to_ascii_lowercase()
}

pub fn attr<'a>(element: ElementRef<'a>, name: &str) -> Option<&'a str> {
    element.value().attr(name)
}

/// Attribute value when present and not blank.
pub fn non_empty_attr<'a>(element: ElementRef<'a>, name: &str) -> Option<&'a str> {
    element.value().attr(name).filter(|v| !v.trim().is_empty())
}

pub fn child_elements<'a>(element: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    element.children().filter_map(ElementRef::wrap)
}

/// Document order and parent links of a tree, derived from child links only.
///
/// When the HTML parser moves a run of children under a new element (nested
/// `<a>`, misnested formatting tags), only the ends of the run get their
/// `parent` pointer updated. Child and sibling links stay right, so every
/// upward question goes through this map instead of `NodeRef::parent`.
#[derive(Debug, Clone, Default)]
pub struct TreeLinks {
    order: Vec<NodeId>,
    positions: HashMap<NodeId, usize>,
    subtree_ends: HashMap<NodeId, usize>,
    parents: HashMap<NodeId, NodeId>,
}

enum Visit<'a> {
    Enter(NodeRef<'a, Node>, Option<NodeId>),
    Exit(NodeId),
}

impl TreeLinks {
    /// Walks every node below `root` (text nodes included) in document order.
    pub fn build(root: NodeRef<'_, Node>) -> Self {
        let mut links = Self::default();
        let mut stack = vec![Visit::Enter(root, None)];
        while let Some(visit) = stack.pop() {
            match visit {
                Visit::Enter(node, parent) => {
                    let id = node.id();
                    links.positions.insert(id, links.order.len());
                    links.order.push(id);
                    if let Some(parent) = parent {
                        links.parents.insert(id, parent);
                    }
                    stack.push(Visit::Exit(id));
                    let children: Vec<_> = node.children().collect();
                    stack.extend(children.into_iter().rev().map(|child| Visit::Enter(child, Some(id))));
                }
                Visit::Exit(id) => {
                    links.subtree_ends.insert(id, links.order.len());
                }
            }
        }
        links
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.positions.contains_key(&id)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.parents.get(&id).copied()
    }

    /// Proper ancestors, nearest first.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |current| self.parent(*current))
    }

    /// `root` followed by all of its descendants, in document order.
    pub fn subtree(&self, root: NodeId) -> &[NodeId] {
        match (self.positions.get(&root), self.subtree_ends.get(&root)) {
            (Some(start), Some(end)) => &self.order[*start..*end],
            _ => &[],
        }
    }

    /// True when `ancestor` is `node` itself or one of its ancestors.
    pub fn is_inclusive_descendant(&self, node: NodeId, ancestor: NodeId) -> bool {
        match (
            self.positions.get(&node),
            self.positions.get(&ancestor),
            self.subtree_ends.get(&ancestor),
        ) {
            (Some(node), Some(start), Some(end)) => start <= node && node < end,
            _ => false,
        }
    }

    /// Parent element of `element` in the same document.
    pub fn parent_element<'a>(&self, element: ElementRef<'a>) -> Option<ElementRef<'a>> {
        self.parent(element.id())
            .and_then(|id| element.tree().get(id))
            .and_then(ElementRef::wrap)
    }
}

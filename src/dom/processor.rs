use crate::core::{AccessibleName, AriaState, AriaStateValue, DomCapabilities, ElementText};
use crate::dom::element::{attr, child_elements, non_empty_attr, tag_name, TreeLinks};
use crate::dom::text::{normalize_whitespace, NON_TEXT_TAGS};
use ego_tree::NodeId;
use scraper::{ElementRef, Html, Node};
use std::collections::{HashMap, HashSet};
use tracing::trace;

/// Tags that are never rendered, so never visible to a user.
const NON_RENDERED_TAGS: &[&str] = &[
    "script", "style", "noscript", "template", "head", "meta", "link", "title", "base",
];

/// Utility classes that conventionally hide an element.
const HIDDEN_CLASSES: &[&str] = &["hidden", "d-none", "invisible", "is-hidden"];

const KNOWN_ROLES: &[&str] = &[
    "alert", "alertdialog", "application", "article", "banner", "blockquote", "button",
    "caption", "cell", "checkbox", "code", "columnheader", "combobox", "complementary",
    "contentinfo", "definition", "deletion", "dialog", "directory", "document", "emphasis",
    "feed", "figure", "form", "generic", "grid", "gridcell", "group", "heading", "img",
    "insertion", "link", "list", "listbox", "listitem", "log", "main", "marquee", "math",
    "meter", "menu", "menubar", "menuitem", "menuitemcheckbox", "menuitemradio", "navigation",
    "none", "note", "option", "paragraph", "presentation", "progressbar", "radio",
    "radiogroup", "region", "row", "rowgroup", "rowheader", "scrollbar", "search",
    "searchbox", "separator", "slider", "spinbutton", "status", "strong", "subscript",
    "superscript", "switch", "tab", "table", "tablist", "tabpanel", "term", "textbox",
    "time", "timer", "toolbar", "tooltip", "tree", "treegrid", "treeitem",
];

/// Roles whose accessible name may come from their content.
const NAME_FROM_CONTENT_ROLES: &[&str] = &[
    "button", "cell", "checkbox", "columnheader", "gridcell", "heading", "link", "menuitem",
    "menuitemcheckbox", "menuitemradio", "option", "radio", "row", "rowheader", "switch",
    "tab", "tooltip", "treeitem",
];

const LABELABLE_TAGS: &[&str] = &[
    "button", "input", "meter", "output", "progress", "select", "textarea",
];

/// Capability provider over a parsed, static HTML document.
///
/// Role and name computation follow the HTML-AAM mappings closely enough to
/// rank selector candidates; layout-dependent visibility is approximated from
/// attributes and inline styles.
pub struct HtmlCapabilities<'a> {
    html: &'a Html,
    links: TreeLinks,
    ids: HashMap<String, NodeId>,
    labels_for: HashMap<String, Vec<NodeId>>,
}

impl<'a> HtmlCapabilities<'a> {
    pub fn new(html: &'a Html) -> Self {
        let mut ids = HashMap::new();
        let mut labels_for: HashMap<String, Vec<NodeId>> = HashMap::new();
        let links = TreeLinks::build(html.tree.root());

        for node_id in links.subtree(html.tree.root().id()) {
            let Some(element) = html.tree.get(*node_id).and_then(ElementRef::wrap) else {
                continue;
            };
            if let Some(id) = attr(element, "id") {
                ids.entry(id.to_string()).or_insert(element.id());
            }
            if element.value().name() == "label" {
                if let Some(target) = attr(element, "for") {
                    labels_for.entry(target.to_string()).or_default().push(element.id());
                }
            }
        }

        Self {
            html,
            links,
            ids,
            labels_for,
        }
    }

    /// Ancestor elements of `element`, nearest first.
    pub fn ancestors(&self, element: ElementRef<'_>) -> impl Iterator<Item = ElementRef<'a>> + '_ {
        self.links
            .ancestors(element.id())
            .filter_map(move |id| self.resolve(id))
    }

    pub fn element_by_id(&self, id: &str) -> Option<ElementRef<'a>> {
        self.ids
            .get(id)
            .and_then(|node_id| self.html.tree.get(*node_id))
            .and_then(ElementRef::wrap)
    }

    fn resolve(&self, node_id: NodeId) -> Option<ElementRef<'a>> {
        self.html.tree.get(node_id).and_then(ElementRef::wrap)
    }

    /// `<label>` elements associated with a labelable control.
    pub fn labels(&self, element: ElementRef<'_>) -> Vec<ElementRef<'a>> {
        let mut labels = Vec::new();
        if !LABELABLE_TAGS.contains(&element.value().name()) {
            return labels;
        }
        if element.value().name() == "input" && attr(element, "type") == Some("hidden") {
            return labels;
        }
        if let Some(id) = attr(element, "id") {
            if let Some(ids) = self.labels_for.get(id) {
                labels.extend(ids.iter().filter_map(|node_id| self.resolve(*node_id)));
            }
        }
        let wrapping = self.ancestors(element).find(|a| a.value().name() == "label");
        if let Some(label) = wrapping {
            // A wrapping label pointing at another control does not label this one.
            let points_elsewhere = attr(label, "for")
                .map(|target| Some(target) != attr(element, "id"))
                .unwrap_or(false);
            if !points_elsewhere && !labels.iter().any(|l| l.id() == label.id()) {
                labels.push(label);
            }
        }
        labels
    }

    fn is_hidden_self(&self, element: ElementRef<'_>) -> bool {
        let name = element.value().name();
        if NON_RENDERED_TAGS.contains(&name) {
            return true;
        }

        // Check for hidden input
        if name == "input" && attr(element, "type") == Some("hidden") {
            return true;
        }

        // Check for hidden attribute
        if attr(element, "hidden").is_some() || attr(element, "aria-hidden") == Some("true") {
            return true;
        }

        // Check for style attributes that hide elements
        if let Some(style) = attr(element, "style") {
            let style: String = style
                .to_lowercase()
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect();
            if style.contains("display:none") || style.contains("visibility:hidden") {
                return true;
            }
        }

        // Check for common hidden classes
        element.value().classes().any(|c| HIDDEN_CLASSES.contains(&c))
    }

    /// Appends the text of `element`'s subtree to `out`, following `aria-owns`.
    /// `exclude` skips one subtree (a labelled control inside its own label).
    fn collect_text(
        &self,
        element: ElementRef<'_>,
        out: &mut String,
        provenance: &mut HashSet<NodeId>,
        exclude: Option<NodeId>,
        visiting: &mut HashSet<NodeId>,
    ) {
        if !visiting.insert(element.id()) {
            return;
        }
        provenance.insert(element.id());
        for child in element.children() {
            match child.value() {
                Node::Text(text) => out.push_str(text),
                Node::Element(el) => {
                    if NON_TEXT_TAGS.contains(&el.name()) || Some(child.id()) == exclude {
                        continue;
                    }
                    if let Some(child) = ElementRef::wrap(child) {
                        self.collect_text(child, out, provenance, exclude, visiting);
                    }
                }
                _ => {}
            }
        }
        if let Some(owns) = attr(element, "aria-owns") {
            for id in owns.split_whitespace() {
                match self.element_by_id(id) {
                    Some(owned) => self.collect_text(owned, out, provenance, exclude, visiting),
                    None => trace!("aria-owns reference \"{}\" does not resolve", id),
                }
            }
        }
    }

    fn text_with_provenance(
        &self,
        element: ElementRef<'_>,
        exclude: Option<NodeId>,
    ) -> (String, HashSet<NodeId>) {
        let mut out = String::new();
        let mut provenance = HashSet::new();
        let mut visiting = HashSet::new();
        self.collect_text(element, &mut out, &mut provenance, exclude, &mut visiting);
        (normalize_whitespace(&out), provenance)
    }

    fn implicit_role(&self, element: ElementRef<'_>) -> Option<String> {
        let tag = tag_name(element);
        let role = match tag.as_str() {
            "button" => "button",
            "a" | "area" if attr(element, "href").is_some() => "link",
            "input" => return input_role(element),
            "textarea" => "textbox",
            "select" => {
                let size = attr(element, "size").and_then(|s| s.parse::<u32>().ok());
                if attr(element, "multiple").is_some() || size.map(|s| s > 1).unwrap_or(false) {
                    "listbox"
                } else {
                    "combobox"
                }
            }
            "option" => "option",
            "optgroup" => "group",
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => "heading",
            "nav" => "navigation",
            "main" => "main",
            "header" if !self.inside_sectioning(element) => "banner",
            "footer" if !self.inside_sectioning(element) => "contentinfo",
            "aside" => "complementary",
            "form" => "form",
            "section" if non_empty_attr(element, "aria-label").is_some()
                || non_empty_attr(element, "aria-labelledby").is_some() =>
            {
                "region"
            }
            "article" => "article",
            "ul" | "ol" | "menu" => "list",
            "li" => "listitem",
            "dl" => "list",
            "dt" => "term",
            "dd" => "definition",
            "table" => "table",
            "thead" | "tbody" | "tfoot" => "rowgroup",
            "tr" => "row",
            "td" => "cell",
            "th" => {
                if attr(element, "scope") == Some("row") {
                    "rowheader"
                } else {
                    "columnheader"
                }
            }
            "caption" => "caption",
            "img" if attr(element, "alt") == Some("") => return None,
            "img" => "img",
            "dialog" => "dialog",
            "hr" => "separator",
            "p" => "paragraph",
            "fieldset" | "details" => "group",
            "figure" => "figure",
            "progress" => "progressbar",
            "meter" => "meter",
            "output" => "status",
            "blockquote" => "blockquote",
            "code" => "code",
            "strong" | "b" => "strong",
            "em" | "i" => "emphasis",
            "time" => "time",
            "iframe" => "document",
            _ => return None,
        };
        Some(role.to_string())
    }

    fn inside_sectioning(&self, element: ElementRef<'_>) -> bool {
        self.ancestors(element)
            .any(|a| matches!(a.value().name(), "article" | "aside" | "main" | "nav" | "section"))
    }

    fn native_name(&self, element: ElementRef<'_>) -> Option<(String, HashSet<NodeId>)> {
        let tag = tag_name(element);
        let input_type = attr(element, "type").map(|t| t.to_ascii_lowercase());
        match tag.as_str() {
            "input" if matches!(input_type.as_deref(), Some("button" | "submit" | "reset")) => {
                let value = attr(element, "value").map(normalize_whitespace);
                let name = match (value, input_type.as_deref()) {
                    (Some(v), _) if !v.is_empty() => v,
                    (_, Some("submit")) => "Submit".to_string(),
                    (_, Some("reset")) => "Reset".to_string(),
                    _ => return None,
                };
                Some((name, HashSet::new()))
            }
            "input" if input_type.as_deref() == Some("image") => {
                non_empty_attr(element, "alt").map(|alt| (normalize_whitespace(alt), HashSet::new()))
            }
            "img" | "area" => {
                non_empty_attr(element, "alt").map(|alt| (normalize_whitespace(alt), HashSet::new()))
            }
            "fieldset" => self.first_child_text(element, "legend"),
            "table" => self.first_child_text(element, "caption"),
            "figure" => self.first_child_text(element, "figcaption"),
            _ => None,
        }
    }

    fn first_child_text(&self, element: ElementRef<'_>, child_tag: &str) -> Option<(String, HashSet<NodeId>)> {
        child_elements(element)
            .find(|c| c.value().name() == child_tag)
            .map(|c| self.text_with_provenance(c, None))
            .filter(|(text, _)| !text.is_empty())
    }
}

fn input_role(element: ElementRef<'_>) -> Option<String> {
    let input_type = attr(element, "type")
        .map(|t| t.to_ascii_lowercase())
        .unwrap_or_else(|| "text".to_string());
    let role = match input_type.as_str() {
        "hidden" => return None,
        "submit" | "reset" | "button" | "image" => "button",
        "checkbox" => "checkbox",
        "radio" => "radio",
        "range" => "slider",
        "number" => "spinbutton",
        "search" if attr(element, "list").is_none() => "searchbox",
        "email" | "tel" | "text" | "url" | "search" if attr(element, "list").is_some() => "combobox",
        "email" | "tel" | "text" | "url" | "password" => "textbox",
        _ => "textbox",
    };
    Some(role.to_string())
}

fn parse_tristate(value: Option<&str>) -> Option<AriaStateValue> {
    match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        Some("true") => Some(AriaStateValue::Bool(true)),
        Some("false") => Some(AriaStateValue::Bool(false)),
        Some("mixed") => Some(AriaStateValue::Mixed),
        _ => None,
    }
}

impl<'a> DomCapabilities for HtmlCapabilities<'a> {
    fn role(&self, element: ElementRef<'_>) -> Option<String> {
        if let Some(explicit) = attr(element, "role") {
            let role = explicit
                .split_whitespace()
                .map(|r| r.to_ascii_lowercase())
                .find(|r| KNOWN_ROLES.contains(&r.as_str()));
            if let Some(role) = role {
                if role == "none" || role == "presentation" {
                    return None;
                }
                return Some(role);
            }
        }
        self.implicit_role(element)
    }

    fn is_hidden(&self, element: ElementRef<'_>) -> bool {
        if self.is_hidden_self(element) {
            return true;
        }
        self.ancestors(element).any(|a| self.is_hidden_self(a))
    }

    fn accessible_name(&self, element: ElementRef<'_>, include_hidden: bool) -> AccessibleName {
        if !include_hidden && self.is_hidden(element) {
            return AccessibleName::empty();
        }

        // aria-labelledby wins over everything else
        if let Some(ids) = attr(element, "aria-labelledby") {
            let mut parts = Vec::new();
            let mut provenance = HashSet::new();
            for id in ids.split_whitespace() {
                match self.element_by_id(id) {
                    Some(referenced) => {
                        let (text, used) = self.text_with_provenance(referenced, None);
                        if !text.is_empty() {
                            parts.push(text);
                        }
                        provenance.extend(used);
                    }
                    None => trace!("aria-labelledby reference \"{}\" does not resolve", id),
                }
            }
            let name = normalize_whitespace(&parts.join(" "));
            if !name.is_empty() {
                return AccessibleName { name, provenance };
            }
        }

        if let Some(label) = non_empty_attr(element, "aria-label") {
            return AccessibleName {
                name: normalize_whitespace(label),
                provenance: HashSet::new(),
            };
        }

        let labels = self.labels(element);
        if !labels.is_empty() {
            let mut parts = Vec::new();
            let mut provenance = HashSet::new();
            for label in labels {
                let (text, used) = self.text_with_provenance(label, Some(element.id()));
                if !text.is_empty() {
                    parts.push(text);
                }
                provenance.extend(used);
            }
            let name = normalize_whitespace(&parts.join(" "));
            if !name.is_empty() {
                return AccessibleName { name, provenance };
            }
        }

        if let Some((name, provenance)) = self.native_name(element) {
            return AccessibleName { name, provenance };
        }

        let allows_content = self
            .role(element)
            .map(|role| NAME_FROM_CONTENT_ROLES.contains(&role.as_str()))
            .unwrap_or(false);
        if allows_content {
            let (name, provenance) = self.text_with_provenance(element, None);
            if !name.is_empty() {
                return AccessibleName { name, provenance };
            }
        }

        let fallback = non_empty_attr(element, "title").or_else(|| {
            if matches!(element.value().name(), "input" | "textarea") {
                non_empty_attr(element, "placeholder")
            } else {
                None
            }
        });
        match fallback {
            Some(text) => AccessibleName {
                name: normalize_whitespace(text),
                provenance: HashSet::new(),
            },
            None => AccessibleName::empty(),
        }
    }

    fn element_text(&self, element: ElementRef<'_>) -> ElementText {
        let (full, _) = self.text_with_provenance(element, None);
        let immediate_runs = element
            .children()
            .filter_map(|child| match child.value() {
                Node::Text(text) => Some(normalize_whitespace(text)),
                _ => None,
            })
            .filter(|run| !run.is_empty())
            .collect();
        ElementText {
            full,
            immediate_runs,
        }
    }

    fn aria_state(&self, element: ElementRef<'_>, state: AriaState) -> Option<AriaStateValue> {
        let tag = tag_name(element);
        let role = self.role(element);
        let role = role.as_deref();
        match state {
            AriaState::Checked => {
                if tag == "input"
                    && matches!(attr(element, "type").map(|t| t.to_ascii_lowercase()).as_deref(), Some("checkbox" | "radio"))
                {
                    if attr(element, "indeterminate").is_some() {
                        return Some(AriaStateValue::Mixed);
                    }
                    return Some(AriaStateValue::Bool(attr(element, "checked").is_some()));
                }
                if matches!(
                    role,
                    Some("checkbox" | "radio" | "switch" | "menuitemcheckbox" | "menuitemradio" | "option" | "treeitem")
                ) {
                    return Some(parse_tristate(attr(element, "aria-checked")).unwrap_or(AriaStateValue::Bool(false)));
                }
                None
            }
            AriaState::Pressed => {
                if role == Some("button") {
                    return Some(parse_tristate(attr(element, "aria-pressed")).unwrap_or(AriaStateValue::Bool(false)));
                }
                None
            }
            AriaState::Selected => {
                if tag == "option" {
                    return Some(AriaStateValue::Bool(attr(element, "selected").is_some()));
                }
                if matches!(role, Some("gridcell" | "option" | "row" | "tab" | "columnheader" | "rowheader" | "treeitem")) {
                    return Some(AriaStateValue::Bool(attr(element, "aria-selected") == Some("true")));
                }
                None
            }
            AriaState::Expanded => parse_tristate(attr(element, "aria-expanded")).filter(|v| *v != AriaStateValue::Mixed),
            AriaState::Disabled => {
                let native_disabled = |el: ElementRef<'_>| {
                    matches!(
                        el.value().name(),
                        "button" | "input" | "select" | "textarea" | "option" | "optgroup" | "fieldset"
                    ) && attr(el, "disabled").is_some()
                };
                let mut current = Some(element);
                while let Some(el) = current {
                    if native_disabled(el) || attr(el, "aria-disabled") == Some("true") {
                        return Some(AriaStateValue::Bool(true));
                    }
                    current = self.links.parent_element(el);
                }
                Some(AriaStateValue::Bool(false))
            }
            AriaState::Level => {
                if let Some(level) = attr(element, "aria-level").and_then(|l| l.trim().parse::<u32>().ok()) {
                    return Some(AriaStateValue::Number(level));
                }
                match tag.as_str() {
                    "h1" => Some(AriaStateValue::Number(1)),
                    "h2" => Some(AriaStateValue::Number(2)),
                    "h3" => Some(AriaStateValue::Number(3)),
                    "h4" => Some(AriaStateValue::Number(4)),
                    "h5" => Some(AriaStateValue::Number(5)),
                    "h6" => Some(AriaStateValue::Number(6)),
                    _ => None,
                }
            }
        }
    }
}

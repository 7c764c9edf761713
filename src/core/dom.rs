use ego_tree::NodeId;
use scraper::ElementRef;
use std::collections::HashSet;

/// Capabilities the selector generator consumes from the DOM.
///
/// Role, name, text and visibility computation are treated as external
/// collaborators. The default implementation works over a static
/// [`scraper::Html`] document, see [`HtmlCapabilities`](crate::dom::HtmlCapabilities);
/// hosts with a live accessibility tree can provide their own.
pub trait DomCapabilities {
    /// ARIA role of the element, `None` when it has no role.
    fn role(&self, element: ElementRef<'_>) -> Option<String>;

    /// Whether the element is excluded from the accessibility tree.
    fn is_hidden(&self, element: ElementRef<'_>) -> bool;

    /// Accessible name plus the elements whose text was used to build it.
    fn accessible_name(&self, element: ElementRef<'_>, include_hidden: bool) -> AccessibleName;

    /// Normalized text of the element and of its own direct text runs.
    fn element_text(&self, element: ElementRef<'_>) -> ElementText;

    /// ARIA state used by the role matcher.
    fn aria_state(&self, element: ElementRef<'_>, state: AriaState) -> Option<AriaStateValue>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessibleName {
    pub name: String,
    pub provenance: HashSet<NodeId>,
}

impl AccessibleName {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementText {
    pub full: String,
    pub immediate_runs: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AriaState {
    Checked,
    Pressed,
    Selected,
    Expanded,
    Disabled,
    Level,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AriaStateValue {
    Bool(bool),
    Mixed,
    Number(u32),
}

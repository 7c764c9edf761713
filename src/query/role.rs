use super::attributes::{parse_attribute_groups, AttributeGroup, AttributeValue};
use crate::core::{AriaState, AriaStateValue};
use crate::dom::text::normalize_whitespace;
use crate::errors::{Result, SelectorError};
use crate::generator::index::ElementIndex;
use ego_tree::NodeId;

const ALLOWED_ATTRIBUTES: &str = "name, checked, pressed, selected, expanded, disabled, include-hidden, level";

/// Accessible name condition of a role query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameMatcher {
    pub value: String,
    pub exact: bool,
}

impl NameMatcher {
    pub fn matches(&self, name: &str) -> bool {
        if self.exact {
            normalize_whitespace(name) == self.value
        } else {
            name.to_lowercase().contains(&self.value.to_lowercase())
        }
    }
}

/// Parsed `internal:role=` segment, e.g. `button[name="Save"i][pressed=true]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleSelector {
    pub role: String,
    pub name: Option<NameMatcher>,
    pub checked: Option<AriaStateValue>,
    pub pressed: Option<AriaStateValue>,
    pub selected: Option<bool>,
    pub expanded: Option<bool>,
    pub disabled: Option<bool>,
    pub include_hidden: bool,
    pub level: Option<u32>,
}

pub fn parse_role_selector(body: &str) -> Result<RoleSelector> {
    let body = body.trim();
    let split = body.find('[').unwrap_or(body.len());
    let role = body[..split].trim();
    if role.is_empty() || !role.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(SelectorError::invalid_selector(body, "role name expected"));
    }

    let mut selector = RoleSelector {
        role: role.to_ascii_lowercase(),
        ..Default::default()
    };

    for group in parse_attribute_groups(&body[split..])? {
        if let Some(operator) = group.operator.as_deref() {
            if operator != "=" {
                return Err(SelectorError::UnsupportedOperator {
                    operator: operator.to_string(),
                    attribute: group.name.clone(),
                });
            }
        }
        match group.name.as_str() {
            "name" => selector.name = Some(name_matcher(&group)?),
            "checked" => selector.checked = Some(tristate(&group)?),
            "pressed" => selector.pressed = Some(tristate(&group)?),
            "selected" => selector.selected = Some(boolean(&group)?),
            "expanded" => selector.expanded = Some(boolean(&group)?),
            "disabled" => selector.disabled = Some(boolean(&group)?),
            "include-hidden" => selector.include_hidden = boolean(&group)?,
            "level" => selector.level = Some(level(&group)?),
            other => {
                return Err(SelectorError::UnknownAttribute {
                    attribute: other.to_string(),
                    allowed: ALLOWED_ATTRIBUTES.to_string(),
                })
            }
        }
    }
    Ok(selector)
}

fn invalid(group: &AttributeGroup, expected: &str) -> SelectorError {
    SelectorError::InvalidAttributeValue {
        attribute: group.name.clone(),
        expected: expected.to_string(),
    }
}

fn name_matcher(group: &AttributeGroup) -> Result<NameMatcher> {
    match &group.value {
        Some(AttributeValue::Quoted { value, case_sensitive }) => Ok(NameMatcher {
            value: normalize_whitespace(value),
            exact: case_sensitive.unwrap_or(false),
        }),
        _ => Err(invalid(group, "a string")),
    }
}

fn boolean(group: &AttributeGroup) -> Result<bool> {
    match &group.value {
        // A bare `[disabled]` reads as `[disabled=true]`.
        None => Ok(true),
        Some(AttributeValue::Bare(raw)) if raw == "true" => Ok(true),
        Some(AttributeValue::Bare(raw)) if raw == "false" => Ok(false),
        _ => Err(invalid(group, "true or false")),
    }
}

fn tristate(group: &AttributeGroup) -> Result<AriaStateValue> {
    match &group.value {
        Some(AttributeValue::Quoted { value, .. }) if value == "mixed" => Ok(AriaStateValue::Mixed),
        _ => boolean(group)
            .map(AriaStateValue::Bool)
            .map_err(|_| invalid(group, "true, false or \"mixed\"")),
    }
}

fn level(group: &AttributeGroup) -> Result<u32> {
    match &group.value {
        Some(AttributeValue::Bare(raw)) => raw.parse::<u32>().map_err(|_| invalid(group, "a number")),
        _ => Err(invalid(group, "a number")),
    }
}

impl RoleSelector {
    pub fn matches(&self, index: &ElementIndex<'_>, id: NodeId) -> bool {
        if index.role(id).as_deref() != Some(self.role.as_str()) {
            return false;
        }
        if !self.include_hidden && index.is_hidden(id) {
            return false;
        }
        if let Some(name) = &self.name {
            if !name.matches(&index.accessible_name(id).name) {
                return false;
            }
        }
        let Some(element) = index.element(id) else {
            return false;
        };
        let caps = index.caps();
        let state_matches = |state: AriaState, expected: AriaStateValue| caps.aria_state(element, state) == Some(expected);

        if let Some(expected) = self.checked {
            if !state_matches(AriaState::Checked, expected) {
                return false;
            }
        }
        if let Some(expected) = self.pressed {
            if !state_matches(AriaState::Pressed, expected) {
                return false;
            }
        }
        if let Some(expected) = self.selected {
            if !state_matches(AriaState::Selected, AriaStateValue::Bool(expected)) {
                return false;
            }
        }
        if let Some(expected) = self.expanded {
            if !state_matches(AriaState::Expanded, AriaStateValue::Bool(expected)) {
                return false;
            }
        }
        if let Some(expected) = self.disabled {
            if !state_matches(AriaState::Disabled, AriaStateValue::Bool(expected)) {
                return false;
            }
        }
        if let Some(expected) = self.level {
            if !state_matches(AriaState::Level, AriaStateValue::Number(expected)) {
                return false;
            }
        }
        true
    }
}

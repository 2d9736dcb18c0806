//! Action name derivation from a click target
//!
//! An explicit `data-dd-action-name` anywhere up the tree wins. Otherwise the
//! element and its ancestors are searched for a label-like attribute, then for
//! text content.

use std::collections::BTreeMap;

use serde::Deserialize;

/// Attribute holding a name chosen by the page author
pub const ACTION_NAME_ATTRIBUTE: &str = "data-dd-action-name";

const MAX_PARENTS_TO_CONSIDER: usize = 10;
const MAX_NAME_LENGTH: usize = 100;
const TRUNCATION_SUFFIX: &str = " [...]";

/// The slice of a DOM element name derivation looks at
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Element {
    /// Lowercase tag name
    pub tag: String,
    pub attributes: BTreeMap<String, String>,
    /// Text content, descendants included
    pub text: String,
    pub parent: Option<Box<Element>>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_lowercase(),
            ..Self::default()
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_parent(mut self, parent: Element) -> Self {
        self.parent = Some(Box::new(parent));
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// The element itself, then each ancestor up to the root
    pub fn self_and_ancestors(&self) -> impl Iterator<Item = &Element> {
        std::iter::successors(Some(self), |element| element.parent.as_deref())
    }

    fn is_document_boundary(&self) -> bool {
        matches!(self.tag.as_str(), "body" | "html" | "head")
    }

    fn is_button_like_input(&self) -> bool {
        self.tag == "input" && matches!(self.attribute("type"), Some("button" | "submit" | "reset"))
    }
}

type Strategy = fn(&Element) -> Option<&str>;

const PRIORITY_STRATEGIES: [Strategy; 6] = [aria_label, button_value, alt, title, placeholder, name_attribute];

const FALLBACK_STRATEGIES: [Strategy; 1] = [text_content];

fn aria_label(element: &Element) -> Option<&str> {
    element.attribute("aria-label")
}

fn button_value(element: &Element) -> Option<&str> {
    if element.is_button_like_input() {
        element.attribute("value")
    } else {
        None
    }
}

fn alt(element: &Element) -> Option<&str> {
    element.attribute("alt")
}

fn title(element: &Element) -> Option<&str> {
    element.attribute("title")
}

fn placeholder(element: &Element) -> Option<&str> {
    element.attribute("placeholder")
}

fn name_attribute(element: &Element) -> Option<&str> {
    element.attribute("name")
}

fn text_content(element: &Element) -> Option<&str> {
    Some(element.text.as_str())
}

/// Name for a click on `element`, or `None` when nothing usable is found
pub fn get_action_name_from_element(element: &Element) -> Option<String> {
    programmatic_name(element)
        .or_else(|| name_for_strategies(element, &PRIORITY_STRATEGIES))
        .or_else(|| name_for_strategies(element, &FALLBACK_STRATEGIES))
}

fn programmatic_name(element: &Element) -> Option<String> {
    element
        .self_and_ancestors()
        .find_map(|candidate| normalize(candidate.attribute(ACTION_NAME_ATTRIBUTE)?))
}

fn name_for_strategies(target: &Element, strategies: &[Strategy]) -> Option<String> {
    for element in target.self_and_ancestors().take(MAX_PARENTS_TO_CONSIDER + 1) {
        if element.is_document_boundary() {
            break;
        }
        if let Some(name) = strategies.iter().find_map(|strategy| normalize(strategy(element)?)) {
            return Some(name);
        }
        if element.tag == "form" {
            break;
        }
    }
    None
}

/// Collapse whitespace and cap the length; empty names are no names
fn normalize(raw: &str) -> Option<String> {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return None;
    }
    if collapsed.chars().count() > MAX_NAME_LENGTH {
        let kept: String = collapsed.chars().take(MAX_NAME_LENGTH).collect();
        return Some(format!("{}{}", kept, TRUNCATION_SUFFIX));
    }
    Some(collapsed)
}

//! UI element handles
//!
//! The core never touches a live DOM. Hosts implement [`Element`] for whatever
//! handle they have; [`ElementSnapshot`] is an owned, serializable
//! implementation used by the CLI and by tests.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Read-only view of a DOM-like element.
pub trait Element: Sized {
    /// Lower-case tag name, e.g. `button`.
    fn tag_name(&self) -> String;

    fn id(&self) -> Option<String>;

    fn attribute(&self, name: &str) -> Option<String>;

    /// Dataset lookup: `data_attribute("testid")` reads `data-testid`.
    fn data_attribute(&self, key: &str) -> Option<String> {
        self.attribute(&format!("data-{}", key))
    }

    fn class_names(&self) -> Vec<String>;

    /// Visible text content, untrimmed.
    fn text_content(&self) -> Option<String>;

    fn parent(&self) -> Option<Self>;

    /// Position among the parent's element children.
    fn sibling_position(&self) -> Option<SiblingPosition>;

    /// Document root elements end structural paths.
    fn is_document_root(&self) -> bool {
        matches!(self.tag_name().as_str(), "html" | "body")
    }

    fn input_type(&self) -> Option<String> {
        self.attribute("type").map(|t| t.to_ascii_lowercase())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiblingPosition {
    /// 1-based `nth-child` index.
    pub index: usize,
    /// True when another sibling has the same tag.
    pub shares_tag: bool,
}

/// Component name and ancestor chain (most distant first).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentInfo {
    pub name: String,
    #[serde(default)]
    pub path: Vec<String>,
}

/// External component-name lookup, e.g. a React fiber walker.
pub trait ComponentResolver<E> {
    fn resolve(&self, element: &E) -> Option<ComponentInfo>;
}

impl<E, F> ComponentResolver<E> for F
where
    F: Fn(&E) -> Option<ComponentInfo>,
{
    fn resolve(&self, element: &E) -> Option<ComponentInfo> {
        self(element)
    }
}

/// Owned element description with its ancestor chain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementSnapshot {
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub classes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<SiblingPosition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<Box<ElementSnapshot>>,
    /// Component hint recorded by the producer, see [`EmbeddedComponents`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<ComponentInfo>,
}

impl ElementSnapshot {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_ascii_lowercase(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn at(mut self, index: usize, shares_tag: bool) -> Self {
        self.position = Some(SiblingPosition { index, shares_tag });
        self
    }

    pub fn within(mut self, parent: ElementSnapshot) -> Self {
        self.parent = Some(Box::new(parent));
        self
    }

    pub fn with_component(mut self, component: ComponentInfo) -> Self {
        self.component = Some(component);
        self
    }
}

impl Element for ElementSnapshot {
    fn tag_name(&self) -> String {
        self.tag.to_ascii_lowercase()
    }

    fn id(&self) -> Option<String> {
        self.id.clone().filter(|id| !id.is_empty())
    }

    fn attribute(&self, name: &str) -> Option<String> {
        match name {
            "id" => self.id(),
            "class" if !self.classes.is_empty() => Some(self.classes.join(" ")),
            _ => self.attributes.get(name).cloned(),
        }
    }

    fn class_names(&self) -> Vec<String> {
        self.classes
            .iter()
            .flat_map(|c| c.split_whitespace())
            .map(str::to_string)
            .collect()
    }

    fn text_content(&self) -> Option<String> {
        self.text.clone()
    }

    fn parent(&self) -> Option<Self> {
        self.parent.as_deref().cloned()
    }

    fn sibling_position(&self) -> Option<SiblingPosition> {
        self.position
    }
}

/// Reads the component hint carried inside an [`ElementSnapshot`].
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedComponents;

impl ComponentResolver<ElementSnapshot> for EmbeddedComponents {
    fn resolve(&self, element: &ElementSnapshot) -> Option<ComponentInfo> {
        element.component.clone()
    }
}

//! Human-readable element identifiers
//!
//! Rules are tried in priority order and the first match wins:
//! id, test data attributes, visible text of interactive tags, aria-label,
//! name, first two classes, then a structural path.

use crate::element::{ComponentInfo, ComponentResolver, Element};
use serde::{Deserialize, Serialize};

/// Longest visible text or aria-label kept in an identifier.
pub const MAX_TEXT_LEN: usize = 30;
/// Ancestor levels walked by the structural fallback.
pub const MAX_PATH_DEPTH: usize = 5;
/// Entries kept from a component ancestor chain.
pub const MAX_COMPONENT_PATH: usize = 5;

const TEST_DATASET_KEYS: &[&str] = &["testid", "component", "test", "cy"];
const TEXT_TAGS: &[&str] = &["button", "a", "label"];

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementIdentity {
    pub identifier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component_path: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Truncate to `max` characters.
pub fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Resolve an identifier and, when enabled, attach component metadata.
pub fn identify<E, R>(element: &E, resolve_components: bool, resolver: Option<&R>) -> ElementIdentity
where
    E: Element,
    R: ComponentResolver<E> + ?Sized,
{
    let mut identity = identifier_for(element);

    if resolve_components {
        if let Some(info) = resolver.and_then(|r| r.resolve(element)) {
            let path = normalize_component_path(&info);
            identity.component = Some(info.name);
            if !path.is_empty() {
                identity.component_path = Some(path);
            }
        }
    }

    identity
}

/// Deduplicate (first occurrence wins) and keep the nearest entries.
pub fn normalize_component_path(info: &ComponentInfo) -> Vec<String> {
    let mut path: Vec<String> = Vec::with_capacity(info.path.len());
    for name in &info.path {
        if !name.is_empty() && !path.contains(name) {
            path.push(name.clone());
        }
    }
    if path.len() > MAX_COMPONENT_PATH {
        path.drain(..path.len() - MAX_COMPONENT_PATH);
    }
    path
}

fn identifier_for<E: Element>(element: &E) -> ElementIdentity {
    let tag = element.tag_name();
    let id_only = |identifier: String| ElementIdentity {
        identifier,
        ..Default::default()
    };

    if let Some(id) = element.id() {
        return id_only(format!("{}#{}", tag, id));
    }

    for key in TEST_DATASET_KEYS {
        if let Some(value) = element.data_attribute(key).filter(|v| !v.is_empty()) {
            return id_only(format!("{}[data-{}=\"{}\"]", tag, key, value));
        }
    }
    if let Some(value) = element.attribute("data-testid").filter(|v| !v.is_empty()) {
        return id_only(format!("{}[data-testid=\"{}\"]", tag, value));
    }

    if TEXT_TAGS.contains(&tag.as_str()) {
        let text = element
            .text_content()
            .map(|t| truncate_chars(t.trim(), MAX_TEXT_LEN))
            .unwrap_or_default();
        if !text.is_empty() {
            return ElementIdentity {
                identifier: format!("{} \"{}\"", tag, text),
                text: Some(text),
                ..Default::default()
            };
        }
    }

    if let Some(label) = element.attribute("aria-label").filter(|v| !v.is_empty()) {
        return id_only(format!(
            "{}[aria-label=\"{}\"]",
            tag,
            truncate_chars(&label, MAX_TEXT_LEN)
        ));
    }

    if let Some(name) = element.attribute("name").filter(|v| !v.is_empty()) {
        return id_only(format!("{}[name=\"{}\"]", tag, name));
    }

    let classes = element.class_names();
    if !classes.is_empty() {
        let joined = classes.iter().take(2).map(String::as_str).collect::<Vec<_>>().join(".");
        return id_only(format!("{}.{}", tag, joined));
    }

    id_only(structural_path(element))
}

/// `tag > tag:nth-child(k) > ...` from the nearest id'd ancestor (or the
/// document root) down to `element`.
pub fn structural_path<E: Element>(element: &E) -> String {
    let mut segments = vec![segment(element)];
    let mut current = element.parent();

    while let Some(node) = current {
        if node.is_document_root() || segments.len() >= MAX_PATH_DEPTH {
            break;
        }
        if let Some(id) = node.id() {
            segments.push(format!("#{}", id));
            break;
        }
        segments.push(segment(&node));
        current = node.parent();
    }

    segments.reverse();
    segments.join(" > ")
}

fn segment<E: Element>(element: &E) -> String {
    let tag = element.tag_name();
    match element.sibling_position() {
        Some(pos) if pos.shares_tag => format!("{}:nth-child({})", tag, pos.index),
        _ => tag,
    }
}

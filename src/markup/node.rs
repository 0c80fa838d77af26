//! Node tree model.
//!
//! Nodes are reference-counted and never mutated once built. A stage that
//! needs a different element clones it shallowly (children stay shared) and
//! swaps in the new pieces, so the same subtree can be inserted or expanded
//! many times without interference.

use super::hook::RenderHook;
use compact_str::CompactString;
use smallvec::SmallVec;
use std::{fmt, sync::Arc};

/// HTML elements that never have content.
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

#[inline]
pub fn is_void(tag: &str) -> bool {
    VOID_ELEMENTS.iter().any(|v| v.eq_ignore_ascii_case(tag))
}

#[derive(Clone)]
pub enum Node {
    /// Markup text, stored exactly as written (entities stay escaped).
    Text(Arc<str>),
    Tag(Arc<Element>),
}

impl Node {
    pub fn text(text: impl Into<Arc<str>>) -> Self {
        Self::Text(text.into())
    }

    pub fn element(element: Element) -> Self {
        Self::Tag(Arc::new(element))
    }

    /// Transparent node grouping `content` without a wrapping tag.
    pub fn group(content: Vec<Node>) -> Self {
        Self::element(Element::transparent(content))
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Self::Tag(element) => Some(element),
            Self::Text(_) => None,
        }
    }

    /// True for a tag node named `tag` (ASCII case-insensitive).
    pub fn is(&self, tag: &str) -> bool {
        self.as_element().is_some_and(|el| el.is(tag))
    }
}

/// Attribute value: literal text, or text with `{{ }}` segments that the
/// element's render hook resolves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrValue {
    Text(String),
    Template(String),
}

impl AttrValue {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Text(s) | Self::Template(s) => s,
        }
    }
}

pub type Attrs = SmallVec<[(CompactString, AttrValue); 4]>;

#[derive(Clone, Default)]
pub struct Element {
    /// `None` marks a transparent grouping node.
    pub tag: Option<CompactString>,
    pub attrs: Attrs,
    /// `None` means no children at all (`<x />`), distinct from `Some(vec![])`.
    pub content: Option<Vec<Node>>,
    pub hook: Option<RenderHook>,
}

impl Element {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: Some(tag.into()),
            ..Self::default()
        }
    }

    pub fn transparent(content: Vec<Node>) -> Self {
        Self {
            content: Some(content),
            ..Self::default()
        }
    }

    pub fn is(&self, tag: &str) -> bool {
        self.tag.as_deref().is_some_and(|t| t.eq_ignore_ascii_case(tag))
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attr(name).is_some()
    }

    /// Set a literal attribute, replacing any existing value in place.
    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = AttrValue::Text(value.into());
        match self.attrs.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(name)) {
            Some((_, slot)) => *slot = value,
            None => self.attrs.push((name.into(), value)),
        }
    }

    pub fn remove_attr(&mut self, name: &str) -> Option<AttrValue> {
        let index = self.attrs.iter().position(|(k, _)| k.eq_ignore_ascii_case(name))?;
        Some(self.attrs.remove(index).1)
    }

    /// Shallow copy carrying `content` instead of the current children.
    pub fn with_content(&self, content: Vec<Node>) -> Self {
        Self {
            tag: self.tag.clone(),
            attrs: self.attrs.clone(),
            content: Some(content),
            hook: self.hook.clone(),
        }
    }

    pub fn children(&self) -> &[Node] {
        self.content.as_deref().unwrap_or_default()
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => write!(f, "{text:?}"),
            Self::Tag(element) => fmt::Debug::fmt(element, f),
        }
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("tag", &self.tag)
            .field("attrs", &self.attrs)
            .field("content", &self.content)
            .field("hook", &self.hook.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

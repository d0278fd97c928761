//! Attributed tree nodes.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use text_size::TextSize;

use crate::base::{Loc, SourceId};

/// A single attribute: its text and the byte offset it came from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attr {
    pub value: SmolStr,
    pub offset: TextSize,
}

impl Attr {
    pub fn new(value: impl Into<SmolStr>) -> Self {
        Self {
            value: value.into(),
            offset: TextSize::new(0),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }
}

/// A node of the input tree.
///
/// Every node exposes a flat attribute map (always including the `category`
/// discriminator), named ordered child sequences, and the byte offset of the
/// construct it was parsed from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Element {
    attrs: IndexMap<SmolStr, Attr>,
    children: IndexMap<SmolStr, Vec<Element>>,
    offset: TextSize,
}

impl Element {
    pub fn new(category: &str) -> Self {
        let mut attrs = IndexMap::new();
        attrs.insert(SmolStr::new("category"), Attr::new(category));
        Self {
            attrs,
            children: IndexMap::new(),
            offset: TextSize::new(0),
        }
    }

    /// The `category` discriminator; present on every well-formed node.
    pub fn category(&self) -> &str {
        self.attr_value("category").unwrap_or("")
    }

    pub fn attr(&self, name: &str) -> Option<&Attr> {
        self.attrs.get(name)
    }

    pub fn attr_value(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(|a| a.value.as_str())
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attrs.contains_key(name)
    }

    pub fn set_attr(&mut self, name: &str, value: impl Into<SmolStr>) {
        self.attrs.insert(SmolStr::new(name), Attr::new(value));
    }

    pub fn set_attr_at(&mut self, name: &str, value: impl Into<SmolStr>, offset: TextSize) {
        self.attrs.insert(
            SmolStr::new(name),
            Attr {
                value: value.into(),
                offset,
            },
        );
    }

    /// The named child sequence, empty if absent.
    pub fn children(&self, group: &str) -> &[Element] {
        self.children.get(group).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_children(&self, group: &str) -> bool {
        self.children.get(group).is_some_and(|c| !c.is_empty())
    }

    pub fn child_groups(&self) -> impl Iterator<Item = &str> {
        self.children.keys().map(SmolStr::as_str)
    }

    /// Mutable access to the most recently pushed child of a group.
    pub fn last_child_mut(&mut self, group: &str) -> Option<&mut Element> {
        self.children.get_mut(group).and_then(|c| c.last_mut())
    }

    pub fn push_child(&mut self, group: &str, child: Element) {
        self.children
            .entry(SmolStr::new(group))
            .or_default()
            .push(child);
    }

    pub fn offset(&self) -> TextSize {
        self.offset
    }

    pub fn set_offset(&mut self, offset: TextSize) {
        self.offset = offset;
    }

    /// Location of this node within `source`.
    pub fn loc(&self, source: Option<SourceId>) -> Loc {
        Loc {
            source,
            offset: self.offset,
        }
    }
}

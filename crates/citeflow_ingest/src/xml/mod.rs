//! Owned element tree for a single record.
//!
//! The walker materializes exactly one record subtree at a time as an
//! [`Element`]; nothing outside the current record is ever kept.

mod path;

pub use path::{resolve, ElementPath};

use crate::error::WalkError;

/// A child of an element: either a nested element or a run of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
}

/// An XML element with its attributes and children, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Parse a standalone XML fragment with a single root element.
    pub fn parse(xml: &str) -> Result<Self, WalkError> {
        crate::walker::parse_element(xml.as_bytes())
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(name, value);
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.push_child(child);
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.push_text(text);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attribute value by name. Later duplicates replace earlier ones.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn nodes(&self) -> &[Node] {
        &self.children
    }

    /// Child elements in document order (text runs skipped).
    pub fn children(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(el) => Some(el),
            Node::Text(_) => None,
        })
    }

    /// All text contained in this element and its descendants, trimmed.
    ///
    /// `<div>Text <em>inside</em> tag</div>` yields `"Text inside tag"`.
    pub fn joined_text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out.trim().to_string()
    }

    /// [`Element::joined_text`] with interior whitespace runs collapsed to
    /// single spaces.
    pub fn normalized_text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// Number of elements in this subtree, including `self`.
    pub fn element_count(&self) -> usize {
        1 + self.children().map(Element::element_count).sum::<usize>()
    }

    pub(crate) fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(key, _)| *key == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name, value)),
        }
    }

    pub(crate) fn push_child(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    /// Append text, merging with a directly preceding text run.
    pub(crate) fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(Node::Text(last)) = self.children.last_mut() {
            last.push_str(text);
        } else {
            self.children.push(Node::Text(text.to_string()));
        }
    }

    fn collect_text(&self, out: &mut String) {
        for node in &self.children {
            match node {
                Node::Text(text) => out.push_str(text),
                Node::Element(el) => el.collect_text(out),
            }
        }
    }
}

/// Incremental builder fed by parse events; holds only the open-element chain
/// of the subtree under construction.
#[derive(Debug, Default)]
pub(crate) struct TreeBuilder {
    stack: Vec<Element>,
    live: usize,
}

impl TreeBuilder {
    pub(crate) fn open(&mut self, element: Element) {
        self.stack.push(element);
        self.live += 1;
    }

    pub(crate) fn text(&mut self, text: &str) {
        if let Some(top) = self.stack.last_mut() {
            top.push_text(text);
        }
    }

    /// Close the innermost open element. Returns the root once it closes.
    pub(crate) fn close(&mut self) -> Option<Element> {
        let done = self.stack.pop()?;
        match self.stack.last_mut() {
            Some(parent) => {
                parent.push_child(done);
                None
            }
            None => {
                self.live = 0;
                Some(done)
            }
        }
    }

    pub(crate) fn is_building(&self) -> bool {
        !self.stack.is_empty()
    }

    /// Elements materialized for the subtree under construction.
    pub(crate) fn live_elements(&self) -> usize {
        self.live
    }
}

//! Metadata nodes: item and content metadata, and opaque block embeds.

use serde::Serialize;

use super::NodeId;
use crate::schema::{ElementSchema, MetaKind};
use crate::xml::{local_name, new_node, XmlContent, XmlElement, XmlNode, XmlNodeRef};

/// One metadata element with everything needed to write it back unchanged.
///
/// Attributes keep their document order and `content` keeps the mixed
/// children of the element, including the whitespace between them, so a node
/// the application never touches re-serializes byte for byte.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataNode {
    pub id: NodeId,
    pub kind: MetaKind,
    pub tag: String,
    pub attributes: Vec<(String, String)>,
    pub content: Vec<MetaContent>,
    #[serde(skip)]
    pub self_closing: bool,
}

/// A child of a metadata element.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "node", content = "value")]
pub enum MetaContent {
    Element(MetadataNode),
    Text(String),
    CData(String),
    Comment(String),
    Instruction(String),
}

impl MetaContent {
    fn is_whitespace(&self) -> bool {
        matches!(self, MetaContent::Text(t) if t.chars().all(char::is_whitespace))
    }
}

impl MetadataNode {
    /// Creates an empty element.
    pub fn new(id: impl Into<NodeId>, tag: impl Into<String>) -> Self {
        let tag = tag.into();
        MetadataNode {
            id: id.into(),
            kind: MetaKind::from_tag(&tag),
            tag,
            attributes: Vec::new(),
            content: Vec::new(),
            self_closing: true,
        }
    }

    /// Converts an XML element and its subtree.
    ///
    /// `alloc` receives each element's tag and `id` attribute and returns the
    /// node id to use. Returns `None` for non-element nodes.
    pub fn from_xml(
        node: &XmlNodeRef,
        alloc: &mut dyn FnMut(&str, Option<&str>) -> NodeId,
    ) -> Option<Self> {
        let borrowed = node.borrow();
        let element = borrowed.element()?;
        let id = alloc(element.qname(), element.attribute("id"));
        let mut meta = MetadataNode {
            id,
            kind: MetaKind::from_tag(element.qname()),
            tag: element.qname().to_string(),
            attributes: element.attributes().to_vec(),
            content: Vec::with_capacity(borrowed.child_count()),
            self_closing: element.is_self_closing(),
        };
        for child in borrowed.children() {
            let item = match child.borrow().content() {
                XmlContent::Element(_) => None,
                XmlContent::Text(t) => Some(MetaContent::Text(t.clone())),
                XmlContent::CData(t) => Some(MetaContent::CData(t.clone())),
                XmlContent::Comment(t) => Some(MetaContent::Comment(t.clone())),
                XmlContent::ProcessingInstruction(t) => Some(MetaContent::Instruction(t.clone())),
                XmlContent::Declaration(_) | XmlContent::DocType(_) => continue,
            };
            match item {
                Some(item) => meta.content.push(item),
                None => {
                    if let Some(nested) = MetadataNode::from_xml(child, alloc) {
                        meta.content.push(MetaContent::Element(nested));
                    }
                }
            }
        }
        Some(meta)
    }

    /// Builds a detached XML element for this node.
    pub fn to_xml(&self) -> XmlNodeRef {
        let mut element = XmlElement::with_attributes(self.tag.clone(), self.attributes.clone());
        element.set_self_closing(self.self_closing);
        let node = new_node(XmlContent::Element(element));
        for item in &self.content {
            let child = match item {
                MetaContent::Element(e) => e.to_xml(),
                MetaContent::Text(t) => new_node(XmlContent::Text(t.clone())),
                MetaContent::CData(t) => new_node(XmlContent::CData(t.clone())),
                MetaContent::Comment(t) => new_node(XmlContent::Comment(t.clone())),
                MetaContent::Instruction(t) => {
                    new_node(XmlContent::ProcessingInstruction(t.clone()))
                }
            };
            XmlNode::add_child_to_ref(&node, child);
        }
        node
    }

    /// The schema entry for this node's kind.
    pub fn schema(&self) -> &'static ElementSchema {
        self.kind.schema()
    }

    /// The tag without namespace prefix.
    pub fn local_tag(&self) -> &str {
        local_name(&self.tag)
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Sets an attribute, keeping its position if it already exists.
    pub fn set_attribute(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| k == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name.to_string(), value)),
        }
    }

    pub fn remove_attribute(&mut self, name: &str) -> Option<String> {
        let pos = self.attributes.iter().position(|(k, _)| k == name)?;
        Some(self.attributes.remove(pos).1)
    }

    /// Concatenated direct text and CDATA content.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|c| match c {
                MetaContent::Text(t) | MetaContent::CData(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Replaces all content with a single text node.
    pub fn set_text(&mut self, text: &str) {
        self.content.clear();
        if !text.is_empty() {
            self.content.push(MetaContent::Text(text.to_string()));
        }
    }

    /// Iterates over child elements.
    pub fn elements(&self) -> impl Iterator<Item = &MetadataNode> {
        self.content.iter().filter_map(|c| match c {
            MetaContent::Element(e) => Some(e),
            _ => None,
        })
    }

    /// Iterates mutably over child elements.
    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut MetadataNode> {
        self.content.iter_mut().filter_map(|c| match c {
            MetaContent::Element(e) => Some(e),
            _ => None,
        })
    }

    pub fn element_count(&self) -> usize {
        self.elements().count()
    }

    /// First child element with the given local name.
    pub fn child(&self, name: &str) -> Option<&MetadataNode> {
        self.elements().find(|e| e.local_tag() == name)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut MetadataNode> {
        self.elements_mut().find(|e| e.local_tag() == name)
    }

    /// Finds this node or a descendant by id.
    pub fn find(&self, id: &str) -> Option<&MetadataNode> {
        if self.id == id {
            return Some(self);
        }
        self.elements().find_map(|e| e.find(id))
    }

    /// Path of child element indices from this node to the descendant `id`.
    pub fn path_to(&self, id: &str) -> Option<Vec<usize>> {
        if self.id == id {
            return Some(Vec::new());
        }
        for (index, child) in self.elements().enumerate() {
            if let Some(mut rest) = child.path_to(id) {
                rest.insert(0, index);
                return Some(rest);
            }
        }
        None
    }

    /// Follows a path of child element indices.
    pub fn at_path(&self, path: &[usize]) -> Option<&MetadataNode> {
        match path.split_first() {
            None => Some(self),
            Some((first, rest)) => self.elements().nth(*first)?.at_path(rest),
        }
    }

    pub fn at_path_mut(&mut self, path: &[usize]) -> Option<&mut MetadataNode> {
        match path.split_first() {
            None => Some(self),
            Some((first, rest)) => self.elements_mut().nth(*first)?.at_path_mut(rest),
        }
    }

    /// Ids of this node and every descendant, in document order.
    pub fn collect_ids(&self, out: &mut Vec<NodeId>) {
        out.push(self.id.clone());
        for child in self.elements() {
            child.collect_ids(out);
        }
    }

    /// Index into `content` of the `index`-th child element.
    fn content_index(&self, index: usize) -> Option<usize> {
        self.content
            .iter()
            .enumerate()
            .filter(|(_, c)| matches!(c, MetaContent::Element(_)))
            .nth(index)
            .map(|(i, _)| i)
    }

    /// Inserts a child element at `index` among the element children.
    ///
    /// When the existing children are indented, the new element gets the same
    /// indentation. `index` is clamped to the number of element children.
    pub fn insert_element(&mut self, index: usize, node: MetadataNode) {
        let count = self.element_count();
        let index = index.min(count);
        self.self_closing = false;

        if index < count {
            let Some(pos) = self.content_index(index) else {
                return;
            };
            let indent = pos
                .checked_sub(1)
                .map(|p| &self.content[p])
                .filter(|c| c.is_whitespace())
                .cloned();
            if let Some(indent) = indent {
                self.content.insert(pos, indent);
            }
            self.content.insert(pos, MetaContent::Element(node));
            return;
        }

        match count.checked_sub(1).and_then(|last| self.content_index(last)) {
            Some(last_pos) => {
                let indent = last_pos
                    .checked_sub(1)
                    .map(|p| &self.content[p])
                    .filter(|c| c.is_whitespace())
                    .cloned();
                let mut at = last_pos + 1;
                if let Some(indent) = indent {
                    self.content.insert(at, indent);
                    at += 1;
                }
                self.content.insert(at, MetaContent::Element(node));
            }
            None => self.content.push(MetaContent::Element(node)),
        }
    }

    /// Removes the `index`-th child element together with the whitespace
    /// that indents it.
    pub fn remove_element(&mut self, index: usize) -> Option<MetadataNode> {
        let pos = self.content_index(index)?;
        let removed = match self.content.remove(pos) {
            MetaContent::Element(e) => e,
            _ => return None,
        };
        if pos > 0 && self.content[pos - 1].is_whitespace() {
            self.content.remove(pos - 1);
        }
        Some(removed)
    }

    /// Removes every child element matching `pred`, returning them.
    pub fn remove_elements_where(
        &mut self,
        pred: impl Fn(&MetadataNode) -> bool,
    ) -> Vec<MetadataNode> {
        let mut removed = Vec::new();
        let mut index = 0;
        while index < self.element_count() {
            let matched = self.elements().nth(index).is_some_and(&pred);
            if matched {
                if let Some(node) = self.remove_element(index) {
                    removed.push(node);
                }
            } else {
                index += 1;
            }
        }
        removed
    }
}

/// Inserts a node into an ordered top-level list.
pub(crate) fn insert_into_list(list: &mut Vec<MetadataNode>, index: usize, node: MetadataNode) {
    let index = index.min(list.len());
    list.insert(index, node);
}

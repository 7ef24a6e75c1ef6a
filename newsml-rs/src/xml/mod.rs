//! XML parsing, querying and output.
//!
//! This module is the only place the codec touches raw XML. It provides a
//! whitespace-preserving parser, a faithful printer, a mutable node tree and
//! a small selector engine, wrapped up in [`XmlDocument`].

mod content;
mod node;
mod parser;
mod printer;
mod selector;

pub use content::{local_name, XmlContent, XmlElement};
pub use node::{new_element, new_node, new_text, XmlNode, XmlNodeRef};
pub use parser::{parse_str, XmlParser};
pub use printer::{escape_attribute, escape_text, print_to_string, XmlPrinter};
pub use selector::Selector;

use crate::error::{Error, Result};

/// Name of the synthetic element holding the top-level nodes of a document.
pub const DOCUMENT_TAG: &str = "#document";

/// A parsed XML document.
///
/// The document owns a synthetic document node whose children are the
/// declaration, any top-level comments or processing instructions, the
/// whitespace between them and the root element.
#[derive(Debug)]
pub struct XmlDocument {
    document: XmlNodeRef,
}

impl XmlDocument {
    /// Parses a document from a string.
    pub fn parse(text: &str) -> Result<Self> {
        Ok(XmlDocument {
            document: parse_str(text)?,
        })
    }

    /// Returns the synthetic document node.
    pub fn document_node(&self) -> &XmlNodeRef {
        &self.document
    }

    /// Returns the root element.
    pub fn root(&self) -> Option<XmlNodeRef> {
        XmlNode::element_children(&self.document).into_iter().next()
    }

    /// Returns the first descendant of `node` matching `selector`.
    pub fn find(node: &XmlNodeRef, selector: &str) -> Result<Option<XmlNodeRef>> {
        Ok(Selector::parse(selector)?.find(node))
    }

    /// Returns every descendant of `node` matching `selector`.
    pub fn find_all(node: &XmlNodeRef, selector: &str) -> Result<Vec<XmlNodeRef>> {
        Ok(Selector::parse(selector)?.find_all(node))
    }

    /// Creates a detached element.
    pub fn create_element(tag: &str) -> XmlNodeRef {
        new_element(tag)
    }

    /// Creates a detached text node.
    pub fn create_text(text: &str) -> XmlNodeRef {
        new_text(text)
    }

    /// Returns the qualified tag of an element node.
    pub fn tag(node: &XmlNodeRef) -> Option<String> {
        node.borrow().element().map(|e| e.qname().to_string())
    }

    /// Returns an attribute value of an element node.
    pub fn attribute(node: &XmlNodeRef, name: &str) -> Option<String> {
        node.borrow()
            .element()
            .and_then(|e| e.attribute(name))
            .map(str::to_string)
    }

    /// Sets an attribute on an element node.
    pub fn set_attribute(node: &XmlNodeRef, name: &str, value: &str) -> Result<()> {
        let mut borrowed = node.borrow_mut();
        let element = borrowed
            .element_mut()
            .ok_or_else(|| Error::MalformedXml(format!("cannot set '{}' on a non-element", name)))?;
        element.set_attribute(name, value);
        Ok(())
    }

    /// Removes an attribute from an element node.
    pub fn remove_attribute(node: &XmlNodeRef, name: &str) -> Option<String> {
        node.borrow_mut()
            .element_mut()
            .and_then(|e| e.remove_attribute(name))
    }

    /// Appends `child` to `parent`, detaching it from any previous parent.
    pub fn append_child(parent: &XmlNodeRef, child: XmlNodeRef) {
        XmlNode::add_child_to_ref(parent, child);
    }

    /// Inserts `child` at `index` among the children of `parent`.
    pub fn insert_child(parent: &XmlNodeRef, index: usize, child: XmlNodeRef) {
        XmlNode::add_child_at_to_ref(parent, index, child);
    }

    /// Removes `child` from `parent`. Returns false if it was not a child.
    pub fn remove_child(parent: &XmlNodeRef, child: &XmlNodeRef) -> bool {
        let pos = {
            let borrowed = parent.borrow();
            borrowed
                .children()
                .iter()
                .position(|c| std::rc::Rc::ptr_eq(c, child))
        };
        match pos {
            Some(pos) => XmlNode::remove_child_to_ref(parent, pos).is_some(),
            None => false,
        }
    }

    /// Serializes the document.
    pub fn serialize(&self) -> Result<String> {
        Ok(print_to_string(&self.document)?)
    }

    /// Serializes a single node and its subtree.
    pub fn serialize_node(node: &XmlNodeRef) -> Result<String> {
        Ok(print_to_string(node)?)
    }

    /// Returns an independent copy of the whole document.
    pub fn deep_clone(&self) -> XmlDocument {
        XmlDocument {
            document: XmlNode::deep_clone(&self.document),
        }
    }
}

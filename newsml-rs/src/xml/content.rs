//! XML content types for tree nodes.
//!
//! `XmlContent` is the payload of one node in an [`XmlNodeRef`](super::XmlNodeRef)
//! tree: an element with its ordered attributes, or one of the character-level
//! node kinds the parser keeps so documents survive a parse/print cycle.

use std::fmt;

/// Represents the content of an XML node.
#[derive(Debug, Clone, PartialEq)]
pub enum XmlContent {
    /// An XML element with a qualified name and attributes.
    Element(XmlElement),
    /// Character data (already unescaped).
    Text(String),
    /// A `<![CDATA[...]]>` section.
    CData(String),
    /// A comment, without the `<!--` `-->` delimiters.
    Comment(String),
    /// A processing instruction, without the `<?` `?>` delimiters.
    ProcessingInstruction(String),
    /// The XML declaration, without the `<?` `?>` delimiters.
    Declaration(String),
    /// A `<!DOCTYPE ...>` declaration body.
    DocType(String),
}

impl XmlContent {
    /// Returns true if this is an element node.
    pub fn is_element(&self) -> bool {
        matches!(self, XmlContent::Element(_))
    }

    /// Returns true if this is a text node.
    pub fn is_text(&self) -> bool {
        matches!(self, XmlContent::Text(_))
    }

    /// Returns true for text nodes made only of whitespace.
    pub fn is_whitespace(&self) -> bool {
        match self {
            XmlContent::Text(t) => t.chars().all(char::is_whitespace),
            _ => false,
        }
    }

    /// Returns a reference to the element, if this is an element node.
    pub fn as_element(&self) -> Option<&XmlElement> {
        match self {
            XmlContent::Element(e) => Some(e),
            _ => None,
        }
    }

    /// Returns a mutable reference to the element, if this is an element node.
    pub fn as_element_mut(&mut self) -> Option<&mut XmlElement> {
        match self {
            XmlContent::Element(e) => Some(e),
            _ => None,
        }
    }

    /// Returns the text, if this is a text node.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            XmlContent::Text(t) => Some(t),
            _ => None,
        }
    }
}

/// An XML element with a qualified name and attributes.
///
/// Attributes keep their document order; namespace declarations are ordinary
/// `xmlns`/`xmlns:*` attributes so they print back where they were found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    /// The qualified name of the element (e.g., "group", "ns:element").
    name: String,
    /// Attributes as ordered (qualified name, value) pairs.
    attributes: Vec<(String, String)>,
    /// Whether an empty element prints as `<tag/>` rather than `<tag></tag>`.
    self_closing: bool,
}

impl XmlElement {
    /// Creates a new element with no attributes.
    pub fn new(name: impl Into<String>) -> Self {
        XmlElement {
            name: name.into(),
            attributes: Vec::new(),
            self_closing: true,
        }
    }

    /// Creates a new element with the given attributes.
    pub fn with_attributes(name: impl Into<String>, attributes: Vec<(String, String)>) -> Self {
        XmlElement {
            name: name.into(),
            attributes,
            self_closing: true,
        }
    }

    /// Returns the qualified name of the element.
    pub fn qname(&self) -> &str {
        &self.name
    }

    /// Returns the name without any namespace prefix.
    pub fn local_name(&self) -> &str {
        local_name(&self.name)
    }

    /// Returns the attributes in document order.
    pub fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }

    /// Returns the value of an attribute.
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

    /// Removes an attribute, returning its previous value.
    pub fn remove_attribute(&mut self, name: &str) -> Option<String> {
        let pos = self.attributes.iter().position(|(k, _)| k == name)?;
        Some(self.attributes.remove(pos).1)
    }

    /// Returns whether an empty element is written in self-closing form.
    pub fn is_self_closing(&self) -> bool {
        self.self_closing
    }

    /// Sets the form used when the element has no children.
    pub fn set_self_closing(&mut self, self_closing: bool) {
        self.self_closing = self_closing;
    }
}

impl fmt::Display for XmlElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}", self.name)?;
        for (k, v) in &self.attributes {
            write!(f, " {}=\"{}\"", k, v)?;
        }
        write!(f, ">")
    }
}

/// Strips the namespace prefix from a qualified name.
pub fn local_name(qname: &str) -> &str {
    match qname.rfind(':') {
        Some(pos) => &qname[pos + 1..],
        None => qname,
    }
}

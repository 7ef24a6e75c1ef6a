//! XML parser that builds node trees.
//!
//! This parser uses quick-xml's streaming API. Unlike a data-oriented parser
//! it keeps everything needed to print the document back unchanged:
//! whitespace text, comments, CDATA sections, processing instructions, the
//! declaration, attribute order and the self-closing form of empty elements.

use quick_xml::escape::{resolve_predefined_entity, unescape};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::content::{XmlContent, XmlElement};
use super::node::{new_node, XmlNode, XmlNodeRef};
use super::DOCUMENT_TAG;
use crate::error::{Error, Result};

/// XML parser that builds node trees.
#[derive(Debug, Default)]
pub struct XmlParser {
    _private: (),
}

impl XmlParser {
    /// Creates a new parser.
    pub fn new() -> Self {
        XmlParser { _private: () }
    }

    /// Parses XML from a string.
    ///
    /// Returns the synthetic document node whose children are the prolog
    /// nodes and the single root element.
    pub fn parse_str(&self, xml: &str) -> Result<XmlNodeRef> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text_start = false;
        reader.config_mut().trim_text_end = false;
        reader.config_mut().check_end_names = true;

        let document = new_node(XmlContent::Element(XmlElement::new(DOCUMENT_TAG)));
        let mut node_stack: Vec<XmlNodeRef> = vec![document.clone()];
        let mut pending_text: Option<String> = None;
        let mut seen_root = false;

        loop {
            let event = reader
                .read_event()
                .map_err(|e| malformed(&reader, format!("{}", e)))?;

            // Text may arrive split around entity references; anything else
            // closes the current run of character data.
            if !matches!(event, Event::Text(_) | Event::GeneralRef(_)) {
                flush_text(&mut pending_text, &node_stack)?;
            }

            match event {
                Event::Start(ref e) => {
                    if node_stack.len() == 1 {
                        if seen_root {
                            return Err(malformed(&reader, "multiple root elements"));
                        }
                        seen_root = true;
                    }
                    let mut element = self.parse_element(e)?;
                    element.set_self_closing(false);
                    let node = new_node(XmlContent::Element(element));
                    if let Some(parent) = node_stack.last() {
                        XmlNode::add_child_to_ref(parent, node.clone());
                    }
                    node_stack.push(node);
                }
                Event::End(_) => {
                    if node_stack.len() <= 1 {
                        return Err(malformed(&reader, "unmatched end tag"));
                    }
                    node_stack.pop();
                }
                Event::Empty(ref e) => {
                    if node_stack.len() == 1 {
                        if seen_root {
                            return Err(malformed(&reader, "multiple root elements"));
                        }
                        seen_root = true;
                    }
                    let element = self.parse_element(e)?;
                    let node = new_node(XmlContent::Element(element));
                    if let Some(parent) = node_stack.last() {
                        XmlNode::add_child_to_ref(parent, node);
                    }
                }
                Event::Text(e) => {
                    let raw = std::str::from_utf8(e.as_ref())
                        .map_err(|e| Error::MalformedXml(e.to_string()))?;
                    let text = unescape(raw).map_err(|e| Error::MalformedXml(e.to_string()))?;
                    pending_text.get_or_insert_with(String::new).push_str(&text);
                }
                Event::GeneralRef(e) => {
                    let name = std::str::from_utf8(&e)
                        .map_err(|e| Error::MalformedXml(e.to_string()))?;
                    let resolved = resolve_reference(name)
                        .ok_or_else(|| malformed(&reader, format!("undefined entity &{};", name)))?;
                    pending_text.get_or_insert_with(String::new).push_str(&resolved);
                }
                Event::CData(e) => {
                    let text = String::from_utf8_lossy(&e).to_string();
                    self.append_leaf(&node_stack, XmlContent::CData(text));
                }
                Event::Comment(e) => {
                    let text = String::from_utf8_lossy(&e).to_string();
                    self.append_leaf(&node_stack, XmlContent::Comment(text));
                }
                Event::PI(e) => {
                    let text = String::from_utf8_lossy(&e).to_string();
                    self.append_leaf(&node_stack, XmlContent::ProcessingInstruction(text));
                }
                Event::Decl(e) => {
                    let text = String::from_utf8_lossy(&e).to_string();
                    self.append_leaf(&node_stack, XmlContent::Declaration(text));
                }
                Event::DocType(e) => {
                    let text = String::from_utf8_lossy(&e).to_string();
                    self.append_leaf(&node_stack, XmlContent::DocType(text));
                }
                Event::Eof => break,
            }
        }

        if node_stack.len() > 1 {
            return Err(Error::MalformedXml(
                "unexpected end of document: unclosed element".to_string(),
            ));
        }
        if !seen_root {
            return Err(Error::MalformedXml("document has no root element".to_string()));
        }

        Ok(document)
    }

    fn append_leaf(&self, node_stack: &[XmlNodeRef], content: XmlContent) {
        if let Some(parent) = node_stack.last() {
            XmlNode::add_child_to_ref(parent, new_node(content));
        }
    }

    /// Parses an element's name and attributes.
    fn parse_element(&self, e: &BytesStart) -> Result<XmlElement> {
        let name = std::str::from_utf8(e.name().as_ref())
            .map_err(|e| Error::MalformedXml(e.to_string()))?
            .to_string();

        let mut attributes = Vec::new();
        for attr_result in e.attributes() {
            let attr =
                attr_result.map_err(|e| Error::MalformedXml(format!("attribute error: {}", e)))?;
            let key = std::str::from_utf8(attr.key.as_ref())
                .map_err(|e| Error::MalformedXml(e.to_string()))?
                .to_string();
            let value = attr
                .unescape_value()
                .map_err(|e| Error::MalformedXml(e.to_string()))?
                .to_string();
            attributes.push((key, value));
        }

        Ok(XmlElement::with_attributes(name, attributes))
    }
}

/// Moves accumulated character data into the current element.
fn flush_text(pending: &mut Option<String>, node_stack: &[XmlNodeRef]) -> Result<()> {
    let Some(text) = pending.take() else {
        return Ok(());
    };
    if node_stack.len() == 1 {
        // Only whitespace may sit between prolog nodes and the root.
        if !text.chars().all(char::is_whitespace) {
            return Err(Error::MalformedXml(
                "text content outside of the root element".to_string(),
            ));
        }
    }
    if let Some(parent) = node_stack.last() {
        XmlNode::add_child_to_ref(parent, new_node(XmlContent::Text(text)));
    }
    Ok(())
}

/// Resolves a predefined or numeric character reference.
fn resolve_reference(name: &str) -> Option<String> {
    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix('x').or_else(|| num.strip_prefix('X')) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse::<u32>().ok()?,
        };
        return char::from_u32(code).map(String::from);
    }
    resolve_predefined_entity(name).map(str::to_string)
}

fn malformed<R>(reader: &Reader<R>, message: impl std::fmt::Display) -> Error {
    Error::MalformedXml(format!(
        "{} (at byte {})",
        message,
        reader.buffer_position()
    ))
}

/// Parses XML from a string.
pub fn parse_str(xml: &str) -> Result<XmlNodeRef> {
    XmlParser::new().parse_str(xml)
}

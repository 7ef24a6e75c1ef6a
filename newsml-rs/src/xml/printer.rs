//! XML printer that outputs node trees.
//!
//! The printer writes exactly what the tree holds. Whitespace lives in text
//! nodes, so there is no indentation logic here; a tree parsed from a file
//! prints back to the same bytes apart from entity spelling.

use std::io::Write;

use super::content::{XmlContent, XmlElement};
use super::node::XmlNodeRef;
use super::DOCUMENT_TAG;

/// XML printer that outputs node trees.
pub struct XmlPrinter<W: Write> {
    writer: W,
}

impl<W: Write> XmlPrinter<W> {
    /// Creates a new XML printer.
    pub fn new(writer: W) -> Self {
        XmlPrinter { writer }
    }

    /// Prints a node tree to the output.
    ///
    /// The synthetic document node prints only its children.
    pub fn print(&mut self, root: &XmlNodeRef) -> std::io::Result<()> {
        self.print_node(root)?;
        self.writer.flush()
    }

    fn print_node(&mut self, node: &XmlNodeRef) -> std::io::Result<()> {
        let borrowed = node.borrow();

        match borrowed.content() {
            XmlContent::Element(element) => {
                if element.qname() == DOCUMENT_TAG {
                    for child in borrowed.children() {
                        self.print_node(child)?;
                    }
                    return Ok(());
                }

                self.start_element(element)?;
                if borrowed.child_count() == 0 && element.is_self_closing() {
                    return write!(self.writer, "/>");
                }
                write!(self.writer, ">")?;
                for child in borrowed.children() {
                    self.print_node(child)?;
                }
                write!(self.writer, "</{}>", element.qname())
            }
            XmlContent::Text(text) => write!(self.writer, "{}", escape_text(text)),
            XmlContent::CData(text) => write!(self.writer, "<![CDATA[{}]]>", text),
            XmlContent::Comment(text) => write!(self.writer, "<!--{}-->", text),
            XmlContent::ProcessingInstruction(text) | XmlContent::Declaration(text) => {
                write!(self.writer, "<?{}?>", text)
            }
            XmlContent::DocType(text) if text.starts_with(char::is_whitespace) => {
                write!(self.writer, "<!DOCTYPE{}>", text)
            }
            XmlContent::DocType(text) => write!(self.writer, "<!DOCTYPE {}>", text),
        }
    }

    fn start_element(&mut self, element: &XmlElement) -> std::io::Result<()> {
        write!(self.writer, "<{}", element.qname())?;
        for (name, value) in element.attributes() {
            write!(self.writer, " {}=\"{}\"", name, escape_attribute(value))?;
        }
        Ok(())
    }
}

/// Escapes character data.
pub fn escape_text(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            _ => result.push(c),
        }
    }
    result
}

/// Escapes a double-quoted attribute value.
pub fn escape_attribute(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '"' => result.push_str("&quot;"),
            _ => result.push(c),
        }
    }
    result
}

/// Prints a node tree to a string.
pub fn print_to_string(root: &XmlNodeRef) -> std::io::Result<String> {
    let mut output = Vec::new();
    {
        let mut printer = XmlPrinter::new(&mut output);
        printer.print(root)?;
    }
    Ok(String::from_utf8_lossy(&output).to_string())
}

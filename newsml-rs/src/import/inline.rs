//! Inline markup extraction.
//!
//! Turns the mixed content of a text block into plain text plus mark spans
//! measured in characters.

use crate::schema::Mark;
use crate::xml::{XmlContent, XmlNodeRef};

/// A mark over `[start, end)` of the extracted text.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Span {
    pub mark: Mark,
    pub start: usize,
    pub end: usize,
    pub tag: String,
    pub attributes: Vec<(String, String)>,
}

impl Span {
    fn explicit_id(&self) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == "id")
            .map(|(_, v)| v.as_str())
    }
}

/// Plain text of a block and the spans over it, in document order.
#[derive(Debug, Default)]
pub(crate) struct InlineText {
    pub text: String,
    pub spans: Vec<Span>,
}

/// Extracts the text and marks under `element`.
///
/// Returns `None` when the content holds anything other than text and known
/// mark elements, or a mark element with no text in it; such blocks are
/// passed through untouched.
pub(crate) fn extract(element: &XmlNodeRef) -> Option<InlineText> {
    let mut out = InlineText::default();
    let mut offset = 0;
    for child in element.borrow().children() {
        collect(child, &mut out, &mut offset)?;
    }
    out.spans = merge_fragments(out.spans);
    Some(out)
}

fn collect(node: &XmlNodeRef, out: &mut InlineText, offset: &mut usize) -> Option<()> {
    let borrowed = node.borrow();
    match borrowed.content() {
        XmlContent::Text(text) => {
            out.text.push_str(text);
            *offset += text.chars().count();
            Some(())
        }
        XmlContent::Element(element) => {
            let mark = Mark::from_tag(element.qname(), element.attribute("href"))?;
            let index = out.spans.len();
            out.spans.push(Span {
                mark,
                start: *offset,
                end: *offset,
                tag: element.qname().to_string(),
                attributes: element.attributes().to_vec(),
            });
            for child in borrowed.children() {
                collect(child, out, offset)?;
            }
            if *offset == out.spans[index].start {
                return None;
            }
            out.spans[index].end = *offset;
            Some(())
        }
        _ => None,
    }
}

/// Joins fragments of one annotation that export split to keep markup nested.
///
/// Fragments are joined when they carry the same explicit `id`, the same mark
/// and their ranges touch or overlap.
pub(crate) fn merge_fragments(spans: Vec<Span>) -> Vec<Span> {
    let mut merged: Vec<Span> = Vec::with_capacity(spans.len());
    for span in spans {
        let target = span.explicit_id().and_then(|id| {
            merged.iter().position(|prev| {
                prev.explicit_id() == Some(id)
                    && prev.mark == span.mark
                    && prev.start <= span.end
                    && span.start <= prev.end
            })
        });
        match target {
            Some(index) => {
                let prev = &mut merged[index];
                prev.start = prev.start.min(span.start);
                prev.end = prev.end.max(span.end);
            }
            None => merged.push(span),
        }
    }
    merged
}

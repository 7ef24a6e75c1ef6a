//! Annotation fragmenter.
//!
//! Turns a text block's annotations back into properly nested inline markup.
//! Ranges are clamped to the current text, empty ranges are dropped, and a
//! range crossing the end of an enclosing one is split into fragments that
//! carry the same attributes.

use std::cmp::Reverse;

use crate::model::Annotation;
use crate::schema::Mark;
use crate::xml::{new_node, new_text, XmlContent, XmlElement, XmlNode, XmlNodeRef};

#[derive(Debug, Clone, Copy)]
struct Range<'a> {
    start: usize,
    end: usize,
    order: usize,
    annotation: &'a Annotation,
}

impl Range<'_> {
    fn key(&self) -> (usize, Reverse<usize>, usize) {
        (self.start, Reverse(self.end), self.order)
    }
}

/// Builds the children of a text block element.
///
/// `annotations` are taken in the block's order: of two annotations over the
/// same range, the earlier one becomes the outer element.
pub(crate) fn fragment(text: &str, annotations: &[&Annotation]) -> Vec<XmlNodeRef> {
    let offsets: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let len = offsets.len() - 1;

    let ranges: Vec<Range> = annotations
        .iter()
        .copied()
        .enumerate()
        .filter_map(|(order, annotation)| {
            let end = annotation.end.min(len);
            let start = annotation.start.min(end);
            (start < end).then_some(Range {
                start,
                end,
                order,
                annotation,
            })
        })
        .collect();

    let slice = |from: usize, to: usize| &text[offsets[from]..offsets[to]];
    build(0, len, ranges, &slice)
}

fn build<'t>(
    lo: usize,
    hi: usize,
    ranges: Vec<Range>,
    slice: &dyn Fn(usize, usize) -> &'t str,
) -> Vec<XmlNodeRef> {
    let mut queue = ranges;
    queue.sort_by_key(Range::key);

    let mut out = Vec::new();
    let mut cursor = lo;
    while !queue.is_empty() {
        let outer = queue.remove(0);
        if outer.start > cursor {
            out.push(new_text(slice(cursor, outer.start)));
        }

        let mut inner = Vec::new();
        let mut rest = Vec::with_capacity(queue.len());
        for range in queue.drain(..) {
            if range.start >= outer.end {
                rest.push(range);
            } else if range.end > outer.end {
                inner.push(Range {
                    end: outer.end,
                    ..range
                });
                rest.push(Range {
                    start: outer.end,
                    ..range
                });
            } else {
                inner.push(range);
            }
        }
        queue = rest;
        queue.sort_by_key(Range::key);

        let element = mark_element(outer.annotation);
        for child in build(outer.start, outer.end, inner, slice) {
            XmlNode::add_child_to_ref(&element, child);
        }
        out.push(element);
        cursor = outer.end;
    }
    if cursor < hi {
        out.push(new_text(slice(cursor, hi)));
    }
    out
}

fn mark_element(annotation: &Annotation) -> XmlNodeRef {
    let mut element = XmlElement::with_attributes(annotation.tag.clone(), annotation.attributes.clone());
    match &annotation.mark {
        Mark::Link { href: Some(href) } => element.set_attribute("href", href.as_str()),
        Mark::Link { href: None } => {
            element.remove_attribute("href");
        }
        _ => {}
    }
    element.set_self_closing(false);
    new_node(XmlContent::Element(element))
}

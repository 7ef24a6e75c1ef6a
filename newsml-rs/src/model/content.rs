//! Content nodes: header fields, body blocks and inline annotations.

use serde::Serialize;

use super::meta::MetadataNode;
use super::NodeId;
use crate::constants::{OBJECT_TAG, TEXT_ELEMENT_TAG};
use crate::schema::{Mark, TextStyle};

/// One header field, body block or inline annotation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentNode {
    pub id: NodeId,
    pub kind: ContentKind,
}

/// The closed set of content node variants.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "node")]
pub enum ContentKind {
    /// A paragraph, heading or other styled text block.
    Text(TextBlock),
    /// A block embed such as an image or teaser (`object[type="x-im/..."]`).
    Object(MetadataNode),
    /// Any other body element, written back verbatim.
    Unsupported(MetadataNode),
    /// An inline range over a text block.
    Annotation(Annotation),
}

/// A styled block of plain text.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextBlock {
    pub style: TextStyle,
    pub text: String,
    /// Element tag, normally `element`.
    pub tag: String,
    /// XML attributes in document order; `type` is rewritten from `style`
    /// on export.
    pub attributes: Vec<(String, String)>,
    /// Ids of the annotations targeting this block, in creation order.
    pub annotations: Vec<NodeId>,
    /// Whether an empty block is written as `<element/>`.
    #[serde(skip)]
    pub self_closing: bool,
}

impl TextBlock {
    /// Creates a block as written by the editor: `<element id=.. type=..>`.
    pub fn new(id: &str, style: TextStyle, text: impl Into<String>) -> Self {
        TextBlock {
            style,
            text: text.into(),
            tag: TEXT_ELEMENT_TAG.to_string(),
            attributes: vec![
                ("id".to_string(), id.to_string()),
                ("type".to_string(), style.idf_type().to_string()),
            ],
            annotations: Vec::new(),
            self_closing: false,
        }
    }

    /// Length of the text in characters, the unit of annotation offsets.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// An inline mark over `[start, end)` of a text block's characters.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    pub mark: Mark,
    pub target: NodeId,
    pub start: usize,
    pub end: usize,
    /// Inline tag, e.g. `strong` or `b`.
    pub tag: String,
    /// XML attributes in document order; `href` is rewritten from the mark.
    pub attributes: Vec<(String, String)>,
}

impl Annotation {
    pub fn new(mark: Mark, target: &str, start: usize, end: usize) -> Self {
        let tag = mark.tag().to_string();
        Annotation {
            mark,
            target: target.to_string(),
            start,
            end,
            tag,
            attributes: Vec::new(),
        }
    }
}

impl ContentNode {
    /// The node's type name: a text style, an object type, or a mark.
    pub fn type_name(&self) -> &str {
        match &self.kind {
            ContentKind::Text(block) => block.style.name(),
            ContentKind::Object(meta) => meta.attribute("type").unwrap_or(OBJECT_TAG),
            ContentKind::Unsupported(meta) => meta.tag.as_str(),
            ContentKind::Annotation(annotation) => annotation.mark.name(),
        }
    }

    pub fn as_text(&self) -> Option<&TextBlock> {
        match &self.kind {
            ContentKind::Text(block) => Some(block),
            _ => None,
        }
    }

    pub fn as_text_mut(&mut self) -> Option<&mut TextBlock> {
        match &mut self.kind {
            ContentKind::Text(block) => Some(block),
            _ => None,
        }
    }

    pub fn as_annotation(&self) -> Option<&Annotation> {
        match &self.kind {
            ContentKind::Annotation(annotation) => Some(annotation),
            _ => None,
        }
    }

    pub(crate) fn as_annotation_mut(&mut self) -> Option<&mut Annotation> {
        match &mut self.kind {
            ContentKind::Annotation(annotation) => Some(annotation),
            _ => None,
        }
    }

    /// The element tree behind an object or pass-through node.
    pub fn as_element(&self) -> Option<&MetadataNode> {
        match &self.kind {
            ContentKind::Object(meta) | ContentKind::Unsupported(meta) => Some(meta),
            _ => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut MetadataNode> {
        match &mut self.kind {
            ContentKind::Object(meta) | ContentKind::Unsupported(meta) => Some(meta),
            _ => None,
        }
    }

    /// Returns true for an object of the given `type`.
    pub fn is_object_of_type(&self, object_type: &str) -> bool {
        matches!(&self.kind, ContentKind::Object(meta) if meta.attribute("type") == Some(object_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_text_block_attributes() {
        let block = TextBlock::new("p1", TextStyle::Paragraph, "Hällo");
        assert_eq!(block.char_len(), 5);
        assert_eq!(
            block.attributes,
            vec![
                ("id".to_string(), "p1".to_string()),
                ("type".to_string(), "body".to_string())
            ]
        );
    }

    #[test]
    fn test_type_names() {
        let text = ContentNode {
            id: "h".into(),
            kind: ContentKind::Text(TextBlock::new("h", TextStyle::Headline, "")),
        };
        let mut meta = MetadataNode::new("t", "object");
        meta.set_attribute("type", "x-im/teaser");
        let object = ContentNode {
            id: "t".into(),
            kind: ContentKind::Object(meta),
        };
        let anno = ContentNode {
            id: "a".into(),
            kind: ContentKind::Annotation(Annotation::new(Mark::Emphasis, "h", 0, 1)),
        };

        assert_eq!(text.type_name(), "headline");
        assert_eq!(object.type_name(), "x-im/teaser");
        assert!(object.is_object_of_type("x-im/teaser"));
        assert_eq!(anno.type_name(), "emphasis");
        assert_eq!(anno.as_annotation().unwrap().tag, "em");
    }
}

//! The importer: NewsML-G2 XML to [`ArticleDocument`].
//!
//! Item and content metadata are converted element by element. Header and
//! body text blocks become [`ContentKind::Text`] nodes with their inline
//! markup lifted into annotations. Anything the model does not describe is
//! kept verbatim so the exporter can write it back.

mod inline;

use inline::{extract, InlineText};

use crate::config::{CodecConfig, TeaserPosition};
use crate::constants::{
    BODY_GROUP_SELECTOR, CONTENT_META_TAG, HEADER_GROUP_SELECTOR, ITEM_META_TAG, LANGUAGE_ATTR,
    OBJECT_TAG, TEASER_TYPE, TEXT_ELEMENT_TAG,
};
use crate::error::{Error, Result};
use crate::model::{
    Annotation, ArticleDocument, ContentKind, ContentNode, MetaContent, MetadataNode, NodeId,
    TextBlock,
};
use crate::schema::{MetaKind, TextStyle};
use crate::xml::{local_name, XmlDocument, XmlNode, XmlNodeRef};

/// Converts NewsML-G2 items into documents.
#[derive(Debug, Clone, Default)]
pub struct Importer {
    config: CodecConfig,
}

impl Importer {
    pub fn new(config: CodecConfig) -> Self {
        Importer { config }
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Parses and imports an XML document.
    pub fn import_document(&self, xml: &str) -> Result<ArticleDocument> {
        let parsed = XmlDocument::parse(xml)?;
        self.import_parsed(&parsed)
    }

    /// Imports an already parsed document. The tree is only read.
    pub fn import_parsed(&self, xml: &XmlDocument) -> Result<ArticleDocument> {
        let root = xml
            .root()
            .ok_or_else(|| Error::SchemaViolation("missing root element".to_string()))?;
        let item_meta = child_element(&root, ITEM_META_TAG)
            .ok_or_else(|| Error::SchemaViolation("missing itemMeta".to_string()))?;
        let content_meta = child_element(&root, CONTENT_META_TAG)
            .ok_or_else(|| Error::SchemaViolation("missing contentMeta".to_string()))?;

        let guid = XmlDocument::attribute(&root, "guid").unwrap_or_default();
        let language = XmlDocument::attribute(&root, LANGUAGE_ATTR)
            .unwrap_or_else(|| self.config.default_language.clone());
        let mut doc = ArticleDocument::new(guid, language);

        if let Some(header) = XmlDocument::find(&root, HEADER_GROUP_SELECTOR)? {
            self.import_header(&mut doc, &header);
        }

        doc.item_meta = import_metadata(&mut doc, &item_meta);
        doc.content_meta = import_metadata(&mut doc, &content_meta);

        if let Some(body) = XmlDocument::find(&root, BODY_GROUP_SELECTOR)? {
            for element in XmlNode::element_children(&body) {
                let node = import_block(&mut doc, &element);
                doc.body.push(node.id.clone());
                doc.nodes.insert(node.id.clone(), node);
            }
        }

        self.lift_teaser(&mut doc);

        tracing::debug!(
            guid = %doc.guid,
            item_meta = doc.item_meta.len(),
            content_meta = doc.content_meta.len(),
            header = doc.header.len(),
            body = doc.body.len(),
            "imported document"
        );
        Ok(doc)
    }

    fn import_header(&self, doc: &mut ArticleDocument, group: &XmlNodeRef) {
        for element in XmlNode::element_children(group) {
            let Some(style) = text_style_of(&element) else {
                continue;
            };
            if !self.config.is_header_field(style) {
                continue;
            }

            let field = style.idf_type().to_string();
            if doc.header.contains(&field) {
                tracing::warn!(field = %field, "duplicate header field, keeping the last one");
                doc.take_content(&field);
            }
            doc.registry.insert(field.clone());
            let node = import_block_as(doc, &element, field.clone());
            doc.header.push(field);
            doc.nodes.insert(node.id.clone(), node);
        }
    }

    /// Moves a single `x-im/teaser` object from content metadata into the body.
    fn lift_teaser(&self, doc: &mut ArticleDocument) {
        let mut found = Vec::new();
        for (list_index, node) in doc.content_meta.iter().enumerate() {
            if node.kind != MetaKind::Metadata {
                continue;
            }
            for (content_index, item) in node.content.iter().enumerate() {
                if let MetaContent::Element(object) = item {
                    if is_teaser(object) {
                        found.push((list_index, content_index));
                    }
                }
            }
        }

        let &[(list_index, content_index)] = found.as_slice() else {
            if found.len() > 1 {
                tracing::debug!(count = found.len(), "several teasers, leaving content metadata as is");
            }
            return;
        };
        let MetaContent::Element(teaser) = doc.content_meta[list_index].content.remove(content_index)
        else {
            return;
        };

        doc.teaser_slot = Some(content_index);
        let id = teaser.id.clone();
        let position = match self.config.teaser_position {
            TeaserPosition::Top => 0,
            TeaserPosition::Bottom => doc.body.len(),
        };
        doc.body.insert(position, id.clone());
        doc.nodes.insert(
            id.clone(),
            ContentNode {
                id,
                kind: ContentKind::Object(teaser),
            },
        );
    }
}

/// Imports an XML news item with the default configuration.
pub fn import_document(xml: &str) -> Result<ArticleDocument> {
    Importer::default().import_document(xml)
}

impl ArticleDocument {
    /// Creates a document from the configured template.
    pub fn from_template(config: &CodecConfig) -> Result<ArticleDocument> {
        Importer::new(config.clone()).import_document(&config.template)
    }
}

pub(crate) fn is_teaser(node: &MetadataNode) -> bool {
    node.local_tag() == OBJECT_TAG && node.attribute("type") == Some(TEASER_TYPE)
}

fn child_element(parent: &XmlNodeRef, name: &str) -> Option<XmlNodeRef> {
    XmlNode::element_children(parent)
        .into_iter()
        .find(|c| c.borrow().element().map(|e| e.local_name() == name).unwrap_or(false))
}

fn text_style_of(element: &XmlNodeRef) -> Option<TextStyle> {
    let borrowed = element.borrow();
    let e = borrowed.element()?;
    if e.local_name() != TEXT_ELEMENT_TAG {
        return None;
    }
    e.attribute("type").and_then(TextStyle::from_idf_type)
}

fn import_metadata(doc: &mut ArticleDocument, section: &XmlNodeRef) -> Vec<MetadataNode> {
    XmlNode::element_children(section)
        .iter()
        .filter_map(|child| import_meta_tree(doc, child))
        .collect()
}

fn import_meta_tree(doc: &mut ArticleDocument, element: &XmlNodeRef) -> Option<MetadataNode> {
    let mut alloc = |tag: &str, id: Option<&str>| doc.allocate_id(tag, id);
    MetadataNode::from_xml(element, &mut alloc)
}

/// Converts one body element, allocating its id from the `id` attribute.
fn import_block(doc: &mut ArticleDocument, element: &XmlNodeRef) -> ContentNode {
    let text_style = text_style_of(element);
    let inline = text_style.and_then(|_| extract(element));

    match (text_style, inline) {
        (Some(style), Some(inline)) => {
            let preferred = XmlDocument::attribute(element, "id");
            let id = doc.allocate_id(style.name(), preferred.as_deref());
            text_node(doc, element, id, style, inline)
        }
        _ => element_node(doc, element, None),
    }
}

/// Converts one header element under a fixed id.
fn import_block_as(doc: &mut ArticleDocument, element: &XmlNodeRef, id: NodeId) -> ContentNode {
    match (text_style_of(element), extract(element)) {
        (Some(style), Some(inline)) => text_node(doc, element, id, style, inline),
        _ => element_node(doc, element, Some(id)),
    }
}

fn text_node(
    doc: &mut ArticleDocument,
    element: &XmlNodeRef,
    id: NodeId,
    style: TextStyle,
    inline: InlineText,
) -> ContentNode {
    let (tag, attributes, self_closing) = {
        let borrowed = element.borrow();
        match borrowed.element() {
            Some(e) => (
                e.qname().to_string(),
                e.attributes().to_vec(),
                e.is_self_closing(),
            ),
            None => (TEXT_ELEMENT_TAG.to_string(), Vec::new(), false),
        }
    };

    let mut block = TextBlock {
        style,
        text: inline.text,
        tag,
        attributes,
        annotations: Vec::new(),
        self_closing,
    };
    for span in inline.spans {
        let preferred = span
            .attributes
            .iter()
            .find(|(k, _)| k == "id")
            .map(|(_, v)| v.clone());
        let anno_id = doc.allocate_id(span.mark.name(), preferred.as_deref());
        let annotation = Annotation {
            mark: span.mark,
            target: id.clone(),
            start: span.start,
            end: span.end,
            tag: span.tag,
            attributes: span.attributes,
        };
        block.annotations.push(anno_id.clone());
        doc.nodes.insert(
            anno_id.clone(),
            ContentNode {
                id: anno_id,
                kind: ContentKind::Annotation(annotation),
            },
        );
    }

    ContentNode {
        id,
        kind: ContentKind::Text(block),
    }
}

/// Converts an element kept as a tree: objects and pass-through blocks.
fn element_node(doc: &mut ArticleDocument, element: &XmlNodeRef, fixed: Option<NodeId>) -> ContentNode {
    let mut root_seen = false;
    let mut alloc = |tag: &str, id: Option<&str>| -> NodeId {
        if !root_seen {
            root_seen = true;
            if let Some(fixed) = &fixed {
                return fixed.clone();
            }
        }
        doc.allocate_id(tag, id)
    };
    let meta = MetadataNode::from_xml(element, &mut alloc)
        .unwrap_or_else(|| MetadataNode::new(String::new(), TEXT_ELEMENT_TAG));

    let id = meta.id.clone();
    let kind = if local_name(&meta.tag) == OBJECT_TAG {
        ContentKind::Object(meta)
    } else {
        ContentKind::Unsupported(meta)
    };
    ContentNode { id, kind }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Mark;

    const ARTICLE: &str = r#"<newsItem guid="abc" xml:lang="en">
  <itemMeta>
    <itemClass qcode="ninat:text"/>
    <service qcode="imchn:a" why="imext:main"/>
    <links>
      <link rel="author" type="x-im/author" title="Ann" uuid="u1"/>
    </links>
  </itemMeta>
  <contentMeta>
    <metadata>
      <object id="tz" type="x-im/teaser" title="Teaser"/>
    </metadata>
  </contentMeta>
  <contentSet>
    <inlineXML>
      <idf>
        <group type="header">
          <element type="headline">Old</element>
          <element type="headline">Big <em>news</em></element>
          <element type="dateline">Here</element>
        </group>
        <group type="body">
          <element id="p1" type="body">Hello <strong>world</strong></element>
          <object id="img" type="x-im/image"><data><width>3</width></data></object>
          <element type="body">Odd <span>markup</span></element>
          <table/>
        </group>
      </idf>
    </inlineXML>
  </contentSet>
</newsItem>"#;

    #[test]
    fn test_import_structure() {
        let doc = import_document(ARTICLE).unwrap();

        assert_eq!(doc.guid(), "abc");
        assert_eq!(doc.language(), "en");
        assert_eq!(doc.item_meta().len(), 3);
        assert_eq!(doc.item_meta()[2].kind, MetaKind::Links);
        assert_eq!(doc.content_meta().len(), 1);

        let kinds: Vec<_> = doc
            .body()
            .iter()
            .map(|id| doc.get(id).unwrap().type_name().to_string())
            .collect();
        assert_eq!(
            kinds,
            vec!["paragraph", "x-im/image", "element", "table", "x-im/teaser"]
        );
        assert_eq!(doc.body()[0], "p1");
        assert_eq!(doc.body()[1], "img");
    }

    #[test]
    fn test_annotations_are_extracted() {
        let doc = import_document(ARTICLE).unwrap();
        let annotations = doc.annotations_of("p1");

        assert_eq!(annotations.len(), 1);
        let (_, strong) = annotations[0];
        assert_eq!(strong.mark, Mark::Strong);
        assert_eq!((strong.start, strong.end), (6, 11));
        assert_eq!(strong.target, "p1");
    }

    #[test]
    fn test_last_duplicate_header_wins() {
        let doc = import_document(ARTICLE).unwrap();

        assert_eq!(doc.header(), &["headline".to_string()]);
        let headline = doc.header_field("headline").unwrap().as_text().unwrap();
        assert_eq!(headline.text, "Big news");
        assert_eq!(headline.annotations.len(), 1);
        // dateline is not a declared header field by default
        assert!(doc.header_field("dateline").is_none());
    }

    #[test]
    fn test_teaser_moves_to_body_bottom() {
        let doc = import_document(ARTICLE).unwrap();
        let metadata = &doc.content_meta()[0];

        assert_eq!(metadata.element_count(), 0);
        assert_eq!(doc.body().last().map(String::as_str), Some("tz"));
        assert!(doc.get("tz").unwrap().is_object_of_type(TEASER_TYPE));
    }

    #[test]
    fn test_teaser_top_position() {
        let config = CodecConfig::default().with_teaser_position(TeaserPosition::Top);
        let doc = Importer::new(config).import_document(ARTICLE).unwrap();
        assert_eq!(doc.body()[0], "tz");
    }

    #[test]
    fn test_missing_sections() {
        let err = import_document("<newsItem><contentMeta/></newsItem>").unwrap_err();
        assert!(matches!(err, Error::SchemaViolation(ref m) if m == "missing itemMeta"));

        let err = import_document("<newsItem><itemMeta/></newsItem>").unwrap_err();
        assert!(matches!(err, Error::SchemaViolation(ref m) if m == "missing contentMeta"));

        let err = import_document("<newsItem><itemMeta>").unwrap_err();
        assert!(matches!(err, Error::MalformedXml(_)));
    }

    #[test]
    fn test_defaults_without_attributes() {
        let doc = import_document("<newsItem><itemMeta/><contentMeta/></newsItem>").unwrap();
        assert_eq!(doc.guid(), "");
        assert_eq!(doc.language(), "sv");
        assert!(doc.body().is_empty());
    }

    #[test]
    fn test_ids_are_unique() {
        let doc = import_document(
            "<newsItem><itemMeta/><contentMeta/><idf><group type=\"body\">\
             <element id=\"x\" type=\"body\">a</element>\
             <element id=\"x\" type=\"body\">b</element>\
             </group></idf></newsItem>",
        )
        .unwrap();

        assert_eq!(doc.body().len(), 2);
        assert_eq!(doc.body()[0], "x");
        assert_ne!(doc.body()[1], "x");
    }

    #[test]
    fn test_from_template() {
        let doc = ArticleDocument::from_template(&CodecConfig::default()).unwrap();
        assert!(doc.body().is_empty());
        assert_eq!(doc.item_meta().len(), 4);
    }
}

//! The exporter: [`ArticleDocument`] to NewsML-G2 XML.
//!
//! Output is produced by rewriting a copy of a skeleton document, normally
//! the XML the document was imported from. Everything the model does not
//! describe (catalog references, unknown metadata, foreign header elements,
//! comments and formatting) is carried over from the skeleton.

mod fragmenter;
mod layout;
mod scrub;

use layout::{append_indented, remove_indented, Layout};

use crate::config::CodecConfig;
use crate::constants::{
    BODY_GROUP_SELECTOR, CONTENT_META_TAG, HEADER_GROUP_SELECTOR, ITEM_META_TAG, LANGUAGE_ATTR,
    TEASER_TYPE, TEXT_ELEMENT_TAG,
};
use crate::error::{Error, Result};
use crate::import::is_teaser;
use crate::model::{ArticleDocument, ContentKind, ContentNode, MetaContent, MetadataNode};
use crate::schema::MetaKind;
use crate::xml::{new_node, XmlContent, XmlDocument, XmlElement, XmlNode, XmlNodeRef};

/// Serializes documents into NewsML-G2 items.
#[derive(Debug, Clone, Default)]
pub struct Exporter {
    config: CodecConfig,
}

impl Exporter {
    pub fn new(config: CodecConfig) -> Self {
        Exporter { config }
    }

    /// Writes `doc` into a copy of `skeleton`, or of the configured template
    /// when no skeleton is given. Neither `doc` nor `skeleton` is modified.
    pub fn export_document(
        &self,
        doc: &ArticleDocument,
        skeleton: Option<&XmlDocument>,
    ) -> Result<String> {
        let tree = match skeleton {
            Some(skeleton) => skeleton.deep_clone(),
            None => XmlDocument::parse(&self.config.template)?,
        };
        let root = tree
            .root()
            .ok_or_else(|| Error::SchemaViolation("missing root element".to_string()))?;
        let body_group = XmlDocument::find(&root, BODY_GROUP_SELECTOR)?
            .ok_or_else(|| Error::SchemaViolation("missing body group".to_string()))?;

        self.write_root_attributes(doc, &root)?;

        let item_meta = section(&root, ITEM_META_TAG)?;
        write_section(&item_meta, &doc.item_meta);

        let content_meta = section(&root, CONTENT_META_TAG)?;
        let mut content_list = doc.content_meta.clone();
        merge_teaser(doc, &mut content_list);
        write_section(&content_meta, &content_list);

        match XmlDocument::find(&root, HEADER_GROUP_SELECTOR)? {
            Some(header_group) => self.write_header(doc, &header_group),
            None if !doc.header.is_empty() => {
                tracing::warn!("skeleton has no header group, header fields not written");
            }
            None => {}
        }

        let mut teaser_skipped = false;
        let blocks: Vec<XmlNodeRef> = doc
            .body
            .iter()
            .filter_map(|id| doc.nodes.get(id))
            .filter(|node| {
                if !teaser_skipped && node.is_object_of_type(TEASER_TYPE) {
                    teaser_skipped = true;
                    return false;
                }
                true
            })
            .filter_map(|node| content_to_xml(doc, node))
            .collect();
        Layout::of(&body_group).rebuild(&body_group, blocks);

        Ok(scrub::scrub(tree.serialize()?))
    }

    fn write_root_attributes(&self, doc: &ArticleDocument, root: &XmlNodeRef) -> Result<()> {
        if XmlDocument::attribute(root, "guid").is_some() || !doc.guid.is_empty() {
            XmlDocument::set_attribute(root, "guid", &doc.guid)?;
        }
        if XmlDocument::attribute(root, LANGUAGE_ATTR).is_some()
            || doc.language != self.config.default_language
        {
            XmlDocument::set_attribute(root, LANGUAGE_ATTR, &doc.language)?;
        }
        Ok(())
    }

    /// Rewrites declared header fields in place; other header children stay.
    fn write_header(&self, doc: &ArticleDocument, group: &XmlNodeRef) {
        for style in &self.config.header_fields {
            let field = style.idf_type();
            let existing: Vec<XmlNodeRef> = XmlNode::element_children(group)
                .into_iter()
                .filter(|child| {
                    let borrowed = child.borrow();
                    borrowed.element().is_some_and(|e| {
                        e.local_name() == TEXT_ELEMENT_TAG && e.attribute("type") == Some(field)
                    })
                })
                .collect();

            let replacement = doc
                .header_field(field)
                .and_then(|node| content_to_xml(doc, node));

            match (replacement, existing.split_first()) {
                (Some(element), Some((first, duplicates))) => {
                    let position = first.borrow().child_pos();
                    XmlNode::remove_child_to_ref(group, position);
                    XmlNode::add_child_at_to_ref(group, position, element);
                    duplicates.iter().for_each(remove_indented);
                }
                (Some(element), None) => append_indented(group, element),
                (None, _) => existing.iter().for_each(remove_indented),
            }
        }
    }
}

/// Exports a document with the default configuration.
pub fn export_document(doc: &ArticleDocument, skeleton: Option<&XmlDocument>) -> Result<String> {
    Exporter::default().export_document(doc, skeleton)
}

fn section(root: &XmlNodeRef, tag: &str) -> Result<XmlNodeRef> {
    XmlNode::element_children(root)
        .into_iter()
        .find(|c| c.borrow().element().is_some_and(|e| e.local_name() == tag))
        .ok_or_else(|| Error::SchemaViolation(format!("missing {}", tag)))
}

fn write_section(container: &XmlNodeRef, nodes: &[MetadataNode]) {
    let elements = nodes.iter().map(MetadataNode::to_xml).collect();
    Layout::of(container).rebuild(container, elements);
}

/// Puts the first body teaser back into content metadata.
fn merge_teaser(doc: &ArticleDocument, content_meta: &mut Vec<MetadataNode>) {
    let Some(teaser) = doc
        .body
        .iter()
        .filter_map(|id| doc.nodes.get(id))
        .find(|node| node.is_object_of_type(TEASER_TYPE))
        .and_then(ContentNode::as_element)
    else {
        return;
    };

    let index = match content_meta.iter().position(|n| n.kind == MetaKind::Metadata) {
        Some(index) => index,
        None => {
            let mut metadata = MetadataNode::new("metadata", "metadata");
            metadata.self_closing = false;
            content_meta.push(metadata);
            content_meta.len() - 1
        }
    };
    let metadata = &mut content_meta[index];
    metadata.remove_elements_where(is_teaser);

    match doc.teaser_slot {
        Some(slot) if slot <= metadata.content.len() => {
            metadata.content.insert(slot, MetaContent::Element(teaser.clone()));
            metadata.self_closing = false;
        }
        _ => metadata.insert_element(usize::MAX, teaser.clone()),
    }
}

/// Converts a header or body node to its XML element.
fn content_to_xml(doc: &ArticleDocument, node: &ContentNode) -> Option<XmlNodeRef> {
    match &node.kind {
        ContentKind::Text(block) => {
            let mut element = XmlElement::with_attributes(block.tag.clone(), block.attributes.clone());
            element.set_attribute("type", block.style.idf_type());
            element.set_self_closing(block.self_closing);

            let annotations: Vec<_> = block
                .annotations
                .iter()
                .filter_map(|id| doc.nodes.get(id)?.as_annotation())
                .collect();
            let xml = new_node(XmlContent::Element(element));
            for child in fragmenter::fragment(&block.text, &annotations) {
                XmlNode::add_child_to_ref(&xml, child);
            }
            Some(xml)
        }
        ContentKind::Object(meta) | ContentKind::Unsupported(meta) => Some(meta.to_xml()),
        ContentKind::Annotation(_) => {
            tracing::warn!(id = %node.id, "annotation in block position skipped");
            None
        }
    }
}

//! The in-memory article model.
//!
//! An [`ArticleDocument`] is created by the importer (or from the template)
//! and changed only through the mutation helpers in [`crate::mutation`].
//! Every node, at any depth, has an id unique within the document; the ids
//! live in one registry so lookups and duplicate checks agree.

mod content;
mod id;
mod meta;

pub use content::{Annotation, ContentKind, ContentNode, TextBlock};
pub use id::IdGenerator;
pub use meta::{MetaContent, MetadataNode};

pub(crate) use meta::insert_into_list;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;

use crate::constants::DEFAULT_LANGUAGE;

/// Identifier of a node within one document.
pub type NodeId = String;

/// The two top-level metadata sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaSection {
    ItemMeta,
    ContentMeta,
}

/// Where a metadata node lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum MetaOwner {
    /// In a top-level section; the first path step indexes the section list.
    Section(MetaSection),
    /// Inside the element tree of a body or header content node.
    Content(NodeId),
}

/// Address of a metadata node: its owner plus child element indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MetaLocation {
    pub owner: MetaOwner,
    pub path: Vec<usize>,
}

/// The root aggregate of one article.
#[derive(Debug, Clone)]
pub struct ArticleDocument {
    pub(crate) guid: String,
    pub(crate) language: String,
    pub(crate) item_meta: Vec<MetadataNode>,
    pub(crate) content_meta: Vec<MetadataNode>,
    /// Header field node ids; each id equals its field's IDF type.
    pub(crate) header: Vec<NodeId>,
    pub(crate) body: Vec<NodeId>,
    pub(crate) nodes: FxHashMap<NodeId, ContentNode>,
    pub(crate) registry: FxHashSet<NodeId>,
    pub(crate) ids: IdGenerator,
    /// Index among `contentMeta > metadata` children the teaser was lifted from.
    pub(crate) teaser_slot: Option<usize>,
}

impl Default for ArticleDocument {
    fn default() -> Self {
        Self::new("", DEFAULT_LANGUAGE)
    }
}

impl ArticleDocument {
    /// Creates an empty document.
    pub fn new(guid: impl Into<String>, language: impl Into<String>) -> Self {
        ArticleDocument {
            guid: guid.into(),
            language: language.into(),
            item_meta: Vec::new(),
            content_meta: Vec::new(),
            header: Vec::new(),
            body: Vec::new(),
            nodes: FxHashMap::default(),
            registry: FxHashSet::default(),
            ids: IdGenerator::new(),
            teaser_slot: None,
        }
    }

    pub fn guid(&self) -> &str {
        &self.guid
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn item_meta(&self) -> &[MetadataNode] {
        &self.item_meta
    }

    pub fn content_meta(&self) -> &[MetadataNode] {
        &self.content_meta
    }

    /// Metadata list of a section.
    pub fn section(&self, section: MetaSection) -> &[MetadataNode] {
        match section {
            MetaSection::ItemMeta => &self.item_meta,
            MetaSection::ContentMeta => &self.content_meta,
        }
    }

    pub(crate) fn section_mut(&mut self, section: MetaSection) -> &mut Vec<MetadataNode> {
        match section {
            MetaSection::ItemMeta => &mut self.item_meta,
            MetaSection::ContentMeta => &mut self.content_meta,
        }
    }

    /// Ids of the header field nodes, in import order.
    pub fn header(&self) -> &[NodeId] {
        &self.header
    }

    /// Ids of the body nodes, in order.
    pub fn body(&self) -> &[NodeId] {
        &self.body
    }

    /// Looks up a content node.
    pub fn get(&self, id: &str) -> Option<&ContentNode> {
        self.nodes.get(id)
    }

    /// Looks up a header field node by its IDF type.
    pub fn header_field(&self, field: &str) -> Option<&ContentNode> {
        self.header
            .iter()
            .find(|id| id.as_str() == field)
            .and_then(|id| self.nodes.get(id))
    }

    /// Looks up a metadata node at any depth, including inside objects.
    pub fn meta(&self, id: &str) -> Option<&MetadataNode> {
        let location = self.locate_meta(id)?;
        self.meta_at(&location)
    }

    /// Returns true if any node carries `id`.
    pub fn contains(&self, id: &str) -> bool {
        self.registry.contains(id)
    }

    /// Number of registered ids.
    pub fn node_count(&self) -> usize {
        self.registry.len()
    }

    /// Annotations targeting a text block, in creation order.
    pub fn annotations_of(&self, text_id: &str) -> Vec<(&NodeId, &Annotation)> {
        let Some(block) = self.nodes.get(text_id).and_then(ContentNode::as_text) else {
            return Vec::new();
        };
        block
            .annotations
            .iter()
            .filter_map(|id| {
                let node = self.nodes.get(id)?;
                Some((&node.id, node.as_annotation()?))
            })
            .collect()
    }

    /// The plain text of every body text block, one per line.
    pub fn plain_text(&self) -> String {
        self.body
            .iter()
            .filter_map(|id| self.nodes.get(id)?.as_text())
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Reserves an id, preferring `preferred` when it is free.
    pub(crate) fn allocate_id(&mut self, prefix: &str, preferred: Option<&str>) -> NodeId {
        let id = match preferred {
            Some(id) if !id.is_empty() && !self.registry.contains(id) => id.to_string(),
            _ => {
                let registry = &self.registry;
                self.ids.next_id(prefix, |candidate| registry.contains(candidate))
            }
        };
        self.registry.insert(id.clone());
        id
    }

    /// Removes a content node, its container entry, and the annotations it
    /// owns. Ids of nested elements are released as well.
    pub(crate) fn take_content(&mut self, id: &str) -> Option<ContentNode> {
        let node = self.nodes.remove(id)?;
        self.body.retain(|b| b != id);
        self.header.retain(|h| h != id);
        self.registry.remove(id);
        match &node.kind {
            ContentKind::Text(block) => {
                for anno in &block.annotations {
                    self.nodes.remove(anno);
                    self.registry.remove(anno);
                }
            }
            ContentKind::Object(meta) | ContentKind::Unsupported(meta) => {
                for child in meta.elements() {
                    self.unregister_meta(child);
                }
            }
            ContentKind::Annotation(annotation) => {
                if let Some(block) = self.nodes.get_mut(&annotation.target).and_then(ContentNode::as_text_mut) {
                    block.annotations.retain(|a| a != id);
                }
            }
        }
        Some(node)
    }

    #[cfg(test)]
    pub(crate) fn register_meta(&mut self, node: &MetadataNode) {
        let mut ids = Vec::new();
        node.collect_ids(&mut ids);
        self.registry.extend(ids);
    }

    pub(crate) fn unregister_meta(&mut self, node: &MetadataNode) {
        let mut ids = Vec::new();
        node.collect_ids(&mut ids);
        for id in ids {
            self.registry.remove(&id);
        }
    }

    /// Finds where a metadata node lives.
    pub(crate) fn locate_meta(&self, id: &str) -> Option<MetaLocation> {
        if !self.registry.contains(id) {
            return None;
        }
        for section in [MetaSection::ItemMeta, MetaSection::ContentMeta] {
            for (index, node) in self.section(section).iter().enumerate() {
                if let Some(mut path) = node.path_to(id) {
                    path.insert(0, index);
                    return Some(MetaLocation {
                        owner: MetaOwner::Section(section),
                        path,
                    });
                }
            }
        }
        for content_id in self.header.iter().chain(self.body.iter()) {
            let Some(element) = self.nodes.get(content_id).and_then(ContentNode::as_element) else {
                continue;
            };
            if let Some(path) = element.path_to(id) {
                return Some(MetaLocation {
                    owner: MetaOwner::Content(content_id.clone()),
                    path,
                });
            }
        }
        None
    }

    pub(crate) fn meta_at(&self, location: &MetaLocation) -> Option<&MetadataNode> {
        match &location.owner {
            MetaOwner::Section(section) => {
                let (first, rest) = location.path.split_first()?;
                self.section(*section).get(*first)?.at_path(rest)
            }
            MetaOwner::Content(id) => self.nodes.get(id)?.as_element()?.at_path(&location.path),
        }
    }

    pub(crate) fn meta_at_mut(&mut self, location: &MetaLocation) -> Option<&mut MetadataNode> {
        match &location.owner {
            MetaOwner::Section(section) => {
                let (first, rest) = location.path.split_first()?;
                self.section_mut(*section).get_mut(*first)?.at_path_mut(rest)
            }
            MetaOwner::Content(id) => self
                .nodes
                .get_mut(id)?
                .as_element_mut()?
                .at_path_mut(&location.path),
        }
    }

    /// A serializable overview of the document.
    pub fn summary(&self) -> DocumentSummary<'_> {
        let entries = |ids: &'_ [NodeId]| -> Vec<NodeSummary<'_>> {
            ids.iter()
                .filter_map(|id| self.nodes.get(id))
                .map(|node| NodeSummary {
                    id: &node.id,
                    kind: node.type_name(),
                    text: node.as_text().map(|b| b.text.as_str()),
                    annotations: node.as_text().map_or(0, |b| b.annotations.len()),
                })
                .collect()
        };
        DocumentSummary {
            guid: &self.guid,
            language: &self.language,
            item_meta: &self.item_meta,
            content_meta: &self.content_meta,
            header: entries(&self.header),
            body: entries(&self.body),
        }
    }
}

/// Overview of a document, as printed by `nml import`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSummary<'a> {
    pub guid: &'a str,
    pub language: &'a str,
    pub item_meta: &'a [MetadataNode],
    pub content_meta: &'a [MetadataNode],
    pub header: Vec<NodeSummary<'a>>,
    pub body: Vec<NodeSummary<'a>>,
}

/// One header or body node in a [`DocumentSummary`].
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSummary<'a> {
    pub id: &'a str,
    #[serde(rename = "type")]
    pub kind: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<&'a str>,
    #[serde(skip_serializing_if = "is_zero")]
    pub annotations: usize,
}

fn is_zero(n: &usize) -> bool {
    *n == 0
}

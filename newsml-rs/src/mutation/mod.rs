//! Node mutation helpers.
//!
//! Every structural edit to an [`ArticleDocument`] goes through here, both
//! during interactive editing and during change replay. Each helper checks
//! its preconditions before touching the document, so a failed call leaves
//! the document exactly as it was.

mod path;
mod payload;

use serde_json::Value;

use crate::constants::{BODY_ID, CONTENT_META_TAG, ITEM_META_TAG, OBJECT_TAG, ROOT_ID};
use crate::error::MutationError;
use crate::model::{
    insert_into_list, ArticleDocument, ContentKind, ContentNode, MetaLocation, MetaOwner,
    MetaSection, MetadataNode, NodeId, TextBlock,
};
use crate::schema::{FieldFlags, TextStyle};

use path::{marker_field, update_annotation, update_meta, update_text_block, Target};
use payload::{annotation_payload, block_payload, meta_payload, scalar};

/// One structural edit.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Insert {
        container: String,
        position: usize,
        payload: Value,
    },
    Delete {
        id: NodeId,
    },
    Update {
        id: NodeId,
        path: Vec<String>,
        value: Value,
    },
    Move {
        id: NodeId,
        container: String,
        position: usize,
    },
}

impl Mutation {
    /// Applies the edit; inserts return the id of the new node.
    pub fn apply(&self, doc: &mut ArticleDocument) -> Result<Option<NodeId>, MutationError> {
        match self {
            Mutation::Insert {
                container,
                position,
                payload,
            } => doc.insert_node(container, *position, payload).map(Some),
            Mutation::Delete { id } => doc.delete_node(id).map(|_| None),
            Mutation::Update { id, path, value } => {
                doc.update_property(id, path, value).map(|_| None)
            }
            Mutation::Move {
                id,
                container,
                position,
            } => doc.move_node(id, container, *position).map(|_| None),
        }
    }
}

/// A resolved container name.
#[derive(Debug, Clone)]
enum Container {
    Body,
    Section(MetaSection),
    /// A text block; inserts add annotations.
    Text(NodeId),
    /// A metadata element at any depth, or a body object.
    Meta(MetaLocation),
    /// A header field that has no node yet.
    Header(TextStyle),
}

impl ArticleDocument {
    /// Number of slots in `container`: body nodes, metadata children, or
    /// characters for a text block.
    pub fn container_len(&self, container: &str) -> Result<usize, MutationError> {
        let resolved = self.resolve_container(container)?;
        Ok(self.len_of(&resolved))
    }

    /// Inserts a node built from `payload` at `position` in `container`.
    ///
    /// Containers are `body`, `itemMeta`, `contentMeta`, the id of a metadata
    /// element or body object (nested insertion), the id of a text block
    /// (annotation payloads, `position` is the start offset), or a header
    /// field name.
    pub fn insert_node(
        &mut self,
        container: &str,
        position: usize,
        payload: &Value,
    ) -> Result<NodeId, MutationError> {
        let target = self.resolve_container(container)?;
        let len = self.len_of(&target);
        if position > len {
            return Err(MutationError::PositionOutOfRange {
                container: container.to_string(),
                position,
                len,
            });
        }

        match target {
            Container::Body => {
                let mut node = block_payload(payload)?;
                self.check_new_ids(&content_ids(&node))?;
                let id = self.commit_content(&mut node);
                self.body.insert(position, id.clone());
                self.nodes.insert(id.clone(), node);
                Ok(id)
            }
            Container::Section(section) => {
                let mut meta = meta_payload(payload)?;
                self.check_new_meta(&meta)?;
                self.commit_meta(&mut meta);
                self.clear_markers(&meta);
                let id = meta.id.clone();
                insert_into_list(self.section_mut(section), position, meta);
                Ok(id)
            }
            Container::Meta(location) => {
                let mut meta = meta_payload(payload)?;
                self.check_new_meta(&meta)?;
                self.commit_meta(&mut meta);
                self.clear_markers(&meta);
                let id = meta.id.clone();
                let parent = self
                    .meta_at_mut(&location)
                    .ok_or_else(|| MutationError::ContainerNotFound(container.to_string()))?;
                parent.insert_element(position, meta);
                Ok(id)
            }
            Container::Text(text_id) => {
                let mut node = annotation_payload(payload, &text_id, position, len)?;
                self.check_new_ids(&content_ids(&node))?;
                let id = self.allocate_node_id(&mut node);
                let block = self
                    .nodes
                    .get_mut(&text_id)
                    .and_then(ContentNode::as_text_mut)
                    .ok_or_else(|| MutationError::ContainerNotFound(container.to_string()))?;
                block.annotations.push(id.clone());
                self.nodes.insert(id.clone(), node);
                Ok(id)
            }
            Container::Header(style) => {
                let field = style.idf_type().to_string();
                if self.contains(&field) {
                    return Err(MutationError::DuplicateId(field));
                }
                let mut node = header_payload(payload, style)?;
                let block = node.as_text_mut().ok_or_else(|| {
                    MutationError::InvalidPayload("header fields hold text".into())
                })?;
                block.style = style;
                set_id_attribute(&mut block.attributes, &field);
                node.id = field.clone();
                self.registry.insert(field.clone());
                self.header.push(field.clone());
                self.nodes.insert(field.clone(), node);
                Ok(field)
            }
        }
    }

    /// Deletes a node with its container reference, the annotations targeting
    /// it and the ids of everything nested inside it.
    pub fn delete_node(&mut self, id: &str) -> Result<(), MutationError> {
        if self.take_content(id).is_some() {
            tracing::debug!(id, "deleted content node");
            return Ok(());
        }

        let location = self
            .locate_meta(id)
            .ok_or_else(|| MutationError::NodeNotFound(id.to_string()))?;
        let removed = self
            .detach_meta(&location)
            .ok_or_else(|| MutationError::NodeNotFound(id.to_string()))?;
        self.unregister_meta(&removed);
        tracing::debug!(id, "deleted metadata node");
        Ok(())
    }

    /// Sets the field addressed by `path` on a node; `null` removes it.
    pub fn update_property(
        &mut self,
        id: &str,
        path: &[String],
        value: &Value,
    ) -> Result<(), MutationError> {
        let target = Target { node: id, path };
        if path.is_empty() || path.iter().map(String::as_str).eq(["id"]) {
            return Err(target.invalid_path());
        }

        if id == ROOT_ID {
            return self.update_root(path, value, target);
        }

        if let Some(node) = self.nodes.get(id) {
            let mut updated = node.clone();
            let previous = node.as_element().cloned();
            match &mut updated.kind {
                ContentKind::Text(block) => {
                    let is_header = self.header.iter().any(|h| h == id);
                    update_text_block(block, path, value, is_header, target)?;
                }
                ContentKind::Annotation(annotation) => {
                    let text_len = self
                        .nodes
                        .get(&annotation.target)
                        .and_then(ContentNode::as_text)
                        .map_or(0, |b| b.char_len());
                    update_annotation(annotation, path, value, text_len, target)?;
                }
                ContentKind::Object(meta) | ContentKind::Unsupported(meta) => {
                    update_meta(meta, path, value, target)?;
                }
            }
            if let (Some(previous), Some(meta)) = (previous, updated.as_element_mut()) {
                self.unregister_meta(&previous);
                self.commit_meta(meta);
            }
            if let Some(block) = updated.as_text() {
                self.clamp_annotations(block);
            }
            self.nodes.insert(id.to_string(), updated);
            return Ok(());
        }

        let location = self
            .locate_meta(id)
            .ok_or_else(|| MutationError::NodeNotFound(id.to_string()))?;
        let previous = self
            .meta_at(&location)
            .cloned()
            .ok_or_else(|| MutationError::NodeNotFound(id.to_string()))?;
        let mut updated = previous.clone();
        update_meta(&mut updated, path, value, target)?;

        self.unregister_meta(&previous);
        self.commit_meta(&mut updated);
        if marker_field(&updated, path).is_some() {
            self.clear_markers(&updated);
        }
        if let Some(slot) = self.meta_at_mut(&location) {
            *slot = updated;
        }
        Ok(())
    }

    /// Pulls the annotations of `block` back inside its text.
    fn clamp_annotations(&mut self, block: &TextBlock) {
        let len = block.char_len();
        for id in &block.annotations {
            if let Some(annotation) = self.nodes.get_mut(id).and_then(ContentNode::as_annotation_mut) {
                annotation.end = annotation.end.min(len);
                annotation.start = annotation.start.min(annotation.end);
            }
        }
    }

    /// Moves a node to `position` in `container`, counted after the node has
    /// left its old place.
    ///
    /// Body nodes move within the body; metadata elements move between
    /// metadata containers but never into their own subtree.
    pub fn move_node(
        &mut self,
        id: &str,
        container: &str,
        position: usize,
    ) -> Result<(), MutationError> {
        if let Some(node) = self.nodes.get(id) {
            if node.as_annotation().is_some() || self.header.iter().any(|h| h == id) {
                return Err(MutationError::InvalidPayload(format!(
                    "'{}' cannot be moved",
                    id
                )));
            }
            if !matches!(self.resolve_container(container)?, Container::Body) {
                return Err(MutationError::InvalidPayload(format!(
                    "body node '{}' can only move within the body",
                    id
                )));
            }
            let len = self.body.len().saturating_sub(1);
            if position > len {
                return Err(MutationError::PositionOutOfRange {
                    container: container.to_string(),
                    position,
                    len,
                });
            }
            self.body.retain(|b| b != id);
            self.body.insert(position, id.to_string());
            return Ok(());
        }

        let source = self
            .locate_meta(id)
            .ok_or_else(|| MutationError::NodeNotFound(id.to_string()))?;
        let target = self.resolve_container(container)?;
        let target_len = match &target {
            Container::Section(_) => self.len_of(&target),
            Container::Meta(location) => {
                let inside = match (self.meta_at(&source), self.meta_at(location)) {
                    (Some(moving), Some(parent)) => moving.find(&parent.id).is_some(),
                    _ => false,
                };
                if inside {
                    return Err(MutationError::InvalidPayload(format!(
                        "'{}' cannot move into its own subtree",
                        id
                    )));
                }
                self.len_of(&target)
            }
            _ => {
                return Err(MutationError::InvalidPayload(format!(
                    "metadata node '{}' can only move between metadata containers",
                    id
                )))
            }
        };
        let len = if same_parent(&source, &target) {
            target_len.saturating_sub(1)
        } else {
            target_len
        };
        if position > len {
            return Err(MutationError::PositionOutOfRange {
                container: container.to_string(),
                position,
                len,
            });
        }

        let node = self
            .detach_meta(&source)
            .ok_or_else(|| MutationError::NodeNotFound(id.to_string()))?;
        // Indices may have shifted; resolve the destination again.
        match self.resolve_container(container)? {
            Container::Section(section) => {
                insert_into_list(self.section_mut(section), position, node);
            }
            Container::Meta(location) => {
                if let Some(parent) = self.meta_at_mut(&location) {
                    parent.insert_element(position, node);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn update_root(
        &mut self,
        path: &[String],
        value: &Value,
        target: Target<'_>,
    ) -> Result<(), MutationError> {
        let [name] = path else {
            return Err(target.invalid_path());
        };
        let text = match value {
            Value::Null => String::new(),
            other => scalar(other).ok_or_else(|| {
                MutationError::InvalidPayload(format!("'{}' must be a scalar", name))
            })?,
        };
        match name.as_str() {
            "guid" => self.guid = text,
            "language" => self.language = text,
            _ => return Err(target.invalid_path()),
        }
        Ok(())
    }

    fn resolve_container(&self, name: &str) -> Result<Container, MutationError> {
        if name == BODY_ID {
            return Ok(Container::Body);
        }
        if name == ITEM_META_TAG {
            return Ok(Container::Section(MetaSection::ItemMeta));
        }
        if name == CONTENT_META_TAG {
            return Ok(Container::Section(MetaSection::ContentMeta));
        }
        if let Some(node) = self.nodes.get(name) {
            return match node.kind {
                ContentKind::Text(_) => Ok(Container::Text(node.id.clone())),
                ContentKind::Object(_) | ContentKind::Unsupported(_) => {
                    Ok(Container::Meta(MetaLocation {
                        owner: MetaOwner::Content(node.id.clone()),
                        path: Vec::new(),
                    }))
                }
                ContentKind::Annotation(_) => Err(MutationError::ContainerNotFound(name.into())),
            };
        }
        if let Some(location) = self.locate_meta(name) {
            return Ok(Container::Meta(location));
        }
        match TextStyle::parse(name) {
            Some(style) if style != TextStyle::Paragraph => Ok(Container::Header(style)),
            _ => Err(MutationError::ContainerNotFound(name.to_string())),
        }
    }

    fn len_of(&self, container: &Container) -> usize {
        match container {
            Container::Body => self.body.len(),
            Container::Section(section) => self.section(*section).len(),
            Container::Text(id) => self
                .nodes
                .get(id)
                .and_then(ContentNode::as_text)
                .map_or(0, |b| b.char_len()),
            Container::Meta(location) => self.meta_at(location).map_or(0, |m| m.element_count()),
            Container::Header(_) => 0,
        }
    }

    /// Takes a metadata element out of its parent without releasing its ids.
    fn detach_meta(&mut self, location: &MetaLocation) -> Option<MetadataNode> {
        let (last, parent_path) = location.path.split_last()?;
        match (&location.owner, parent_path.is_empty()) {
            (MetaOwner::Section(section), true) => {
                let list = self.section_mut(*section);
                (*last < list.len()).then(|| list.remove(*last))
            }
            _ => {
                let parent = MetaLocation {
                    owner: location.owner.clone(),
                    path: parent_path.to_vec(),
                };
                self.meta_at_mut(&parent)?.remove_element(*last)
            }
        }
    }

    fn check_new_ids(&self, ids: &[NodeId]) -> Result<(), MutationError> {
        let mut seen = Vec::new();
        for id in ids.iter().filter(|id| !id.is_empty()) {
            if self.contains(id) || seen.contains(&id) {
                return Err(MutationError::DuplicateId(id.clone()));
            }
            seen.push(id);
        }
        Ok(())
    }

    fn check_new_meta(&self, meta: &MetadataNode) -> Result<(), MutationError> {
        let mut ids = Vec::new();
        meta.collect_ids(&mut ids);
        self.check_new_ids(&ids)
    }

    /// Registers the ids of a detached tree, generating the missing ones.
    fn commit_meta(&mut self, node: &mut MetadataNode) {
        if node.id.is_empty() {
            node.id = self.allocate_id(node.local_tag(), None);
            if node.attribute("id") == Some("") {
                node.set_attribute("id", node.id.clone());
            }
        } else {
            self.registry.insert(node.id.clone());
        }
        for child in node.elements_mut() {
            self.commit_meta(child);
        }
    }

    fn allocate_node_id(&mut self, node: &mut ContentNode) -> NodeId {
        if node.id.is_empty() {
            let prefix = match &node.kind {
                ContentKind::Annotation(a) => a.mark.name(),
                ContentKind::Text(block) => block.style.name(),
                _ => OBJECT_TAG,
            };
            node.id = self.allocate_id(prefix, None);
        } else {
            self.registry.insert(node.id.clone());
        }
        node.id.clone()
    }

    /// Assigns ids to a new body node and writes them into its attributes.
    fn commit_content(&mut self, node: &mut ContentNode) -> NodeId {
        let is_object = matches!(node.kind, ContentKind::Object(_));
        if let Some(meta) = node.as_element_mut() {
            self.commit_meta(meta);
            let id = meta.id.clone();
            if is_object {
                set_id_attribute(&mut meta.attributes, &id);
            }
            node.id = id.clone();
            return id;
        }

        let id = self.allocate_node_id(node);
        if let Some(block) = node.as_text_mut() {
            set_id_attribute(&mut block.attributes, &id);
        }
        id
    }

    /// Clears marker attributes that `node` now carries from every other
    /// element of the same kind.
    fn clear_markers(&mut self, node: &MetadataNode) {
        let markers: Vec<(&'static str, String)> = node
            .schema()
            .attributes
            .iter()
            .filter(|f| f.flags.contains(FieldFlags::MARKER))
            .filter_map(|f| Some((f.name, node.attribute(f.name)?.to_string())))
            .collect();
        if markers.is_empty() {
            return;
        }

        let (kind, keep) = (node.kind, node.id.as_str());
        let mut clear = |other: &mut MetadataNode| {
            if other.kind != kind || other.id == keep {
                return;
            }
            for (name, value) in &markers {
                if other.attribute(name) == Some(value.as_str()) {
                    other.remove_attribute(name);
                    tracing::debug!(id = %other.id, marker = *name, "cleared marker");
                }
            }
        };
        for list in [&mut self.item_meta, &mut self.content_meta] {
            for item in list.iter_mut() {
                walk_mut(item, &mut clear);
            }
        }
    }
}

fn walk_mut(node: &mut MetadataNode, f: &mut dyn FnMut(&mut MetadataNode)) {
    f(node);
    for child in node.elements_mut() {
        walk_mut(child, f);
    }
}

fn content_ids(node: &ContentNode) -> Vec<NodeId> {
    match &node.kind {
        ContentKind::Object(meta) | ContentKind::Unsupported(meta) => {
            let mut ids = Vec::new();
            meta.collect_ids(&mut ids);
            ids
        }
        _ => vec![node.id.clone()],
    }
}

fn set_id_attribute(attributes: &mut Vec<(String, String)>, id: &str) {
    match attributes.iter_mut().find(|(k, _)| k == "id") {
        Some(slot) => slot.1 = id.to_string(),
        None => attributes.insert(0, ("id".to_string(), id.to_string())),
    }
}

/// A header payload is a text payload whose style defaults to the field.
fn header_payload(value: &Value, style: TextStyle) -> Result<ContentNode, MutationError> {
    let mut value = value.clone();
    if let Some(map) = value.as_object_mut() {
        map.entry("type")
            .or_insert_with(|| Value::String(style.name().to_string()));
    }
    block_payload(&value)
}

fn same_parent(source: &MetaLocation, target: &Container) -> bool {
    let Some((_, parent_path)) = source.path.split_last() else {
        return false;
    };
    match target {
        Container::Section(section) => {
            source.owner == MetaOwner::Section(*section) && parent_path.is_empty()
        }
        Container::Meta(location) => location.owner == source.owner && location.path == parent_path,
        _ => false,
    }
}

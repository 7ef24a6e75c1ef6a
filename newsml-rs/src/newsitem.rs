//! Typed access to the item metadata of an article.
//!
//! Channels, sections, publication status and times, authors and other
//! links, and the objects kept in `contentMeta > metadata`. Every change
//! goes through the mutation helpers, so the usual guarantees hold: ids stay
//! unique, a failed call leaves the document untouched, and at most one
//! service carries the main-channel marker.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::constants::{
    AUTHOR_LINK_TYPE, CHANNEL_QCODE_PREFIX, CONTENT_META_TAG, ITEM_META_TAG, MAIN_CHANNEL_MARKER,
    NIL_UUID, OBJECT_TAG, PUB_START_TYPE, PUB_STOP_TYPE, ROOT_ID, SECTION_QCODE_PREFIX,
};
use crate::error::MutationError;
use crate::import::is_teaser;
use crate::model::{ArticleDocument, ContentNode, MetadataNode, NodeId};
use crate::schema::MetaKind;

/// Relation used by [`ArticleDocument::links_by_type`] when none is given.
pub const DEFAULT_LINK_REL: &str = "subject";

/// A typed view of `itemMeta > links > link`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LinkNode {
    #[serde(rename = "type")]
    pub link_type: String,
    pub rel: String,
    pub title: String,
    /// May be [`NIL_UUID`] for authors that are only a name.
    pub uuid: String,
    /// Leaves of the link's `data` element.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, String>,
}

impl LinkNode {
    pub fn new(
        link_type: impl Into<String>,
        rel: impl Into<String>,
        title: impl Into<String>,
        uuid: impl Into<String>,
    ) -> Self {
        LinkNode {
            link_type: link_type.into(),
            rel: rel.into(),
            title: title.into(),
            uuid: uuid.into(),
            data: BTreeMap::new(),
        }
    }

    /// An author link.
    pub fn author(name: impl Into<String>, uuid: impl Into<String>) -> Self {
        LinkNode::new(AUTHOR_LINK_TYPE, "author", name, uuid)
    }

    pub fn from_meta(node: &MetadataNode) -> Self {
        let attribute = |name: &str| node.attribute(name).unwrap_or_default().to_string();
        let data: BTreeMap<String, String> = node
            .child("data")
            .map(|data| {
                data.elements()
                    .map(|leaf| (leaf.local_tag().to_string(), leaf.text()))
                    .collect()
            })
            .unwrap_or_default();
        LinkNode {
            link_type: attribute("type"),
            rel: attribute("rel"),
            title: attribute("title"),
            uuid: attribute("uuid"),
            data,
        }
    }

    fn to_payload(&self) -> Value {
        let mut payload = json!({
            "tag": "link",
            "title": self.title,
            "uuid": self.uuid,
            "rel": self.rel,
            "type": self.link_type,
        });
        if !self.data.is_empty() {
            payload["data"] = Value::Object(
                self.data
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                    .collect::<Map<_, _>>(),
            );
        }
        payload
    }
}

fn not_found(what: impl Into<String>) -> MutationError {
    MutationError::NodeNotFound(what.into())
}

fn is_channel(node: &MetadataNode) -> bool {
    node.kind == MetaKind::Service
        && node
            .attribute("qcode")
            .is_some_and(|q| q.contains(CHANNEL_QCODE_PREFIX))
}

impl ArticleDocument {
    pub fn set_guid(&mut self, guid: &str) -> Result<(), MutationError> {
        self.update_property(ROOT_ID, &["guid".to_string()], &json!(guid))
    }

    pub fn set_language(&mut self, language: &str) -> Result<(), MutationError> {
        self.update_property(ROOT_ID, &["language".to_string()], &json!(language))
    }

    fn item_meta_of_kind(&self, kind: MetaKind) -> impl Iterator<Item = &MetadataNode> {
        self.item_meta.iter().filter(move |n| n.kind == kind)
    }

    /// Services whose qcode contains `imchn`.
    pub fn channels(&self) -> Vec<&MetadataNode> {
        self.item_meta.iter().filter(|n| is_channel(n)).collect()
    }

    /// The service carrying `why="imext:main"`.
    pub fn main_channel(&self) -> Option<&MetadataNode> {
        self.item_meta_of_kind(MetaKind::Service)
            .find(|n| n.attribute("why") == Some(MAIN_CHANNEL_MARKER))
    }

    /// Services whose qcode contains `imsection`.
    pub fn sections(&self) -> Vec<&MetadataNode> {
        self.item_meta_of_kind(MetaKind::Service)
            .filter(|n| {
                n.attribute("qcode")
                    .is_some_and(|q| q.contains(SECTION_QCODE_PREFIX))
            })
            .collect()
    }

    /// Adds a channel service, replacing one with the same qcode. With
    /// `main`, the marker moves to the new channel.
    pub fn add_channel(&mut self, qcode: &str, main: bool) -> Result<NodeId, MutationError> {
        let mut payload = json!({"tag": "service", "qcode": qcode});
        if main {
            payload["why"] = json!(MAIN_CHANNEL_MARKER);
        }
        self.transaction(|doc| {
            doc.remove_channel(qcode)?;
            let len = doc.item_meta.len();
            doc.insert_node(ITEM_META_TAG, len, &payload)
        })
    }

    /// Removes the channel with `qcode`; returns false when there is none.
    pub fn remove_channel(&mut self, qcode: &str) -> Result<bool, MutationError> {
        let id = self
            .channels()
            .into_iter()
            .find(|n| n.attribute("qcode") == Some(qcode))
            .map(|n| n.id.clone());
        match id {
            Some(id) => self.delete_node(&id).map(|_| true),
            None => Ok(false),
        }
    }

    /// The qcode of `pubStatus`.
    pub fn pub_status(&self) -> Option<&str> {
        self.item_meta_of_kind(MetaKind::PubStatus)
            .next()
            .and_then(|n| n.attribute("qcode"))
    }

    pub fn set_pub_status(&mut self, qcode: &str) -> Result<(), MutationError> {
        let existing = self
            .item_meta_of_kind(MetaKind::PubStatus)
            .next()
            .map(|n| n.id.clone());
        match existing {
            Some(id) => self.update_property(&id, &["qcode".to_string()], &json!(qcode)),
            None => {
                let len = self.item_meta.len();
                self.insert_node(ITEM_META_TAG, len, &json!({"tag": "pubStatus", "qcode": qcode}))
                    .map(|_| ())
            }
        }
    }

    fn ext_property(&self, property_type: &str) -> Option<&MetadataNode> {
        self.item_meta_of_kind(MetaKind::ItemMetaExtProperty)
            .find(|n| n.attribute("type") == Some(property_type))
    }

    fn set_ext_property(&mut self, property_type: &str, value: &str) -> Result<(), MutationError> {
        match self.ext_property(property_type).map(|n| n.id.clone()) {
            Some(id) => self.update_property(&id, &["value".to_string()], &json!(value)),
            None => {
                let len = self.item_meta.len();
                let payload = json!({
                    "tag": "itemMetaExtProperty",
                    "type": property_type,
                    "value": value,
                });
                self.insert_node(ITEM_META_TAG, len, &payload).map(|_| ())
            }
        }
    }

    fn remove_ext_property(&mut self, property_type: &str) -> Result<bool, MutationError> {
        match self.ext_property(property_type).map(|n| n.id.clone()) {
            Some(id) => self.delete_node(&id).map(|_| true),
            None => Ok(false),
        }
    }

    /// Publication start, as written in `itemMetaExtProperty[type="imext:pubstart"]/@value`.
    pub fn pub_start(&self) -> Option<&str> {
        self.ext_property(PUB_START_TYPE)?.attribute("value")
    }

    pub fn set_pub_start(&mut self, value: &str) -> Result<(), MutationError> {
        self.set_ext_property(PUB_START_TYPE, value)
    }

    pub fn remove_pub_start(&mut self) -> Result<bool, MutationError> {
        self.remove_ext_property(PUB_START_TYPE)
    }

    pub fn pub_stop(&self) -> Option<&str> {
        self.ext_property(PUB_STOP_TYPE)?.attribute("value")
    }

    pub fn set_pub_stop(&mut self, value: &str) -> Result<(), MutationError> {
        self.set_ext_property(PUB_STOP_TYPE, value)
    }

    pub fn remove_pub_stop(&mut self) -> Result<bool, MutationError> {
        self.remove_ext_property(PUB_STOP_TYPE)
    }

    fn link_nodes(&self) -> impl Iterator<Item = &MetadataNode> {
        self.item_meta_of_kind(MetaKind::Links)
            .flat_map(|links| links.elements())
            .filter(|n| n.kind == MetaKind::Link)
    }

    fn find_link(&self, pred: impl Fn(&MetadataNode) -> bool) -> Option<NodeId> {
        self.link_nodes().find(|n| pred(n)).map(|n| n.id.clone())
    }

    /// Id of the first `links` element.
    fn links_container(&mut self) -> Result<NodeId, MutationError> {
        if let Some(links) = self.item_meta_of_kind(MetaKind::Links).next() {
            return Ok(links.id.clone());
        }
        let len = self.item_meta.len();
        self.insert_node(ITEM_META_TAG, len, &json!({"tag": "links"}))
    }

    pub fn authors(&self) -> Vec<LinkNode> {
        self.link_nodes()
            .filter(|n| n.attribute("type") == Some(AUTHOR_LINK_TYPE))
            .map(LinkNode::from_meta)
            .collect()
    }

    pub fn add_author(&mut self, name: &str, uuid: &str) -> Result<NodeId, MutationError> {
        self.add_link(&LinkNode::author(name, uuid))
    }

    /// Adds an author known only by name.
    pub fn add_simple_author(&mut self, name: &str) -> Result<NodeId, MutationError> {
        self.add_link(&LinkNode::author(name, NIL_UUID))
    }

    /// Renames the author with `uuid` and, when given, sets `data/email`.
    pub fn update_author(
        &mut self,
        uuid: &str,
        name: &str,
        email: Option<&str>,
    ) -> Result<(), MutationError> {
        let id = self
            .find_link(|n| {
                n.attribute("type") == Some(AUTHOR_LINK_TYPE) && n.attribute("uuid") == Some(uuid)
            })
            .ok_or_else(|| not_found(uuid))?;
        self.transaction(|doc| {
            doc.update_property(&id, &["title".to_string()], &json!(name))?;
            if let Some(email) = email {
                doc.update_property(&id, &["data".to_string(), "email".to_string()], &json!(email))?;
            }
            Ok(())
        })
    }

    pub fn remove_author_by_uuid(&mut self, uuid: &str) -> Result<(), MutationError> {
        let id = self
            .find_link(|n| {
                n.attribute("type") == Some(AUTHOR_LINK_TYPE) && n.attribute("uuid") == Some(uuid)
            })
            .ok_or_else(|| not_found(uuid))?;
        self.delete_node(&id)
    }

    pub fn remove_author_by_title(&mut self, title: &str) -> Result<(), MutationError> {
        let id = self
            .find_link(|n| {
                n.attribute("type") == Some(AUTHOR_LINK_TYPE) && n.attribute("title") == Some(title)
            })
            .ok_or_else(|| not_found(title))?;
        self.delete_node(&id)
    }

    /// Links of any of `types` with relation `rel` (default `subject`).
    pub fn links_by_type(&self, types: &[&str], rel: Option<&str>) -> Vec<LinkNode> {
        let rel = rel.unwrap_or(DEFAULT_LINK_REL);
        self.link_nodes()
            .filter(|n| {
                n.attribute("type").is_some_and(|t| types.contains(&t))
                    && n.attribute("rel") == Some(rel)
            })
            .map(LinkNode::from_meta)
            .collect()
    }

    /// Appends a link, creating `itemMeta > links` when missing.
    pub fn add_link(&mut self, link: &LinkNode) -> Result<NodeId, MutationError> {
        let payload = link.to_payload();
        self.transaction(|doc| {
            let links = doc.links_container()?;
            let len = doc.container_len(&links)?;
            doc.insert_node(&links, len, &payload)
        })
    }

    pub fn remove_link_by_uuid(&mut self, uuid: &str) -> Result<(), MutationError> {
        let id = self
            .find_link(|n| n.attribute("uuid") == Some(uuid))
            .ok_or_else(|| not_found(uuid))?;
        self.delete_node(&id)
    }

    pub fn remove_link_by_uuid_and_rel(&mut self, uuid: &str, rel: &str) -> Result<(), MutationError> {
        let id = self
            .find_link(|n| n.attribute("uuid") == Some(uuid) && n.attribute("rel") == Some(rel))
            .ok_or_else(|| not_found(uuid))?;
        self.delete_node(&id)
    }

    /// Objects of `contentMeta > metadata`, including a teaser that import
    /// moved into the body.
    fn content_meta_objects(&self) -> impl Iterator<Item = &MetadataNode> {
        let stored = self
            .content_meta
            .iter()
            .filter(|n| n.kind == MetaKind::Metadata)
            .flat_map(|n| n.elements())
            .filter(|n| n.local_tag() == OBJECT_TAG);
        let lifted = self
            .body
            .iter()
            .filter_map(move |id| self.nodes.get(id).and_then(ContentNode::as_element))
            .filter(|n| is_teaser(n));
        stored.chain(lifted)
    }

    pub fn content_meta_objects_by_type(&self, object_type: &str) -> Vec<&MetadataNode> {
        self.content_meta_objects()
            .filter(|n| n.attribute("type") == Some(object_type))
            .collect()
    }

    pub fn content_meta_object_by_id(&self, id: &str) -> Option<&MetadataNode> {
        self.content_meta_objects().find(|n| n.id == id)
    }

    /// Stores an object in `contentMeta > metadata`, replacing the object
    /// with the same id. The payload needs `id` and `type`.
    pub fn set_content_meta_object(&mut self, payload: &Value) -> Result<NodeId, MutationError> {
        let map = payload
            .as_object()
            .ok_or_else(|| MutationError::InvalidPayload("payload must be a JSON object".into()))?;
        let id = map
            .get("id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| MutationError::InvalidPayload("object is missing 'id'".into()))?
            .to_string();
        if map.get("type").and_then(Value::as_str).is_none() {
            return Err(MutationError::InvalidPayload("object is missing 'type'".into()));
        }
        let mut payload = payload.clone();
        payload["tag"] = json!(OBJECT_TAG);

        self.transaction(|doc| {
            if doc.content_meta_object_by_id(&id).is_some() {
                doc.delete_node(&id)?;
            }
            let existing = doc
                .content_meta
                .iter()
                .find(|n| n.kind == MetaKind::Metadata)
                .map(|n| n.id.clone());
            let metadata = match existing {
                Some(metadata) => metadata,
                None => {
                    let len = doc.content_meta.len();
                    doc.insert_node(CONTENT_META_TAG, len, &json!({"tag": "metadata"}))?
                }
            };
            let len = doc.container_len(&metadata)?;
            doc.insert_node(&metadata, len, &payload)
        })
    }

    /// Removes a content metadata object; returns false when there is none.
    pub fn remove_content_meta_object(&mut self, id: &str) -> Result<bool, MutationError> {
        if self.content_meta_object_by_id(id).is_none() {
            return Ok(false);
        }
        self.delete_node(id).map(|_| true)
    }

    /// Runs several mutations as one: on failure the document is restored.
    fn transaction<T>(
        &mut self,
        f: impl FnOnce(&mut ArticleDocument) -> Result<T, MutationError>,
    ) -> Result<T, MutationError> {
        let mut draft = self.clone();
        let value = f(&mut draft)?;
        *self = draft;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::import_document;
    use pretty_assertions::assert_eq;

    const ITEM: &str = r#"<newsItem guid="g" xml:lang="sv">
  <itemMeta>
    <itemClass qcode="ninat:text"/>
    <pubStatus qcode="imext:draft"/>
    <service qcode="imchn:sport" why="imext:main"/>
    <service qcode="imchn:news"/>
    <service qcode="imsection:local"/>
    <itemMetaExtProperty type="imext:pubstart" value="2016-02-08T20:37:25+01:00"/>
    <links>
      <link title="Ann" uuid="u-1" rel="author" type="x-im/author"/>
      <link title="Bo" uuid="00000000-0000-0000-0000-000000000000" rel="author" type="x-im/author"/>
      <link title="Football" uuid="t-1" rel="subject" type="x-im/category"/>
    </links>
  </itemMeta>
  <contentMeta>
    <metadata>
      <object id="nv" type="x-im/newsvalue">
        <data>
          <score>3</score>
        </data>
      </object>
      <object id="teaser-1" type="x-im/teaser" title="Read this"/>
    </metadata>
  </contentMeta>
  <contentSet>
    <inlineXML>
      <idf>
        <group type="body"/>
      </idf>
    </inlineXML>
  </contentSet>
</newsItem>"#;

    fn doc() -> ArticleDocument {
        import_document(ITEM).unwrap()
    }

    fn qcodes(nodes: Vec<&MetadataNode>) -> Vec<&str> {
        nodes
            .into_iter()
            .filter_map(|n| n.attribute("qcode"))
            .collect()
    }

    #[test]
    fn test_channels_and_sections() {
        let doc = doc();
        assert_eq!(qcodes(doc.channels()), vec!["imchn:sport", "imchn:news"]);
        assert_eq!(qcodes(doc.sections()), vec!["imsection:local"]);
        assert_eq!(doc.main_channel().unwrap().attribute("qcode"), Some("imchn:sport"));
    }

    #[test]
    fn test_add_main_channel_moves_marker() {
        let mut doc = doc();
        doc.add_channel("imchn:culture", true).unwrap();

        let marked: Vec<_> = doc
            .item_meta()
            .iter()
            .filter(|n| n.attribute("why") == Some(MAIN_CHANNEL_MARKER))
            .collect();
        assert_eq!(marked.len(), 1);
        assert_eq!(marked[0].attribute("qcode"), Some("imchn:culture"));

        doc.add_channel("imchn:news", true).unwrap();
        assert_eq!(doc.main_channel().unwrap().attribute("qcode"), Some("imchn:news"));
        assert_eq!(doc.channels().len(), 3);
    }

    #[test]
    fn test_remove_channel() {
        let mut doc = doc();
        assert!(doc.remove_channel("imchn:news").unwrap());
        assert!(!doc.remove_channel("imchn:news").unwrap());
        assert_eq!(doc.channels().len(), 1);
    }

    #[test]
    fn test_pub_status_and_times() {
        let mut doc = doc();
        assert_eq!(doc.pub_status(), Some("imext:draft"));
        doc.set_pub_status("imext:usable").unwrap();
        assert_eq!(doc.pub_status(), Some("imext:usable"));

        assert_eq!(doc.pub_start(), Some("2016-02-08T20:37:25+01:00"));
        doc.set_pub_start("2017-01-01T00:00:00+01:00").unwrap();
        assert_eq!(doc.pub_start(), Some("2017-01-01T00:00:00+01:00"));
        assert!(doc.remove_pub_start().unwrap());
        assert_eq!(doc.pub_start(), None);

        assert_eq!(doc.pub_stop(), None);
        doc.set_pub_stop("2030-01-01T00:00:00+01:00").unwrap();
        assert_eq!(doc.pub_stop(), Some("2030-01-01T00:00:00+01:00"));
    }

    #[test]
    fn test_authors() {
        let mut doc = doc();
        assert_eq!(doc.authors().len(), 2);
        assert_eq!(doc.authors()[1].uuid, NIL_UUID);

        doc.add_author("Cia", "u-3").unwrap();
        doc.add_simple_author("Dan").unwrap();
        assert_eq!(doc.authors().len(), 4);

        doc.update_author("u-1", "Anna", Some("anna@example.com")).unwrap();
        let anna = &doc.authors()[0];
        assert_eq!(anna.title, "Anna");
        assert_eq!(anna.data.get("email").map(String::as_str), Some("anna@example.com"));

        doc.remove_author_by_uuid("u-3").unwrap();
        doc.remove_author_by_title("Dan").unwrap();
        assert_eq!(doc.authors().len(), 2);

        assert_eq!(
            doc.remove_author_by_title("Nobody").unwrap_err(),
            MutationError::NodeNotFound("Nobody".into())
        );
        assert!(doc.update_author("u-9", "X", None).is_err());
    }

    #[test]
    fn test_links() {
        let mut doc = doc();
        let categories = doc.links_by_type(&["x-im/category"], None);
        assert_eq!(categories.len(), 1);
        assert_eq!(categories[0].title, "Football");
        assert!(doc.links_by_type(&["x-im/category"], Some("author")).is_empty());

        let mut tag = LinkNode::new("x-im/tag", "subject", "Cup", "t-2");
        tag.data.insert("score".into(), "1".into());
        doc.add_link(&tag).unwrap();
        assert_eq!(doc.links_by_type(&["x-im/tag", "x-im/category"], None).len(), 2);
        assert_eq!(doc.links_by_type(&["x-im/tag"], None)[0], tag);

        doc.remove_link_by_uuid_and_rel("t-2", "subject").unwrap();
        assert!(doc.remove_link_by_uuid_and_rel("t-1", "author").is_err());
        doc.remove_link_by_uuid("t-1").unwrap();
        assert!(doc.links_by_type(&["x-im/category"], None).is_empty());
    }

    #[test]
    fn test_add_link_creates_links() {
        let mut doc = ArticleDocument::default();
        doc.add_author("Ann", "u-1").unwrap();
        assert_eq!(doc.item_meta().len(), 1);
        assert_eq!(doc.item_meta()[0].tag, "links");
        assert_eq!(doc.authors()[0].title, "Ann");
    }

    #[test]
    fn test_content_meta_objects() {
        let mut doc = doc();
        assert_eq!(doc.content_meta_objects_by_type("x-im/newsvalue").len(), 1);
        assert_eq!(
            doc.content_meta_object_by_id("teaser-1").unwrap().attribute("title"),
            Some("Read this")
        );

        doc.set_content_meta_object(&json!({
            "id": "nv",
            "type": "x-im/newsvalue",
            "data": {"score": 5}
        }))
        .unwrap();
        let nv = doc.content_meta_object_by_id("nv").unwrap();
        assert_eq!(nv.child("data").unwrap().child("score").unwrap().text(), "5");
        assert_eq!(doc.content_meta_objects_by_type("x-im/newsvalue").len(), 1);

        assert!(doc.set_content_meta_object(&json!({"type": "x-im/a"})).is_err());
        assert!(doc.remove_content_meta_object("nv").unwrap());
        assert!(!doc.remove_content_meta_object("nv").unwrap());
    }

    #[test]
    fn test_failed_composite_change_is_rolled_back() {
        let mut doc = doc();
        let err = doc
            .set_content_meta_object(&json!({
                "id": "nv",
                "type": "x-im/newsvalue",
                "children": [{"tag": "service"}]
            }))
            .unwrap_err();

        assert!(matches!(err, MutationError::InvalidPayload(_)));
        let nv = doc.content_meta_object_by_id("nv").unwrap();
        assert_eq!(nv.child("data").unwrap().child("score").unwrap().text(), "3");
    }

    #[test]
    fn test_guid_and_language() {
        let mut doc = doc();
        doc.set_guid("new-guid").unwrap();
        doc.set_language("en").unwrap();
        assert_eq!(doc.guid(), "new-guid");
        assert_eq!(doc.language(), "en");
    }
}

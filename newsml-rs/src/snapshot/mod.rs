//! Snapshot building.
//!
//! A snapshot is the XML of one document version: the base item (or the
//! configured template) with an ordered list of change records replayed on
//! top. Replay is all-or-nothing; the first record that cannot be decoded or
//! applied aborts the build with [`Error::Replay`] and no XML is produced.

mod change;
mod log;

pub use change::{ChangeKind, ChangeRecord};
pub use log::{ReplayEntry, ReplayLog};

use md5::{Digest, Md5};

use crate::config::CodecConfig;
use crate::error::{Error, Result};
use crate::export::Exporter;
use crate::import::Importer;
use crate::model::ArticleDocument;
use crate::xml::XmlDocument;

/// A built snapshot with the log of the changes that produced it.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub xml: String,
    /// MD5 of `xml`, lowercase hex.
    pub digest: String,
    pub log: ReplayLog,
}

/// Replays change records against a base document.
#[derive(Debug, Clone, Default)]
pub struct SnapshotBuilder {
    config: CodecConfig,
}

impl SnapshotBuilder {
    pub fn new(config: CodecConfig) -> Self {
        SnapshotBuilder { config }
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Builds the XML of `base` with `changes` applied.
    pub fn build(&self, base: Option<&str>, changes: &[ChangeRecord]) -> Result<String> {
        self.build_snapshot(base, changes).map(|s| s.xml)
    }

    /// Like [`SnapshotBuilder::build`], also returning the digest and the
    /// replay log.
    pub fn build_snapshot(&self, base: Option<&str>, changes: &[ChangeRecord]) -> Result<Snapshot> {
        let importer = Importer::new(self.config.clone());
        let skeleton = base.map(XmlDocument::parse).transpose()?;
        let mut doc = match &skeleton {
            Some(parsed) => importer.import_parsed(parsed)?,
            None => ArticleDocument::from_template(&self.config)?,
        };

        let log = self.replay(&mut doc, changes)?;
        let xml = Exporter::new(self.config.clone()).export_document(&doc, skeleton.as_ref())?;
        let digest = snapshot_digest(&xml);

        tracing::info!(
            changes = changes.len(),
            from_template = base.is_none(),
            digest = %digest,
            "built snapshot"
        );
        Ok(Snapshot { xml, digest, log })
    }

    /// Applies `changes` to `doc` in order.
    ///
    /// On failure `doc` holds every change before the failing one and must be
    /// discarded.
    pub fn replay(&self, doc: &mut ArticleDocument, changes: &[ChangeRecord]) -> Result<ReplayLog> {
        let mut log = ReplayLog::new();
        for (index, record) in changes.iter().enumerate() {
            let applied = record
                .to_mutation(|container| doc.container_len(container))
                .and_then(|mutation| mutation.apply(doc))
                .map_err(|e| Error::from(e).at_change(index))?;

            tracing::debug!(
                index,
                kind = %record.kind,
                target = %record.target_id,
                node = applied.as_deref().unwrap_or(""),
                "applied change"
            );
            log.record(index, record.kind, &record.target_id, applied);
        }
        Ok(log)
    }
}

/// Builds a snapshot with the default configuration.
pub fn build_snapshot(base: Option<&str>, changes: &[ChangeRecord]) -> Result<String> {
    SnapshotBuilder::default().build(base, changes)
}

/// MD5 digest of a snapshot, lowercase hex.
pub fn snapshot_digest(xml: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(xml.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MutationError;
    use serde_json::json;

    const BASE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<newsItem guid="abc" xml:lang="sv">
  <catalogRef href="http://example.com/catalog.xml"/>
  <itemMeta>
    <itemClass qcode="ninat:text"/>
  </itemMeta>
  <contentMeta>
    <metadata/>
  </contentMeta>
  <contentSet>
    <inlineXML>
      <idf>
        <group type="body">
          <element id="p1" type="body">First</element>
        </group>
      </idf>
    </inlineXML>
  </contentSet>
</newsItem>
"#;

    #[test]
    fn test_no_changes_reproduces_base() {
        assert_eq!(build_snapshot(Some(BASE), &[]).unwrap(), BASE);
    }

    #[test]
    fn test_insert_and_update() {
        let changes = vec![
            ChangeRecord::insert("body", None, json!({"type": "paragraph", "id": "p2", "text": "Second"})),
            ChangeRecord::update("p1", ["text"], json!("One")),
        ];
        let snapshot = SnapshotBuilder::default()
            .build_snapshot(Some(BASE), &changes)
            .unwrap();

        assert!(snapshot.xml.contains(r#"<element id="p1" type="body">One</element>"#));
        assert!(snapshot
            .xml
            .contains("<element id=\"p1\" type=\"body\">One</element>\n          <element id=\"p2\" type=\"body\">Second</element>"));
        assert_eq!(snapshot.log.count_by_kind(ChangeKind::Insert), 1);
        assert_eq!(snapshot.log.entries()[0].node.as_deref(), Some("p2"));
        assert_eq!(snapshot.digest, snapshot_digest(&snapshot.xml));
        assert_eq!(snapshot.digest.len(), 32);
    }

    #[test]
    fn test_failure_reports_index() {
        let changes = vec![
            ChangeRecord::update("p1", ["text"], json!("One")),
            ChangeRecord::delete("missing"),
        ];
        match build_snapshot(Some(BASE), &changes) {
            Err(Error::Replay { index, reason }) => {
                assert_eq!(index, 1);
                assert_eq!(reason, MutationError::NodeNotFound("missing".into()).to_string());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_template_base() {
        let changes = vec![ChangeRecord::insert(
            "body",
            Some(0),
            json!({"type": "paragraph", "text": "Hello"}),
        )];
        let xml = build_snapshot(None, &changes).unwrap();
        assert!(xml.contains(">Hello</element>"));
    }

    #[test]
    fn test_malformed_base() {
        assert!(matches!(
            build_snapshot(Some("<newsItem>"), &[]),
            Err(Error::MalformedXml(_))
        ));
    }
}

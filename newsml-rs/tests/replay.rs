//! Snapshot building from change logs.

use newsml_codec::{
    build_snapshot, import_document, snapshot_digest, ChangeKind, ChangeRecord, ChangeStore,
    CodecConfig, DocumentVersions, Error, MemoryChangeStore, MemorySnapshotStore, PluginConfig,
    SnapshotBuilder, TeaserPosition,
};
use pretty_assertions::assert_eq;
use serde_json::json;

const ARTICLE: &str = include_str!("fixtures/article.xml");
const CHANGES: &str = include_str!("fixtures/changes.json");

fn position(xml: &str, needle: &str) -> usize {
    xml.find(needle)
        .unwrap_or_else(|| panic!("{} not found in snapshot", needle))
}

#[test]
fn test_paragraph_into_empty_template() {
    let changes = vec![ChangeRecord::insert(
        "body",
        Some(0),
        json!({"type": "paragraph", "text": "Hello"}),
    )];
    let xml = build_snapshot(None, &changes).unwrap();

    let body = &xml[position(&xml, "<group id=\"body\"")..];
    let body = &body[..position(body, "</group>")];
    assert_eq!(body.matches("<element ").count(), 1);
    assert!(body.contains("type=\"body\">Hello</element>"));
}

#[test]
fn test_unknown_target_produces_no_snapshot() {
    let changes = vec![ChangeRecord::update("nowhere", ["text"], json!("x"))];
    match build_snapshot(Some(ARTICLE), &changes) {
        Err(Error::Replay { index, reason }) => {
            assert_eq!(index, 0);
            assert!(reason.contains("nowhere"));
        }
        other => panic!("expected a replay error, got {:?}", other),
    }
}

#[test]
fn test_fixture_change_log() {
    let changes = ChangeRecord::parse_list(CHANGES).unwrap();
    assert_eq!(changes.len(), 5);
    assert_eq!(changes[1].sha.as_deref(), Some("4f2a"));

    let snapshot = SnapshotBuilder::default()
        .build_snapshot(Some(ARTICLE), &changes)
        .unwrap();
    let xml = &snapshot.xml;

    assert!(xml.contains("<element id=\"p2\" type=\"body\">The visitors had led at half time.</element>"));
    assert!(xml.contains("<element id=\"p4\" type=\"body\">Both teams meet again in May.</element>"));
    assert!(!xml.contains("id=\"p3\""));
    assert!(xml.contains("<score>5</score>"));
    assert!(position(xml, "id=\"img\"") < position(xml, "id=\"p1\""));
    assert!(position(xml, "id=\"p2\"") < position(xml, "id=\"p4\""));

    // The teaser stays in content metadata.
    assert!(position(xml, "x-im/teaser") < position(xml, "<group id=\"body\""));

    assert_eq!(snapshot.log.len(), 5);
    assert_eq!(snapshot.log.count_by_kind(ChangeKind::Update), 2);
    assert_eq!(snapshot.log.entries()[1].node.as_deref(), Some("p4"));
}

#[test]
fn test_replay_is_deterministic() {
    let changes = ChangeRecord::parse_list(CHANGES).unwrap();
    let builder = SnapshotBuilder::default();

    let first = builder.build_snapshot(Some(ARTICLE), &changes).unwrap();
    let second = builder.build_snapshot(Some(ARTICLE), &changes).unwrap();
    assert_eq!(first.xml, second.xml);
    assert_eq!(first.digest, second.digest);
    assert_eq!(first.digest, snapshot_digest(&second.xml));
}

#[test]
fn test_generated_ids_are_deterministic() {
    let changes = vec![
        ChangeRecord::insert("body", None, json!({"type": "paragraph", "text": "One"})),
        ChangeRecord::insert("body", None, json!({"type": "paragraph", "text": "Two"})),
    ];
    let first = SnapshotBuilder::default().build_snapshot(None, &changes).unwrap();
    let second = SnapshotBuilder::default().build_snapshot(None, &changes).unwrap();

    assert_eq!(first.xml, second.xml);
    let ids: Vec<_> = first.log.entries().iter().map(|e| e.node.clone()).collect();
    assert_ne!(ids[0], ids[1]);
}

#[test]
fn test_replay_failure_is_atomic() {
    let mut changes = ChangeRecord::parse_list(CHANGES).unwrap();
    changes.insert(2, ChangeRecord::move_to("img", "body", 42));

    match build_snapshot(Some(ARTICLE), &changes) {
        Err(Error::Replay { index, .. }) => assert_eq!(index, 2),
        other => panic!("expected a replay error, got {:?}", other),
    }
}

#[test]
fn test_undecodable_record_reports_index() {
    let json = r#"[
        {"kind": "delete", "targetId": "p3"},
        {"kind": "rename", "targetId": "p1"}
    ]"#;
    match ChangeRecord::parse_list(json) {
        Err(Error::Replay { index, reason }) => {
            assert_eq!(index, 1);
            assert!(reason.starts_with("undecodable change record"));
        }
        other => panic!("expected a replay error, got {:?}", other),
    }
}

#[test]
fn test_incomplete_record_is_rejected() {
    let changes = vec![ChangeRecord {
        position: None,
        ..ChangeRecord::move_to("img", "body", 0)
    }];
    assert!(matches!(
        build_snapshot(Some(ARTICLE), &changes),
        Err(Error::Replay { index: 0, .. })
    ));
}

#[test]
fn test_configured_builder() {
    let plugins = PluginConfig::from_json(
        r#"{"plugins": {"se.infomaker.ximteaser": {"teaserPosition": "top"}}}"#,
    )
    .unwrap();
    let config = CodecConfig::from_accessor(&plugins);
    assert_eq!(config.teaser_position, TeaserPosition::Top);

    // With the teaser on top, position 0 comes before it.
    let changes = vec![ChangeRecord::insert(
        "body",
        Some(0),
        json!({"type": "paragraph", "id": "first", "text": "First"}),
    )];
    let xml = SnapshotBuilder::new(config).build(Some(ARTICLE), &changes).unwrap();

    let doc = import_document(&xml).unwrap();
    assert_eq!(doc.body()[0], "first");
}

#[test]
fn test_document_versions() {
    let mut docs = DocumentVersions::new(
        MemoryChangeStore::new(),
        MemorySnapshotStore::new(),
        SnapshotBuilder::default(),
    );
    docs.seed("match-report", Some(ARTICLE)).unwrap();
    for change in ChangeRecord::parse_list(CHANGES).unwrap() {
        docs.record("match-report", change).unwrap();
    }
    assert_eq!(docs.change_store().version("match-report").unwrap(), 5);

    assert_eq!(docs.materialize("match-report", 0).unwrap(), ARTICLE);
    let v1 = docs.materialize("match-report", 1).unwrap();
    assert!(v1.contains("The visitors had led at half time."));
    assert!(v1.contains("id=\"p3\""));

    docs.checkpoint("match-report").unwrap();
    let v5 = docs.materialize("match-report", 5).unwrap();
    let direct = build_snapshot(Some(ARTICLE), &ChangeRecord::parse_list(CHANGES).unwrap()).unwrap();
    assert_eq!(v5, direct);

    assert!(matches!(
        docs.record("match-report", ChangeRecord::delete("p3")),
        Err(Error::Replay { index: 5, .. })
    ));
}

//! Import and export of a complete news item.

use newsml_codec::{
    build_snapshot, export_document, import_document, ArticleDocument, CodecConfig, Error,
    Importer, LinkNode, NodeId, TeaserPosition, XmlDocument,
};
use pretty_assertions::assert_eq;

const ARTICLE: &str = include_str!("fixtures/article.xml");

fn import() -> (XmlDocument, ArticleDocument) {
    let skeleton = XmlDocument::parse(ARTICLE).unwrap();
    let doc = Importer::default().import_parsed(&skeleton).unwrap();
    (skeleton, doc)
}

fn count(haystack: &str, needle: &str) -> usize {
    haystack.matches(needle).count()
}

#[test]
fn test_round_trip_is_identity() {
    let (skeleton, doc) = import();
    assert_eq!(export_document(&doc, Some(&skeleton)).unwrap(), ARTICLE);
}

fn body_item(elements: &str) -> String {
    format!(
        "<newsItem><itemMeta/><contentMeta/><idf><group type=\"body\">{}</group></idf></newsItem>",
        elements
    )
}

fn round_trip(xml: &str) -> (ArticleDocument, String) {
    let skeleton = XmlDocument::parse(xml).unwrap();
    let doc = Importer::default().import_parsed(&skeleton).unwrap();
    let exported = export_document(&doc, Some(&skeleton)).unwrap();
    (doc, exported)
}

#[test]
fn test_round_trip_keeps_inline_markup() {
    let cases = [
        "<element id=\"p\" type=\"body\">a <em><strong>x</strong></em> b</element>",
        "<element id=\"p\" type=\"body\">a <strong><em>x</em></strong> b</element>",
        "<element id=\"p\" type=\"body\"><a href=\"u\"><em>x</em></a><em><a href=\"u\">y</a></em></element>",
        "<element id=\"p\" type=\"body\"><a id=\"l\">x</a></element>",
        "<element id=\"p\" type=\"body\">a<strong></strong>b</element>",
        "<element id=\"p\" type=\"body\">a<em><b/></em>b</element>",
    ];
    for elements in cases {
        let xml = body_item(elements);
        assert_eq!(round_trip(&xml).1, xml);
    }
}

#[test]
fn test_empty_inline_element_passes_through() {
    let (doc, _) = round_trip(&body_item("<element id=\"p\" type=\"body\">a<strong></strong>b</element>"));
    let node = doc.get(&doc.body()[0]).unwrap();
    assert!(node.as_text().is_none());
    assert!(node.as_element().is_some());
}

#[test]
fn test_round_trip_of_split_range() {
    let xml = body_item(
        "<element id=\"p\" type=\"body\"><strong>ab<em id=\"e1\">cd</em></strong><em id=\"e1\">ef</em></element>",
    );
    let (doc, exported) = round_trip(&xml);
    assert_eq!(exported, xml);

    let annotations = doc.annotations_of("p");
    let ranges: Vec<_> = annotations
        .iter()
        .map(|(_, a)| (a.mark.name(), a.start, a.end))
        .collect();
    assert_eq!(ranges, vec![("strong", 0, 4), ("emphasis", 2, 6)]);
    assert_eq!(annotations[1].0, "e1");
}

#[test]
fn test_round_trip_with_teaser_on_top() {
    let config = CodecConfig::default().with_teaser_position(TeaserPosition::Top);
    let skeleton = XmlDocument::parse(ARTICLE).unwrap();
    let doc = Importer::new(config.clone()).import_parsed(&skeleton).unwrap();

    assert_eq!(doc.body()[0], "tz");
    let xml = newsml_codec::Exporter::new(config)
        .export_document(&doc, Some(&skeleton))
        .unwrap();
    assert_eq!(xml, ARTICLE);
}

#[test]
fn test_export_is_idempotent() {
    let (skeleton, doc) = import();
    let first = export_document(&doc, Some(&skeleton)).unwrap();
    let second = export_document(&doc, Some(&skeleton)).unwrap();
    assert_eq!(first, second);

    // Re-importing the output gives the same output again.
    let reparsed = XmlDocument::parse(&first).unwrap();
    let again = Importer::default().import_parsed(&reparsed).unwrap();
    assert_eq!(export_document(&again, Some(&reparsed)).unwrap(), first);
}

#[test]
fn test_import_model() {
    let (_, doc) = import();

    assert_eq!(doc.guid(), "abc");
    assert_eq!(doc.language(), "sv");
    assert_eq!(doc.header(), &["headline".to_string(), "preamble".to_string()]);
    assert_eq!(
        doc.header_field("headline").unwrap().as_text().unwrap().text,
        "Late winner settles derby"
    );

    let body: Vec<&str> = doc.body().iter().map(String::as_str).collect();
    assert_eq!(body[..4], ["p1", "p2", "img", "p3"]);
    assert_eq!(body.last(), Some(&"tz"));

    let p1 = doc.get("p1").unwrap().as_text().unwrap();
    assert_eq!(p1.text, "The home side won 2-1 on Saturday.");
    assert_eq!(doc.annotations_of("p1").len(), 2);

    let summary = serde_json::to_value(doc.summary()).unwrap();
    assert_eq!(summary["guid"], "abc");
    assert_eq!(summary["body"][0]["type"], "paragraph");
}

#[test]
fn test_newsitem_metadata() {
    let (_, doc) = import();

    assert_eq!(doc.pub_status(), Some("imext:usable"));
    assert_eq!(doc.channels().len(), 2);
    assert_eq!(doc.sections().len(), 1);
    assert_eq!(
        doc.main_channel().and_then(|c| c.attribute("qcode")),
        Some("imchn:sport")
    );

    let authors = doc.authors();
    assert_eq!(authors.len(), 1);
    assert_eq!(authors[0].title, "Ann Writer");

    let categories = doc.links_by_type(&["x-im/category"], None);
    assert_eq!(categories.len(), 1);
    assert_eq!(categories[0].title, "Football");
    assert_eq!(doc.content_meta_objects_by_type("x-im/newsvalue").len(), 1);
}

#[test]
fn test_delete_leaves_no_dangling_references() {
    let (skeleton, mut doc) = import();
    let annotations: Vec<NodeId> = doc
        .annotations_of("p1")
        .into_iter()
        .map(|(id, _)| id.clone())
        .collect();
    let before = doc.node_count();

    doc.delete_node("p1").unwrap();

    assert!(doc.get("p1").is_none());
    assert!(!doc.body().iter().any(|id| id == "p1"));
    assert!(doc.body().iter().all(|id| doc.get(id).is_some()));
    for id in &annotations {
        assert!(!doc.contains(id));
        assert!(doc.get(id).is_none());
    }
    assert_eq!(doc.node_count(), before - 1 - annotations.len());

    let xml = export_document(&doc, Some(&skeleton)).unwrap();
    assert!(!xml.contains("id=\"p1\""));
    assert!(!xml.contains("<strong>"));
}

#[test]
fn test_single_main_channel() {
    let (skeleton, mut doc) = import();

    doc.add_channel("imchn:culture", true).unwrap();
    assert_eq!(
        doc.main_channel().and_then(|c| c.attribute("qcode")),
        Some("imchn:culture")
    );
    assert_eq!(doc.channels().len(), 2);

    doc.add_channel("imchn:news", true).unwrap();
    let xml = export_document(&doc, Some(&skeleton)).unwrap();
    assert_eq!(count(&xml, "why=\"imext:main\""), 1);
    assert!(xml.contains("<service qcode=\"imchn:news\" why=\"imext:main\"/>"));
}

#[test]
fn test_authors_and_links_are_written() {
    let (skeleton, mut doc) = import();

    doc.add_simple_author("Bo Freelance").unwrap();
    doc.add_link(&LinkNode::new("x-im/place", "subject", "Stockholm", "5f9b1c2e-0000-4000-8000-000000000009"))
        .unwrap();
    doc.remove_link_by_uuid("5f9b1c2e-0000-4000-8000-000000000002").unwrap();

    let xml = export_document(&doc, Some(&skeleton)).unwrap();
    assert!(xml.contains("title=\"Bo Freelance\""));
    assert!(xml.contains("uuid=\"00000000-0000-0000-0000-000000000000\""));
    assert!(xml.contains("title=\"Stockholm\""));
    assert!(!xml.contains("title=\"Football\""));
}

#[test]
fn test_guid_preserved_without_changes() {
    let xml = build_snapshot(Some(ARTICLE), &[]).unwrap();
    assert!(xml.contains("guid=\"abc\""));
    assert_eq!(xml, ARTICLE);
}

#[test]
fn test_rejects_invalid_input() {
    assert!(matches!(
        import_document("<newsItem><itemMeta></newsItem>"),
        Err(Error::MalformedXml(_))
    ));
    assert!(matches!(
        import_document("<newsItem><contentMeta/></newsItem>"),
        Err(Error::SchemaViolation(_))
    ));
    assert!(matches!(
        import_document("<newsItem><itemMeta/><contentMeta/></newsItem>&bogus;"),
        Err(Error::MalformedXml(_))
    ));
}

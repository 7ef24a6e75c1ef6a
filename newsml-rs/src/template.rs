//! The default "new article" item.
//!
//! Used as the base document when a snapshot is built without one, and as the
//! export skeleton when the caller has no parsed original.

/// An empty NewsML-G2 text article.
pub const DEFAULT_TEMPLATE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<newsItem xmlns="http://iptc.org/std/nar/2006-10-01/" conformance="power" guid="" standard="NewsML-G2" standardversion="2.20" version="1" xml:lang="sv">
    <catalogRef href="http://www.iptc.org/std/catalog/catalog.IPTC-G2-Standards_27.xml"/>
    <catalogRef href="http://infomaker.se/spec/catalog/catalog.infomaker.g2.1_0.xml"/>
    <itemMeta>
        <itemClass qcode="ninat:text"/>
        <provider literal="newsml-codec"/>
        <pubStatus qcode="imext:draft"/>
        <links xmlns="http://www.infomaker.se/newsml/1.0"/>
    </itemMeta>
    <contentMeta>
        <metadata xmlns="http://www.infomaker.se/newsml/1.0"/>
    </contentMeta>
    <contentSet>
        <inlineXML contenttype="application/nitf+xml">
            <idf xmlns="http://www.infomaker.se/idf/1.0" xml:lang="sv">
                <group id="header" type="header"/>
                <group id="body" type="body"/>
            </idf>
        </inlineXML>
    </contentSet>
</newsItem>
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{BODY_GROUP_SELECTOR, HEADER_GROUP_SELECTOR};
    use crate::xml::XmlDocument;

    #[test]
    fn test_template_has_anchors() {
        let doc = XmlDocument::parse(DEFAULT_TEMPLATE).unwrap();
        let root = doc.root().unwrap();

        assert_eq!(XmlDocument::tag(&root).as_deref(), Some("newsItem"));
        assert!(XmlDocument::find(&root, "itemMeta").unwrap().is_some());
        assert!(XmlDocument::find(&root, "contentMeta").unwrap().is_some());
        assert!(XmlDocument::find(&root, HEADER_GROUP_SELECTOR).unwrap().is_some());
        assert!(XmlDocument::find(&root, BODY_GROUP_SELECTOR).unwrap().is_some());
        assert_eq!(doc.serialize().unwrap(), DEFAULT_TEMPLATE);
    }
}

//! The schema mapping table.
//!
//! A compile-time description of how NewsML-G2 elements map onto the model:
//! which metadata tags are known and which of their XML attributes and child
//! elements are addressable fields, which IDF `element[type]` values are text
//! blocks, and which inline tags are annotation marks. The importer, the
//! exporter and the property-path resolver all read from these tables.

use bitflags::bitflags;
use serde::Serialize;

bitflags! {
    /// Flags describing how a scalar attribute field behaves.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FieldFlags: u8 {
        /// No special handling.
        const NONE = 0;
        /// The attribute must be present when the node is created and may not be removed.
        const REQUIRED = 1;
        /// Only one node of the kind may carry a given value of this attribute;
        /// setting it on one node clears it from the others.
        const MARKER = 2;
    }
}

/// Kinds of metadata elements, resolved by tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MetaKind {
    ItemClass,
    Provider,
    VersionCreated,
    FirstCreated,
    PubStatus,
    Service,
    Title,
    ItemMetaExtProperty,
    ContentMetaExtProperty,
    Links,
    Link,
    Metadata,
    Object,
    Data,
    /// Any element the table does not describe. Kept verbatim.
    Other,
}

/// A scalar field stored as an XML attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeField {
    pub name: &'static str,
    pub flags: FieldFlags,
}

const fn attr(name: &'static str, flags: FieldFlags) -> AttributeField {
    AttributeField { name, flags }
}

/// Schema entry for one metadata element kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementSchema {
    pub kind: MetaKind,
    pub tag: &'static str,
    /// Attribute fields in canonical output order.
    pub attributes: &'static [AttributeField],
    /// Child elements addressable as nested fields. Their contents form a
    /// free-form data bag.
    pub elements: &'static [&'static str],
    /// Whether the element's text content is a field.
    pub text: bool,
}

const R: FieldFlags = FieldFlags::REQUIRED;
const N: FieldFlags = FieldFlags::NONE;
const M: FieldFlags = FieldFlags::MARKER;

/// The metadata schema table.
pub static METADATA_SCHEMA: &[ElementSchema] = &[
    ElementSchema {
        kind: MetaKind::ItemClass,
        tag: "itemClass",
        attributes: &[attr("qcode", R)],
        elements: &[],
        text: false,
    },
    ElementSchema {
        kind: MetaKind::Provider,
        tag: "provider",
        attributes: &[attr("literal", N), attr("qcode", N)],
        elements: &[],
        text: false,
    },
    ElementSchema {
        kind: MetaKind::VersionCreated,
        tag: "versionCreated",
        attributes: &[],
        elements: &[],
        text: true,
    },
    ElementSchema {
        kind: MetaKind::FirstCreated,
        tag: "firstCreated",
        attributes: &[],
        elements: &[],
        text: true,
    },
    ElementSchema {
        kind: MetaKind::PubStatus,
        tag: "pubStatus",
        attributes: &[attr("qcode", R)],
        elements: &[],
        text: false,
    },
    ElementSchema {
        kind: MetaKind::Service,
        tag: "service",
        attributes: &[attr("qcode", R), attr("why", M), attr("pubconstraint", N)],
        elements: &["name"],
        text: false,
    },
    ElementSchema {
        kind: MetaKind::Title,
        tag: "title",
        attributes: &[],
        elements: &[],
        text: true,
    },
    ElementSchema {
        kind: MetaKind::ItemMetaExtProperty,
        tag: "itemMetaExtProperty",
        attributes: &[attr("type", R), attr("value", N)],
        elements: &[],
        text: false,
    },
    ElementSchema {
        kind: MetaKind::ContentMetaExtProperty,
        tag: "contentMetaExtProperty",
        attributes: &[attr("type", R), attr("value", N)],
        elements: &[],
        text: false,
    },
    ElementSchema {
        kind: MetaKind::Links,
        tag: "links",
        attributes: &[],
        elements: &["link"],
        text: false,
    },
    ElementSchema {
        kind: MetaKind::Link,
        tag: "link",
        attributes: &[
            attr("title", N),
            attr("uuid", N),
            attr("rel", R),
            attr("type", N),
            attr("uri", N),
            attr("url", N),
        ],
        elements: &["data", "links"],
        text: false,
    },
    ElementSchema {
        kind: MetaKind::Metadata,
        tag: "metadata",
        attributes: &[],
        elements: &["object"],
        text: false,
    },
    ElementSchema {
        kind: MetaKind::Object,
        tag: "object",
        attributes: &[
            attr("id", N),
            attr("type", R),
            attr("uuid", N),
            attr("uri", N),
            attr("title", N),
        ],
        elements: &["data", "links"],
        text: false,
    },
    ElementSchema {
        kind: MetaKind::Data,
        tag: "data",
        attributes: &[],
        elements: &[],
        text: false,
    },
];

/// Schema used for unknown tags: no declared fields, everything pass-through.
pub static OTHER_SCHEMA: ElementSchema = ElementSchema {
    kind: MetaKind::Other,
    tag: "",
    attributes: &[],
    elements: &[],
    text: true,
};

impl MetaKind {
    /// Resolves a kind from an element's local name.
    pub fn from_tag(tag: &str) -> MetaKind {
        let local = crate::xml::local_name(tag);
        METADATA_SCHEMA
            .iter()
            .find(|s| s.tag == local)
            .map(|s| s.kind)
            .unwrap_or(MetaKind::Other)
    }

    /// Returns the schema entry of this kind.
    pub fn schema(self) -> &'static ElementSchema {
        METADATA_SCHEMA
            .iter()
            .find(|s| s.kind == self)
            .unwrap_or(&OTHER_SCHEMA)
    }
}

impl ElementSchema {
    /// Looks up a declared attribute field.
    pub fn attribute(&self, name: &str) -> Option<&'static AttributeField> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Returns true if `name` is a declared nested element field.
    pub fn has_element(&self, name: &str) -> bool {
        self.elements.contains(&name)
    }

    /// Names of the attributes that must be present.
    pub fn required_attributes(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.attributes
            .iter()
            .filter(|a| a.flags.contains(FieldFlags::REQUIRED))
            .map(|a| a.name)
    }
}

/// Text block styles of IDF `element` nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TextStyle {
    Paragraph,
    Headline,
    Subheadline,
    Preamble,
    Blockquote,
    Dateline,
}

/// (style, model type name, IDF `element/@type` value)
static TEXT_STYLES: &[(TextStyle, &str, &str)] = &[
    (TextStyle::Paragraph, "paragraph", "body"),
    (TextStyle::Headline, "headline", "headline"),
    (TextStyle::Subheadline, "subheadline", "subheadline"),
    (TextStyle::Preamble, "preamble", "preamble"),
    (TextStyle::Blockquote, "blockquote", "blockquote"),
    (TextStyle::Dateline, "dateline", "dateline"),
];

impl TextStyle {
    /// Resolves a style from an IDF `element/@type` value.
    pub fn from_idf_type(value: &str) -> Option<TextStyle> {
        TEXT_STYLES
            .iter()
            .find(|(_, _, idf)| *idf == value)
            .map(|(s, _, _)| *s)
    }

    /// Resolves a style from its model type name.
    pub fn from_name(name: &str) -> Option<TextStyle> {
        TEXT_STYLES
            .iter()
            .find(|(_, n, _)| *n == name)
            .map(|(s, _, _)| *s)
    }

    /// Resolves either spelling, model name first.
    pub fn parse(value: &str) -> Option<TextStyle> {
        Self::from_name(value).or_else(|| Self::from_idf_type(value))
    }

    /// The model type name, e.g. `paragraph`.
    pub fn name(self) -> &'static str {
        TEXT_STYLES
            .iter()
            .find(|(s, _, _)| *s == self)
            .map(|(_, n, _)| *n)
            .unwrap_or("paragraph")
    }

    /// The IDF `element/@type` value, e.g. `body`.
    pub fn idf_type(self) -> &'static str {
        TEXT_STYLES
            .iter()
            .find(|(s, _, _)| *s == self)
            .map(|(_, _, t)| *t)
            .unwrap_or("body")
    }
}

/// Inline annotation marks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase", tag = "mark")]
pub enum Mark {
    Strong,
    Emphasis,
    Link {
        #[serde(skip_serializing_if = "Option::is_none")]
        href: Option<String>,
    },
}

impl Mark {
    /// Resolves a mark from an inline element's local name.
    pub fn from_tag(tag: &str, href: Option<&str>) -> Option<Mark> {
        match crate::xml::local_name(tag) {
            "strong" | "b" => Some(Mark::Strong),
            "em" | "i" => Some(Mark::Emphasis),
            "a" => Some(Mark::Link {
                href: href.map(str::to_string),
            }),
            _ => None,
        }
    }

    /// Resolves a mark from its model type name.
    pub fn from_name(name: &str, href: Option<&str>) -> Option<Mark> {
        match name {
            "strong" => Some(Mark::Strong),
            "emphasis" => Some(Mark::Emphasis),
            "link" => Some(Mark::Link {
                href: href.map(str::to_string),
            }),
            _ => None,
        }
    }

    /// The model type name.
    pub fn name(&self) -> &'static str {
        match self {
            Mark::Strong => "strong",
            Mark::Emphasis => "emphasis",
            Mark::Link { .. } => "link",
        }
    }

    /// The default inline tag used when writing a new annotation.
    pub fn tag(&self) -> &'static str {
        match self {
            Mark::Strong => "strong",
            Mark::Emphasis => "em",
            Mark::Link { .. } => "a",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_lookup_by_tag() {
        assert_eq!(MetaKind::from_tag("service"), MetaKind::Service);
        assert_eq!(MetaKind::from_tag("nitf:link"), MetaKind::Link);
        assert_eq!(MetaKind::from_tag("signal"), MetaKind::Other);
        assert_eq!(MetaKind::Other.schema().kind, MetaKind::Other);
    }

    #[test]
    fn test_service_fields() {
        let schema = MetaKind::Service.schema();
        assert!(schema
            .attribute("why")
            .unwrap()
            .flags
            .contains(FieldFlags::MARKER));
        assert_eq!(schema.required_attributes().collect::<Vec<_>>(), vec!["qcode"]);
        assert!(schema.attribute("uuid").is_none());
        assert!(schema.has_element("name"));
    }

    #[test]
    fn test_text_style_spellings() {
        assert_eq!(TextStyle::from_idf_type("body"), Some(TextStyle::Paragraph));
        assert_eq!(TextStyle::from_name("paragraph"), Some(TextStyle::Paragraph));
        assert_eq!(TextStyle::parse("body"), Some(TextStyle::Paragraph));
        assert_eq!(TextStyle::from_name("body"), None);
        assert_eq!(TextStyle::Headline.idf_type(), "headline");
        assert_eq!(TextStyle::from_idf_type("x-im/image"), None);
    }

    #[test]
    fn test_marks() {
        assert_eq!(Mark::from_tag("em", None), Some(Mark::Emphasis));
        assert_eq!(
            Mark::from_tag("a", Some("http://x")),
            Some(Mark::Link {
                href: Some("http://x".into())
            })
        );
        assert_eq!(Mark::from_tag("a", None), Some(Mark::Link { href: None }));
        assert_eq!(Mark::from_tag("span", None), None);
        assert_eq!(Mark::from_name("emphasis", None).unwrap().tag(), "em");
    }
}

//! Constants used throughout the codec.
//!
//! Structural anchors of the NewsML-G2 item and the reserved identifiers
//! accepted by the mutation helpers.

/// Tag of the item metadata section.
pub const ITEM_META_TAG: &str = "itemMeta";

/// Tag of the content metadata section.
pub const CONTENT_META_TAG: &str = "contentMeta";

/// Tag of the element holding body text blocks.
pub const TEXT_ELEMENT_TAG: &str = "element";

/// Tag of block embeds and content metadata objects.
pub const OBJECT_TAG: &str = "object";

/// Selector for the header group inside the IDF wrapper.
pub const HEADER_GROUP_SELECTOR: &str = r#"idf > group[type="header"]"#;

/// Selector for the body group inside the IDF wrapper.
pub const BODY_GROUP_SELECTOR: &str = r#"idf > group[type="body"]"#;

/// Selector for the content metadata container.
pub const METADATA_SELECTOR: &str = "contentMeta > metadata";

/// Selector for the teaser object stored in content metadata.
pub const TEASER_SELECTOR: &str = r#"contentMeta > metadata > object[type="x-im/teaser"]"#;

/// Object type of the teaser.
pub const TEASER_TYPE: &str = "x-im/teaser";

/// Value of `service/@why` that marks the main channel.
pub const MAIN_CHANNEL_MARKER: &str = "imext:main";

/// Qcode fragment identifying channel services.
pub const CHANNEL_QCODE_PREFIX: &str = "imchn";

/// Qcode fragment identifying section services.
pub const SECTION_QCODE_PREFIX: &str = "imsection";

/// Link type of authors.
pub const AUTHOR_LINK_TYPE: &str = "x-im/author";

/// The nil UUID used for authors not resolved against a concept store.
pub const NIL_UUID: &str = "00000000-0000-0000-0000-000000000000";

/// `itemMetaExtProperty/@type` of the publication start time.
pub const PUB_START_TYPE: &str = "imext:pubstart";

/// `itemMetaExtProperty/@type` of the publication stop time.
pub const PUB_STOP_TYPE: &str = "imext:pubstop";

/// Language used when the item has no `xml:lang`.
pub const DEFAULT_LANGUAGE: &str = "sv";

/// Attribute holding the item language.
pub const LANGUAGE_ATTR: &str = "xml:lang";

/// Reserved id addressing the item root in mutations.
pub const ROOT_ID: &str = "newsItem";

/// Reserved id of the body container.
pub const BODY_ID: &str = "body";

/// Plugin that owns the teaser position preference.
pub const TEASER_PLUGIN: &str = "se.infomaker.ximteaser";

/// Configuration key of the teaser position preference.
pub const TEASER_POSITION_KEY: &str = "teaserPosition";

/// Plugin that owns the codec's own settings.
pub const CODEC_PLUGIN: &str = "se.infomaker.newsml";

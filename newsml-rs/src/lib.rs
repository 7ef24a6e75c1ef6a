//! NewsML-G2 document codec and snapshot builder
//!
//! This library turns a NewsML-G2 news item into an editable article model
//! and back, and rebuilds any version of an article from a base item plus an
//! ordered log of change records.
//!
//! # Overview
//!
//! - [`Importer`] parses an item into an [`ArticleDocument`]: item and
//!   content metadata, header fields, and body blocks with inline annotations.
//! - [`Exporter`] writes a document back into the original item, leaving
//!   everything the model does not understand byte for byte as it was.
//! - The mutation helpers on [`ArticleDocument`] insert, delete, update and
//!   move nodes, validating before they change anything.
//! - [`SnapshotBuilder`] replays [`ChangeRecord`]s against a base item and
//!   exports the result. The same base and records always give the same XML.
//!
//! # Example
//!
//! ```
//! use newsml_codec::{build_snapshot, ChangeRecord};
//! use serde_json::json;
//!
//! let changes = vec![ChangeRecord::insert(
//!     "body",
//!     Some(0),
//!     json!({"type": "paragraph", "text": "Hello"}),
//! )];
//! let xml = build_snapshot(None, &changes).unwrap();
//! assert!(xml.contains(">Hello</element>"));
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod export;
pub mod import;
pub mod model;
pub mod mutation;
pub mod newsitem;
pub mod schema;
pub mod snapshot;
pub mod store;
pub mod template;
pub mod xml;

// Re-export commonly used types
pub use config::{CodecConfig, ConfigAccessor, PluginConfig, TeaserPosition};
pub use error::{Error, MutationError, Result};
pub use export::{export_document, Exporter};
pub use import::{import_document, Importer};
pub use model::{
    Annotation, ArticleDocument, ContentKind, ContentNode, DocumentSummary, MetaContent,
    MetaSection, MetadataNode, NodeId, TextBlock,
};
pub use mutation::Mutation;
pub use newsitem::LinkNode;
pub use schema::{Mark, MetaKind, TextStyle};
pub use snapshot::{
    build_snapshot, snapshot_digest, ChangeKind, ChangeRecord, ReplayLog, Snapshot,
    SnapshotBuilder,
};
pub use store::{
    ChangeStore, DocumentVersions, MemoryChangeStore, MemorySnapshotStore, SnapshotStore,
    StoredSnapshot, Version,
};
pub use xml::XmlDocument;

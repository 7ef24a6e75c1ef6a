//! Replay logging for the snapshot builder.
//!
//! This module records the change records applied while building a
//! snapshot: which kind of edit ran, what it targeted, and the node it
//! produced.

use std::io::Write;

use super::change::ChangeKind;
use crate::model::NodeId;

/// A single applied change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayEntry {
    /// Index of the record in the change list.
    pub index: usize,
    /// The kind of edit.
    pub kind: ChangeKind,
    /// The record's `targetId`.
    pub target: String,
    /// The node created by an insert.
    pub node: Option<NodeId>,
}

/// Log of changes applied during one replay.
#[derive(Debug, Default, Clone)]
pub struct ReplayLog {
    entries: Vec<ReplayEntry>,
}

impl ReplayLog {
    /// Creates a new empty log.
    pub fn new() -> Self {
        ReplayLog {
            entries: Vec::new(),
        }
    }

    /// Records an applied change.
    pub fn record(&mut self, index: usize, kind: ChangeKind, target: &str, node: Option<NodeId>) {
        self.entries.push(ReplayEntry {
            index,
            kind,
            target: target.to_string(),
            node,
        });
    }

    /// Returns the number of applied changes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the applied changes in order.
    pub fn entries(&self) -> &[ReplayEntry] {
        &self.entries
    }

    /// Counts applied changes of one kind.
    pub fn count_by_kind(&self, kind: ChangeKind) -> usize {
        self.entries.iter().filter(|e| e.kind == kind).count()
    }

    /// Writes the log as XML.
    pub fn write_xml<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writeln!(writer, "<?xml version=\"1.0\" encoding=\"UTF-8\"?>")?;
        writeln!(writer, "<replay>")?;

        for entry in &self.entries {
            write!(
                writer,
                "  <{} index=\"{}\" target=\"{}\"",
                entry.kind.as_str(),
                entry.index,
                escape_xml(&entry.target)
            )?;
            if let Some(node) = &entry.node {
                write!(writer, " node=\"{}\"", escape_xml(node))?;
            }
            writeln!(writer, " />")?;
        }

        writeln!(writer, "</replay>")?;
        Ok(())
    }
}

/// Escapes special characters in XML attribute values.
fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

//! Change records as stored in a document's change log.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, MutationError, Result};
use crate::mutation::Mutation;

/// The structural edit a record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Delete,
    Update,
    Move,
}

impl ChangeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeKind::Insert => "insert",
            ChangeKind::Delete => "delete",
            ChangeKind::Update => "update",
            ChangeKind::Move => "move",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded edit.
///
/// `targetId` names the container for inserts and the node otherwise. A move
/// carries its destination container in `value`. `sha`, `before` and `after`
/// belong to the collaboration protocol and are carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRecord {
    pub kind: ChangeKind,
    pub target_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<Value>,
}

impl ChangeRecord {
    fn bare(kind: ChangeKind, target_id: impl Into<String>) -> Self {
        ChangeRecord {
            kind,
            target_id: target_id.into(),
            path: None,
            position: None,
            value: None,
            sha: None,
            before: None,
            after: None,
        }
    }

    /// An insert into `container`; `None` appends.
    pub fn insert(container: impl Into<String>, position: Option<usize>, value: Value) -> Self {
        ChangeRecord {
            position,
            value: Some(value),
            ..Self::bare(ChangeKind::Insert, container)
        }
    }

    pub fn delete(id: impl Into<String>) -> Self {
        Self::bare(ChangeKind::Delete, id)
    }

    pub fn update<S: Into<String>>(
        id: impl Into<String>,
        path: impl IntoIterator<Item = S>,
        value: Value,
    ) -> Self {
        ChangeRecord {
            path: Some(path.into_iter().map(Into::into).collect()),
            value: Some(value),
            ..Self::bare(ChangeKind::Update, id)
        }
    }

    pub fn move_to(id: impl Into<String>, container: impl Into<String>, position: usize) -> Self {
        ChangeRecord {
            position: Some(position),
            value: Some(Value::String(container.into())),
            ..Self::bare(ChangeKind::Move, id)
        }
    }

    /// Decodes a JSON array of records.
    ///
    /// Each element is decoded on its own, so a record with an unknown kind or
    /// a bad shape fails with its index instead of being skipped.
    pub fn parse_list(json: &str) -> Result<Vec<ChangeRecord>> {
        let items: Vec<Value> = serde_json::from_str(json)?;
        items
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                serde_json::from_value(item).map_err(|e| Error::Replay {
                    index,
                    reason: format!("undecodable change record: {}", e),
                })
            })
            .collect()
    }

    /// Translates the record into a mutation against a document of which
    /// `container_len` reports container sizes.
    pub fn to_mutation(
        &self,
        container_len: impl FnOnce(&str) -> std::result::Result<usize, MutationError>,
    ) -> std::result::Result<Mutation, MutationError> {
        let missing = |field: &str| {
            MutationError::InvalidRecord(format!("{} record without '{}'", self.kind, field))
        };
        match self.kind {
            ChangeKind::Insert => {
                let payload = self.value.clone().ok_or_else(|| missing("value"))?;
                let position = match self.position {
                    Some(position) => position,
                    None => container_len(&self.target_id)?,
                };
                Ok(Mutation::Insert {
                    container: self.target_id.clone(),
                    position,
                    payload,
                })
            }
            ChangeKind::Delete => Ok(Mutation::Delete {
                id: self.target_id.clone(),
            }),
            ChangeKind::Update => {
                let path = self
                    .path
                    .clone()
                    .filter(|p| !p.is_empty())
                    .ok_or_else(|| missing("path"))?;
                // An absent value and JSON null both remove the field.
                Ok(Mutation::Update {
                    id: self.target_id.clone(),
                    path,
                    value: self.value.clone().unwrap_or(Value::Null),
                })
            }
            ChangeKind::Move => {
                let container = self
                    .value
                    .as_ref()
                    .and_then(Value::as_str)
                    .ok_or_else(|| missing("value"))?;
                let position = self.position.ok_or_else(|| missing("position"))?;
                Ok(Mutation::Move {
                    id: self.target_id.clone(),
                    container: container.to_string(),
                    position,
                })
            }
        }
    }
}

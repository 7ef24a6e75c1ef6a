//! Decoding of JSON insert payloads.
//!
//! Payloads are validated and turned into detached nodes before anything in
//! the document changes. Nodes without an explicit id carry an empty id until
//! they are committed.

use serde_json::{Map, Value};

use crate::constants::OBJECT_TAG;
use crate::error::MutationError;
use crate::model::{Annotation, ContentKind, ContentNode, MetadataNode, TextBlock};
use crate::schema::{Mark, MetaKind, TextStyle};

/// Keys with a fixed meaning; every other scalar key becomes an attribute.
const RESERVED_KEYS: &[&str] = &["tag", "id", "text", "data", "children"];

fn invalid(message: impl Into<String>) -> MutationError {
    MutationError::InvalidPayload(message.into())
}

/// Renders a JSON scalar as attribute or text content.
pub(crate) fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn as_object(value: &Value) -> Result<&Map<String, Value>, MutationError> {
    value
        .as_object()
        .ok_or_else(|| invalid("payload must be a JSON object"))
}

fn string_field<'a>(map: &'a Map<String, Value>, key: &str) -> Result<Option<&'a str>, MutationError> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(invalid(format!("'{}' must be a string", key))),
    }
}

fn offset_field(map: &Map<String, Value>, key: &str) -> Result<Option<usize>, MutationError> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .map(|n| Some(n as usize))
            .ok_or_else(|| invalid(format!("'{}' must be a non-negative integer", key))),
    }
}

/// The explicit `id` of a payload, if any.
pub(crate) fn explicit_id(value: &Value) -> Result<Option<String>, MutationError> {
    Ok(string_field(as_object(value)?, "id")?
        .filter(|id| !id.is_empty())
        .map(str::to_string))
}

/// Scalar attributes of a payload, in schema order first.
fn attributes(
    map: &Map<String, Value>,
    kind: MetaKind,
    skip: &[&str],
) -> Result<Vec<(String, String)>, MutationError> {
    let mut out = Vec::new();
    let mut push = |name: &str, value: &Value| -> Result<(), MutationError> {
        if value.is_null() {
            return Ok(());
        }
        let text = scalar(value).ok_or_else(|| invalid(format!("attribute '{}' must be a scalar", name)))?;
        out.push((name.to_string(), text));
        Ok(())
    };

    let schema = kind.schema();
    for field in schema.attributes {
        if let Some(value) = map.get(field.name) {
            if !skip.contains(&field.name) && !RESERVED_KEYS.contains(&field.name) {
                push(field.name, value)?;
            }
        }
    }
    for (name, value) in map {
        if RESERVED_KEYS.contains(&name.as_str())
            || skip.contains(&name.as_str())
            || schema.attribute(name).is_some()
        {
            continue;
        }
        push(name, value)?;
    }
    Ok(out)
}

/// Adds the members of a JSON object as child elements.
pub(crate) fn json_children(
    parent: &mut MetadataNode,
    map: &Map<String, Value>,
) -> Result<(), MutationError> {
    for (key, value) in map {
        match value {
            Value::Null => {}
            Value::Array(items) => {
                for item in items {
                    parent.insert_element(usize::MAX, json_element(key, item)?);
                }
            }
            other => parent.insert_element(usize::MAX, json_element(key, other)?),
        }
    }
    Ok(())
}

/// Builds an element from a JSON value: objects nest, scalars become text.
pub(crate) fn json_element(tag: &str, value: &Value) -> Result<MetadataNode, MutationError> {
    let mut node = MetadataNode::new(String::new(), tag);
    match value {
        Value::Object(map) => json_children(&mut node, map)?,
        Value::Array(_) => return Err(invalid(format!("nested array under '{}'", tag))),
        Value::Null => {}
        scalar_value => {
            let text = scalar(scalar_value).unwrap_or_default();
            node.set_text(&text);
        }
    }
    Ok(node)
}

/// Decodes a metadata element payload:
/// `{"tag": .., "id"?: .., <attributes>.., "text"?: .., "data"?: {..}, "children"?: [..]}`.
pub(crate) fn meta_payload(value: &Value) -> Result<MetadataNode, MutationError> {
    let map = as_object(value)?;
    let tag = string_field(map, "tag")?.ok_or_else(|| invalid("metadata payload needs a 'tag'"))?;
    if tag.is_empty() {
        return Err(invalid("empty tag"));
    }

    let mut node = MetadataNode::new(explicit_id(value)?.unwrap_or_default(), tag);
    node.attributes = attributes(map, node.kind, &[])?;
    if node.kind.schema().attribute("id").is_some() && !node.id.is_empty() {
        node.attributes.insert(0, ("id".to_string(), node.id.clone()));
    }
    fill_content(&mut node, map)?;
    check_required(&node)?;
    Ok(node)
}

fn fill_content(node: &mut MetadataNode, map: &Map<String, Value>) -> Result<(), MutationError> {
    if let Some(text) = map.get("text").filter(|v| !v.is_null()) {
        let text = scalar(text).ok_or_else(|| invalid("'text' must be a scalar"))?;
        node.set_text(&text);
    }
    if let Some(data) = map.get("data").filter(|v| !v.is_null()) {
        let data = data
            .as_object()
            .ok_or_else(|| invalid("'data' must be an object"))?;
        let mut element = MetadataNode::new(String::new(), "data");
        json_children(&mut element, data)?;
        node.insert_element(usize::MAX, element);
    }
    if let Some(children) = map.get("children").filter(|v| !v.is_null()) {
        let children = children
            .as_array()
            .ok_or_else(|| invalid("'children' must be an array"))?;
        for child in children {
            node.insert_element(usize::MAX, meta_payload(child)?);
        }
    }
    Ok(())
}

fn check_required(node: &MetadataNode) -> Result<(), MutationError> {
    for name in node.schema().required_attributes() {
        if node.attribute(name).is_none() {
            return Err(invalid(format!(
                "'{}' requires attribute '{}'",
                node.tag, name
            )));
        }
    }
    Ok(())
}

/// Decodes a header or body block payload.
///
/// `{"type": <style or object type>, "id"?: .., "text"?: .., "data"?: {..}}`
/// makes a text block or an object; a payload with a `tag` is a generic
/// element, an object when the tag is `object` and passed through otherwise.
pub(crate) fn block_payload(value: &Value) -> Result<ContentNode, MutationError> {
    let map = as_object(value)?;
    let id = explicit_id(value)?.unwrap_or_default();

    if map.contains_key("tag") {
        let meta = meta_payload(value)?;
        let kind = if meta.local_tag() == OBJECT_TAG {
            ContentKind::Object(meta)
        } else {
            ContentKind::Unsupported(meta)
        };
        return Ok(ContentNode { id, kind });
    }

    let block_type = string_field(map, "type")?.ok_or_else(|| invalid("block payload needs a 'type'"))?;
    if let Some(style) = TextStyle::parse(block_type) {
        let text = match map.get("text").filter(|v| !v.is_null()) {
            Some(text) => scalar(text).ok_or_else(|| invalid("'text' must be a scalar"))?,
            None => String::new(),
        };
        let mut block = TextBlock::new(&id, style, text);
        block.attributes.extend(attributes(map, MetaKind::Other, &["type"])?);
        return Ok(ContentNode {
            id,
            kind: ContentKind::Text(block),
        });
    }

    if block_type.starts_with("x-im/") {
        let mut meta = MetadataNode::new(id.clone(), OBJECT_TAG);
        meta.attributes = vec![
            ("id".to_string(), id.clone()),
            ("type".to_string(), block_type.to_string()),
        ];
        meta.attributes
            .extend(attributes(map, MetaKind::Object, &["id", "type"])?);
        fill_content(&mut meta, map)?;
        return Ok(ContentNode {
            id,
            kind: ContentKind::Object(meta),
        });
    }

    Err(invalid(format!("unknown block type '{}'", block_type)))
}

/// Decodes an annotation payload over a text of `text_len` characters:
/// `{"type": "strong"|"emphasis"|"link", "start"?: .., "end": .., "href"?: .., "id"?: ..}`.
pub(crate) fn annotation_payload(
    value: &Value,
    target: &str,
    position: usize,
    text_len: usize,
) -> Result<ContentNode, MutationError> {
    let map = as_object(value)?;
    let mark_name =
        string_field(map, "type")?.ok_or_else(|| invalid("annotation payload needs a 'type'"))?;
    let mark = Mark::from_name(mark_name, string_field(map, "href")?)
        .ok_or_else(|| invalid(format!("unknown mark '{}'", mark_name)))?;

    let start = offset_field(map, "start")?.unwrap_or(position);
    let end = offset_field(map, "end")?.ok_or_else(|| invalid("annotation payload needs an 'end'"))?;
    if start > end || end > text_len {
        return Err(invalid(format!(
            "range {}..{} outside text of length {}",
            start, end, text_len
        )));
    }

    let id = explicit_id(value)?.unwrap_or_default();
    let mut annotation = Annotation::new(mark, target, start, end);
    if !id.is_empty() {
        annotation.attributes.push(("id".to_string(), id.clone()));
    }
    Ok(ContentNode {
        id,
        kind: ContentKind::Annotation(annotation),
    })
}

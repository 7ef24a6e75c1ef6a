//! Property path resolution.
//!
//! A path names a field of a node: an attribute declared in the schema table
//! (or already present on the element), the element's text, or a nested
//! element such as `["data", "score"]`. Text blocks and annotations expose
//! their own small set of fields.

use serde_json::Value;

use super::payload::{json_children, json_element, scalar};
use crate::error::MutationError;
use crate::model::{Annotation, MetaContent, MetadataNode, TextBlock};
use crate::schema::{FieldFlags, Mark, MetaKind, TextStyle};

/// The node and path an update addresses, for error reporting.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Target<'a> {
    pub node: &'a str,
    pub path: &'a [String],
}

impl Target<'_> {
    pub fn invalid_path(&self) -> MutationError {
        MutationError::InvalidPath {
            node: self.node.to_string(),
            path: self.path.to_vec(),
        }
    }
}

fn invalid(message: impl Into<String>) -> MutationError {
    MutationError::InvalidPayload(message.into())
}

fn text_value(value: &Value, field: &str) -> Result<String, MutationError> {
    match value {
        Value::Null => Ok(String::new()),
        other => scalar(other).ok_or_else(|| invalid(format!("'{}' must be a scalar", field))),
    }
}

/// Attribute name set by a path on a metadata node, if the update lands on
/// a marker field.
pub(crate) fn marker_field(node: &MetadataNode, path: &[String]) -> Option<&'static str> {
    let [name] = path else {
        return None;
    };
    node.schema()
        .attribute(name)
        .filter(|field| field.flags.contains(FieldFlags::MARKER))
        .map(|field| field.name)
}

/// Applies `value` at `segments` below `node`.
pub(crate) fn update_meta(
    node: &mut MetadataNode,
    segments: &[String],
    value: &Value,
    target: Target<'_>,
) -> Result<(), MutationError> {
    match segments {
        [] => Err(target.invalid_path()),
        [name] => set_field(node, name, value, target),
        [name, rest @ ..] => {
            let index = match child_index(node, name) {
                Some(index) => index,
                None if can_create(node, name) && !value.is_null() => {
                    node.insert_element(usize::MAX, MetadataNode::new(String::new(), name.as_str()));
                    node.element_count() - 1
                }
                None => return Err(target.invalid_path()),
            };
            let child = node
                .elements_mut()
                .nth(index)
                .ok_or_else(|| target.invalid_path())?;
            update_meta(child, rest, value, target)
        }
    }
}

fn child_index(node: &MetadataNode, name: &str) -> Option<usize> {
    node.elements().position(|e| e.local_tag() == name)
}

/// Data bags and unknown elements accept any child name.
fn is_free_form(node: &MetadataNode) -> bool {
    matches!(node.kind, MetaKind::Data | MetaKind::Other)
}

fn can_create(node: &MetadataNode, name: &str) -> bool {
    node.schema().has_element(name) || is_free_form(node)
}

fn set_field(
    node: &mut MetadataNode,
    name: &str,
    value: &Value,
    target: Target<'_>,
) -> Result<(), MutationError> {
    let schema = node.schema();

    if name == "text" && schema.text {
        node.set_text(&text_value(value, name)?);
        return Ok(());
    }

    let declared = schema.attribute(name);
    if declared.is_some() || node.attribute(name).is_some() {
        return match value {
            Value::Null => {
                if declared.is_some_and(|f| f.flags.contains(FieldFlags::REQUIRED)) {
                    return Err(invalid(format!("'{}' is required on '{}'", name, node.tag)));
                }
                node.remove_attribute(name);
                Ok(())
            }
            other => {
                let text = scalar(other)
                    .ok_or_else(|| invalid(format!("attribute '{}' must be a scalar", name)))?;
                node.set_attribute(name, text);
                Ok(())
            }
        };
    }

    let existing = child_index(node, name);
    if existing.is_none() && !can_create(node, name) {
        return Err(target.invalid_path());
    }
    match (value, existing) {
        (Value::Null, Some(index)) => {
            node.remove_element(index);
            Ok(())
        }
        (Value::Null, None) => Err(target.invalid_path()),
        (Value::Array(_), _) => Err(invalid(format!("'{}' cannot be an array", name))),
        (Value::Object(map), existing) => {
            let mut replacement = MetadataNode::new(String::new(), name);
            json_children(&mut replacement, map)?;
            match existing {
                Some(index) => replace_element(node, index, replacement),
                None => node.insert_element(usize::MAX, replacement),
            }
            Ok(())
        }
        (scalar_value, Some(index)) => {
            let text = text_value(scalar_value, name)?;
            if let Some(child) = node.elements_mut().nth(index) {
                child.set_text(&text);
            }
            Ok(())
        }
        (scalar_value, None) => {
            node.insert_element(usize::MAX, json_element(name, scalar_value)?);
            Ok(())
        }
    }
}

/// Swaps the `index`-th child element, keeping the surrounding whitespace.
fn replace_element(node: &mut MetadataNode, index: usize, replacement: MetadataNode) {
    let slot = node
        .content
        .iter_mut()
        .filter(|c| matches!(c, MetaContent::Element(_)))
        .nth(index);
    if let Some(slot) = slot {
        *slot = MetaContent::Element(replacement);
    }
}

/// Applies an update to a text block.
pub(crate) fn update_text_block(
    block: &mut TextBlock,
    path: &[String],
    value: &Value,
    is_header: bool,
    target: Target<'_>,
) -> Result<(), MutationError> {
    let [name] = path else {
        return Err(target.invalid_path());
    };
    match name.as_str() {
        "text" => {
            block.text = text_value(value, name)?;
            Ok(())
        }
        "type" => {
            if is_header {
                return Err(invalid("the style of a header field is fixed"));
            }
            let style = value
                .as_str()
                .and_then(TextStyle::parse)
                .ok_or_else(|| invalid(format!("unknown text style {}", value)))?;
            block.style = style;
            Ok(())
        }
        attribute => {
            let position = block
                .attributes
                .iter()
                .position(|(k, _)| k == attribute)
                .ok_or_else(|| target.invalid_path())?;
            match value {
                Value::Null => {
                    block.attributes.remove(position);
                }
                other => {
                    block.attributes[position].1 = scalar(other)
                        .ok_or_else(|| invalid(format!("attribute '{}' must be a scalar", attribute)))?;
                }
            }
            Ok(())
        }
    }
}

/// Applies an update to an annotation over a text of `text_len` characters.
pub(crate) fn update_annotation(
    annotation: &mut Annotation,
    path: &[String],
    value: &Value,
    text_len: usize,
    target: Target<'_>,
) -> Result<(), MutationError> {
    let [name] = path else {
        return Err(target.invalid_path());
    };
    let offset = || {
        value
            .as_u64()
            .map(|n| n as usize)
            .ok_or_else(|| invalid(format!("'{}' must be a non-negative integer", name)))
    };
    let (start, end) = match name.as_str() {
        "start" => (offset()?, annotation.end),
        "end" => (annotation.start, offset()?),
        "href" => {
            let Mark::Link { href } = &mut annotation.mark else {
                return Err(target.invalid_path());
            };
            *href = match value {
                Value::Null => None,
                other => Some(text_value(other, name)?),
            };
            return Ok(());
        }
        _ => return Err(target.invalid_path()),
    };
    if start > end || end > text_len {
        return Err(invalid(format!(
            "range {}..{} outside text of length {}",
            start, end, text_len
        )));
    }
    annotation.start = start;
    annotation.end = end;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path(segments: &[&str]) -> Vec<String> {
        segments.iter().map(|s| s.to_string()).collect()
    }

    fn update(node: &mut MetadataNode, segments: &[&str], value: Value) -> Result<(), MutationError> {
        let p = path(segments);
        let target = Target { node: "n", path: &p };
        update_meta(node, &p, &value, target)
    }

    #[test]
    fn test_attribute_fields() {
        let mut service = MetadataNode::new("s", "service");
        service.set_attribute("qcode", "imchn:a");

        update(&mut service, &["why"], json!("imext:main")).unwrap();
        assert_eq!(service.attribute("why"), Some("imext:main"));

        update(&mut service, &["why"], Value::Null).unwrap();
        assert_eq!(service.attribute("why"), None);

        let err = update(&mut service, &["qcode"], Value::Null).unwrap_err();
        assert!(matches!(err, MutationError::InvalidPayload(_)));

        let err = update(&mut service, &["colour"], json!("red")).unwrap_err();
        assert_eq!(
            err,
            MutationError::InvalidPath {
                node: "n".into(),
                path: path(&["colour"])
            }
        );
    }

    #[test]
    fn test_nested_data_fields() {
        let mut object = MetadataNode::new("nv", "object");
        object.set_attribute("type", "x-im/newsvalue");

        update(&mut object, &["data", "score"], json!(5)).unwrap();
        assert_eq!(object.child("data").unwrap().child("score").unwrap().text(), "5");

        update(&mut object, &["data", "score"], json!("6")).unwrap();
        assert_eq!(object.child("data").unwrap().element_count(), 1);
        assert_eq!(object.child("data").unwrap().child("score").unwrap().text(), "6");

        update(&mut object, &["data", "score"], Value::Null).unwrap();
        assert_eq!(object.child("data").unwrap().element_count(), 0);

        update(&mut object, &["data"], json!({"a": "1", "b": {"c": true}})).unwrap();
        let data = object.child("data").unwrap();
        assert_eq!(data.child("b").unwrap().child("c").unwrap().text(), "true");

        assert!(update(&mut object, &["links", "x"], Value::Null).is_err());
        assert!(update(&mut object, &["bogus", "x"], json!(1)).is_err());
    }

    #[test]
    fn test_text_field() {
        let mut title = MetadataNode::new("t", "title");
        update(&mut title, &["text"], json!("Hello")).unwrap();
        assert_eq!(title.text(), "Hello");
        assert!(update(&mut title, &["text"], json!(["x"])).is_err());
    }

    #[test]
    fn test_marker_detection() {
        let service = MetadataNode::new("s", "service");
        assert_eq!(marker_field(&service, &path(&["why"])), Some("why"));
        assert_eq!(marker_field(&service, &path(&["qcode"])), None);
    }

    #[test]
    fn test_text_block_fields() {
        let mut block = TextBlock::new("p", TextStyle::Paragraph, "a");
        let p = path(&["type"]);
        let target = Target { node: "p", path: &p };

        update_text_block(&mut block, &p, &json!("subheadline"), false, target).unwrap();
        assert_eq!(block.style, TextStyle::Subheadline);
        assert!(update_text_block(&mut block, &p, &json!("headline"), true, target).is_err());

        let p = path(&["text"]);
        update_text_block(&mut block, &p, &json!("new"), false, Target { node: "p", path: &p }).unwrap();
        assert_eq!(block.text, "new");

        let p = path(&["lang"]);
        assert!(update_text_block(&mut block, &p, &json!("en"), false, Target { node: "p", path: &p }).is_err());
    }

    #[test]
    fn test_annotation_fields() {
        let mut annotation = Annotation::new(Mark::Link { href: Some("a".into()) }, "p", 0, 2);
        let p = path(&["end"]);
        let target = Target { node: "l", path: &p };

        update_annotation(&mut annotation, &p, &json!(4), 5, target).unwrap();
        assert_eq!(annotation.end, 4);
        assert!(update_annotation(&mut annotation, &p, &json!(9), 5, target).is_err());

        let p = path(&["href"]);
        update_annotation(&mut annotation, &p, &json!("b"), 5, Target { node: "l", path: &p }).unwrap();
        assert_eq!(annotation.mark, Mark::Link { href: Some("b".into()) });
    }
}

//! JSON wire format for documents
//!
//! ```json
//! {"type":"doc","attrs":{},"content":[{"type":"text","text":"hi","marks":[{"type":"bold"}]}]}
//! ```

use super::{Doc, Mark, MarkSpan};
use crate::content::{InvalidContentItem, InvalidContentKind};
use crate::errors::{ModelError, Result};
use crate::schema::{Schema, DOC_NODE, TEXT_NODE};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, BTreeSet};

/// Result of reading a JSON document against a schema
pub(crate) enum ParseOutcome {
    Valid(Doc),
    Invalid(Vec<InvalidContentItem>),
}

pub(crate) fn doc_to_json(doc: &Doc) -> Value {
    let size = doc.content_size();
    let mut bounds = BTreeSet::from([0, size]);
    for span in doc.marks() {
        bounds.insert(span.from);
        bounds.insert(span.to);
    }

    let bounds: Vec<usize> = bounds.into_iter().collect();
    let mut content = Vec::new();
    for window in bounds.windows(2) {
        let (from, to) = (window[0], window[1]);
        if from >= to {
            continue;
        }

        let mut node = Map::new();
        node.insert("type".into(), Value::from(TEXT_NODE));
        node.insert("text".into(), Value::from(doc.text.slice(from..to).to_string()));

        let marks: Vec<Value> = doc
            .marks()
            .iter()
            .filter(|span| span.from <= from && span.to >= to)
            .filter_map(|span| serde_json::to_value(&span.mark).ok())
            .collect();
        if !marks.is_empty() {
            node.insert("marks".into(), Value::Array(marks));
        }
        content.push(Value::Object(node));
    }

    let mut root = json!({ "type": DOC_NODE, "content": content });
    if !doc.attrs().is_empty() {
        if let Some(object) = root.as_object_mut() {
            object.insert(
                "attrs".into(),
                Value::Object(doc.attrs().clone().into_iter().collect()),
            );
        }
    }
    root
}

#[derive(Default)]
struct DocReader {
    text: String,
    size: usize,
    marks: Vec<MarkSpan>,
    invalid: Vec<InvalidContentItem>,
}

pub(crate) fn parse_doc(json: &Value, schema: &Schema) -> Result<ParseOutcome> {
    let object = json
        .as_object()
        .ok_or_else(|| ModelError::invalid_content("document JSON must be an object"))?;
    let node_type = node_type(object, &[])?;
    if node_type != DOC_NODE {
        return Err(ModelError::invalid_content(format!(
            "top level node must be '{DOC_NODE}', found '{node_type}'"
        )));
    }

    let attrs: BTreeMap<String, Value> = match object.get("attrs") {
        Some(Value::Object(attrs)) => attrs.clone().into_iter().collect(),
        Some(Value::Null) | None => BTreeMap::new(),
        Some(_) => return Err(ModelError::invalid_content("'attrs' must be an object")),
    };

    let mut reader = DocReader::default();
    reader.children(object, &[], schema)?;

    if !reader.invalid.is_empty() {
        return Ok(ParseOutcome::Invalid(reader.invalid));
    }
    Ok(ParseOutcome::Valid(Doc::from_parts(
        &reader.text,
        reader.marks,
        attrs,
    )))
}

fn node_type<'a>(object: &'a Map<String, Value>, path: &[usize]) -> Result<&'a str> {
    object
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| ModelError::invalid_content(format!("node at {path:?} has no 'type'")))
}

impl DocReader {
    fn children(&mut self, object: &Map<String, Value>, path: &[usize], schema: &Schema) -> Result<()> {
        let Some(content) = object.get("content") else {
            return Ok(());
        };
        let children = content.as_array().ok_or_else(|| {
            ModelError::invalid_content(format!("'content' at {path:?} must be an array"))
        })?;

        for (index, child) in children.iter().enumerate() {
            let mut child_path = path.to_vec();
            child_path.push(index);
            self.node(child, child_path, schema)?;
        }
        Ok(())
    }

    fn node(&mut self, node: &Value, path: Vec<usize>, schema: &Schema) -> Result<()> {
        let object = node
            .as_object()
            .ok_or_else(|| ModelError::invalid_content(format!("node at {path:?} is not an object")))?;
        let node_type = node_type(object, &path)?;

        if node_type != TEXT_NODE {
            if !schema.has_node(node_type) {
                self.invalid.push(InvalidContentItem {
                    path,
                    kind: InvalidContentKind::Node,
                    name: node_type.to_string(),
                });
                return Ok(());
            }
            return self.children(object, &path, schema);
        }

        let text = object
            .get("text")
            .and_then(Value::as_str)
            .ok_or_else(|| ModelError::invalid_content(format!("text node at {path:?} has no 'text'")))?;
        let from = self.size;
        self.text.push_str(text);
        self.size += text.chars().count();

        let Some(marks) = object.get("marks") else {
            return Ok(());
        };
        let marks = marks
            .as_array()
            .ok_or_else(|| ModelError::invalid_content(format!("'marks' at {path:?} must be an array")))?;
        for mark in marks {
            let mark: Mark = serde_json::from_value(mark.clone())?;
            if !schema.has_mark(&mark.name) {
                self.invalid.push(InvalidContentItem {
                    path: path.clone(),
                    kind: InvalidContentKind::Mark,
                    name: mark.name,
                });
                continue;
            }
            self.marks.push(MarkSpan {
                from,
                to: self.size,
                mark,
            });
        }
        Ok(())
    }
}

//! Converting user supplied content into documents
//!
//! Content arrives as plain text (converted by a named [`StringHandler`]), as
//! JSON in the document wire format, or as a ready [`Doc`]. JSON that names
//! node or mark types missing from the schema is reported through an
//! [`InvalidContentReport`]; an [`InvalidContentHandler`] may repair it.

use crate::document::{parse_doc, Doc, ParseOutcome};
use crate::errors::{ModelError, Result};
use crate::schema::Schema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Content accepted when creating a document
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    /// Text converted by a string handler
    Text(String),
    /// JSON in the document wire format
    Json(Value),
    /// An existing document snapshot
    Doc(Doc),
}

impl Content {
    /// Empty document content
    pub fn empty() -> Self {
        Self::Doc(Doc::empty())
    }
}

impl Default for Content {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<&str> for Content {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for Content {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Value> for Content {
    fn from(json: Value) -> Self {
        Self::Json(json)
    }
}

impl From<Doc> for Content {
    fn from(doc: Doc) -> Self {
        Self::Doc(doc)
    }
}

/// Whether an invalid entry was a node or a mark
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InvalidContentKind {
    Node,
    Mark,
}

/// One node or mark the schema does not know
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidContentItem {
    /// Child indices from the root `content` array down to the node
    pub path: Vec<usize>,
    pub kind: InvalidContentKind,
    pub name: String,
}

/// Everything wrong with a JSON document, handed to the error handler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidContentReport {
    pub json: Value,
    pub invalid_content: Vec<InvalidContentItem>,
}

impl fmt::Display for InvalidContentReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self
            .invalid_content
            .iter()
            .map(|item| item.name.as_str())
            .collect();
        write!(
            f,
            "{} invalid entries in content ({})",
            self.invalid_content.len(),
            names.join(", ")
        )
    }
}

type InvalidContentFn = dyn Fn(InvalidContentReport) -> Result<Value> + Send + Sync;

/// Repairs invalid JSON content or rejects it
#[derive(Clone)]
pub struct InvalidContentHandler(Arc<InvalidContentFn>);

impl InvalidContentHandler {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(InvalidContentReport) -> Result<Value> + Send + Sync + 'static,
    {
        Self(Arc::new(handler))
    }

    /// Handler that strips every invalid node and mark
    pub fn remove_invalid() -> Self {
        Self::new(|report| Ok(transformers::remove(&report)))
    }

    pub fn call(&self, report: InvalidContentReport) -> Result<Value> {
        (self.0)(report)
    }
}

impl fmt::Debug for InvalidContentHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("InvalidContentHandler(<fn>)")
    }
}

type StringHandlerFn = dyn Fn(&str, &Schema) -> Result<Doc> + Send + Sync;

/// Converts a string into a document, e.g. plain text or markdown
#[derive(Clone)]
pub struct StringHandler(Arc<StringHandlerFn>);

impl StringHandler {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&str, &Schema) -> Result<Doc> + Send + Sync + 'static,
    {
        Self(Arc::new(handler))
    }

    /// Handler that keeps the string as unformatted text
    pub fn plain_text() -> Self {
        Self::new(|text, _| Ok(Doc::from_text(text)))
    }

    pub fn call(&self, text: &str, schema: &Schema) -> Result<Doc> {
        (self.0)(text, schema)
    }
}

impl fmt::Debug for StringHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StringHandler(<fn>)")
    }
}

/// Collaborators used by [`create_document_node`]
#[derive(Debug, Clone, Copy)]
pub struct CreateDocumentOptions<'a> {
    pub schema: &'a Schema,
    pub string_handler: Option<&'a StringHandler>,
    pub on_error: Option<&'a InvalidContentHandler>,
}

impl<'a> CreateDocumentOptions<'a> {
    pub fn new(schema: &'a Schema) -> Self {
        Self {
            schema,
            string_handler: None,
            on_error: None,
        }
    }

    pub fn with_string_handler(mut self, handler: &'a StringHandler) -> Self {
        self.string_handler = Some(handler);
        self
    }

    pub fn with_on_error(mut self, handler: &'a InvalidContentHandler) -> Self {
        self.on_error = Some(handler);
        self
    }
}

/// Turn any supported content into a document valid for the schema
pub fn create_document_node(content: Content, options: CreateDocumentOptions<'_>) -> Result<Doc> {
    match content {
        Content::Doc(doc) => Ok(doc),
        Content::Text(text) => {
            let handler = options.string_handler.ok_or_else(|| {
                ModelError::invalid_content("string content requires a string handler")
            })?;
            handler.call(&text, options.schema)
        }
        Content::Json(json) => {
            let invalid_content = match parse_doc(&json, options.schema)? {
                ParseOutcome::Valid(doc) => return Ok(doc),
                ParseOutcome::Invalid(items) => items,
            };

            let report = InvalidContentReport {
                json,
                invalid_content,
            };
            let Some(handler) = options.on_error else {
                return Err(ModelError::invalid_content(report));
            };

            let repaired = handler.call(report)?;
            match parse_doc(&repaired, options.schema)? {
                ParseOutcome::Valid(doc) => Ok(doc),
                ParseOutcome::Invalid(items) => Err(ModelError::invalid_content(
                    InvalidContentReport {
                        json: repaired,
                        invalid_content: items,
                    },
                )),
            }
        }
    }
}

/// Ready made repairs for invalid content
pub mod transformers {
    use super::{InvalidContentKind, InvalidContentReport};
    use serde_json::Value;
    use std::collections::HashSet;

    /// Remove every node and mark named in the report
    pub fn remove(report: &InvalidContentReport) -> Value {
        let nodes: HashSet<&str> = names(report, InvalidContentKind::Node);
        let marks: HashSet<&str> = names(report, InvalidContentKind::Mark);
        let mut json = report.json.clone();
        strip(&mut json, &nodes, &marks);
        json
    }

    fn names(report: &InvalidContentReport, kind: InvalidContentKind) -> HashSet<&str> {
        report
            .invalid_content
            .iter()
            .filter(|item| item.kind == kind)
            .map(|item| item.name.as_str())
            .collect()
    }

    fn strip(node: &mut Value, nodes: &HashSet<&str>, marks: &HashSet<&str>) {
        let Some(object) = node.as_object_mut() else {
            return;
        };

        if let Some(Value::Array(node_marks)) = object.get_mut("marks") {
            node_marks.retain(|mark| {
                mark.get("type")
                    .and_then(Value::as_str)
                    .map_or(true, |name| !marks.contains(name))
            });
        }

        if let Some(Value::Array(children)) = object.get_mut("content") {
            children.retain(|child| {
                child
                    .get("type")
                    .and_then(Value::as_str)
                    .map_or(true, |name| !nodes.contains(name))
            });
            for child in children.iter_mut() {
                strip(child, nodes, marks);
            }
        }
    }
}

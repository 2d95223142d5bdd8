//! Schema describing which node and mark types a document may contain
//!
//! The `doc` and `text` node types are always present. Extensions contribute
//! further node and mark specs which are collected by a [`SchemaBuilder`].

use crate::errors::{ModelError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Name of the top level node type
pub const DOC_NODE: &str = "doc";

/// Name of the text node type
pub const TEXT_NODE: &str = "text";

/// Description of a node type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSpec {
    pub name: String,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub inline: bool,
    /// Attribute defaults
    #[serde(default)]
    pub attrs: BTreeMap<String, Value>,
}

impl NodeSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            group: None,
            inline: false,
            attrs: BTreeMap::new(),
        }
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn inline(mut self) -> Self {
        self.inline = true;
        self
    }

    pub fn with_attr(mut self, key: impl Into<String>, default: Value) -> Self {
        self.attrs.insert(key.into(), default);
        self
    }
}

/// Description of a mark type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkSpec {
    pub name: String,
    /// Whether text typed at the end of the mark inherits it
    #[serde(default = "default_inclusive")]
    pub inclusive: bool,
    #[serde(default)]
    pub attrs: BTreeMap<String, Value>,
}

fn default_inclusive() -> bool {
    true
}

impl MarkSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inclusive: true,
            attrs: BTreeMap::new(),
        }
    }

    pub fn exclusive(mut self) -> Self {
        self.inclusive = false;
        self
    }

    pub fn with_attr(mut self, key: impl Into<String>, default: Value) -> Self {
        self.attrs.insert(key.into(), default);
        self
    }
}

/// Immutable set of node and mark types
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    nodes: Vec<NodeSpec>,
    marks: Vec<MarkSpec>,
}

impl Schema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    pub fn node(&self, name: &str) -> Option<&NodeSpec> {
        self.nodes.iter().find(|node| node.name == name)
    }

    pub fn mark(&self, name: &str) -> Option<&MarkSpec> {
        self.marks.iter().find(|mark| mark.name == name)
    }

    pub fn has_node(&self, name: &str) -> bool {
        self.node(name).is_some()
    }

    pub fn has_mark(&self, name: &str) -> bool {
        self.mark(name).is_some()
    }

    pub fn nodes(&self) -> &[NodeSpec] {
        &self.nodes
    }

    pub fn marks(&self) -> &[MarkSpec] {
        &self.marks
    }

    pub fn node_names(&self) -> Vec<&str> {
        self.nodes.iter().map(|node| node.name.as_str()).collect()
    }

    pub fn mark_names(&self) -> Vec<&str> {
        self.marks.iter().map(|mark| mark.name.as_str()).collect()
    }
}

/// Collects node and mark specs into a [`Schema`]
#[derive(Debug, Clone, Default)]
pub struct SchemaBuilder {
    nodes: Vec<NodeSpec>,
    marks: Vec<MarkSpec>,
}

impl SchemaBuilder {
    pub fn node(mut self, spec: NodeSpec) -> Self {
        self.nodes.push(spec);
        self
    }

    pub fn mark(mut self, spec: MarkSpec) -> Self {
        self.marks.push(spec);
        self
    }

    pub fn add_node(&mut self, spec: NodeSpec) -> &mut Self {
        self.nodes.push(spec);
        self
    }

    pub fn add_mark(&mut self, spec: MarkSpec) -> &mut Self {
        self.marks.push(spec);
        self
    }

    /// Build the schema, rejecting duplicate names
    pub fn build(self) -> Result<Schema> {
        let mut nodes = vec![NodeSpec::new(DOC_NODE), NodeSpec::new(TEXT_NODE).inline()];

        for spec in self.nodes {
            if spec.name == DOC_NODE || spec.name == TEXT_NODE {
                continue;
            }
            if nodes.iter().any(|node| node.name == spec.name) {
                return Err(ModelError::DuplicateSchemaEntry {
                    kind: "node",
                    name: spec.name,
                });
            }
            nodes.push(spec);
        }

        let mut marks: Vec<MarkSpec> = Vec::with_capacity(self.marks.len());
        for spec in self.marks {
            if marks.iter().any(|mark| mark.name == spec.name) {
                return Err(ModelError::DuplicateSchemaEntry {
                    kind: "mark",
                    name: spec.name,
                });
            }
            marks.push(spec);
        }

        Ok(Schema { nodes, marks })
    }
}

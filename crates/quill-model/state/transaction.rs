//! Step-recording transactions
//!
//! A [`Transaction`] starts from the document of an [`EditorState`] and
//! records every change as a [`Step`]. The snapshot it started from stays
//! available through [`Transaction::before`] so a stale transaction can be
//! detected and its steps replayed onto a newer snapshot.
//!
//! [`EditorState`]: super::EditorState

use super::selection::Selection;
use super::step::{Assoc, Step};
use crate::document::{Doc, Mark};
use crate::errors::{ModelError, Result};
use crate::schema::Schema;
use ahash::AHashMap;
use serde_json::Value;
use std::sync::Arc;

/// An in-progress change to an editor state
#[derive(Debug, Clone)]
pub struct Transaction {
    schema: Arc<Schema>,
    before: Doc,
    doc: Doc,
    steps: Vec<Step>,
    selection: Selection,
    selection_set: bool,
    meta: AHashMap<String, Value>,
    scrolled_into_view: bool,
}

impl Transaction {
    pub(crate) fn new(schema: Arc<Schema>, doc: Doc, selection: Selection) -> Self {
        Self {
            schema,
            before: doc.clone(),
            doc,
            steps: Vec::new(),
            selection,
            selection_set: false,
            meta: AHashMap::new(),
            scrolled_into_view: false,
        }
    }

    /// The document this transaction was created from
    pub fn before(&self) -> &Doc {
        &self.before
    }

    /// The document after all recorded steps
    pub fn doc(&self) -> &Doc {
        &self.doc
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn doc_changed(&self) -> bool {
        !self.steps.is_empty()
    }

    pub fn selection_set(&self) -> bool {
        self.selection_set
    }

    pub fn scrolled_into_view(&self) -> bool {
        self.scrolled_into_view
    }

    /// Apply and record a step, mapping the selection through it
    pub fn step(&mut self, step: Step) -> Result<&mut Self> {
        if let Step::AddMark { mark, .. } = &step {
            self.check_mark(&mark.name)?;
        }

        self.doc = step.apply(&self.doc)?;
        if let Some(map) = step.step_map() {
            self.selection = self.selection.map(&map);
        }
        self.steps.push(step);
        Ok(self)
    }

    /// Replace the selection with text and put the cursor after it
    pub fn insert_text(&mut self, text: &str) -> Result<&mut Self> {
        let (from, to) = (self.selection.from(), self.selection.to());
        self.insert_text_at(text, from, to)?;
        self.selection = Selection::cursor(from + text.chars().count());
        Ok(self)
    }

    /// Replace `from..to` with text
    pub fn insert_text_at(&mut self, text: &str, from: usize, to: usize) -> Result<&mut Self> {
        self.step(Step::Replace {
            from,
            to,
            text: text.to_string(),
        })
    }

    pub fn delete(&mut self, from: usize, to: usize) -> Result<&mut Self> {
        self.insert_text_at("", from, to)
    }

    pub fn delete_selection(&mut self) -> Result<&mut Self> {
        let (from, to) = (self.selection.from(), self.selection.to());
        self.delete(from, to)
    }

    pub fn add_mark(&mut self, from: usize, to: usize, mark: Mark) -> Result<&mut Self> {
        self.step(Step::AddMark { from, to, mark })
    }

    pub fn remove_mark(&mut self, from: usize, to: usize, mark_type: &str) -> Result<&mut Self> {
        self.step(Step::RemoveMark {
            from,
            to,
            mark_type: mark_type.to_string(),
        })
    }

    /// Set a top level document attribute; `Value::Null` removes it
    pub fn set_doc_attribute(&mut self, key: &str, value: Value) -> Result<&mut Self> {
        self.step(Step::DocAttr {
            key: key.to_string(),
            value,
        })
    }

    pub fn set_selection(&mut self, selection: Selection) -> Result<&mut Self> {
        selection.validate(&self.doc)?;
        self.selection = selection;
        self.selection_set = true;
        Ok(self)
    }

    pub fn set_meta(&mut self, key: impl Into<String>, value: Value) -> &mut Self {
        self.meta.insert(key.into(), value);
        self
    }

    pub fn get_meta(&self, key: &str) -> Option<&Value> {
        self.meta.get(key)
    }

    pub fn meta(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.meta.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Map a position through the steps recorded from index `from_step` on
    pub fn map_from(&self, from_step: usize, pos: usize, assoc: Assoc) -> usize {
        self.steps
            .iter()
            .skip(from_step)
            .filter_map(Step::step_map)
            .fold(pos, |pos, map| map.map(pos, assoc))
    }

    /// Map a position through every recorded step
    pub fn map(&self, pos: usize, assoc: Assoc) -> usize {
        self.map_from(0, pos, assoc)
    }

    pub fn scroll_into_view(&mut self) -> &mut Self {
        self.scrolled_into_view = true;
        self
    }

    fn check_mark(&self, name: &str) -> Result<()> {
        if self.schema.has_mark(name) {
            Ok(())
        } else {
            Err(ModelError::UnknownMark {
                name: name.to_string(),
            })
        }
    }
}

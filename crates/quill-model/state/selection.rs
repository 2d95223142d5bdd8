//! Text selections

use super::step::{Assoc, StepMap};
use crate::document::Doc;
use crate::errors::{ModelError, Result};
use serde::{Deserialize, Serialize};

/// A text selection between `anchor` (fixed end) and `head` (moving end)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Selection {
    pub anchor: usize,
    pub head: usize,
}

impl Selection {
    pub const fn new(anchor: usize, head: usize) -> Self {
        Self { anchor, head }
    }

    pub const fn cursor(pos: usize) -> Self {
        Self::new(pos, pos)
    }

    /// Select the whole document
    pub fn all(doc: &Doc) -> Self {
        Self::new(0, doc.content_size())
    }

    pub fn at_end(doc: &Doc) -> Self {
        Self::cursor(doc.content_size())
    }

    pub fn from(&self) -> usize {
        self.anchor.min(self.head)
    }

    pub fn to(&self) -> usize {
        self.anchor.max(self.head)
    }

    pub fn empty(&self) -> bool {
        self.anchor == self.head
    }

    pub fn map(&self, map: &StepMap) -> Self {
        Self::new(map.map(self.anchor, Assoc::Right), map.map(self.head, Assoc::Right))
    }

    /// Clamp both ends into the document
    pub fn clamp(&self, doc: &Doc) -> Self {
        let size = doc.content_size();
        Self::new(self.anchor.min(size), self.head.min(size))
    }

    pub fn validate(&self, doc: &Doc) -> Result<()> {
        doc.check_position(self.anchor)?;
        doc.check_position(self.head)
    }
}

/// A selection described relative to a document that may not exist yet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PrimitiveSelection {
    Start,
    End,
    All,
    At(usize),
    Range { anchor: usize, head: usize },
}

impl PrimitiveSelection {
    pub fn resolve(&self, doc: &Doc) -> Result<Selection> {
        let selection = match *self {
            Self::Start => Selection::cursor(0),
            Self::End => Selection::at_end(doc),
            Self::All => Selection::all(doc),
            Self::At(pos) => Selection::cursor(pos),
            Self::Range { anchor, head } => Selection::new(anchor, head),
        };
        selection.validate(doc).map_err(|_| ModelError::PositionOutOfBounds {
            position: selection.to(),
            size: doc.content_size(),
        })?;
        Ok(selection)
    }
}

impl From<Selection> for PrimitiveSelection {
    fn from(selection: Selection) -> Self {
        Self::Range {
            anchor: selection.anchor,
            head: selection.head,
        }
    }
}

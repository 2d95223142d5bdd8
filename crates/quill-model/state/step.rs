//! Atomic document changes and position mapping

use crate::document::{Doc, Mark};
use crate::errors::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which side a position sticks to when content is inserted at it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assoc {
    Left,
    Right,
}

/// Position mapping produced by a replace step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepMap {
    from: usize,
    to: usize,
    inserted: usize,
}

impl StepMap {
    pub fn new(from: usize, to: usize, inserted: usize) -> Self {
        Self { from, to, inserted }
    }

    /// Map a position from the old document into the new one
    pub fn map(&self, pos: usize, assoc: Assoc) -> usize {
        if pos < self.from {
            return pos;
        }
        if pos > self.to {
            return pos - (self.to - self.from) + self.inserted;
        }

        let side = if self.from == self.to {
            assoc
        } else if pos == self.from {
            Assoc::Left
        } else if pos == self.to {
            Assoc::Right
        } else {
            assoc
        };

        match side {
            Assoc::Left => self.from,
            Assoc::Right => self.from + self.inserted,
        }
    }
}

/// A single recorded change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stepType", rename_all = "camelCase")]
pub enum Step {
    Replace {
        from: usize,
        to: usize,
        text: String,
    },
    #[serde(rename_all = "camelCase")]
    AddMark { from: usize, to: usize, mark: Mark },
    #[serde(rename_all = "camelCase")]
    RemoveMark {
        from: usize,
        to: usize,
        mark_type: String,
    },
    DocAttr { key: String, value: Value },
}

impl Step {
    pub fn apply(&self, doc: &Doc) -> Result<Doc> {
        match self {
            Self::Replace { from, to, text } => doc.replace(*from, *to, text),
            Self::AddMark { from, to, mark } => doc.with_mark(*from, *to, mark.clone()),
            Self::RemoveMark {
                from,
                to,
                mark_type,
            } => doc.without_mark(*from, *to, mark_type),
            Self::DocAttr { key, value } => Ok(doc.with_attr(key, value.clone())),
        }
    }

    /// Position mapping, present only for steps that move content
    pub fn step_map(&self) -> Option<StepMap> {
        match self {
            Self::Replace { from, to, text } => {
                Some(StepMap::new(*from, *to, text.chars().count()))
            }
            _ => None,
        }
    }
}

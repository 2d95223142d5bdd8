//! Immutable document snapshots
//!
//! A [`Doc`] is a rope of text plus a list of mark spans and top level
//! attributes. Positions are character offsets. Every editing method returns a
//! new snapshot and leaves the receiver untouched, so two snapshots can be
//! compared with `==` to decide whether a transaction is stale.

mod json;

pub(crate) use json::{parse_doc, ParseOutcome};

use crate::errors::{ModelError, Result};
use crate::state::{Assoc, StepMap};
use ropey::Rope;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// An inline mark such as `bold` or `link`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mark {
    #[serde(rename = "type")]
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: BTreeMap<String, Value>,
}

impl Mark {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: BTreeMap::new(),
        }
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attrs.insert(key.into(), value);
        self
    }
}

/// A mark applied to the half-open range `from..to`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkSpan {
    pub from: usize,
    pub to: usize,
    pub mark: Mark,
}

/// Immutable document snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct Doc {
    text: Rope,
    marks: Vec<MarkSpan>,
    attrs: BTreeMap<String, Value>,
}

impl Doc {
    /// Create an empty document
    pub fn empty() -> Self {
        Self {
            text: Rope::new(),
            marks: Vec::new(),
            attrs: BTreeMap::new(),
        }
    }

    /// Create a document containing plain text
    pub fn from_text(text: &str) -> Self {
        Self {
            text: Rope::from_str(text),
            marks: Vec::new(),
            attrs: BTreeMap::new(),
        }
    }

    pub(crate) fn from_parts(
        text: &str,
        mut marks: Vec<MarkSpan>,
        attrs: BTreeMap<String, Value>,
    ) -> Self {
        normalize(&mut marks);
        Self {
            text: Rope::from_str(text),
            marks,
            attrs,
        }
    }

    /// Number of character positions in the document
    pub fn content_size(&self) -> usize {
        self.text.len_chars()
    }

    pub fn is_empty(&self) -> bool {
        self.text.len_chars() == 0
    }

    pub fn text(&self) -> String {
        self.text.to_string()
    }

    /// Text between two positions
    pub fn text_between(&self, from: usize, to: usize) -> Result<String> {
        self.check_range(from, to)?;
        Ok(self.text.slice(from..to).to_string())
    }

    pub fn marks(&self) -> &[MarkSpan] {
        &self.marks
    }

    pub fn attrs(&self) -> &BTreeMap<String, Value> {
        &self.attrs
    }

    pub fn attr(&self, key: &str) -> Option<&Value> {
        self.attrs.get(key)
    }

    /// Marks covering the given position
    pub fn marks_at(&self, pos: usize) -> Vec<&Mark> {
        self.marks
            .iter()
            .filter(|span| covers(span, pos))
            .map(|span| &span.mark)
            .collect()
    }

    /// Whether a mark of the given type touches the range
    ///
    /// An empty range checks the mark directly before the position.
    pub fn has_mark(&self, from: usize, to: usize, name: &str) -> bool {
        self.marks.iter().any(|span| {
            span.mark.name == name
                && if from == to {
                    covers(span, from)
                } else {
                    span.from < to && span.to > from
                }
        })
    }

    /// Replace `from..to` with `text`
    pub fn replace(&self, from: usize, to: usize, text: &str) -> Result<Doc> {
        self.check_range(from, to)?;

        let mut rope = self.text.clone();
        rope.remove(from..to);
        rope.insert(from, text);

        let map = StepMap::new(from, to, text.chars().count());
        let mut marks: Vec<MarkSpan> = self
            .marks
            .iter()
            .map(|span| MarkSpan {
                from: map.map(span.from, Assoc::Right),
                to: map.map(span.to, Assoc::Right),
                mark: span.mark.clone(),
            })
            .collect();
        normalize(&mut marks);

        Ok(Doc {
            text: rope,
            marks,
            attrs: self.attrs.clone(),
        })
    }

    /// Add a mark over `from..to`, replacing any mark of the same type there
    pub fn with_mark(&self, from: usize, to: usize, mark: Mark) -> Result<Doc> {
        let mut doc = self.without_mark(from, to, &mark.name)?;
        if from < to {
            doc.marks.push(MarkSpan { from, to, mark });
            normalize(&mut doc.marks);
        }
        Ok(doc)
    }

    /// Remove every mark of the given type from `from..to`
    pub fn without_mark(&self, from: usize, to: usize, name: &str) -> Result<Doc> {
        self.check_range(from, to)?;

        let mut marks = Vec::with_capacity(self.marks.len() + 1);
        for span in &self.marks {
            if span.mark.name != name || span.to <= from || span.from >= to {
                marks.push(span.clone());
                continue;
            }
            if span.from < from {
                marks.push(MarkSpan {
                    from: span.from,
                    to: from,
                    mark: span.mark.clone(),
                });
            }
            if span.to > to {
                marks.push(MarkSpan {
                    from: to,
                    to: span.to,
                    mark: span.mark.clone(),
                });
            }
        }
        normalize(&mut marks);

        Ok(Doc {
            text: self.text.clone(),
            marks,
            attrs: self.attrs.clone(),
        })
    }

    /// Set a top level attribute; `Value::Null` removes it
    pub fn with_attr(&self, key: &str, value: Value) -> Doc {
        let mut attrs = self.attrs.clone();
        if value.is_null() {
            attrs.remove(key);
        } else {
            attrs.insert(key.to_string(), value);
        }
        Doc {
            text: self.text.clone(),
            marks: self.marks.clone(),
            attrs,
        }
    }

    /// Serialize into the JSON wire format
    pub fn to_json(&self) -> Value {
        json::doc_to_json(self)
    }

    pub(crate) fn check_position(&self, position: usize) -> Result<()> {
        let size = self.content_size();
        if position > size {
            return Err(ModelError::PositionOutOfBounds { position, size });
        }
        Ok(())
    }

    pub(crate) fn check_range(&self, from: usize, to: usize) -> Result<()> {
        let size = self.content_size();
        if from > to || to > size {
            return Err(ModelError::InvalidRange { from, to, size });
        }
        Ok(())
    }
}

impl Default for Doc {
    fn default() -> Self {
        Self::empty()
    }
}

fn covers(span: &MarkSpan, pos: usize) -> bool {
    (span.from < pos && pos <= span.to) || (pos == 0 && span.from == 0 && span.to > 0)
}

/// Drop empty spans, merge touching spans of the same mark and sort by position
fn normalize(spans: &mut Vec<MarkSpan>) {
    spans.retain(|span| span.from < span.to);
    spans.sort_by(|a, b| {
        a.mark
            .name
            .cmp(&b.mark.name)
            .then_with(|| a.from.cmp(&b.from))
    });

    let mut merged: Vec<MarkSpan> = Vec::with_capacity(spans.len());
    for span in spans.drain(..) {
        if let Some(last) = merged.last_mut() {
            if last.mark == span.mark && span.from <= last.to {
                last.to = last.to.max(span.to);
                continue;
            }
        }
        merged.push(span);
    }

    merged.sort_by(|a, b| {
        a.from
            .cmp(&b.from)
            .then_with(|| a.mark.name.cmp(&b.mark.name))
    });
    *spans = merged;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn bold() -> Mark {
        Mark::new("bold")
    }

    #[test]
    fn replace_shifts_marks() {
        let doc = Doc::from_text("hello world")
            .with_mark(6, 11, bold())
            .unwrap();
        let next = doc.replace(0, 5, "hi").unwrap();

        assert_eq!(next.text(), "hi world");
        assert_eq!(
            next.marks(),
            &[MarkSpan {
                from: 3,
                to: 8,
                mark: bold()
            }]
        );
        assert_eq!(doc.text(), "hello world");
    }

    #[test]
    fn typing_at_mark_end_extends_it() {
        let doc = Doc::from_text("ab").with_mark(0, 2, bold()).unwrap();
        let next = doc.replace(2, 2, "c").unwrap();
        assert_eq!(next.marks()[0].to, 3);

        let before = doc.replace(0, 0, "x").unwrap();
        assert_eq!(before.marks()[0].from, 1);
    }

    #[test]
    fn deleting_marked_text_drops_span() {
        let doc = Doc::from_text("abcdef").with_mark(2, 4, bold()).unwrap();
        let next = doc.replace(1, 5, "").unwrap();
        assert_eq!(next.text(), "af");
        assert!(next.marks().is_empty());
    }

    #[test]
    fn removing_middle_of_mark_splits_it() {
        let doc = Doc::from_text("abcdef").with_mark(0, 6, bold()).unwrap();
        let next = doc.without_mark(2, 4, "bold").unwrap();
        let ranges: Vec<_> = next.marks().iter().map(|s| (s.from, s.to)).collect();
        assert_eq!(ranges, vec![(0, 2), (4, 6)]);
    }

    #[test]
    fn adjacent_marks_merge() {
        let doc = Doc::from_text("abcdef")
            .with_mark(0, 3, bold())
            .unwrap()
            .with_mark(3, 6, bold())
            .unwrap();
        assert_eq!(doc.marks().len(), 1);
        assert!(doc.has_mark(1, 5, "bold"));
        assert!(doc.has_mark(6, 6, "bold"));
        assert!(!doc.has_mark(0, 6, "italic"));
    }

    #[test]
    fn snapshots_compare_by_content() {
        let a = Doc::from_text("same");
        let b = Doc::from_text("same");
        assert_eq!(a, b);
        assert_ne!(a, a.with_attr("lang", Value::from("en")));
    }

    #[test]
    fn out_of_range_edits_fail() {
        let doc = Doc::from_text("abc");
        assert_eq!(
            doc.replace(2, 9, "x").unwrap_err(),
            ModelError::InvalidRange {
                from: 2,
                to: 9,
                size: 3
            }
        );
        assert!(doc.text_between(2, 1).is_err());
    }
}

//! Ranges that follow the document while a delayed command waits
//!
//! A delayed command records where its value should land with
//! [`add_placeholder`]. The range travels in transaction meta until the
//! transaction is applied; from then on the manager maps it through every
//! later transaction, so edits made before the value arrives move it instead
//! of landing around it.

use super::{commands_meta, set_commands_meta};
use ahash::AHashMap;
use quill_model::{Assoc, Transaction};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

const PLACEHOLDERS: &str = "placeholders";

/// Identifies one placeholder of a manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlaceholderId(u64);

impl fmt::Display for PlaceholderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "placeholder#{}", self.0)
    }
}

/// A placeholder still carried by a transaction
///
/// `step` is the number of steps the transaction held when the range was
/// recorded; only later steps move it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct PendingPlaceholder {
    id: PlaceholderId,
    from: usize,
    to: usize,
    step: usize,
}

impl PendingPlaceholder {
    fn mapped(&self, tr: &Transaction) -> (usize, usize) {
        map_range(tr, self.step, self.from, self.to)
    }
}

/// Record the transaction's current selection as placeholder `id`
pub fn add_placeholder(tr: &mut Transaction, id: PlaceholderId) -> &mut Transaction {
    let selection = tr.selection();
    let mut pending = pending_placeholders(tr);
    pending.retain(|placeholder| placeholder.id != id);
    pending.push(PendingPlaceholder {
        id,
        from: selection.from(),
        to: selection.to(),
        step: tr.steps().len(),
    });
    write_pending(tr, &pending)
}

/// Range of a placeholder that is still only in `tr`, in `tr.doc()` positions
pub(crate) fn find_pending(tr: &Transaction, id: PlaceholderId) -> Option<(usize, usize)> {
    pending_placeholders(tr)
        .iter()
        .find(|placeholder| placeholder.id == id)
        .map(|placeholder| placeholder.mapped(tr))
}

/// Drop a placeholder from `tr`; returns whether it was there
pub(crate) fn remove_pending(tr: &mut Transaction, id: PlaceholderId) -> bool {
    let mut pending = pending_placeholders(tr);
    let before = pending.len();
    pending.retain(|placeholder| placeholder.id != id);
    if pending.len() == before {
        return false;
    }
    write_pending(tr, &pending);
    true
}

fn pending_placeholders(tr: &Transaction) -> Vec<PendingPlaceholder> {
    commands_meta(tr, PLACEHOLDERS)
        .and_then(|value| serde_json::from_value(value.clone()).ok())
        .unwrap_or_default()
}

fn write_pending<'t>(tr: &'t mut Transaction, pending: &[PendingPlaceholder]) -> &'t mut Transaction {
    let value = serde_json::to_value(pending).unwrap_or(Value::Null);
    set_commands_meta(tr, PLACEHOLDERS, value)
}

/// Collapsed ranges stick to the content before them; a selection shrinks
/// rather than swallowing text inserted at its edges.
fn map_range(tr: &Transaction, step: usize, from: usize, to: usize) -> (usize, usize) {
    if from == to {
        let pos = tr.map_from(step, from, Assoc::Left);
        return (pos, pos);
    }
    let from = tr.map_from(step, from, Assoc::Right);
    let to = tr.map_from(step, to, Assoc::Left).max(from);
    (from, to)
}

/// Placeholders of applied transactions, kept by the manager
#[derive(Debug, Default)]
pub(crate) struct PlaceholderSet {
    next_id: u64,
    ranges: AHashMap<PlaceholderId, (usize, usize)>,
}

impl PlaceholderSet {
    pub fn next_id(&mut self) -> PlaceholderId {
        self.next_id += 1;
        PlaceholderId(self.next_id)
    }

    /// Map tracked ranges through an applied transaction and start tracking
    /// the placeholders it carried
    pub fn apply(&mut self, tr: &Transaction) {
        for (from, to) in self.ranges.values_mut() {
            (*from, *to) = map_range(tr, 0, *from, *to);
        }
        for placeholder in pending_placeholders(tr) {
            self.ranges.insert(placeholder.id, placeholder.mapped(tr));
        }
    }

    pub fn find(&self, id: PlaceholderId) -> Option<(usize, usize)> {
        self.ranges.get(&id).copied()
    }

    pub fn remove(&mut self, id: PlaceholderId) -> Option<(usize, usize)> {
        self.ranges.remove(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use quill_model::{Doc, EditorState, PrimitiveSelection, Schema, StateConfig};
    use std::sync::Arc;

    fn state(text: &str) -> EditorState {
        let schema = Arc::new(Schema::builder().build().unwrap());
        EditorState::create(
            StateConfig::new(schema)
                .with_doc(Doc::from_text(text))
                .with_selection(PrimitiveSelection::End),
        )
        .unwrap()
    }

    #[test]
    fn pending_range_moves_with_later_steps_only() {
        let mut tr = state("hello").tr();
        tr.insert_text_at(">", 0, 0).unwrap();
        add_placeholder(&mut tr, PlaceholderId(1));
        assert_eq!(find_pending(&tr, PlaceholderId(1)), Some((6, 6)));

        tr.insert_text_at("<<", 0, 0).unwrap();
        assert_eq!(find_pending(&tr, PlaceholderId(1)), Some((8, 8)));
        assert_eq!(find_pending(&tr, PlaceholderId(2)), None);
    }

    #[test]
    fn applied_placeholders_follow_every_transaction() {
        let mut set = PlaceholderSet::default();
        let id = set.next_id();
        let live = state("hello");

        let mut tr = live.tr();
        add_placeholder(&mut tr, id);
        set.apply(&tr);
        assert_eq!(set.find(id), Some((5, 5)));

        let mut edit = live.tr();
        edit.insert_text_at(">> ", 0, 0).unwrap();
        set.apply(&edit);
        assert_eq!(set.find(id), Some((8, 8)));

        // Typing at the placeholder keeps it before the new text
        let mut typed = state(">> hello").tr();
        typed.insert_text_at("!", 8, 8).unwrap();
        set.apply(&typed);
        assert_eq!(set.find(id), Some((8, 8)));

        assert_eq!(set.remove(id), Some((8, 8)));
        assert_eq!(set.find(id), None);
    }

    #[test]
    fn selections_shrink_around_edits() {
        let mut set = PlaceholderSet::default();
        let id = set.next_id();
        let mut tr = state("abcdef").tr();
        tr.set_selection(quill_model::Selection::new(1, 4)).unwrap();
        add_placeholder(&mut tr, id);
        set.apply(&tr);

        let mut edit = state("abcdef").tr();
        edit.delete(2, 5).unwrap();
        set.apply(&edit);
        assert_eq!(set.find(id), Some((1, 2)));
    }

    #[test]
    fn removed_pending_placeholders_are_not_tracked() {
        let mut tr = state("ab").tr();
        add_placeholder(&mut tr, PlaceholderId(3));
        assert!(remove_pending(&mut tr, PlaceholderId(3)));
        assert!(!remove_pending(&mut tr, PlaceholderId(3)));

        let mut set = PlaceholderSet::default();
        set.apply(&tr);
        assert_eq!(set.find(PlaceholderId(3)), None);
    }
}

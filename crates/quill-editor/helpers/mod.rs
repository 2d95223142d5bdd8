//! Read-only helpers contributed by extensions
//!
//! Helpers answer questions about the current state (is a mark active, what
//! is the document text) without touching the shared transaction.

use crate::commands::CommandArgs;
use crate::core::{EditorError, NameKind, Result};
use crate::manager::ExtensionStore;
use ahash::AHashMap;
use quill_model::EditorState;
use serde_json::Value;
use std::fmt;
use std::rc::Rc;

/// Arguments every helper receives
#[derive(Clone, Copy)]
pub struct HelperProps<'a> {
    pub state: &'a EditorState,
    pub store: &'a ExtensionStore,
}

pub type HelperFn = Rc<dyn for<'a> Fn(HelperProps<'a>, &CommandArgs) -> Result<Value>>;

/// Helpers contributed by one extension
#[derive(Clone, Default)]
pub struct HelperTable {
    entries: Vec<(String, HelperFn)>,
}

impl HelperTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<F>(mut self, name: impl Into<String>, helper: F) -> Self
    where
        F: for<'a> Fn(HelperProps<'a>, &CommandArgs) -> Result<Value> + 'static,
    {
        self.entries.push((name.into(), Rc::new(helper)));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }
}

impl fmt::Debug for HelperTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl IntoIterator for HelperTable {
    type Item = (String, HelperFn);
    type IntoIter = std::vec::IntoIter<(String, HelperFn)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Merge helper tables, rejecting names contributed twice
pub(crate) fn collect_helpers<I>(tables: I) -> Result<Vec<(String, HelperFn)>>
where
    I: IntoIterator<Item = HelperTable>,
{
    let mut merged: Vec<(String, HelperFn)> = Vec::new();
    for table in tables {
        for (name, helper) in table {
            if merged.iter().any(|(existing, _)| *existing == name) {
                return Err(EditorError::DuplicateNames {
                    kind: NameKind::Helper,
                    name,
                });
            }
            merged.push((name, helper));
        }
    }
    Ok(merged)
}

/// Callable helpers of a manager
pub struct HelperRegistry {
    helpers: AHashMap<String, HelperFn>,
    order: Vec<String>,
    store: ExtensionStore,
}

impl HelperRegistry {
    pub(crate) fn new(helpers: Vec<(String, HelperFn)>, store: &ExtensionStore) -> Self {
        let order = helpers.iter().map(|(name, _)| name.clone()).collect();
        Self {
            helpers: helpers.into_iter().collect(),
            order,
            store: store.clone(),
        }
    }

    /// Call a helper against the current state
    pub fn call(&self, name: &str, args: CommandArgs) -> Result<Value> {
        let helper = self
            .helpers
            .get(name)
            .ok_or_else(|| EditorError::HelperNotFound {
                name: name.to_string(),
            })?;
        let state = self.store.get_state()?;
        helper(
            HelperProps {
                state: &state,
                store: &self.store,
            },
            &args,
        )
    }

    pub fn contains(&self, name: &str) -> bool {
        self.helpers.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Whether a mark is active over the current selection
    ///
    /// An empty selection checks the marks at the cursor.
    pub fn is_active(&self, mark: &str) -> Result<bool> {
        let state = self.store.get_state()?;
        Ok(mark_active(&state, mark))
    }
}

pub(crate) fn mark_active(state: &EditorState, mark: &str) -> bool {
    let selection = state.selection();
    if selection.empty() {
        state
            .doc()
            .marks_at(selection.from())
            .iter()
            .any(|active| active.name == mark)
    } else {
        state.doc().has_mark(selection.from(), selection.to(), mark)
    }
}

impl fmt::Debug for HelperRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HelperRegistry")
            .field("helpers", &self.order)
            .finish()
    }
}

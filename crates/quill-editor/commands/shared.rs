//! The transaction shared by every command of a manager
//!
//! Commands never create their own transaction; they receive a
//! [`SharedTransaction`] handle. Handles compare by identity, which is how a
//! chain detects a command that dispatched a transaction it made itself.

use crate::core::{EditorError, Result};
use quill_model::{EditorState, Transaction};
use serde_json::Value;
use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;
use tracing::warn;

/// Reference counted handle to a transaction
#[derive(Clone)]
pub struct SharedTransaction(Rc<RefCell<Transaction>>);

impl SharedTransaction {
    pub fn new(tr: Transaction) -> Self {
        Self(Rc::new(RefCell::new(tr)))
    }

    /// Whether both handles point at the same transaction
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn borrow(&self) -> Result<Ref<'_, Transaction>> {
        self.0
            .try_borrow()
            .map_err(|_| EditorError::invariant("transaction is being modified"))
    }

    pub fn borrow_mut(&self) -> Result<RefMut<'_, Transaction>> {
        self.0
            .try_borrow_mut()
            .map_err(|_| EditorError::invariant("transaction is already borrowed"))
    }

    /// Read from the transaction
    pub fn read<R>(&self, f: impl FnOnce(&Transaction) -> R) -> Result<R> {
        Ok(f(&*self.borrow()?))
    }

    /// Run a fallible computation with mutable access
    pub fn update<R>(
        &self,
        f: impl FnOnce(&mut Transaction) -> quill_model::Result<R>,
    ) -> Result<R> {
        Ok(f(&mut *self.borrow_mut()?)?)
    }

    /// Apply chained transaction edits, e.g. `tr.edit(|tr| tr.insert_text("a"))`
    pub fn edit<F>(&self, f: F) -> Result<()>
    where
        F: for<'t> FnOnce(&'t mut Transaction) -> quill_model::Result<&'t mut Transaction>,
    {
        let mut tr = self.borrow_mut()?;
        f(&mut *tr)?;
        Ok(())
    }

    /// Copy of the transaction as it is now
    pub fn snapshot(&self) -> Result<Transaction> {
        Ok(self.borrow()?.clone())
    }
}

impl fmt::Debug for SharedTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(tr) => f
                .debug_struct("SharedTransaction")
                .field("steps", &tr.steps().len())
                .field("selection", &tr.selection())
                .finish(),
            Err(_) => f.write_str("SharedTransaction(<borrowed>)"),
        }
    }
}

/// Lazily refreshed shared transaction plus an optional override
#[derive(Debug, Default)]
pub(crate) struct TransactionCache {
    current: Option<SharedTransaction>,
    custom: Option<SharedTransaction>,
}

impl TransactionCache {
    /// The transaction commands should mutate
    ///
    /// A custom override wins. Otherwise the cached transaction is returned
    /// while it still starts from the live document; once the live document
    /// moved on, a new transaction is created from the live state and the
    /// queued steps are replayed onto it.
    pub fn get(&mut self, state: &EditorState) -> Result<SharedTransaction> {
        if let Some(custom) = &self.custom {
            return Ok(custom.clone());
        }

        if let Some(current) = &self.current {
            if current.read(|tr| tr.before() == state.doc())? {
                return Ok(current.clone());
            }
        }

        let (queued, meta) = match &self.current {
            Some(stale) => stale.read(|tr| {
                let meta: Vec<(String, Value)> = tr
                    .meta()
                    .map(|(key, value)| (key.to_string(), value.clone()))
                    .collect();
                (tr.steps().to_vec(), meta)
            })?,
            None => (Vec::new(), Vec::new()),
        };
        let mut fresh = state.tr();
        for (key, value) in meta {
            fresh.set_meta(key, value);
        }
        for step in queued {
            if let Err(err) = fresh.step(step) {
                warn!(error = %err, "dropping step that no longer applies to the current document");
            }
        }

        let shared = SharedTransaction::new(fresh);
        self.current = Some(shared.clone());
        Ok(shared)
    }

    /// Start over from a new state and drop the override
    pub fn reset(&mut self, state: &EditorState) {
        self.current = Some(SharedTransaction::new(state.tr()));
        self.custom = None;
    }

    pub fn set_custom(&mut self, tr: SharedTransaction) {
        self.custom = Some(tr);
    }

    pub fn clear_custom(&mut self) {
        self.custom = None;
    }

    pub fn has_custom(&self) -> bool {
        self.custom.is_some()
    }
}

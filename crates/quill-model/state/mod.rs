//! Editor state and the transactions that evolve it

mod selection;
mod step;
mod transaction;

pub use selection::{PrimitiveSelection, Selection};
pub use step::{Assoc, Step, StepMap};
pub use transaction::Transaction;

use crate::document::Doc;
use crate::errors::{ModelError, Result};
use crate::schema::Schema;
use serde_json::{json, Value};
use std::sync::Arc;

/// Inputs for [`EditorState::create`]
#[derive(Debug, Clone)]
pub struct StateConfig {
    pub schema: Arc<Schema>,
    pub doc: Option<Doc>,
    pub selection: Option<PrimitiveSelection>,
}

impl StateConfig {
    pub fn new(schema: Arc<Schema>) -> Self {
        Self {
            schema,
            doc: None,
            selection: None,
        }
    }

    pub fn with_doc(mut self, doc: Doc) -> Self {
        self.doc = Some(doc);
        self
    }

    pub fn with_selection(mut self, selection: impl Into<PrimitiveSelection>) -> Self {
        self.selection = Some(selection.into());
        self
    }
}

/// Output of [`EditorState::apply_transaction`]
#[derive(Debug, Clone)]
pub struct ApplyResult {
    pub state: EditorState,
    /// Transactions that produced the state, in application order
    pub transactions: Vec<Transaction>,
}

/// Immutable editor state: schema, document and selection
#[derive(Debug, Clone, PartialEq)]
pub struct EditorState {
    schema: Arc<Schema>,
    doc: Doc,
    selection: Selection,
}

impl EditorState {
    pub fn create(config: StateConfig) -> Result<Self> {
        let doc = config.doc.unwrap_or_default();
        let selection = config
            .selection
            .unwrap_or(PrimitiveSelection::Start)
            .resolve(&doc)?;

        Ok(Self {
            schema: config.schema,
            doc,
            selection,
        })
    }

    /// Start a new transaction from this state
    pub fn tr(&self) -> Transaction {
        Transaction::new(self.schema.clone(), self.doc.clone(), self.selection)
    }

    /// Apply a transaction created from this state's document
    pub fn apply_transaction(&self, tr: Transaction) -> Result<ApplyResult> {
        if tr.before() != &self.doc {
            return Err(ModelError::MismatchedTransaction);
        }

        let state = Self {
            schema: self.schema.clone(),
            doc: tr.doc().clone(),
            selection: tr.selection().clamp(tr.doc()),
        };
        Ok(ApplyResult {
            state,
            transactions: vec![tr],
        })
    }

    pub fn apply(&self, tr: Transaction) -> Result<EditorState> {
        Ok(self.apply_transaction(tr)?.state)
    }

    pub fn doc(&self) -> &Doc {
        &self.doc
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn to_json(&self) -> Value {
        json!({
            "doc": self.doc.to_json(),
            "selection": { "anchor": self.selection.anchor, "head": self.selection.head },
        })
    }
}

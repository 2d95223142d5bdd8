//! # quill-model
//!
//! Immutable document snapshots, text selections and step-based transactions
//! used by the quill editor engine. Every edit is recorded as a [`Step`] on a
//! [`Transaction`] created from an [`EditorState`]; applying the transaction
//! produces the next state.
//!
//! ## Features
//!
//! - **Rope-backed text**: `Doc` stores text in a `ropey::Rope` so snapshots are cheap to clone
//! - **Mark spans**: inline formatting stored as non-overlapping ranges per mark type
//! - **Step replay**: steps can be re-applied on a newer document snapshot
//! - **JSON content**: the document wire format, with invalid-content recovery
//!
//! ## Quick Start
//!
//! ```rust
//! use quill_model::{EditorState, Schema, StateConfig};
//! use std::sync::Arc;
//!
//! let schema = Arc::new(Schema::builder().build()?);
//! let state = EditorState::create(StateConfig::new(schema))?;
//!
//! let mut tr = state.tr();
//! tr.insert_text("Hello")?;
//! let next = state.apply(tr)?;
//!
//! assert_eq!(next.doc().text(), "Hello");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![deny(clippy::all)]
#![deny(unsafe_code)]

pub mod content;
pub mod document;
pub mod errors;
pub mod schema;
pub mod state;

pub use content::{
    create_document_node, transformers, Content, CreateDocumentOptions, InvalidContentHandler,
    InvalidContentItem, InvalidContentKind, InvalidContentReport, StringHandler,
};
pub use document::{Doc, Mark, MarkSpan};
pub use errors::{ModelError, Result};
pub use schema::{MarkSpec, NodeSpec, Schema, SchemaBuilder};
pub use state::{
    ApplyResult, Assoc, EditorState, PrimitiveSelection, Selection, StateConfig, Step, StepMap,
    Transaction,
};

/// Crate version for runtime compatibility checks
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

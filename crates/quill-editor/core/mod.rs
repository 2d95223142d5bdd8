//! Core types shared by every layer of the editor
//!
//! This module contains the building blocks the rest of the crate is written
//! against:
//! - `EditorError` and the crate `Result` alias
//! - `Priority` ordering and the `ManagerPhase` lifecycle
//! - `ManagerSettings`, the serde-backed manager configuration

pub mod errors;
pub mod priority;
pub mod settings;

pub use errors::{EditorError, NameKind, Result};
pub use priority::{ManagerPhase, Priority};
pub use settings::{BuiltinOptions, ExcludeOptions, ManagerSettings, Platform};

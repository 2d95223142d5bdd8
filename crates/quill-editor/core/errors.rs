//! Error types for the quill-editor crate
//!
//! Provides the main `EditorError` enum that wraps `ModelError` from
//! quill-model and adds the failures of extension assembly, lifecycle phases
//! and command execution. Setup failures (duplicate or reserved names,
//! cyclic extension trees) surface when the manager is created, never when a
//! command is first called.

use quill_model::ModelError;
use std::fmt;
use thiserror::Error;

/// Which registry a conflicting name belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NameKind {
    Extension,
    Command,
    Helper,
}

impl fmt::Display for NameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Extension => "extension",
            Self::Command => "command",
            Self::Helper => "helper",
        })
    }
}

/// Main error type for quill-editor operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EditorError {
    /// Errors from quill-model
    #[error(transparent)]
    Model(#[from] ModelError),

    /// Two extensions contributed the same name
    #[error("Duplicate {kind} name '{name}' found while assembling the manager")]
    DuplicateNames { kind: NameKind, name: String },

    /// A contributed name collides with the chaining surface
    #[error("The {kind} name '{name}' is reserved and cannot be registered")]
    ReservedName { kind: NameKind, name: String },

    /// Operation attempted in the wrong lifecycle phase
    #[error("Manager phase error: {message}")]
    ManagerPhase { message: String },

    /// Requested extension is not part of the manager
    #[error("Extension '{name}' doesn't exist within this manager")]
    InvalidManagerExtension { name: String },

    /// Internal contract broken by a caller
    #[error("Invariant violation: {message}")]
    InvariantViolation { message: String },

    /// No command registered under the name
    #[error("Command '{name}' is not registered")]
    CommandNotFound { name: String },

    /// No helper registered under the name
    #[error("Helper '{name}' is not registered")]
    HelperNotFound { name: String },

    /// Arguments passed to a command did not match what it expects
    #[error("Invalid arguments for '{command}': {message}")]
    InvalidCommandArguments { command: String, message: String },

    /// Store value exists but has another type
    #[error("Store key '{key}' does not hold a value of type {expected}")]
    StoreTypeMismatch { key: String, expected: &'static str },

    /// An extension appears among its own descendants
    #[error("Extension '{name}' appears inside its own children")]
    CyclicExtension { name: String },

    /// Static options are fixed for the lifetime of the manager
    #[error("Option '{key}' of extension '{extension}' is static and cannot change after creation")]
    StaticOption { extension: String, key: String },

    /// Key binding string could not be normalized
    #[error("Invalid key pattern '{pattern}': {message}")]
    InvalidKeyPattern { pattern: String, message: String },

    /// Extension error
    #[error("Extension error: {extension}: {message}")]
    ExtensionError { extension: String, message: String },

    /// Settings could not be read
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl EditorError {
    /// Create a new manager phase error
    pub fn manager_phase<T: fmt::Display>(message: T) -> Self {
        Self::ManagerPhase {
            message: message.to_string(),
        }
    }

    /// Create a new invariant violation
    pub fn invariant<T: fmt::Display>(message: T) -> Self {
        Self::InvariantViolation {
            message: message.to_string(),
        }
    }

    /// Create a new extension error
    pub fn extension<E: fmt::Display, T: fmt::Display>(extension: E, message: T) -> Self {
        Self::ExtensionError {
            extension: extension.to_string(),
            message: message.to_string(),
        }
    }

    /// Create a new invalid arguments error
    pub fn invalid_arguments<T: fmt::Display>(command: &str, message: T) -> Self {
        Self::InvalidCommandArguments {
            command: command.to_string(),
            message: message.to_string(),
        }
    }

    /// Create a new configuration error
    pub fn config<T: fmt::Display>(message: T) -> Self {
        Self::Config {
            message: message.to_string(),
        }
    }

    /// Check if this error is raised while assembling a manager
    #[must_use]
    pub const fn is_setup_error(&self) -> bool {
        matches!(
            self,
            Self::DuplicateNames { .. }
                | Self::ReservedName { .. }
                | Self::CyclicExtension { .. }
                | Self::InvalidKeyPattern { .. }
        )
    }

    /// Check if this is a duplicate or reserved name conflict
    #[must_use]
    pub const fn is_name_conflict(&self) -> bool {
        matches!(self, Self::DuplicateNames { .. } | Self::ReservedName { .. })
    }

    /// Check if this is a lifecycle phase error
    #[must_use]
    pub const fn is_phase_error(&self) -> bool {
        matches!(self, Self::ManagerPhase { .. })
    }

    /// Check if content was rejected by the schema
    #[must_use]
    pub const fn is_invalid_content(&self) -> bool {
        matches!(self, Self::Model(err) if err.is_content_error())
    }

    /// Get the underlying model error if this wraps one
    #[must_use]
    pub const fn as_model_error(&self) -> Option<&ModelError> {
        match self {
            Self::Model(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for EditorError {
    fn from(err: serde_json::Error) -> Self {
        Self::Model(ModelError::from(err))
    }
}

/// Result type alias for editor operations
pub type Result<T> = std::result::Result<T, EditorError>;

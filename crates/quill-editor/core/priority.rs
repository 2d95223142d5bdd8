//! Extension priority and manager lifecycle phases

use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordering weight of an extension or key binding
///
/// Higher values run first. Extensions with equal priority keep the order
/// in which they were supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Priority(pub i32);

impl Priority {
    pub const LOWEST: Self = Self(0);
    pub const LOW: Self = Self(10);
    pub const DEFAULT: Self = Self(100);
    pub const MEDIUM: Self = Self(1_000);
    pub const HIGH: Self = Self(10_000);
    pub const HIGHEST: Self = Self(100_000);
    pub const CRITICAL: Self = Self(1_000_000);

    #[must_use]
    pub const fn value(self) -> i32 {
        self.0
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<i32> for Priority {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle phase of a manager
///
/// Phases only move forward: `None → Create → EditorView → Runtime → Destroy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum ManagerPhase {
    /// Before any extension hook has run
    #[default]
    None,
    /// `on_create` hooks are running or have run
    Create,
    /// A view has been attached and `on_view` hooks are running
    EditorView,
    /// The first state update has been processed
    Runtime,
    /// Terminal phase
    Destroy,
}

impl fmt::Display for ManagerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::Create => "create",
            Self::EditorView => "editor-view",
            Self::Runtime => "runtime",
            Self::Destroy => "destroy",
        })
    }
}

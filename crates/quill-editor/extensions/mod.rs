//! Extension system for editor functionality
//!
//! Provides the [`Extension`] trait. An extension is a unit of editor
//! behavior that may contribute schema entries, commands, helpers, key
//! bindings and input rules, and may hook into the manager lifecycle. The
//! manager flattens nested extensions once, orders them by priority and
//! collects their contributions.
//!
//! # Example
//!
//! ```
//! use quill_editor::commands::command;
//! use quill_editor::{CommandDecl, CommandTable, Extension, ExtensionOptions};
//!
//! #[derive(Clone, Default)]
//! struct Shout;
//!
//! impl Extension for Shout {
//!     fn name(&self) -> &str {
//!         "shout"
//!     }
//!
//!     fn create_commands(&self) -> CommandTable {
//!         CommandTable::new().with(
//!             "shout",
//!             CommandDecl::new(|_args| {
//!                 Ok(command(|props| {
//!                     props.tr.edit(|tr| tr.insert_text("!"))?;
//!                     props.commit()
//!                 }))
//!             }),
//!         )
//!     }
//!
//!     fn clone_with_options(&self, _options: ExtensionOptions) -> Box<dyn Extension> {
//!         Box::new(self.clone())
//!     }
//! }
//! ```

pub mod builtin;
pub(crate) mod flatten;
pub mod options;

pub use options::{OptionChange, OptionChanges, ExtensionOptions};

use crate::commands::CommandTable;
use crate::core::{Priority, Result};
use crate::framework::EditorView;
use crate::helpers::HelperTable;
use crate::input_rules::InputRule;
use crate::keymap::{KeyBindingDecl, PrioritizedKeyBindings, ShortcutMap};
use crate::manager::{ExtensionStore, StateUpdate};
use bitflags::bitflags;
use quill_model::{MarkSpec, NodeSpec};
use std::any::{Any, TypeId};
use std::rc::Rc;

/// Cleanup returned by `on_create` and `on_view`, run when the manager is destroyed
pub type Disposer = Box<dyn FnOnce()>;

static EMPTY_OPTIONS: ExtensionOptions = ExtensionOptions::EMPTY;

bitflags! {
    /// Contributions an extension makes
    ///
    /// Extensions may declare their capabilities; the manager adds the ones
    /// it discovers while collecting contributions.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ExtensionCapability: u16 {
        const LIFECYCLE = 1 << 0;
        const COMMANDS = 1 << 1;
        const HELPERS = 1 << 2;
        const KEYMAP = 1 << 3;
        const NODE = 1 << 4;
        const MARK = 1 << 5;
        const INPUT_RULES = 1 << 6;
    }
}

/// Schema entry contributed by a node or mark extension
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaContribution {
    Node(NodeSpec),
    Mark(MarkSpec),
}

impl SchemaContribution {
    pub fn name(&self) -> &str {
        match self {
            Self::Node(spec) => &spec.name,
            Self::Mark(spec) => &spec.name,
        }
    }

    pub fn capability(&self) -> ExtensionCapability {
        match self {
            Self::Node(_) => ExtensionCapability::NODE,
            Self::Mark(_) => ExtensionCapability::MARK,
        }
    }
}

/// Identifies an extension by name or by concrete type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExtensionKey {
    Name(String),
    Type(TypeId),
}

impl ExtensionKey {
    pub fn of<T: Extension>() -> Self {
        Self::Type(TypeId::of::<T>())
    }
}

impl From<&str> for ExtensionKey {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for ExtensionKey {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

/// Upcast to `Any` for typed extension lookup
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Unit of editor behavior managed by a [`Manager`](crate::Manager)
///
/// Every method except `name` and `clone_with_options` has a default that
/// contributes nothing. Hooks receive an [`ExtensionStore`] for access to
/// the manager; the extension itself is borrowed for the duration of the
/// hook, so a hook must not look itself up through the store.
pub trait Extension: AsAny {
    /// Unique name within a manager
    fn name(&self) -> &str;

    fn default_priority(&self) -> Priority {
        Priority::DEFAULT
    }

    fn options(&self) -> &ExtensionOptions {
        &EMPTY_OPTIONS
    }

    /// Mutable options; `None` for extensions without options
    fn options_mut(&mut self) -> Option<&mut ExtensionOptions> {
        None
    }

    fn capabilities(&self) -> ExtensionCapability {
        ExtensionCapability::empty()
    }

    fn schema(&self) -> Option<SchemaContribution> {
        None
    }

    /// Commands added to the registry
    fn create_commands(&self) -> CommandTable {
        CommandTable::new()
    }

    /// Commands registered with explicit options
    ///
    /// These replace commands of the same name from `create_commands`.
    fn decorated_commands(&self) -> CommandTable {
        CommandTable::new()
    }

    fn create_helpers(&self) -> HelperTable {
        HelperTable::new()
    }

    /// Key bindings for this extension, resolved against the active shortcut map
    fn create_keymap(&self, _shortcuts: &ShortcutMap) -> Option<PrioritizedKeyBindings> {
        None
    }

    /// Annotated key bindings with their own priority and activation check
    fn keybindings(&self) -> Vec<KeyBindingDecl> {
        Vec::new()
    }

    fn input_rules(&self) -> Vec<InputRule> {
        Vec::new()
    }

    fn on_create(&mut self, _store: &ExtensionStore) -> Result<Option<Disposer>> {
        Ok(None)
    }

    fn on_view(
        &mut self,
        _store: &ExtensionStore,
        _view: &Rc<dyn EditorView>,
    ) -> Result<Option<Disposer>> {
        Ok(None)
    }

    fn on_state_update(&mut self, _update: &StateUpdate, _store: &ExtensionStore) -> Result<()> {
        Ok(())
    }

    fn on_destroy(&mut self, _store: &ExtensionStore) -> Result<()> {
        Ok(())
    }

    /// Called after `set_extension_options` changed at least one value
    fn on_set_options(&mut self, _changes: &OptionChanges, _store: &ExtensionStore) -> Result<()> {
        Ok(())
    }

    /// Nested extensions, taken once when the manager flattens its extensions
    fn children(&mut self) -> Vec<Box<dyn Extension>> {
        Vec::new()
    }

    /// New instance of this extension with the given options
    fn clone_with_options(&self, options: ExtensionOptions) -> Box<dyn Extension>;
}

//! Extension composition and command chaining for the quill editor engine
//!
//! `quill-editor` assembles independently authored [`Extension`]s into one
//! editor. A [`Manager`] owns the extensions, drives their lifecycle, builds
//! the command registry and the merged keymap, and hands every participant an
//! [`ExtensionStore`] for shared values.
//!
//! # Features
//!
//! - **Lifecycle phases**: `None → Create → EditorView → Runtime → Destroy`, strictly ordered
//! - **Command chaining**: any number of commands share one transaction and dispatch once
//! - **Keymap merging**: bindings from every extension merged by priority per key
//! - **Framework adapter**: one dispatch path from the view into the manager
//! - **Delayed commands**: asynchronous values re-enter the synchronous dispatch pipeline
//!
//! # Example
//!
//! ```
//! use quill_editor::{command_args, Framework, FrameworkProps, Manager, ManagerSettings};
//!
//! let manager = Manager::create(Vec::new(), ManagerSettings::default())?;
//! let framework = Framework::headless(manager.clone(), FrameworkProps::default())?;
//!
//! manager
//!     .chain()?
//!     .call("insertText", command_args!["Hello"])?
//!     .call("insertText", command_args![" world"])?
//!     .run()?;
//!
//! assert_eq!(framework.get_state()?.doc().text(), "Hello world");
//! # Ok::<(), quill_editor::EditorError>(())
//! ```

#![deny(clippy::all)]
#![deny(unsafe_code)]

pub mod commands;
pub mod core;
pub mod events;
pub mod extensions;
pub mod framework;
pub mod helpers;
pub mod input_rules;
pub mod keymap;
pub mod manager;

pub use quill_model as model;

pub use commands::{
    add_placeholder, force_update_transaction, get_forced_updates, ChainedCommands, CommandArg,
    CommandArgs, CommandDecl, CommandFactory, CommandFunction, CommandOptions, CommandProps,
    CommandRegistry, CommandShape, CommandTable, DelayedCommand, DelayedResolver, DelayedValue,
    PlaceholderId, RawCommand, SharedTransaction, UpdatableViewProp,
};
pub use self::core::{
    BuiltinOptions, EditorError, ExcludeOptions, ManagerPhase, ManagerSettings, NameKind,
    Platform, Priority, Result,
};
pub use events::{EventEmitter, EventStats, ManagerEvent, ManagerEventKind, Unsubscribe};
pub use extensions::{
    builtin::{CommandsExtension, HelpersExtension, KeymapExtension},
    Disposer, Extension, ExtensionCapability, ExtensionKey, ExtensionOptions, OptionChanges,
    SchemaContribution,
};
pub use framework::{
    BaseFramework, ChangeEvent, EditorView, Framework, FrameworkEvent, FrameworkEventKind,
    FrameworkOutput, FrameworkProps, HeadlessView, ViewProps,
};
pub use helpers::{HelperFn, HelperProps, HelperRegistry, HelperTable};
pub use input_rules::{InputRule, InputRuleMatch};
pub use keymap::{
    BindingPriority, KeyBindingCommand, KeyBindingDecl, KeyBindingProps, KeyBindings, KeyEvent,
    KeyPattern, MergedKeymap, NamedShortcut, PrioritizedKeyBindings, ShortcutMap,
    ShortcutPreset,
};
pub use manager::{CreateStateOptions, ExtensionStore, Manager, StateUpdate, StoreReader};

/// Crate version for runtime compatibility checks
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

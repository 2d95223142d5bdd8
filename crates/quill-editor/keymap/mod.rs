//! Key binding merging and dispatch
//!
//! Every extension may contribute bindings. The manager merges them into one
//! [`MergedKeymap`]: for each normalized key name there is a single ordered
//! list of handlers, highest priority first. A key press walks that list
//! until a handler returns `true`; a handler can also run the rest of the
//! list itself through [`KeyBindingProps::next`].

pub mod keys;
pub mod shortcuts;

pub use keys::{normalize_key_name, KeyEvent};
pub use shortcuts::{NamedShortcut, ShortcutMap, ShortcutPreset};

use crate::commands::{CommandProps, DispatchFn, SharedTransaction};
use crate::core::{Platform, Priority, Result};
use crate::extensions::{Extension, ExtensionOptions};
use crate::framework::EditorView;
use crate::manager::ExtensionStore;
use ahash::AHashMap;
use quill_model::EditorState;
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use tracing::debug;

/// Arguments passed to a key binding handler
pub struct KeyBindingProps<'a> {
    pub state: &'a EditorState,
    pub tr: SharedTransaction,
    pub dispatch: Option<DispatchFn<'a>>,
    pub view: &'a Rc<dyn EditorView>,
    pub store: &'a ExtensionStore,
    next: &'a dyn Fn() -> Result<bool>,
}

impl<'a> KeyBindingProps<'a> {
    fn new(props: CommandProps<'a>, next: &'a dyn Fn() -> Result<bool>) -> Self {
        Self {
            state: props.state,
            tr: props.tr,
            dispatch: props.dispatch,
            view: props.view,
            store: props.store,
            next,
        }
    }

    /// Run the lower priority handlers bound to the same key
    pub fn next(&self) -> Result<bool> {
        (self.next)()
    }

    /// The same arguments as a command receives
    pub fn as_command_props(&self) -> CommandProps<'a> {
        CommandProps {
            state: self.state,
            tr: self.tr.clone(),
            dispatch: self.dispatch,
            view: self.view,
            store: self.store,
        }
    }

    /// Dispatch the shared transaction and report the key as handled
    pub fn commit(&self) -> Result<bool> {
        self.as_command_props().commit()
    }
}

/// Handler bound to a key
pub type KeyBindingCommand = Rc<dyn for<'a> Fn(KeyBindingProps<'a>) -> Result<bool>>;

/// Wrap a closure as a [`KeyBindingCommand`]
pub fn key_binding<F>(f: F) -> KeyBindingCommand
where
    F: for<'a> Fn(KeyBindingProps<'a>) -> Result<bool> + 'static,
{
    Rc::new(f)
}

/// Key names mapped to handlers, in insertion order
#[derive(Clone, Default)]
pub struct KeyBindings {
    entries: Vec<(String, KeyBindingCommand)>,
}

impl KeyBindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<F>(self, key: impl Into<String>, handler: F) -> Self
    where
        F: for<'a> Fn(KeyBindingProps<'a>) -> Result<bool> + 'static,
    {
        self.with_command(key, Rc::new(handler))
    }

    pub fn with_command(mut self, key: impl Into<String>, command: KeyBindingCommand) -> Self {
        self.insert(key, command);
        self
    }

    /// Bind a key, replacing an earlier binding of the same key
    pub fn insert(&mut self, key: impl Into<String>, command: KeyBindingCommand) {
        let key = key.into();
        if let Some(entry) = self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            entry.1 = command;
        } else {
            self.entries.push((key, command));
        }
    }

    pub fn get(&self, key: &str) -> Option<&KeyBindingCommand> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, command)| command)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for KeyBindings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.keys()).finish()
    }
}

/// Key bindings with an optional priority
///
/// Bindings without a priority are merged at [`Priority::DEFAULT`].
#[derive(Debug, Clone, Default)]
pub struct PrioritizedKeyBindings {
    pub priority: Option<Priority>,
    pub bindings: KeyBindings,
}

impl PrioritizedKeyBindings {
    pub fn new(bindings: KeyBindings) -> Self {
        Self {
            priority: None,
            bindings,
        }
    }

    pub fn with_priority(priority: Priority, bindings: KeyBindings) -> Self {
        Self {
            priority: Some(priority),
            bindings,
        }
    }

    pub fn effective_priority(&self) -> Priority {
        self.priority.unwrap_or(Priority::DEFAULT)
    }
}

impl From<KeyBindings> for PrioritizedKeyBindings {
    fn from(bindings: KeyBindings) -> Self {
        Self::new(bindings)
    }
}

/// Key of an annotated binding
#[derive(Clone)]
pub enum KeyPattern {
    Literal(String),
    Named(NamedShortcut),
    /// Computed from the extension's options when the keymap is built
    Dynamic(Rc<dyn Fn(&ExtensionOptions) -> String>),
}

impl KeyPattern {
    /// The key name, or `None` for a named shortcut missing from the map
    pub fn resolve(&self, options: &ExtensionOptions, shortcuts: &ShortcutMap) -> Option<String> {
        match self {
            Self::Literal(key) => Some(key.clone()),
            Self::Named(shortcut) => shortcuts.get(*shortcut).map(str::to_string),
            Self::Dynamic(key) => Some(key(options)),
        }
    }
}

impl fmt::Debug for KeyPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(key) => f.debug_tuple("Literal").field(key).finish(),
            Self::Named(shortcut) => f.debug_tuple("Named").field(shortcut).finish(),
            Self::Dynamic(_) => f.write_str("Dynamic(<fn>)"),
        }
    }
}

impl From<&str> for KeyPattern {
    fn from(key: &str) -> Self {
        Self::Literal(key.to_string())
    }
}

impl From<String> for KeyPattern {
    fn from(key: String) -> Self {
        Self::Literal(key)
    }
}

impl From<NamedShortcut> for KeyPattern {
    fn from(shortcut: NamedShortcut) -> Self {
        Self::Named(shortcut)
    }
}

/// Priority of an annotated binding
#[derive(Clone)]
pub enum BindingPriority {
    Fixed(Priority),
    /// Computed from the extension's options when the keymap is built
    Dynamic(Rc<dyn Fn(&ExtensionOptions) -> Priority>),
}

impl BindingPriority {
    pub fn resolve(&self, options: &ExtensionOptions) -> Priority {
        match self {
            Self::Fixed(priority) => *priority,
            Self::Dynamic(priority) => priority(options),
        }
    }
}

impl fmt::Debug for BindingPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(priority) => f.debug_tuple("Fixed").field(priority).finish(),
            Self::Dynamic(_) => f.write_str("Dynamic(<fn>)"),
        }
    }
}

type ActiveCheck = Rc<dyn Fn(&ExtensionOptions) -> bool>;

/// Annotated key binding with its own priority and activation check
///
/// Annotated bindings default to [`Priority::LOW`].
#[derive(Clone)]
pub struct KeyBindingDecl {
    pub key: KeyPattern,
    pub is_active: Option<ActiveCheck>,
    pub priority: BindingPriority,
    pub command: KeyBindingCommand,
}

impl KeyBindingDecl {
    pub fn new<F>(key: impl Into<KeyPattern>, command: F) -> Self
    where
        F: for<'a> Fn(KeyBindingProps<'a>) -> Result<bool> + 'static,
    {
        Self {
            key: key.into(),
            is_active: None,
            priority: BindingPriority::Fixed(Priority::LOW),
            command: Rc::new(command),
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = BindingPriority::Fixed(priority);
        self
    }

    pub fn with_dynamic_priority(
        mut self,
        priority: impl Fn(&ExtensionOptions) -> Priority + 'static,
    ) -> Self {
        self.priority = BindingPriority::Dynamic(Rc::new(priority));
        self
    }

    /// Only bind the key while `is_active` returns `true`
    pub fn when(mut self, is_active: impl Fn(&ExtensionOptions) -> bool + 'static) -> Self {
        self.is_active = Some(Rc::new(is_active));
        self
    }
}

impl fmt::Debug for KeyBindingDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyBindingDecl")
            .field("key", &self.key)
            .field("priority", &self.priority)
            .field("conditional", &self.is_active.is_some())
            .finish()
    }
}

/// Whether an extension asked to leave out its `create_keymap` bindings
fn keymap_excluded(options: &ExtensionOptions) -> bool {
    options
        .get("exclude")
        .and_then(|exclude| exclude.get("keymap"))
        .and_then(serde_json::Value::as_bool)
        .unwrap_or(false)
}

/// Static bindings contributed by one extension
pub(crate) fn extension_bindings(
    extension: &dyn Extension,
    shortcuts: &ShortcutMap,
) -> Vec<PrioritizedKeyBindings> {
    let options = extension.options();
    let mut contributed = Vec::new();

    for decl in extension.keybindings() {
        if let Some(is_active) = &decl.is_active {
            if !is_active(options) {
                continue;
            }
        }
        let Some(key) = decl.key.resolve(options, shortcuts) else {
            debug!(extension = extension.name(), key = ?decl.key, "shortcut not in the active map");
            continue;
        };
        contributed.push(PrioritizedKeyBindings::with_priority(
            decl.priority.resolve(options),
            KeyBindings::new().with_command(key, decl.command),
        ));
    }

    if !keymap_excluded(options) {
        if let Some(keymap) = extension.create_keymap(shortcuts) {
            contributed.push(keymap);
        }
    }
    contributed
}

/// Handlers of every extension merged per key
#[derive(Clone, Default)]
pub struct MergedKeymap {
    bindings: AHashMap<String, Vec<KeyBindingCommand>>,
    order: Vec<String>,
}

impl MergedKeymap {
    /// Merge runtime and static bindings
    ///
    /// Both groups are sorted by descending priority, keeping contribution
    /// order for ties. Runtime bindings precede every static binding.
    pub fn merge(
        extra: Vec<PrioritizedKeyBindings>,
        statics: Vec<PrioritizedKeyBindings>,
        platform: Platform,
    ) -> Result<Self> {
        let mut merged = Self::default();
        for group in [extra, statics] {
            let mut group = group;
            group.sort_by_key(|bindings| std::cmp::Reverse(bindings.effective_priority()));
            for prioritized in group {
                for (key, command) in prioritized.bindings.entries {
                    let key = normalize_key_name(&key, platform)?;
                    match merged.bindings.get_mut(&key) {
                        Some(handlers) => handlers.push(command),
                        None => {
                            merged.order.push(key.clone());
                            merged.bindings.insert(key, vec![command]);
                        }
                    }
                }
            }
        }
        Ok(merged)
    }

    /// Handlers for a normalized key name, highest priority first
    pub fn get(&self, key: &str) -> Option<&[KeyBindingCommand]> {
        self.bindings.get(key).map(Vec::as_slice)
    }

    /// Handlers for the first name of the event that has bindings
    pub fn lookup(&self, event: &KeyEvent) -> Option<&[KeyBindingCommand]> {
        event.names().iter().find_map(|name| self.get(name))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn handler_count(&self, key: &str) -> usize {
        self.bindings.get(key).map_or(0, Vec::len)
    }

    /// Number of bound keys
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl fmt::Debug for MergedKeymap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.order.iter().map(|key| (key, self.handler_count(key))))
            .finish()
    }
}

/// Run handlers in order until one returns `true`
///
/// A handler that called `next()` already ran the rest of the list, so its
/// result ends the walk.
pub(crate) fn run_chain(handlers: &[KeyBindingCommand], props: &CommandProps<'_>) -> Result<bool> {
    let Some((first, rest)) = handlers.split_first() else {
        return Ok(false);
    };

    let delegated = Cell::new(false);
    let next = || {
        delegated.set(true);
        run_chain(rest, props)
    };
    let handled = first(KeyBindingProps::new(props.clone(), &next))?;
    if handled || delegated.get() {
        return Ok(handled);
    }
    run_chain(rest, props)
}

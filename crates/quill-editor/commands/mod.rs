//! Command system for editor operations
//!
//! Commands are contributed by extensions as factories: given the call
//! arguments a factory returns a [`CommandFunction`], which runs once with
//! [`CommandProps`]. Every command in a manager mutates the same
//! [`SharedTransaction`], which is what lets several commands be chained
//! into a single dispatch.

pub mod delayed;
pub mod forced;
pub mod macros;
pub mod placeholders;
pub mod registry;
pub mod shared;

pub use delayed::{DelayedCommand, DelayedOutcome, DelayedResolver, DelayedValue};
pub use forced::{force_update_transaction, get_forced_updates, UpdatableViewProp};
pub use placeholders::{add_placeholder, PlaceholderId};
pub use registry::{ChainedCommands, CommandRegistry, CommandShape, RESERVED_COMMAND_NAMES};
pub use shared::SharedTransaction;

use crate::core::{EditorError, Result};
use crate::framework::EditorView;
use crate::manager::ExtensionStore;
use quill_model::{EditorState, Transaction};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::rc::Rc;

/// Dispatch function handed to commands
pub type DispatchFn<'a> = &'a dyn Fn(SharedTransaction) -> Result<()>;

/// Everything a command needs to run
///
/// `dispatch` is `None` when the command is only checked for whether it
/// could run; commands must not produce side effects outside the
/// transaction in that case.
#[derive(Clone)]
pub struct CommandProps<'a> {
    /// Live editor state
    pub state: &'a EditorState,
    /// Transaction shared by every command of the manager
    pub tr: SharedTransaction,
    pub dispatch: Option<DispatchFn<'a>>,
    pub view: &'a Rc<dyn EditorView>,
    pub store: &'a ExtensionStore,
}

impl<'a> CommandProps<'a> {
    pub fn can_dispatch(&self) -> bool {
        self.dispatch.is_some()
    }

    /// Dispatch the shared transaction when dispatching is allowed
    ///
    /// Always returns `Ok(true)` so commands can end with `props.commit()`.
    pub fn commit(&self) -> Result<bool> {
        if let Some(dispatch) = self.dispatch {
            dispatch(self.tr.clone())?;
        }
        Ok(true)
    }
}

impl fmt::Debug for CommandProps<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandProps")
            .field("tr", &self.tr)
            .field("can_dispatch", &self.can_dispatch())
            .finish()
    }
}

/// Command ready to run once
pub type CommandFunction = Box<dyn for<'a> FnOnce(CommandProps<'a>) -> Result<bool>>;

/// Command that can run any number of times, used as a command argument
pub type RawCommand = Rc<dyn for<'a> Fn(CommandProps<'a>) -> Result<bool>>;

/// Builds a command from call arguments
pub type CommandFactory = Rc<dyn Fn(&CommandArgs) -> Result<CommandFunction>>;

/// Box a closure as a [`CommandFunction`]
pub fn command<F>(f: F) -> CommandFunction
where
    F: for<'a> FnOnce(CommandProps<'a>) -> Result<bool> + 'static,
{
    Box::new(f)
}

/// Wrap a closure as a [`RawCommand`]
pub fn raw_command<F>(f: F) -> RawCommand
where
    F: for<'a> Fn(CommandProps<'a>) -> Result<bool> + 'static,
{
    Rc::new(f)
}

/// Registration options of a command
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CommandOptions {
    /// Leave the command out of command chains
    pub disable_chaining: bool,
    pub label: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
}

impl CommandOptions {
    pub fn unchainable() -> Self {
        Self {
            disable_chaining: true,
            ..Self::default()
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A command factory and its options
#[derive(Clone)]
pub struct CommandDecl {
    pub factory: CommandFactory,
    pub options: CommandOptions,
}

impl CommandDecl {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn(&CommandArgs) -> Result<CommandFunction> + 'static,
    {
        Self {
            factory: Rc::new(factory),
            options: CommandOptions::default(),
        }
    }

    pub fn with_options(mut self, options: CommandOptions) -> Self {
        self.options = options;
        self
    }
}

impl fmt::Debug for CommandDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandDecl")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Commands contributed by one extension, in registration order
#[derive(Debug, Clone, Default)]
pub struct CommandTable {
    entries: Vec<(String, CommandDecl)>,
}

impl CommandTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, decl: CommandDecl) -> Self {
        self.insert(name, decl);
        self
    }

    /// Add a command, replacing an earlier one with the same name
    pub fn insert(&mut self, name: impl Into<String>, decl: CommandDecl) {
        let name = name.into();
        if let Some(entry) = self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            entry.1 = decl;
        } else {
            self.entries.push((name, decl));
        }
    }

    pub fn get(&self, name: &str) -> Option<&CommandDecl> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, decl)| decl)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CommandDecl)> {
        self.entries.iter().map(|(name, decl)| (name.as_str(), decl))
    }
}

impl IntoIterator for CommandTable {
    type Item = (String, CommandDecl);
    type IntoIter = std::vec::IntoIter<(String, CommandDecl)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// One command argument
#[derive(Clone)]
pub enum CommandArg {
    Value(Value),
    Transaction(SharedTransaction),
    Callback(Rc<dyn Fn()>),
    Command(RawCommand),
    Delayed(DelayedValue),
}

impl fmt::Debug for CommandArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Transaction(tr) => f.debug_tuple("Transaction").field(tr).finish(),
            Self::Callback(_) => f.write_str("Callback(<fn>)"),
            Self::Command(_) => f.write_str("Command(<fn>)"),
            Self::Delayed(delayed) => f.debug_tuple("Delayed").field(delayed).finish(),
        }
    }
}

impl CommandArg {
    /// Wrap a closure passed to a command, e.g. the `emptyUpdate` action
    pub fn callback(f: impl Fn() + 'static) -> Self {
        Self::Callback(Rc::new(f))
    }
}

impl From<Value> for CommandArg {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<&str> for CommandArg {
    fn from(value: &str) -> Self {
        Self::Value(Value::from(value))
    }
}

impl From<String> for CommandArg {
    fn from(value: String) -> Self {
        Self::Value(Value::from(value))
    }
}

impl From<bool> for CommandArg {
    fn from(value: bool) -> Self {
        Self::Value(Value::from(value))
    }
}

impl From<i32> for CommandArg {
    fn from(value: i32) -> Self {
        Self::Value(Value::from(value))
    }
}

impl From<i64> for CommandArg {
    fn from(value: i64) -> Self {
        Self::Value(Value::from(value))
    }
}

impl From<usize> for CommandArg {
    fn from(value: usize) -> Self {
        Self::Value(Value::from(value))
    }
}

impl From<SharedTransaction> for CommandArg {
    fn from(tr: SharedTransaction) -> Self {
        Self::Transaction(tr)
    }
}

impl From<RawCommand> for CommandArg {
    fn from(command: RawCommand) -> Self {
        Self::Command(command)
    }
}

impl From<DelayedValue> for CommandArg {
    fn from(delayed: DelayedValue) -> Self {
        Self::Delayed(delayed)
    }
}

/// Ordered arguments of a command call
#[derive(Debug, Clone, Default)]
pub struct CommandArgs(Vec<CommandArg>);

impl CommandArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, arg: impl Into<CommandArg>) {
        self.0.push(arg.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&CommandArg> {
        self.0.get(index)
    }

    pub fn value(&self, index: usize) -> Option<&Value> {
        match self.0.get(index) {
            Some(CommandArg::Value(value)) => Some(value),
            _ => None,
        }
    }

    pub fn str(&self, index: usize) -> Option<&str> {
        self.value(index).and_then(Value::as_str)
    }

    pub fn bool(&self, index: usize) -> Option<bool> {
        self.value(index).and_then(Value::as_bool)
    }

    pub fn usize(&self, index: usize) -> Option<usize> {
        self.value(index)
            .and_then(Value::as_u64)
            .and_then(|value| usize::try_from(value).ok())
    }

    pub fn transaction(&self, index: usize) -> Option<&SharedTransaction> {
        match self.0.get(index) {
            Some(CommandArg::Transaction(tr)) => Some(tr),
            _ => None,
        }
    }

    pub fn callback(&self, index: usize) -> Option<&Rc<dyn Fn()>> {
        match self.0.get(index) {
            Some(CommandArg::Callback(callback)) => Some(callback),
            _ => None,
        }
    }

    pub fn command(&self, index: usize) -> Option<&RawCommand> {
        match self.0.get(index) {
            Some(CommandArg::Command(command)) => Some(command),
            _ => None,
        }
    }

    pub fn delayed(&self, index: usize) -> Option<&DelayedValue> {
        match self.0.get(index) {
            Some(CommandArg::Delayed(delayed)) => Some(delayed),
            _ => None,
        }
    }

    pub fn require_value(&self, command: &str, index: usize) -> Result<&Value> {
        self.value(index)
            .ok_or_else(|| missing(command, index, "a value"))
    }

    pub fn require_str(&self, command: &str, index: usize) -> Result<&str> {
        self.str(index).ok_or_else(|| missing(command, index, "a string"))
    }

    pub fn require_usize(&self, command: &str, index: usize) -> Result<usize> {
        self.usize(index)
            .ok_or_else(|| missing(command, index, "a position"))
    }

    pub fn require_transaction(&self, command: &str, index: usize) -> Result<&SharedTransaction> {
        self.transaction(index)
            .ok_or_else(|| missing(command, index, "a transaction"))
    }

    pub fn require_command(&self, command: &str, index: usize) -> Result<&RawCommand> {
        self.command(index)
            .ok_or_else(|| missing(command, index, "a command"))
    }

    /// Deserialize a value argument
    pub fn decode<T: DeserializeOwned>(&self, command: &str, index: usize) -> Result<T> {
        let value = self.require_value(command, index)?;
        serde_json::from_value(value.clone())
            .map_err(|err| EditorError::invalid_arguments(command, err))
    }
}

impl From<Vec<CommandArg>> for CommandArgs {
    fn from(args: Vec<CommandArg>) -> Self {
        Self(args)
    }
}

fn missing(command: &str, index: usize, expected: &str) -> EditorError {
    EditorError::invalid_arguments(command, format!("argument {index} must be {expected}"))
}

const COMMANDS_META: &str = "commands";

/// Entry of the `commands` transaction meta object
pub(crate) fn commands_meta<'t>(tr: &'t Transaction, key: &str) -> Option<&'t Value> {
    tr.get_meta(COMMANDS_META).and_then(|meta| meta.get(key))
}

/// Set one entry of the `commands` meta object, keeping the others
pub(crate) fn set_commands_meta<'t>(
    tr: &'t mut Transaction,
    key: &str,
    value: Value,
) -> &'t mut Transaction {
    let mut meta = match tr.get_meta(COMMANDS_META) {
        Some(Value::Object(map)) => map.clone(),
        _ => serde_json::Map::new(),
    };
    meta.insert(key.to_string(), value);
    tr.set_meta(COMMANDS_META, Value::Object(meta))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command_args;
    use serde_json::json;

    #[test]
    fn table_replaces_same_name() {
        let table = CommandTable::new()
            .with("a", CommandDecl::new(|_| Ok(command(|_| Ok(true)))))
            .with("b", CommandDecl::new(|_| Ok(command(|_| Ok(true)))))
            .with(
                "a",
                CommandDecl::new(|_| Ok(command(|_| Ok(false))))
                    .with_options(CommandOptions::unchainable()),
            );

        assert_eq!(table.names().collect::<Vec<_>>(), vec!["a", "b"]);
        assert!(table.get("a").unwrap().options.disable_chaining);
    }

    #[test]
    fn args_accessors() {
        let args = command_args!["text", 3usize, true, json!({ "level": 2 })];
        assert_eq!(args.len(), 4);
        assert_eq!(args.str(0), Some("text"));
        assert_eq!(args.usize(1), Some(3));
        assert_eq!(args.bool(2), Some(true));
        assert_eq!(args.str(1), None);

        #[derive(Deserialize)]
        struct Level {
            level: u8,
        }
        let decoded: Level = args.decode("heading", 3).unwrap();
        assert_eq!(decoded.level, 2);
    }

    #[test]
    fn missing_arguments_name_the_command() {
        let args = command_args![];
        let err = args.require_str("insertText", 0).unwrap_err();
        assert_eq!(
            err,
            EditorError::InvalidCommandArguments {
                command: "insertText".into(),
                message: "argument 0 must be a string".into()
            }
        );
    }

    #[test]
    fn options_read_camel_case() {
        let options: CommandOptions =
            serde_json::from_value(json!({ "disableChaining": true, "label": "Bold" })).unwrap();
        assert!(options.disable_chaining);
        assert_eq!(options.label.as_deref(), Some("Bold"));
    }
}

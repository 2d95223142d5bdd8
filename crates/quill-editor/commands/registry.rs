//! Command registry and command chains
//!
//! Names are validated when the manager is created. The callable wrappers
//! ([`CommandShape`] and [`ChainedCommands`]) are built once a view is
//! attached, because every call needs the view to dispatch to.

use super::{CommandArgs, CommandDecl, CommandFunction, CommandOptions, CommandTable, SharedTransaction};
use crate::core::{EditorError, NameKind, Result};
use crate::manager::ExtensionStore;
use ahash::{AHashMap, AHashSet};
use std::fmt;
use std::rc::Rc;
use tracing::trace;

/// Names used by the chaining surface itself
pub const RESERVED_COMMAND_NAMES: [&str; 4] = ["run", "chain", "original", "raw"];

/// Merge the command tables of every extension, in extension order
///
/// Each item holds one extension's `create_commands` and
/// `decorated_commands`; a decorated command replaces a created command of
/// the same name within that extension. Any name contributed by two
/// extensions is a duplicate.
pub(crate) fn collect_commands<I>(contributions: I) -> Result<CommandTable>
where
    I: IntoIterator<Item = (CommandTable, CommandTable)>,
{
    let mut merged = CommandTable::new();
    let mut seen = AHashSet::new();

    for (created, decorated) in contributions {
        let mut own = created;
        for (name, decl) in decorated {
            own.insert(name, decl);
        }

        for (name, decl) in own {
            if RESERVED_COMMAND_NAMES.contains(&name.as_str()) {
                return Err(EditorError::ReservedName {
                    kind: NameKind::Command,
                    name,
                });
            }
            if !seen.insert(name.clone()) {
                return Err(EditorError::DuplicateNames {
                    kind: NameKind::Command,
                    name,
                });
            }
            merged.insert(name, decl);
        }
    }

    Ok(merged)
}

/// Unchained command
///
/// `call` runs against the live state and dispatches straight to the view.
#[derive(Clone)]
pub struct CommandShape {
    name: String,
    decl: CommandDecl,
    store: ExtensionStore,
}

impl CommandShape {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &CommandOptions {
        &self.decl.options
    }

    /// Run the command and dispatch its transaction
    pub fn call(&self, args: CommandArgs) -> Result<bool> {
        let run = (self.decl.factory)(&args)?;
        trace!(command = %self.name, "calling command");
        self.store.with_command_props(run)
    }

    /// Whether the command could run, without dispatching or touching the
    /// shared transaction
    pub fn is_enabled(&self, args: CommandArgs) -> Result<bool> {
        let run = (self.decl.factory)(&args)?;
        self.store.with_check_props(run)
    }

    /// The command function produced by the factory, for use inside other commands
    pub fn original(&self, args: &CommandArgs) -> Result<CommandFunction> {
        (self.decl.factory)(args)
    }
}

impl fmt::Debug for CommandShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandShape")
            .field("name", &self.name)
            .field("options", &self.decl.options)
            .finish()
    }
}

/// Commands that share one transaction and dispatch once
///
/// ```
/// use quill_editor::{command_args, Framework, FrameworkProps, Manager, ManagerSettings};
///
/// # fn main() -> quill_editor::Result<()> {
/// let manager = Manager::create(Vec::new(), ManagerSettings::default())?;
/// let framework = Framework::headless(manager.clone(), FrameworkProps::default())?;
///
/// let chain = manager.chain()?;
/// chain.call("insertText", command_args!["a"])?;
/// chain.call("insertText", command_args!["b"])?;
/// // Nothing is dispatched until `run`
/// assert_eq!(framework.get_state()?.doc().text(), "");
/// chain.run()?;
/// assert_eq!(framework.get_state()?.doc().text(), "ab");
/// # Ok(())
/// # }
/// ```
pub struct ChainedCommands {
    commands: AHashMap<String, CommandDecl>,
    store: ExtensionStore,
}

impl ChainedCommands {
    /// Add a command's steps to the shared transaction
    ///
    /// The command's own result is ignored. A command that dispatches a
    /// transaction other than the shared one fails with an invariant
    /// violation.
    pub fn call(&self, name: &str, args: CommandArgs) -> Result<&Self> {
        let decl = self
            .commands
            .get(name)
            .ok_or_else(|| EditorError::CommandNotFound {
                name: name.to_string(),
            })?;
        if decl.options.disable_chaining {
            return Err(EditorError::invariant(format!(
                "command '{name}' cannot be chained"
            )));
        }

        let run = (decl.factory)(&args)?;
        trace!(command = name, "chaining command");
        self.store.with_chain_props(run)?;
        Ok(self)
    }

    /// Dispatch the shared transaction to the view
    pub fn run(&self) -> Result<()> {
        trace!("running command chain");
        self.store.dispatch_shared()
    }

    /// The shared transaction the chain is building
    pub fn tr(&self) -> Result<SharedTransaction> {
        self.store.get_transaction()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.commands
            .get(name)
            .is_some_and(|decl| !decl.options.disable_chaining)
    }

    /// Chainable command names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .commands
            .iter()
            .filter(|(_, decl)| !decl.options.disable_chaining)
            .map(|(name, _)| name.as_str())
            .collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for ChainedCommands {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainedCommands")
            .field("commands", &self.names())
            .finish()
    }
}

/// Callable commands of a manager
pub struct CommandRegistry {
    commands: AHashMap<String, CommandShape>,
    order: Vec<String>,
    chain: Rc<ChainedCommands>,
}

impl CommandRegistry {
    pub(crate) fn new(table: CommandTable, store: &ExtensionStore) -> Self {
        let mut commands = AHashMap::new();
        let mut chained = AHashMap::new();
        let mut order = Vec::with_capacity(table.len());

        for (name, decl) in table {
            order.push(name.clone());
            chained.insert(name.clone(), decl.clone());
            commands.insert(
                name.clone(),
                CommandShape {
                    name,
                    decl,
                    store: store.clone(),
                },
            );
        }

        Self {
            commands,
            order,
            chain: Rc::new(ChainedCommands {
                commands: chained,
                store: store.clone(),
            }),
        }
    }

    pub fn get(&self, name: &str) -> Result<&CommandShape> {
        self.commands
            .get(name)
            .ok_or_else(|| EditorError::CommandNotFound {
                name: name.to_string(),
            })
    }

    /// Call a command by name
    pub fn call(&self, name: &str, args: CommandArgs) -> Result<bool> {
        self.get(name)?.call(args)
    }

    pub fn is_enabled(&self, name: &str, args: CommandArgs) -> Result<bool> {
        self.get(name)?.is_enabled(args)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    /// Command names in registration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Registration options of a command
    pub fn meta(&self, name: &str) -> Option<&CommandOptions> {
        self.commands.get(name).map(CommandShape::options)
    }

    pub fn chain(&self) -> Rc<ChainedCommands> {
        self.chain.clone()
    }
}

impl fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("commands", &self.order)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::command;

    fn decl(result: bool) -> CommandDecl {
        CommandDecl::new(move |_| Ok(command(move |_| Ok(result))))
    }

    #[test]
    fn decorated_commands_replace_created_ones() {
        let created = CommandTable::new().with("toggle", decl(false));
        let decorated = CommandTable::new().with(
            "toggle",
            decl(true).with_options(CommandOptions::default().with_label("Toggle")),
        );

        let merged = collect_commands([(created, decorated)]).unwrap();
        assert_eq!(merged.len(), 1);
        assert_eq!(
            merged.get("toggle").unwrap().options.label.as_deref(),
            Some("Toggle")
        );
    }

    #[test]
    fn duplicates_across_extensions_fail() {
        let err = collect_commands([
            (CommandTable::new().with("toggle", decl(true)), CommandTable::new()),
            (CommandTable::new(), CommandTable::new().with("toggle", decl(true))),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            EditorError::DuplicateNames {
                kind: NameKind::Command,
                name: "toggle".into()
            }
        );
    }

    #[test]
    fn reserved_names_fail() {
        for reserved in RESERVED_COMMAND_NAMES {
            let err = collect_commands([(
                CommandTable::new().with(reserved, decl(true)),
                CommandTable::new(),
            )])
            .unwrap_err();
            assert!(matches!(err, EditorError::ReservedName { .. }));
        }
    }
}

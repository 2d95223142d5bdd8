//! Property-based tests for quill-editor
//!
//! Uses proptest to check command name uniqueness, single-dispatch chains
//! and keymap ordering over generated inputs.

use proptest::prelude::*;
use quill_editor::commands::command;
use quill_editor::keymap::normalize_key_name;
use quill_editor::model::{PrimitiveSelection, Transaction};
use quill_editor::*;
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

/// Contributes one command that inserts nothing
#[derive(Clone)]
struct NamedCommand {
    name: String,
    command: String,
}

impl Extension for NamedCommand {
    fn name(&self) -> &str {
        &self.name
    }

    fn create_commands(&self) -> CommandTable {
        CommandTable::new().with(
            self.command.clone(),
            CommandDecl::new(|_| Ok(command(|props| props.commit()))),
        )
    }

    fn clone_with_options(&self, _options: ExtensionOptions) -> Box<dyn Extension> {
        Box::new(self.clone())
    }
}

/// Binds `Mod-k` and records its index
#[derive(Clone)]
struct IndexedBinding {
    name: String,
    index: usize,
    priority: i32,
    log: Rc<RefCell<Vec<usize>>>,
}

impl Extension for IndexedBinding {
    fn name(&self) -> &str {
        &self.name
    }

    fn create_keymap(&self, _shortcuts: &ShortcutMap) -> Option<PrioritizedKeyBindings> {
        let log = self.log.clone();
        let index = self.index;
        Some(PrioritizedKeyBindings::with_priority(
            Priority(self.priority),
            KeyBindings::new().with("Mod-k", move |_props| {
                log.borrow_mut().push(index);
                Ok(false)
            }),
        ))
    }

    fn clone_with_options(&self, _options: ExtensionOptions) -> Box<dyn Extension> {
        Box::new(self.clone())
    }
}

fn arb_modifiers() -> impl Strategy<Value = Vec<&'static str>> {
    prop::sample::subsequence(vec!["Shift", "Alt", "Mod", "Ctrl", "Meta"], 0..=5).prop_shuffle()
}

proptest! {
    #[test]
    fn command_names_must_be_unique(commands in prop::collection::vec("[a-c]{1,2}", 1..6)) {
        let extensions: Vec<Box<dyn Extension>> = commands
            .iter()
            .enumerate()
            .map(|(i, command)| {
                Box::new(NamedCommand {
                    name: format!("ext{i}"),
                    command: command.clone(),
                }) as Box<dyn Extension>
            })
            .collect();
        let unique = commands.iter().collect::<HashSet<_>>().len() == commands.len();

        match Manager::create(extensions, ManagerSettings::default()) {
            Ok(manager) => {
                prop_assert!(unique);
                let _framework = Framework::headless(manager.clone(), FrameworkProps::default()).unwrap();
                let registry = manager.commands().unwrap();
                for command in &commands {
                    prop_assert!(registry.contains(command));
                }
            }
            Err(err) => {
                prop_assert!(!unique);
                prop_assert!(err.is_name_conflict());
            }
        }
    }

    #[test]
    fn chained_inserts_dispatch_once(texts in prop::collection::vec("[a-z]{1,5}", 1..8)) {
        let manager = Manager::create(vec![], ManagerSettings::default()).unwrap();
        let dispatches = Rc::new(RefCell::new(0usize));
        let seen = dispatches.clone();
        let framework = Framework::headless(
            manager.clone(),
            FrameworkProps::default().on_dispatch_transaction(move |tr: Transaction, _| {
                *seen.borrow_mut() += 1;
                tr
            }),
        )
        .unwrap();

        let chain = manager.chain().unwrap();
        for text in &texts {
            chain.call("insertText", command_args![text.as_str()]).unwrap();
        }
        prop_assert_eq!(*dispatches.borrow(), 0);
        chain.run().unwrap();

        prop_assert_eq!(*dispatches.borrow(), 1);
        prop_assert_eq!(framework.get_state().unwrap().doc().text(), texts.concat());
    }

    #[test]
    fn key_handlers_run_in_descending_priority(
        priorities in prop::collection::hash_set(-1000i32..1000, 1..6)
    ) {
        let priorities: Vec<i32> = priorities.into_iter().collect();
        let log = Rc::new(RefCell::new(Vec::new()));
        let extensions: Vec<Box<dyn Extension>> = priorities
            .iter()
            .enumerate()
            .map(|(index, priority)| {
                Box::new(IndexedBinding {
                    name: format!("binding{index}"),
                    index,
                    priority: *priority,
                    log: log.clone(),
                }) as Box<dyn Extension>
            })
            .collect();
        let settings = ManagerSettings::default().with_platform(Platform::Other);
        let manager = Manager::create(extensions, settings).unwrap();
        let _framework = Framework::headless(
            manager.clone(),
            FrameworkProps::default().with_selection(PrimitiveSelection::End),
        )
        .unwrap();

        prop_assert!(!manager.handle_key_name("Mod-k").unwrap());

        let mut expected: Vec<usize> = (0..priorities.len()).collect();
        expected.sort_by_key(|&index| std::cmp::Reverse(priorities[index]));
        prop_assert_eq!(log.borrow().clone(), expected);
    }

    #[test]
    fn key_name_normalization_is_idempotent(
        modifiers in arb_modifiers(),
        key in "[a-z]|Enter|Space|F[1-9]",
        mac in any::<bool>(),
    ) {
        let platform = if mac { Platform::Mac } else { Platform::Other };
        let mut name = modifiers.join("-");
        if !name.is_empty() {
            name.push('-');
        }
        name.push_str(&key);

        let once = normalize_key_name(&name, platform).unwrap();
        let twice = normalize_key_name(&once.replace(' ', "Space"), platform).unwrap();
        prop_assert_eq!(once, twice);
    }
}

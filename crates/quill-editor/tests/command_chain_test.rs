//! Command registry, command chains and the builtin commands

use pretty_assertions::assert_eq;
use quill_editor::commands::{command, raw_command};
use quill_editor::model::{MarkSpec, PrimitiveSelection, Transaction};
use quill_editor::*;
use serde_json::json;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

#[derive(Clone)]
struct InsertExtension {
    name: &'static str,
    command: &'static str,
    text: &'static str,
    options: CommandOptions,
}

impl InsertExtension {
    fn boxed(name: &'static str, command: &'static str, text: &'static str) -> Box<dyn Extension> {
        Box::new(Self {
            name,
            command,
            text,
            options: CommandOptions::default(),
        })
    }
}

impl Extension for InsertExtension {
    fn name(&self) -> &str {
        self.name
    }

    fn create_commands(&self) -> CommandTable {
        let text = self.text;
        CommandTable::new().with(
            self.command,
            CommandDecl::new(move |_| {
                Ok(command(move |props| {
                    props.tr.edit(|tr| tr.insert_text(text))?;
                    props.commit()
                }))
            })
            .with_options(self.options.clone()),
        )
    }

    fn clone_with_options(&self, _options: ExtensionOptions) -> Box<dyn Extension> {
        Box::new(self.clone())
    }
}

/// Extension whose command ignores the shared transaction
struct RogueExtension;

impl Extension for RogueExtension {
    fn name(&self) -> &str {
        "rogue"
    }

    fn create_commands(&self) -> CommandTable {
        CommandTable::new().with(
            "rogue",
            CommandDecl::new(|_| {
                Ok(command(|props| {
                    let mut fresh = props.state.tr();
                    fresh.insert_text("rogue")?;
                    if let Some(dispatch) = props.dispatch {
                        dispatch(SharedTransaction::new(fresh))?;
                    }
                    Ok(true)
                }))
            }),
        )
    }

    fn clone_with_options(&self, _options: ExtensionOptions) -> Box<dyn Extension> {
        Box::new(RogueExtension)
    }
}

struct BoldExtension;

impl Extension for BoldExtension {
    fn name(&self) -> &str {
        "bold"
    }

    fn schema(&self) -> Option<SchemaContribution> {
        Some(SchemaContribution::Mark(MarkSpec::new("bold")))
    }

    fn clone_with_options(&self, _options: ExtensionOptions) -> Box<dyn Extension> {
        Box::new(BoldExtension)
    }
}

/// Publishes extra view attributes through the store on every update
struct ClassExtension {
    class: Rc<RefCell<Option<&'static str>>>,
}

impl Extension for ClassExtension {
    fn name(&self) -> &str {
        "class"
    }

    fn on_state_update(&mut self, _update: &StateUpdate, store: &ExtensionStore) -> Result<()> {
        if let Some(class) = *self.class.borrow() {
            let mut extra = BTreeMap::new();
            extra.insert("class".to_string(), class.to_string());
            store.set_store_key("attributes", extra)?;
        }
        Ok(())
    }

    fn clone_with_options(&self, _options: ExtensionOptions) -> Box<dyn Extension> {
        Box::new(Self {
            class: self.class.clone(),
        })
    }
}

/// Editor with a dispatch counter
struct Editor {
    manager: Manager,
    framework: Framework,
    dispatches: Rc<RefCell<Vec<usize>>>,
    updates: Rc<Cell<usize>>,
    _unsubscribe: Unsubscribe,
}

impl Editor {
    fn new(extensions: Vec<Box<dyn Extension>>, content: &str) -> Self {
        let manager = Manager::create(extensions, ManagerSettings::default()).unwrap();
        let dispatches = Rc::new(RefCell::new(Vec::new()));
        let seen = dispatches.clone();
        let framework = Framework::headless(
            manager.clone(),
            FrameworkProps::default()
                .with_content(content)
                .with_selection(PrimitiveSelection::End)
                .on_dispatch_transaction(move |tr: Transaction, _| {
                    seen.borrow_mut().push(tr.steps().len());
                    tr
                }),
        )
        .unwrap();

        let updates = Rc::new(Cell::new(0));
        let counter = updates.clone();
        let unsubscribe = manager.add_handler(ManagerEventKind::StateUpdate, move |_| {
            counter.set(counter.get() + 1);
        });

        Self {
            manager,
            framework,
            dispatches,
            updates,
            _unsubscribe: unsubscribe,
        }
    }

    fn text(&self) -> String {
        self.framework.get_state().unwrap().doc().text()
    }

    fn call(&self, name: &str, args: CommandArgs) -> bool {
        self.manager.commands().unwrap().call(name, args).unwrap()
    }
}

fn foo_bar() -> Vec<Box<dyn Extension>> {
    vec![
        InsertExtension::boxed("foo", "insertFoo", "foo"),
        InsertExtension::boxed("bar", "insertBar", "bar"),
    ]
}

// ===== Chaining =====

#[test]
fn test_chain_dispatches_once() {
    let editor = Editor::new(foo_bar(), "");

    editor
        .manager
        .chain()
        .unwrap()
        .call("insertFoo", command_args![])
        .unwrap()
        .call("insertBar", command_args![])
        .unwrap()
        .run()
        .unwrap();

    assert_eq!(editor.text(), "foobar");
    assert_eq!(editor.updates.get(), 1);
    assert_eq!(*editor.dispatches.borrow(), vec![2]);
}

#[test]
fn test_chain_macro() -> Result<()> {
    let editor = Editor::new(foo_bar(), "");
    chain!(editor.manager, insertFoo(), insertText("-"), insertBar())?;

    assert_eq!(editor.text(), "foo-bar");
    assert_eq!(editor.updates.get(), 1);
    Ok(())
}

#[test]
fn test_unchained_calls_dispatch_each_time() {
    let editor = Editor::new(foo_bar(), "");

    assert!(editor.call("insertFoo", command_args![]));
    assert!(editor.call("insertBar", command_args![]));

    assert_eq!(editor.text(), "foobar");
    assert_eq!(editor.updates.get(), 2);
    assert_eq!(*editor.dispatches.borrow(), vec![1, 1]);
}

#[test]
fn test_nothing_dispatched_before_run() {
    let editor = Editor::new(foo_bar(), "");
    let chain = editor.manager.chain().unwrap();
    chain.call("insertFoo", command_args![]).unwrap();

    assert_eq!(editor.text(), "");
    assert_eq!(chain.tr().unwrap().read(|tr| tr.doc().text()).unwrap(), "foo");
    assert!(editor.dispatches.borrow().is_empty());
}

#[test]
fn test_foreign_transaction_in_chain_is_rejected() {
    let editor = Editor::new(vec![Box::new(RogueExtension)], "");
    let chain = editor.manager.chain().unwrap();

    let err = chain.call("rogue", command_args![]).unwrap_err();
    assert!(matches!(err, EditorError::InvariantViolation { .. }));
    assert!(editor.dispatches.borrow().is_empty());
}

#[test]
fn test_unchainable_commands() {
    let extension = InsertExtension {
        name: "solo",
        command: "insertSolo",
        text: "solo",
        options: CommandOptions::unchainable(),
    };
    let editor = Editor::new(vec![Box::new(extension)], "");
    let chain = editor.manager.chain().unwrap();

    assert!(!chain.contains("insertSolo"));
    assert!(matches!(
        chain.call("insertSolo", command_args![]),
        Err(EditorError::InvariantViolation { .. })
    ));
    assert!(editor.call("insertSolo", command_args![]));
    assert_eq!(editor.text(), "solo");
}

#[test]
fn test_unknown_command() {
    let editor = Editor::new(Vec::new(), "");
    let commands = editor.manager.commands().unwrap();

    assert!(matches!(
        commands.call("nope", command_args![]),
        Err(EditorError::CommandNotFound { .. })
    ));
    assert!(matches!(
        editor.manager.chain().unwrap().call("nope", command_args![]),
        Err(EditorError::CommandNotFound { .. })
    ));
}

// ===== Shared transaction =====

#[test]
fn test_stale_transaction_is_refreshed_with_queued_steps() {
    let editor = Editor::new(Vec::new(), "hello");
    let chain = editor.manager.chain().unwrap();
    chain.call("insertText", command_args!["!"]).unwrap();

    let view = editor.manager.view().unwrap();
    let state = view.state();
    let mut tr = state.tr();
    tr.insert_text_at(" world", 5, 5).unwrap();
    view.update_state(state.apply(tr).unwrap());

    let shared = editor.manager.tr().unwrap();
    assert_eq!(
        shared.read(|tr| tr.before().text()).unwrap(),
        "hello world"
    );
    assert_eq!(shared.read(|tr| tr.steps().len()).unwrap(), 1);
    assert_eq!(shared.read(|tr| tr.doc().text()).unwrap(), "hello! world");

    chain.run().unwrap();
    assert_eq!(editor.text(), "hello! world");
}

#[test]
fn test_state_update_resets_the_shared_transaction() {
    let editor = Editor::new(Vec::new(), "");
    let before = editor.manager.tr().unwrap();
    editor.call("insertText", command_args!["a"]);

    let after = editor.manager.tr().unwrap();
    assert!(!before.ptr_eq(&after));
    assert_eq!(after.read(|tr| tr.steps().len()).unwrap(), 0);
}

#[test]
fn test_custom_transaction_until_restore() {
    let editor = Editor::new(Vec::new(), "abc");
    let custom = SharedTransaction::new(editor.framework.get_state().unwrap().tr());

    assert!(editor.call("custom", command_args![custom.clone()]));
    assert!(editor.manager.tr().unwrap().ptr_eq(&custom));

    let chain = editor.manager.chain().unwrap();
    chain.call("insertText", command_args!["d"]).unwrap();
    assert_eq!(custom.read(|tr| tr.doc().text()).unwrap(), "abcd");

    assert!(editor.call("restore", command_args![]));
    assert!(!editor.manager.tr().unwrap().ptr_eq(&custom));
    assert_eq!(editor.text(), "abc");
}

#[test]
fn test_is_enabled_leaves_state_untouched() {
    let editor = Editor::new(Vec::new(), "abc");
    let commands = editor.manager.commands().unwrap();

    assert!(!commands.is_enabled("delete", command_args![]).unwrap());
    assert!(commands.is_enabled("insertText", command_args!["x"]).unwrap());
    assert_eq!(editor.text(), "abc");
    assert_eq!(
        editor
            .manager
            .tr()
            .unwrap()
            .read(|tr| tr.steps().len())
            .unwrap(),
        0
    );
    assert!(editor.dispatches.borrow().is_empty());
}

// ===== Builtin commands =====

#[test]
fn test_insert_and_delete_ranges() {
    let editor = Editor::new(Vec::new(), "hello");

    assert!(editor.call("insertText", command_args!["J", json!({ "from": 0, "to": 1 })]));
    assert_eq!(editor.text(), "Jello");

    assert!(editor.call("delete", command_args![json!({ "from": 1, "to": 3 })]));
    assert_eq!(editor.text(), "Jlo");
    assert!(!editor.call("delete", command_args![]));

    assert!(editor.call("insertNewLine", command_args![]));
    assert_eq!(editor.text(), "Jlo\n");
}

#[test]
fn test_select_text_and_empty_selection() {
    let editor = Editor::new(Vec::new(), "hello");

    assert!(editor.call(
        "selectText",
        command_args![json!({ "range": { "anchor": 1, "head": 3 } })]
    ));
    let selection = editor.framework.get_state().unwrap().selection();
    assert_eq!((selection.from(), selection.to()), (1, 3));

    assert!(editor.call("emptySelection", command_args![]));
    assert!(editor.framework.get_state().unwrap().selection().empty());
    assert!(!editor.call("emptySelection", command_args![]));

    assert!(editor.call("selectText", command_args![json!("all")]));
    assert!(editor.call("delete", command_args![]));
    assert_eq!(editor.text(), "");
}

#[test]
fn test_custom_dispatch_runs_raw_command() {
    let editor = Editor::new(Vec::new(), "");
    let raw = raw_command(|props| {
        props.tr.edit(|tr| tr.insert_text("raw"))?;
        props.commit()
    });

    assert!(editor.call("customDispatch", command_args![raw]));
    assert_eq!(editor.text(), "raw");
}

#[test]
fn test_marks_and_doc_attributes() {
    let editor = Editor::new(vec![Box::new(BoldExtension)], "bold text");
    let helpers = editor.manager.helpers();

    assert!(editor.call("addMark", command_args!["bold", json!(null), json!({ "from": 0, "to": 4 })]));
    assert!(editor.call("selectText", command_args![json!({ "range": { "anchor": 0, "head": 4 } })]));
    assert_eq!(helpers.call("isActive", command_args!["bold"]).unwrap(), json!(true));
    assert!(helpers.is_active("bold").unwrap());

    assert!(editor.call("removeMark", command_args!["bold"]));
    assert!(!helpers.is_active("bold").unwrap());

    assert!(editor.call("updateDocAttributes", command_args![json!({ "lang": "en" })]));
    assert_eq!(
        editor.framework.get_state().unwrap().doc().attr("lang"),
        Some(&json!("en"))
    );
    assert!(matches!(
        editor.manager.commands().unwrap().call("updateDocAttributes", command_args!["en"]),
        Err(EditorError::InvalidCommandArguments { .. })
    ));
}

#[test]
fn test_unknown_mark_is_rejected() {
    let editor = Editor::new(Vec::new(), "text");
    let result = editor
        .manager
        .commands()
        .unwrap()
        .call("addMark", command_args!["bold", json!(null), json!({ "from": 0, "to": 2 })]);
    assert!(result.is_err());
    assert_eq!(editor.text(), "text");
}

#[test]
fn test_force_update_refreshes_view_attributes() {
    let classes = Rc::new(RefCell::new(None));
    let editor = Editor::new(
        vec![Box::new(ClassExtension {
            class: classes.clone(),
        })],
        "",
    );
    *classes.borrow_mut() = Some("extra");

    // Publish the class from the extension's update hook
    assert!(editor.call("emptyUpdate", command_args![]));

    assert!(editor.call("forceUpdate", command_args![json!(["attributes"])]));

    let attributes = editor.manager.view().unwrap().props().attributes;
    assert_eq!(
        attributes.get("class").map(String::as_str),
        Some("quill-editor extra")
    );
}

#[test]
fn test_empty_update_runs_its_action_before_dispatch() {
    let editor = Editor::new(Vec::new(), "ab");
    let calls = Rc::new(Cell::new(0));
    let counter = calls.clone();
    let updates = editor.updates.clone();
    let seen_updates = Rc::new(Cell::new(None));
    let seen = seen_updates.clone();
    let action = CommandArg::callback(move || {
        counter.set(counter.get() + 1);
        seen.set(Some(updates.get()));
    });

    let registry = editor.manager.commands().unwrap();
    assert!(registry
        .is_enabled("emptyUpdate", command_args![action.clone()])
        .unwrap());
    assert_eq!(calls.get(), 0);

    assert!(editor.call("emptyUpdate", command_args![action]));
    assert_eq!(calls.get(), 1);
    assert_eq!(seen_updates.get(), Some(0));
    assert_eq!(editor.updates.get(), 1);
    assert_eq!(editor.text(), "ab");
}

#[test]
fn test_focus_and_blur() {
    let editor = Editor::new(Vec::new(), "abc");
    let events = Rc::new(RefCell::new(Vec::new()));
    let log = events.clone();
    let _unsubscribe = editor.framework.add_handler(FrameworkEventKind::Focus, move |_| {
        log.borrow_mut().push("focus");
    });

    assert!(editor.call("focus", command_args![]));
    assert!(editor.manager.view().unwrap().has_focus());
    assert!(!editor.call("focus", command_args![]));

    assert!(editor.call("focus", command_args![json!("start")]));
    assert_eq!(editor.framework.get_state().unwrap().selection().from(), 0);

    assert!(editor.call("blur", command_args![]));
    assert!(!editor.call("blur", command_args![]));
    assert_eq!(*events.borrow(), vec!["focus"]);
}

// ===== Delayed commands =====

#[test]
fn test_delayed_insert_waits_for_the_value() {
    let editor = Editor::new(Vec::new(), "ab");
    let (delayed, resolver) = DelayedValue::pending();

    assert!(editor.call("insertText", command_args![delayed]));
    assert_eq!(editor.text(), "ab");
    // The placeholder is recorded with an empty update
    assert_eq!(editor.updates.get(), 1);

    resolver.resolve(json!("!"));
    assert_eq!(editor.text(), "ab!");
    assert_eq!(editor.updates.get(), 2);
}

#[test]
fn test_delayed_insert_follows_later_edits() {
    let editor = Editor::new(Vec::new(), "ab");
    let (delayed, resolver) = DelayedValue::pending();
    editor.call("insertText", command_args![delayed]);

    editor.call("insertText", command_args!["X", json!({ "from": 0 })]);
    resolver.resolve(json!(42));

    assert_eq!(editor.text(), "Xab42");
}

#[test]
fn test_delayed_insert_after_prefix_is_typed() {
    let editor = Editor::new(Vec::new(), "hello");
    let (delayed, resolver) = DelayedValue::pending();
    editor.call("insertText", command_args![delayed]);

    editor.call("insertText", command_args![">> ", json!({ "from": 0 })]);
    editor.call("insertText", command_args!["?", json!({ "from": 1 })]);
    resolver.resolve(json!("!"));

    assert_eq!(editor.text(), ">?> hello!");
}

#[test]
fn test_delayed_insert_in_a_chain_tracks_later_chained_edits() {
    let editor = Editor::new(Vec::new(), "ab");
    let (delayed, resolver) = DelayedValue::pending();

    editor
        .manager
        .chain()
        .unwrap()
        .call("insertText", command_args![delayed])
        .unwrap()
        .call("insertText", command_args!["X", json!({ "from": 0 })])
        .unwrap()
        .run()
        .unwrap();
    assert_eq!(editor.text(), "Xab");

    resolver.resolve(json!("!"));
    assert_eq!(editor.text(), "Xab!");
}

#[test]
fn test_delayed_insert_replaces_the_tracked_selection() {
    let editor = Editor::new(Vec::new(), "abcdef");
    editor.call(
        "selectText",
        command_args![json!({ "range": { "anchor": 2, "head": 4 } })],
    );
    let (delayed, resolver) = DelayedValue::pending();
    editor.call("insertText", command_args![delayed]);

    editor.call("insertText", command_args!["__", json!({ "from": 0 })]);
    resolver.resolve(json!("CD"));

    assert_eq!(editor.text(), "__abCDef");
}

#[test]
fn test_rejected_delayed_value_leaves_document() {
    let editor = Editor::new(Vec::new(), "ab");
    let (delayed, resolver) = DelayedValue::pending();
    editor.call("insertText", command_args![delayed]);

    resolver.reject("network down");
    assert_eq!(editor.text(), "ab");
    assert_eq!(editor.updates.get(), 1);
}

#[test]
fn test_settled_value_applies_immediately() {
    let editor = Editor::new(Vec::new(), "");
    editor.call("insertText", command_args![DelayedValue::resolved(json!("now"))]);
    assert_eq!(editor.text(), "now");
}

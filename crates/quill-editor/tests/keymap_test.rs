//! Keymap merging, priority ordering and the base keymap

use pretty_assertions::assert_eq;
use quill_editor::keymap::normalize_key_name;
use quill_editor::model::PrimitiveSelection;
use quill_editor::*;
use serde_json::json;
use std::cell::RefCell;
use std::rc::Rc;

type Log = Rc<RefCell<Vec<i32>>>;

/// Binds `Mod-k` at a fixed priority and records every call
#[derive(Clone)]
struct KeyExtension {
    name: &'static str,
    priority: i32,
    handled: bool,
    log: Log,
}

impl KeyExtension {
    fn boxed(name: &'static str, priority: i32, handled: bool, log: &Log) -> Box<dyn Extension> {
        Box::new(Self {
            name,
            priority,
            handled,
            log: log.clone(),
        })
    }
}

impl Extension for KeyExtension {
    fn name(&self) -> &str {
        self.name
    }

    fn create_keymap(&self, _shortcuts: &ShortcutMap) -> Option<PrioritizedKeyBindings> {
        let log = self.log.clone();
        let priority = self.priority;
        let handled = self.handled;
        Some(PrioritizedKeyBindings::with_priority(
            Priority(priority),
            KeyBindings::new().with("Mod-k", move |_props| {
                log.borrow_mut().push(priority);
                Ok(handled)
            }),
        ))
    }

    fn clone_with_options(&self, _options: ExtensionOptions) -> Box<dyn Extension> {
        Box::new(self.clone())
    }
}

/// Runs the lower priority handlers first and records their result
struct WrappingExtension {
    log: Log,
}

impl Extension for WrappingExtension {
    fn name(&self) -> &str {
        "wrapping"
    }

    fn create_keymap(&self, _shortcuts: &ShortcutMap) -> Option<PrioritizedKeyBindings> {
        let log = self.log.clone();
        Some(PrioritizedKeyBindings::with_priority(
            Priority(50),
            KeyBindings::new().with("Mod-k", move |props| {
                let handled = props.next()?;
                log.borrow_mut().push(if handled { 1 } else { 0 });
                Ok(true)
            }),
        ))
    }

    fn clone_with_options(&self, _options: ExtensionOptions) -> Box<dyn Extension> {
        Box::new(Self {
            log: self.log.clone(),
        })
    }
}

/// Binds the bold shortcut through the active shortcut map
struct BoldShortcutExtension {
    log: Log,
}

impl Extension for BoldShortcutExtension {
    fn name(&self) -> &str {
        "boldShortcut"
    }

    fn keybindings(&self) -> Vec<KeyBindingDecl> {
        let log = self.log.clone();
        vec![KeyBindingDecl::new(NamedShortcut::Bold, move |_props| {
            log.borrow_mut().push(1);
            Ok(true)
        })]
    }

    fn clone_with_options(&self, _options: ExtensionOptions) -> Box<dyn Extension> {
        Box::new(Self {
            log: self.log.clone(),
        })
    }
}

fn settings() -> ManagerSettings {
    ManagerSettings::default().with_platform(Platform::Other)
}

fn editor(
    extensions: Vec<Box<dyn Extension>>,
    settings: ManagerSettings,
    content: &str,
) -> (Manager, Framework) {
    let manager = Manager::create(extensions, settings).unwrap();
    let framework = Framework::headless(
        manager.clone(),
        FrameworkProps::default()
            .with_content(content)
            .with_selection(PrimitiveSelection::End),
    )
    .unwrap();
    (manager, framework)
}

fn text(framework: &Framework) -> String {
    framework.get_state().unwrap().doc().text()
}

// ===== Priority ordering =====

#[test]
fn test_handlers_run_highest_priority_first() {
    let log = Log::default();
    let (manager, _framework) = editor(
        vec![
            KeyExtension::boxed("a", 10, false, &log),
            KeyExtension::boxed("b", 5, false, &log),
            KeyExtension::boxed("c", 20, false, &log),
        ],
        settings(),
        "",
    );

    assert!(!manager.handle_key_name("Mod-k").unwrap());
    assert_eq!(*log.borrow(), vec![20, 10, 5]);
}

#[test]
fn test_first_handler_returning_true_stops_the_walk() {
    let log = Log::default();
    let (manager, _framework) = editor(
        vec![
            KeyExtension::boxed("a", 10, true, &log),
            KeyExtension::boxed("b", 5, false, &log),
            KeyExtension::boxed("c", 20, false, &log),
        ],
        settings(),
        "",
    );

    assert!(manager.handle_key_name("Mod-k").unwrap());
    assert_eq!(*log.borrow(), vec![20, 10]);
}

#[test]
fn test_key_event_matches_the_normalized_name() {
    let log = Log::default();
    let (_manager, framework) = editor(
        vec![KeyExtension::boxed("a", 10, true, &log)],
        settings(),
        "",
    );

    let event = KeyEvent::new("k").with_mod(Platform::Other);
    assert!(framework.press_key(&event).unwrap());
    assert!(!framework.press_key(&KeyEvent::new("k")).unwrap());
    assert_eq!(*log.borrow(), vec![10]);
}

#[test]
fn test_next_runs_the_remaining_handlers() {
    let log = Log::default();
    let (manager, _framework) = editor(
        vec![
            Box::new(WrappingExtension { log: log.clone() }) as Box<dyn Extension>,
            KeyExtension::boxed("low", 5, false, &log),
            KeyExtension::boxed("high", 20, true, &log),
        ],
        settings(),
        "",
    );

    assert!(manager.handle_key_name("Mod-k").unwrap());
    // wrapping (50) calls next: high (20) handles it, low never runs
    assert_eq!(*log.borrow(), vec![20, 1]);
}

// ===== Runtime keymaps =====

#[test]
fn test_runtime_keymap_runs_before_static_bindings() {
    let log = Log::default();
    let (manager, _framework) = editor(
        vec![KeyExtension::boxed("a", 20, false, &log)],
        settings(),
        "",
    );

    let runtime_log = log.clone();
    let dispose = manager
        .add_keymap(PrioritizedKeyBindings::with_priority(
            Priority::LOW,
            KeyBindings::new().with("Mod-k", move |_props| {
                runtime_log.borrow_mut().push(-1);
                Ok(false)
            }),
        ))
        .unwrap();

    manager.handle_key_name("Mod-k").unwrap();
    assert_eq!(*log.borrow(), vec![-1, 20]);

    dispose();
    log.borrow_mut().clear();
    manager.handle_key_name("Mod-k").unwrap();
    assert_eq!(*log.borrow(), vec![20]);
}

#[test]
fn test_unbound_key_is_not_handled() {
    let (manager, _framework) = editor(vec![], settings(), "");
    assert!(!manager.handle_key_name("Mod-Shift-F12").unwrap());
}

#[test]
fn test_invalid_key_name_is_rejected() {
    let (manager, _framework) = editor(vec![], settings(), "");
    let err = manager.handle_key_name("Hyper-k").unwrap_err();
    assert!(matches!(err, EditorError::InvalidKeyPattern { .. }));
}

// ===== Base keymap =====

#[test]
fn test_enter_inserts_a_line_break() {
    let (_manager, framework) = editor(vec![], settings(), "ab");
    assert!(framework.press_key(&KeyEvent::new("Enter")).unwrap());
    assert_eq!(text(&framework), "ab\n");
}

#[test]
fn test_backspace_and_delete() {
    let (manager, framework) = editor(vec![], settings(), "abc");
    assert!(framework.press_key(&KeyEvent::new("Backspace")).unwrap());
    assert_eq!(text(&framework), "ab");

    // Nothing after the cursor
    assert!(!framework.press_key(&KeyEvent::new("Delete")).unwrap());

    manager
        .commands()
        .unwrap()
        .call("selectText", command_args![json!("start")])
        .unwrap();
    assert!(framework.press_key(&KeyEvent::new("Delete")).unwrap());
    assert_eq!(text(&framework), "b");
    assert!(!framework.press_key(&KeyEvent::new("Backspace")).unwrap());
}

#[test]
fn test_backspace_removes_a_selection() {
    let (_manager, framework) = editor(vec![], settings(), "hello");
    let event = KeyEvent::new("a").with_mod(Platform::Other);
    assert!(framework.press_key(&event).unwrap());
    let selection = framework.get_state().unwrap().selection();
    assert_eq!((selection.from(), selection.to()), (0, 5));

    assert!(framework.press_key(&KeyEvent::new("Backspace")).unwrap());
    assert_eq!(text(&framework), "");
}

#[test]
fn test_escape_selects_parent_only_when_enabled() {
    let (manager, _framework) = editor(vec![], settings(), "hello");
    assert!(!manager.handle_key_name("Escape").unwrap());

    let builtin = BuiltinOptions {
        select_parent_node_on_escape: true,
        ..BuiltinOptions::default()
    };
    let (manager, framework) = editor(vec![], settings().with_builtin(builtin), "hello");
    assert!(manager.handle_key_name("Escape").unwrap());
    let selection = framework.get_state().unwrap().selection();
    assert_eq!((selection.from(), selection.to()), (0, 5));

    // Already selected
    assert!(!manager.handle_key_name("Escape").unwrap());
}

#[test]
fn test_base_keymap_can_be_excluded_at_runtime() {
    let (manager, framework) = editor(vec![], settings(), "a");
    assert_eq!(manager.keymap().handler_count("Enter"), 1);

    let changes = manager
        .set_extension_options("keymap", json!({ "excludeBaseKeymap": true }))
        .unwrap();
    assert!(changes.changed("excludeBaseKeymap"));
    assert_eq!(manager.keymap().handler_count("Enter"), 0);
    assert!(!framework.press_key(&KeyEvent::new("Enter")).unwrap());
    assert_eq!(text(&framework), "a");
}

#[test]
fn test_exclude_keymap_setting_leaves_the_keymap_empty() {
    let log = Log::default();
    let exclude = ExcludeOptions {
        keymap: true,
        ..ExcludeOptions::default()
    };
    let (manager, _framework) = editor(
        vec![KeyExtension::boxed("a", 10, true, &log)],
        settings().with_exclude(exclude),
        "",
    );

    assert!(manager.keymap().is_empty());
    assert!(!manager.handle_key_name("Mod-k").unwrap());
    assert!(log.borrow().is_empty());
}

// ===== Named shortcuts =====

#[test]
fn test_named_shortcut_binds_through_the_preset() {
    let log = Log::default();
    let (manager, _framework) = editor(
        vec![Box::new(BoldShortcutExtension { log: log.clone() })],
        settings(),
        "",
    );

    assert!(manager.handle_key_name("Mod-b").unwrap());
    assert_eq!(*log.borrow(), vec![1]);
}

#[test]
fn test_shortcut_preset_change_moves_the_binding() {
    let log = Log::default();
    let (manager, _framework) = editor(
        vec![Box::new(BoldShortcutExtension { log: log.clone() })],
        settings(),
        "",
    );

    manager
        .set_extension_options("keymap", json!({ "shortcuts": { "bold": "Mod-Shift-b" } }))
        .unwrap();

    assert!(!manager.handle_key_name("Mod-b").unwrap());
    assert!(manager.handle_key_name("Mod-Shift-b").unwrap());
    let key = normalize_key_name("Mod-Shift-b", Platform::Other).unwrap();
    assert_eq!(manager.keymap().handler_count(&key), 1);
}

#[test]
fn test_get_named_shortcut_helper() {
    let (manager, _framework) = editor(vec![], settings(), "");
    let helpers = manager.helpers();
    assert_eq!(
        helpers
            .call("getNamedShortcut", command_args!["bold"])
            .unwrap(),
        json!("Mod-b")
    );

    let builtin = BuiltinOptions {
        shortcuts: ShortcutPreset::GoogleDoc,
        ..BuiltinOptions::default()
    };
    let (manager, _framework) = editor(vec![], settings().with_builtin(builtin), "");
    assert_eq!(
        manager
            .helpers()
            .call("getNamedShortcut", command_args!["strike"])
            .unwrap(),
        json!("Mod-Shift-S")
    );
}

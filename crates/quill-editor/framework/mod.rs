//! Framework adapter between a view layer and the manager
//!
//! A framework owns the one dispatch path of an editor: every transaction
//! the view dispatches goes through [`Framework::dispatch_transaction`],
//! which applies it, updates the view and the manager, reports the change and
//! pushes forced view property updates.
//!
//! [`Framework::headless`] pairs the adapter with a [`HeadlessView`], which is
//! what hosts without a UI and the tests use.

mod headless;

pub use headless::HeadlessView;

use crate::command_args;
use crate::commands::{get_forced_updates, ChainedCommands, CommandRegistry, UpdatableViewProp};
use crate::core::{EditorError, Result};
use crate::events::{EventEmitter, EventKind, Unsubscribe};
use crate::helpers::HelperRegistry;
use crate::keymap::KeyEvent;
use crate::manager::{CreateStateOptions, Manager, StateUpdate};
use quill_model::{
    ApplyResult, Content, EditorState, InvalidContentHandler, PrimitiveSelection, Transaction,
};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, trace};

/// Called with `true` when a view gains focus and `false` when it loses it
pub type FocusHandler = Rc<dyn Fn(bool)>;

/// Dispatch installed on a view by its framework
pub type ViewDispatch = Rc<dyn Fn(Transaction) -> Result<()>>;

/// Rendering surface of an editor
///
/// Methods take `&self`; views keep their state behind interior mutability
/// because dispatch re-enters the view while the manager holds it.
pub trait EditorView {
    fn state(&self) -> EditorState;

    fn update_state(&self, state: EditorState);

    fn dispatch(&self, tr: Transaction) -> Result<()>;

    fn props(&self) -> ViewProps;

    fn set_props(&self, props: ViewProps);

    fn focus(&self);

    fn blur(&self);

    fn has_focus(&self) -> bool;

    /// Receive focus changes; views without focus tracking ignore this
    fn set_focus_handler(&self, _handler: Option<FocusHandler>) {}

    fn destroy(&self);
}

/// Properties a framework sets on its view
#[derive(Clone)]
pub struct ViewProps {
    pub editable: bool,
    pub attributes: BTreeMap<String, String>,
    pub dispatch: Option<ViewDispatch>,
}

impl ViewProps {
    pub fn with_editable(mut self, editable: bool) -> Self {
        self.editable = editable;
        self
    }

    pub fn with_attributes(mut self, attributes: BTreeMap<String, String>) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn with_dispatch<F>(mut self, dispatch: F) -> Self
    where
        F: Fn(Transaction) -> Result<()> + 'static,
    {
        self.dispatch = Some(Rc::new(dispatch));
        self
    }
}

impl Default for ViewProps {
    fn default() -> Self {
        Self {
            editable: true,
            attributes: BTreeMap::new(),
            dispatch: None,
        }
    }
}

impl fmt::Debug for ViewProps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewProps")
            .field("editable", &self.editable)
            .field("attributes", &self.attributes)
            .field("dispatch", &self.dispatch.is_some())
            .finish()
    }
}

/// What a manager needs to know about the framework attached to it
pub trait BaseFramework {
    /// Unique per framework instance
    fn uid(&self) -> usize;

    fn name(&self) -> &str;

    /// State created from the framework's initial content
    fn initial_editor_state(&self) -> EditorState;

    fn output(&self) -> Option<FrameworkOutput> {
        None
    }

    fn destroy(&self);
}

static NEXT_UID: AtomicUsize = AtomicUsize::new(0);

fn next_uid() -> usize {
    NEXT_UID.fetch_add(1, Ordering::Relaxed)
}

/// Reported to `on_change` and `Updated` handlers
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub state: EditorState,
    pub previous_state: EditorState,
    /// The dispatched transaction; `None` when content was replaced
    pub tr: Option<Transaction>,
    /// Whether this is the first change reported by the framework
    pub first_render: bool,
    /// Whether the change came from `set_content` rather than a dispatch
    pub internal_update: bool,
}

impl ChangeEvent {
    pub fn text(&self) -> String {
        self.state.doc().text()
    }

    pub fn json(&self) -> Value {
        self.state.doc().to_json()
    }
}

/// Events published by a framework
#[derive(Debug, Clone)]
pub enum FrameworkEvent {
    Updated(ChangeEvent),
    Focus,
    Blur,
    Destroy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameworkEventKind {
    Updated,
    Focus,
    Blur,
    Destroy,
}

impl EventKind for FrameworkEvent {
    type Kind = FrameworkEventKind;

    fn kind(&self) -> FrameworkEventKind {
        match self {
            Self::Updated(_) => FrameworkEventKind::Updated,
            Self::Focus => FrameworkEventKind::Focus,
            Self::Blur => FrameworkEventKind::Blur,
            Self::Destroy => FrameworkEventKind::Destroy,
        }
    }
}

type ChangeHandler = Rc<dyn Fn(&ChangeEvent)>;
type DispatchHook = Rc<dyn Fn(Transaction, &EditorState) -> Transaction>;

/// Host configuration of a framework
#[derive(Clone)]
pub struct FrameworkProps {
    pub initial_content: Content,
    pub initial_selection: Option<PrimitiveSelection>,
    pub editable: bool,
    /// Extra view attributes; `class` is appended to the default class
    pub attributes: BTreeMap<String, String>,
    /// Accessible label of the editor
    pub label: Option<String>,
    pub on_change: Option<ChangeHandler>,
    /// Rewrites every transaction before it is applied
    pub on_dispatch_transaction: Option<DispatchHook>,
    pub on_error: Option<InvalidContentHandler>,
    /// String handler used for text content
    pub string_handler: Option<String>,
}

impl FrameworkProps {
    pub fn with_content(mut self, content: impl Into<Content>) -> Self {
        self.initial_content = content.into();
        self
    }

    pub fn with_selection(mut self, selection: impl Into<PrimitiveSelection>) -> Self {
        self.initial_selection = Some(selection.into());
        self
    }

    pub fn with_editable(mut self, editable: bool) -> Self {
        self.editable = editable;
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn on_change<F>(mut self, handler: F) -> Self
    where
        F: Fn(&ChangeEvent) + 'static,
    {
        self.on_change = Some(Rc::new(handler));
        self
    }

    pub fn on_dispatch_transaction<F>(mut self, hook: F) -> Self
    where
        F: Fn(Transaction, &EditorState) -> Transaction + 'static,
    {
        self.on_dispatch_transaction = Some(Rc::new(hook));
        self
    }

    pub fn with_on_error(mut self, handler: InvalidContentHandler) -> Self {
        self.on_error = Some(handler);
        self
    }

    pub fn with_string_handler(mut self, name: impl Into<String>) -> Self {
        self.string_handler = Some(name.into());
        self
    }

    fn state_options(
        &self,
        content: Content,
        selection: Option<PrimitiveSelection>,
    ) -> CreateStateOptions {
        CreateStateOptions {
            content,
            selection,
            string_handler: self.string_handler.clone(),
            on_error: self.on_error.clone(),
        }
    }
}

impl Default for FrameworkProps {
    fn default() -> Self {
        Self {
            initial_content: Content::default(),
            initial_selection: None,
            editable: true,
            attributes: BTreeMap::new(),
            label: None,
            on_change: None,
            on_dispatch_transaction: None,
            on_error: None,
            string_handler: None,
        }
    }
}

impl fmt::Debug for FrameworkProps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameworkProps")
            .field("initial_content", &self.initial_content)
            .field("initial_selection", &self.initial_selection)
            .field("editable", &self.editable)
            .field("attributes", &self.attributes)
            .field("label", &self.label)
            .field("on_change", &self.on_change.is_some())
            .field("on_dispatch_transaction", &self.on_dispatch_transaction.is_some())
            .field("string_handler", &self.string_handler)
            .finish_non_exhaustive()
    }
}

struct FrameworkInner {
    uid: usize,
    this: Weak<FrameworkInner>,
    manager: Manager,
    props: RefCell<FrameworkProps>,
    initial_state: EditorState,
    previous_state: RefCell<Option<EditorState>>,
    events: EventEmitter<FrameworkEvent>,
    destroyed: Cell<bool>,
    first_render: Cell<bool>,
    /// Set while `set_content` runs; `Some(false)` suppresses `on_change`
    content_update: Cell<Option<bool>>,
}

impl FrameworkInner {
    fn ensure_alive(&self) -> Result<()> {
        if self.destroyed.get() || self.manager.destroyed() {
            return Err(EditorError::manager_phase("the editor has been destroyed"));
        }
        Ok(())
    }

    fn view(&self) -> Result<Rc<dyn EditorView>> {
        self.manager
            .view()
            .ok_or_else(|| EditorError::manager_phase("the framework has no view"))
    }

    fn dispatch_transaction(&self, tr: Transaction) -> Result<()> {
        self.ensure_alive()?;
        let view = self.view()?;
        let previous = view.state();

        let hook = self.props.borrow().on_dispatch_transaction.clone();
        let tr = match hook {
            Some(hook) => hook(tr, &previous),
            None => tr,
        };
        let forced = get_forced_updates(&tr);
        trace!(steps = tr.steps().len(), forced = forced.len(), "framework dispatch");

        let ApplyResult {
            state,
            transactions,
        } = previous.apply_transaction(tr.clone())?;
        *self.previous_state.borrow_mut() = Some(previous.clone());
        view.update_state(state.clone());
        self.manager.on_state_update(
            StateUpdate::new(state, previous).with_transaction(tr, transactions),
        )?;

        if !forced.is_empty() {
            self.update_view_props(&forced)?;
        }
        Ok(())
    }

    /// Called for every manager state update while attached
    fn on_manager_update(&self, update: &StateUpdate) {
        if self.destroyed.get() {
            return;
        }
        let content_update = self.content_update.get();
        let event = ChangeEvent {
            state: update.state.clone(),
            previous_state: update.previous_state.clone(),
            tr: update.tr.clone(),
            first_render: self.first_render.replace(false),
            internal_update: content_update.is_some(),
        };

        if content_update != Some(false) {
            let on_change = self.props.borrow().on_change.clone();
            if let Some(on_change) = on_change {
                on_change(&event);
            }
        }
        self.events.emit(&FrameworkEvent::Updated(event));
    }

    fn attributes(&self) -> BTreeMap<String, String> {
        let props = self.props.borrow();
        let mut attributes = BTreeMap::new();
        attributes.insert("role".to_string(), "textbox".to_string());
        attributes.insert("aria-multiline".to_string(), "true".to_string());
        attributes.insert("aria-readonly".to_string(), (!props.editable).to_string());
        if let Some(label) = &props.label {
            attributes.insert("aria-label".to_string(), label.clone());
        }
        attributes.insert("class".to_string(), "quill-editor".to_string());

        let from_store = self
            .manager
            .store()
            .get_store_key::<BTreeMap<String, String>>("attributes")
            .unwrap_or_default();
        for (key, value) in from_store.iter().chain(props.attributes.iter()) {
            match (key.as_str(), attributes.get_mut(key)) {
                ("class", Some(class)) => {
                    class.push(' ');
                    class.push_str(value);
                }
                _ => {
                    attributes.insert(key.clone(), value.clone());
                }
            }
        }
        attributes
    }

    fn update_view_props(&self, forced: &[UpdatableViewProp]) -> Result<()> {
        let view = self.view()?;
        let mut props = view.props();
        for prop in forced {
            match prop {
                UpdatableViewProp::Attributes => props.attributes = self.attributes(),
                UpdatableViewProp::Editable => props.editable = self.props.borrow().editable,
            }
        }
        debug!(?forced, "view props updated");
        view.set_props(props);
        Ok(())
    }

    fn view_dispatch(&self) -> ViewDispatch {
        let weak = self.this.clone();
        Rc::new(move |tr| match weak.upgrade() {
            Some(inner) => inner.dispatch_transaction(tr),
            None => Err(EditorError::manager_phase("the framework has been dropped")),
        })
    }

    fn focus_handler(&self) -> FocusHandler {
        let weak = self.this.clone();
        Rc::new(move |focused| {
            if let Some(inner) = weak.upgrade() {
                let event = if focused {
                    FrameworkEvent::Focus
                } else {
                    FrameworkEvent::Blur
                };
                inner.events.emit(&event);
            }
        })
    }

    fn set_content(&self, content: Content, trigger_change: bool) -> Result<()> {
        self.ensure_alive()?;
        let view = self.view()?;
        let state = {
            let props = self.props.borrow();
            self.manager.create_state(props.state_options(content, None))?
        };
        let previous = view.state();
        *self.previous_state.borrow_mut() = Some(previous.clone());
        view.update_state(state.clone());

        self.content_update.set(Some(trigger_change));
        let result = self.manager.on_state_update(StateUpdate::new(state, previous));
        self.content_update.set(None);
        result
    }
}

impl BaseFramework for FrameworkInner {
    fn uid(&self) -> usize {
        self.uid
    }

    fn name(&self) -> &str {
        "headless"
    }

    fn initial_editor_state(&self) -> EditorState {
        self.initial_state.clone()
    }

    fn output(&self) -> Option<FrameworkOutput> {
        self.this
            .upgrade()
            .map(|inner| FrameworkOutput::new(Framework(inner)))
    }

    fn destroy(&self) {
        if self.destroyed.replace(true) {
            return;
        }
        debug!(framework = self.uid, "destroying framework");
        self.events.emit(&FrameworkEvent::Destroy);
        self.events.clear();
    }
}

/// Framework adapter driving a manager through a single dispatch path
///
/// Keep the `Framework` alive for as long as the editor is used; the view
/// only holds a weak reference to it.
#[derive(Clone)]
pub struct Framework(Rc<FrameworkInner>);

impl Framework {
    /// Attach a framework to `manager` and add a [`HeadlessView`]
    ///
    /// When the manager already has a view, the view is reused and its
    /// dispatch is pointed at this framework.
    pub fn headless(manager: Manager, props: FrameworkProps) -> Result<Self> {
        Self::new(manager, props)
    }

    pub fn new(manager: Manager, props: FrameworkProps) -> Result<Self> {
        if manager.destroyed() {
            return Err(EditorError::manager_phase(
                "cannot attach a framework to a destroyed manager",
            ));
        }
        let initial_state = manager.create_state(
            props.state_options(props.initial_content.clone(), props.initial_selection),
        )?;

        let inner = Rc::new_cyclic(|this: &Weak<FrameworkInner>| FrameworkInner {
            uid: next_uid(),
            this: this.clone(),
            manager: manager.clone(),
            props: RefCell::new(props),
            initial_state: initial_state.clone(),
            previous_state: RefCell::new(None),
            events: EventEmitter::new(),
            destroyed: Cell::new(false),
            first_render: Cell::new(true),
            content_update: Cell::new(None),
        });

        let handle: Rc<dyn BaseFramework> = inner.clone();
        let weak = Rc::downgrade(&inner);
        manager.attach_framework(&handle, move |update| {
            if let Some(inner) = weak.upgrade() {
                inner.on_manager_update(update);
            }
        });

        let view_props = ViewProps {
            editable: inner.props.borrow().editable,
            attributes: inner.attributes(),
            dispatch: Some(inner.view_dispatch()),
        };
        match manager.view() {
            Some(view) => {
                view.set_props(view_props);
                view.set_focus_handler(Some(inner.focus_handler()));
            }
            None => {
                let view = HeadlessView::with_props(initial_state, view_props);
                view.set_focus_handler(Some(inner.focus_handler()));
                manager.add_view(Rc::new(view))?;
            }
        }

        debug!(framework = inner.uid, "framework attached");
        Ok(Self(inner))
    }

    pub fn uid(&self) -> usize {
        self.0.uid
    }

    pub fn manager(&self) -> &Manager {
        &self.0.manager
    }

    /// Apply a transaction and propagate the new state
    pub fn dispatch_transaction(&self, tr: Transaction) -> Result<()> {
        self.0.dispatch_transaction(tr)
    }

    pub fn get_state(&self) -> Result<EditorState> {
        self.0.manager.get_state()
    }

    /// State before the last dispatch or content change
    pub fn get_previous_state(&self) -> Option<EditorState> {
        self.0.previous_state.borrow().clone()
    }

    pub fn initial_state(&self) -> &EditorState {
        &self.0.initial_state
    }

    /// Replace the whole document
    ///
    /// `on_change` only runs when `trigger_change` is set.
    pub fn set_content(&self, content: impl Into<Content>, trigger_change: bool) -> Result<()> {
        self.0.set_content(content.into(), trigger_change)
    }

    pub fn clear_content(&self, trigger_change: bool) -> Result<()> {
        self.set_content(Content::empty(), trigger_change)
    }

    /// Type text at the selection, giving input rules the first chance
    pub fn type_text(&self, text: &str) -> Result<bool> {
        self.0.ensure_alive()?;
        let selection = self.get_state()?.selection();
        if self
            .0
            .manager
            .handle_text_input(selection.from(), selection.to(), text)?
        {
            return Ok(true);
        }
        self.commands()?.call("insertText", command_args![text])
    }

    /// Route a key press through the merged keymap
    pub fn press_key(&self, event: &KeyEvent) -> Result<bool> {
        self.0.ensure_alive()?;
        self.0.manager.handle_key(event)
    }

    pub fn commands(&self) -> Result<Rc<CommandRegistry>> {
        self.0.manager.commands()
    }

    pub fn chain(&self) -> Result<Rc<ChainedCommands>> {
        self.0.manager.chain()
    }

    pub fn helpers(&self) -> Rc<HelperRegistry> {
        self.0.manager.helpers()
    }

    pub fn focus(&self) -> Result<()> {
        self.0.view()?.focus();
        Ok(())
    }

    pub fn blur(&self) -> Result<()> {
        self.0.view()?.blur();
        Ok(())
    }

    pub fn add_handler<F>(&self, kind: FrameworkEventKind, handler: F) -> Unsubscribe
    where
        F: Fn(&FrameworkEvent) + 'static,
    {
        self.0.events.on(kind, handler)
    }

    /// Update the host props and push them to the view
    pub fn set_props(&self, update: impl FnOnce(&mut FrameworkProps)) -> Result<()> {
        update(&mut *self.0.props.borrow_mut());
        self.0
            .update_view_props(&[UpdatableViewProp::Attributes, UpdatableViewProp::Editable])
    }

    pub fn output(&self) -> FrameworkOutput {
        FrameworkOutput::new(self.clone())
    }

    pub fn destroyed(&self) -> bool {
        self.0.destroyed.get()
    }

    /// Detach from the manager
    ///
    /// The manager itself stays alive; destroying the manager destroys its
    /// framework too.
    pub fn destroy(&self) {
        self.0.destroy();
    }
}

impl fmt::Debug for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Framework")
            .field("uid", &self.0.uid)
            .field("destroyed", &self.0.destroyed.get())
            .field("props", &self.0.props.borrow())
            .finish()
    }
}

/// The editor surface handed to host code
#[derive(Clone, Debug)]
pub struct FrameworkOutput {
    framework: Framework,
}

impl FrameworkOutput {
    fn new(framework: Framework) -> Self {
        Self { framework }
    }

    pub fn uid(&self) -> usize {
        self.framework.uid()
    }

    pub fn manager(&self) -> &Manager {
        self.framework.manager()
    }

    pub fn commands(&self) -> Result<Rc<CommandRegistry>> {
        self.framework.commands()
    }

    pub fn chain(&self) -> Result<Rc<ChainedCommands>> {
        self.framework.chain()
    }

    pub fn helpers(&self) -> Rc<HelperRegistry> {
        self.framework.helpers()
    }

    pub fn get_state(&self) -> Result<EditorState> {
        self.framework.get_state()
    }

    pub fn get_previous_state(&self) -> Option<EditorState> {
        self.framework.get_previous_state()
    }

    pub fn set_content(&self, content: impl Into<Content>, trigger_change: bool) -> Result<()> {
        self.framework.set_content(content, trigger_change)
    }

    pub fn clear_content(&self, trigger_change: bool) -> Result<()> {
        self.framework.clear_content(trigger_change)
    }

    /// Focus the editor, optionally moving the selection
    pub fn focus(&self, position: Option<PrimitiveSelection>) -> Result<bool> {
        let args = match position {
            Some(position) => command_args![serde_json::to_value(position)?],
            None => command_args![],
        };
        self.framework.commands()?.call("focus", args)
    }

    pub fn blur(&self) -> Result<bool> {
        self.framework.commands()?.call("blur", command_args![])
    }

    pub fn add_handler<F>(&self, kind: FrameworkEventKind, handler: F) -> Unsubscribe
    where
        F: Fn(&FrameworkEvent) + 'static,
    {
        self.framework.add_handler(kind, handler)
    }
}

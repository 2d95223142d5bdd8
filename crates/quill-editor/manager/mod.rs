//! Lifecycle orchestration
//!
//! A [`Manager`] owns the flattened, priority ordered extensions and moves
//! them through the phases `None → Create → EditorView → Runtime → Destroy`:
//!
//! - **Create**: names are validated, the schema is built, `on_create` runs
//!   and the keymap is merged
//! - **EditorView**: a view was added; commands become callable and
//!   `on_view` runs
//! - **Runtime**: entered on the first state update after the view
//! - **Destroy**: terminal; disposers and `on_destroy` run once
//!
//! Every extension receives an [`ExtensionStore`], a weak handle back to the
//! manager.

mod store;

pub use store::{ExtensionStore, StoreReader};

use crate::commands::registry::collect_commands;
use crate::commands::placeholders::PlaceholderSet;
use crate::commands::shared::TransactionCache;
use crate::commands::{ChainedCommands, CommandRegistry, CommandTable, SharedTransaction};
use crate::core::{EditorError, ManagerPhase, ManagerSettings, Priority, Result};
use crate::events::{EventEmitter, ManagerEvent, ManagerEventKind, Unsubscribe};
use crate::extensions::builtin::{builtin_preset, KeymapExtension};
use crate::extensions::flatten::{flatten, Candidate};
use crate::extensions::{
    Disposer, Extension, ExtensionCapability, ExtensionKey, OptionChanges, SchemaContribution,
};
use crate::framework::{BaseFramework, EditorView, FrameworkOutput};
use crate::helpers::{collect_helpers, HelperRegistry};
use crate::input_rules::InputRule;
use crate::keymap::{
    extension_bindings, normalize_key_name, run_chain, KeyEvent, MergedKeymap,
    PrioritizedKeyBindings, ShortcutMap,
};
use ahash::{AHashMap, AHashSet};
use quill_model::{
    create_document_node, Content, CreateDocumentOptions, Doc, EditorState,
    InvalidContentHandler, PrimitiveSelection, Schema, StateConfig, StringHandler, Transaction,
};
use serde_json::Value;
use std::any::{type_name, Any, TypeId};
use std::cell::{Cell, Ref, RefCell, RefMut};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Named state getter registered by an extension, e.g. `text`
pub type ManagerGetter = Rc<dyn Fn(&EditorState) -> Value>;

/// A state change delivered to `on_state_update` hooks and handlers
#[derive(Debug, Clone)]
pub struct StateUpdate {
    pub state: EditorState,
    pub previous_state: EditorState,
    /// The transaction that produced the state; `None` for direct updates
    pub tr: Option<Transaction>,
    pub transactions: Vec<Transaction>,
    /// Whether this is the first update after the view was added
    pub first_update: bool,
}

impl StateUpdate {
    pub fn new(state: EditorState, previous_state: EditorState) -> Self {
        Self {
            state,
            previous_state,
            tr: None,
            transactions: Vec::new(),
            first_update: false,
        }
    }

    pub fn with_transaction(mut self, tr: Transaction, transactions: Vec<Transaction>) -> Self {
        self.tr = Some(tr);
        self.transactions = transactions;
        self
    }
}

/// Inputs for [`Manager::create_state`]
#[derive(Debug, Clone, Default)]
pub struct CreateStateOptions {
    pub content: Content,
    pub selection: Option<PrimitiveSelection>,
    /// String handler name; falls back to the manager setting, then `text`
    pub string_handler: Option<String>,
    /// Falls back to the manager setting
    pub on_error: Option<InvalidContentHandler>,
}

impl CreateStateOptions {
    pub fn new(content: impl Into<Content>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn with_selection(mut self, selection: impl Into<PrimitiveSelection>) -> Self {
        self.selection = Some(selection.into());
        self
    }

    pub fn with_string_handler(mut self, name: impl Into<String>) -> Self {
        self.string_handler = Some(name.into());
        self
    }

    pub fn with_on_error(mut self, handler: InvalidContentHandler) -> Self {
        self.on_error = Some(handler);
        self
    }
}

pub const DEFAULT_STRING_HANDLER: &str = "text";

struct ExtensionEntry {
    name: String,
    priority: Priority,
    type_id: TypeId,
    capabilities: ExtensionCapability,
    extension: RefCell<Box<dyn Extension>>,
}

impl ExtensionEntry {
    fn lock(&self) -> Result<Ref<'_, Box<dyn Extension>>> {
        self.extension.try_borrow().map_err(|_| self.busy())
    }

    fn lock_mut(&self) -> Result<RefMut<'_, Box<dyn Extension>>> {
        self.extension.try_borrow_mut().map_err(|_| self.busy())
    }

    fn busy(&self) -> EditorError {
        EditorError::invariant(format!(
            "extension '{}' is in use by one of its own hooks",
            self.name
        ))
    }
}

pub(crate) struct ManagerInner {
    settings: ManagerSettings,
    entries: Vec<ExtensionEntry>,
    by_name: AHashMap<String, usize>,
    by_type: AHashMap<TypeId, usize>,
    schema: Arc<Schema>,
    command_table: CommandTable,
    input_rules: Vec<InputRule>,
    node_names: Vec<String>,
    mark_names: Vec<String>,
    plain_names: Vec<String>,
    store: ExtensionStore,
    helpers: Rc<HelperRegistry>,
    events: EventEmitter<ManagerEvent>,
    phase: Cell<ManagerPhase>,
    first_update: Cell<bool>,
    view: RefCell<Option<Rc<dyn EditorView>>>,
    current_state: RefCell<Option<EditorState>>,
    previous_state: RefCell<Option<EditorState>>,
    framework: RefCell<Option<Weak<dyn BaseFramework>>>,
    dispose_framework: RefCell<Option<Unsubscribe>>,
    disposers: RefCell<Vec<Disposer>>,
    transactions: RefCell<TransactionCache>,
    /// State updates that arrived while an extension was borrowed by a hook
    pending_updates: RefCell<Vec<(usize, StateUpdate)>>,
    placeholders: RefCell<PlaceholderSet>,
    commands: RefCell<Option<Rc<CommandRegistry>>>,
    keymap: RefCell<Rc<MergedKeymap>>,
    keymap_dirty: Cell<bool>,
    extra_keymaps: RefCell<Vec<(usize, PrioritizedKeyBindings)>>,
    next_keymap_id: Cell<usize>,
    manager_store: RefCell<AHashMap<String, Rc<dyn Any>>>,
    extension_store: RefCell<AHashMap<String, Rc<dyn Any>>>,
    string_handlers: RefCell<AHashMap<String, StringHandler>>,
    getters: RefCell<AHashMap<String, ManagerGetter>>,
}

impl ManagerInner {
    fn ensure_alive(&self) -> Result<()> {
        if self.phase.get() == ManagerPhase::Destroy {
            return Err(EditorError::manager_phase("the manager has been destroyed"));
        }
        Ok(())
    }

    fn view(&self) -> Result<Rc<dyn EditorView>> {
        self.view
            .borrow()
            .clone()
            .ok_or_else(|| EditorError::manager_phase("no view has been added to the manager"))
    }

    fn framework(&self) -> Option<Rc<dyn BaseFramework>> {
        self.framework.borrow().as_ref().and_then(Weak::upgrade)
    }

    /// The view state once a view exists, else the framework's initial state
    fn get_state(&self) -> Result<EditorState> {
        if self.phase.get() >= ManagerPhase::EditorView {
            if let Some(view) = self.view.borrow().clone() {
                return Ok(view.state());
            }
        }
        self.framework()
            .map(|framework| framework.initial_editor_state())
            .ok_or_else(|| {
                EditorError::manager_phase(
                    "`get_state` can only be called once a framework or a view was added",
                )
            })
    }

    fn transaction(&self) -> Result<SharedTransaction> {
        let state = self.get_state()?;
        self.transactions.borrow_mut().get(&state)
    }

    fn commands(&self) -> Result<Rc<CommandRegistry>> {
        self.ensure_alive()?;
        self.commands.borrow().clone().ok_or_else(|| {
            EditorError::manager_phase("commands are only available once a view was added")
        })
    }

    fn entry_index(&self, name: &str) -> Result<usize> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| EditorError::InvalidManagerExtension {
                name: name.to_string(),
            })
    }

    fn entry(&self, name: &str) -> Result<&ExtensionEntry> {
        Ok(&self.entries[self.entry_index(name)?])
    }

    fn typed_index<T: Extension>(&self) -> Result<usize> {
        self.by_type
            .get(&TypeId::of::<T>())
            .copied()
            .ok_or_else(|| EditorError::InvalidManagerExtension {
                name: type_name::<T>().to_string(),
            })
    }

    fn with_extension<T: Extension, R>(&self, f: impl FnOnce(&T) -> R) -> Result<R> {
        let entry = &self.entries[self.typed_index::<T>()?];
        let extension = entry.lock()?;
        let typed = (**extension)
            .as_any()
            .downcast_ref::<T>()
            .ok_or_else(|| EditorError::InvalidManagerExtension {
                name: type_name::<T>().to_string(),
            })?;
        Ok(f(typed))
    }

    fn with_extension_mut<T: Extension, R>(&self, f: impl FnOnce(&mut T) -> R) -> Result<R> {
        self.run_hook(self.typed_index::<T>()?, |extension| {
            let typed = extension.as_any_mut().downcast_mut::<T>().ok_or_else(|| {
                EditorError::InvalidManagerExtension {
                    name: type_name::<T>().to_string(),
                }
            })?;
            Ok(f(typed))
        })
    }

    /// Run `hook` with mutable access to extension `index`
    ///
    /// State updates dispatched while the extension is borrowed are queued
    /// and delivered once `hook` returns.
    fn run_hook<R>(
        &self,
        index: usize,
        hook: impl FnOnce(&mut dyn Extension) -> Result<R>,
    ) -> Result<R> {
        let result = {
            let mut extension = self.entries[index].lock_mut()?;
            hook(&mut **extension)
        };
        if result.is_ok() {
            self.deliver_pending(index)?;
        }
        result
    }

    /// Deliver the state updates queued for extension `index`, oldest first
    fn deliver_pending(&self, index: usize) -> Result<()> {
        loop {
            let next = {
                let mut pending = self.pending_updates.borrow_mut();
                pending
                    .iter()
                    .position(|(queued, _)| *queued == index)
                    .map(|at| pending.remove(at).1)
            };
            let Some(update) = next else {
                return Ok(());
            };

            let entry = &self.entries[index];
            let Ok(mut extension) = entry.extension.try_borrow_mut() else {
                // Still borrowed further up; that hook delivers it on return
                self.pending_updates.borrow_mut().insert(0, (index, update));
                return Ok(());
            };
            trace!(extension = %entry.name, "delivering queued state update");
            extension.on_state_update(&update, &self.store)?;
        }
    }

    fn shortcut_map(&self) -> ShortcutMap {
        let platform = self.settings.platform;
        self.with_extension(|keymap: &KeymapExtension| keymap.shortcut_map(platform))
            .unwrap_or_else(|_| ShortcutMap::preset(self.settings.builtin.shortcuts, platform))
    }

    /// Discard and regenerate the merged keymap
    ///
    /// When an extension is borrowed by one of its hooks the rebuild is
    /// deferred until the hook returns.
    fn rebuild_keymap(&self) -> Result<()> {
        if self.settings.exclude.keymap {
            *self.keymap.borrow_mut() = Rc::default();
            self.keymap_dirty.set(false);
            return Ok(());
        }

        let shortcuts = self.shortcut_map();
        let mut statics = Vec::new();
        for entry in &self.entries {
            let Ok(extension) = entry.extension.try_borrow() else {
                debug!(extension = %entry.name, "keymap rebuild deferred");
                self.keymap_dirty.set(true);
                return Ok(());
            };
            statics.extend(extension_bindings(&**extension, &shortcuts));
        }

        let extra = self
            .extra_keymaps
            .borrow()
            .iter()
            .map(|(_, bindings)| bindings.clone())
            .collect();
        let merged = MergedKeymap::merge(extra, statics, self.settings.platform)?;
        debug!(keys = merged.len(), "keymap rebuilt");
        *self.keymap.borrow_mut() = Rc::new(merged);
        self.keymap_dirty.set(false);
        Ok(())
    }

    fn flush_keymap(&self) -> Result<()> {
        if self.keymap_dirty.get() {
            self.rebuild_keymap()?;
        }
        Ok(())
    }

    fn on_state_update(&self, mut update: StateUpdate) -> Result<()> {
        self.ensure_alive()?;
        update.first_update = self.first_update.replace(false);
        if update.first_update && self.phase.get() == ManagerPhase::EditorView {
            self.phase.set(ManagerPhase::Runtime);
            debug!(phase = %ManagerPhase::Runtime, "manager running");
        }

        *self.current_state.borrow_mut() = Some(update.state.clone());
        *self.previous_state.borrow_mut() = Some(update.previous_state.clone());
        self.transactions.borrow_mut().reset(&update.state);
        if let Some(tr) = &update.tr {
            self.placeholders.borrow_mut().apply(tr);
        }

        for (index, entry) in self.entries.iter().enumerate() {
            let Ok(mut extension) = entry.extension.try_borrow_mut() else {
                debug!(extension = %entry.name, "extension busy, state update queued");
                self.pending_updates
                    .borrow_mut()
                    .push((index, update.clone()));
                continue;
            };
            extension.on_state_update(&update, &self.store)?;
            drop(extension);
            self.deliver_pending(index)?;
        }
        self.flush_keymap()?;

        self.events.emit(&ManagerEvent::StateUpdate(update));
        Ok(())
    }

    fn update_state(&self, state: EditorState) -> Result<()> {
        let previous = self.get_state()?;
        self.view()?.update_state(state.clone());
        self.on_state_update(StateUpdate::new(state, previous))
    }

    fn string_handler(&self, name: &str) -> Option<StringHandler> {
        self.string_handlers.borrow().get(name).cloned()
    }
}

/// Owns the extensions of one editor and drives their lifecycle
///
/// Cloning a `Manager` clones the handle; use [`Manager::clone_manager`] for
/// a new manager with the same extensions.
#[derive(Clone)]
pub struct Manager(Rc<ManagerInner>);

impl Manager {
    /// Create a manager from extensions plus the builtin preset
    ///
    /// Builtin extensions whose names are supplied by the caller are
    /// replaced by the caller's extensions.
    pub fn create(extensions: Vec<Box<dyn Extension>>, settings: ManagerSettings) -> Result<Self> {
        Self::build(extensions.into_iter().map(Candidate::new).collect(), settings)
    }

    fn build(candidates: Vec<Candidate>, settings: ManagerSettings) -> Result<Self> {
        let supplied = flatten(candidates, &settings)?;
        let names: AHashSet<String> = supplied
            .iter()
            .map(|(_, extension)| extension.name().to_string())
            .collect();
        let mut candidates: Vec<Candidate> = supplied
            .into_iter()
            .map(|(_, extension)| Candidate::flat(extension))
            .collect();
        candidates.extend(
            builtin_preset(&settings.builtin)
                .into_iter()
                .filter(|extension| !names.contains(extension.name()))
                .map(Candidate::new),
        );
        let ordered = flatten(candidates, &settings)?;

        let shortcuts = ShortcutMap::preset(settings.builtin.shortcuts, settings.platform);
        let mut schema = Schema::builder();
        let mut contributions = Vec::with_capacity(ordered.len());
        let mut helper_tables = Vec::with_capacity(ordered.len());
        let mut input_rules = Vec::new();
        let mut entries = Vec::with_capacity(ordered.len());
        let (mut node_names, mut mark_names, mut plain_names) = (Vec::new(), Vec::new(), Vec::new());

        for (priority, extension) in ordered {
            let name = extension.name().to_string();
            let mut capabilities = extension.capabilities();

            match extension.schema() {
                Some(contribution) => {
                    capabilities |= contribution.capability();
                    match contribution {
                        SchemaContribution::Node(spec) => {
                            node_names.push(name.clone());
                            schema.add_node(spec);
                        }
                        SchemaContribution::Mark(spec) => {
                            mark_names.push(name.clone());
                            schema.add_mark(spec);
                        }
                    }
                }
                None => plain_names.push(name.clone()),
            }

            let created = extension.create_commands();
            let decorated = extension.decorated_commands();
            if !created.is_empty() || !decorated.is_empty() {
                capabilities |= ExtensionCapability::COMMANDS;
            }
            contributions.push((created, decorated));

            let helpers = extension.create_helpers();
            if !helpers.is_empty() {
                capabilities |= ExtensionCapability::HELPERS;
            }
            helper_tables.push(helpers);

            if !extension.keybindings().is_empty() || extension.create_keymap(&shortcuts).is_some() {
                capabilities |= ExtensionCapability::KEYMAP;
            }

            let rules = extension.input_rules();
            if !rules.is_empty() {
                capabilities |= ExtensionCapability::INPUT_RULES;
                if !settings.exclude.input_rules && !input_rules_excluded(extension.as_ref()) {
                    input_rules.extend(rules);
                }
            }

            let type_id = (*extension).as_any().type_id();
            entries.push(ExtensionEntry {
                name,
                priority,
                type_id,
                capabilities,
                extension: RefCell::new(extension),
            });
        }

        let by_name = entries
            .iter()
            .enumerate()
            .map(|(index, entry)| (entry.name.clone(), index))
            .collect();
        let mut by_type = AHashMap::new();
        for (index, entry) in entries.iter().enumerate() {
            by_type.entry(entry.type_id).or_insert(index);
        }

        let command_table = collect_commands(contributions)?;
        let helper_list = collect_helpers(helper_tables)?;
        let schema = Arc::new(schema.build()?);

        let inner = Rc::new_cyclic(|weak: &Weak<ManagerInner>| {
            let store = ExtensionStore::new(weak.clone());
            let helpers = Rc::new(HelperRegistry::new(helper_list, &store));
            ManagerInner {
                settings,
                entries,
                by_name,
                by_type,
                schema,
                command_table,
                input_rules,
                node_names,
                mark_names,
                plain_names,
                store,
                helpers,
                events: EventEmitter::new(),
                phase: Cell::new(ManagerPhase::None),
                first_update: Cell::new(false),
                view: RefCell::new(None),
                current_state: RefCell::new(None),
                previous_state: RefCell::new(None),
                framework: RefCell::new(None),
                dispose_framework: RefCell::new(None),
                disposers: RefCell::new(Vec::new()),
                transactions: RefCell::new(TransactionCache::default()),
                pending_updates: RefCell::new(Vec::new()),
                placeholders: RefCell::new(PlaceholderSet::default()),
                commands: RefCell::new(None),
                keymap: RefCell::new(Rc::default()),
                keymap_dirty: Cell::new(false),
                extra_keymaps: RefCell::new(Vec::new()),
                next_keymap_id: Cell::new(0),
                manager_store: RefCell::new(AHashMap::new()),
                extension_store: RefCell::new(AHashMap::new()),
                string_handlers: RefCell::new(AHashMap::new()),
                getters: RefCell::new(AHashMap::new()),
            }
        });

        let manager = Self(inner);
        if let Err(err) = manager.run_create_hooks() {
            manager.destroy();
            return Err(err);
        }
        Ok(manager)
    }

    fn run_create_hooks(&self) -> Result<()> {
        let inner = &self.0;
        inner.phase.set(ManagerPhase::Create);
        debug!(
            phase = %ManagerPhase::Create,
            extensions = inner.entries.len(),
            commands = inner.command_table.len(),
            "manager created"
        );

        for index in 0..inner.entries.len() {
            let disposer = inner.run_hook(index, |extension| extension.on_create(&inner.store))?;
            if let Some(disposer) = disposer {
                inner.disposers.borrow_mut().push(disposer);
            }
        }
        inner.rebuild_keymap()
    }

    pub fn phase(&self) -> ManagerPhase {
        self.0.phase.get()
    }

    pub fn destroyed(&self) -> bool {
        self.phase() == ManagerPhase::Destroy
    }

    /// Whether a view is attached and the manager is not destroyed
    pub fn mounted(&self) -> bool {
        let phase = self.phase();
        phase >= ManagerPhase::EditorView && phase < ManagerPhase::Destroy
    }

    pub fn settings(&self) -> &ManagerSettings {
        &self.0.settings
    }

    /// Attach the view; only the first call has an effect
    ///
    /// Builds the command registry and runs every `on_view` hook.
    pub fn add_view(&self, view: Rc<dyn EditorView>) -> Result<&Self> {
        let inner = &self.0;
        inner.ensure_alive()?;
        if inner.phase.get() >= ManagerPhase::EditorView {
            return Ok(self);
        }

        inner.first_update.set(true);
        inner.phase.set(ManagerPhase::EditorView);
        let state = view.state();
        *inner.view.borrow_mut() = Some(view.clone());
        *inner.current_state.borrow_mut() = Some(state.clone());
        inner.transactions.borrow_mut().reset(&state);

        let registry = CommandRegistry::new(inner.command_table.clone(), &inner.store);
        debug!(phase = %ManagerPhase::EditorView, commands = registry.len(), "view added");
        *inner.commands.borrow_mut() = Some(Rc::new(registry));

        for index in 0..inner.entries.len() {
            let disposer =
                inner.run_hook(index, |extension| extension.on_view(&inner.store, &view))?;
            if let Some(disposer) = disposer {
                inner.disposers.borrow_mut().push(disposer);
            }
        }
        inner.flush_keymap()?;
        Ok(self)
    }

    pub fn view(&self) -> Option<Rc<dyn EditorView>> {
        self.0.view.borrow().clone()
    }

    /// Attach a framework, replacing and destroying any other one
    ///
    /// `update_handler` is called on every state update until the framework
    /// is replaced or the manager destroyed.
    pub fn attach_framework<F>(&self, framework: &Rc<dyn BaseFramework>, update_handler: F)
    where
        F: Fn(&StateUpdate) + 'static,
    {
        let inner = &self.0;
        if let Some(existing) = inner.framework() {
            if existing.uid() == framework.uid() {
                return;
            }
        }

        let previous = inner.framework.borrow_mut().take().and_then(|weak| weak.upgrade());
        if let Some(previous) = previous {
            debug!(framework = previous.uid(), "replacing framework");
            previous.destroy();
        }
        let dispose = inner.dispose_framework.borrow_mut().take();
        if let Some(dispose) = dispose {
            dispose();
        }

        *inner.framework.borrow_mut() = Some(Rc::downgrade(framework));
        let unsubscribe = self.add_handler(ManagerEventKind::StateUpdate, move |event| {
            if let ManagerEvent::StateUpdate(update) = event {
                update_handler(update);
            }
        });
        *inner.dispose_framework.borrow_mut() = Some(unsubscribe);
    }

    pub fn framework_attached(&self) -> bool {
        self.0.framework().is_some()
    }

    /// Output of the attached framework
    pub fn output(&self) -> Option<FrameworkOutput> {
        self.0.framework().and_then(|framework| framework.output())
    }

    /// Called by the view layer after every state change
    pub fn on_state_update(&self, update: StateUpdate) -> Result<()> {
        self.0.on_state_update(update)
    }

    /// Push a state to the view and run the state update hooks
    pub fn update_state(&self, state: EditorState) -> Result<()> {
        self.0.update_state(state)
    }

    /// Destroy the manager; later calls do nothing
    ///
    /// The framework is destroyed and detached, disposers returned by
    /// `on_create` and `on_view` run, then `on_destroy` hooks, then the view
    /// is destroyed and a single `Destroy` event is emitted.
    pub fn destroy(&self) {
        let inner = &self.0;
        if inner.phase.get() == ManagerPhase::Destroy {
            return;
        }
        inner.phase.set(ManagerPhase::Destroy);
        debug!(phase = %ManagerPhase::Destroy, "destroying manager");

        let framework = inner.framework.borrow_mut().take().and_then(|weak| weak.upgrade());
        if let Some(framework) = framework {
            framework.destroy();
        }
        let dispose = inner.dispose_framework.borrow_mut().take();
        if let Some(dispose) = dispose {
            dispose();
        }

        inner.pending_updates.borrow_mut().clear();
        let disposers = std::mem::take(&mut *inner.disposers.borrow_mut());
        for dispose in disposers {
            dispose();
        }

        for entry in &inner.entries {
            match entry.extension.try_borrow_mut() {
                Ok(mut extension) => {
                    if let Err(err) = extension.on_destroy(&inner.store) {
                        warn!(extension = %entry.name, error = %err, "on_destroy failed");
                    }
                }
                Err(_) => warn!(extension = %entry.name, "extension busy, on_destroy skipped"),
            }
        }

        if let Some(view) = self.view() {
            view.destroy();
        }
        inner.events.emit(&ManagerEvent::Destroy);
    }

    /// New manager with the same extensions and their current options
    pub fn clone_manager(&self) -> Result<Self> {
        let candidates = self
            .0
            .entries
            .iter()
            .map(|entry| {
                let extension = entry.lock()?;
                Ok(Candidate::flat(
                    extension.clone_with_options(extension.options().clone()),
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        let manager = Self::build(candidates, self.0.settings.clone())?;
        self.0.events.emit(&ManagerEvent::Clone(manager.clone()));
        Ok(manager)
    }

    /// New manager from the initial options of every extension plus `extra`
    pub fn recreate(
        &self,
        extra: Vec<Box<dyn Extension>>,
        settings: ManagerSettings,
    ) -> Result<Self> {
        let mut candidates = self
            .0
            .entries
            .iter()
            .map(|entry| {
                let extension = entry.lock()?;
                Ok(Candidate::flat(
                    extension.clone_with_options(extension.options().initial_options()),
                ))
            })
            .collect::<Result<Vec<_>>>()?;
        candidates.extend(extra.into_iter().map(Candidate::new));

        let manager = Self::build(candidates, settings)?;
        self.0.events.emit(&ManagerEvent::Recreate(manager.clone()));
        Ok(manager)
    }

    /// Borrow the extension of type `T`
    pub fn get_extension<T: Extension, R>(&self, f: impl FnOnce(&T) -> R) -> Result<R> {
        self.0.with_extension(f)
    }

    /// Mutably borrow the extension of type `T`
    pub fn get_extension_mut<T: Extension, R>(&self, f: impl FnOnce(&mut T) -> R) -> Result<R> {
        self.0.with_extension_mut(f)
    }

    /// Whether every key names an extension of this manager
    pub fn includes(&self, keys: &[ExtensionKey]) -> bool {
        keys.iter().all(|key| match key {
            ExtensionKey::Name(name) => self.0.by_name.contains_key(name.as_str()),
            ExtensionKey::Type(type_id) => self.0.by_type.contains_key(type_id),
        })
    }

    /// Extension names, highest priority first
    pub fn extension_names(&self) -> impl Iterator<Item = &str> {
        self.0.entries.iter().map(|entry| entry.name.as_str())
    }

    pub fn extension_priority(&self, name: &str) -> Option<Priority> {
        self.0.entry(name).ok().map(|entry| entry.priority)
    }

    /// Declared and discovered capabilities of an extension
    pub fn capabilities(&self, name: &str) -> Option<ExtensionCapability> {
        self.0.entry(name).ok().map(|entry| entry.capabilities)
    }

    /// Update an extension's options and run its `on_set_options` hook
    ///
    /// The keymap is rebuilt when an extension with key bindings changed.
    pub fn set_extension_options(&self, name: &str, update: Value) -> Result<OptionChanges> {
        let inner = &self.0;
        let index = inner.entry_index(name)?;
        let entry = &inner.entries[index];
        let changes = inner.run_hook(index, |extension| {
            let changes = extension
                .options_mut()
                .ok_or_else(|| EditorError::extension(name, "extension has no options"))?
                .update(name, update)?;
            if !changes.is_empty() {
                extension.on_set_options(&changes, &inner.store)?;
            }
            Ok(changes)
        })?;

        if !changes.is_empty() && entry.capabilities.contains(ExtensionCapability::KEYMAP) {
            inner.keymap_dirty.set(true);
        }
        inner.flush_keymap()?;
        Ok(changes)
    }

    pub fn get_state(&self) -> Result<EditorState> {
        self.0.get_state()
    }

    /// State before the last update
    pub fn previous_state(&self) -> Option<EditorState> {
        self.0.previous_state.borrow().clone()
    }

    /// The shared transaction
    pub fn tr(&self) -> Result<SharedTransaction> {
        self.0.transaction()
    }

    pub fn commands(&self) -> Result<Rc<CommandRegistry>> {
        self.0.commands()
    }

    pub fn chain(&self) -> Result<Rc<ChainedCommands>> {
        Ok(self.0.commands()?.chain())
    }

    pub fn helpers(&self) -> Rc<HelperRegistry> {
        self.0.helpers.clone()
    }

    /// The merged keymap
    pub fn keymap(&self) -> Rc<MergedKeymap> {
        self.0.keymap.borrow().clone()
    }

    /// Add bindings ahead of every extension binding
    ///
    /// The returned disposer removes them again.
    pub fn add_keymap(&self, bindings: PrioritizedKeyBindings) -> Result<Disposer> {
        let inner = &self.0;
        let id = inner.next_keymap_id.get();
        inner.next_keymap_id.set(id + 1);
        inner.extra_keymaps.borrow_mut().push((id, bindings));
        inner.rebuild_keymap()?;

        let weak = Rc::downgrade(&self.0);
        Ok(Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.extra_keymaps.borrow_mut().retain(|(key, _)| *key != id);
                if let Err(err) = inner.rebuild_keymap() {
                    warn!(error = %err, "keymap rebuild failed");
                }
            }
        }))
    }

    /// Run the handlers bound to a key press
    ///
    /// Returns whether a handler claimed the key.
    pub fn handle_key(&self, event: &KeyEvent) -> Result<bool> {
        let keymap = self.keymap();
        let Some(handlers) = keymap.lookup(event) else {
            return Ok(false);
        };
        trace!(key = %event, handlers = handlers.len(), "handling key");
        self.0
            .store
            .with_command_props(|props| run_chain(handlers, &props))
    }

    /// Run the handlers bound to a key name such as `Mod-b`
    pub fn handle_key_name(&self, name: &str) -> Result<bool> {
        let key = normalize_key_name(name, self.0.settings.platform)?;
        let keymap = self.keymap();
        let Some(handlers) = keymap.get(&key) else {
            return Ok(false);
        };
        trace!(key = %key, handlers = handlers.len(), "handling key");
        self.0
            .store
            .with_command_props(|props| run_chain(handlers, &props))
    }

    /// Offer typed text to the input rules, in extension priority order
    ///
    /// The first matching rule dispatches a transaction containing the typed
    /// text and its rewrite. Returns `false` when no rule applied, in which
    /// case the caller inserts the text itself.
    pub fn handle_text_input(&self, from: usize, to: usize, text: &str) -> Result<bool> {
        let inner = &self.0;
        inner.ensure_alive()?;
        if inner.input_rules.is_empty() {
            return Ok(false);
        }

        let view = inner.view()?;
        let state = view.state();
        for rule in &inner.input_rules {
            let mut tr = state.tr();
            if rule.apply(&mut tr, from, to, text)? {
                trace!(pattern = rule.pattern(), "input rule applied");
                view.dispatch(tr)?;
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub fn add_handler<F>(&self, kind: ManagerEventKind, handler: F) -> Unsubscribe
    where
        F: Fn(&ManagerEvent) + 'static,
    {
        self.0.events.on(kind, handler)
    }

    /// Build a state from content using the manager's schema and string handlers
    pub fn create_state(&self, options: CreateStateOptions) -> Result<EditorState> {
        let inner = &self.0;
        let handler = match options
            .string_handler
            .as_deref()
            .or(inner.settings.string_handler.as_deref())
        {
            Some(name) => Some(inner.string_handler(name).ok_or_else(|| {
                EditorError::config(format!("no string handler named '{name}'"))
            })?),
            None => inner.string_handler(DEFAULT_STRING_HANDLER),
        };
        let on_error = options.on_error.or_else(|| inner.settings.on_error.clone());

        let mut document = CreateDocumentOptions::new(&inner.schema);
        if let Some(handler) = &handler {
            document = document.with_string_handler(handler);
        }
        if let Some(on_error) = &on_error {
            document = document.with_on_error(on_error);
        }
        let doc = create_document_node(options.content, document)?;

        let mut config = StateConfig::new(inner.schema.clone()).with_doc(doc);
        if let Some(selection) = options.selection {
            config = config.with_selection(selection);
        }
        Ok(EditorState::create(config)?)
    }

    pub fn create_empty_doc(&self) -> Doc {
        Doc::empty()
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.0.schema
    }

    /// Names of extensions contributing nodes
    pub fn node_names(&self) -> &[String] {
        &self.0.node_names
    }

    /// Names of extensions contributing marks
    pub fn mark_names(&self) -> &[String] {
        &self.0.mark_names
    }

    /// Names of extensions without a schema entry
    pub fn plain_names(&self) -> &[String] {
        &self.0.plain_names
    }

    /// Read-only access to the store
    ///
    /// Extensions receive the writable [`ExtensionStore`] in their hooks.
    pub fn store(&self) -> StoreReader {
        StoreReader::new(self.0.store.clone())
    }
}

impl fmt::Debug for Manager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Manager")
            .field("phase", &self.phase())
            .field("extensions", &self.extension_names().collect::<Vec<_>>())
            .finish()
    }
}

fn input_rules_excluded(extension: &dyn Extension) -> bool {
    extension
        .options()
        .get("exclude")
        .and_then(|exclude| exclude.get("inputRules"))
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

//! Shared access to a manager for extensions, commands and hosts

use super::{Manager, ManagerGetter, ManagerInner};
use crate::commands::placeholders::{find_pending, remove_pending};
use crate::commands::{
    force_update_transaction, get_forced_updates, ChainedCommands, CommandProps, CommandRegistry,
    DispatchFn, PlaceholderId, SharedTransaction, UpdatableViewProp,
};
use crate::core::{EditorError, ManagerPhase, ManagerSettings, Result};
use crate::extensions::Extension;
use crate::framework::EditorView;
use crate::helpers::HelperRegistry;
use ahash::AHashMap;
use quill_model::{EditorState, StringHandler, Transaction};
use serde_json::Value;
use std::any::{type_name, Any};
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::trace;

/// Handle to the manager handed to every extension hook and command
///
/// The handle is weak: once the manager is dropped every operation fails
/// with a phase error.
#[derive(Clone)]
pub struct ExtensionStore(Weak<ManagerInner>);

impl ExtensionStore {
    pub(crate) fn new(inner: Weak<ManagerInner>) -> Self {
        Self(inner)
    }

    fn inner(&self) -> Result<Rc<ManagerInner>> {
        self.0
            .upgrade()
            .ok_or_else(|| EditorError::manager_phase("the manager has been dropped"))
    }

    /// Current phase; a dropped manager reports `Destroy`
    pub fn phase(&self) -> ManagerPhase {
        self.0
            .upgrade()
            .map_or(ManagerPhase::Destroy, |inner| inner.phase.get())
    }

    pub fn is_mounted(&self) -> bool {
        let phase = self.phase();
        phase >= ManagerPhase::EditorView && phase < ManagerPhase::Destroy
    }

    pub fn settings(&self) -> Result<ManagerSettings> {
        Ok(self.inner()?.settings.clone())
    }

    pub fn view(&self) -> Result<Rc<dyn EditorView>> {
        self.inner()?.view()
    }

    /// State of the view, or the framework's initial state before the view exists
    pub fn get_state(&self) -> Result<EditorState> {
        self.inner()?.get_state()
    }

    /// State recorded by the latest update
    pub fn current_state(&self) -> Option<EditorState> {
        self.0
            .upgrade()
            .and_then(|inner| inner.current_state.borrow().clone())
    }

    pub fn previous_state(&self) -> Option<EditorState> {
        self.0
            .upgrade()
            .and_then(|inner| inner.previous_state.borrow().clone())
    }

    /// Push a state to the view and notify every extension
    pub fn update_state(&self, state: EditorState) -> Result<()> {
        self.inner()?.update_state(state)
    }

    /// The shared transaction, refreshed when the live document moved on
    pub fn get_transaction(&self) -> Result<SharedTransaction> {
        self.inner()?.transaction()
    }

    /// Run a command against the live state with real dispatch
    ///
    /// Dispatch hands a copy of the shared transaction to the view. No
    /// manager state is borrowed while `run` executes, so commands may call
    /// back into the store.
    pub fn with_command_props<R>(
        &self,
        run: impl for<'a> FnOnce(CommandProps<'a>) -> Result<R>,
    ) -> Result<R> {
        let inner = self.inner()?;
        inner.ensure_alive()?;
        let view = inner.view()?;
        let state = view.state();
        let tr = inner.transaction()?;
        drop(inner);

        let dispatch: DispatchFn<'_> = &|tr: SharedTransaction| {
            trace!("dispatching shared transaction");
            view.dispatch(tr.snapshot()?)
        };
        run(CommandProps {
            state: &state,
            tr,
            dispatch: Some(dispatch),
            view: &view,
            store: self,
        })
    }

    /// Props for a chained command
    ///
    /// Dispatch only checks that the command handed back the shared
    /// transaction; the chain dispatches once in `run`.
    pub(crate) fn with_chain_props<R>(
        &self,
        run: impl for<'a> FnOnce(CommandProps<'a>) -> Result<R>,
    ) -> Result<R> {
        let inner = self.inner()?;
        inner.ensure_alive()?;
        let view = inner.view()?;
        let state = view.state();
        let tr = inner.transaction()?;
        drop(inner);

        let dispatch: DispatchFn<'_> = &|candidate: SharedTransaction| {
            if candidate.ptr_eq(&self.get_transaction()?) {
                Ok(())
            } else {
                Err(EditorError::invariant(
                    "a chained command dispatched a transaction other than the shared one",
                ))
            }
        };
        run(CommandProps {
            state: &state,
            tr,
            dispatch: Some(dispatch),
            view: &view,
            store: self,
        })
    }

    /// Props for checking whether a command could run
    ///
    /// The command receives a copy of the shared transaction and no dispatch.
    pub(crate) fn with_check_props<R>(
        &self,
        run: impl for<'a> FnOnce(CommandProps<'a>) -> Result<R>,
    ) -> Result<R> {
        let inner = self.inner()?;
        inner.ensure_alive()?;
        let view = inner.view()?;
        let state = view.state();
        let scratch = SharedTransaction::new(inner.transaction()?.snapshot()?);
        drop(inner);

        run(CommandProps {
            state: &state,
            tr: scratch,
            dispatch: None,
            view: &view,
            store: self,
        })
    }

    /// Send the shared transaction to the view
    pub(crate) fn dispatch_shared(&self) -> Result<()> {
        let tr = self.get_transaction()?.snapshot()?;
        self.dispatch(tr)
    }

    /// Send a transaction to the view
    pub fn dispatch(&self, tr: Transaction) -> Result<()> {
        let inner = self.inner()?;
        inner.ensure_alive()?;
        let view = inner.view()?;
        drop(inner);
        trace!(steps = tr.steps().len(), "dispatching transaction");
        view.dispatch(tr)
    }

    /// Make every command use `tr` until the next state update or `restore`
    pub(crate) fn set_custom_transaction(&self, tr: SharedTransaction) -> Result<()> {
        self.inner()?.transactions.borrow_mut().set_custom(tr);
        Ok(())
    }

    pub(crate) fn restore_transaction(&self) -> Result<()> {
        self.inner()?.transactions.borrow_mut().clear_custom();
        Ok(())
    }

    pub fn commands(&self) -> Result<Rc<CommandRegistry>> {
        self.inner()?.commands()
    }

    pub fn chain(&self) -> Result<Rc<ChainedCommands>> {
        Ok(self.commands()?.chain())
    }

    pub fn helpers(&self) -> Result<Rc<HelperRegistry>> {
        Ok(self.inner()?.helpers.clone())
    }

    /// Regenerate the merged keymap
    ///
    /// Called from inside an extension hook the rebuild happens once the
    /// hook returns.
    pub fn rebuild_keymap(&self) -> Result<()> {
        self.inner()?.rebuild_keymap()
    }

    /// Borrow another extension by type
    pub fn with_extension<T: Extension, R>(&self, f: impl FnOnce(&T) -> R) -> Result<R> {
        self.inner()?.with_extension(f)
    }

    /// Ask the view to re-read properties once the shared transaction is dispatched
    pub fn force_update(&self, props: &[UpdatableViewProp]) -> Result<()> {
        self.get_transaction()?.update(|tr| {
            force_update_transaction(tr, props);
            Ok(())
        })
    }

    pub fn forced_updates(&self, tr: &Transaction) -> Vec<UpdatableViewProp> {
        get_forced_updates(tr)
    }

    /// A new id for [`add_placeholder`](crate::commands::add_placeholder)
    pub fn next_placeholder_id(&self) -> Result<PlaceholderId> {
        Ok(self.inner()?.placeholders.borrow_mut().next_id())
    }

    /// Current range of a placeholder
    ///
    /// Placeholders not yet dispatched are read from the shared transaction.
    pub fn find_placeholder(&self, id: PlaceholderId) -> Result<Option<(usize, usize)>> {
        let inner = self.inner()?;
        if let Some(range) = inner.placeholders.borrow().find(id) {
            return Ok(Some(range));
        }
        inner.transaction()?.read(|tr| find_pending(tr, id))
    }

    /// Stop tracking a placeholder, returning its last range
    pub fn remove_placeholder(&self, id: PlaceholderId) -> Result<Option<(usize, usize)>> {
        let inner = self.inner()?;
        let tracked = inner.placeholders.borrow_mut().remove(id);
        let tr = inner.transaction()?;
        let pending = tr.read(|tr| find_pending(tr, id))?;
        if pending.is_some() {
            tr.update(|tr| Ok(remove_pending(tr, id)))?;
        }
        Ok(tracked.or(pending))
    }

    /// Set a value on the manager store
    pub fn set_store_key<T: 'static>(&self, key: impl Into<String>, value: T) -> Result<()> {
        self.inner()?
            .manager_store
            .borrow_mut()
            .insert(key.into(), Rc::new(value));
        Ok(())
    }

    /// Read a value from the manager store
    pub fn get_store_key<T: Clone + 'static>(&self, key: &str) -> Result<T> {
        read_key(&self.inner()?.manager_store, key)
    }

    /// Set a value on the extension store
    ///
    /// Only allowed until the view has been added and the first state
    /// update processed.
    pub fn set_extension_store<T: 'static>(&self, key: impl Into<String>, value: T) -> Result<()> {
        let inner = self.inner()?;
        let phase = inner.phase.get();
        if phase > ManagerPhase::EditorView {
            return Err(EditorError::manager_phase(format!(
                "the extension store cannot change in the {phase} phase"
            )));
        }
        inner
            .extension_store
            .borrow_mut()
            .insert(key.into(), Rc::new(value));
        Ok(())
    }

    pub fn get_extension_store<T: Clone + 'static>(&self, key: &str) -> Result<T> {
        read_key(&self.inner()?.extension_store, key)
    }

    /// Register a handler turning string content into a document
    pub fn set_string_handler(&self, name: impl Into<String>, handler: StringHandler) -> Result<()> {
        self.inner()?
            .string_handlers
            .borrow_mut()
            .insert(name.into(), handler);
        Ok(())
    }

    pub fn string_handler(&self, name: &str) -> Option<StringHandler> {
        self.0.upgrade().and_then(|inner| inner.string_handler(name))
    }

    /// Register a named value derived from the state, e.g. `text`
    pub fn set_manager_getter<F>(&self, name: impl Into<String>, getter: F) -> Result<()>
    where
        F: Fn(&EditorState) -> Value + 'static,
    {
        self.inner()?
            .getters
            .borrow_mut()
            .insert(name.into(), Rc::new(getter));
        Ok(())
    }

    pub fn manager_getter(&self, name: &str) -> Option<ManagerGetter> {
        self.0
            .upgrade()
            .and_then(|inner| inner.getters.borrow().get(name).cloned())
    }

    /// Evaluate a getter against the current state
    pub fn call_getter(&self, name: &str) -> Result<Value> {
        let getter = self
            .manager_getter(name)
            .ok_or_else(|| EditorError::HelperNotFound {
                name: name.to_string(),
            })?;
        Ok(getter(&self.get_state()?))
    }

    /// The manager this store belongs to
    pub fn manager(&self) -> Result<Manager> {
        Ok(Manager(self.inner()?))
    }

    pub fn reader(&self) -> StoreReader {
        StoreReader::new(self.clone())
    }
}

fn read_key<T: Clone + 'static>(
    store: &RefCell<AHashMap<String, Rc<dyn Any>>>,
    key: &str,
) -> Result<T> {
    let value = store.borrow().get(key).cloned().ok_or_else(|| {
        EditorError::manager_phase(format!("store key '{key}' has not been set"))
    })?;
    value
        .downcast_ref::<T>()
        .cloned()
        .ok_or_else(|| EditorError::StoreTypeMismatch {
            key: key.to_string(),
            expected: type_name::<T>(),
        })
}

impl fmt::Debug for ExtensionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionStore")
            .field("phase", &self.phase())
            .finish()
    }
}

/// Read-only view of the store for code outside the manager
#[derive(Clone, Debug)]
pub struct StoreReader(ExtensionStore);

impl StoreReader {
    pub(crate) fn new(store: ExtensionStore) -> Self {
        Self(store)
    }

    pub fn phase(&self) -> ManagerPhase {
        self.0.phase()
    }

    pub fn is_mounted(&self) -> bool {
        self.0.is_mounted()
    }

    pub fn settings(&self) -> Result<ManagerSettings> {
        self.0.settings()
    }

    pub fn get_state(&self) -> Result<EditorState> {
        self.0.get_state()
    }

    pub fn previous_state(&self) -> Option<EditorState> {
        self.0.previous_state()
    }

    pub fn get_store_key<T: Clone + 'static>(&self, key: &str) -> Result<T> {
        self.0.get_store_key(key)
    }

    pub fn get_extension_store<T: Clone + 'static>(&self, key: &str) -> Result<T> {
        self.0.get_extension_store(key)
    }

    pub fn call_getter(&self, name: &str) -> Result<Value> {
        self.0.call_getter(name)
    }

    pub fn string_handler(&self, name: &str) -> Option<StringHandler> {
        self.0.string_handler(name)
    }
}

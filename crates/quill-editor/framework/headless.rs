//! In-memory view for hosts without a UI

use super::{EditorView, FocusHandler, ViewProps};
use crate::core::{EditorError, Result};
use quill_model::{EditorState, Transaction};
use std::cell::{Cell, RefCell};
use std::fmt;
use tracing::trace;

/// View that keeps its state in memory
///
/// Dispatch goes to `props.dispatch` when set; otherwise the transaction is
/// applied directly to the stored state.
pub struct HeadlessView {
    state: RefCell<EditorState>,
    props: RefCell<ViewProps>,
    focused: Cell<bool>,
    destroyed: Cell<bool>,
    on_focus_change: RefCell<Option<FocusHandler>>,
}

impl HeadlessView {
    pub fn new(state: EditorState) -> Self {
        Self::with_props(state, ViewProps::default())
    }

    pub fn with_props(state: EditorState, props: ViewProps) -> Self {
        Self {
            state: RefCell::new(state),
            props: RefCell::new(props),
            focused: Cell::new(false),
            destroyed: Cell::new(false),
            on_focus_change: RefCell::new(None),
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.get()
    }

    fn set_focus(&self, focused: bool) {
        if self.focused.replace(focused) == focused {
            return;
        }
        let handler = self.on_focus_change.borrow().clone();
        if let Some(handler) = handler {
            handler(focused);
        }
    }
}

impl EditorView for HeadlessView {
    fn state(&self) -> EditorState {
        self.state.borrow().clone()
    }

    fn update_state(&self, state: EditorState) {
        *self.state.borrow_mut() = state;
    }

    fn dispatch(&self, tr: Transaction) -> Result<()> {
        if self.destroyed.get() {
            return Err(EditorError::manager_phase("the view has been destroyed"));
        }
        let dispatch = self.props.borrow().dispatch.clone();
        match dispatch {
            Some(dispatch) => dispatch(tr),
            None => {
                trace!(steps = tr.steps().len(), "applying transaction to headless view");
                let next = self.state().apply(tr)?;
                self.update_state(next);
                Ok(())
            }
        }
    }

    fn props(&self) -> ViewProps {
        self.props.borrow().clone()
    }

    fn set_props(&self, props: ViewProps) {
        *self.props.borrow_mut() = props;
    }

    fn focus(&self) {
        self.set_focus(true);
    }

    fn blur(&self) {
        self.set_focus(false);
    }

    fn has_focus(&self) -> bool {
        self.focused.get()
    }

    fn set_focus_handler(&self, handler: Option<FocusHandler>) {
        *self.on_focus_change.borrow_mut() = handler;
    }

    fn destroy(&self) {
        self.destroyed.set(true);
        self.focused.set(false);
        self.on_focus_change.borrow_mut().take();
    }
}

impl fmt::Debug for HeadlessView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeadlessView")
            .field("state", &self.state.borrow())
            .field("props", &self.props.borrow())
            .field("focused", &self.focused.get())
            .field("destroyed", &self.destroyed.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_model::{Doc, PrimitiveSelection, Schema, StateConfig};
    use std::rc::Rc;
    use std::sync::Arc;

    fn state(text: &str) -> EditorState {
        let schema = Arc::new(Schema::builder().build().unwrap());
        EditorState::create(
            StateConfig::new(schema)
                .with_doc(Doc::from_text(text))
                .with_selection(PrimitiveSelection::End),
        )
        .unwrap()
    }

    #[test]
    fn applies_transactions_without_dispatch_prop() {
        let view = HeadlessView::new(state("ab"));
        let mut tr = view.state().tr();
        tr.insert_text("c").unwrap();

        view.dispatch(tr).unwrap();
        assert_eq!(view.state().doc().text(), "abc");
    }

    #[test]
    fn dispatch_prop_takes_over() {
        let seen = Rc::new(Cell::new(0));
        let counter = seen.clone();
        let view = HeadlessView::new(state(""));
        view.set_props(ViewProps::default().with_dispatch(move |_| {
            counter.set(counter.get() + 1);
            Ok(())
        }));

        view.dispatch(view.state().tr()).unwrap();
        assert_eq!(seen.get(), 1);
        assert_eq!(view.state().doc().text(), "");
    }

    #[test]
    fn focus_changes_are_reported_once() {
        let changes = Rc::new(RefCell::new(Vec::new()));
        let log = changes.clone();
        let view = HeadlessView::new(state(""));
        view.set_focus_handler(Some(Rc::new(move |focused| log.borrow_mut().push(focused))));

        view.focus();
        view.focus();
        view.blur();
        assert_eq!(*changes.borrow(), vec![true, false]);
    }

    #[test]
    fn destroyed_view_rejects_dispatch() {
        let view = HeadlessView::new(state(""));
        view.destroy();
        assert!(view.is_destroyed());
        assert!(view.dispatch(view.state().tr()).unwrap_err().is_phase_error());
    }
}

//! Event system for manager and framework notifications
//!
//! Provides `EventEmitter`, a single threaded observer list keyed by event
//! kind, and `ManagerEvent`, the events a [`Manager`](crate::Manager)
//! publishes. Handlers run in priority order (highest first) and may
//! unsubscribe themselves or register new handlers while an event is being
//! emitted.

use crate::core::Priority;
use crate::manager::{Manager, StateUpdate};
use std::cell::RefCell;
use std::fmt;
use std::hash::Hash;
use std::rc::{Rc, Weak};

/// Removes a handler registered on an emitter
pub type Unsubscribe = Box<dyn FnOnce()>;

/// Events that can be grouped by a discriminant
pub trait EventKind {
    type Kind: Copy + Eq + Hash + fmt::Debug;

    fn kind(&self) -> Self::Kind;
}

/// Statistics about event handling
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventStats {
    /// Total number of events emitted
    pub events_emitted: usize,
    /// Number of handlers currently registered
    pub handlers_count: usize,
    /// Number of handler invocations
    pub handlers_called: usize,
}

type Handler<E> = Rc<dyn Fn(&E)>;

struct HandlerInfo<E: EventKind> {
    id: usize,
    kind: E::Kind,
    priority: Priority,
    handler: Handler<E>,
}

struct EmitterState<E: EventKind> {
    handlers: Vec<HandlerInfo<E>>,
    next_handler_id: usize,
    stats: EventStats,
}

/// Distributes events to handlers registered for their kind
pub struct EventEmitter<E: EventKind> {
    state: Rc<RefCell<EmitterState<E>>>,
}

impl<E: EventKind + 'static> EventEmitter<E> {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(EmitterState {
                handlers: Vec::new(),
                next_handler_id: 0,
                stats: EventStats::default(),
            })),
        }
    }

    /// Register a handler with default priority
    pub fn on<F>(&self, kind: E::Kind, handler: F) -> Unsubscribe
    where
        F: Fn(&E) + 'static,
    {
        self.on_with_priority(kind, Priority::DEFAULT, handler)
    }

    /// Register a handler; higher priorities are called first
    pub fn on_with_priority<F>(&self, kind: E::Kind, priority: Priority, handler: F) -> Unsubscribe
    where
        F: Fn(&E) + 'static,
    {
        let id = {
            let mut state = self.state.borrow_mut();
            let id = state.next_handler_id;
            state.next_handler_id += 1;

            let position = state
                .handlers
                .iter()
                .position(|info| info.priority < priority)
                .unwrap_or(state.handlers.len());
            state.handlers.insert(
                position,
                HandlerInfo {
                    id,
                    kind,
                    priority,
                    handler: Rc::new(handler),
                },
            );
            state.stats.handlers_count += 1;
            id
        };

        let weak: Weak<RefCell<EmitterState<E>>> = Rc::downgrade(&self.state);
        Box::new(move || {
            if let Some(state) = weak.upgrade() {
                let mut state = state.borrow_mut();
                let before = state.handlers.len();
                state.handlers.retain(|info| info.id != id);
                if state.handlers.len() < before {
                    state.stats.handlers_count -= 1;
                }
            }
        })
    }

    /// Call every handler registered for the event's kind
    ///
    /// Handlers are snapshotted before the first call, so handlers added
    /// during emission only see later events.
    pub fn emit(&self, event: &E) {
        let kind = event.kind();
        let handlers: Vec<Handler<E>> = {
            let mut state = self.state.borrow_mut();
            state.stats.events_emitted += 1;
            state
                .handlers
                .iter()
                .filter(|info| info.kind == kind)
                .map(|info| info.handler.clone())
                .collect()
        };

        let count = handlers.len();
        for handler in handlers {
            handler(event);
        }
        self.state.borrow_mut().stats.handlers_called += count;
    }

    /// Number of handlers registered for a kind
    pub fn handler_count(&self, kind: E::Kind) -> usize {
        self.state
            .borrow()
            .handlers
            .iter()
            .filter(|info| info.kind == kind)
            .count()
    }

    pub fn stats(&self) -> EventStats {
        self.state.borrow().stats
    }

    /// Remove every handler
    pub fn clear(&self) {
        let mut state = self.state.borrow_mut();
        state.handlers.clear();
        state.stats.handlers_count = 0;
    }
}

impl<E: EventKind + 'static> Default for EventEmitter<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: EventKind> fmt::Debug for EventEmitter<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("EventEmitter")
            .field("handlers", &state.handlers.len())
            .field("stats", &state.stats)
            .finish()
    }
}

/// Events published by a manager
#[derive(Debug, Clone)]
pub enum ManagerEvent {
    /// A new state was handed to the manager
    StateUpdate(StateUpdate),
    /// The manager was cloned with its current options
    Clone(Manager),
    /// The manager was recreated from initial options
    Recreate(Manager),
    /// The manager was destroyed
    Destroy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ManagerEventKind {
    StateUpdate,
    Clone,
    Recreate,
    Destroy,
}

impl EventKind for ManagerEvent {
    type Kind = ManagerEventKind;

    fn kind(&self) -> ManagerEventKind {
        match self {
            Self::StateUpdate(_) => ManagerEventKind::StateUpdate,
            Self::Clone(_) => ManagerEventKind::Clone,
            Self::Recreate(_) => ManagerEventKind::Recreate,
            Self::Destroy => ManagerEventKind::Destroy,
        }
    }
}

//! Commands that finish when a delayed value settles
//!
//! A [`DelayedValue`] is settled from outside the command pipeline, for
//! example by a network response. A [`DelayedCommand`] runs an optional
//! immediate step right away (usually inserting a placeholder or recording a
//! position) and, once the value settles, re-enters the normal dispatch path
//! through [`ExtensionStore::with_command_props`].

use super::{command, CommandFunction, CommandProps, RawCommand};
use crate::core::Result;
use serde_json::Value;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use tracing::{debug, error};

#[cfg(feature = "async")]
use futures::future::{FutureExt, LocalBoxFuture};
#[cfg(feature = "async")]
use std::future::Future;

#[cfg(doc)]
use crate::manager::ExtensionStore;

/// Settled result of a delayed value
pub type DelayedOutcome = std::result::Result<Value, String>;

type Listener = Box<dyn FnOnce(&DelayedOutcome)>;

enum Slot {
    Pending(Vec<Listener>),
    Settled(DelayedOutcome),
}

/// A value that becomes available later
#[derive(Clone)]
pub struct DelayedValue(Rc<RefCell<Slot>>);

impl DelayedValue {
    /// Pending value and the resolver that settles it
    pub fn pending() -> (Self, DelayedResolver) {
        let value = Self(Rc::new(RefCell::new(Slot::Pending(Vec::new()))));
        let resolver = DelayedResolver {
            value: value.clone(),
        };
        (value, resolver)
    }

    pub fn resolved(value: Value) -> Self {
        Self(Rc::new(RefCell::new(Slot::Settled(Ok(value)))))
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self(Rc::new(RefCell::new(Slot::Settled(Err(reason.into())))))
    }

    /// Settle from a future; the returned driver must be polled by the host
    #[cfg(feature = "async")]
    pub fn from_future<F>(future: F) -> (Self, LocalBoxFuture<'static, ()>)
    where
        F: Future<Output = DelayedOutcome> + 'static,
    {
        let (value, resolver) = Self::pending();
        let driver = async move {
            match future.await {
                Ok(resolved) => resolver.resolve(resolved),
                Err(reason) => resolver.reject(reason),
            }
        }
        .boxed_local();
        (value, driver)
    }

    pub fn is_settled(&self) -> bool {
        matches!(&*self.0.borrow(), Slot::Settled(_))
    }

    /// The outcome, once settled
    pub fn outcome(&self) -> Option<DelayedOutcome> {
        match &*self.0.borrow() {
            Slot::Settled(outcome) => Some(outcome.clone()),
            Slot::Pending(_) => None,
        }
    }

    /// Run `listener` with the outcome; immediately when already settled
    pub fn subscribe(&self, listener: impl FnOnce(&DelayedOutcome) + 'static) {
        let settled = {
            let mut slot = self.0.borrow_mut();
            match &mut *slot {
                Slot::Pending(listeners) => {
                    listeners.push(Box::new(listener));
                    return;
                }
                Slot::Settled(outcome) => outcome.clone(),
            }
        };
        listener(&settled);
    }

    fn settle(&self, outcome: DelayedOutcome) {
        let listeners = {
            let mut slot = self.0.borrow_mut();
            match &mut *slot {
                Slot::Settled(_) => return,
                Slot::Pending(listeners) => {
                    let listeners = std::mem::take(listeners);
                    *slot = Slot::Settled(outcome.clone());
                    listeners
                }
            }
        };
        for listener in listeners {
            listener(&outcome);
        }
    }
}

impl fmt::Debug for DelayedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(slot) => match &*slot {
                Slot::Pending(listeners) => f
                    .debug_struct("DelayedValue")
                    .field("listeners", &listeners.len())
                    .finish(),
                Slot::Settled(outcome) => {
                    f.debug_tuple("DelayedValue").field(outcome).finish()
                }
            },
            Err(_) => f.write_str("DelayedValue(<settling>)"),
        }
    }
}

/// Settles a pending [`DelayedValue`]
///
/// Dropping an unused resolver rejects the value so listeners never wait
/// forever.
pub struct DelayedResolver {
    value: DelayedValue,
}

impl DelayedResolver {
    pub fn resolve(self, value: Value) {
        self.value.settle(Ok(value));
    }

    pub fn reject(self, reason: impl Into<String>) {
        self.value.settle(Err(reason.into()));
    }
}

impl Drop for DelayedResolver {
    fn drop(&mut self) {
        self.value.settle(Err("delayed value was dropped before it settled".into()));
    }
}

impl fmt::Debug for DelayedResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelayedResolver").finish_non_exhaustive()
    }
}

type DoneCommand = Rc<dyn for<'a> Fn(CommandProps<'a>, &Value) -> Result<bool>>;

/// Command split into an immediate part and a continuation
pub struct DelayedCommand {
    promise: DelayedValue,
    immediate: Option<RawCommand>,
    on_done: Option<DoneCommand>,
    on_fail: Option<RawCommand>,
}

impl DelayedCommand {
    pub fn new(promise: DelayedValue) -> Self {
        Self {
            promise,
            immediate: None,
            on_done: None,
            on_fail: None,
        }
    }

    /// Runs when the command is called; returning `false` cancels the command
    pub fn immediate<F>(mut self, f: F) -> Self
    where
        F: for<'a> Fn(CommandProps<'a>) -> Result<bool> + 'static,
    {
        self.immediate = Some(Rc::new(f));
        self
    }

    /// Runs with the resolved value
    pub fn on_done<F>(mut self, f: F) -> Self
    where
        F: for<'a> Fn(CommandProps<'a>, &Value) -> Result<bool> + 'static,
    {
        self.on_done = Some(Rc::new(f));
        self
    }

    /// Runs when the value is rejected, e.g. to remove a placeholder
    pub fn on_fail<F>(mut self, f: F) -> Self
    where
        F: for<'a> Fn(CommandProps<'a>) -> Result<bool> + 'static,
    {
        self.on_fail = Some(Rc::new(f));
        self
    }

    /// The command to return from a factory
    ///
    /// When the command is only checked (no dispatch) the continuation is
    /// not registered.
    pub fn generate(self) -> CommandFunction {
        let Self {
            promise,
            immediate,
            on_done,
            on_fail,
        } = self;

        command(move |props| {
            let store = props.store.clone();
            let can_dispatch = props.can_dispatch();
            let proceed = match &immediate {
                Some(immediate) => immediate(props)?,
                None => true,
            };
            if !proceed || !can_dispatch {
                return Ok(proceed);
            }

            promise.subscribe(move |outcome| match outcome {
                Ok(value) => {
                    let Some(on_done) = on_done else {
                        return;
                    };
                    match store.with_command_props(|props| on_done(props, value)) {
                        Ok(applied) => debug!(applied, "delayed command completed"),
                        Err(err) => error!(error = %err, "delayed command failed to apply"),
                    }
                }
                Err(reason) => {
                    error!(%reason, "delayed value was rejected");
                    if let Some(on_fail) = on_fail {
                        if let Err(err) = store.with_command_props(&*on_fail) {
                            error!(error = %err, "delayed command cleanup failed");
                        }
                    }
                }
            });
            Ok(true)
        })
    }
}

impl fmt::Debug for DelayedCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelayedCommand")
            .field("promise", &self.promise)
            .field("immediate", &self.immediate.is_some())
            .field("on_done", &self.on_done.is_some())
            .field("on_fail", &self.on_fail.is_some())
            .finish()
    }
}

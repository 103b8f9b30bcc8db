//! Rebinding Dispatcher
//!
//! Components register one re-attach callback each. A dispatch releases every
//! existing binding first, then runs the callbacks in registration order, so
//! each live node ends up with exactly one set of handlers.

use tracing::{debug, warn};

/// Why a rebind pass runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebindCause {
    Start,
    /// The content region was replaced
    Navigation,
    /// The selection region was replaced
    Selection,
    /// A single item node was replaced
    ItemSwap,
}

impl RebindCause {
    /// Whether the page under the content region may be a different one
    pub fn new_page(self) -> bool {
        matches!(self, RebindCause::Start | RebindCause::Navigation)
    }
}

/// Something holding bindings that a dispatch can release
pub trait BindingScope {
    fn release_all(&mut self);
}

type Callback<C> = Box<dyn Fn(&mut C, RebindCause)>;

pub struct RebindDispatcher<C> {
    callbacks: Vec<(&'static str, Callback<C>)>,
    dispatched: u64,
}

impl<C: BindingScope> RebindDispatcher<C> {
    pub fn new() -> Self {
        Self { callbacks: Vec::new(), dispatched: 0 }
    }

    /// Register `callback` under `name`; a second registration of the same
    /// name is refused
    pub fn register<F>(&mut self, name: &'static str, callback: F) -> bool
    where
        F: Fn(&mut C, RebindCause) + 'static,
    {
        if self.callbacks.iter().any(|(existing, _)| *existing == name) {
            warn!(target: "rebind", name, "callback already registered");
            return false;
        }
        self.callbacks.push((name, Box::new(callback)));
        true
    }

    pub fn dispatch(&mut self, scope: &mut C, cause: RebindCause) {
        scope.release_all();
        for (_, callback) in &self.callbacks {
            callback(scope, cause);
        }
        self.dispatched += 1;
        debug!(target: "rebind", ?cause, callbacks = self.callbacks.len(), "rebound");
    }

    /// Number of dispatches so far
    pub fn dispatched(&self) -> u64 {
        self.dispatched
    }
}

impl<C: BindingScope> Default for RebindDispatcher<C> {
    fn default() -> Self {
        Self::new()
    }
}

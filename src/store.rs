//! Shell State Store
//!
//! Uses Leptos reactive_stores for fine-grained reactivity. Holds only what
//! the status overlay shows; item state lives in the page itself.

use leptos::prelude::*;
use reactive_stores::Store;

/// Non-fatal message shown until dismissed or expired
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub id: u32,
    pub text: String,
}

/// Overlay state with field-level reactivity
#[derive(Clone, Debug, Default, Store)]
pub struct ShellState {
    /// A partial navigation has been slow enough to show the indicator
    pub loading: bool,
    /// Rotation counter for the loading text
    pub tick: u32,
    pub notices: Vec<Notice>,
    pub next_notice: u32,
}

/// Type alias for the store
pub type ShellStore = Store<ShellState>;

/// Get the shell store from context
pub fn use_shell_store() -> ShellStore {
    expect_context::<ShellStore>()
}

/// Loading text for rotation step `tick`
pub fn rotating_message(messages: &[String], tick: u32) -> Option<&str> {
    if messages.is_empty() {
        return None;
    }
    messages.get(tick as usize % messages.len()).map(String::as_str)
}

// ========================
// Store Helper Functions
// ========================

pub fn store_set_loading(store: &ShellStore, loading: bool) {
    store.loading().set(loading);
    store.tick().set(0);
}

pub fn store_advance_tick(store: &ShellStore) {
    *store.tick().write() += 1;
}

/// Add a notice; returns its id
pub fn store_push_notice(store: &ShellStore, text: String) -> u32 {
    let id = store.next_notice().get_untracked();
    store.next_notice().set(id + 1);
    store.notices().write().push(Notice { id, text });
    id
}

pub fn store_dismiss_notice(store: &ShellStore, id: u32) {
    store.notices().write().retain(|notice| notice.id != id);
}

//! Shell Context
//!
//! Shared values provided via Leptos Context API.

use leptos::prelude::*;

/// Overlay settings provided via context
#[derive(Clone, Copy)]
pub struct ShellContext {
    /// Loading text, rotated while a navigation is slow
    pub loading_messages: StoredValue<Vec<String>>,
}

impl ShellContext {
    pub fn new(loading_messages: Vec<String>) -> Self {
        Self { loading_messages: StoredValue::new(loading_messages) }
    }
}

pub fn use_shell_context() -> ShellContext {
    use_context::<ShellContext>().expect("ShellContext not provided")
}

//! Vote Sync UI
//!
//! Client-side state sync for the server-rendered voting pages: optimistic
//! selection with reconciliation from server fragments, a debounced list
//! filter with history checkpoints, partial navigation, and one rebind pass
//! after every content swap.

pub mod app;
pub mod components;
pub mod config;
pub mod context;
pub mod error;
pub mod fetch;
pub mod filter;
pub mod intent;
pub mod location;
pub mod models;
pub mod navigation;
pub mod rebind;
pub mod selection;
pub mod store;
pub mod surface;
pub mod token;

#[cfg(target_arch = "wasm32")]
pub mod browser;
#[cfg(target_arch = "wasm32")]
mod runtime;

#[cfg(test)]
mod testing;

#[cfg(target_arch = "wasm32")]
pub use runtime::dispatch;

/// Boot the sync layer on the current page
#[cfg(target_arch = "wasm32")]
pub fn start() {
    use leptos::prelude::*;
    use reactive_stores::Store;
    use tracing::{info, Level};

    use crate::app::App;
    use crate::browser::{load_config, BrowserDocument};
    use crate::components::StatusOverlay;
    use crate::context::ShellContext;
    use crate::store::ShellState;

    console_error_panic_hook::set_once();
    rolling_logger::install(rolling_logger::DEFAULT_CAPACITY, Level::DEBUG);

    let Some(document) = web_sys::window().and_then(|w| w.document()) else {
        return;
    };
    let (config, config_error) = load_config(&document);
    if let Some(err) = config_error {
        tracing::error!(target: "app", error = %err, "configuration island rejected, using defaults");
        if let Some(window) = web_sys::window() {
            let _ = window.alert_with_message(&err.user_message());
        }
    }

    let shell = Store::new(ShellState::default());
    let ctx = ShellContext::new(config.loading_messages.clone());
    mount_to_body(move || {
        provide_context(shell);
        provide_context(ctx);
        view! { <StatusOverlay /> }
    });

    info!(target: "app", "vote sync starting");
    let surface = BrowserDocument::new(document, config.clone());
    runtime::install(App::new(config, surface), shell);
}

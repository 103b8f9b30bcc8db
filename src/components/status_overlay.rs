//! Status Overlay Component
//!
//! Delayed loading banner with rotating text, and the list of non-fatal
//! notices. Mounted once beside the server-rendered page.

use leptos::prelude::*;

use crate::context::use_shell_context;
use crate::store::{rotating_message, store_dismiss_notice, use_shell_store, ShellStateStoreFields};

/// Loading banner shown while a partial navigation is slow
#[component]
pub fn LoadingBanner() -> impl IntoView {
    let store = use_shell_store();
    let ctx = use_shell_context();

    let text = move || {
        let tick = store.tick().get();
        ctx.loading_messages
            .with_value(|messages| rotating_message(messages, tick).unwrap_or("loading").to_string())
    };

    view! {
        <Show when=move || store.loading().get()>
            <div class="sync-loading" role="status" aria-live="polite">
                {text}
            </div>
        </Show>
    }
}

/// Notices; click one to dismiss it
#[component]
pub fn NoticeList() -> impl IntoView {
    let store = use_shell_store();

    view! {
        <ul class="sync-notices">
            <For
                each=move || store.notices().get()
                key=|notice| notice.id
                children=move |notice| {
                    let id = notice.id;
                    view! {
                        <li class="sync-notice" on:click=move |_| store_dismiss_notice(&store, id)>
                            {notice.text}
                        </li>
                    }
                }
            />
        </ul>
    }
}

#[component]
pub fn StatusOverlay() -> impl IntoView {
    view! {
        <div class="vote-sync-overlay">
            <LoadingBanner />
            <NoticeList />
        </div>
    }
}

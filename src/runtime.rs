//! Browser Runtime
//!
//! Owns the `App` for the lifetime of the page and carries out its effects:
//! requests, timers, history entries, the loading indicator and notices.
//!
//! Listeners never touch the `App` directly. `dispatch` queues the intent and
//! drains the queue on a microtask, after the listener has returned, so a
//! rebind may drop the listener that raised the intent.

use std::cell::RefCell;
use std::collections::VecDeque;

use gloo_events::EventListener;
use gloo_timers::callback::{Interval, Timeout};
use leptos::task::spawn_local;
use tracing::{debug, warn};
use wasm_bindgen::JsCast;
use web_sys::PopStateEvent;

use crate::app::App;
use crate::browser::BrowserDocument;
use crate::fetch::authenticated_request;
use crate::intent::{Effect, Intent};
use crate::models::{HistoryCheckpoint, HistoryOp};
use crate::store::{store_advance_tick, store_dismiss_notice, store_push_notice, store_set_loading, ShellStore};
use crate::token::CookieToken;

/// How long a notice stays up unless dismissed
const NOTICE_MS: u32 = 6000;

/// Body class while the loading indicator is visible
const LOADING_CLASS: &str = "loading";

thread_local! {
    static RUNTIME: RefCell<Option<Runtime>> = const { RefCell::new(None) };
    static QUEUE: RefCell<VecDeque<Intent>> = const { RefCell::new(VecDeque::new()) };
}

struct Runtime {
    app: App<BrowserDocument>,
    tokens: CookieToken,
    token_header: String,
    shell: ShellStore,
    rotate_ms: u32,
    debounce: Option<Timeout>,
    loading: Option<Timeout>,
    rotation: Option<Interval>,
    _popstate: Option<EventListener>,
}

/// Start `app` against the live page and keep it for later intents
pub fn install(mut app: App<BrowserDocument>, shell: ShellStore) {
    let config = app.config().clone();
    let popstate = web_sys::window().map(|window| {
        EventListener::new(&window, "popstate", |event| {
            let state = event
                .dyn_ref::<PopStateEvent>()
                .map(PopStateEvent::state)
                .and_then(|value| serde_wasm_bindgen::from_value::<HistoryCheckpoint>(value).ok());
            let location = web_sys::window()
                .and_then(|w| w.location().href().ok())
                .unwrap_or_default();
            dispatch(Intent::PopState { state, location });
        })
    });

    let effects = app.start();
    let mut runtime = Runtime {
        app,
        tokens: CookieToken::new(config.csrf_cookie.clone()),
        token_header: config.csrf_header.clone(),
        shell,
        rotate_ms: config.loading_rotate_ms,
        debounce: None,
        loading: None,
        rotation: None,
        _popstate: popstate,
    };
    for effect in effects {
        runtime.execute(effect);
    }
    RUNTIME.with(|cell| *cell.borrow_mut() = Some(runtime));
}

/// Queue `intent` for the app
pub fn dispatch(intent: Intent) {
    QUEUE.with(|queue| queue.borrow_mut().push_back(intent));
    spawn_local(async { drain() });
}

fn drain() {
    RUNTIME.with(|cell| {
        let Ok(mut slot) = cell.try_borrow_mut() else {
            debug!(target: "runtime", "runtime busy, intents stay queued");
            return;
        };
        let Some(runtime) = slot.as_mut() else {
            warn!(target: "runtime", "intent raised before install");
            return;
        };
        while let Some(intent) = QUEUE.with(|queue| queue.borrow_mut().pop_front()) {
            for effect in runtime.app.handle(intent) {
                runtime.execute(effect);
            }
        }
    });
}

impl Runtime {
    fn execute(&mut self, effect: Effect) {
        match effect {
            Effect::Request { ticket, request } => {
                let tokens = self.tokens.clone();
                let header = self.token_header.clone();
                spawn_local(async move {
                    let result = authenticated_request(request, &tokens, &header).await;
                    dispatch(Intent::Settled { ticket, result });
                });
            }
            Effect::ScheduleDebounce { generation, delay_ms } => {
                self.debounce = Some(Timeout::new(delay_ms, move || {
                    dispatch(Intent::DebounceElapsed(generation));
                }));
            }
            Effect::ScheduleLoading { seq, delay_ms } => {
                self.loading = Some(Timeout::new(delay_ms, move || {
                    dispatch(Intent::LoadingDelayElapsed(seq));
                }));
            }
            Effect::ShowLoading => {
                set_body_class(LOADING_CLASS, true);
                store_set_loading(&self.shell, true);
                let shell = self.shell;
                self.rotation = Some(Interval::new(self.rotate_ms, move || store_advance_tick(&shell)));
            }
            Effect::HideLoading => {
                set_body_class(LOADING_CLASS, false);
                store_set_loading(&self.shell, false);
                self.loading = None;
                self.rotation = None;
            }
            Effect::History(op) => write_history(&op),
            Effect::Notice(text) => {
                let id = store_push_notice(&self.shell, text);
                let shell = self.shell;
                Timeout::new(NOTICE_MS, move || store_dismiss_notice(&shell, id)).forget();
            }
            Effect::Alert(text) => {
                if let Some(window) = web_sys::window() {
                    let _ = window.alert_with_message(&text);
                }
            }
            Effect::FullLoad(url) => {
                if let Some(window) = web_sys::window() {
                    if window.location().assign(&url).is_err() {
                        warn!(target: "runtime", %url, "full load refused");
                    }
                }
            }
        }
    }
}

fn set_body_class(class: &str, on: bool) {
    let Some(body) = web_sys::window().and_then(|w| w.document()).and_then(|d| d.body()) else {
        return;
    };
    let classes = body.class_list();
    let _ = if on { classes.add_1(class) } else { classes.remove_1(class) };
}

fn write_history(op: &HistoryOp) {
    let Some(history) = web_sys::window().and_then(|w| w.history().ok()) else {
        return;
    };
    let checkpoint = op.checkpoint();
    let state = match serde_wasm_bindgen::to_value(checkpoint) {
        Ok(state) => state,
        Err(err) => {
            warn!(target: "runtime", error = %err, "could not serialize history state");
            return;
        }
    };
    let result = match op {
        HistoryOp::Push(_) => history.push_state_with_url(&state, "", Some(&checkpoint.url)),
        HistoryOp::Replace(_) => history.replace_state_with_url(&state, "", Some(&checkpoint.url)),
    };
    if result.is_err() {
        warn!(target: "runtime", url = %checkpoint.url, "history update refused");
    }
}

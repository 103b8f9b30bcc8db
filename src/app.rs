//! Vote Sync Authority
//!
//! `App` owns the engines and the document surface. Bound handlers only raise
//! intents; `handle` applies one intent and returns the effects (requests,
//! timers, history operations, notices) for the shell to carry out. Every
//! replacement of document content ends in a rebind pass.

use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::error::{Severity, SyncError, STALE_SELECTION_PROMPT, STALE_SHORTLIST_PROMPT};
use crate::fetch::{FormBody, Fragment, FragmentRequest};
use crate::filter::{FilterEngine, FilterStep};
use crate::intent::{Effect, Intent, Purpose, Ticket};
use crate::location::append_query_param;
use crate::models::{Binding, Flag, HistoryOp, ItemId};
use crate::navigation::{NavOutcome, Navigator};
use crate::rebind::{BindingScope, RebindCause, RebindDispatcher};
use crate::selection::SelectionEngine;
use crate::surface::Surface;

/// Everything a rebind callback may touch
pub struct Components<S: Surface> {
    pub surface: S,
    pub selection: SelectionEngine,
    pub filter: FilterEngine,
    pub navigator: Navigator,
    outbox: Vec<Effect>,
}

impl<S: Surface> Components<S> {
    /// URL of the page as the history stack shows it
    fn location(&self) -> String {
        match self.navigator.displayed() {
            "" => self.surface.location(),
            shown => shown.to_string(),
        }
    }

    fn record_history(&mut self, op: HistoryOp) {
        self.navigator.set_displayed(&op.checkpoint().url);
        self.outbox.push(Effect::History(op));
    }

    fn apply_filter_step(&mut self, step: FilterStep) {
        match step {
            FilterStep::Idle => {}
            FilterStep::Scheduled { generation, delay_ms } => {
                self.outbox.push(Effect::ScheduleDebounce { generation, delay_ms });
            }
            FilterStep::Rendered(ops) => {
                for op in ops {
                    self.record_history(op);
                }
            }
        }
    }

    fn clear_item_pending(&mut self, id: &ItemId) {
        for node in self.surface.action_hosts(id) {
            self.surface.toggle_flag(&node, Flag::Pending, false);
        }
    }
}

impl<S: Surface> BindingScope for Components<S> {
    fn release_all(&mut self) {
        self.surface.release_bindings();
    }
}

pub struct App<S: Surface> {
    parts: Components<S>,
    dispatcher: RebindDispatcher<Components<S>>,
    config: SyncConfig,
    next_seq: u64,
}

impl<S: Surface + 'static> App<S> {
    pub fn new(config: SyncConfig, surface: S) -> Self {
        let parts = Components {
            surface,
            selection: SelectionEngine::new(&config),
            filter: FilterEngine::new(&config),
            navigator: Navigator::new(&config.selectors.content_region, config.loading_delay_ms),
            outbox: Vec::new(),
        };

        let mut dispatcher: RebindDispatcher<Components<S>> = RebindDispatcher::new();
        dispatcher.register("selection", |c: &mut Components<S>, _| c.selection.bind(&mut c.surface));
        dispatcher.register("item-actions", |c: &mut Components<S>, _| {
            for (node, item, url) in c.surface.item_actions() {
                c.surface.bind(&node, Binding::ItemAction { item, url });
            }
        });
        dispatcher.register("filter", |c: &mut Components<S>, cause: RebindCause| {
            if cause.new_page() {
                let location = c.location();
                let step = c.filter.attach(&mut c.surface, &location);
                c.apply_filter_step(step);
            }
            c.filter.bind(&mut c.surface);
        });
        dispatcher.register("navigation", |c: &mut Components<S>, _| c.navigator.bind(&mut c.surface));
        dispatcher.register("messages", |c: &mut Components<S>, _| {
            for node in c.surface.messages() {
                c.surface.bind(&node, Binding::DismissMessage);
            }
        });
        dispatcher.register("shortlist", |c: &mut Components<S>, _| {
            if let Some((node, url)) = c.surface.shortlist() {
                c.surface.bind(&node, Binding::Reorder { url });
            }
        });

        Self { parts, dispatcher, config, next_seq: 0 }
    }

    pub fn surface(&self) -> &S {
        &self.parts.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.parts.surface
    }

    pub fn selection(&self) -> &SelectionEngine {
        &self.parts.selection
    }

    pub fn filter(&self) -> &FilterEngine {
        &self.parts.filter
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Number of rebind passes so far
    pub fn rebinds(&self) -> u64 {
        self.dispatcher.dispatched()
    }

    /// Attach to the server-rendered page and fetch the current selection
    pub fn start(&mut self) -> Vec<Effect> {
        let location = self.parts.surface.location();
        info!(target: "app", %location, "starting");
        self.parts.navigator.set_displayed(&location);
        self.parts.selection.attach(&self.parts.surface);
        self.rebind(RebindCause::Start);

        let ticket = self.ticket(Purpose::Selection);
        let request = self.parts.selection.refresh(ticket.seq);
        self.send(ticket, request);
        self.drain()
    }

    pub fn handle(&mut self, intent: Intent) -> Vec<Effect> {
        match intent {
            Intent::Toggle(id) => {
                let ticket = self.ticket(Purpose::Selection);
                let request = self.parts.selection.toggle(&mut self.parts.surface, ticket.seq, &id);
                self.send(ticket, request);
            }
            Intent::SelectAll { url } => {
                let ticket = self.ticket(Purpose::Selection);
                let request = self.parts.selection.select_all(&mut self.parts.surface, ticket.seq, url);
                self.send(ticket, request);
            }
            Intent::ClearSelection => {
                let ticket = self.ticket(Purpose::Selection);
                let request = self.parts.selection.clear_selection(&mut self.parts.surface, ticket.seq);
                self.send(ticket, request);
            }
            Intent::SelectionAction { url, item } => {
                let ticket = self.ticket(Purpose::Selection);
                let request = self.parts.selection.action(&mut self.parts.surface, ticket.seq, &url, item);
                self.send(ticket, request);
            }
            Intent::ItemAction { item, url } => self.item_action(item, &url),
            Intent::QueryInput { value, commit } => {
                let location = self.parts.location();
                let step = self.parts.filter.on_query_change(&mut self.parts.surface, &location, &value, commit);
                self.parts.apply_filter_step(step);
            }
            Intent::DebounceElapsed(generation) => {
                let location = self.parts.location();
                let step = self.parts.filter.on_debounce_elapsed(&mut self.parts.surface, &location, generation);
                self.parts.apply_filter_step(step);
            }
            Intent::Navigate(url) => self.navigate(&url, true),
            Intent::PopState { state, location } => {
                let query = state
                    .and_then(|checkpoint| checkpoint.query)
                    .filter(|_| self.parts.filter.is_active());
                if let Some(url) = self.parts.navigator.on_pop_state(&location, query.is_some()) {
                    self.navigate(&url, false);
                } else {
                    self.parts.navigator.set_displayed(&location);
                    if let Some(query) = query {
                        let step = self.parts.filter.restore(&mut self.parts.surface, &query);
                        self.parts.apply_filter_step(step);
                    }
                }
            }
            Intent::LoadingDelayElapsed(seq) => {
                if self.parts.navigator.loading_elapsed(seq) {
                    self.parts.outbox.push(Effect::ShowLoading);
                }
            }
            Intent::ShortlistReordered { url, order } => {
                debug!(target: "app", count = order.len(), "shortlist reordered");
                let ticket = self.ticket(Purpose::ShortlistOrder);
                let body = FormBody::repeated(&self.config.shortlist_field, &order);
                self.send(ticket, FragmentRequest::post(url, body));
            }
            Intent::Settled { ticket, result } => self.settle(ticket, result),
        }
        self.drain()
    }

    // ========================
    // Helpers
    // ========================

    fn ticket(&mut self, purpose: Purpose) -> Ticket {
        self.next_seq += 1;
        Ticket { seq: self.next_seq, purpose }
    }

    fn send(&mut self, ticket: Ticket, request: FragmentRequest) {
        self.parts.outbox.push(Effect::Request { ticket, request });
    }

    fn drain(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.parts.outbox)
    }

    fn rebind(&mut self, cause: RebindCause) {
        self.dispatcher.dispatch(&mut self.parts, cause);
    }

    fn item_action(&mut self, item: ItemId, url: &str) {
        let (name, value) = &self.config.item_action_param;
        let url = append_query_param(url, name, value);
        for node in self.parts.surface.action_hosts(&item) {
            self.parts.surface.toggle_flag(&node, Flag::Pending, true);
        }
        let ticket = self.ticket(Purpose::ItemAction(item));
        self.send(ticket, FragmentRequest::get(url));
    }

    fn navigate(&mut self, url: &str, push: bool) {
        let ticket = self.ticket(Purpose::Navigation);
        let seq = ticket.seq;
        let request = self.parts.navigator.begin(seq, url, push);
        self.send(ticket, request);
        self.parts.outbox.push(Effect::ScheduleLoading {
            seq,
            delay_ms: self.parts.navigator.loading_delay_ms(),
        });
    }

    fn settle(&mut self, ticket: Ticket, result: Result<String, SyncError>) {
        let seq = ticket.seq;
        match ticket.purpose {
            Purpose::Selection => match self.parts.selection.settle(&mut self.parts.surface, seq, result) {
                Ok(Some(_)) => self.rebind(RebindCause::Selection),
                Ok(None) => {}
                Err(err) => self.report(err),
            },
            Purpose::ItemAction(item) => {
                let surface = &mut self.parts.surface;
                let swapped = result.and_then(|body| match Fragment::classify(body) {
                    Fragment::Markup(markup) => surface.replace_item(&item, &markup),
                    Fragment::Reload => Err(SyncError::stale(STALE_SELECTION_PROMPT)),
                });
                match swapped {
                    Ok(()) => {
                        debug!(target: "app", seq, %item, "item replaced");
                        self.rebind(RebindCause::ItemSwap);
                    }
                    Err(err) => {
                        self.parts.clear_item_pending(&item);
                        self.report(err);
                    }
                }
            }
            Purpose::Navigation => match self.parts.navigator.settle(&mut self.parts.surface, seq, result) {
                NavOutcome::Stale => {}
                NavOutcome::Swapped { history } => {
                    self.parts.outbox.push(Effect::HideLoading);
                    if let Some(op) = history {
                        self.parts.record_history(op);
                    }
                    self.rebind(RebindCause::Navigation);
                }
                NavOutcome::Failed { url, error } => {
                    debug!(target: "app", %url, %error, "falling back to a full load");
                    self.parts.outbox.push(Effect::HideLoading);
                    self.rebind(RebindCause::Navigation);
                    self.parts.outbox.push(Effect::FullLoad(url));
                }
            },
            Purpose::ShortlistOrder => match result.map(Fragment::classify) {
                Ok(Fragment::Reload) => self.report(SyncError::stale(STALE_SHORTLIST_PROMPT)),
                Ok(Fragment::Markup(_)) => debug!(target: "app", seq, "shortlist order saved"),
                Err(err) => self.report(err),
            },
        }
    }

    /// Surface a failure according to its severity
    fn report(&mut self, err: SyncError) {
        match err.severity() {
            Severity::Silent => debug!(target: "app", error = %err, "not applicable here"),
            Severity::Notice => {
                warn!(target: "app", error = %err, "request failed");
                self.parts.outbox.push(Effect::Notice(err.user_message()));
            }
            Severity::Blocking => {
                warn!(target: "app", error = %err, "blocking failure");
                self.parts.outbox.push(Effect::Alert(err.user_message()));
            }
        }
    }
}

//! Filter Engine
//!
//! Live text filtering over a static list of named items. Typing re-renders
//! after a debounce and replaces the current history entry; an explicit
//! submission renders at once and pushes a new entry, so back returns to the
//! previously submitted query.

use regex::{Regex, RegexBuilder};
use tracing::{debug, warn};

use crate::config::SyncConfig;
use crate::location::with_query_param;
use crate::models::{Binding, Flag, HistoryCheckpoint, HistoryOp, Span};
use crate::surface::FilterSurface;

/// What the caller has to do after a filter call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterStep {
    /// Nothing: no filter form on this page, or a superseded timer
    Idle,
    /// Start the debounce timer for `generation`
    Scheduled { generation: u64, delay_ms: u32 },
    /// Rendered; apply these history operations in order
    Rendered(Vec<HistoryOp>),
}

pub struct FilterEngine {
    /// Query parameter name; `None` while the page has no filter form
    param: Option<String>,
    current_query: String,
    submitted_query: String,
    generation: u64,
    debounce_ms: u32,
    highlight: bool,
}

/// Split `name` into plain and matched spans
pub fn tokenize(name: &str, pattern: &Regex) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut last = 0;
    for found in pattern.find_iter(name) {
        if found.start() > last {
            spans.push(Span::plain(&name[last..found.start()]));
        }
        if !found.as_str().is_empty() {
            spans.push(Span::matched(found.as_str()));
        }
        last = found.end();
    }
    if last < name.len() {
        spans.push(Span::plain(&name[last..]));
    }
    spans
}

/// Literal, case-insensitive pattern for `query`; `None` matches everything
fn compile(query: &str) -> Option<Regex> {
    if query.is_empty() {
        return None;
    }
    match RegexBuilder::new(&regex::escape(query)).case_insensitive(true).build() {
        Ok(pattern) => Some(pattern),
        Err(err) => {
            warn!(target: "filter", error = %err, "query too large to match, showing everything");
            None
        }
    }
}

impl FilterEngine {
    pub fn new(config: &SyncConfig) -> Self {
        Self {
            param: None,
            current_query: String::new(),
            submitted_query: String::new(),
            generation: 0,
            debounce_ms: config.debounce_ms,
            highlight: config.highlight_matches,
        }
    }

    pub fn is_active(&self) -> bool {
        self.param.is_some()
    }

    pub fn current_query(&self) -> &str {
        &self.current_query
    }

    pub fn submitted_query(&self) -> &str {
        &self.submitted_query
    }

    /// Pick up the page's filter form and render its initial state
    pub fn attach<S: FilterSurface>(&mut self, surface: &mut S, location: &str) -> FilterStep {
        // drop any debounce started on the previous page
        self.generation += 1;
        let Some(form) = surface.filter_form() else {
            self.param = None;
            return FilterStep::Idle;
        };
        debug!(target: "filter", param = %form.param, query = %form.value, "attached");
        self.param = Some(form.param);
        self.current_query = form.value.clone();
        self.submitted_query = form.value;
        self.render(surface);
        FilterStep::Rendered(vec![HistoryOp::Replace(self.checkpoint(location, &self.current_query))])
    }

    pub fn bind<S: FilterSurface>(&self, surface: &mut S) {
        if !self.is_active() {
            return;
        }
        if let Some(form) = surface.filter_form() {
            surface.bind(&form.node, Binding::FilterForm);
        }
    }

    /// Input changed; `commit` for an explicit submission
    pub fn on_query_change<S: FilterSurface>(
        &mut self,
        surface: &mut S,
        location: &str,
        value: &str,
        commit: bool,
    ) -> FilterStep {
        if !self.is_active() {
            return FilterStep::Idle;
        }
        self.current_query = value.to_string();
        self.generation += 1;

        if !commit {
            return FilterStep::Scheduled { generation: self.generation, delay_ms: self.debounce_ms };
        }

        self.render(surface);
        if self.current_query == self.submitted_query {
            // a change event followed by a submit commits the same query twice
            return FilterStep::Rendered(vec![HistoryOp::Replace(
                self.checkpoint(location, &self.current_query),
            )]);
        }
        let ops = vec![
            HistoryOp::Replace(self.checkpoint(location, &self.submitted_query)),
            HistoryOp::Push(self.checkpoint(location, &self.current_query)),
        ];
        self.submitted_query = self.current_query.clone();
        debug!(target: "filter", query = %self.submitted_query, "submitted");
        FilterStep::Rendered(ops)
    }

    /// Debounce timer fired; ignored unless `generation` is the newest
    pub fn on_debounce_elapsed<S: FilterSurface>(
        &mut self,
        surface: &mut S,
        location: &str,
        generation: u64,
    ) -> FilterStep {
        if !self.is_active() || generation != self.generation {
            return FilterStep::Idle;
        }
        self.render(surface);
        FilterStep::Rendered(vec![HistoryOp::Replace(self.checkpoint(location, &self.current_query))])
    }

    /// Back/forward landed on a filter checkpoint
    pub fn restore<S: FilterSurface>(&mut self, surface: &mut S, query: &str) -> FilterStep {
        if !self.is_active() {
            return FilterStep::Idle;
        }
        self.generation += 1;
        self.current_query = query.to_string();
        self.submitted_query = query.to_string();
        surface.set_filter_input(query);
        self.render(surface);
        debug!(target: "filter", query, "restored");
        FilterStep::Rendered(Vec::new())
    }

    /// History entry for `query` on the page at `location`
    fn checkpoint(&self, location: &str, query: &str) -> HistoryCheckpoint {
        let url = match &self.param {
            Some(param) => with_query_param(location, param, (!query.is_empty()).then_some(query)),
            None => location.to_string(),
        };
        HistoryCheckpoint { url, query: Some(query.to_string()) }
    }

    /// Re-evaluate every item against the current query; returns the match count
    pub fn render<S: FilterSurface>(&self, surface: &mut S) -> usize {
        let pattern = compile(&self.current_query);
        let mut total = 0;

        for group in surface.filter_groups() {
            let mut group_matches = false;
            for item in surface.group_items(&group) {
                let name = surface.item_name(&item).unwrap_or_default();
                let matched = pattern.as_ref().map_or(true, |p| p.is_match(&name));
                surface.toggle_flag(&item, Flag::Matched, matched);

                let spans = match &pattern {
                    Some(p) if self.highlight => tokenize(&name, p),
                    _ if name.is_empty() => Vec::new(),
                    _ => vec![Span::plain(name)],
                };
                surface.render_name(&item, &spans);

                if matched {
                    group_matches = true;
                    total += 1;
                }
            }
            surface.set_group_has_matches(&group, group_matches);
        }
        total
    }
}

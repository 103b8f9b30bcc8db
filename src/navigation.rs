//! Navigation Layer
//!
//! Partial page loads: in-app links fetch the target with `X-PJAX` headers and
//! the response replaces the content region. Only the newest navigation is
//! applied; a failed one falls back to loading the page normally.

use tracing::{debug, info, warn};

use crate::error::SyncError;
use crate::fetch::FragmentRequest;
use crate::location::{origin_of, path_of, split};
use crate::models::{Binding, HistoryCheckpoint, HistoryOp};
use crate::surface::NavigationSurface;

/// A link click as the browser reports it
#[derive(Debug, Clone, Default)]
pub struct LinkActivation<'a> {
    pub button: i16,
    /// Any of ctrl, meta, shift, alt held
    pub modifiers: bool,
    pub target: Option<&'a str>,
    pub download: bool,
    /// Absolute link URL
    pub href: &'a str,
    /// Absolute URL of the current page
    pub current: &'a str,
    /// Link matches the opt-out selector
    pub opted_out: bool,
}

impl LinkActivation<'_> {
    pub fn should_intercept(&self) -> bool {
        if self.button != 0 || self.modifiers || self.download || self.opted_out {
            return false;
        }
        if self.target.is_some_and(|t| !t.is_empty() && t != "_self") {
            return false;
        }
        match (origin_of(self.href), origin_of(self.current)) {
            (Some(link), Some(page)) if link == page => {}
            _ => return false,
        }
        // in-page fragment jump
        let (path, query, fragment) = split(self.href);
        let (here, here_query, _) = split(self.current);
        !(fragment.is_some() && path == here && query == here_query)
    }
}

/// Result of applying a navigation response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavOutcome {
    /// Superseded by a newer navigation; nothing happened
    Stale,
    /// Content replaced; apply `history` if present
    Swapped { history: Option<HistoryOp> },
    /// Load `url` the ordinary way
    Failed { url: String, error: SyncError },
}

struct InFlight {
    seq: u64,
    url: String,
    push: bool,
}

pub struct Navigator {
    in_flight: Option<InFlight>,
    /// URL whose content is on screen
    displayed: String,
    container: String,
    loading_delay_ms: u32,
}

impl Navigator {
    pub fn new(container: &str, loading_delay_ms: u32) -> Self {
        Self {
            in_flight: None,
            displayed: String::new(),
            container: container.to_string(),
            loading_delay_ms,
        }
    }

    pub fn set_displayed(&mut self, url: &str) {
        self.displayed = url.to_string();
    }

    pub fn displayed(&self) -> &str {
        &self.displayed
    }

    pub fn loading_delay_ms(&self) -> u32 {
        self.loading_delay_ms
    }

    /// Start navigation `seq` to `url`, superseding any in flight
    pub fn begin(&mut self, seq: u64, url: &str, push: bool) -> FragmentRequest {
        if let Some(prev) = self.in_flight.take() {
            debug!(target: "navigation", superseded = prev.seq, seq, "navigation superseded");
        }
        info!(target: "navigation", seq, url, push, "navigating");
        self.in_flight = Some(InFlight { seq, url: url.to_string(), push });
        FragmentRequest::get(url)
            .with_header("X-PJAX", "true")
            .with_header("X-PJAX-Container", &self.container)
    }

    /// Whether the loading indicator for `seq` is still wanted
    pub fn loading_elapsed(&self, seq: u64) -> bool {
        self.in_flight.as_ref().is_some_and(|nav| nav.seq == seq)
    }

    pub fn settle<S: NavigationSurface>(
        &mut self,
        surface: &mut S,
        seq: u64,
        result: Result<String, SyncError>,
    ) -> NavOutcome {
        let nav = match self.in_flight.take() {
            Some(nav) if nav.seq == seq => nav,
            other => {
                self.in_flight = other;
                debug!(target: "navigation", seq, "dropping superseded response");
                return NavOutcome::Stale;
            }
        };

        match result.and_then(|markup| surface.replace_content(&markup)) {
            Ok(()) => {
                self.displayed = nav.url.clone();
                let history = nav
                    .push
                    .then(|| HistoryOp::Push(HistoryCheckpoint { url: nav.url, query: None }));
                NavOutcome::Swapped { history }
            }
            Err(error) => {
                warn!(target: "navigation", seq, url = %nav.url, %error, "partial load failed");
                NavOutcome::Failed { url: nav.url, error }
            }
        }
    }

    /// Back/forward moved to `location`; returns the URL to refetch when it
    /// shows a different page than the one on screen.
    ///
    /// `filter_checkpoint` marks an entry the filter can restore in place;
    /// such entries only need a fetch when the path changed.
    pub fn on_pop_state(&self, location: &str, filter_checkpoint: bool) -> Option<String> {
        let url = without_fragment(location);
        let same_page = if filter_checkpoint {
            path_of(location) == path_of(&self.displayed)
        } else {
            url == without_fragment(&self.displayed)
        };
        if same_page {
            return None;
        }
        Some(url.to_string())
    }

    /// Bind partial navigation to every eligible link
    pub fn bind<S: NavigationSurface>(&self, surface: &mut S) {
        let links = surface.navigation_links();
        let count = links.len();
        for (node, url) in links {
            surface.bind(&node, Binding::Navigate { url });
        }
        debug!(target: "navigation", count, "bound links");
    }
}

fn without_fragment(url: &str) -> &str {
    url.split_once('#').map_or(url, |(before, _)| before)
}

//! Selection Sync Engine
//!
//! Mutations are optimistic: the affected item nodes are flagged `pending`
//! immediately and a request goes out. Every successful response carries the
//! complete selection markup, and reconciling it is the only thing that sets
//! `selected`. Concurrent requests are neither coalesced nor cancelled; with
//! the default policy the last response to arrive wins, so a rapid
//! double-toggle can briefly show the intermediate state.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info, warn};

use crate::config::{Endpoints, StalePolicy, SyncConfig};
use crate::error::{SyncError, STALE_SELECTION_PROMPT};
use crate::fetch::{FormBody, Fragment, FragmentRequest};
use crate::models::{Binding, Flag, ItemId};
use crate::surface::{ItemSurface, SelectionSurface};

/// Outcome of one reconciliation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Size of the reconciled selection
    pub selected: usize,
    /// Nodes whose `selected` flag changed
    pub toggled: usize,
    /// Nodes that lost `pending`
    pub cleared_pending: usize,
}

pub struct SelectionEngine {
    mirror: BTreeSet<ItemId>,
    /// Outstanding requests and the ids they flagged pending
    in_flight: BTreeMap<u64, Vec<ItemId>>,
    last_applied: Option<u64>,
    policy: StalePolicy,
    endpoints: Endpoints,
    id_field: String,
}

impl SelectionEngine {
    pub fn new(config: &SyncConfig) -> Self {
        Self {
            mirror: BTreeSet::new(),
            in_flight: BTreeMap::new(),
            last_applied: None,
            policy: config.stale_responses,
            endpoints: config.endpoints.clone(),
            id_field: config.id_field.clone(),
        }
    }

    /// Seed the mirror from the server-rendered page
    pub fn attach<S: ItemSurface + SelectionSurface>(&mut self, surface: &S) {
        let mut mirror: BTreeSet<ItemId> = surface.selection_ids().into_iter().collect();
        for node in surface.item_nodes() {
            if surface.has_flag(&node, Flag::Selected) {
                if let Some(id) = surface.item_id(&node) {
                    mirror.insert(id);
                }
            }
        }
        debug!(target: "selection", count = mirror.len(), "attached");
        self.mirror = mirror;
    }

    pub fn is_selected(&self, id: &ItemId) -> bool {
        self.mirror.contains(id)
    }

    pub fn mirror(&self) -> &BTreeSet<ItemId> {
        &self.mirror
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    // ========================
    // Mutations
    // ========================

    fn issue<S: ItemSurface>(
        &mut self,
        surface: &mut S,
        seq: u64,
        ids: Vec<ItemId>,
        url: &str,
    ) -> FragmentRequest {
        self.mark_pending(surface, &ids);
        let body = FormBody::repeated(&self.id_field, ids.iter().map(ItemId::as_str));
        self.in_flight.insert(seq, ids);
        FragmentRequest::post(url, body)
    }

    fn mark_pending<S: ItemSurface>(&self, surface: &mut S, ids: &[ItemId]) {
        if ids.is_empty() {
            return;
        }
        for node in surface.item_nodes() {
            if surface.item_id(&node).is_some_and(|id| ids.contains(&id)) {
                surface.toggle_flag(&node, Flag::Pending, true);
            }
        }
    }

    /// Fetch the current selection without changing it
    pub fn refresh(&mut self, seq: u64) -> FragmentRequest {
        self.in_flight.insert(seq, Vec::new());
        FragmentRequest::post(self.endpoints.selection.clone(), FormBody::new())
    }

    /// Select `id` if it is not selected, else deselect it
    pub fn toggle<S: ItemSurface>(&mut self, surface: &mut S, seq: u64, id: &ItemId) -> FragmentRequest {
        let url = if self.is_selected(id) {
            self.endpoints.deselect.clone()
        } else {
            self.endpoints.select.clone()
        };
        debug!(target: "selection", seq, item = %id, %url, "toggle");
        self.issue(surface, seq, vec![id.clone()], &url)
    }

    /// Select every selectable item on the page
    pub fn select_all<S: ItemSurface>(
        &mut self,
        surface: &mut S,
        seq: u64,
        url: Option<String>,
    ) -> FragmentRequest {
        let mut ids: Vec<ItemId> = Vec::new();
        for node in surface.item_nodes() {
            if !surface.is_selectable(&node) {
                continue;
            }
            if let Some(id) = surface.item_id(&node) {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }
        let url = url.unwrap_or_else(|| self.endpoints.select_all.clone());
        debug!(target: "selection", seq, count = ids.len(), "select all");
        self.issue(surface, seq, ids, &url)
    }

    /// Clear the selection, naming everything currently selected
    pub fn clear_selection<S: ItemSurface>(&mut self, surface: &mut S, seq: u64) -> FragmentRequest {
        let ids: Vec<ItemId> = self.mirror.iter().cloned().collect();
        let url = self.endpoints.clear_selection.clone();
        debug!(target: "selection", seq, count = ids.len(), "clear selection");
        self.issue(surface, seq, ids, &url)
    }

    /// Post to a selection-region link, optionally naming one item
    pub fn action<S: ItemSurface>(
        &mut self,
        surface: &mut S,
        seq: u64,
        url: &str,
        item: Option<ItemId>,
    ) -> FragmentRequest {
        self.issue(surface, seq, item.into_iter().collect(), url)
    }

    // ========================
    // Responses
    // ========================

    /// Apply the response to request `seq`.
    ///
    /// `Ok(None)` means the response was dropped by the stale policy.
    pub fn settle<S: ItemSurface + SelectionSurface>(
        &mut self,
        surface: &mut S,
        seq: u64,
        result: Result<String, SyncError>,
    ) -> Result<Option<ReconcileReport>, SyncError> {
        let ids = self.in_flight.remove(&seq).unwrap_or_default();

        let body = match result {
            Ok(body) => body,
            Err(err) => {
                warn!(target: "selection", seq, error = %err, "mutation failed");
                self.abandon(surface, &ids);
                return Err(err);
            }
        };

        let markup = match Fragment::classify(body) {
            Fragment::Markup(markup) => markup,
            Fragment::Reload => {
                warn!(target: "selection", seq, "server reports a stale client");
                self.abandon(surface, &ids);
                return Err(SyncError::stale(STALE_SELECTION_PROMPT));
            }
        };

        if self.policy == StalePolicy::Ignore && self.last_applied.is_some_and(|last| seq < last) {
            debug!(target: "selection", seq, "dropping response older than the last applied");
            self.abandon(surface, &ids);
            return Ok(None);
        }

        match self.reconcile(surface, &markup) {
            Ok(report) => {
                self.last_applied = Some(seq);
                Ok(Some(report))
            }
            Err(err) => {
                self.abandon(surface, &ids);
                Err(err)
            }
        }
    }

    /// Replace the selection region with `markup` and make every item node
    /// agree with it. Idempotent.
    pub fn reconcile<S: ItemSurface + SelectionSurface>(
        &mut self,
        surface: &mut S,
        markup: &str,
    ) -> Result<ReconcileReport, SyncError> {
        let details_open = surface.selection_details_open();
        surface.replace_selection(markup)?;

        let selected: BTreeSet<ItemId> = surface.selection_ids().into_iter().collect();
        let mut report = ReconcileReport { selected: selected.len(), ..Default::default() };

        for node in surface.item_nodes() {
            let Some(id) = surface.item_id(&node) else {
                continue;
            };
            if surface.toggle_flag(&node, Flag::Selected, selected.contains(&id)) {
                report.toggled += 1;
            }
            if surface.toggle_flag(&node, Flag::Pending, false) {
                report.cleared_pending += 1;
            }
        }

        if let Some(open) = details_open {
            surface.set_selection_details_open(open);
        }

        info!(
            target: "selection",
            selected = report.selected,
            toggled = report.toggled,
            "reconciled"
        );
        self.mirror = selected;
        Ok(report)
    }

    /// Clear `pending` for ids no other outstanding request still covers
    fn abandon<S: ItemSurface>(&self, surface: &mut S, ids: &[ItemId]) {
        let covered: BTreeSet<&ItemId> = self.in_flight.values().flatten().collect();
        let released: Vec<&ItemId> = ids.iter().filter(|id| !covered.contains(id)).collect();
        if released.is_empty() {
            return;
        }
        for node in surface.item_nodes() {
            if surface.item_id(&node).is_some_and(|id| released.contains(&&id)) {
                surface.toggle_flag(&node, Flag::Pending, false);
            }
        }
    }

    // ========================
    // Bindings
    // ========================

    /// Bind toggles to selectable items and the selection controls
    pub fn bind<S: ItemSurface + SelectionSurface>(&self, surface: &mut S) {
        let mut bound = 0;
        for node in surface.item_nodes() {
            if !surface.is_selectable(&node) {
                continue;
            }
            if let Some(id) = surface.item_id(&node) {
                surface.bind(&node, Binding::ToggleItem(id));
                bound += 1;
            }
        }
        for (node, binding) in surface.selection_controls() {
            surface.bind(&node, binding);
            bound += 1;
        }
        debug!(target: "selection", bound, "bound");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MemoryDocument, Region};

    fn id(raw: &str) -> ItemId {
        ItemId::parse(raw).unwrap()
    }

    fn markup(ids: &[&str]) -> String {
        ids.iter()
            .map(|i| format!(r#"<div class="minitrack" data-item-id="{i}"></div>"#))
            .collect()
    }

    fn page() -> (MemoryDocument, SelectionEngine) {
        let mut doc = MemoryDocument::new("https://vote.test/");
        doc.add_item("12", true);
        doc.add_item("42", true);
        doc.add_item("77", false);
        let mut engine = SelectionEngine::new(&SyncConfig::default());
        engine.attach(&doc);
        (doc, engine)
    }

    #[test]
    fn test_toggle_marks_pending_and_posts() {
        let (mut doc, mut engine) = page();
        let req = engine.toggle(&mut doc, 1, &id("42"));
        assert_eq!(req.url, "/do/select/");
        assert_eq!(req.body.as_ref().unwrap().values("track_id[]"), vec!["42"]);
        assert_eq!(doc.flagged(Flag::Pending), doc.nodes_of("42"));
        assert_eq!(engine.in_flight(), 1);
    }

    #[test]
    fn test_toggle_selected_item_deselects() {
        let (mut doc, mut engine) = page();
        engine.reconcile(&mut doc, &markup(&["42"])).unwrap();
        let req = engine.toggle(&mut doc, 2, &id("42"));
        assert_eq!(req.url, "/do/deselect/");
    }

    #[test]
    fn test_sequence_in_order_matches_last_fragment() {
        let (mut doc, mut engine) = page();
        let steps: [(&str, &[&str]); 4] = [("12", &["12"]), ("42", &["12", "42"]), ("12", &["42"]), ("42", &[])];

        for (seq, (item, after)) in steps.iter().enumerate() {
            let seq = seq as u64 + 1;
            engine.toggle(&mut doc, seq, &id(item));
            engine.settle(&mut doc, seq, Ok(markup(after))).unwrap();

            for i in ["12", "42", "77"] {
                let expected = after.contains(&i);
                for node in doc.nodes_of(i) {
                    assert_eq!(doc.flag(node, Flag::Selected), expected, "item {i} after seq {seq}");
                }
            }
            assert!(doc.flagged(Flag::Pending).is_empty());
        }
        assert!(engine.mirror().is_empty());
    }

    #[test]
    fn test_every_region_agrees() {
        let (mut doc, mut engine) = page();
        engine.reconcile(&mut doc, &markup(&["12"])).unwrap();
        // the page item and its selection-region entry
        assert_eq!(doc.nodes_of("12").len(), 2);
        assert_eq!(doc.flagged(Flag::Selected), doc.nodes_of("12"));
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let state = |doc: &MemoryDocument| {
            let mut flags: Vec<(String, bool, bool)> = doc
                .item_nodes()
                .into_iter()
                .map(|n| {
                    let item = doc.item_id(&n).unwrap().to_string();
                    (item, doc.flag(n, Flag::Selected), doc.flag(n, Flag::Pending))
                })
                .collect();
            flags.sort();
            flags
        };

        let (mut doc, mut engine) = page();
        let fragment = markup(&["12", "77"]);
        let first = engine.reconcile(&mut doc, &fragment).unwrap();
        let after_first = state(&doc);
        let second = engine.reconcile(&mut doc, &fragment).unwrap();

        assert_eq!(first.selected, second.selected);
        assert_eq!(state(&doc), after_first);
        assert_eq!(engine.mirror().len(), 2);
    }

    #[test]
    fn test_offline_toggle_clears_pending() {
        let (mut doc, mut engine) = page();
        engine.toggle(&mut doc, 1, &id("42"));
        assert!(!doc.flagged(Flag::Pending).is_empty());

        let err = engine
            .settle(&mut doc, 1, Err(SyncError::network("offline")))
            .unwrap_err();
        assert!(matches!(err, SyncError::Transport { status: None, .. }));
        assert!(doc.flagged(Flag::Pending).is_empty());
        assert!(doc.nodes_of("42").iter().all(|&n| !doc.flag(n, Flag::Selected)));
        assert_eq!(engine.in_flight(), 0);
    }

    #[test]
    fn test_failure_keeps_pending_of_other_requests() {
        let (mut doc, mut engine) = page();
        engine.toggle(&mut doc, 1, &id("42"));
        engine.select_all(&mut doc, 2, None);
        engine.settle(&mut doc, 1, Err(SyncError::status(500, "oops"))).unwrap_err();
        // 42 is still covered by the select-all request
        assert!(doc.nodes_of("42").iter().all(|&n| doc.flag(n, Flag::Pending)));
    }

    #[test]
    fn test_reload_sentinel() {
        let (mut doc, mut engine) = page();
        engine.toggle(&mut doc, 1, &id("12"));
        let err = engine.settle(&mut doc, 1, Ok("reload".into())).unwrap_err();
        assert_eq!(err, SyncError::stale(STALE_SELECTION_PROMPT));
        assert!(doc.flagged(Flag::Pending).is_empty());
    }

    #[test]
    fn test_last_arrival_wins_by_default() {
        let (mut doc, mut engine) = page();
        engine.toggle(&mut doc, 1, &id("12"));
        engine.toggle(&mut doc, 2, &id("42"));
        engine.settle(&mut doc, 2, Ok(markup(&["12", "42"]))).unwrap();
        let applied = engine.settle(&mut doc, 1, Ok(markup(&["12"]))).unwrap();
        assert!(applied.is_some());
        assert!(!engine.is_selected(&id("42")));
    }

    #[test]
    fn test_ignore_policy_drops_older_response() {
        let config = SyncConfig { stale_responses: StalePolicy::Ignore, ..Default::default() };
        let mut doc = MemoryDocument::new("https://vote.test/");
        doc.add_item("12", true);
        doc.add_item("42", true);
        let mut engine = SelectionEngine::new(&config);

        engine.toggle(&mut doc, 1, &id("12"));
        engine.toggle(&mut doc, 2, &id("42"));
        engine.settle(&mut doc, 2, Ok(markup(&["12", "42"]))).unwrap();
        let applied = engine.settle(&mut doc, 1, Ok(markup(&["12"]))).unwrap();
        assert_eq!(applied, None);
        assert!(engine.is_selected(&id("42")));
        assert!(doc.flagged(Flag::Pending).is_empty());
    }

    #[test]
    fn test_select_all_and_clear() {
        let (mut doc, mut engine) = page();
        let req = engine.select_all(&mut doc, 1, None);
        assert_eq!(req.url, "/do/select_all/");
        assert_eq!(req.body.as_ref().unwrap().values("track_id[]"), vec!["12", "42"]);
        engine.settle(&mut doc, 1, Ok(markup(&["12", "42"]))).unwrap();

        let req = engine.clear_selection(&mut doc, 2);
        assert_eq!(req.url, "/do/clear_selection/");
        assert_eq!(req.body.as_ref().unwrap().values("track_id[]"), vec!["12", "42"]);
        assert_eq!(doc.flagged(Flag::Pending).len(), 4);
    }

    #[test]
    fn test_details_state_survives() {
        let (mut doc, mut engine) = page();
        doc.set_details_open(true);
        engine.reconcile(&mut doc, "<details><summary>2 selected</summary></details>").unwrap();
        assert_eq!(doc.details_open(), Some(true));
    }

    #[test]
    fn test_missing_region_is_anchor_error() {
        let mut doc = MemoryDocument::new("https://vote.test/").without_selection_region();
        doc.add_item("12", true);
        let mut engine = SelectionEngine::new(&SyncConfig::default());
        engine.toggle(&mut doc, 1, &id("12"));
        let err = engine.settle(&mut doc, 1, Ok(markup(&["12"]))).unwrap_err();
        assert_eq!(err, SyncError::MissingAnchor("selection region"));
        assert!(doc.flagged(Flag::Pending).is_empty());
    }

    #[test]
    fn test_attach_seeds_mirror() {
        let mut doc = MemoryDocument::new("https://vote.test/");
        doc.add_item("12", true);
        doc.add_selection_entry("42");
        let mut engine = SelectionEngine::new(&SyncConfig::default());
        engine.attach(&doc);
        assert!(engine.is_selected(&id("42")));
        assert!(!engine.is_selected(&id("12")));
    }

    #[test]
    fn test_bind_only_selectable() {
        let (mut doc, engine) = page();
        let control = doc.add_control(Region::Selection, Binding::SelectAll { url: None });
        engine.bind(&mut doc);
        assert_eq!(doc.bound_count(), 3);
        assert!(doc.bindings_on(doc.nodes_of("77")[0]).is_empty());
        assert_eq!(doc.bindings_on(control), &[Binding::SelectAll { url: None }]);
    }
}

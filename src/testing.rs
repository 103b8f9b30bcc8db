//! In-memory document and history used by unit tests.
//!
//! Markup handed to the replace operations is scanned for `data-item-id`,
//! `data-name`, `href` and `value` attributes; that is enough structure for
//! the engines, which never look further than those.

use std::collections::{BTreeMap, HashSet};

use crate::error::SyncError;
use crate::intent::Intent;
use crate::models::{Binding, Flag, HistoryCheckpoint, HistoryOp, ItemId, Span};
use crate::surface::{
    FilterForm, FilterSurface, ItemSurface, NavigationSurface, NodeSurface, SelectionSurface,
    WidgetSurface,
};

pub type NodeId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Page,
    Content,
    Selection,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Kind {
    Item { selectable: bool },
    ActionLink { host: NodeId, item: ItemId, url: String },
    Control(Binding),
    Link(String),
    Group,
    FilterItem { group: NodeId },
    FilterForm,
    Message,
    Shortlist(String),
}

#[derive(Debug, Clone)]
pub struct MemoryNode {
    pub kind: Kind,
    pub region: Region,
    pub item: Option<ItemId>,
    pub flags: HashSet<Flag>,
    pub name: Option<String>,
    pub spans: Vec<Span>,
    pub has_matches: bool,
    pub alive: bool,
}

pub struct MemoryDocument {
    nodes: Vec<MemoryNode>,
    location: String,
    bindings: BTreeMap<NodeId, Vec<Binding>>,
    has_content_region: bool,
    has_selection_region: bool,
    details_open: Option<bool>,
    filter_param: String,
    filter_value: String,
    pub releases: usize,
    pub flag_writes: usize,
    pub name_writes: usize,
}

fn attr_values(markup: &str, attr: &str) -> Vec<String> {
    let needle = format!("{attr}=\"");
    let mut values = Vec::new();
    let mut rest = markup;
    while let Some(start) = rest.find(&needle) {
        // skip matches that are the tail of a longer attribute name
        let boundary = start == 0 || !rest[..start].ends_with(|c: char| c.is_alphanumeric() || c == '-');
        rest = &rest[start + needle.len()..];
        let end = rest.find('"').unwrap_or(rest.len());
        if boundary {
            values.push(rest[..end].to_string());
        }
        rest = &rest[end..];
    }
    values
}

impl MemoryDocument {
    pub fn new(location: &str) -> Self {
        Self {
            nodes: Vec::new(),
            location: location.to_string(),
            bindings: BTreeMap::new(),
            has_content_region: true,
            has_selection_region: true,
            details_open: None,
            filter_param: "q".to_string(),
            filter_value: String::new(),
            releases: 0,
            flag_writes: 0,
            name_writes: 0,
        }
    }

    pub fn without_selection_region(mut self) -> Self {
        self.has_selection_region = false;
        self
    }

    pub fn without_content_region(mut self) -> Self {
        self.has_content_region = false;
        self
    }

    fn add(&mut self, kind: Kind, region: Region, item: Option<ItemId>) -> NodeId {
        self.nodes.push(MemoryNode {
            kind,
            region,
            item,
            flags: HashSet::new(),
            name: None,
            spans: Vec::new(),
            has_matches: false,
            alive: true,
        });
        self.nodes.len() - 1
    }

    fn id(raw: &str) -> ItemId {
        ItemId::parse(raw).expect("test item id")
    }

    pub fn add_item(&mut self, id: &str, selectable: bool) -> NodeId {
        self.add(Kind::Item { selectable }, Region::Content, Some(Self::id(id)))
    }

    pub fn add_selection_entry(&mut self, id: &str) -> NodeId {
        self.add(Kind::Item { selectable: false }, Region::Selection, Some(Self::id(id)))
    }

    pub fn add_item_action(&mut self, host: NodeId, url: &str) -> NodeId {
        let item = self.nodes[host].item.clone().expect("action host is an item");
        let region = self.nodes[host].region;
        self.add(Kind::ActionLink { host, item, url: url.to_string() }, region, None)
    }

    pub fn add_control(&mut self, region: Region, binding: Binding) -> NodeId {
        self.add(Kind::Control(binding), region, None)
    }

    pub fn add_link(&mut self, url: &str) -> NodeId {
        self.add(Kind::Link(url.to_string()), Region::Content, None)
    }

    pub fn add_filter_form(&mut self, param: &str, value: &str) -> NodeId {
        self.filter_param = param.to_string();
        self.filter_value = value.to_string();
        self.add(Kind::FilterForm, Region::Content, None)
    }

    pub fn add_group(&mut self) -> NodeId {
        self.add(Kind::Group, Region::Content, None)
    }

    pub fn add_filter_item(&mut self, group: NodeId, name: &str) -> NodeId {
        let node = self.add(Kind::FilterItem { group }, Region::Content, None);
        self.nodes[node].name = Some(name.to_string());
        self.nodes[node].spans = vec![Span::plain(name)];
        node
    }

    pub fn add_message(&mut self) -> NodeId {
        self.add(Kind::Message, Region::Page, None)
    }

    pub fn add_shortlist(&mut self, url: &str) -> NodeId {
        self.add(Kind::Shortlist(url.to_string()), Region::Content, None)
    }

    pub fn set_details_open(&mut self, open: bool) {
        self.details_open = Some(open);
    }

    pub fn set_location(&mut self, url: &str) {
        self.location = url.to_string();
    }

    /// Type into the filter input without raising any intent
    pub fn type_filter(&mut self, value: &str) {
        self.filter_value = value.to_string();
    }

    // ========================
    // Inspection
    // ========================

    pub fn node(&self, node: NodeId) -> &MemoryNode {
        &self.nodes[node]
    }

    pub fn flag(&self, node: NodeId, flag: Flag) -> bool {
        self.nodes[node].flags.contains(&flag)
    }

    /// Live nodes carrying `flag`
    pub fn flagged(&self, flag: Flag) -> Vec<NodeId> {
        (0..self.nodes.len())
            .filter(|&n| self.nodes[n].alive && self.nodes[n].flags.contains(&flag))
            .collect()
    }

    /// Live item nodes of `id`
    pub fn nodes_of(&self, id: &str) -> Vec<NodeId> {
        (0..self.nodes.len())
            .filter(|&n| {
                self.nodes[n].alive
                    && matches!(self.nodes[n].kind, Kind::Item { .. })
                    && self.nodes[n].item.as_ref().map(ItemId::as_str) == Some(id)
            })
            .collect()
    }

    /// Live nodes of a kind, in creation order
    pub fn live(&self, pred: impl Fn(&Kind) -> bool) -> Vec<NodeId> {
        (0..self.nodes.len())
            .filter(|&n| self.nodes[n].alive && pred(&self.nodes[n].kind))
            .collect()
    }

    pub fn spans(&self, node: NodeId) -> &[Span] {
        &self.nodes[node].spans
    }

    pub fn details_open(&self) -> Option<bool> {
        self.details_open
    }

    pub fn filter_value(&self) -> &str {
        &self.filter_value
    }

    pub fn bindings_on(&self, node: NodeId) -> &[Binding] {
        self.bindings.get(&node).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn bound_count(&self) -> usize {
        self.bindings.values().map(Vec::len).sum()
    }

    /// Intents the node's bindings raise when it is clicked
    pub fn click(&self, node: NodeId) -> Vec<Intent> {
        self.bindings_on(node).iter().filter_map(Binding::activate).collect()
    }

    fn kill_region(&mut self, region: Region) {
        for node in self.nodes.iter_mut().filter(|n| n.region == region) {
            node.alive = false;
        }
    }
}

impl NodeSurface for MemoryDocument {
    type Node = NodeId;

    fn has_flag(&self, node: &NodeId, flag: Flag) -> bool {
        self.nodes[*node].flags.contains(&flag)
    }

    fn set_flag(&mut self, node: &NodeId, flag: Flag, on: bool) {
        self.flag_writes += 1;
        let flags = &mut self.nodes[*node].flags;
        if on {
            flags.insert(flag);
        } else {
            flags.remove(&flag);
        }
    }

    fn bind(&mut self, node: &NodeId, binding: Binding) {
        self.bindings.entry(*node).or_default().push(binding);
    }

    fn release_bindings(&mut self) {
        self.releases += 1;
        self.bindings.clear();
    }

    fn location(&self) -> String {
        self.location.clone()
    }
}

impl ItemSurface for MemoryDocument {
    fn item_nodes(&self) -> Vec<NodeId> {
        self.live(|kind| matches!(kind, Kind::Item { .. }))
    }

    fn item_id(&self, node: &NodeId) -> Option<ItemId> {
        self.nodes[*node].item.clone()
    }

    fn is_selectable(&self, node: &NodeId) -> bool {
        matches!(self.nodes[*node].kind, Kind::Item { selectable: true })
    }

    fn item_actions(&self) -> Vec<(NodeId, ItemId, String)> {
        self.live(|kind| matches!(kind, Kind::ActionLink { .. }))
            .into_iter()
            .filter_map(|n| match &self.nodes[n].kind {
                Kind::ActionLink { item, url, .. } => Some((n, item.clone(), url.clone())),
                _ => None,
            })
            .collect()
    }

    fn action_hosts(&self, id: &ItemId) -> Vec<NodeId> {
        let mut hosts: Vec<NodeId> = self
            .live(|kind| matches!(kind, Kind::ActionLink { .. }))
            .into_iter()
            .filter_map(|n| match &self.nodes[n].kind {
                Kind::ActionLink { host, item, .. } if item == id => Some(*host),
                _ => None,
            })
            .collect();
        hosts.dedup();
        hosts
    }

    fn replace_item(&mut self, id: &ItemId, markup: &str) -> Result<(), SyncError> {
        let hosts = self.action_hosts(id);
        if hosts.is_empty() {
            return Err(SyncError::MissingAnchor("item"));
        }
        for host in hosts {
            let links = self.live(|kind| matches!(kind, Kind::ActionLink { host: h, .. } if *h == host));
            for link in links {
                self.nodes[link].alive = false;
            }
            self.nodes[host].alive = false;
            let region = self.nodes[host].region;
            let kind = self.nodes[host].kind.clone();
            let fresh = self.add(kind, region, Some(id.clone()));
            for url in attr_values(markup, "href") {
                self.add(Kind::ActionLink { host: fresh, item: id.clone(), url }, region, None);
            }
        }
        Ok(())
    }
}

impl SelectionSurface for MemoryDocument {
    fn replace_selection(&mut self, markup: &str) -> Result<(), SyncError> {
        if !self.has_selection_region {
            return Err(SyncError::MissingAnchor("selection region"));
        }
        self.kill_region(Region::Selection);
        for raw in attr_values(markup, "data-item-id") {
            if let Some(id) = ItemId::parse(&raw) {
                self.add(Kind::Item { selectable: false }, Region::Selection, Some(id));
            }
        }
        self.details_open = markup.contains("<details").then_some(markup.contains("<details open"));
        Ok(())
    }

    fn selection_ids(&self) -> Vec<ItemId> {
        self.item_nodes()
            .into_iter()
            .filter(|&n| self.nodes[n].region == Region::Selection)
            .filter_map(|n| self.nodes[n].item.clone())
            .collect()
    }

    fn selection_details_open(&self) -> Option<bool> {
        self.details_open
    }

    fn set_selection_details_open(&mut self, open: bool) {
        if self.details_open.is_some() {
            self.details_open = Some(open);
        }
    }

    fn selection_controls(&self) -> Vec<(NodeId, Binding)> {
        self.live(|kind| matches!(kind, Kind::Control(_)))
            .into_iter()
            .filter_map(|n| match &self.nodes[n].kind {
                Kind::Control(binding) => Some((n, binding.clone())),
                _ => None,
            })
            .collect()
    }
}

impl FilterSurface for MemoryDocument {
    fn filter_form(&self) -> Option<FilterForm<NodeId>> {
        let node = *self.live(|kind| matches!(kind, Kind::FilterForm)).first()?;
        Some(FilterForm {
            node,
            param: self.filter_param.clone(),
            value: self.filter_value.clone(),
        })
    }

    fn set_filter_input(&mut self, value: &str) {
        self.filter_value = value.to_string();
    }

    fn filter_groups(&self) -> Vec<NodeId> {
        self.live(|kind| matches!(kind, Kind::Group))
    }

    fn group_items(&self, group: &NodeId) -> Vec<NodeId> {
        self.live(|kind| matches!(kind, Kind::FilterItem { group: g } if g == group))
    }

    fn item_name(&self, node: &NodeId) -> Option<String> {
        self.nodes[*node].name.clone()
    }

    fn render_name(&mut self, node: &NodeId, spans: &[Span]) {
        self.name_writes += 1;
        self.nodes[*node].spans = spans.to_vec();
    }

    fn set_group_has_matches(&mut self, group: &NodeId, has_matches: bool) {
        self.nodes[*group].has_matches = has_matches;
    }
}

impl NavigationSurface for MemoryDocument {
    fn replace_content(&mut self, markup: &str) -> Result<(), SyncError> {
        if !self.has_content_region {
            return Err(SyncError::MissingAnchor("content region"));
        }
        self.kill_region(Region::Content);
        for raw in attr_values(markup, "data-item-id") {
            if let Some(id) = ItemId::parse(&raw) {
                self.add(Kind::Item { selectable: true }, Region::Content, Some(id));
            }
        }
        for url in attr_values(markup, "href") {
            self.add(Kind::Link(url), Region::Content, None);
        }
        if markup.contains("<form") {
            let value = attr_values(markup, "value").into_iter().next().unwrap_or_default();
            self.filter_value = value;
            self.add(Kind::FilterForm, Region::Content, None);
        }
        let names = attr_values(markup, "data-name");
        if !names.is_empty() {
            let group = self.add_group();
            for name in names {
                self.add_filter_item(group, &name);
            }
        }
        Ok(())
    }

    fn navigation_links(&self) -> Vec<(NodeId, String)> {
        self.live(|kind| matches!(kind, Kind::Link(_)))
            .into_iter()
            .filter_map(|n| match &self.nodes[n].kind {
                Kind::Link(url) => Some((n, url.clone())),
                _ => None,
            })
            .collect()
    }
}

impl WidgetSurface for MemoryDocument {
    fn messages(&self) -> Vec<NodeId> {
        self.live(|kind| matches!(kind, Kind::Message))
    }

    fn shortlist(&self) -> Option<(NodeId, String)> {
        self.live(|kind| matches!(kind, Kind::Shortlist(_)))
            .into_iter()
            .find_map(|n| match &self.nodes[n].kind {
                Kind::Shortlist(url) => Some((n, url.clone())),
                _ => None,
            })
    }
}

/// Session history stack
#[derive(Debug, Default)]
pub struct MemoryHistory {
    entries: Vec<HistoryCheckpoint>,
    index: usize,
}

impl MemoryHistory {
    pub fn apply(&mut self, op: &HistoryOp) {
        match op {
            HistoryOp::Push(cp) => {
                if !self.entries.is_empty() {
                    self.entries.truncate(self.index + 1);
                    self.index += 1;
                }
                self.entries.push(cp.clone());
            }
            HistoryOp::Replace(cp) => {
                if self.entries.is_empty() {
                    self.entries.push(cp.clone());
                } else {
                    self.entries[self.index] = cp.clone();
                }
            }
        }
    }

    pub fn back(&mut self) -> Option<HistoryCheckpoint> {
        if self.index == 0 {
            return None;
        }
        self.index -= 1;
        self.current().cloned()
    }

    pub fn forward(&mut self) -> Option<HistoryCheckpoint> {
        if self.index + 1 >= self.entries.len() {
            return None;
        }
        self.index += 1;
        self.current().cloned()
    }

    pub fn current(&self) -> Option<&HistoryCheckpoint> {
        self.entries.get(self.index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attr_scan() {
        let markup = r#"<p data-item-id="12"></p><a href="/x/" data-href="/no/">x</a>"#;
        assert_eq!(attr_values(markup, "data-item-id"), vec!["12"]);
        assert_eq!(attr_values(markup, "href"), vec!["/x/"]);
    }

    #[test]
    fn test_history_stack() {
        let mut history = MemoryHistory::default();
        let cp = |q: &str| HistoryCheckpoint { url: format!("/?q={q}"), query: Some(q.into()) };
        history.apply(&HistoryOp::Replace(cp("")));
        history.apply(&HistoryOp::Push(cp("a")));
        history.apply(&HistoryOp::Push(cp("b")));
        assert_eq!(history.back(), Some(cp("a")));
        history.apply(&HistoryOp::Push(cp("c")));
        assert_eq!(history.len(), 3);
        assert_eq!(history.forward(), None);
        assert_eq!(history.back(), Some(cp("a")));
        assert_eq!(history.back(), Some(cp("")));
        assert_eq!(history.back(), None);
    }
}

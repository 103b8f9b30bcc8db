//! Document Surface
//!
//! The engines never touch the DOM directly. They read and write the live
//! document through these traits: the browser implements them over web-sys
//! elements, tests over an in-memory document.

use crate::error::SyncError;
use crate::models::{Binding, Flag, ItemId, Span};

/// Flags, bindings and location common to every node kind
pub trait NodeSurface {
    type Node: Clone;

    fn has_flag(&self, node: &Self::Node, flag: Flag) -> bool;

    fn set_flag(&mut self, node: &Self::Node, flag: Flag, on: bool);

    /// Set `flag` to `on` only if it differs; returns whether it changed
    fn toggle_flag(&mut self, node: &Self::Node, flag: Flag, on: bool) -> bool {
        if self.has_flag(node, flag) == on {
            return false;
        }
        self.set_flag(node, flag, on);
        true
    }

    /// Attach `binding` to `node` until the next `release_bindings`
    fn bind(&mut self, node: &Self::Node, binding: Binding);

    /// Detach every binding made since the last release
    fn release_bindings(&mut self);

    /// Absolute URL of the current page
    fn location(&self) -> String;
}

pub trait ItemSurface: NodeSurface {
    /// Every node representing an item, in every region
    fn item_nodes(&self) -> Vec<Self::Node>;

    fn item_id(&self, node: &Self::Node) -> Option<ItemId>;

    /// Whether clicking the node toggles its item
    fn is_selectable(&self, node: &Self::Node) -> bool;

    /// Per-item action links: (link, owning item, absolute URL)
    fn item_actions(&self) -> Vec<(Self::Node, ItemId, String)>;

    /// Item nodes that hold action links for `id`
    fn action_hosts(&self, id: &ItemId) -> Vec<Self::Node>;

    /// Replace the action hosts of `id` with `markup`
    fn replace_item(&mut self, id: &ItemId, markup: &str) -> Result<(), SyncError>;
}

pub trait SelectionSurface: NodeSurface {
    fn replace_selection(&mut self, markup: &str) -> Result<(), SyncError>;

    /// Identifiers listed inside the selection region
    fn selection_ids(&self) -> Vec<ItemId>;

    /// Open state of the selection `<details>`, if present
    fn selection_details_open(&self) -> Option<bool>;

    fn set_selection_details_open(&mut self, open: bool);

    /// Select-all, mass-vote and selection-region action links with their bindings
    fn selection_controls(&self) -> Vec<(Self::Node, Binding)>;
}

/// Filter form anchor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterForm<N> {
    pub node: N,
    /// Input `name`, used as the query parameter
    pub param: String,
    /// Current input value
    pub value: String,
}

pub trait FilterSurface: NodeSurface {
    fn filter_form(&self) -> Option<FilterForm<Self::Node>>;

    fn set_filter_input(&mut self, value: &str);

    fn filter_groups(&self) -> Vec<Self::Node>;

    fn group_items(&self, group: &Self::Node) -> Vec<Self::Node>;

    /// Plain display name (`data-name`)
    fn item_name(&self, node: &Self::Node) -> Option<String>;

    /// Rewrite the visible name as plain and highlighted spans
    fn render_name(&mut self, node: &Self::Node, spans: &[Span]);

    fn set_group_has_matches(&mut self, group: &Self::Node, has_matches: bool);
}

pub trait NavigationSurface: NodeSurface {
    /// Replace the content region with `markup`
    fn replace_content(&mut self, markup: &str) -> Result<(), SyncError>;

    /// Links eligible for partial navigation: (link, absolute URL)
    fn navigation_links(&self) -> Vec<(Self::Node, String)>;
}

pub trait WidgetSurface: NodeSurface {
    fn messages(&self) -> Vec<Self::Node>;

    /// Reorderable shortlist container and its order endpoint
    fn shortlist(&self) -> Option<(Self::Node, String)>;
}

/// Everything the authority needs from a document
pub trait Surface:
    ItemSurface + SelectionSurface + FilterSurface + NavigationSurface + WidgetSurface
{
}

impl<T> Surface for T where
    T: ItemSurface + SelectionSurface + FilterSurface + NavigationSurface + WidgetSurface
{
}

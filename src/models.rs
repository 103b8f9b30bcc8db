//! Frontend Models
//!
//! Identifiers, presentation flags and history payloads shared by the engines.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable primary key of a selectable/filterable item
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    /// Trimmed identifier, or `None` for blank input
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Presentation flags, carried as classes on item nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flag {
    Selected,
    Pending,
    Matched,
}

impl Flag {
    pub fn class_name(self) -> &'static str {
        match self {
            Flag::Selected => "selected",
            Flag::Pending => "pending",
            Flag::Matched => "matched",
        }
    }
}

/// Piece of an item name after tokenizing against the filter query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub text: String,
    pub matched: bool,
}

impl Span {
    pub fn plain(text: impl Into<String>) -> Self {
        Self { text: text.into(), matched: false }
    }

    pub fn matched(text: impl Into<String>) -> Self {
        Self { text: text.into(), matched: true }
    }
}

/// History state payload.
///
/// Filter checkpoints carry the query; navigation entries only the URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryCheckpoint {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryOp {
    Push(HistoryCheckpoint),
    Replace(HistoryCheckpoint),
}

impl HistoryOp {
    pub fn checkpoint(&self) -> &HistoryCheckpoint {
        match self {
            HistoryOp::Push(cp) | HistoryOp::Replace(cp) => cp,
        }
    }
}

/// Behavior attached to a node by a rebind pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    /// Click on an item toggles its membership
    ToggleItem(ItemId),
    /// Select every selectable item; `url` overrides the configured endpoint
    SelectAll { url: Option<String> },
    /// Clear the selection; `follow` lets the link navigate as well
    ClearSelection { follow: bool },
    /// Post to a link inside the selection region
    SelectionAction { url: String, item: Option<ItemId> },
    /// Fetch a replacement for a single item node
    ItemAction { item: ItemId, url: String },
    /// Partial navigation to an absolute URL
    Navigate { url: String },
    /// Submit, input and change events of the filter form
    FilterForm,
    /// Hide a flash message on click
    DismissMessage,
    /// Drag-reorder the container's rows, posting the order to `url`
    Reorder { url: String },
}

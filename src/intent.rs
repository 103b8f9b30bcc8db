//! Intents and Effects
//!
//! Bound handlers turn user actions into `Intent`s. The authority applies
//! them and answers with `Effect`s the browser shell carries out.

use crate::error::SyncError;
use crate::fetch::FragmentRequest;
use crate::models::{Binding, HistoryCheckpoint, HistoryOp, ItemId};

/// What a request was for; decides where its response goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Purpose {
    Selection,
    ItemAction(ItemId),
    Navigation,
    ShortlistOrder,
}

/// Attached to every outgoing request and echoed back in `Intent::Settled`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    pub seq: u64,
    pub purpose: Purpose,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Toggle(ItemId),
    SelectAll { url: Option<String> },
    ClearSelection,
    SelectionAction { url: String, item: Option<ItemId> },
    ItemAction { item: ItemId, url: String },
    QueryInput { value: String, commit: bool },
    DebounceElapsed(u64),
    Navigate(String),
    PopState { state: Option<HistoryCheckpoint>, location: String },
    LoadingDelayElapsed(u64),
    ShortlistReordered { url: String, order: Vec<String> },
    Settled { ticket: Ticket, result: Result<String, SyncError> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Request { ticket: Ticket, request: FragmentRequest },
    /// Replace any pending debounce timer
    ScheduleDebounce { generation: u64, delay_ms: u32 },
    ScheduleLoading { seq: u64, delay_ms: u32 },
    ShowLoading,
    HideLoading,
    History(HistoryOp),
    Notice(String),
    Alert(String),
    FullLoad(String),
}

impl Binding {
    /// Intent raised when the bound node is activated.
    ///
    /// `FilterForm`, `DismissMessage` and `Reorder` are driven by the shell's
    /// own listeners and raise nothing here.
    pub fn activate(&self) -> Option<Intent> {
        match self {
            Binding::ToggleItem(id) => Some(Intent::Toggle(id.clone())),
            Binding::SelectAll { url } => Some(Intent::SelectAll { url: url.clone() }),
            Binding::ClearSelection { .. } => Some(Intent::ClearSelection),
            Binding::SelectionAction { url, item } => Some(Intent::SelectionAction {
                url: url.clone(),
                item: item.clone(),
            }),
            Binding::ItemAction { item, url } => Some(Intent::ItemAction {
                item: item.clone(),
                url: url.clone(),
            }),
            Binding::Navigate { url } => Some(Intent::Navigate(url.clone())),
            Binding::FilterForm | Binding::DismissMessage | Binding::Reorder { .. } => None,
        }
    }

    /// Whether activation cancels the node's default action
    pub fn prevents_default(&self) -> bool {
        !matches!(self, Binding::ClearSelection { follow: true })
    }
}

impl Effect {
    pub fn ticket(&self) -> Option<&Ticket> {
        match self {
            Effect::Request { ticket, .. } => Some(ticket),
            _ => None,
        }
    }
}

//! Sync Errors
//!
//! Every failure is local to the interaction that caused it. The severity
//! decides how the authority reports it.

use std::fmt;

/// Prompt shown when the server answers with the stale-client sentinel
pub const STALE_SELECTION_PROMPT: &str =
    "This page is out of date. Please reload it before making any more changes.";

/// Prompt shown when a shortlist reorder is rejected as stale
pub const STALE_SHORTLIST_PROMPT: &str = "You've added stuff to the shortlist since you last loaded the front page. Please reload before making any more changes.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// Network unreachable or a non-2xx status (`status` is `None` for network errors)
    Transport { status: Option<u16>, message: String },
    /// The server answered `reload`
    StaleClient { prompt: String },
    /// An expected document anchor is absent; the feature does not apply here
    MissingAnchor(&'static str),
    /// Malformed auxiliary input (configuration, metadata)
    MalformedInput { what: String, cause: String },
}

/// How a failure reaches the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Log only
    Silent,
    /// Non-blocking notice
    Notice,
    /// Blocking alert
    Blocking,
}

impl SyncError {
    pub fn network(message: impl Into<String>) -> Self {
        SyncError::Transport { status: None, message: message.into() }
    }

    pub fn status(status: u16, message: impl Into<String>) -> Self {
        SyncError::Transport { status: Some(status), message: message.into() }
    }

    pub fn stale(prompt: &str) -> Self {
        SyncError::StaleClient { prompt: prompt.to_string() }
    }

    pub fn malformed(what: impl Into<String>, cause: impl fmt::Display) -> Self {
        SyncError::MalformedInput { what: what.into(), cause: cause.to_string() }
    }

    pub fn severity(&self) -> Severity {
        match self {
            SyncError::Transport { .. } => Severity::Notice,
            SyncError::StaleClient { .. } | SyncError::MalformedInput { .. } => Severity::Blocking,
            SyncError::MissingAnchor(_) => Severity::Silent,
        }
    }

    /// Text for the notice or alert
    pub fn user_message(&self) -> String {
        match self {
            SyncError::StaleClient { prompt } => prompt.clone(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::Transport { status: Some(status), message } => {
                write!(f, "request failed with status {status}: {message}")
            }
            SyncError::Transport { status: None, message } => {
                write!(f, "could not reach the server: {message}")
            }
            SyncError::StaleClient { prompt } => write!(f, "stale client: {prompt}"),
            SyncError::MissingAnchor(anchor) => write!(f, "no {anchor} on this page"),
            SyncError::MalformedInput { what, cause } => write!(f, "malformed {what}: {cause}"),
        }
    }
}

impl std::error::Error for SyncError {}

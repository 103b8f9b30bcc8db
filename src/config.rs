//! Runtime Configuration
//!
//! Read from a JSON island in the page:
//! `<script type="application/json" id="vote-sync-config">{...}</script>`.
//! Every field is optional; anything omitted keeps its default.

use serde::{Deserialize, Serialize};

use crate::error::SyncError;

/// Element id of the configuration island
pub const CONFIG_ELEMENT_ID: &str = "vote-sync-config";

/// What to do with a selection response older than the last applied one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StalePolicy {
    /// Last response to arrive wins
    #[default]
    Apply,
    /// Drop responses whose request predates the last applied one
    Ignore,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub selection: String,
    pub select: String,
    pub deselect: String,
    pub select_all: String,
    pub clear_selection: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            selection: "/do/selection/".to_string(),
            select: "/do/select/".to_string(),
            deselect: "/do/deselect/".to_string(),
            select_all: "/do/select_all/".to_string(),
            clear_selection: "/do/clear_selection/".to_string(),
        }
    }
}

/// CSS selectors the browser document uses to find its anchors
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Selectors {
    /// Region replaced by partial navigation
    pub content_region: String,
    /// Region replaced by selection fragments
    pub selection_region: String,
    /// Expandable part of the selection region whose open state survives swaps
    pub selection_details: String,
    /// Any node representing an item
    pub item: String,
    /// Items that can be toggled by clicking
    pub selectable: String,
    pub select_all: String,
    pub mass_vote: String,
    pub item_post: String,
    pub selection_post: String,
    /// Per-item links whose response replaces the item node
    pub item_action: String,
    pub filter_form: String,
    pub filter_group: String,
    pub filter_item: String,
    pub messages: String,
    pub shortlist: String,
    /// Links never handled by partial navigation
    pub no_partial: String,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            content_region: "#everything".to_string(),
            selection_region: "#selection".to_string(),
            selection_details: "#selection details".to_string(),
            item: "[data-item-id]".to_string(),
            selectable: ".track.selectable[data-item-id]".to_string(),
            select_all: "a.select_all".to_string(),
            mass_vote: "a.mass_vote".to_string(),
            item_post: "a.track_jspost".to_string(),
            selection_post: "a.selection_jspost".to_string(),
            item_action: ".ajaxable".to_string(),
            filter_form: "#category-search-form".to_string(),
            filter_group: ".browsable-groups section".to_string(),
            filter_item: "ul > li".to_string(),
            messages: ".messages".to_string(),
            shortlist: "#shortlist".to_string(),
            no_partial: "[data-no-partial], .ajaxable, a.select_all, a.mass_vote, a.track_jspost, a.selection_jspost".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub csrf_cookie: String,
    pub csrf_header: String,
    pub endpoints: Endpoints,
    pub selectors: Selectors,
    /// Attribute holding an item's identifier
    pub item_id_attribute: String,
    /// Attribute holding an item's plain display name
    pub item_name_attribute: String,
    /// Repeated form field carrying item identifiers
    pub id_field: String,
    /// Repeated form field carrying the shortlist order
    pub shortlist_field: String,
    /// Attribute of shortlist rows holding their key
    pub shortlist_key_attribute: String,
    /// Attribute of the shortlist container holding the order endpoint
    pub shortlist_url_attribute: String,
    pub debounce_ms: u32,
    pub loading_delay_ms: u32,
    pub loading_rotate_ms: u32,
    pub loading_messages: Vec<String>,
    pub highlight_matches: bool,
    pub stale_responses: StalePolicy,
    /// Query parameter appended to item action URLs
    pub item_action_param: (String, String),
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            csrf_cookie: "csrftoken".to_string(),
            csrf_header: "X-CSRFToken".to_string(),
            endpoints: Endpoints::default(),
            selectors: Selectors::default(),
            item_id_attribute: "data-item-id".to_string(),
            item_name_attribute: "data-name".to_string(),
            id_field: "track_id[]".to_string(),
            shortlist_field: "shortlist[]".to_string(),
            shortlist_key_attribute: "data-shortlist-pk".to_string(),
            shortlist_url_attribute: "data-order-url".to_string(),
            debounce_ms: 300,
            loading_delay_ms: 250,
            loading_rotate_ms: 1500,
            loading_messages: vec![
                "loading".to_string(),
                "still loading".to_string(),
                "asking the server nicely".to_string(),
                "any moment now".to_string(),
            ],
            highlight_matches: true,
            stale_responses: StalePolicy::Apply,
            item_action_param: ("ajax".to_string(), "yeah".to_string()),
        }
    }
}

impl SyncConfig {
    /// Parse the configuration island; missing fields keep their defaults
    pub fn from_json(raw: &str) -> Result<Self, SyncError> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(raw).map_err(|e| SyncError::malformed("configuration", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.debounce_ms, 300);
        assert_eq!(config.csrf_header, "X-CSRFToken");
        assert_eq!(config.stale_responses, StalePolicy::Apply);
        assert_eq!(config.endpoints.select, "/do/select/");
    }

    #[test]
    fn test_partial_override() {
        let config = SyncConfig::from_json(
            r#"{"debounce_ms": 150, "endpoints": {"select": "/vote/select/"}, "stale_responses": "ignore"}"#,
        )
        .unwrap();
        assert_eq!(config.debounce_ms, 150);
        assert_eq!(config.endpoints.select, "/vote/select/");
        assert_eq!(config.endpoints.deselect, "/do/deselect/");
        assert_eq!(config.stale_responses, StalePolicy::Ignore);
        assert_eq!(config.csrf_cookie, "csrftoken");
    }

    #[test]
    fn test_blank_island_is_default() {
        assert_eq!(SyncConfig::from_json("  \n").unwrap(), SyncConfig::default());
    }

    #[test]
    fn test_malformed_island() {
        let err = SyncConfig::from_json("{\"debounce_ms\": ").unwrap_err();
        assert!(matches!(err, SyncError::MalformedInput { ref what, .. } if what == "configuration"));

        let err = SyncConfig::from_json(r#"{"stale_responses": "sometimes"}"#).unwrap_err();
        assert!(matches!(err, SyncError::MalformedInput { .. }));
    }
}

//! UI Components
//!
//! Leptos components mounted beside the server-rendered page.

mod status_overlay;

pub use status_overlay::{LoadingBanner, NoticeList, StatusOverlay};

//! Browser Document
//!
//! The live page as a document surface. Nodes are `web_sys::Element`s found
//! with the configured selectors; bindings are gloo event listeners (and
//! reorder handles) that are dropped, and so detached, on release.

use gloo_events::{EventListener, EventListenerOptions};
use leptos_dragdrop::{bind_reorderable, ReorderHandle};
use tracing::{debug, warn};
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, Event, HtmlAnchorElement, HtmlDetailsElement, HtmlInputElement, MouseEvent};

use crate::config::{SyncConfig, CONFIG_ELEMENT_ID};
use crate::error::SyncError;
use crate::intent::Intent;
use crate::models::{Binding, Flag, ItemId, Span};
use crate::navigation::LinkActivation;
use crate::runtime::dispatch;
use crate::surface::{
    FilterForm, FilterSurface, ItemSurface, NavigationSurface, NodeSurface, SelectionSurface,
    WidgetSurface,
};

/// Class of highlighted name fragments
const FRAGMENT_CLASS: &str = "fragment";

/// Read the configuration island. A malformed island yields the defaults
/// and the error to report.
pub fn load_config(document: &Document) -> (SyncConfig, Option<SyncError>) {
    let raw = document
        .get_element_by_id(CONFIG_ELEMENT_ID)
        .and_then(|el| el.text_content())
        .unwrap_or_default();
    match SyncConfig::from_json(&raw) {
        Ok(config) => (config, None),
        Err(err) => (SyncConfig::default(), Some(err)),
    }
}

pub struct BrowserDocument {
    document: Document,
    config: SyncConfig,
    listeners: Vec<EventListener>,
    reorders: Vec<ReorderHandle>,
}

impl BrowserDocument {
    pub fn new(document: Document, config: SyncConfig) -> Self {
        Self { document, config, listeners: Vec::new(), reorders: Vec::new() }
    }

    fn query(&self, selector: &str) -> Option<Element> {
        self.document.query_selector(selector).ok().flatten()
    }

    fn query_all(&self, selector: &str) -> Vec<Element> {
        collect_elements(self.document.query_selector_all(selector))
    }

    fn href(link: &Element) -> Option<String> {
        link.get_attribute("href")?;
        link.dyn_ref::<HtmlAnchorElement>().map(HtmlAnchorElement::href)
    }

    fn filter_input(&self) -> Option<HtmlInputElement> {
        self.query(&self.config.selectors.filter_form)?
            .query_selector("input")
            .ok()
            .flatten()?
            .dyn_into::<HtmlInputElement>()
            .ok()
    }

    fn on_click<F>(&mut self, node: &Element, callback: F)
    where
        F: FnMut(&Event) + 'static,
    {
        let listener =
            EventListener::new_with_options(node, "click", EventListenerOptions::enable_prevent_default(), callback);
        self.listeners.push(listener);
    }

    fn bind_filter_form(&mut self, form: &Element) {
        let Some(input) = form
            .query_selector("input")
            .ok()
            .flatten()
            .and_then(|el| el.dyn_into::<HtmlInputElement>().ok())
        else {
            debug!(target: "browser", "filter form has no input");
            return;
        };

        let submitted = input.clone();
        self.listeners.push(EventListener::new_with_options(
            form,
            "submit",
            EventListenerOptions::enable_prevent_default(),
            move |event| {
                event.prevent_default();
                dispatch(Intent::QueryInput { value: submitted.value(), commit: true });
            },
        ));
        let typed = input.clone();
        self.listeners.push(EventListener::new(&input, "input", move |_| {
            dispatch(Intent::QueryInput { value: typed.value(), commit: false });
        }));
        let changed = input.clone();
        self.listeners.push(EventListener::new(&input, "change", move |_| {
            dispatch(Intent::QueryInput { value: changed.value(), commit: true });
        }));
    }

    fn bind_navigation(&mut self, node: &Element, url: String) {
        let link = node.clone();
        self.on_click(node, move |event| {
            let Some(mouse) = event.dyn_ref::<MouseEvent>() else {
                return;
            };
            let current = web_sys::window()
                .and_then(|w| w.location().href().ok())
                .unwrap_or_default();
            let target = link.get_attribute("target");
            let activation = LinkActivation {
                button: mouse.button(),
                modifiers: mouse.ctrl_key() || mouse.meta_key() || mouse.shift_key() || mouse.alt_key(),
                target: target.as_deref(),
                download: link.has_attribute("download"),
                href: &url,
                current: &current,
                opted_out: false,
            };
            if activation.should_intercept() && !event.default_prevented() {
                event.prevent_default();
                dispatch(Intent::Navigate(url.clone()));
            }
        });
    }
}

fn collect_elements(list: Result<web_sys::NodeList, wasm_bindgen::JsValue>) -> Vec<Element> {
    let Ok(list) = list else {
        return Vec::new();
    };
    (0..list.length())
        .filter_map(|i| list.item(i))
        .filter_map(|node| node.dyn_into::<Element>().ok())
        .collect()
}

impl NodeSurface for BrowserDocument {
    type Node = Element;

    fn has_flag(&self, node: &Element, flag: Flag) -> bool {
        node.class_list().contains(flag.class_name())
    }

    fn set_flag(&mut self, node: &Element, flag: Flag, on: bool) {
        let classes = node.class_list();
        let result = if on {
            classes.add_1(flag.class_name())
        } else {
            classes.remove_1(flag.class_name())
        };
        if result.is_err() {
            warn!(target: "browser", flag = flag.class_name(), "could not update class");
        }
    }

    fn bind(&mut self, node: &Element, binding: Binding) {
        match binding {
            Binding::FilterForm => self.bind_filter_form(node),
            Binding::Navigate { url } => self.bind_navigation(node, url),
            Binding::DismissMessage => {
                let message = node.clone();
                self.listeners.push(EventListener::new(node, "click", move |_| {
                    let _ = message.class_list().add_1("dismissed");
                }));
            }
            Binding::Reorder { url } => {
                let key_attr = self.config.shortlist_key_attribute.clone();
                let handle = bind_reorderable(node, &key_attr, move |order| {
                    dispatch(Intent::ShortlistReordered { url: url.clone(), order });
                });
                match handle {
                    Some(handle) => self.reorders.push(handle),
                    None => warn!(target: "browser", "shortlist could not be made reorderable"),
                }
            }
            Binding::ToggleItem(_) => {
                let Some(intent) = binding.activate() else {
                    return;
                };
                self.on_click(node, move |event| {
                    // clicks on links inside the item keep their own meaning
                    let on_link = event
                        .target()
                        .and_then(|t| t.dyn_into::<Element>().ok())
                        .and_then(|el| el.closest("a").ok().flatten())
                        .is_some();
                    if !on_link {
                        dispatch(intent.clone());
                    }
                });
            }
            other => {
                let Some(intent) = other.activate() else {
                    return;
                };
                let prevent = other.prevents_default();
                let stop = matches!(other, Binding::ItemAction { .. });
                self.on_click(node, move |event| {
                    if prevent {
                        event.prevent_default();
                    }
                    if stop {
                        event.stop_propagation();
                    }
                    dispatch(intent.clone());
                });
            }
        }
    }

    fn release_bindings(&mut self) {
        debug!(
            target: "browser",
            listeners = self.listeners.len(),
            reorders = self.reorders.len(),
            "releasing bindings"
        );
        self.listeners.clear();
        self.reorders.clear();
    }

    fn location(&self) -> String {
        self.document
            .location()
            .and_then(|l| l.href().ok())
            .unwrap_or_default()
    }
}

impl ItemSurface for BrowserDocument {
    fn item_nodes(&self) -> Vec<Element> {
        self.query_all(&self.config.selectors.item)
    }

    fn item_id(&self, node: &Element) -> Option<ItemId> {
        node.get_attribute(&self.config.item_id_attribute)
            .and_then(|raw| ItemId::parse(&raw))
    }

    fn is_selectable(&self, node: &Element) -> bool {
        node.matches(&self.config.selectors.selectable).unwrap_or(false)
    }

    fn item_actions(&self) -> Vec<(Element, ItemId, String)> {
        self.query_all(&self.config.selectors.item_action)
            .into_iter()
            .filter_map(|link| {
                let host = link.closest(&self.config.selectors.item).ok().flatten()?;
                let id = self.item_id(&host)?;
                let url = Self::href(&link)?;
                Some((link, id, url))
            })
            .collect()
    }

    fn action_hosts(&self, id: &ItemId) -> Vec<Element> {
        self.item_nodes()
            .into_iter()
            .filter(|node| self.item_id(node).as_ref() == Some(id))
            .filter(|node| {
                node.query_selector(&self.config.selectors.item_action)
                    .ok()
                    .flatten()
                    .is_some()
            })
            .collect()
    }

    fn replace_item(&mut self, id: &ItemId, markup: &str) -> Result<(), SyncError> {
        let hosts = self.action_hosts(id);
        if hosts.is_empty() {
            return Err(SyncError::MissingAnchor("item"));
        }
        for host in hosts {
            host.set_outer_html(markup);
        }
        Ok(())
    }
}

impl SelectionSurface for BrowserDocument {
    fn replace_selection(&mut self, markup: &str) -> Result<(), SyncError> {
        let region = self
            .query(&self.config.selectors.selection_region)
            .ok_or(SyncError::MissingAnchor("selection region"))?;
        region.set_inner_html(markup);
        Ok(())
    }

    fn selection_ids(&self) -> Vec<ItemId> {
        let Some(region) = self.query(&self.config.selectors.selection_region) else {
            return Vec::new();
        };
        collect_elements(region.query_selector_all(&self.config.selectors.item))
            .iter()
            .filter_map(|node| self.item_id(node))
            .collect()
    }

    fn selection_details_open(&self) -> Option<bool> {
        self.query(&self.config.selectors.selection_details)?
            .dyn_into::<HtmlDetailsElement>()
            .ok()
            .map(|details| details.open())
    }

    fn set_selection_details_open(&mut self, open: bool) {
        if let Some(details) = self
            .query(&self.config.selectors.selection_details)
            .and_then(|el| el.dyn_into::<HtmlDetailsElement>().ok())
        {
            details.set_open(open);
        }
    }

    fn selection_controls(&self) -> Vec<(Element, Binding)> {
        let selectors = &self.config.selectors;
        let mut controls = Vec::new();

        for link in self.query_all(&selectors.select_all) {
            let url = Self::href(&link);
            controls.push((link, Binding::SelectAll { url }));
        }
        for link in self.query_all(&selectors.mass_vote) {
            controls.push((link, Binding::ClearSelection { follow: true }));
        }
        for link in self.query_all(&selectors.item_post) {
            let Some(url) = Self::href(&link) else { continue };
            let item = link
                .closest(&selectors.item)
                .ok()
                .flatten()
                .and_then(|host| self.item_id(&host));
            controls.push((link, Binding::SelectionAction { url, item }));
        }
        for link in self.query_all(&selectors.selection_post) {
            let Some(url) = Self::href(&link) else { continue };
            controls.push((link, Binding::SelectionAction { url, item: None }));
        }
        controls
    }
}

impl FilterSurface for BrowserDocument {
    fn filter_form(&self) -> Option<FilterForm<Element>> {
        let node = self.query(&self.config.selectors.filter_form)?;
        let input = self.filter_input()?;
        let param = match input.name() {
            name if name.is_empty() => "q".to_string(),
            name => name,
        };
        Some(FilterForm { node, param, value: input.value() })
    }

    fn set_filter_input(&mut self, value: &str) {
        if let Some(input) = self.filter_input() {
            input.set_value(value);
        }
    }

    fn filter_groups(&self) -> Vec<Element> {
        self.query_all(&self.config.selectors.filter_group)
    }

    fn group_items(&self, group: &Element) -> Vec<Element> {
        collect_elements(group.query_selector_all(&self.config.selectors.filter_item))
    }

    fn item_name(&self, node: &Element) -> Option<String> {
        node.get_attribute(&self.config.item_name_attribute)
    }

    fn render_name(&mut self, node: &Element, spans: &[Span]) {
        let target = node.query_selector("a").ok().flatten().unwrap_or_else(|| node.clone());
        target.set_text_content(None);
        for span in spans {
            let piece: web_sys::Node = if span.matched {
                match self.document.create_element("span") {
                    Ok(el) => {
                        el.set_class_name(FRAGMENT_CLASS);
                        el.set_text_content(Some(&span.text));
                        el.into()
                    }
                    Err(_) => self.document.create_text_node(&span.text).into(),
                }
            } else {
                self.document.create_text_node(&span.text).into()
            };
            if target.append_child(&piece).is_err() {
                warn!(target: "browser", "could not render item name");
                return;
            }
        }
    }

    fn set_group_has_matches(&mut self, group: &Element, has_matches: bool) {
        let value = if has_matches { "true" } else { "" };
        let _ = group.set_attribute("data-contains-matches", value);
    }
}

impl NavigationSurface for BrowserDocument {
    fn replace_content(&mut self, markup: &str) -> Result<(), SyncError> {
        let region = self
            .query(&self.config.selectors.content_region)
            .ok_or(SyncError::MissingAnchor("content region"))?;
        region.set_inner_html(markup);
        Ok(())
    }

    fn navigation_links(&self) -> Vec<(Element, String)> {
        let opt_out = &self.config.selectors.no_partial;
        self.query_all("a[href]")
            .into_iter()
            .filter(|link| !link.matches(opt_out).unwrap_or(false))
            .filter_map(|link| {
                let url = Self::href(&link)?;
                Some((link, url))
            })
            .collect()
    }
}

impl WidgetSurface for BrowserDocument {
    fn messages(&self) -> Vec<Element> {
        self.query_all(&self.config.selectors.messages)
    }

    fn shortlist(&self) -> Option<(Element, String)> {
        let container = self.query(&self.config.selectors.shortlist)?;
        let url = container
            .get_attribute(&self.config.shortlist_url_attribute)
            .or_else(|| {
                self.document
                    .get_element_by_id("shortlist-order-url")
                    .and_then(|el| el.text_content())
            })
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())?;
        Some((container, url))
    }
}

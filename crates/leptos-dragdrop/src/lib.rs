//! Leptos DragDrop Utilities
//!
//! Mouse-driven reordering of server-rendered lists.
//! Uses movement threshold to distinguish click from drag and reports the
//! final key order on drop.

use leptos::prelude::*;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;

/// Where the dragged row lands
#[derive(Clone, Debug, PartialEq)]
pub enum DropTarget {
    /// Insert before the row with this key
    Before(String),
    /// Append after the last row
    End,
}

/// DnD state signals
#[derive(Clone, Copy)]
pub struct DndSignals {
    pub dragging_key_read: ReadSignal<Option<String>>,
    pub dragging_key_write: WriteSignal<Option<String>>,
    pub drop_target_read: ReadSignal<Option<DropTarget>>,
    pub drop_target_write: WriteSignal<Option<DropTarget>>,
    /// Pending key (mousedown but not yet dragging)
    pub pending_key_read: ReadSignal<Option<String>>,
    pub pending_key_write: WriteSignal<Option<String>>,
    /// Start position for movement detection
    pub start_x_read: ReadSignal<i32>,
    pub start_x_write: WriteSignal<i32>,
    pub start_y_read: ReadSignal<i32>,
    pub start_y_write: WriteSignal<i32>,
}

/// Movement threshold in pixels to start dragging
const DRAG_THRESHOLD_PX: i32 = 5;

/// Class set on the row while it is being dragged
const DRAGGING_CLASS: &str = "dragging";

pub fn create_dnd_signals() -> DndSignals {
    let (dragging_key_read, dragging_key_write) = signal(None::<String>);
    let (drop_target_read, drop_target_write) = signal(None::<DropTarget>);
    let (pending_key_read, pending_key_write) = signal(None::<String>);
    let (start_x_read, start_x_write) = signal(0i32);
    let (start_y_read, start_y_write) = signal(0i32);
    DndSignals {
        dragging_key_read,
        dragging_key_write,
        drop_target_read,
        drop_target_write,
        pending_key_read,
        pending_key_write,
        start_x_read,
        start_x_write,
        start_y_read,
        start_y_write,
    }
}

/// True once the pointer has moved far enough to count as a drag
pub fn exceeds_threshold(dx: i32, dy: i32) -> bool {
    dx.abs() > DRAG_THRESHOLD_PX || dy.abs() > DRAG_THRESHOLD_PX
}

/// Compute the order after moving `dragged` to `target`.
///
/// Returns `None` when the key is unknown or the order would not change.
pub fn reorder(keys: &[String], dragged: &str, target: &DropTarget) -> Option<Vec<String>> {
    let from = keys.iter().position(|k| k == dragged)?;
    if matches!(target, DropTarget::Before(k) if k == dragged) {
        return None;
    }

    let mut order: Vec<String> = keys.to_vec();
    let moved = order.remove(from);
    let to = match target {
        DropTarget::Before(key) => order.iter().position(|k| k == key)?,
        DropTarget::End => order.len(),
    };
    order.insert(to, moved);

    if order.as_slice() == keys {
        None
    } else {
        Some(order)
    }
}

/// End drag operation
pub fn end_drag(dnd: &DndSignals) {
    dnd.dragging_key_write.set(None);
    dnd.drop_target_write.set(None);
    dnd.pending_key_write.set(None);
}

// ========================
// DOM Binding
// ========================

type MouseClosure = Closure<dyn FnMut(web_sys::MouseEvent)>;

/// Listeners attached by [`bind_reorderable`]; dropping the handle detaches them
pub struct ReorderHandle {
    listeners: Vec<(web_sys::EventTarget, &'static str, MouseClosure)>,
}

impl Drop for ReorderHandle {
    fn drop(&mut self) {
        for (target, event, closure) in self.listeners.drain(..) {
            let _ = target.remove_event_listener_with_callback(event, closure.as_ref().unchecked_ref());
        }
    }
}

/// Keys of the container's rows, in document order
fn row_keys(container: &web_sys::Element, key_attr: &str) -> Vec<String> {
    let mut keys = Vec::new();
    let children = container.children();
    for i in 0..children.length() {
        if let Some(key) = children.item(i).and_then(|row| row.get_attribute(key_attr)) {
            keys.push(key);
        }
    }
    keys
}

/// Keyed row of `container` under the event target, if any
fn row_at(target: Option<web_sys::EventTarget>, container: &web_sys::Element, key_attr: &str) -> Option<web_sys::Element> {
    let element = target?.dyn_into::<web_sys::Element>().ok()?;
    let row = element.closest(&format!("[{key_attr}]")).ok()??;
    let parent = row.parent_element()?;
    if parent.is_same_node(Some(container.as_ref())) { Some(row) } else { None }
}

/// Drop target for a pointer over `row`: before it in its upper half, after it otherwise
fn target_for(row: &web_sys::Element, client_y: i32, key_attr: &str) -> Option<DropTarget> {
    let rect = row.get_bounding_client_rect();
    let upper = f64::from(client_y) < rect.top() + rect.height() / 2.0;
    if upper {
        return row.get_attribute(key_attr).map(DropTarget::Before);
    }
    let mut next = row.next_element_sibling();
    while let Some(sibling) = next {
        if let Some(key) = sibling.get_attribute(key_attr) {
            return Some(DropTarget::Before(key));
        }
        next = sibling.next_element_sibling();
    }
    Some(DropTarget::End)
}

/// Move the dragged row in the DOM to match the drop target
fn move_row(container: &web_sys::Element, key_attr: &str, dragged: &str, target: &DropTarget) {
    let find = |key: &str| container.query_selector(&format!("[{key_attr}=\"{key}\"]")).ok().flatten();
    let Some(row) = find(dragged) else { return };
    let _ = row.class_list().remove_1(DRAGGING_CLASS);
    let anchor = match target {
        DropTarget::Before(key) => find(key),
        DropTarget::End => None,
    };
    let _ = container.insert_before(&row, anchor.as_deref());
}

/// Make the keyed children of `container` reorderable by mouse.
///
/// `on_reorder` receives the complete key order after every drop that
/// changed it. Clicks that never pass the movement threshold are left alone.
pub fn bind_reorderable<F>(container: &web_sys::Element, key_attr: &str, on_reorder: F) -> Option<ReorderHandle>
where
    F: Fn(Vec<String>) + 'static,
{
    let document = web_sys::window()?.document()?;
    let dnd = create_dnd_signals();
    let key_attr = key_attr.to_string();
    let mut listeners: Vec<(web_sys::EventTarget, &'static str, MouseClosure)> = Vec::new();

    // Mousedown on a row records a pending drag with position
    let on_mousedown = {
        let container = container.clone();
        let key_attr = key_attr.clone();
        Closure::<dyn FnMut(web_sys::MouseEvent)>::new(move |ev: web_sys::MouseEvent| {
            if ev.button() != 0 { return; }
            if let Some(target) = ev.target() {
                // Ignore if target is input, button or link
                if target.dyn_ref::<web_sys::HtmlInputElement>().is_some() { return; }
                if target.dyn_ref::<web_sys::HtmlButtonElement>().is_some() { return; }
                if target.dyn_ref::<web_sys::HtmlAnchorElement>().is_some() { return; }
            }
            if let Some(key) = row_at(ev.target(), &container, &key_attr).and_then(|row| row.get_attribute(&key_attr)) {
                dnd.pending_key_write.set(Some(key));
                dnd.start_x_write.set(ev.client_x());
                dnd.start_y_write.set(ev.client_y());
            }
        })
    };
    let _ = container.add_event_listener_with_callback("mousedown", on_mousedown.as_ref().unchecked_ref());
    listeners.push((container.clone().into(), "mousedown", on_mousedown));

    // Mousemove starts the drag past the threshold, then tracks the drop target
    let on_mousemove = {
        let container = container.clone();
        let key_attr = key_attr.clone();
        Closure::<dyn FnMut(web_sys::MouseEvent)>::new(move |ev: web_sys::MouseEvent| {
            let pending = dnd.pending_key_read.get_untracked();
            if pending.is_some() && dnd.dragging_key_read.get_untracked().is_none() {
                let dx = ev.client_x() - dnd.start_x_read.get_untracked();
                let dy = ev.client_y() - dnd.start_y_read.get_untracked();
                if exceeds_threshold(dx, dy) {
                    if let Some(key) = &pending {
                        if let Ok(Some(row)) = container.query_selector(&format!("[{key_attr}=\"{key}\"]")) {
                            let _ = row.class_list().add_1(DRAGGING_CLASS);
                        }
                    }
                    dnd.dragging_key_write.set(pending);
                }
            }
            if dnd.dragging_key_read.get_untracked().is_some() {
                ev.prevent_default();
                let target = row_at(ev.target(), &container, &key_attr)
                    .and_then(|row| target_for(&row, ev.client_y(), &key_attr));
                if target.is_some() {
                    dnd.drop_target_write.set(target);
                }
            }
        })
    };
    let _ = document.add_event_listener_with_callback("mousemove", on_mousemove.as_ref().unchecked_ref());
    listeners.push((document.clone().into(), "mousemove", on_mousemove));

    // Mouseup drops, reorders the DOM and reports the order
    let on_mouseup = {
        let container = container.clone();
        Closure::<dyn FnMut(web_sys::MouseEvent)>::new(move |_ev: web_sys::MouseEvent| {
            let dragging = dnd.dragging_key_read.get_untracked();
            let target = dnd.drop_target_read.get_untracked();
            end_drag(&dnd);

            // Not dragging: the click event fires naturally on the element
            let (Some(dragged), Some(target)) = (dragging, target) else {
                if let Ok(Some(row)) = container.query_selector(&format!(".{DRAGGING_CLASS}")) {
                    let _ = row.class_list().remove_1(DRAGGING_CLASS);
                }
                return;
            };
            let keys = row_keys(&container, &key_attr);
            move_row(&container, &key_attr, &dragged, &target);
            if let Some(order) = reorder(&keys, &dragged, &target) {
                on_reorder(order);
            }
        })
    };
    let _ = document.add_event_listener_with_callback("mouseup", on_mouseup.as_ref().unchecked_ref());
    listeners.push((document.into(), "mouseup", on_mouseup));

    Some(ReorderHandle { listeners })
}

use std::rc::Weak;

use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Element, Event, EventTarget, GamepadEvent, HtmlElement, KeyboardEvent};

use crate::app::App;

const TEXT_ENTRY_TAGS: [&str; 3] = ["INPUT", "TEXTAREA", "SELECT"];
const ANONYMOUS_TEXT_SURFACE: &str = "text:anonymous";

pub(crate) struct EventListener {
    target: EventTarget,
    kind: &'static str,
    callback: Closure<dyn FnMut(Event)>,
}

impl EventListener {
    pub(crate) fn new(
        target: &EventTarget,
        kind: &'static str,
        handler: impl FnMut(Event) + 'static,
    ) -> Result<Self, JsValue> {
        let callback = Closure::wrap(Box::new(handler) as Box<dyn FnMut(Event)>);
        target.add_event_listener_with_callback(kind, callback.as_ref().unchecked_ref())?;
        Ok(Self {
            target: target.clone(),
            kind,
            callback,
        })
    }
}

impl Drop for EventListener {
    fn drop(&mut self) {
        let _ = self
            .target
            .remove_event_listener_with_callback(self.kind, self.callback.as_ref().unchecked_ref());
    }
}

pub(crate) fn is_text_entry(tag_name: &str, content_editable: bool) -> bool {
    content_editable
        || TEXT_ENTRY_TAGS
            .iter()
            .any(|tag| tag.eq_ignore_ascii_case(tag_name))
}

/// Router id for a focused text entry. Elements without an `id` share one
/// surface, which is safe because `focusout` precedes the next `focusin`.
pub(crate) fn text_surface_id(element_id: &str) -> String {
    if element_id.is_empty() {
        ANONYMOUS_TEXT_SURFACE.to_string()
    } else {
        format!("text:{element_id}")
    }
}

fn text_entry_target(event: &Event) -> Option<String> {
    let element = event.target()?.dyn_into::<Element>().ok()?;
    let editable = element
        .dyn_ref::<HtmlElement>()
        .map(HtmlElement::is_content_editable)
        .unwrap_or(false);
    if !is_text_entry(&element.tag_name(), editable) {
        return None;
    }
    Some(text_surface_id(&element.id()))
}

pub(crate) fn install(
    app: Weak<App>,
    window: &web_sys::Window,
    route_keyboard: bool,
) -> Result<Vec<EventListener>, JsValue> {
    let window_target: &EventTarget = window.as_ref();
    let document = window
        .document()
        .ok_or_else(|| JsValue::from_str("window has no document"))?;
    let document_target: &EventTarget = document.as_ref();
    let mut listeners = Vec::new();

    let weak = app.clone();
    listeners.push(EventListener::new(window_target, "gamepadconnected", move |event| {
        let (Some(app), Ok(event)) = (weak.upgrade(), event.dyn_into::<GamepadEvent>()) else {
            return;
        };
        if let Some(pad) = event.gamepad() {
            app.on_gamepad_connected(pad.index(), pad.buttons().length() as usize);
        }
    })?);

    let weak = app.clone();
    listeners.push(EventListener::new(window_target, "gamepaddisconnected", move |event| {
        let (Some(app), Ok(event)) = (weak.upgrade(), event.dyn_into::<GamepadEvent>()) else {
            return;
        };
        if let Some(pad) = event.gamepad() {
            app.on_gamepad_disconnected(pad.index());
        }
    })?);

    let weak = app.clone();
    listeners.push(EventListener::new(document_target, "focusin", move |event| {
        if let (Some(app), Some(surface_id)) = (weak.upgrade(), text_entry_target(&event)) {
            app.on_text_focus(&surface_id);
        }
    })?);

    let weak = app.clone();
    listeners.push(EventListener::new(document_target, "focusout", move |event| {
        if let (Some(app), Some(surface_id)) = (weak.upgrade(), text_entry_target(&event)) {
            app.on_text_blur(&surface_id);
        }
    })?);

    if route_keyboard {
        let weak = app.clone();
        listeners.push(EventListener::new(window_target, "keydown", move |event| {
            let (Some(app), Ok(event)) = (weak.upgrade(), event.dyn_into::<KeyboardEvent>()) else {
                return;
            };
            app.on_key_down(&event.code());
        })?);

        let weak = app;
        listeners.push(EventListener::new(window_target, "keyup", move |event| {
            let (Some(app), Ok(event)) = (weak.upgrade(), event.dyn_into::<KeyboardEvent>()) else {
                return;
            };
            app.on_key_up(&event.code());
        })?);
    }

    Ok(listeners)
}

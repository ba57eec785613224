//! Document and window listeners: DOM events in, session calls out.
//!
//! Click, keypress and submit must decide synchronously whether to call
//! `preventDefault`. Everything else is deferred to a microtask so it never
//! runs inside a session call (blur and focus events fire synchronously while
//! the patcher removes nodes).

use std::future::Future;

use pageturn::observe::{NAVIGATE_ATTRIBUTE, PREFETCH_ATTRIBUTE};
use pageturn::{
    ClickInput, Directive, KeyInput, LinkTarget, Modifiers, NavigateError, NavigateOutcome,
    SubmitInput,
};
use tracing::{debug, trace};
use url::Url;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;
use web_sys::{
    Element, Event, EventTarget, HtmlFormElement, KeyboardEvent, MouseEvent, PopStateEvent,
    SubmitEvent,
};

use crate::platform::BrowserForm;
use crate::session;

pub(crate) fn install(window: &web_sys::Window, document: &web_sys::Document) -> Result<(), JsValue> {
    listen(document, "click", on_click)?;
    listen(document, "keypress", on_keypress)?;
    listen(document, "submit", on_submit)?;
    for name in ["mouseover", "focusin", "touchstart"] {
        listen(document, name, on_enter)?;
    }
    for name in ["mouseout", "focusout", "touchend", "touchcancel"] {
        listen(document, name, on_leave)?;
    }
    listen(window, "popstate", on_popstate)?;
    Ok(())
}

fn listen(target: &EventTarget, name: &str, handler: fn(&Event)) -> Result<(), JsValue> {
    let closure = Closure::<dyn FnMut(Event)>::new(move |event: Event| handler(&event));
    target.add_event_listener_with_callback(name, closure.as_ref().unchecked_ref())?;
    // listeners live as long as the page
    closure.forget();
    Ok(())
}

/// The link an event happened in, with its `href` resolved against `base`
fn link_at(target: Option<EventTarget>, base: &Url) -> Option<(Element, LinkTarget)> {
    let element: Element = target?.dyn_into().ok()?;
    let anchor = element.closest("a[href], area[href]").ok()??;
    let href = anchor.get_attribute("href")?;
    let link = LinkTarget {
        url: base.join(href.trim()).ok()?,
        rel: anchor.get_attribute("rel"),
        target: anchor.get_attribute("target"),
        download: anchor.has_attribute("download"),
        navigate: Directive::parse(anchor.get_attribute(NAVIGATE_ATTRIBUTE).as_deref()),
        prefetch: Directive::parse(anchor.get_attribute(PREFETCH_ATTRIBUTE).as_deref()),
    };
    Some((anchor, link))
}

fn modifiers(ctrl: bool, alt: bool, shift: bool, meta: bool) -> Modifiers {
    Modifiers {
        ctrl,
        alt,
        shift,
        meta,
    }
}

fn drive(
    navigation: impl Future<Output = Result<NavigateOutcome, NavigateError>> + 'static,
) {
    spawn_local(async move {
        match navigation.await {
            Ok(outcome) => debug!(?outcome, "navigation finished"),
            Err(e) => debug!(error = %e, "navigation fell back"),
        }
    });
}

fn on_click(event: &Event) {
    let Some(session) = session() else { return };
    if session.is_busy() {
        return;
    }
    let Some(mouse) = event.dyn_ref::<MouseEvent>() else {
        return;
    };
    let Some((_, link)) = link_at(event.target(), &session.location()) else {
        return;
    };
    let input = ClickInput {
        default_prevented: event.default_prevented(),
        button: mouse.button(),
        modifiers: modifiers(mouse.ctrl_key(), mouse.alt_key(), mouse.shift_key(), mouse.meta_key()),
    };
    if let Some(navigation) = session.click(&input, &link) {
        event.prevent_default();
        drive(navigation);
    }
}

fn on_keypress(event: &Event) {
    let Some(session) = session() else { return };
    if session.is_busy() {
        return;
    }
    let Some(key) = event.dyn_ref::<KeyboardEvent>() else {
        return;
    };
    let Some((anchor, link)) = link_at(event.target(), &session.location()) else {
        return;
    };
    let anchor: &web_sys::Node = &anchor;
    let target_is_focused = anchor
        .owner_document()
        .and_then(|document| document.active_element())
        .is_some_and(|active| active.is_same_node(Some(anchor)));
    let input = KeyInput {
        default_prevented: event.default_prevented(),
        key: key.key(),
        target_is_focused,
        modifiers: modifiers(key.ctrl_key(), key.alt_key(), key.shift_key(), key.meta_key()),
    };
    if let Some(navigation) = session.keypress(&input, &link) {
        event.prevent_default();
        drive(navigation);
    }
}

fn on_submit(event: &Event) {
    let Some(session) = session() else { return };
    if session.is_busy() {
        return;
    }
    let Some(form) = event.target().and_then(|t| t.dyn_into::<HtmlFormElement>().ok()) else {
        return;
    };
    let submitter = event.dyn_ref::<SubmitEvent>().and_then(SubmitEvent::submitter);
    let input = SubmitInput {
        default_prevented: event.default_prevented(),
    };
    if let Some(navigation) = session.submit(&input, BrowserForm::new(form, submitter)) {
        event.prevent_default();
        drive(navigation);
    }
}

fn on_enter(event: &Event) {
    let Some(session) = session() else { return };
    let Some((_, link)) = link_at(event.target(), &session.location()) else {
        return;
    };
    trace!(url = %link.url, kind = %event.type_(), "link entered");
    spawn_local(async move { session.pointer_enter(&link) });
}

fn on_leave(event: &Event) {
    let Some(session) = session() else { return };
    let Some((anchor, link)) = link_at(event.target(), &session.location()) else {
        return;
    };
    // Moving between children of the same link is not leaving it
    let related = event
        .dyn_ref::<MouseEvent>()
        .and_then(MouseEvent::related_target)
        .and_then(|t| t.dyn_into::<web_sys::Node>().ok());
    if related.is_some_and(|node| anchor.contains(Some(&node))) {
        return;
    }
    spawn_local(async move { session.pointer_leave(&link) });
}

fn on_popstate(event: &Event) {
    let Some(session) = session() else { return };
    let state = event
        .dyn_ref::<PopStateEvent>()
        .and_then(|e| e.state().as_f64())
        .filter(|index| *index >= 0.0)
        .map(|index| index as usize);
    spawn_local(async move {
        match session.popstate(state).await {
            Ok(outcome) => debug!(?outcome, "history entry replayed"),
            Err(e) => debug!(error = %e, "history replay fell back"),
        }
    });
}

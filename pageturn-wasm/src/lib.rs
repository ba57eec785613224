//! Browser adapter for pageturn.
//!
//! ```js
//! import init, { start, visit } from "./pageturn_wasm.js";
//! await init();
//! start(JSON.stringify({ prefetchTimeout: 100 }));
//! ```
//!
//! `start` installs document-level listeners and from then on same-origin
//! links and forms are fetched and patched into the page instead of loaded.
//! Progress is reported through `pageturn:readystatechange` and
//! `pageturn:restore` events on `document`.

mod dom;
mod listeners;
mod platform;

use std::cell::RefCell;

use facet::Facet;
use pageturn::{Config, NavigateOutcome, SessionHandle};
use tracing::info;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;
use web_sys::ScrollRestoration;

pub use dom::BrowserDom;
pub use platform::{BrowserFetcher, BrowserForm, BrowserPlatform, READY_STATE_EVENT, RESTORE_EVENT};

/// Errors surfaced to JavaScript by the exported functions.
#[derive(Facet, Debug)]
#[facet(derive(Error))]
#[repr(u8)]
pub enum StartError {
    /// pageturn is already running on this page
    AlreadyStarted,

    /// pageturn has not been started
    NotStarted,

    /// no window or document
    NoDocument,

    /// invalid configuration: {message}
    InvalidConfig { message: String },

    /// could not start: {message}
    Setup { message: String },
}

impl From<StartError> for JsValue {
    fn from(e: StartError) -> Self {
        JsValue::from_str(&e.to_string())
    }
}

thread_local! {
    static SESSION: RefCell<Option<SessionHandle<BrowserPlatform>>> = const { RefCell::new(None) };
}

/// The running session, if `start` was called
pub(crate) fn session() -> Option<SessionHandle<BrowserPlatform>> {
    SESSION.with(|s| s.borrow().clone())
}

/// Readable text for a thrown JS value
pub(crate) fn describe(value: &JsValue) -> String {
    value.as_string().unwrap_or_else(|| format!("{value:?}"))
}

/// Start in-place navigation on this page. `config` is a JSON object;
/// missing fields keep their defaults.
#[wasm_bindgen]
pub fn start(config: Option<String>) -> Result<(), JsValue> {
    start_session(config.as_deref()).map_err(Into::into)
}

fn start_session(config: Option<&str>) -> Result<(), StartError> {
    if session().is_some() {
        return Err(StartError::AlreadyStarted);
    }
    let _ = wasm_tracing::set_as_global_default();

    let config = match config {
        Some(json) => facet_json::from_str::<Config>(json).map_err(|e| StartError::InvalidConfig {
            message: format!("{e:?}"),
        })?,
        None => Config::default(),
    };

    let window = web_sys::window().ok_or(StartError::NoDocument)?;
    let document = window.document().ok_or(StartError::NoDocument)?;
    let setup = |e: JsValue| StartError::Setup {
        message: describe(&e),
    };

    // Scroll is restored by the session after each replay. The landing entry
    // keeps whatever state the page gave it; a popstate without our index
    // replays entry 0, and the only history write is pushState.
    window
        .history()
        .and_then(|history| history.set_scroll_restoration(ScrollRestoration::Manual))
        .map_err(setup)?;

    let platform = BrowserPlatform::new(window.clone(), document.clone());
    let handle = SessionHandle::start(platform, config).map_err(|e| StartError::Setup {
        message: e.to_string(),
    })?;
    SESSION.with(|s| *s.borrow_mut() = Some(handle));
    listeners::install(&window, &document).map_err(setup)?;

    info!("pageturn started");
    Ok(())
}

/// Navigate to `url` in place. Resolves to `true` when the page was
/// replaced, `false` when a newer navigation overtook this one; rejects
/// after falling back to a full page load.
#[wasm_bindgen]
pub fn visit(url: String) -> js_sys::Promise {
    future_to_promise(async move {
        let session = session().ok_or(StartError::NotStarted)?;
        let navigation = session
            .visit(&url)
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        match navigation.await {
            Ok(NavigateOutcome::Committed) => Ok(JsValue::TRUE),
            Ok(NavigateOutcome::Superseded) => Ok(JsValue::FALSE),
            Err(e) => Err(JsValue::from_str(&e.to_string())),
        }
    })
}

#[wasm_bindgen]
pub fn back() -> Result<(), JsValue> {
    session().ok_or(StartError::NotStarted)?.back();
    Ok(())
}

#[wasm_bindgen]
pub fn forward() -> Result<(), JsValue> {
    session().ok_or(StartError::NotStarted)?.forward();
    Ok(())
}

#[wasm_bindgen]
pub fn go(delta: i32) -> Result<(), JsValue> {
    session().ok_or(StartError::NotStarted)?.go(delta);
    Ok(())
}

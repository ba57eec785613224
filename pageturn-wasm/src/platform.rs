//! `Platform` on top of `web-sys`.

use std::collections::HashMap;
use std::future::Future;

use pageturn::form::Enctype;
use pageturn::{
    Fetch, FetchRequest, FetchResponse, FormBody, FormSource, HintId, HistoryHost, NavigateError,
    Platform, PrefetchHost, ScrollPosition, SessionEvent, TimerId, TimerToken,
};
use tracing::{debug, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;
use web_sys::{
    CustomEvent, CustomEventInit, Element, FormData, Headers, HtmlElement, HtmlFormElement,
    RequestInit, Response, Window,
};

use crate::describe;
use crate::dom::BrowserDom;

/// Fired on `document` with the new state as `detail`
pub const READY_STATE_EVENT: &str = "pageturn:readystatechange";

/// Fired on `document` with `{ index, url }` before a history entry is replayed
pub const RESTORE_EVENT: &str = "pageturn:restore";

#[derive(Clone)]
pub struct BrowserFetcher {
    window: Window,
}

impl Fetch for BrowserFetcher {
    fn fetch(
        &self,
        request: FetchRequest,
    ) -> impl Future<Output = Result<FetchResponse, NavigateError>> {
        let window = self.window.clone();
        async move {
            fetch(&window, request)
                .await
                .map_err(|e| NavigateError::network(describe(&e)))
        }
    }
}

async fn fetch(window: &Window, request: FetchRequest) -> Result<FetchResponse, JsValue> {
    let init = RequestInit::new();
    init.set_method(request.method.as_str());
    let headers = Headers::new()?;
    headers.set("Accept", "text/html, application/xhtml+xml")?;
    match &request.body {
        None => {}
        Some(FormBody::UrlEncoded(body)) => {
            headers.set("Content-Type", Enctype::UrlEncoded.mime_type())?;
            init.set_body(&JsValue::from_str(body));
        }
        Some(FormBody::Text(body)) => {
            headers.set("Content-Type", Enctype::TextPlain.mime_type())?;
            init.set_body(&JsValue::from_str(body));
        }
        // the browser writes the boundary itself
        Some(FormBody::Multipart(entries)) => {
            let data = FormData::new()?;
            for (name, value) in entries {
                data.append_with_str(name, value)?;
            }
            init.set_body(&data);
        }
    }
    init.set_headers(&headers);

    let mut url = request.url;
    url.set_fragment(None);
    let response: Response = JsFuture::from(window.fetch_with_str_and_init(url.as_str(), &init))
        .await?
        .dyn_into()?;
    let content_type = response.headers().get("content-type")?;
    let body = JsFuture::from(response.text()?)
        .await?
        .as_string()
        .unwrap_or_default();
    debug!(url = %response.url(), status = response.status(), "fetched");
    Ok(FetchResponse {
        url: response.url(),
        redirected: response.redirected(),
        status: response.status(),
        content_type,
        body,
    })
}

/// A submitted `<form>` and the button that submitted it.
#[derive(Clone)]
pub struct BrowserForm {
    form: HtmlFormElement,
    submitter: Option<HtmlElement>,
}

impl BrowserForm {
    pub fn new(form: HtmlFormElement, submitter: Option<HtmlElement>) -> Self {
        Self { form, submitter }
    }
}

impl FormSource for BrowserForm {
    fn form_attribute(&self, name: &str) -> Option<String> {
        self.form.get_attribute(name)
    }

    fn submitter_attribute(&self, name: &str) -> Option<String> {
        self.submitter.as_ref()?.get_attribute(name)
    }

    fn entries(&self) -> Vec<(String, String)> {
        let Ok(data) = FormData::new_with_form(&self.form) else {
            return Vec::new();
        };
        if let Some(submitter) = &self.submitter
            && let Some(name) = submitter.get_attribute("name").filter(|n| !n.is_empty())
        {
            let value = submitter.get_attribute("value").unwrap_or_default();
            let _ = data.append_with_str(&name, &value);
        }
        let Ok(Some(entries)) = js_sys::try_iter(&data) else {
            return Vec::new();
        };
        // File values are not strings and drop out here
        entries
            .filter_map(Result::ok)
            .filter_map(|entry| {
                let pair = js_sys::Array::from(&entry);
                Some((pair.get(0).as_string()?, pair.get(1).as_string()?))
            })
            .collect()
    }

    fn has_file_controls(&self) -> bool {
        self.form
            .query_selector("input[type=file]")
            .ok()
            .flatten()
            .is_some()
    }
}

pub struct BrowserPlatform {
    window: Window,
    dom: BrowserDom,
    fetcher: BrowserFetcher,
    hints: HashMap<u32, Element>,
    next_hint: u32,
}

impl BrowserPlatform {
    pub fn new(window: Window, document: web_sys::Document) -> Self {
        Self {
            fetcher: BrowserFetcher {
                window: window.clone(),
            },
            window,
            dom: BrowserDom::new(document),
            hints: HashMap::new(),
            next_hint: 0,
        }
    }

    fn document(&self) -> &web_sys::Document {
        self.dom.document()
    }
}

impl PrefetchHost for BrowserPlatform {
    fn now(&self) -> f64 {
        self.window
            .performance()
            .map(|p| p.now())
            .unwrap_or_else(js_sys::Date::now)
    }

    fn set_timeout(&mut self, delay_ms: u32, token: TimerToken) -> TimerId {
        let callback = Closure::once_into_js(move || {
            if let Some(session) = crate::session() {
                session.on_timer(token);
            }
        });
        let delay = i32::try_from(delay_ms).unwrap_or(i32::MAX);
        match self
            .window
            .set_timeout_with_callback_and_timeout_and_arguments_0(callback.unchecked_ref(), delay)
        {
            Ok(handle) => TimerId(handle as u32),
            Err(e) => {
                warn!(error = ?e, "setTimeout failed");
                TimerId(0)
            }
        }
    }

    fn clear_timeout(&mut self, id: TimerId) {
        self.window.clear_timeout_with_handle(id.0 as i32);
    }

    fn insert_preload_hint(&mut self, url: &str) -> Option<HintId> {
        let head = self.document().head()?;
        let link = self.document().create_element("link").ok()?;
        link.set_attribute("rel", "prefetch").ok()?;
        link.set_attribute("href", url).ok()?;
        head.append_child(&link).ok()?;
        self.next_hint += 1;
        self.hints.insert(self.next_hint, link);
        Some(HintId(self.next_hint))
    }

    fn remove_preload_hint(&mut self, id: HintId) {
        if let Some(link) = self.hints.remove(&id.0) {
            link.remove();
        }
    }
}

impl HistoryHost for BrowserPlatform {
    fn scroll_position(&self) -> ScrollPosition {
        ScrollPosition {
            x: self.window.scroll_x().unwrap_or_default(),
            y: self.window.scroll_y().unwrap_or_default(),
        }
    }

    fn push_state(&mut self, index: usize, url: &str) {
        let pushed = self.window.history().and_then(|history| {
            history.push_state_with_url(&JsValue::from_f64(index as f64), "", Some(url))
        });
        if let Err(e) = pushed {
            warn!(error = ?e, %url, "pushState failed");
        }
    }

    fn go(&mut self, delta: i32) {
        if let Err(e) = self.window.history().and_then(|h| h.go_with_delta(delta)) {
            warn!(error = ?e, "history.go failed");
        }
    }

    fn dispatch(&mut self, event: SessionEvent) {
        let (name, detail) = match &event {
            SessionEvent::ReadyStateChange(state) => {
                (READY_STATE_EVENT, JsValue::from_str(state.as_str()))
            }
            SessionEvent::Restore { index, url } => {
                let detail = js_sys::Object::new();
                let _ = js_sys::Reflect::set(
                    &detail,
                    &JsValue::from_str("index"),
                    &JsValue::from_f64(*index as f64),
                );
                let _ = js_sys::Reflect::set(&detail, &JsValue::from_str("url"), &JsValue::from_str(url));
                (RESTORE_EVENT, detail.into())
            }
        };
        let init = CustomEventInit::new();
        init.set_detail(&detail);
        let custom = match CustomEvent::new_with_event_init_dict(name, &init) {
            Ok(custom) => custom,
            Err(e) => {
                warn!(error = ?e, name, "event not created");
                return;
            }
        };
        // Listeners may call back into the session, which is borrowed right now
        let document = self.document().clone();
        wasm_bindgen_futures::spawn_local(async move {
            let _ = document.dispatch_event(&custom);
        });
    }
}

impl Platform for BrowserPlatform {
    type Dom = BrowserDom;
    type Fetcher = BrowserFetcher;
    type Form = BrowserForm;

    fn dom(&self) -> &BrowserDom {
        &self.dom
    }

    fn dom_mut(&mut self) -> &mut BrowserDom {
        &mut self.dom
    }

    fn fetcher(&self) -> &BrowserFetcher {
        &self.fetcher
    }

    fn location(&self) -> String {
        self.window.location().href().unwrap_or_default()
    }

    fn scroll_to(&mut self, position: ScrollPosition) {
        self.window.scroll_to_with_x_and_y(position.x, position.y);
    }

    fn scroll_into_view(&mut self, element: &web_sys::Node) {
        if let Some(element) = element.dyn_ref::<Element>() {
            element.scroll_into_view();
        }
    }

    fn assign_location(&mut self, url: &str) {
        if let Err(e) = self.window.location().assign(url) {
            warn!(error = ?e, %url, "location.assign failed");
        }
    }

    fn submit_natively(&mut self, form: &BrowserForm) {
        // submit() skips the submit event, so this does not come back to us
        if let Err(e) = form.form.submit() {
            warn!(error = ?e, "form.submit failed");
        }
    }
}

//! In-memory host for driving a whole session in tests.
#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::future::Future;
use std::rc::Rc;

use indextree::NodeId;
use pageturn::{
    Document, Fetch, FetchRequest, FetchResponse, FormSnapshot, HintId, HistoryHost,
    NavigateError, Platform, PrefetchHost, ScrollPosition, SessionEvent, TimerId, TimerToken,
    parse,
};

pub const ORIGIN: &str = "https://site.test";

pub fn at(path: &str) -> String {
    format!("{ORIGIN}{path}")
}

#[derive(Default)]
struct Network {
    routes: HashMap<String, Result<FetchResponse, NavigateError>>,
    requests: Vec<FetchRequest>,
}

/// Answers requests from a route table and records them.
#[derive(Clone, Default)]
pub struct MockFetcher(Rc<RefCell<Network>>);

impl MockFetcher {
    pub fn route(&self, path: &str, response: FetchResponse) {
        self.0.borrow_mut().routes.insert(at(path), Ok(response));
    }

    pub fn page(&self, path: &str, html: &str) {
        self.route(path, FetchResponse::html(at(path), html));
    }

    pub fn fail(&self, path: &str, message: &str) {
        self.0
            .borrow_mut()
            .routes
            .insert(at(path), Err(NavigateError::network(message)));
    }

    pub fn requests(&self) -> Vec<FetchRequest> {
        self.0.borrow().requests.clone()
    }
}

impl Fetch for MockFetcher {
    fn fetch(
        &self,
        request: FetchRequest,
    ) -> impl Future<Output = Result<FetchResponse, NavigateError>> {
        // fragments never reach the server
        let mut key = request.url.clone();
        key.set_fragment(None);
        let mut network = self.0.borrow_mut();
        let response = network
            .routes
            .get(key.as_str())
            .cloned()
            .unwrap_or_else(|| Err(NavigateError::network(format!("no route to {}", request.url))));
        network.requests.push(request);
        std::future::ready(response)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArmedTimer {
    pub id: TimerId,
    pub delay_ms: u32,
    pub token: TimerToken,
}

pub struct MockPlatform {
    pub dom: Document,
    pub fetcher: MockFetcher,
    pub location: String,
    pub now: f64,
    pub scroll: ScrollPosition,
    pub timers: Vec<ArmedTimer>,
    pub next_timer: u32,
    pub hints: Vec<(HintId, String)>,
    pub next_hint: u32,
    pub pushes: Vec<(usize, String)>,
    pub gos: Vec<i32>,
    pub events: Vec<SessionEvent>,
    pub scrolls: Vec<ScrollPosition>,
    pub scrolled_into_view: Vec<NodeId>,
    pub assigned: Vec<String>,
    pub native_submits: Vec<FormSnapshot>,
}

impl MockPlatform {
    /// A page at `path` showing `html`
    pub fn new(path: &str, html: &str) -> Self {
        Self {
            dom: parse(html),
            fetcher: MockFetcher::default(),
            location: at(path),
            now: 0.0,
            scroll: ScrollPosition::TOP,
            timers: Vec::new(),
            next_timer: 0,
            hints: Vec::new(),
            next_hint: 0,
            pushes: Vec::new(),
            gos: Vec::new(),
            events: Vec::new(),
            scrolls: Vec::new(),
            scrolled_into_view: Vec::new(),
            assigned: Vec::new(),
            native_submits: Vec::new(),
        }
    }

    /// Disarm the first timer matching `pred` and hand back its token
    pub fn expire(&mut self, pred: impl Fn(&TimerToken) -> bool) -> Option<TimerToken> {
        let pos = self.timers.iter().position(|t| pred(&t.token))?;
        Some(self.timers.remove(pos).token)
    }

    pub fn body_has_class(&self, class: &str) -> bool {
        self.dom
            .body()
            .and_then(|body| self.dom.element(body))
            .is_some_and(|body| body.has_class(class))
    }
}

impl PrefetchHost for MockPlatform {
    fn now(&self) -> f64 {
        self.now
    }

    fn set_timeout(&mut self, delay_ms: u32, token: TimerToken) -> TimerId {
        self.next_timer += 1;
        let id = TimerId(self.next_timer);
        self.timers.push(ArmedTimer {
            id,
            delay_ms,
            token,
        });
        id
    }

    fn clear_timeout(&mut self, id: TimerId) {
        self.timers.retain(|t| t.id != id);
    }

    fn insert_preload_hint(&mut self, url: &str) -> Option<HintId> {
        self.next_hint += 1;
        let id = HintId(self.next_hint);
        self.hints.push((id, url.to_string()));
        Some(id)
    }

    fn remove_preload_hint(&mut self, id: HintId) {
        self.hints.retain(|(h, _)| *h != id);
    }
}

impl HistoryHost for MockPlatform {
    fn scroll_position(&self) -> ScrollPosition {
        self.scroll
    }

    fn push_state(&mut self, index: usize, url: &str) {
        self.pushes.push((index, url.to_string()));
    }

    fn go(&mut self, delta: i32) {
        self.gos.push(delta);
    }

    fn dispatch(&mut self, event: SessionEvent) {
        self.events.push(event);
    }
}

impl Platform for MockPlatform {
    type Dom = Document;
    type Fetcher = MockFetcher;
    type Form = FormSnapshot;

    fn dom(&self) -> &Document {
        &self.dom
    }

    fn dom_mut(&mut self) -> &mut Document {
        &mut self.dom
    }

    fn fetcher(&self) -> &MockFetcher {
        &self.fetcher
    }

    fn location(&self) -> String {
        self.location.clone()
    }

    fn scroll_to(&mut self, position: ScrollPosition) {
        self.scroll = position;
        self.scrolls.push(position);
    }

    fn scroll_into_view(&mut self, element: &NodeId) {
        self.scrolled_into_view.push(*element);
    }

    fn assign_location(&mut self, url: &str) {
        self.assigned.push(url.to_string());
    }

    fn submit_natively(&mut self, form: &FormSnapshot) {
        self.native_submits.push(form.clone());
    }
}

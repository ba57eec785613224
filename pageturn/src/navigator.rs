//! One navigation attempt, from fetch to scroll.
//!
//! The work is split in phases so the session never holds a borrow of itself
//! across the network await:
//!
//! 1. [`Navigator::begin`]: take a generation ticket, enter `Loading`, arm
//!    the loading-indicator timer
//! 2. fetch [`Navigator::request`] through the host's [`Fetch`]
//! 3. [`Navigator::commit`]: parse, honour the server directive, diff, patch,
//!    resolve scroll, `Interactive` then `Complete`
//! 4. [`Navigator::finish`]: always runs; disarms the timer and the marker
//!
//! [`Navigator::navigate`] chains all four for callers that own the platform.

use url::Url;

use crate::config::Config;
use crate::diff::{LiveDom, apply, diff};
use crate::dom::Document;
use crate::error::NavigateError;
use crate::parser::parse;
use crate::platform::{
    Fetch, FetchRequest, FetchResponse, Platform, ReadyState, ScrollPosition, SessionEvent,
    TimerId, TimerToken,
};
use crate::tracing_macros::{debug, trace};

/// Name of the server-side directive: `<meta name="pageturn" content="false">`.
pub const DIRECTIVE_META: &str = "pageturn";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavState {
    Idle,
    Loading,
    Interactive,
    Complete,
}

/// How a navigation that did not fail ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigateOutcome {
    /// The live document now shows the target
    Committed,
    /// A newer navigation started while this one was in flight; nothing was touched
    Superseded,
}

#[derive(Debug, Clone)]
pub struct Navigator {
    url: Url,
    request: Option<FetchRequest>,
    scroll: ScrollPosition,
    restore: bool,
    state: NavState,
    ticket: u64,
    timer: Option<TimerId>,
}

impl Navigator {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            request: None,
            scroll: ScrollPosition::TOP,
            restore: false,
            state: NavState::Idle,
            ticket: 0,
            timer: None,
        }
    }

    /// A navigation that sends `request` (a form submission)
    pub fn with_request(request: FetchRequest) -> Self {
        let mut navigator = Self::new(request.url.clone());
        navigator.request = Some(request);
        navigator
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn state(&self) -> NavState {
        self.state
    }

    pub fn ticket(&self) -> u64 {
        self.ticket
    }

    pub fn scroll(&self) -> ScrollPosition {
        self.scroll
    }

    pub fn save_scroll(&mut self, position: ScrollPosition) {
        self.scroll = position;
    }

    /// Replaying a history entry: restore the saved scroll instead of resetting it
    pub fn mark_restore(&mut self) {
        self.restore = true;
    }

    pub fn is_restore(&self) -> bool {
        self.restore
    }

    /// What to fetch. Form bodies are sent once; replays fetch with GET.
    pub fn request(&self) -> FetchRequest {
        match &self.request {
            Some(request) if !self.restore => request.clone(),
            _ => FetchRequest::get(self.url.clone()),
        }
    }

    fn set_state<P: Platform>(&mut self, platform: &mut P, state: NavState) {
        self.state = state;
        let ready = match state {
            NavState::Idle => return,
            NavState::Loading => ReadyState::Loading,
            NavState::Interactive => ReadyState::Interactive,
            NavState::Complete => ReadyState::Complete,
        };
        platform.dispatch(SessionEvent::ReadyStateChange(ready));
    }

    /// Enter `Loading` under `generation` and arm the loading-indicator timer.
    pub fn begin<P: Platform>(&mut self, platform: &mut P, generation: u64, config: &Config) {
        debug!(url = %self.url, generation, "navigation started");
        self.ticket = generation;
        self.set_state(platform, NavState::Loading);
        if let Some(old) = self.timer.take() {
            platform.clear_timeout(old);
        }
        self.timer = Some(platform.set_timeout(
            config.navigate_timeout,
            TimerToken::LoadingIndicator { generation },
        ));
    }

    /// Apply a fetched response to the live document.
    ///
    /// `live_generation` is the session's newest ticket; if it moved past this
    /// navigation's ticket the response is dropped.
    pub fn commit<P: Platform>(
        &mut self,
        platform: &mut P,
        response: FetchResponse,
        live_generation: u64,
        config: &Config,
    ) -> Result<NavigateOutcome, NavigateError> {
        if response.redirected {
            let mut url =
                Url::parse(&response.url).map_err(|_| NavigateError::invalid_url(&response.url))?;
            url.set_fragment(self.url.fragment());
            trace!(from = %self.url, to = %url, "followed redirect");
            self.url = url;
        }

        // pushState refuses URLs of another origin, so such pages load natively
        let same_origin = Url::parse(&platform.location())
            .is_ok_and(|live| live.origin() == self.url.origin());
        if !same_origin {
            return Err(NavigateError::CrossOrigin {
                url: self.url.to_string(),
            });
        }

        if !response.is_html() {
            return Err(NavigateError::NotHtml {
                content_type: response.content_type.unwrap_or_default(),
            });
        }

        let target = parse(&response.body);
        if directive(&target) == Some(false) {
            debug!(url = %self.url, "server vetoed in-place navigation");
            return Err(NavigateError::Vetoed);
        }

        if self.ticket != live_generation {
            debug!(ticket = self.ticket, live_generation, "navigation superseded");
            return Ok(NavigateOutcome::Superseded);
        }

        if platform.dom().root_element().is_none() {
            return Err(NavigateError::NoRootElement);
        }
        let current = platform.dom().snapshot();
        let patch = diff(&current, &target);
        apply(platform.dom_mut(), &patch);
        self.set_state(platform, NavState::Interactive);

        self.resolve_scroll(platform, config);
        self.restore = false;
        self.request = None;
        self.set_state(platform, NavState::Complete);
        Ok(NavigateOutcome::Committed)
    }

    fn resolve_scroll<P: Platform>(&self, platform: &mut P, config: &Config) {
        if let Some(fragment) = self.url.fragment().filter(|f| !f.is_empty())
            && let Some(element) = platform.dom().element_by_id(fragment)
        {
            platform.scroll_into_view(&element);
            return;
        }
        if self.restore {
            if config.restore_scroll {
                platform.scroll_to(self.scroll);
            }
        } else if config.reset_scroll {
            platform.scroll_to(ScrollPosition::TOP);
        }
    }

    /// Disarm the loading timer; drop the marker unless a newer navigation owns it.
    pub fn finish<P: Platform>(&mut self, platform: &mut P, latest: bool) {
        if let Some(timer) = self.timer.take() {
            platform.clear_timeout(timer);
        }
        if latest {
            platform.dom_mut().set_loading_marker(false);
        }
    }

    /// All phases in one go, with this navigation as the only one in flight.
    pub async fn navigate<P: Platform>(
        &mut self,
        platform: &mut P,
        config: &Config,
    ) -> Result<NavigateOutcome, NavigateError> {
        let generation = self.ticket + 1;
        self.begin(platform, generation, config);
        let fetcher = platform.fetcher().clone();
        let result = match fetcher.fetch(self.request()).await {
            Ok(response) => self.commit(platform, response, generation, config),
            Err(e) => Err(e),
        };
        self.finish(platform, true);
        result
    }
}

/// Value of the server directive meta tag in `doc`'s head, if any.
pub fn directive(doc: &Document) -> Option<bool> {
    let head = doc.head()?;
    doc.child_elements(head)
        .filter(|&id| doc.tag(id) == Some("meta") && doc.attr(id, "name") == Some(DIRECTIVE_META))
        .find_map(|id| match doc.attr(id, "content")?.trim() {
            v if v.eq_ignore_ascii_case("false") => Some(false),
            v if v.eq_ignore_ascii_case("true") => Some(true),
            _ => None,
        })
}

//! Host services the session runs on.
//!
//! The browser crate implements these on top of `web-sys`; tests implement
//! them with plain data. Timers never call back by themselves: the host hands
//! the [`TimerToken`] back to `SessionHandle::on_timer` when one expires.

use std::future::Future;

use url::Url;

use crate::diff::LiveDom;
use crate::error::NavigateError;
use crate::form::{FormBody, FormSource};

/// Scroll offsets of the window, in CSS pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScrollPosition {
    pub x: f64,
    pub y: f64,
}

impl ScrollPosition {
    pub const TOP: ScrollPosition = ScrollPosition { x: 0.0, y: 0.0 };
}

/// Lifecycle of one navigation, reported through [`SessionEvent::ReadyStateChange`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Loading,
    Interactive,
    Complete,
}

impl ReadyState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadyState::Loading => "loading",
            ReadyState::Interactive => "interactive",
            ReadyState::Complete => "complete",
        }
    }
}

/// Events the session dispatches to the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    ReadyStateChange(ReadyState),
    /// A history entry is about to be replayed
    Restore { index: usize, url: String },
}

/// What an expired timer was for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TimerToken {
    /// Slow navigation: show the loading class
    LoadingIndicator { generation: u64 },
    /// Hover delay elapsed: insert the prefetch hint
    PrefetchFire { url: String },
    /// Garbage-collect a prefetcher
    PrefetchCollect { url: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(pub u32);

/// A preload hint element owned by one prefetcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HintId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: Url,
    pub method: Method,
    pub body: Option<FormBody>,
}

impl FetchRequest {
    pub fn get(url: Url) -> Self {
        Self {
            url,
            method: Method::Get,
            body: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    /// Final URL after redirects
    pub url: String,
    pub redirected: bool,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl FetchResponse {
    /// A 200 `text/html` response that was not redirected
    pub fn html(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            redirected: false,
            status: 200,
            content_type: Some("text/html; charset=utf-8".to_string()),
            body: body.into(),
        }
    }

    /// Missing content types are accepted
    pub fn is_html(&self) -> bool {
        self.content_type
            .as_deref()
            .is_none_or(|ct| ct.to_ascii_lowercase().contains("html"))
    }
}

pub trait Fetch {
    fn fetch(&self, request: FetchRequest) -> impl Future<Output = Result<FetchResponse, NavigateError>>;
}

/// Timers and preload hints, all a prefetcher needs.
pub trait PrefetchHost {
    /// Milliseconds on a monotonic clock
    fn now(&self) -> f64;
    fn set_timeout(&mut self, delay_ms: u32, token: TimerToken) -> TimerId;
    fn clear_timeout(&mut self, id: TimerId);

    /// Insert a low-priority preload hint for `url`
    fn insert_preload_hint(&mut self, url: &str) -> Option<HintId>;
    fn remove_preload_hint(&mut self, id: HintId);
}

/// The browser history API plus event dispatch.
///
/// Entries are only ever added with `pushState`; existing entries and their
/// state are never rewritten.
pub trait HistoryHost {
    fn scroll_position(&self) -> ScrollPosition;

    /// `history.pushState(index, "", url)`
    fn push_state(&mut self, index: usize, url: &str);

    /// `history.go(delta)`
    fn go(&mut self, delta: i32);

    fn dispatch(&mut self, event: SessionEvent);
}

/// Everything the session needs from its host.
pub trait Platform: PrefetchHost + HistoryHost {
    type Dom: LiveDom;
    type Fetcher: Fetch + Clone + 'static;
    type Form: FormSource + Clone;

    fn dom(&self) -> &Self::Dom;
    fn dom_mut(&mut self) -> &mut Self::Dom;
    fn fetcher(&self) -> &Self::Fetcher;

    /// `location.href` at startup
    fn location(&self) -> String;

    fn scroll_to(&mut self, position: ScrollPosition);
    fn scroll_into_view(&mut self, element: &<Self::Dom as LiveDom>::Handle);

    /// Full page load of `url`
    fn assign_location(&mut self, url: &str);

    /// Let the browser submit the form itself
    fn submit_natively(&mut self, form: &Self::Form);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_check() {
        let mut response = FetchResponse::html("https://a.test/", "");
        assert!(response.is_html());
        response.content_type = Some("application/xhtml+xml".into());
        assert!(response.is_html());
        response.content_type = None;
        assert!(response.is_html());
        response.content_type = Some("application/json".into());
        assert!(!response.is_html());
    }
}

//! Speculative prefetching of hovered, focused or touched links.
//!
//! A [`Prefetcher`] exists per candidate URL and goes
//! `Initial -> Waiting -> Done`. When the pointer settles on a link long
//! enough, it inserts a preload hint so the browser warms its cache. A
//! finished prefetch is not repeated during the cooldown window.

use rapidhash::RapidHashMap;
use url::Url;

use crate::config::Config;
use crate::observe::LinkTarget;
use crate::platform::{HintId, PrefetchHost, TimerId, TimerToken};
use crate::tracing_macros::{debug, trace};

/// Delay between losing interest in a link and tearing its prefetcher down.
pub const COLLECT_DELAY_MS: u32 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefetchState {
    Initial,
    Waiting,
    Done,
}

/// Prefetch state for one URL.
///
/// Owns at most one timer (hover delay or collection) and at most one hint.
#[derive(Debug, Clone)]
pub struct Prefetcher {
    url: String,
    state: PrefetchState,
    timer: Option<TimerId>,
    collect_timer: Option<TimerId>,
    hint: Option<HintId>,
    prefetched_at: Option<f64>,
}

impl Prefetcher {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            state: PrefetchState::Initial,
            timer: None,
            collect_timer: None,
            hint: None,
            prefetched_at: None,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn state(&self) -> PrefetchState {
        self.state
    }

    pub fn has_hint(&self) -> bool {
        self.hint.is_some()
    }

    /// Number of armed timers; never more than one
    pub fn timers(&self) -> usize {
        usize::from(self.timer.is_some()) + usize::from(self.collect_timer.is_some())
    }

    fn remaining_cooldown<H: PrefetchHost>(&self, host: &H, config: &Config) -> Option<f64> {
        let elapsed = host.now() - self.prefetched_at?;
        let remaining = f64::from(config.prefetch_cooldown) - elapsed;
        (remaining > 0.0).then_some(remaining)
    }

    /// Interest in the link: arm the hover delay unless already waiting or
    /// still cooling down.
    pub fn schedule<H: PrefetchHost>(&mut self, host: &mut H, config: &Config) {
        if let Some(timer) = self.collect_timer.take() {
            host.clear_timeout(timer);
        }

        match self.state {
            PrefetchState::Waiting => return,
            PrefetchState::Done => {
                if self.remaining_cooldown(host, config).is_some() {
                    trace!(url = %self.url, "prefetch cooling down");
                    return;
                }
                if let Some(hint) = self.hint.take() {
                    host.remove_preload_hint(hint);
                }
                self.state = PrefetchState::Initial;
            }
            PrefetchState::Initial => {}
        }

        debug_assert!(self.timer.is_none());
        self.timer = Some(host.set_timeout(
            config.prefetch_timeout,
            TimerToken::PrefetchFire {
                url: self.url.clone(),
            },
        ));
        self.state = PrefetchState::Waiting;
    }

    /// The hover delay expired: insert the hint.
    pub fn fire<H: PrefetchHost>(&mut self, host: &mut H) {
        self.timer = None;
        if self.state != PrefetchState::Waiting {
            return;
        }
        if self.hint.is_none() {
            self.hint = host.insert_preload_hint(&self.url);
        }
        self.prefetched_at = Some(host.now());
        self.state = PrefetchState::Done;
        debug!(url = %self.url, "prefetched");
    }

    /// Interest lost: stop waiting and arm collection.
    pub fn cancel<H: PrefetchHost>(&mut self, host: &mut H) {
        if let Some(timer) = self.timer.take() {
            host.clear_timeout(timer);
            self.state = PrefetchState::Initial;
        }
        if self.collect_timer.is_none() {
            self.collect_timer = Some(host.set_timeout(
                COLLECT_DELAY_MS,
                TimerToken::PrefetchCollect {
                    url: self.url.clone(),
                },
            ));
        }
    }

    /// Collection timer expired: drop the hint. Returns true when the
    /// prefetcher can be discarded; one still cooling down re-arms collection
    /// for the rest of its cooldown.
    pub fn collect<H: PrefetchHost>(&mut self, host: &mut H, config: &Config) -> bool {
        self.collect_timer = None;
        if self.state == PrefetchState::Waiting {
            return false;
        }
        if let Some(hint) = self.hint.take() {
            host.remove_preload_hint(hint);
        }
        if self.state == PrefetchState::Done
            && let Some(remaining) = self.remaining_cooldown(host, config)
        {
            self.collect_timer = Some(host.set_timeout(
                remaining.ceil() as u32,
                TimerToken::PrefetchCollect {
                    url: self.url.clone(),
                },
            ));
            return false;
        }
        true
    }
}

/// Owns every live [`Prefetcher`], keyed by URL without fragment.
#[derive(Debug, Default)]
pub struct PrefetchObserver {
    prefetchers: RapidHashMap<String, Prefetcher>,
}

impl PrefetchObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, url: &str) -> Option<&Prefetcher> {
        self.prefetchers.get(url)
    }

    pub fn len(&self) -> usize {
        self.prefetchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prefetchers.is_empty()
    }

    /// Key for `url`: the fragment never changes what gets fetched
    pub fn key(url: &Url) -> String {
        let mut url = url.clone();
        url.set_fragment(None);
        url.into()
    }

    /// Whether `link` may be prefetched from the page at `location`
    pub fn applies(link: &LinkTarget, location: &Url, config: &Config) -> bool {
        link.is_internal(location)
            && link.prefetch.resolve(config.default_prefetch)
            && Self::key(&link.url) != Self::key(location)
    }

    /// Pointer or focus entered a link
    pub fn enter<H: PrefetchHost>(
        &mut self,
        host: &mut H,
        link: &LinkTarget,
        location: &Url,
        config: &Config,
    ) {
        if !Self::applies(link, location, config) {
            return;
        }
        let key = Self::key(&link.url);
        self.prefetchers
            .entry(key.clone())
            .or_insert_with(|| Prefetcher::new(key))
            .schedule(host, config);
    }

    /// Pointer or focus left a link
    pub fn leave<H: PrefetchHost>(&mut self, host: &mut H, link: &LinkTarget) {
        if let Some(prefetcher) = self.prefetchers.get_mut(&Self::key(&link.url)) {
            prefetcher.cancel(host);
        }
    }

    pub fn on_fire<H: PrefetchHost>(&mut self, host: &mut H, url: &str) {
        if let Some(prefetcher) = self.prefetchers.get_mut(url) {
            prefetcher.fire(host);
        }
    }

    pub fn on_collect<H: PrefetchHost>(&mut self, host: &mut H, url: &str, config: &Config) {
        let discard = self
            .prefetchers
            .get_mut(url)
            .is_some_and(|p| p.collect(host, config));
        if discard {
            trace!(url, "prefetcher collected");
            self.prefetchers.remove(url);
        }
    }
}

//! The session facade: one per page load.
//!
//! [`SessionHandle::start`] takes the [`Platform`] by value, so a second
//! session over the same host cannot be built by accident. Event entry points
//! decide synchronously whether to take over (`None` means "let the browser
//! handle it"); when they do, they stamp a new generation right away and hand
//! back a future that performs the fetch and the commit. The session is never
//! borrowed across that future's await point.

use std::cell::{Ref, RefCell};
use std::future::Future;
use std::rc::Rc;

use url::Url;

use crate::config::Config;
use crate::diff::LiveDom;
use crate::error::NavigateError;
use crate::form::FormModel;
use crate::history::History;
use crate::navigator::{NavigateOutcome, Navigator};
use crate::observe::{ClickInput, KeyInput, LinkTarget, SubmitInput, SubmitObserver, VisitObserver};
use crate::platform::{Fetch, FetchResponse, Platform, TimerToken};
use crate::prefetch::PrefetchObserver;
use crate::tracing_macros::{debug, warn};

/// Session state. Reached through a [`SessionHandle`].
pub struct Session<P: Platform> {
    platform: P,
    config: Config,
    history: History,
    prefetch: PrefetchObserver,
    visit: VisitObserver,
    submit: SubmitObserver,
    generation: u64,
}

/// Where a navigation came from
#[derive(Debug, Clone, Copy)]
enum Origin {
    Visit,
    Replay(usize),
}

/// What the browser should do if the navigation fails
enum Fallback<F> {
    Location,
    Form(F),
}

impl<P: Platform> Session<P> {
    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn prefetch(&self) -> &PrefetchObserver {
        &self.prefetch
    }

    /// Ticket of the newest navigation started
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// URL of the current history entry
    pub fn location(&self) -> &Url {
        self.history.current().url()
    }

    fn complete(
        &mut self,
        mut navigator: Navigator,
        origin: Origin,
        fallback: Fallback<P::Form>,
        response: Result<FetchResponse, NavigateError>,
    ) -> Result<NavigateOutcome, NavigateError> {
        let generation = self.generation;
        let latest = navigator.ticket() == generation;

        let result = match response {
            Ok(response) => {
                if latest && matches!(origin, Origin::Visit) {
                    self.history.save_scroll(&self.platform);
                }
                navigator.commit(&mut self.platform, response, generation, &self.config)
            }
            Err(e) => Err(e),
        };
        navigator.finish(&mut self.platform, latest);

        match &result {
            Ok(NavigateOutcome::Committed) => match origin {
                Origin::Visit => self.history.push(&mut self.platform, navigator),
                Origin::Replay(index) => self.history.replace(index, navigator),
            },
            Ok(NavigateOutcome::Superseded) => {}
            Err(_e) if latest => {
                warn!(error = %_e, url = %navigator.url(), "falling back to a native navigation");
                match fallback {
                    Fallback::Location => self.platform.assign_location(navigator.url().as_str()),
                    Fallback::Form(form) => self.platform.submit_natively(&form),
                }
            }
            Err(_e) => debug!(error = %_e, "stale navigation failed, ignored"),
        }
        result
    }
}

/// Shared handle to the page's session.
pub struct SessionHandle<P: Platform>(Rc<RefCell<Session<P>>>);

impl<P: Platform> Clone for SessionHandle<P> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<P: Platform + 'static> SessionHandle<P> {
    /// Start the session on the page `platform` is showing.
    pub fn start(platform: P, config: Config) -> Result<Self, NavigateError> {
        let href = platform.location();
        let location = Url::parse(&href).map_err(|_| NavigateError::invalid_url(href))?;
        debug!(%location, "session started");
        Ok(Self(Rc::new(RefCell::new(Session {
            platform,
            visit: VisitObserver::new(&config),
            submit: SubmitObserver::new(&config),
            config,
            history: History::new(location),
            prefetch: PrefetchObserver::new(),
            generation: 0,
        }))))
    }

    /// Read access to the session. Not to be held across an await.
    pub fn borrow(&self) -> Ref<'_, Session<P>> {
        self.0.borrow()
    }

    /// True while a session call is running further up the stack, e.g. when a
    /// patched-in script dispatches events synchronously.
    pub fn is_busy(&self) -> bool {
        self.0.try_borrow_mut().is_err()
    }

    pub fn with_platform<R>(&self, f: impl FnOnce(&mut P) -> R) -> R {
        f(&mut self.0.borrow_mut().platform)
    }

    pub fn location(&self) -> Url {
        self.0.borrow().location().clone()
    }

    /// A link click. `Some` means: prevent the default action and drive the future.
    pub fn click(
        &self,
        input: &ClickInput,
        link: &LinkTarget,
    ) -> Option<impl Future<Output = Result<NavigateOutcome, NavigateError>> + use<P>> {
        let url = {
            let session = self.0.borrow();
            session.visit.click(input, link, session.location())?
        };
        Some(self.navigate(Navigator::new(url), Origin::Visit, Fallback::Location))
    }

    /// Enter on a focused link
    pub fn keypress(
        &self,
        input: &KeyInput,
        link: &LinkTarget,
    ) -> Option<impl Future<Output = Result<NavigateOutcome, NavigateError>> + use<P>> {
        let url = {
            let session = self.0.borrow();
            session.visit.keypress(input, link, session.location())?
        };
        Some(self.navigate(Navigator::new(url), Origin::Visit, Fallback::Location))
    }

    /// A form submission
    pub fn submit(
        &self,
        input: &SubmitInput,
        form: P::Form,
    ) -> Option<impl Future<Output = Result<NavigateOutcome, NavigateError>> + use<P>> {
        let request = {
            let session = self.0.borrow();
            let location = session.location();
            let model = FormModel::new(&form, location);
            session.submit.submit(input, &model, location)?
        };
        Some(self.navigate(
            Navigator::with_request(request),
            Origin::Visit,
            Fallback::Form(form),
        ))
    }

    /// Programmatic navigation, relative URLs resolved against the current entry.
    /// Link policy does not apply, but the URL must share the page's origin.
    pub fn visit(
        &self,
        url: &str,
    ) -> Result<impl Future<Output = Result<NavigateOutcome, NavigateError>> + use<P>, NavigateError>
    {
        let location = self.location();
        let url = location
            .join(url)
            .map_err(|_| NavigateError::invalid_url(url))?;
        if url.origin() != location.origin() {
            return Err(NavigateError::CrossOrigin {
                url: url.to_string(),
            });
        }
        Ok(self.navigate(Navigator::new(url), Origin::Visit, Fallback::Location))
    }

    /// The browser moved through history; `state` is the entry's stored index
    pub fn popstate(
        &self,
        state: Option<usize>,
    ) -> impl Future<Output = Result<NavigateOutcome, NavigateError>> + use<P> {
        let (index, navigator) = {
            let mut session = self.0.borrow_mut();
            let Session {
                platform, history, ..
            } = &mut *session;
            let index = history.pop_state(platform, state);
            (index, history.current().clone())
        };
        self.navigate(navigator, Origin::Replay(index), Fallback::Location)
    }

    fn navigate(
        &self,
        mut navigator: Navigator,
        origin: Origin,
        fallback: Fallback<P::Form>,
    ) -> impl Future<Output = Result<NavigateOutcome, NavigateError>> + use<P> {
        let session = Rc::clone(&self.0);
        let (fetcher, request) = {
            let mut guard = session.borrow_mut();
            guard.generation += 1;
            let generation = guard.generation;
            let Session {
                platform, config, ..
            } = &mut *guard;
            navigator.begin(platform, generation, config);
            (platform.fetcher().clone(), navigator.request())
        };

        async move {
            let response = fetcher.fetch(request).await;
            session
                .borrow_mut()
                .complete(navigator, origin, fallback, response)
        }
    }

    /// Pointer, focus or touch reached a link
    pub fn pointer_enter(&self, link: &LinkTarget) {
        let mut session = self.0.borrow_mut();
        let Session {
            platform,
            prefetch,
            history,
            config,
            ..
        } = &mut *session;
        prefetch.enter(platform, link, history.current().url(), config);
    }

    /// Pointer, focus or touch left a link
    pub fn pointer_leave(&self, link: &LinkTarget) {
        let mut session = self.0.borrow_mut();
        let Session {
            platform, prefetch, ..
        } = &mut *session;
        prefetch.leave(platform, link);
    }

    /// A timer armed through the platform expired
    pub fn on_timer(&self, token: TimerToken) {
        let mut session = self.0.borrow_mut();
        let Session {
            platform,
            prefetch,
            config,
            generation,
            ..
        } = &mut *session;
        match token {
            TimerToken::LoadingIndicator { generation: ticket } => {
                if ticket == *generation {
                    platform.dom_mut().set_loading_marker(true);
                }
            }
            TimerToken::PrefetchFire { url } => prefetch.on_fire(platform, &url),
            TimerToken::PrefetchCollect { url } => prefetch.on_collect(platform, &url, config),
        }
    }

    pub fn back(&self) {
        let Ok(mut session) = self.0.try_borrow_mut() else {
            warn!("history.back() ignored while a navigation is being applied");
            return;
        };
        let Session {
            platform, history, ..
        } = &mut *session;
        history.back(platform);
    }

    pub fn forward(&self) {
        let Ok(mut session) = self.0.try_borrow_mut() else {
            warn!("history.forward() ignored while a navigation is being applied");
            return;
        };
        let Session {
            platform, history, ..
        } = &mut *session;
        history.forward(platform);
    }

    pub fn go(&self, delta: i32) {
        let Ok(mut session) = self.0.try_borrow_mut() else {
            warn!(delta, "history.go() ignored while a navigation is being applied");
            return;
        };
        let Session {
            platform, history, ..
        } = &mut *session;
        history.go(platform, delta);
    }
}

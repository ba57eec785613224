//! Whole-session tests against the in-memory host.

mod common;

use common::{MockPlatform, at};
use facet_testhelpers::test;
use futures::executor::block_on;
use pageturn::{
    ClickInput, Config, Directive, FetchResponse, FormBody, FormSnapshot, KeyInput, LOADING_CLASS,
    LinkTarget, Method, Modifiers, NavigateError, NavigateOutcome, ReadyState, ScrollPosition,
    SessionEvent, SessionHandle, SubmitInput, TimerToken, parse,
};
use url::Url;

const HOME: &str = r#"<html><head><title>Home</title></head><body><nav><a id="next" href="/next">Next</a></nav><p>home</p></body></html>"#;
const NEXT: &str = r#"<html><head><title>Next</title></head><body><nav><a id="home" href="/">Home</a></nav><p>next</p><div id="details">details</div></body></html>"#;

fn start(platform: MockPlatform) -> SessionHandle<MockPlatform> {
    SessionHandle::start(platform, Config::default()).expect("session should start")
}

fn home() -> SessionHandle<MockPlatform> {
    let platform = MockPlatform::new("/", HOME);
    platform.fetcher.page("/", HOME);
    platform.fetcher.page("/next", NEXT);
    start(platform)
}

fn link(path: &str) -> LinkTarget {
    LinkTarget::new(Url::parse(&at(path)).unwrap())
}

fn body_html(handle: &SessionHandle<MockPlatform>) -> String {
    handle.borrow().platform().dom.to_html()
}

#[test]
fn test_click_navigates_in_place() {
    let handle = home();
    let navigation = handle
        .click(&ClickInput::default(), &link("/next"))
        .expect("click should be taken over");
    assert_eq!(block_on(navigation), Ok(NavigateOutcome::Committed));

    assert_eq!(body_html(&handle), parse(NEXT).to_html());
    assert_eq!(handle.location().as_str(), at("/next"));

    let session = handle.borrow();
    assert_eq!(session.history().len(), 2);
    assert_eq!(session.history().index(), 1);
    let platform = session.platform();
    assert_eq!(platform.pushes, vec![(1, at("/next"))]);
    assert_eq!(platform.scrolls, vec![ScrollPosition::TOP]);
    assert!(platform.assigned.is_empty());
    assert_eq!(
        platform.events,
        vec![
            SessionEvent::ReadyStateChange(ReadyState::Loading),
            SessionEvent::ReadyStateChange(ReadyState::Interactive),
            SessionEvent::ReadyStateChange(ReadyState::Complete),
        ]
    );
}

#[test]
fn test_title_follows_navigation() {
    let handle = home();
    block_on(handle.visit("/next").unwrap()).unwrap();
    let session = handle.borrow();
    let dom = &session.platform().dom;
    let title = dom.find_tag("title").expect("title survives");
    assert_eq!(dom.text_content(title), "Next");
}

#[test]
fn test_modified_clicks_are_left_to_the_browser() {
    let handle = home();
    let ctrl = ClickInput {
        modifiers: Modifiers {
            ctrl: true,
            ..Modifiers::default()
        },
        ..ClickInput::default()
    };
    assert!(handle.click(&ctrl, &link("/next")).is_none());

    let middle = ClickInput {
        button: 1,
        ..ClickInput::default()
    };
    assert!(handle.click(&middle, &link("/next")).is_none());

    let prevented = ClickInput {
        default_prevented: true,
        ..ClickInput::default()
    };
    assert!(handle.click(&prevented, &link("/next")).is_none());
    assert_eq!(handle.borrow().generation(), 0);
}

#[test]
fn test_links_the_browser_keeps() {
    let handle = home();
    let click = ClickInput::default();

    let mut external = link("/next");
    external.rel = Some("external".into());
    assert!(handle.click(&click, &external).is_none());

    let mut blank = link("/next");
    blank.target = Some("_blank".into());
    assert!(handle.click(&click, &blank).is_none());

    let mut opted_out = link("/next");
    opted_out.navigate = Directive::Disabled;
    assert!(handle.click(&click, &opted_out).is_none());

    let other_origin = LinkTarget::new(Url::parse("https://elsewhere.test/next").unwrap());
    assert!(handle.click(&click, &other_origin).is_none());

    assert!(handle.click(&click, &link("/#top")).is_none());
}

#[test]
fn test_opt_in_mode() {
    let platform = MockPlatform::new("/", HOME);
    platform.fetcher.page("/next", NEXT);
    let config = Config {
        default_navigate: false,
        ..Config::default()
    };
    let handle = SessionHandle::start(platform, config).unwrap();

    assert!(handle.click(&ClickInput::default(), &link("/next")).is_none());
    let mut opted_in = link("/next");
    opted_in.navigate = Directive::Enabled;
    assert!(handle.click(&ClickInput::default(), &opted_in).is_some());
}

#[test]
fn test_enter_on_focused_link() {
    let handle = home();
    let enter = KeyInput {
        key: "Enter".into(),
        target_is_focused: true,
        ..KeyInput::default()
    };
    let navigation = handle
        .keypress(&enter, &link("/next"))
        .expect("enter should navigate");
    assert_eq!(block_on(navigation), Ok(NavigateOutcome::Committed));

    let space = KeyInput {
        key: " ".into(),
        ..enter.clone()
    };
    assert!(handle.keypress(&space, &link("/")).is_none());
    let unfocused = KeyInput {
        target_is_focused: false,
        ..enter
    };
    assert!(handle.keypress(&unfocused, &link("/")).is_none());
}

#[test]
fn test_new_navigation_truncates_forward_history() {
    let handle = home();
    handle.with_platform(|p| {
        p.fetcher.page("/a", NEXT);
        p.fetcher.page("/b", HOME);
        p.fetcher.page("/c", NEXT);
    });

    block_on(handle.visit("/a").unwrap()).unwrap();
    block_on(handle.visit("/b").unwrap()).unwrap();
    assert_eq!(handle.borrow().history().len(), 3);

    assert_eq!(block_on(handle.popstate(Some(1))), Ok(NavigateOutcome::Committed));
    assert_eq!(handle.location().as_str(), at("/a"));

    block_on(handle.visit("/c").unwrap()).unwrap();
    let session = handle.borrow();
    let urls: Vec<_> = session
        .history()
        .entries()
        .iter()
        .map(|e| e.url().to_string())
        .collect();
    assert_eq!(urls, vec![at("/"), at("/a"), at("/c")]);
    assert_eq!(session.platform().pushes.last(), Some(&(2, at("/c"))));
}

#[test]
fn test_popstate_restores_scroll() {
    let handle = home();
    handle.with_platform(|p| {
        p.scroll = ScrollPosition { x: 0.0, y: 120.0 };
    });

    block_on(handle.visit("/next").unwrap()).unwrap();
    assert_eq!(handle.borrow().platform().scroll, ScrollPosition::TOP);

    let outcome = block_on(handle.popstate(Some(0)));
    assert_eq!(outcome, Ok(NavigateOutcome::Committed));

    let session = handle.borrow();
    let platform = session.platform();
    assert_eq!(platform.scroll, ScrollPosition { x: 0.0, y: 120.0 });
    assert!(platform.events.contains(&SessionEvent::Restore {
        index: 0,
        url: at("/"),
    }));
    assert_eq!(platform.dom.to_html(), parse(HOME).to_html());
    // popstate never pushes
    assert_eq!(platform.pushes.len(), 1);
    assert_eq!(session.history().len(), 2);
    assert_eq!(session.history().index(), 0);
}

#[test]
fn test_popstate_without_state_replays_first_entry() {
    let handle = home();
    block_on(handle.visit("/next").unwrap()).unwrap();
    block_on(handle.popstate(None)).unwrap();
    assert_eq!(handle.location().as_str(), at("/"));
    assert_eq!(handle.borrow().history().index(), 0);
}

#[test]
fn test_redirect_keeps_fragment() {
    let handle = home();
    handle.with_platform(|p| {
        p.fetcher.route(
            "/old",
            FetchResponse {
                url: at("/new"),
                redirected: true,
                ..FetchResponse::html(at("/old"), NEXT)
            },
        );
    });

    block_on(handle.visit("/old#details").unwrap()).unwrap();
    assert_eq!(handle.location().as_str(), at("/new#details"));

    let session = handle.borrow();
    let platform = session.platform();
    assert_eq!(platform.pushes, vec![(1, at("/new#details"))]);
    assert_eq!(platform.scrolled_into_view.len(), 1);
    let target = platform.scrolled_into_view[0];
    assert_eq!(platform.dom.attr(target, "id"), Some("details"));
    assert!(platform.scrolls.is_empty());
}

#[test]
fn test_redirect_to_another_origin_loads_natively() {
    let handle = home();
    handle.with_platform(|p| {
        p.fetcher.route(
            "/login",
            FetchResponse {
                url: "https://sso.other.test/auth".into(),
                redirected: true,
                ..FetchResponse::html(at("/login"), NEXT)
            },
        );
    });

    let before = body_html(&handle);
    let result = block_on(handle.visit("/login").unwrap());
    assert_eq!(
        result,
        Err(NavigateError::CrossOrigin {
            url: "https://sso.other.test/auth".into()
        })
    );
    assert_eq!(body_html(&handle), before);

    let session = handle.borrow();
    let platform = session.platform();
    assert_eq!(platform.assigned, vec!["https://sso.other.test/auth".to_string()]);
    assert!(platform.pushes.is_empty());
    assert_eq!(session.history().len(), 1);
    assert_eq!(session.history().index(), 0);
}

#[test]
fn test_visit_rejects_other_origins() {
    let handle = home();
    assert!(matches!(
        handle.visit("https://elsewhere.test/page"),
        Err(NavigateError::CrossOrigin { .. })
    ));
    assert!(matches!(
        handle.visit("http://site.test/next"),
        Err(NavigateError::CrossOrigin { .. })
    ));
    assert!(handle.borrow().platform().fetcher.requests().is_empty());
}

#[test]
fn test_server_veto_falls_back() {
    let handle = home();
    let vetoed = r#"<html><head><meta name="pageturn" content="false"></head><body><p>x</p></body></html>"#;
    handle.with_platform(|p| p.fetcher.page("/legacy", vetoed));

    let before = body_html(&handle);
    let result = block_on(handle.visit("/legacy").unwrap());
    assert_eq!(result, Err(NavigateError::Vetoed));
    assert_eq!(body_html(&handle), before);

    let session = handle.borrow();
    assert_eq!(session.platform().assigned, vec![at("/legacy")]);
    assert_eq!(session.history().len(), 1);
}

#[test]
fn test_network_failure_falls_back() {
    let handle = home();
    handle.with_platform(|p| p.fetcher.fail("/down", "connection reset"));

    let result = block_on(handle.visit("/down").unwrap());
    assert!(matches!(result, Err(NavigateError::Network { .. })));
    assert_eq!(handle.borrow().platform().assigned, vec![at("/down")]);
    assert!(!handle.borrow().platform().body_has_class(LOADING_CLASS));
}

#[test]
fn test_non_html_falls_back() {
    let handle = home();
    handle.with_platform(|p| {
        p.fetcher.route(
            "/data.json",
            FetchResponse {
                content_type: Some("application/json".into()),
                ..FetchResponse::html(at("/data.json"), "{}")
            },
        );
    });

    let result = block_on(handle.visit("/data.json").unwrap());
    assert_eq!(
        result,
        Err(NavigateError::NotHtml {
            content_type: "application/json".into()
        })
    );
    assert_eq!(handle.borrow().platform().assigned, vec![at("/data.json")]);
}

#[test]
fn test_error_status_pages_are_rendered() {
    let handle = home();
    let missing = r#"<html><head><title>Not found</title></head><body><h1>404</h1></body></html>"#;
    handle.with_platform(|p| {
        p.fetcher.route(
            "/gone",
            FetchResponse {
                status: 404,
                ..FetchResponse::html(at("/gone"), missing)
            },
        );
    });

    assert_eq!(
        block_on(handle.visit("/gone").unwrap()),
        Ok(NavigateOutcome::Committed)
    );
    assert_eq!(body_html(&handle), "<h1>404</h1>");
}

#[test]
fn test_superseded_navigation_changes_nothing() {
    let handle = home();
    handle.with_platform(|p| {
        p.fetcher.page("/slow", HOME);
        p.fetcher.fail("/slow-fail", "timeout");
    });

    let slow = handle.visit("/slow").unwrap();
    let failing = handle.visit("/slow-fail").unwrap();
    let fast = handle.visit("/next").unwrap();

    assert_eq!(block_on(fast), Ok(NavigateOutcome::Committed));
    assert_eq!(block_on(slow), Ok(NavigateOutcome::Superseded));
    assert!(block_on(failing).is_err());

    assert_eq!(handle.location().as_str(), at("/next"));
    assert_eq!(body_html(&handle), parse(NEXT).to_html());
    let session = handle.borrow();
    assert_eq!(session.generation(), 3);
    assert_eq!(session.history().len(), 2);
    // only the newest navigation may fall back
    assert!(session.platform().assigned.is_empty());
}

#[test]
fn test_loading_marker_on_slow_navigation() {
    let handle = home();
    let navigation = handle.visit("/next").unwrap();

    let token = handle
        .with_platform(|p| p.expire(|t| matches!(t, TimerToken::LoadingIndicator { .. })))
        .expect("loading timer armed");
    assert_eq!(token, TimerToken::LoadingIndicator { generation: 1 });
    handle.on_timer(token);
    assert!(handle.borrow().platform().body_has_class(LOADING_CLASS));

    block_on(navigation).unwrap();
    let session = handle.borrow();
    assert!(!session.platform().body_has_class(LOADING_CLASS));
    assert!(session.platform().timers.is_empty());
}

#[test]
fn test_stale_loading_timer_is_ignored() {
    let handle = home();
    let first = handle.visit("/next").unwrap();
    let second = handle.visit("/").unwrap();

    handle.on_timer(TimerToken::LoadingIndicator { generation: 1 });
    assert!(!handle.borrow().platform().body_has_class(LOADING_CLASS));

    block_on(second).unwrap();
    block_on(first).unwrap();
}

#[test]
fn test_get_form_submits_in_place() {
    let handle = home();
    handle.with_platform(|p| p.fetcher.page("/search?q=rust+docs", NEXT));

    let form = FormSnapshot::new()
        .with_attr("action", "/search")
        .with_entry("q", "rust docs");
    let navigation = handle
        .submit(&SubmitInput::default(), form)
        .expect("form should be taken over");
    assert_eq!(block_on(navigation), Ok(NavigateOutcome::Committed));

    assert_eq!(handle.location().as_str(), at("/search?q=rust+docs"));
    let session = handle.borrow();
    let requests = session.platform().fetcher.requests();
    let request = requests.last().unwrap();
    assert_eq!(request.method, Method::Get);
    assert_eq!(request.body, None);
}

#[test]
fn test_post_form_then_replay_uses_get() {
    let handle = home();
    handle.with_platform(|p| {
        p.fetcher.route(
            "/login",
            FetchResponse {
                url: at("/account"),
                redirected: true,
                ..FetchResponse::html(at("/login"), NEXT)
            },
        );
        p.fetcher.page("/account", NEXT);
    });

    let form = FormSnapshot::new()
        .with_attr("method", "post")
        .with_attr("action", "/login")
        .with_entry("user", "ann")
        .with_entry("pass", "a&b");
    let navigation = handle.submit(&SubmitInput::default(), form).unwrap();
    assert_eq!(block_on(navigation), Ok(NavigateOutcome::Committed));
    assert_eq!(handle.location().as_str(), at("/account"));

    let requests = handle.borrow().platform().fetcher.requests();
    assert_eq!(requests[0].method, Method::Post);
    assert_eq!(
        requests[0].body,
        Some(FormBody::UrlEncoded("user=ann&pass=a%26b".into()))
    );

    block_on(handle.popstate(Some(0))).unwrap();
    block_on(handle.popstate(Some(1))).unwrap();
    let requests = handle.borrow().platform().fetcher.requests();
    let replay = requests.last().unwrap();
    assert_eq!(replay.method, Method::Get);
    assert_eq!(replay.url.as_str(), at("/account"));
}

#[test]
fn test_failed_form_falls_back_to_native_submit() {
    let handle = home();
    let form = FormSnapshot::new()
        .with_attr("method", "post")
        .with_attr("action", "/broken")
        .with_entry("a", "1");

    let result = block_on(handle.submit(&SubmitInput::default(), form.clone()).unwrap());
    assert!(result.is_err());
    let session = handle.borrow();
    assert_eq!(session.platform().native_submits, vec![form]);
    assert!(session.platform().assigned.is_empty());
}

#[test]
fn test_forms_the_browser_keeps() {
    let handle = home();
    let submit = SubmitInput::default();

    let blank = FormSnapshot::new().with_attr("target", "_blank");
    assert!(handle.submit(&submit, blank).is_none());

    let dialog = FormSnapshot::new().with_attr("method", "dialog");
    assert!(handle.submit(&submit, dialog).is_none());

    let opted_out = FormSnapshot::new().with_attr("data-pageturn", "false");
    assert!(handle.submit(&submit, opted_out).is_none());

    let offsite = FormSnapshot::new().with_attr("action", "https://elsewhere.test/search");
    assert!(handle.submit(&submit, offsite).is_none());

    let upload = FormSnapshot {
        has_files: true,
        ..FormSnapshot::new()
            .with_attr("method", "post")
            .with_attr("enctype", "multipart/form-data")
    };
    assert!(handle.submit(&submit, upload).is_none());

    assert!(
        handle
            .submit(&SubmitInput { default_prevented: true }, FormSnapshot::new())
            .is_none()
    );
}

#[test]
fn test_submitter_overrides_form() {
    let handle = home();
    handle.with_platform(|p| p.fetcher.page("/other?q=x", NEXT));
    let form = FormSnapshot::new()
        .with_attr("method", "post")
        .with_attr("action", "/login")
        .with_entry("q", "x")
        .with_submitter_attr("formmethod", "get")
        .with_submitter_attr("formaction", "/other");
    let navigation = handle.submit(&SubmitInput::default(), form).unwrap();
    assert_eq!(block_on(navigation), Ok(NavigateOutcome::Committed));
    assert_eq!(handle.location().as_str(), at("/other?q=x"));
}

#[test]
fn test_prefetch_through_session_timers() {
    let handle = home();
    handle.pointer_enter(&link("/next"));

    let fire = handle
        .with_platform(|p| p.expire(|t| matches!(t, TimerToken::PrefetchFire { .. })))
        .expect("hover delay armed");
    assert_eq!(
        fire,
        TimerToken::PrefetchFire {
            url: at("/next")
        }
    );
    handle.on_timer(fire);
    assert_eq!(handle.borrow().platform().hints.len(), 1);
    assert_eq!(handle.borrow().platform().hints[0].1, at("/next"));

    handle.pointer_leave(&link("/next"));
    let collect = handle
        .with_platform(|p| {
            p.now += 10_000.0;
            p.expire(|t| matches!(t, TimerToken::PrefetchCollect { .. }))
        })
        .expect("collection armed");
    handle.on_timer(collect);

    let session = handle.borrow();
    assert!(session.platform().hints.is_empty());
    assert!(session.prefetch().is_empty());
}

#[test]
fn test_no_prefetch_of_current_page() {
    let handle = home();
    handle.pointer_enter(&link("/#main"));
    handle.pointer_enter(&LinkTarget::new(
        Url::parse("https://elsewhere.test/").unwrap(),
    ));
    let session = handle.borrow();
    assert!(session.platform().timers.is_empty());
    assert!(session.prefetch().is_empty());
}

#[test]
fn test_history_traversal_goes_through_browser() {
    let handle = home();
    handle.back();
    handle.forward();
    handle.go(-2);
    assert_eq!(handle.borrow().platform().gos, vec![-1, 1, -2]);
}

#[test]
fn test_history_traversal_while_busy_is_ignored() {
    let handle = home();
    {
        let _session = handle.borrow();
        assert!(handle.is_busy());
        handle.back();
        handle.go(2);
    }
    assert!(!handle.is_busy());
    handle.forward();
    assert_eq!(handle.borrow().platform().gos, vec![1]);
}

#[test]
fn test_invalid_urls() {
    let handle = home();
    assert_eq!(
        handle.visit("http://[::1").err(),
        Some(NavigateError::InvalidUrl {
            url: "http://[::1".into()
        })
    );

    let platform = MockPlatform {
        location: "not a url".into(),
        ..MockPlatform::new("/", HOME)
    };
    assert!(matches!(
        SessionHandle::start(platform, Config::default()),
        Err(NavigateError::InvalidUrl { .. })
    ));
}

//! Deciding whether a click, keypress or submit becomes an in-place navigation.
//!
//! The browser crate turns DOM events into the plain inputs below; everything
//! here is pure and answers "take over, or let the browser do its thing".

use indextree::NodeId;
use url::Url;

use crate::config::Config;
use crate::dom::Document;
use crate::form::{FormMethod, FormModel, FormSource};
use crate::platform::FetchRequest;
use crate::tracing_macros::trace;

/// Per-element navigation directive
pub const NAVIGATE_ATTRIBUTE: &str = "data-pageturn";

/// Per-element prefetch directive
pub const PREFETCH_ATTRIBUTE: &str = "data-pageturn-prefetch";

/// An opt-in / opt-out attribute value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Directive {
    #[default]
    Unset,
    Enabled,
    Disabled,
}

impl Directive {
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("false") => Directive::Disabled,
            Some(v) if v.eq_ignore_ascii_case("true") => Directive::Enabled,
            _ => Directive::Unset,
        }
    }

    /// The directive, or `default` when unset
    pub fn resolve(self, default: bool) -> bool {
        match self {
            Directive::Unset => default,
            Directive::Enabled => true,
            Directive::Disabled => false,
        }
    }
}

/// What a link points at, and what it asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkTarget {
    /// `href`, resolved against the document URL
    pub url: Url,
    pub rel: Option<String>,
    pub target: Option<String>,
    pub download: bool,
    pub navigate: Directive,
    pub prefetch: Directive,
}

impl LinkTarget {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            rel: None,
            target: None,
            download: false,
            navigate: Directive::Unset,
            prefetch: Directive::Unset,
        }
    }

    /// Read an `<a>`/`<area>` element of an arena document. `None` without a usable `href`.
    pub fn from_anchor(doc: &Document, anchor: NodeId, base: &Url) -> Option<Self> {
        let href = doc.attr(anchor, "href")?;
        let url = base.join(href.trim()).ok()?;
        Some(Self {
            url,
            rel: doc.attr(anchor, "rel").map(str::to_string),
            target: doc.attr(anchor, "target").map(str::to_string),
            download: doc.attr(anchor, "download").is_some(),
            navigate: Directive::parse(doc.attr(anchor, NAVIGATE_ATTRIBUTE)),
            prefetch: Directive::parse(doc.attr(anchor, PREFETCH_ATTRIBUTE)),
        })
    }

    pub fn is_external(&self) -> bool {
        self.rel
            .as_deref()
            .is_some_and(|rel| rel.split_ascii_whitespace().any(|r| r.eq_ignore_ascii_case("external")))
    }

    /// Same-origin http(s) link that opens in this browsing context
    pub fn is_internal(&self, location: &Url) -> bool {
        matches!(self.url.scheme(), "http" | "https")
            && self.url.origin() == location.origin()
            && !self.is_external()
            && targets_self(self.target.as_deref())
            && !self.download
    }

    /// Only the fragment differs from `location`: the browser scrolls on its own
    pub fn is_fragment_of(&self, location: &Url) -> bool {
        self.url.fragment().is_some()
            && self.url[..url::Position::AfterQuery] == location[..url::Position::AfterQuery]
    }
}

fn targets_self(target: Option<&str>) -> bool {
    target.is_none_or(|t| {
        let t = t.trim();
        t.is_empty() || t.eq_ignore_ascii_case("_self")
    })
}

/// Modifier keys held during an event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub meta: bool,
}

impl Modifiers {
    pub fn any(&self) -> bool {
        self.ctrl || self.alt || self.shift || self.meta
    }
}

/// A click on (or inside) a link.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClickInput {
    pub default_prevented: bool,
    /// `MouseEvent.button`; 0 is the primary button
    pub button: i16,
    pub modifiers: Modifiers,
}

/// A keypress while a link is focused.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyInput {
    pub default_prevented: bool,
    pub key: String,
    /// The event target is the focused element
    pub target_is_focused: bool,
    pub modifiers: Modifiers,
}

/// A form submission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubmitInput {
    pub default_prevented: bool,
}

/// Link policy for clicks and Enter presses.
#[derive(Debug, Clone, Copy)]
pub struct VisitObserver {
    default_navigate: bool,
}

impl VisitObserver {
    pub fn new(config: &Config) -> Self {
        Self {
            default_navigate: config.default_navigate,
        }
    }

    /// URL to navigate to, or `None` to leave the click to the browser
    pub fn click(&self, input: &ClickInput, link: &LinkTarget, location: &Url) -> Option<Url> {
        if input.default_prevented || input.button != 0 || input.modifiers.any() {
            trace!(?input, "click left to the browser");
            return None;
        }
        self.link(link, location)
    }

    /// URL to navigate to for Enter on a focused link
    pub fn keypress(&self, input: &KeyInput, link: &LinkTarget, location: &Url) -> Option<Url> {
        if input.default_prevented
            || !input.target_is_focused
            || input.key != "Enter"
            || input.modifiers.any()
        {
            return None;
        }
        self.link(link, location)
    }

    fn link(&self, link: &LinkTarget, location: &Url) -> Option<Url> {
        if !link.is_internal(location) || link.is_fragment_of(location) {
            return None;
        }
        if !link.navigate.resolve(self.default_navigate) {
            trace!(url = %link.url, "link opted out");
            return None;
        }
        Some(link.url.clone())
    }
}

/// Form policy for submissions.
#[derive(Debug, Clone, Copy)]
pub struct SubmitObserver {
    default_navigate: bool,
}

impl SubmitObserver {
    pub fn new(config: &Config) -> Self {
        Self {
            default_navigate: config.default_navigate,
        }
    }

    /// Request to send in place, or `None` to let the browser submit
    pub fn submit<F: FormSource>(
        &self,
        input: &SubmitInput,
        form: &FormModel<'_, F>,
        location: &Url,
    ) -> Option<FetchRequest> {
        if input.default_prevented || form.method() == FormMethod::Dialog {
            return None;
        }
        if !targets_self(form.target().as_deref()) {
            return None;
        }
        if !form.directive().resolve(self.default_navigate) {
            trace!("form opted out");
            return None;
        }
        // File contents only exist in the browser's own submission
        if form.has_file_controls() && form.enctype() == crate::form::Enctype::Multipart {
            return None;
        }
        let request = form.request().ok()?;
        if request.url.origin() != location.origin() {
            return None;
        }
        Some(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::FormSnapshot;
    use crate::parse;

    fn location() -> Url {
        Url::parse("https://a.test/docs/page").unwrap()
    }

    fn link(href: &str) -> LinkTarget {
        LinkTarget::new(location().join(href).unwrap())
    }

    #[test]
    fn test_plain_click_navigates() {
        let observer = VisitObserver::new(&Config::default());
        let url = observer.click(&ClickInput::default(), &link("/next"), &location());
        assert_eq!(url.map(String::from).as_deref(), Some("https://a.test/next"));
    }

    #[test]
    fn test_click_rejections() {
        let observer = VisitObserver::new(&Config::default());
        let loc = location();

        let prevented = ClickInput {
            default_prevented: true,
            ..Default::default()
        };
        assert!(observer.click(&prevented, &link("/next"), &loc).is_none());

        let middle = ClickInput {
            button: 1,
            ..Default::default()
        };
        assert!(observer.click(&middle, &link("/next"), &loc).is_none());

        for modifiers in [
            Modifiers { ctrl: true, ..Default::default() },
            Modifiers { alt: true, ..Default::default() },
            Modifiers { shift: true, ..Default::default() },
            Modifiers { meta: true, ..Default::default() },
        ] {
            let input = ClickInput {
                modifiers,
                ..Default::default()
            };
            assert!(observer.click(&input, &link("/next"), &loc).is_none());
        }

        let click = ClickInput::default();
        assert!(observer.click(&click, &link("https://elsewhere.test/"), &loc).is_none());
        assert!(observer.click(&click, &link("mailto:a@a.test"), &loc).is_none());
        assert!(observer.click(&click, &link("#section"), &loc).is_none());

        let mut external = link("/next");
        external.rel = Some("nofollow external".into());
        assert!(observer.click(&click, &external, &loc).is_none());

        let mut blank = link("/next");
        blank.target = Some("_blank".into());
        assert!(observer.click(&click, &blank, &loc).is_none());

        let mut download = link("/file.pdf");
        download.download = true;
        assert!(observer.click(&click, &download, &loc).is_none());
    }

    #[test]
    fn test_directives_against_default() {
        let loc = location();
        let click = ClickInput::default();

        let opt_in_default = VisitObserver::new(&Config::default());
        let mut off = link("/next");
        off.navigate = Directive::Disabled;
        assert!(opt_in_default.click(&click, &off, &loc).is_none());

        let opt_out_default = VisitObserver::new(&Config {
            default_navigate: false,
            ..Config::default()
        });
        assert!(opt_out_default.click(&click, &link("/next"), &loc).is_none());
        let mut on = link("/next");
        on.navigate = Directive::Enabled;
        assert!(opt_out_default.click(&click, &on, &loc).is_some());
    }

    #[test]
    fn test_keypress_enter_on_focused_link() {
        let observer = VisitObserver::new(&Config::default());
        let loc = location();
        let enter = KeyInput {
            key: "Enter".into(),
            target_is_focused: true,
            ..Default::default()
        };
        assert!(observer.keypress(&enter, &link("/next"), &loc).is_some());

        let space = KeyInput {
            key: " ".into(),
            ..enter.clone()
        };
        assert!(observer.keypress(&space, &link("/next"), &loc).is_none());

        let unfocused = KeyInput {
            target_is_focused: false,
            ..enter
        };
        assert!(observer.keypress(&unfocused, &link("/next"), &loc).is_none());
    }

    #[test]
    fn test_link_from_anchor() {
        let doc = parse(
            r#"<html><body><a href="../other?q=1" rel="prefetch" data-pageturn="false" data-pageturn-prefetch="true" download>x</a></body></html>"#,
        );
        let a = doc.find_tag("a").unwrap();
        let link = LinkTarget::from_anchor(&doc, a, &location()).unwrap();
        assert_eq!(link.url.as_str(), "https://a.test/other?q=1");
        assert_eq!(link.navigate, Directive::Disabled);
        assert_eq!(link.prefetch, Directive::Enabled);
        assert!(link.download);

        let doc = parse("<html><body><a name=\"anchor\">x</a></body></html>");
        let a = doc.find_tag("a").unwrap();
        assert!(LinkTarget::from_anchor(&doc, a, &location()).is_none());
    }

    #[test]
    fn test_submit_policy() {
        let observer = SubmitObserver::new(&Config::default());
        let loc = location();
        let input = SubmitInput::default();

        let plain = FormSnapshot::new().with_attr("action", "/search").with_entry("q", "x");
        let request = observer.submit(&input, &FormModel::new(&plain, &loc), &loc);
        assert_eq!(
            request.map(|r| r.url.to_string()).as_deref(),
            Some("https://a.test/search?q=x")
        );

        let dialog = FormSnapshot::new().with_attr("method", "dialog");
        assert!(observer.submit(&input, &FormModel::new(&dialog, &loc), &loc).is_none());

        let offsite = FormSnapshot::new().with_attr("action", "https://pay.test/");
        assert!(observer.submit(&input, &FormModel::new(&offsite, &loc), &loc).is_none());

        let new_tab = FormSnapshot::new().with_attr("target", "_blank");
        assert!(observer.submit(&input, &FormModel::new(&new_tab, &loc), &loc).is_none());

        let opted_out = FormSnapshot::new().with_attr("data-pageturn", "false");
        assert!(observer.submit(&input, &FormModel::new(&opted_out, &loc), &loc).is_none());

        let mut upload = FormSnapshot::new()
            .with_attr("method", "post")
            .with_attr("enctype", "multipart/form-data");
        upload.has_files = true;
        assert!(observer.submit(&input, &FormModel::new(&upload, &loc), &loc).is_none());

        let prevented = SubmitInput {
            default_prevented: true,
        };
        assert!(observer.submit(&prevented, &FormModel::new(&plain, &loc), &loc).is_none());
    }
}

//! In-place page navigation for server-rendered sites.
//!
//! pageturn intercepts link clicks, form submissions and back/forward
//! navigation, fetches the next page's full HTML, and reconciles the live
//! document with it instead of letting the browser reload:
//!
//! - **Arena DOM**: html5ever parsing into an `indextree` arena, HTML5 serialization
//! - **Differ / Patcher**: breadth-first reconciliation, keyed inside `<head>`
//! - **Navigator / History**: fetch, diff, patch and scroll, mirrored onto the history API
//! - **Prefetch**: hover-delayed preload hints with a cooldown
//! - **Observers**: the policy deciding which clicks and submits are taken over
//!
//! Everything that touches the outside world goes through [`Platform`], so the
//! whole session runs on the host in tests; `pageturn-wasm` implements it for
//! browsers.
//!
//! # Example
//!
//! ```rust
//! use pageturn::{LiveDom, apply, diff, parse};
//!
//! let mut live = parse("<html><body><p>Hello</p></body></html>");
//! let next = parse("<html><body><p>Hello</p><p>World</p></body></html>");
//!
//! let patch = diff(&live.snapshot(), &next);
//! apply(&mut live, &patch);
//! assert_eq!(live.to_html(), "<p>Hello</p><p>World</p>");
//! ```

mod tracing_macros;

pub mod config;
pub mod diff;
pub mod dom;
pub mod error;
pub mod form;
pub mod history;
pub mod navigator;
pub mod node;
pub mod observe;
mod parser;
pub mod platform;
pub mod prefetch;
pub mod serialize;
pub mod session;

pub use config::Config;
pub use diff::{AttrValue, AttributePatch, LiveDom, NodePatch, Patch, apply, diff};
pub use dom::{Document, LOADING_CLASS, Namespace};
pub use error::NavigateError;
pub use form::{ArenaForm, FormBody, FormModel, FormSnapshot, FormSource};
pub use history::History;
pub use navigator::{NavigateOutcome, Navigator};
pub use node::{Element, Node};
pub use observe::{ClickInput, Directive, KeyInput, LinkTarget, Modifiers, SubmitInput};
pub use parser::{parse, parse_fragment};
pub use platform::{
    Fetch, FetchRequest, FetchResponse, HintId, HistoryHost, Method, Platform, PrefetchHost,
    ReadyState, ScrollPosition, SessionEvent, TimerId, TimerToken,
};
pub use prefetch::{PrefetchObserver, PrefetchState, Prefetcher};
pub use session::{Session, SessionHandle};

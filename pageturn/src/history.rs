//! Session history: a stack of navigators mirrored 1:1 onto the browser's.
//!
//! Each entry's stack index is what goes into `history.pushState`, so a
//! `popstate` tells us which navigator to replay.

use url::Url;

use crate::navigator::Navigator;
use crate::platform::{HistoryHost, SessionEvent};
use crate::tracing_macros::debug;

#[derive(Debug, Clone)]
pub struct History {
    entries: Vec<Navigator>,
    index: usize,
}

impl History {
    /// A stack holding the page the session started on
    pub fn new(current: Url) -> Self {
        Self {
            entries: vec![Navigator::new(current)],
            index: 0,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Navigator] {
        &self.entries
    }

    pub fn entry(&self, index: usize) -> Option<&Navigator> {
        self.entries.get(index)
    }

    pub fn current(&self) -> &Navigator {
        &self.entries[self.index]
    }

    /// Remember where the page is scrolled before leaving it
    pub fn save_scroll<H: HistoryHost>(&mut self, host: &H) {
        let position = host.scroll_position();
        self.entries[self.index].save_scroll(position);
    }

    /// Record a committed forward navigation.
    ///
    /// Entries after the current index are discarded, the way the browser
    /// discards its forward history.
    pub fn push<H: HistoryHost>(&mut self, host: &mut H, navigator: Navigator) {
        self.entries.truncate(self.index + 1);
        let url = navigator.url().to_string();
        self.entries.push(navigator);
        self.index = self.entries.len() - 1;
        debug!(index = self.index, %url, "history push");
        host.push_state(self.index, &url);
    }

    /// Handle `popstate`. Returns the index of the entry to replay.
    ///
    /// A missing state (entries pushed by someone else) means the first
    /// entry; indices past the end are clamped.
    pub fn pop_state<H: HistoryHost>(&mut self, host: &mut H, state: Option<usize>) -> usize {
        self.save_scroll(host);
        let index = state.unwrap_or(0).min(self.entries.len() - 1);
        self.index = index;
        let entry = &mut self.entries[index];
        entry.mark_restore();
        debug!(index, url = %entry.url(), "history pop");
        host.dispatch(SessionEvent::Restore {
            index,
            url: entry.url().to_string(),
        });
        index
    }

    /// Store a replayed navigator back into its slot
    pub fn replace(&mut self, index: usize, navigator: Navigator) {
        if let Some(slot) = self.entries.get_mut(index) {
            *slot = navigator;
        }
    }

    pub fn back<H: HistoryHost>(&self, host: &mut H) {
        host.go(-1);
    }

    pub fn forward<H: HistoryHost>(&self, host: &mut H) {
        host.go(1);
    }

    pub fn go<H: HistoryHost>(&self, host: &mut H, delta: i32) {
        host.go(delta);
    }
}

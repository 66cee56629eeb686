//! The history/URL seam.
//!
//! The router never touches a real address bar. It asks a `History`
//! implementation to record fragments, and whatever owns the history (a
//! browser shim, a test driver, the demo binary) feeds fragment changes back
//! into `Router::load_url`.

use std::collections::VecDeque;
use std::sync::Mutex;

use log::debug;

/// Options for a history write.
///
/// `trigger` asks the history owner to re-enter the router with the new
/// fragment; `replace` swaps the current entry instead of pushing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavigateOptions {
    pub trigger: bool,
    pub replace: bool,
}

impl Default for NavigateOptions {
    fn default() -> Self {
        // Matches the historical default: navigation triggers routing.
        Self {
            trigger: true,
            replace: false,
        }
    }
}

impl NavigateOptions {
    /// Silent write: update the URL without running routing.
    pub fn silent() -> Self {
        Self {
            trigger: false,
            replace: false,
        }
    }

    /// Silent replacement: used to roll the address bar back.
    pub fn silent_replace() -> Self {
        Self {
            trigger: false,
            replace: true,
        }
    }

    /// Triggering replacement: used for redirects.
    pub fn redirect() -> Self {
        Self {
            trigger: true,
            replace: true,
        }
    }
}

/// One recorded history write, kept for inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationRecord {
    pub fragment: String,
    pub options: NavigateOptions,
}

/// URL-bar plumbing as the router sees it.
pub trait History: Send + Sync {
    /// Save a fragment (or replace the current one). Returns `false` when
    /// the write was rejected.
    fn navigate(&self, fragment: &str, options: NavigateOptions) -> bool;

    /// Step back one entry.
    fn navigate_back(&self);

    /// The fragment currently showing.
    fn current_fragment(&self) -> String;
}

/// In-memory history: a plain entry stack plus a queue of triggered
/// fragments the owner drains and feeds back into the router.
#[derive(Default)]
pub struct MemoryHistory {
    state: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    stack: Vec<String>,
    records: Vec<NavigationRecord>,
    triggered: VecDeque<String>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drains fragments that were navigated with `trigger: true`. The owner
    /// is expected to call `Router::load_url` for each.
    pub fn take_triggered(&self) -> Vec<String> {
        self.state.lock().unwrap().triggered.drain(..).collect()
    }

    /// Every write made so far, in order.
    pub fn records(&self) -> Vec<NavigationRecord> {
        self.state.lock().unwrap().records.clone()
    }
}

impl History for MemoryHistory {
    fn navigate(&self, fragment: &str, options: NavigateOptions) -> bool {
        let mut state = self.state.lock().unwrap();
        debug!("History navigate: {fragment} ({options:?})");

        if options.replace {
            state.stack.pop();
        }
        state.stack.push(fragment.to_string());
        state.records.push(NavigationRecord {
            fragment: fragment.to_string(),
            options,
        });
        if options.trigger {
            state.triggered.push_back(fragment.to_string());
        }
        true
    }

    fn navigate_back(&self) {
        let mut state = self.state.lock().unwrap();
        state.stack.pop();
        if let Some(previous) = state.stack.last().cloned() {
            debug!("History back to: {previous}");
            state.triggered.push_back(previous);
        }
    }

    fn current_fragment(&self) -> String {
        self.state
            .lock()
            .unwrap()
            .stack
            .last()
            .cloned()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_navigate_pushes_and_triggers() {
        let history = MemoryHistory::new();
        history.navigate("home", NavigateOptions::default());
        history.navigate("about", NavigateOptions::silent());

        assert_eq!(history.current_fragment(), "about");
        assert_eq!(history.take_triggered(), vec!["home".to_string()]);
    }

    #[test]
    fn test_replace_swaps_top_entry() {
        let history = MemoryHistory::new();
        history.navigate("home", NavigateOptions::default());
        history.navigate("broken", NavigateOptions::silent());
        history.navigate("home", NavigateOptions::silent_replace());

        assert_eq!(history.current_fragment(), "home");
        let records = history.records();
        assert_eq!(records.len(), 3);
        assert!(records[2].options.replace);
    }

    #[test]
    fn test_navigate_back_triggers_previous() {
        let history = MemoryHistory::new();
        history.navigate("home", NavigateOptions::default());
        history.navigate("about", NavigateOptions::default());
        history.take_triggered();

        history.navigate_back();
        assert_eq!(history.current_fragment(), "home");
        assert_eq!(history.take_triggered(), vec!["home".to_string()]);
    }
}

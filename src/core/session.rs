//! Shared navigation session state.
//!
//! One session is shared by a router tree (the root router and every child).
//! It carries the cross-cutting flags that used to be ambient: whether the
//! current fragment change was explicitly requested, the URL bookkeeping for
//! rollback and child completion, and the case-sensitivity setting patterns
//! are compiled with.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// Created once per router tree; children receive a clone of the `Arc`.
#[derive(Debug)]
pub struct NavigationSession {
    /// Set when `navigate` was called with `trigger: true`; a fragment change
    /// arriving without it is treated as browser-driven (back/forward).
    explicit_navigation: AtomicBool,
    navigating_back: AtomicBool,
    /// Fixed at construction. Compiled patterns bake this in, so flipping it
    /// later would desynchronize them.
    case_sensitive: bool,
    urls: Mutex<SessionUrls>,
}

#[derive(Debug, Default)]
struct SessionUrls {
    /// Last fragment that completed successfully. Rollback target.
    last_url: String,
    /// Fragment of the attempt currently in flight.
    last_try_url: String,
}

impl NavigationSession {
    pub fn new(case_sensitive: bool) -> Self {
        Self {
            explicit_navigation: AtomicBool::new(false),
            navigating_back: AtomicBool::new(false),
            case_sensitive,
            urls: Mutex::new(SessionUrls::default()),
        }
    }

    pub fn case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    pub fn mark_explicit(&self) {
        self.explicit_navigation.store(true, Ordering::SeqCst);
    }

    pub fn is_explicit(&self) -> bool {
        self.explicit_navigation.load(Ordering::SeqCst)
    }

    pub fn set_navigating_back(&self, value: bool) {
        self.navigating_back.store(value, Ordering::SeqCst);
    }

    pub fn is_navigating_back(&self) -> bool {
        self.navigating_back.load(Ordering::SeqCst)
    }

    /// Clears the per-attempt flags. Runs at the end of every attempt,
    /// successful or not.
    pub fn reset_flags(&self) {
        self.explicit_navigation.store(false, Ordering::SeqCst);
        self.navigating_back.store(false, Ordering::SeqCst);
    }

    pub fn set_last_url(&self, url: &str) {
        self.urls.lock().unwrap().last_url = url.to_string();
    }

    pub fn last_url(&self) -> String {
        self.urls.lock().unwrap().last_url.clone()
    }

    pub fn set_try_url(&self, url: &str) {
        self.urls.lock().unwrap().last_try_url = url.to_string();
    }

    pub fn try_url(&self) -> String {
        self.urls.lock().unwrap().last_try_url.clone()
    }

    /// Commits the in-flight fragment as the new rollback target.
    pub fn promote_try_url(&self) {
        let mut urls = self.urls.lock().unwrap();
        urls.last_url = urls.last_try_url.clone();
    }
}

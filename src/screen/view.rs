//! Views, view hosts and the external presentation seams.
//!
//! A `ViewHost` stands in for the region of the UI a router composes into;
//! a `ViewHandle` is one concrete view instance living in a host. The actual
//! rendering technology is out of scope — locating templates and animating
//! swaps happen behind the `ViewLocator` and `TransitionProvider` traits.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use log::debug;
use uuid::Uuid;

use crate::screen::screen::{ResolveError, Screen};

/// One view instance. Cheap to clone; clones share identity and state.
#[derive(Clone)]
pub struct ViewHandle {
    inner: Arc<ViewInner>,
}

struct ViewInner {
    id: Uuid,
    /// The template name the view was created from (usually the screen id).
    name: String,
    /// Id of the screen the view is currently bound to, if any.
    bound_to: Mutex<Option<String>>,
    /// Attach guard: the `attached` hook must run at most once per instance.
    attached: AtomicBool,
    visible: AtomicBool,
}

impl ViewHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(ViewInner {
                id: Uuid::new_v4(),
                name: name.into(),
                bound_to: Mutex::new(None),
                attached: AtomicBool::new(false),
                visible: AtomicBool::new(false),
            }),
        }
    }

    /// Unique instance id. Two views created from the same template are
    /// still distinct instances.
    pub fn instance_id(&self) -> Uuid {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Binds the view to a screen. Returns `false` when the view was already
    /// bound to that same screen (a cached view needs no rebinding).
    pub fn bind(&self, screen_id: &str) -> bool {
        let mut bound = self.inner.bound_to.lock().unwrap();
        if bound.as_deref() == Some(screen_id) {
            return false;
        }
        debug!("Binding view {} to {}", self.inner.name, screen_id);
        *bound = Some(screen_id.to_string());
        true
    }

    pub fn bound_to(&self) -> Option<String> {
        self.inner.bound_to.lock().unwrap().clone()
    }

    /// Flips the attach guard. Returns `true` exactly once per instance.
    pub fn mark_attached(&self) -> bool {
        !self.inner.attached.swap(true, Ordering::SeqCst)
    }

    pub fn is_attached(&self) -> bool {
        self.inner.attached.load(Ordering::SeqCst)
    }

    pub fn show(&self) {
        self.inner.visible.store(true, Ordering::SeqCst);
    }

    pub fn hide(&self) {
        self.inner.visible.store(false, Ordering::SeqCst);
    }

    pub fn is_visible(&self) -> bool {
        self.inner.visible.load(Ordering::SeqCst)
    }

    /// Identity comparison (same instance, not same template).
    pub fn same_instance(&self, other: &ViewHandle) -> bool {
        self.inner.id == other.inner.id
    }
}

impl std::fmt::Debug for ViewHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewHandle")
            .field("name", &self.inner.name)
            .field("id", &self.inner.id)
            .finish()
    }
}

/// The composition target: holds child views and tracks which one is active.
pub struct ViewHost {
    label: String,
    state: Mutex<HostState>,
}

#[derive(Default)]
struct HostState {
    children: Vec<ViewHandle>,
    active: Option<ViewHandle>,
}

impl ViewHost {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            state: Mutex::new(HostState::default()),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn active_view(&self) -> Option<ViewHandle> {
        self.state.lock().unwrap().active.clone()
    }

    pub fn children(&self) -> Vec<ViewHandle> {
        self.state.lock().unwrap().children.clone()
    }

    pub fn contains(&self, view: &ViewHandle) -> bool {
        self.state
            .lock()
            .unwrap()
            .children
            .iter()
            .any(|c| c.same_instance(view))
    }

    /// Makes `view` the active child. When `cache_views` is false the
    /// previous view is removed from the host and returned so its screen can
    /// be notified; when true it is merely hidden.
    pub fn swap_to(&self, view: ViewHandle, cache_views: bool) -> Option<ViewHandle> {
        let mut state = self.state.lock().unwrap();
        let previous = state.active.take();

        let mut removed = None;
        if let Some(prev) = previous {
            if prev.same_instance(&view) {
                // Same view stays active; nothing to hide or remove.
                state.active = Some(view);
                state.active.as_ref().unwrap().show();
                return None;
            }
            prev.hide();
            if !cache_views {
                state.children.retain(|c| !c.same_instance(&prev));
                removed = Some(prev);
            }
        }

        if !state.children.iter().any(|c| c.same_instance(&view)) {
            state.children.push(view.clone());
        }
        view.show();
        state.active = Some(view);
        removed
    }

    /// Empties the host entirely (used by `Router::reset`).
    pub fn clear(&self) {
        let mut state = self.state.lock().unwrap();
        state.children.clear();
        state.active = None;
    }
}

impl std::fmt::Debug for ViewHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock().unwrap();
        f.debug_struct("ViewHost")
            .field("label", &self.label)
            .field("children", &state.children.len())
            .field("active", &state.active.as_ref().map(|v| v.name().to_string()))
            .finish()
    }
}

/// Finds or creates the view for a screen.
#[async_trait]
pub trait ViewLocator: Send + Sync {
    /// `cached` holds the host's existing children when view caching is on;
    /// a locator may return one of them instead of a fresh view.
    async fn locate(
        &self,
        screen: &dyn Screen,
        cached: &[ViewHandle],
    ) -> Result<ViewHandle, ResolveError>;
}

/// Default locator: one view per screen id, reusing a cached view whose
/// template name matches.
pub struct StaticViewLocator;

#[async_trait]
impl ViewLocator for StaticViewLocator {
    async fn locate(
        &self,
        screen: &dyn Screen,
        cached: &[ViewHandle],
    ) -> Result<ViewHandle, ResolveError> {
        if let Some(existing) = cached.iter().find(|v| v.name() == screen.id()) {
            debug!("View cache hit for {}", screen.id());
            return Ok(existing.clone());
        }
        Ok(ViewHandle::new(screen.id()))
    }
}

/// Everything a transition implementation gets to work with.
pub struct TransitionContext<'a> {
    pub host: &'a ViewHost,
    /// The view being brought in (absent when composing "nothing").
    pub incoming: Option<&'a ViewHandle>,
    /// The currently displayed view, if any.
    pub active: Option<&'a ViewHandle>,
}

/// A loaded transition implementation.
#[async_trait]
pub trait Transition: Send + Sync {
    async fn run(&self, ctx: TransitionContext<'_>) -> Result<(), ResolveError>;
}

/// Resolves transition names to implementations, asynchronously — the visual
/// implementation may live in a lazily loaded module.
#[async_trait]
pub trait TransitionProvider: Send + Sync {
    async fn load(&self, name: &str) -> Result<Arc<dyn Transition>, ResolveError>;
}

/// A provider whose transitions complete immediately. Useful for tests and
/// headless runs.
pub struct InstantTransitions;

struct InstantTransition;

#[async_trait]
impl Transition for InstantTransition {
    async fn run(&self, _ctx: TransitionContext<'_>) -> Result<(), ResolveError> {
        Ok(())
    }
}

#[async_trait]
impl TransitionProvider for InstantTransitions {
    async fn load(&self, name: &str) -> Result<Arc<dyn Transition>, ResolveError> {
        debug!("Loading transition: {name}");
        Ok(Arc::new(InstantTransition))
    }
}

/// Where the router publishes the document/tab title.
pub trait TitleSink: Send + Sync {
    fn set_title(&self, title: &str);
}

/// Discards titles.
pub struct NullTitleSink;

impl TitleSink for NullTitleSink {
    fn set_title(&self, _title: &str) {}
}

/// Records every title set; the last entry is the "current" title.
#[derive(Default)]
pub struct RecordingTitleSink {
    titles: Mutex<Vec<String>>,
}

impl RecordingTitleSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn titles(&self) -> Vec<String> {
        self.titles.lock().unwrap().clone()
    }

    pub fn current(&self) -> Option<String> {
        self.titles.lock().unwrap().last().cloned()
    }
}

impl TitleSink for RecordingTitleSink {
    fn set_title(&self, title: &str) {
        self.titles.lock().unwrap().push(title.to_string());
    }
}

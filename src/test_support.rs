//! Test utilities shared across the crate.
//!
//! This module is only compiled during tests (`#[cfg(test)]`).

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::compose::ComposeError;
use crate::core::activator::Activator;
use crate::core::pattern::ActivationParams;
use crate::core::router::Router;
use crate::screen::screen::{
    GuardError, GuardOutcome, ResolveError, Screen, ScreenLoader,
};
use crate::screen::view::{ViewHandle, ViewHost};

/// Shared lifecycle recorder. Entries look like `"home.activate"`.
pub type LifecycleLog = Arc<Mutex<Vec<String>>>;

pub fn lifecycle_log() -> LifecycleLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// A scriptable screen. Guards return `Allow` unless overridden, and every
/// hook appends to the lifecycle log when one is attached.
pub struct StubScreen {
    id: String,
    log: Option<LifecycleLog>,
    can_activate: GuardOutcome,
    activate: GuardOutcome,
    can_deactivate: GuardOutcome,
    guard_error: Option<(&'static str, String)>,
    reuse: Option<bool>,
    child_router: Mutex<Option<Arc<Router>>>,
}

impl StubScreen {
    pub fn named(id: impl Into<String>) -> StubScreenBuilder {
        StubScreenBuilder {
            id: id.into(),
            log: None,
            can_activate: GuardOutcome::Allow,
            activate: GuardOutcome::Allow,
            can_deactivate: GuardOutcome::Allow,
            guard_error: None,
            reuse: None,
        }
    }

    pub fn set_child_router(&self, router: Arc<Router>) {
        *self.child_router.lock().unwrap() = Some(router);
    }

    fn record(&self, hook: &str) {
        if let Some(log) = &self.log {
            log.lock().unwrap().push(format!("{}.{hook}", self.id));
        }
    }

    fn scripted(
        &self,
        hook: &'static str,
        outcome: &GuardOutcome,
    ) -> Result<GuardOutcome, GuardError> {
        self.record(hook);
        if let Some((failing_hook, message)) = &self.guard_error {
            if *failing_hook == hook {
                return Err(GuardError::new(hook, message.clone()));
            }
        }
        Ok(outcome.clone())
    }
}

#[async_trait]
impl Screen for StubScreen {
    fn id(&self) -> &str {
        &self.id
    }

    async fn can_activate(&self, _params: &ActivationParams) -> Result<GuardOutcome, GuardError> {
        self.scripted("can_activate", &self.can_activate)
    }

    async fn activate(&self, _params: &ActivationParams) -> Result<GuardOutcome, GuardError> {
        self.scripted("activate", &self.activate)
    }

    async fn can_deactivate(&self) -> Result<GuardOutcome, GuardError> {
        self.scripted("can_deactivate", &self.can_deactivate)
    }

    async fn deactivate(&self) {
        self.record("deactivate");
    }

    async fn attached(&self, _view: &ViewHandle, _host: &ViewHost) {
        self.record("attached");
    }

    async fn detached(&self, _view: &ViewHandle) {
        self.record("detached");
    }

    async fn composition_complete(&self) {
        self.record("composition_complete");
    }

    fn child_router(&self) -> Option<Arc<Router>> {
        self.child_router.lock().unwrap().clone()
    }

    fn can_reuse_for(&self, _params: &ActivationParams) -> Option<bool> {
        self.record("can_reuse_for");
        self.reuse
    }

    fn on_error(&self, _error: &ComposeError) -> bool {
        false
    }
}

pub struct StubScreenBuilder {
    id: String,
    log: Option<LifecycleLog>,
    can_activate: GuardOutcome,
    activate: GuardOutcome,
    can_deactivate: GuardOutcome,
    guard_error: Option<(&'static str, String)>,
    reuse: Option<bool>,
}

impl StubScreenBuilder {
    pub fn log(mut self, log: &LifecycleLog) -> Self {
        self.log = Some(Arc::clone(log));
        self
    }

    pub fn can_activate(mut self, outcome: GuardOutcome) -> Self {
        self.can_activate = outcome;
        self
    }

    pub fn activate(mut self, outcome: GuardOutcome) -> Self {
        self.activate = outcome;
        self
    }

    pub fn can_deactivate(mut self, outcome: GuardOutcome) -> Self {
        self.can_deactivate = outcome;
        self
    }

    /// Makes the named hook raise a `GuardError` instead of returning.
    pub fn guard_error(mut self, hook: &'static str, message: impl Into<String>) -> Self {
        self.guard_error = Some((hook, message.into()));
        self
    }

    pub fn reuse(mut self, reuse: bool) -> Self {
        self.reuse = Some(reuse);
        self
    }

    /// Builds the screen behind the trait object most call sites want.
    pub fn build(self) -> Arc<dyn Screen> {
        self.build_stub()
    }

    /// Builds the concrete type, for tests that wire a child router later.
    pub fn build_stub(self) -> Arc<StubScreen> {
        Arc::new(StubScreen {
            id: self.id,
            log: self.log,
            can_activate: self.can_activate,
            activate: self.activate,
            can_deactivate: self.can_deactivate,
            guard_error: self.guard_error,
            reuse: self.reuse,
            child_router: Mutex::new(None),
        })
    }
}

/// A loader that always fails, for resolution error paths.
pub struct FailingLoader {
    id: String,
}

impl FailingLoader {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

#[async_trait]
impl ScreenLoader for FailingLoader {
    fn id(&self) -> &str {
        &self.id
    }

    async fn load(&self) -> Result<Arc<dyn Screen>, ResolveError> {
        Err(ResolveError::Screen {
            id: self.id.clone(),
            message: "scripted load failure".to_string(),
        })
    }
}

/// A loader that succeeds after counting, for lazy-resolution tests.
pub struct CountingLoader {
    screen: Arc<dyn Screen>,
    loads: Mutex<usize>,
}

impl CountingLoader {
    pub fn new(screen: Arc<dyn Screen>) -> Self {
        Self {
            screen,
            loads: Mutex::new(0),
        }
    }

    pub fn loads(&self) -> usize {
        *self.loads.lock().unwrap()
    }
}

#[async_trait]
impl ScreenLoader for CountingLoader {
    fn id(&self) -> &str {
        self.screen.id()
    }

    async fn load(&self) -> Result<Arc<dyn Screen>, ResolveError> {
        *self.loads.lock().unwrap() += 1;
        Ok(Arc::clone(&self.screen))
    }
}

/// Builds an activator pre-loaded with one screen, without running hooks.
pub fn preloaded_activator(screen: Arc<dyn Screen>) -> Arc<Activator> {
    Arc::new(Activator::with_active(
        Default::default(),
        screen,
        ActivationParams::default(),
    ))
}

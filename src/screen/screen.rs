//! The screen lifecycle contract.
//!
//! A screen is one navigable unit of the application (a page, a panel, a
//! nested shell). The router never talks to concrete screen types; it drives
//! this trait through `Arc<dyn Screen>`, the same way an activation slot or a
//! composition step does.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::compose::ComposeError;
use crate::core::activator::Activator;
use crate::core::pattern::ActivationParams;
use crate::core::router::Router;
use crate::screen::view::{ViewHandle, ViewHost};

/// What a lifecycle guard decided.
///
/// Guards that simply return `Allow` let navigation proceed. `Cancel` aborts
/// the attempt and leaves the current screen in place. `Redirect` aborts the
/// attempt and asks the router to issue a replacing navigation instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome {
    Allow,
    Cancel,
    Redirect(String),
}

/// Error raised by a lifecycle guard hook.
///
/// Guard errors are never retried: they surface to the router, which logs
/// them and cancels the attempt rather than crashing the navigation pipeline.
#[derive(Debug)]
pub struct GuardError {
    /// Which hook failed (`"can_activate"`, `"activate"`, ...).
    pub hook: &'static str,
    pub message: String,
}

impl GuardError {
    pub fn new(hook: &'static str, message: impl Into<String>) -> Self {
        Self {
            hook,
            message: message.into(),
        }
    }
}

impl fmt::Display for GuardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "guard error in {}: {}", self.hook, self.message)
    }
}

impl std::error::Error for GuardError {}

/// Errors that can occur while resolving external resources.
#[derive(Debug)]
pub enum ResolveError {
    /// A lazily loaded screen failed to load. Carries the loader id.
    Screen { id: String, message: String },
    /// The view locator could not produce a view for a screen.
    View { screen: String, message: String },
    /// A named transition implementation failed to load.
    Transition { name: String, message: String },
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::Screen { id, message } => {
                write!(f, "failed to load screen ({id}): {message}")
            }
            ResolveError::View { screen, message } => {
                write!(f, "failed to locate view for {screen}: {message}")
            }
            ResolveError::Transition { name, message } => {
                write!(f, "failed to load transition ({name}): {message}")
            }
        }
    }
}

impl std::error::Error for ResolveError {}

/// A navigable unit with an optional guarded lifecycle.
///
/// Every hook has a permissive default so plain screens only implement `id`.
/// Hooks run in a fixed order per activation attempt:
/// `can_deactivate` (outgoing) → `can_activate` → `activate` (incoming) →
/// `deactivate` (outgoing, only after a confirmed swap) → `attached` →
/// `composition_complete`.
#[async_trait]
pub trait Screen: Send + Sync {
    /// Stable identifier, used for events, logging and view lookup.
    fn id(&self) -> &str;

    /// Whether this screen may become active with the given params.
    async fn can_activate(&self, _params: &ActivationParams) -> Result<GuardOutcome, GuardError> {
        Ok(GuardOutcome::Allow)
    }

    /// Activation hook, run after `can_activate` allowed the swap.
    async fn activate(&self, _params: &ActivationParams) -> Result<GuardOutcome, GuardError> {
        Ok(GuardOutcome::Allow)
    }

    /// Whether the screen may be deactivated (it is being replaced).
    async fn can_deactivate(&self) -> Result<GuardOutcome, GuardError> {
        Ok(GuardOutcome::Allow)
    }

    /// Teardown hook, run only once a different screen has taken the slot.
    async fn deactivate(&self) {}

    /// The screen's view was attached to its host. Runs at most once per
    /// view instance.
    async fn attached(&self, _view: &ViewHandle, _host: &ViewHost) {}

    /// The screen's bound view was discarded from its host.
    async fn detached(&self, _view: &ViewHandle) {}

    /// The composition transaction this screen participated in finished.
    async fn composition_complete(&self) {}

    /// A nested router hosted by this screen, if any.
    fn child_router(&self) -> Option<Arc<Router>> {
        None
    }

    /// Reuse predicate for param-only route changes. `None` means the screen
    /// has no opinion; the router then reuses only when a child router can
    /// absorb the change.
    fn can_reuse_for(&self, _params: &ActivationParams) -> Option<bool> {
        None
    }

    /// Screen-specific composition error handler. Return `true` when the
    /// error was handled; otherwise it goes to the process-wide sink.
    fn on_error(&self, _error: &ComposeError) -> bool {
        false
    }
}

/// Deferred screen construction, resolved at navigation time.
#[async_trait]
pub trait ScreenLoader: Send + Sync {
    /// Identifier used in logs and error messages.
    fn id(&self) -> &str;

    async fn load(&self) -> Result<Arc<dyn Screen>, ResolveError>;
}

/// What a route points at.
///
/// An explicit tagged variant: a ready screen instance, a lazy loader, or a
/// pre-existing activator slot whose current item should be shown.
#[derive(Clone)]
pub enum RouteTarget {
    Screen(Arc<dyn Screen>),
    Lazy(Arc<dyn ScreenLoader>),
    Activator(Arc<Activator>),
}

impl RouteTarget {
    /// A human-readable identifier for logs and map-time errors.
    pub fn describe(&self) -> String {
        match self {
            RouteTarget::Screen(screen) => screen.id().to_string(),
            RouteTarget::Lazy(loader) => loader.id().to_string(),
            RouteTarget::Activator(_) => "<activator>".to_string(),
        }
    }
}

impl fmt::Debug for RouteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteTarget::Screen(screen) => write!(f, "Screen({})", screen.id()),
            RouteTarget::Lazy(loader) => write!(f, "Lazy({})", loader.id()),
            RouteTarget::Activator(_) => write!(f, "Activator"),
        }
    }
}

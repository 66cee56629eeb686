//! Composition: turning a route target into a bound, attached view.
//!
//! The composer resolves the target to a screen, optionally runs the
//! activation guards, locates and binds a view, plays the transition and
//! swaps the host. Every step runs inside a `Transaction` so completion
//! callbacks fire exactly when the whole nested composition settles.

pub mod transaction;

use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use log::{debug, error, warn};

use crate::core::activator::{ActivateOptions, Activation, Activator};
use crate::core::pattern::ActivationParams;
use crate::screen::screen::{
    GuardError, GuardOutcome, ResolveError, RouteTarget, Screen,
};
use crate::screen::view::{
    TransitionContext, TransitionProvider, ViewHandle, ViewHost, ViewLocator,
};
pub use transaction::Transaction;

/// A composition step failed.
#[derive(Debug)]
pub enum ComposeError {
    /// A screen, view or transition could not be resolved.
    Resolve(ResolveError),
    /// A lifecycle guard raised an error (as opposed to refusing).
    Guard(GuardError),
    /// The target was an activator slot with nothing active in it.
    NoActiveScreen,
}

impl fmt::Display for ComposeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComposeError::Resolve(err) => write!(f, "composition failed: {err}"),
            ComposeError::Guard(err) => write!(f, "composition failed: {err}"),
            ComposeError::NoActiveScreen => {
                write!(f, "composition failed: activator slot holds no screen")
            }
        }
    }
}

impl std::error::Error for ComposeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ComposeError::Resolve(err) => Some(err),
            ComposeError::Guard(err) => Some(err),
            ComposeError::NoActiveScreen => None,
        }
    }
}

impl From<ResolveError> for ComposeError {
    fn from(err: ResolveError) -> Self {
        ComposeError::Resolve(err)
    }
}

impl From<GuardError> for ComposeError {
    fn from(err: GuardError) -> Self {
        ComposeError::Guard(err)
    }
}

/// Process-wide destination for composition errors no screen handled.
pub trait ErrorSink: Send + Sync {
    fn report(&self, error: &ComposeError);
}

/// Default sink: the error log.
pub struct LogErrorSink;

impl ErrorSink for LogErrorSink {
    fn report(&self, error: &ComposeError) {
        error!("{error}");
    }
}

/// What a finished composition produced.
pub enum ComposeOutcome {
    /// The screen's view is attached and active in the host.
    Composed {
        screen: Arc<dyn Screen>,
        view: ViewHandle,
    },
    /// An activation guard refused; the host is untouched.
    Skipped,
}

/// Per-call composition settings.
pub struct ComposeSettings {
    pub target: RouteTarget,
    pub params: ActivationParams,
    /// Named transition to play; `None` falls back to the composer default.
    pub transition: Option<String>,
    /// Override for the composer-wide view caching policy.
    pub cache_views: Option<bool>,
    /// Set when an activator already ran the guard chain for this swap.
    pub skip_activation: bool,
    /// Slot to activate through; without one the guards run directly.
    pub activator: Option<Arc<Activator>>,
    /// The screen whose view is being replaced, to notify on detach.
    pub previous: Option<Arc<dyn Screen>>,
}

impl ComposeSettings {
    pub fn for_target(target: RouteTarget) -> Self {
        Self {
            target,
            params: ActivationParams::default(),
            transition: None,
            cache_views: None,
            skip_activation: false,
            activator: None,
            previous: None,
        }
    }
}

/// The composition engine. One per router tree; stateless between calls.
pub struct Composer {
    view_locator: Arc<dyn ViewLocator>,
    transitions: Arc<dyn TransitionProvider>,
    error_sink: Arc<dyn ErrorSink>,
    default_transition: Option<String>,
    cache_views: bool,
}

impl Composer {
    pub fn new(
        view_locator: Arc<dyn ViewLocator>,
        transitions: Arc<dyn TransitionProvider>,
        error_sink: Arc<dyn ErrorSink>,
        default_transition: Option<String>,
        cache_views: bool,
    ) -> Self {
        Self {
            view_locator,
            transitions,
            error_sink,
            default_transition,
            cache_views,
        }
    }

    pub fn cache_views(&self) -> bool {
        self.cache_views
    }

    /// Runs one composition inside `txn`. The transaction step is balanced
    /// on every path, so failures still count toward the zero crossing.
    pub async fn compose(
        &self,
        host: &ViewHost,
        settings: ComposeSettings,
        txn: &Arc<Transaction>,
    ) -> Result<ComposeOutcome, ComposeError> {
        txn.begin();
        let result = self.compose_guarded(host, settings, txn).await;
        txn.end().await;
        result
    }

    async fn compose_guarded(
        &self,
        host: &ViewHost,
        settings: ComposeSettings,
        txn: &Arc<Transaction>,
    ) -> Result<ComposeOutcome, ComposeError> {
        let screen = match self.resolve(&settings.target).await {
            Ok(screen) => screen,
            Err(err) => {
                self.error_sink.report(&err);
                return Err(err);
            }
        };

        match self
            .compose_screen(host, Arc::clone(&screen), settings, txn)
            .await
        {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                if !screen.on_error(&err) {
                    self.error_sink.report(&err);
                }
                Err(err)
            }
        }
    }

    async fn resolve(&self, target: &RouteTarget) -> Result<Arc<dyn Screen>, ComposeError> {
        match target {
            RouteTarget::Screen(screen) => Ok(Arc::clone(screen)),
            RouteTarget::Lazy(loader) => Ok(loader.load().await?),
            RouteTarget::Activator(slot) => {
                slot.active_screen().await.ok_or(ComposeError::NoActiveScreen)
            }
        }
    }

    async fn compose_screen(
        &self,
        host: &ViewHost,
        screen: Arc<dyn Screen>,
        settings: ComposeSettings,
        txn: &Arc<Transaction>,
    ) -> Result<ComposeOutcome, ComposeError> {
        if !settings.skip_activation && !self.activate(&screen, &settings).await? {
            debug!("Composition of {} skipped by activation guard", screen.id());
            return Ok(ComposeOutcome::Skipped);
        }

        // The screen hears about completion even if a later step fails; the
        // transaction step for this composition is already counted.
        let completion_screen = Arc::clone(&screen);
        txn.on_complete(move || -> BoxFuture<'static, ()> {
            Box::pin(async move {
                completion_screen.composition_complete().await;
            })
        });

        let cache_views = settings.cache_views.unwrap_or(self.cache_views);
        let cached = if cache_views {
            host.children()
        } else {
            Vec::new()
        };
        let view = self.view_locator.locate(screen.as_ref(), &cached).await?;
        view.bind(screen.id());

        let active = host.active_view();
        let entering = active
            .as_ref()
            .map_or(true, |current| !current.same_instance(&view));

        if entering {
            if let Some(name) = settings.transition.as_deref().or(self.default_transition.as_deref())
            {
                let transition = self.transitions.load(name).await?;
                transition
                    .run(TransitionContext {
                        host,
                        incoming: Some(&view),
                        active: active.as_ref(),
                    })
                    .await?;
            }
        }

        let removed = host.swap_to(view.clone(), cache_views);
        if let Some(removed_view) = removed {
            if let Some(previous) = &settings.previous {
                previous.detached(&removed_view).await;
            } else {
                warn!(
                    "Discarded view {} with no owning screen to notify",
                    removed_view.name()
                );
            }
        }

        if view.mark_attached() {
            screen.attached(&view, host).await;
        }

        Ok(ComposeOutcome::Composed { screen, view })
    }

    /// Direct guard path for compositions running outside an activator.
    async fn activate(
        &self,
        screen: &Arc<dyn Screen>,
        settings: &ComposeSettings,
    ) -> Result<bool, GuardError> {
        if let Some(slot) = &settings.activator {
            let outcome = slot
                .activate_item(
                    Arc::clone(screen),
                    settings.params.clone(),
                    ActivateOptions::default(),
                )
                .await?;
            return Ok(outcome == Activation::Activated);
        }

        match screen.can_activate(&settings.params).await? {
            GuardOutcome::Allow => {}
            _ => return Ok(false),
        }
        match screen.activate(&settings.params).await? {
            GuardOutcome::Allow => Ok(true),
            _ => Ok(false),
        }
    }
}

//! The activation slot.
//!
//! An `Activator` owns one "active screen" slot and enforces the guarded
//! swap protocol on every change: the outgoing screen (and its nested
//! activators) may veto, then the incoming screen may veto, and only then
//! does the slot flip and the old screen get deactivated.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::future::BoxFuture;
use log::{debug, info};
use tokio::sync::Mutex;

use crate::core::pattern::ActivationParams;
use crate::screen::screen::{GuardError, GuardOutcome, Screen};

/// Outcome of an activation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Activation {
    /// The candidate holds the slot now.
    Activated,
    /// A guard said no; the slot is unchanged.
    Refused,
    /// A guard asked for a different destination; the slot is unchanged.
    Redirect(String),
}

/// Per-attempt switches.
#[derive(Debug, Clone, Copy)]
pub struct ActivateOptions {
    /// Whether to consult the outgoing screen. Child routers skip this leg
    /// because the parent's guard chain already cascaded into them.
    pub can_deactivate: bool,
}

impl Default for ActivateOptions {
    fn default() -> Self {
        Self {
            can_deactivate: true,
        }
    }
}

type SameItemFn = dyn Fn(&Arc<dyn Screen>, &ActivationParams, &Arc<dyn Screen>, &ActivationParams) -> bool
    + Send
    + Sync;
type ChildActivatorFn = dyn Fn(&Arc<dyn Screen>) -> Option<Arc<Activator>> + Send + Sync;

/// Pluggable policy hooks.
#[derive(Clone)]
pub struct ActivatorSettings {
    /// Decides whether an attempt is a no-op. The default treats the same
    /// screen instance with equal params as the same item.
    pub are_same_item: Arc<SameItemFn>,
    /// Locates a nested activator inside a screen so deactivation guards
    /// cascade depth-first.
    pub find_child_activator: Option<Arc<ChildActivatorFn>>,
}

impl Default for ActivatorSettings {
    fn default() -> Self {
        Self {
            are_same_item: Arc::new(|current, current_params, candidate, params| {
                Arc::ptr_eq(current, candidate) && current_params == params
            }),
            find_child_activator: None,
        }
    }
}

struct ActiveEntry {
    screen: Arc<dyn Screen>,
    params: ActivationParams,
}

/// The slot. Shared via `Arc`; all mutation goes through `activate_item`.
pub struct Activator {
    settings: ActivatorSettings,
    active: Mutex<Option<ActiveEntry>>,
    busy: AtomicBool,
}

impl Activator {
    pub fn new(settings: ActivatorSettings) -> Self {
        Self {
            settings,
            active: Mutex::new(None),
            busy: AtomicBool::new(false),
        }
    }

    /// Builds a slot already holding a screen, without running any hooks.
    /// Used to replay the guard chain against the current activation.
    pub fn with_active(
        settings: ActivatorSettings,
        screen: Arc<dyn Screen>,
        params: ActivationParams,
    ) -> Self {
        Self {
            settings,
            active: Mutex::new(Some(ActiveEntry { screen, params })),
            busy: AtomicBool::new(false),
        }
    }

    pub async fn active_screen(&self) -> Option<Arc<dyn Screen>> {
        self.active.lock().await.as_ref().map(|e| Arc::clone(&e.screen))
    }

    pub async fn active_params(&self) -> Option<ActivationParams> {
        self.active.lock().await.as_ref().map(|e| e.params.clone())
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Runs the guarded swap protocol for `candidate`.
    ///
    /// Hook order: outgoing `can_deactivate` (cascading into nested
    /// activators first), incoming `can_activate`, incoming `activate`, the
    /// swap itself, then outgoing `deactivate`. A same-item attempt (same
    /// instance, equal params) short-circuits to `Activated` with no hooks.
    pub async fn activate_item(
        &self,
        candidate: Arc<dyn Screen>,
        params: ActivationParams,
        options: ActivateOptions,
    ) -> Result<Activation, GuardError> {
        let mut active = self.active.lock().await;

        if let Some(entry) = active.as_ref() {
            if (self.settings.are_same_item)(&entry.screen, &entry.params, &candidate, &params) {
                debug!("Activation short-circuit for {}", candidate.id());
                return Ok(Activation::Activated);
            }
        }

        self.busy.store(true, Ordering::SeqCst);
        let result = self.run_swap(&mut active, candidate, params, options).await;
        self.busy.store(false, Ordering::SeqCst);
        result
    }

    async fn run_swap(
        &self,
        active: &mut Option<ActiveEntry>,
        candidate: Arc<dyn Screen>,
        params: ActivationParams,
        options: ActivateOptions,
    ) -> Result<Activation, GuardError> {
        if options.can_deactivate {
            if let Some(entry) = active.as_ref() {
                match self.can_deactivate_chain(Arc::clone(&entry.screen)).await? {
                    GuardOutcome::Allow => {}
                    GuardOutcome::Cancel => {
                        info!("Deactivation refused by {}", entry.screen.id());
                        return Ok(Activation::Refused);
                    }
                    GuardOutcome::Redirect(url) => return Ok(Activation::Redirect(url)),
                }
            }
        }

        match candidate.can_activate(&params).await? {
            GuardOutcome::Allow => {}
            GuardOutcome::Cancel => {
                info!("Activation refused by {}", candidate.id());
                return Ok(Activation::Refused);
            }
            GuardOutcome::Redirect(url) => return Ok(Activation::Redirect(url)),
        }

        match candidate.activate(&params).await? {
            GuardOutcome::Allow => {}
            GuardOutcome::Cancel => {
                info!("Activate hook refused by {}", candidate.id());
                return Ok(Activation::Refused);
            }
            GuardOutcome::Redirect(url) => return Ok(Activation::Redirect(url)),
        }

        let previous = active.replace(ActiveEntry {
            screen: Arc::clone(&candidate),
            params,
        });

        if let Some(prev) = previous {
            if !Arc::ptr_eq(&prev.screen, &candidate) {
                prev.screen.deactivate().await;
            }
        }

        debug!("Slot now holds {}", candidate.id());
        Ok(Activation::Activated)
    }

    /// Deactivation guard for `screen`, asking any nested activator first so
    /// the deepest screens get the earliest veto.
    fn can_deactivate_chain(
        &self,
        screen: Arc<dyn Screen>,
    ) -> BoxFuture<'_, Result<GuardOutcome, GuardError>> {
        Box::pin(async move {
            if let Some(find) = &self.settings.find_child_activator {
                if let Some(child) = find(&screen) {
                    if let Some(child_screen) = child.active_screen().await {
                        match child.can_deactivate_chain(child_screen).await? {
                            GuardOutcome::Allow => {}
                            other => return Ok(other),
                        }
                    }
                }
            }
            screen.can_deactivate().await
        })
    }

    /// Refreshes the stored params after a reuse navigation replayed the
    /// guard chain out of band. No hooks run.
    pub(crate) async fn set_active_params(&self, params: ActivationParams) {
        if let Some(entry) = self.active.lock().await.as_mut() {
            entry.params = params;
        }
    }

    /// Drops the active entry without running guards. Deactivation still
    /// fires so the screen can release resources.
    pub async fn clear(&self) {
        let previous = self.active.lock().await.take();
        if let Some(entry) = previous {
            entry.screen.deactivate().await;
        }
    }
}

impl Default for Activator {
    fn default() -> Self {
        Self::new(ActivatorSettings::default())
    }
}

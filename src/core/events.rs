//! Typed router events.
//!
//! Every observable moment in the navigation pipeline is published on a
//! broadcast channel as a `RouterEvent` variant. Subscribers get their own
//! receiver; publishing never blocks and never fails just because nobody is
//! listening.

use std::sync::{Arc, Mutex};

use log::{debug, warn};
use tokio::sync::broadcast;

use crate::core::route::{RouteConfig, RoutingInstruction};

const CHANNEL_CAPACITY: usize = 64;

/// Everything the router announces, in pipeline order.
#[derive(Debug, Clone)]
pub enum RouterEvent {
    /// A navigation attempt started processing.
    Processing { instruction: Arc<RoutingInstruction> },
    /// The attempt completed and its screen is active.
    Complete { instruction: Arc<RoutingInstruction> },
    /// The attempt was cancelled by a guard or a failure.
    Cancelled { instruction: Arc<RoutingInstruction> },
    /// A composed view was attached to its host.
    Attached { instruction: Arc<RoutingInstruction> },
    /// The composition transaction for the attempt drained to zero.
    CompositionComplete {
        instruction: Option<Arc<RoutingInstruction>>,
    },
    /// No registered route matched the fragment.
    NotFound { fragment: String },
    /// A route table entry is about to be normalized and compiled.
    BeforeConfig { route: Arc<RouteConfig> },
    /// A route table entry was normalized and compiled.
    AfterConfig { route: Arc<RouteConfig> },
    /// A screen lost the active slot.
    NavigatedFrom { screen_id: String },
    /// A screen took the active slot.
    NavigatedTo { screen_id: String },
    /// A parent route is about to delegate its tail to a child router.
    BeforeChildRoutes { instruction: Arc<RoutingInstruction> },
}

impl RouterEvent {
    /// Short tag for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            RouterEvent::Processing { .. } => "processing",
            RouterEvent::Complete { .. } => "complete",
            RouterEvent::Cancelled { .. } => "cancelled",
            RouterEvent::Attached { .. } => "attached",
            RouterEvent::CompositionComplete { .. } => "composition-complete",
            RouterEvent::NotFound { .. } => "not-found",
            RouterEvent::BeforeConfig { .. } => "before-config",
            RouterEvent::AfterConfig { .. } => "after-config",
            RouterEvent::NavigatedFrom { .. } => "navigated-from",
            RouterEvent::NavigatedTo { .. } => "navigated-to",
            RouterEvent::BeforeChildRoutes { .. } => "before-child-routes",
        }
    }
}

/// Per-router broadcast channel.
pub struct EventChannel {
    sender: Mutex<broadcast::Sender<RouterEvent>>,
}

impl EventChannel {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            sender: Mutex::new(sender),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RouterEvent> {
        self.sender.lock().unwrap().subscribe()
    }

    /// Publishes an event. Having no subscribers is normal and ignored.
    pub fn publish(&self, event: RouterEvent) {
        debug!("Router event: {}", event.kind());
        // A send error only means there are no receivers right now.
        let _ = self.sender.lock().unwrap().send(event);
    }

    /// Drops every existing subscription by swapping in a fresh channel.
    pub fn reset(&self) {
        let mut sender = self.sender.lock().unwrap();
        if sender.receiver_count() > 0 {
            warn!(
                "Resetting event channel with {} live subscriber(s)",
                sender.receiver_count()
            );
        }
        let (fresh, _) = broadcast::channel(CHANNEL_CAPACITY);
        *sender = fresh;
    }
}

impl Default for EventChannel {
    fn default() -> Self {
        Self::new()
    }
}

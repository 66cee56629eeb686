//! The navigation coordinator.
//!
//! A router owns a route table, an activation slot and a view host. Fragments
//! come in through `load_url`, get matched against the table in registration
//! order, and flow through the pipeline: router guard, activation guards,
//! composition, completion bookkeeping, then optional delegation of the
//! fragment tail to a child router. At most one navigation is in flight per
//! router; newer requests collapse into a latest-wins queue slot.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use futures::future::BoxFuture;
use log::{debug, info, warn};
use tokio::sync::broadcast;

use crate::compose::{
    ComposeError, ComposeOutcome, ComposeSettings, Composer, ErrorSink, Transaction,
};
use crate::core::activator::{ActivateOptions, Activation, Activator, ActivatorSettings};
use crate::core::events::{EventChannel, RouterEvent};
use crate::core::pattern::{fill_params, ActivationParams, RoutePattern};
use crate::core::queue::NavigationQueue;
use crate::core::route::{
    convert_route_to_hash, convert_route_to_title, MapError, Nav, RouteConfig, RouteSpec,
    RoutingInstruction,
};
use crate::core::session::NavigationSession;
use crate::screen::history::{History, NavigateOptions};
use crate::screen::screen::{GuardOutcome, RouteTarget, Screen};
use crate::screen::view::{TitleSink, ViewHost};

const CATCHALL_ROUTE: &str = "*catchall";
const CHILD_ROUTES_SUFFIX: &str = "*childRoutes";

/// Router-level guard, consulted before any screen guard runs.
pub type NavigationGuard =
    Arc<dyn Fn(Arc<RoutingInstruction>) -> BoxFuture<'static, GuardOutcome> + Send + Sync>;

/// What to do with a fragment no registered route matched.
pub enum UnknownRoutePolicy {
    /// Issue a replacing navigation to a known route.
    RedirectTo(String),
    /// Compose a fixed target for whatever the fragment was.
    Compose {
        target: RouteTarget,
        title: Option<String>,
        /// Silently rewrite the address bar before composing.
        replace_route: Option<String>,
    },
    /// Decide per fragment; `None` falls through to not-found handling.
    Custom(Arc<dyn Fn(&str) -> Option<UnknownRouteAction> + Send + Sync>),
}

/// A custom unknown-route decision.
pub enum UnknownRouteAction {
    Redirect(String),
    Compose {
        target: RouteTarget,
        title: Option<String>,
    },
}

enum RouteHandler {
    Config(Arc<RouteConfig>),
    Unknown {
        pattern: RoutePattern,
        policy: UnknownRoutePolicy,
    },
}

#[derive(Default)]
struct RouterState {
    /// Instruction currently being processed.
    current_instruction: Option<Arc<RoutingInstruction>>,
    /// Instruction of the last completed navigation.
    active_instruction: Option<Arc<RoutingInstruction>>,
    /// Screen holding the slot after the last completed navigation.
    current_activation: Option<Arc<dyn Screen>>,
}

enum AttemptOutcome {
    Completed,
    Cancelled,
    Redirected,
}

type QueueItem = (Arc<RoutingInstruction>, Option<Arc<Transaction>>);

/// One navigation coordinator. Roots are built with `RouterBuilder`; nested
/// routers come from `create_child_router` and share the session, history
/// and composer of their root.
pub struct Router {
    session: Arc<NavigationSession>,
    weak_self: Weak<Router>,
    parent: Weak<Router>,
    children: Mutex<Vec<Weak<Router>>>,
    route_prefix: Mutex<Option<String>>,
    handlers: Mutex<Vec<RouteHandler>>,
    routes: Mutex<Vec<Arc<RouteConfig>>>,
    navigation_model: Mutex<Vec<Arc<RouteConfig>>>,
    queue: Mutex<NavigationQueue<QueueItem>>,
    activator: Arc<Activator>,
    activator_settings: ActivatorSettings,
    events: EventChannel,
    state: Mutex<RouterState>,
    guard: Mutex<Option<NavigationGuard>>,
    composer: Arc<Composer>,
    history: Arc<dyn History>,
    title_sink: Arc<dyn TitleSink>,
    error_sink: Arc<dyn ErrorSink>,
    app_title: Option<String>,
    host: Arc<ViewHost>,
}

impl Router {
    #[allow(clippy::too_many_arguments)]
    fn new_internal(
        session: Arc<NavigationSession>,
        parent: Weak<Router>,
        composer: Arc<Composer>,
        history: Arc<dyn History>,
        title_sink: Arc<dyn TitleSink>,
        error_sink: Arc<dyn ErrorSink>,
        app_title: Option<String>,
        host: Arc<ViewHost>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<Router>| {
            let me = weak.clone();
            let settings = ActivatorSettings {
                find_child_activator: Some(Arc::new(move |screen: &Arc<dyn Screen>| {
                    let me = me.upgrade()?;
                    let child = screen.child_router()?;
                    let child_parent = child.parent.upgrade()?;
                    Arc::ptr_eq(&child_parent, &me).then(|| Arc::clone(&child.activator))
                })),
                ..Default::default()
            };

            Router {
                session,
                weak_self: weak.clone(),
                parent,
                children: Mutex::new(Vec::new()),
                route_prefix: Mutex::new(None),
                handlers: Mutex::new(Vec::new()),
                routes: Mutex::new(Vec::new()),
                navigation_model: Mutex::new(Vec::new()),
                queue: Mutex::new(NavigationQueue::new()),
                activator: Arc::new(Activator::new(settings.clone())),
                activator_settings: settings,
                events: EventChannel::new(),
                state: Mutex::new(RouterState::default()),
                guard: Mutex::new(None),
                composer,
                history,
                title_sink,
                error_sink,
                app_title,
                host,
            }
        })
    }

    /// Owned handle for futures that outlive the borrow. Routers only exist
    /// behind an `Arc`, so the upgrade cannot fail while `self` is alive.
    fn strong(&self) -> Arc<Router> {
        self.weak_self.upgrade().expect("router behind an Arc")
    }

    /// Builds a nested router composing into `host`. It shares the session,
    /// history and composer with this router and receives fragment tails
    /// from it once its hosting route activates.
    pub fn create_child_router(&self, host: Arc<ViewHost>) -> Arc<Router> {
        let child = Router::new_internal(
            Arc::clone(&self.session),
            self.weak_self.clone(),
            Arc::clone(&self.composer),
            Arc::clone(&self.history),
            Arc::clone(&self.title_sink),
            Arc::clone(&self.error_sink),
            self.app_title.clone(),
            host,
        );
        self.children.lock().unwrap().push(Arc::downgrade(&child));
        child
    }

    pub fn parent(&self) -> Option<Arc<Router>> {
        self.parent.upgrade()
    }

    pub fn session(&self) -> &Arc<NavigationSession> {
        &self.session
    }

    pub fn host(&self) -> &Arc<ViewHost> {
        &self.host
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RouterEvent> {
        self.events.subscribe()
    }

    /// The screen currently holding the slot.
    pub fn active_screen(&self) -> Option<Arc<dyn Screen>> {
        self.state.lock().unwrap().current_activation.clone()
    }

    /// Instruction of the last completed navigation.
    pub fn active_instruction(&self) -> Option<Arc<RoutingInstruction>> {
        self.state.lock().unwrap().active_instruction.clone()
    }

    /// True while this router or any descendant has a navigation in flight.
    pub fn is_navigating(&self) -> bool {
        if self.queue.lock().unwrap().is_busy() || self.activator.is_busy() {
            return true;
        }
        self.children
            .lock()
            .unwrap()
            .iter()
            .filter_map(Weak::upgrade)
            .any(|child| child.is_navigating())
    }

    /// Installs a guard consulted for every instruction before screen-level
    /// guards run.
    pub fn set_navigation_guard(&self, guard: NavigationGuard) {
        *self.guard.lock().unwrap() = Some(guard);
    }

    // =========================================================================
    // Route table
    // =========================================================================

    /// Prefixes every subsequently mapped route (and derived hash) with
    /// `prefix`. Call before `map`.
    pub fn make_relative(&self, prefix: impl Into<String>) {
        *self.route_prefix.lock().unwrap() = Some(prefix.into());
    }

    /// Registers a route. Multi-pattern specs produce one config per pattern
    /// sharing a single active flag; only the first pattern carries the nav
    /// placement. Returns the primary config.
    pub fn map(&self, spec: RouteSpec) -> Result<Arc<RouteConfig>, MapError> {
        let target = spec.target.clone().ok_or_else(|| MapError::MissingTarget {
            route: spec.route.first().cloned().unwrap_or_default(),
        })?;

        let shared_active = Arc::new(AtomicBool::new(false));
        let mut primary = None;

        for (index, route) in spec.route.iter().enumerate() {
            let nav = if index == 0 { spec.nav } else { Nav::Hidden };
            let config = self.configure_route(route, &spec, target.clone(), &shared_active, nav)?;
            if primary.is_none() {
                primary = Some(config);
            }
        }

        // RouteSpec::new always seeds one pattern, so primary is set.
        Ok(primary.expect("route spec carries at least one pattern"))
    }

    fn configure_route(
        &self,
        route: &str,
        spec: &RouteSpec,
        target: RouteTarget,
        shared_active: &Arc<AtomicBool>,
        nav: Nav,
    ) -> Result<Arc<RouteConfig>, MapError> {
        let mut route = match self.route_prefix.lock().unwrap().as_deref() {
            Some(prefix) if route.is_empty() => prefix.to_string(),
            Some(prefix) => format!("{prefix}/{route}"),
            None => route.to_string(),
        };

        if spec.children {
            route.push_str(CHILD_ROUTES_SUFFIX);
        }

        let title = spec
            .title
            .clone()
            .unwrap_or_else(|| convert_route_to_title(&route));
        let hash = spec.hash.clone().unwrap_or_else(|| convert_route_to_hash(&route));
        let pattern = RoutePattern::compile(&route, self.session.case_sensitive())?;

        let config = Arc::new(RouteConfig::new(
            route.clone(),
            title,
            target,
            hash,
            spec.children,
            pattern,
            Arc::clone(shared_active),
            nav,
        ));

        self.events.publish(RouterEvent::BeforeConfig {
            route: Arc::clone(&config),
        });

        debug!("Mapped route {:?} -> {}", route, config.target().describe());
        self.handlers
            .lock()
            .unwrap()
            .push(RouteHandler::Config(Arc::clone(&config)));
        self.routes.lock().unwrap().push(Arc::clone(&config));

        self.events.publish(RouterEvent::AfterConfig {
            route: Arc::clone(&config),
        });

        Ok(config)
    }

    /// Installs a catch-all handler for fragments no route matched. Applies
    /// to fragments checked after registration, so map known routes first.
    pub fn map_unknown_routes(&self, policy: UnknownRoutePolicy) {
        // The catch-all template always compiles.
        let pattern = RoutePattern::compile(CATCHALL_ROUTE, self.session.case_sensitive())
            .expect("catch-all pattern compiles");
        self.handlers
            .lock()
            .unwrap()
            .push(RouteHandler::Unknown { pattern, policy });
    }

    pub fn routes(&self) -> Vec<Arc<RouteConfig>> {
        self.routes.lock().unwrap().clone()
    }

    /// Collects the visible routes, assigning sequential orders starting at
    /// `default_order` to entries without an explicit one, and sorts.
    pub fn build_navigation_model(&self, default_order: i64) {
        let routes = self.routes.lock().unwrap().clone();
        let mut next = default_order;
        let mut model: Vec<(i64, Arc<RouteConfig>)> = Vec::new();

        for config in routes {
            match config.nav() {
                Nav::Hidden => {}
                Nav::Auto => {
                    config.set_nav(Nav::Order(next));
                    model.push((next, config));
                    next += 1;
                }
                Nav::Order(order) => model.push((order, config)),
            }
        }

        model.sort_by_key(|(order, _)| *order);
        *self.navigation_model.lock().unwrap() =
            model.into_iter().map(|(_, config)| config).collect();
    }

    pub fn navigation_model(&self) -> Vec<Arc<RouteConfig>> {
        self.navigation_model.lock().unwrap().clone()
    }

    /// Clears the route table, queue, slot, host and subscriptions.
    pub async fn reset(&self) {
        self.handlers.lock().unwrap().clear();
        self.routes.lock().unwrap().clear();
        self.navigation_model.lock().unwrap().clear();
        *self.queue.lock().unwrap() = NavigationQueue::new();
        *self.guard.lock().unwrap() = None;
        *self.state.lock().unwrap() = RouterState::default();
        self.activator.clear().await;
        self.events.reset();
        self.host.clear();
    }

    // =========================================================================
    // Navigation entry points
    // =========================================================================

    /// Requests a history change. `trigger: true` marks the session explicit
    /// and expects the history owner to feed the fragment back into
    /// `load_url`; `trigger: false` just records the fragment as the new
    /// rollback target. Absolute URLs pass straight through.
    pub fn navigate(&self, fragment: &str, options: NavigateOptions) -> bool {
        if fragment.contains("://") {
            return self.history.navigate(fragment, options);
        }

        if options.trigger {
            self.session.mark_explicit();
        } else {
            self.session.set_last_url(fragment);
        }
        self.history.navigate(fragment, options)
    }

    pub fn navigate_back(&self) {
        self.history.navigate_back();
    }

    /// Matches a fragment against the route table and, on a match, queues
    /// the navigation and drives it to completion. Returns whether any
    /// handler claimed the fragment.
    pub fn load_url(&self, fragment: &str) -> BoxFuture<'static, bool> {
        let this = self.strong();
        let fragment = fragment.to_string();
        Box::pin(async move { this.load_url_inner(&fragment, None).await })
    }

    fn load_url_with_txn(
        &self,
        fragment: String,
        txn: Arc<Transaction>,
    ) -> BoxFuture<'static, bool> {
        let this = self.strong();
        Box::pin(async move { this.load_url_inner(&fragment, Some(txn)).await })
    }

    async fn load_url_inner(&self, fragment: &str, txn: Option<Arc<Transaction>>) -> bool {
        let (core, query) = split_fragment(fragment);
        let core = core.trim_end_matches('/');

        if self.parent.upgrade().is_none() {
            self.session.set_try_url(fragment);
        }

        enum Matched {
            Instruction(Arc<RoutingInstruction>),
            Action(UnknownRouteAction, Option<String>),
        }

        let matched = {
            let handlers = self.handlers.lock().unwrap();
            let mut found = None;
            for handler in handlers.iter() {
                match handler {
                    RouteHandler::Config(config) if config.pattern().is_match(core) => {
                        let params = config.pattern().extract_params(core, query);
                        found = Some(Matched::Instruction(Arc::new(RoutingInstruction {
                            fragment: core.to_string(),
                            query_string: query.map(str::to_string),
                            config: Arc::clone(config),
                            params,
                        })));
                        break;
                    }
                    RouteHandler::Unknown { pattern, policy } if pattern.is_match(core) => {
                        let action = match policy {
                            UnknownRoutePolicy::RedirectTo(route) => {
                                Some((UnknownRouteAction::Redirect(route.clone()), None))
                            }
                            UnknownRoutePolicy::Compose {
                                target,
                                title,
                                replace_route,
                            } => Some((
                                UnknownRouteAction::Compose {
                                    target: target.clone(),
                                    title: title.clone(),
                                },
                                replace_route.clone(),
                            )),
                            UnknownRoutePolicy::Custom(decide) => {
                                decide(core).map(|action| (action, None))
                            }
                        };
                        if let Some((action, replace)) = action {
                            found = Some(Matched::Action(action, replace));
                            break;
                        }
                    }
                    _ => {}
                }
            }
            found
        };

        match matched {
            Some(Matched::Instruction(instruction)) => {
                self.queue_instruction(instruction, txn).await;
                true
            }
            Some(Matched::Action(action, replace_route)) => {
                if let Some(replace) = replace_route {
                    self.navigate(&replace, NavigateOptions::silent_replace());
                }
                match action {
                    UnknownRouteAction::Redirect(route) => {
                        info!("Unknown route {core:?}, redirecting to {route:?}");
                        self.navigate(&route, NavigateOptions::redirect());
                    }
                    UnknownRouteAction::Compose { target, title } => {
                        let pattern = RoutePattern::compile(
                            CATCHALL_ROUTE,
                            self.session.case_sensitive(),
                        )
                        .expect("catch-all pattern compiles");
                        let params = pattern.extract_params(core, query);
                        let config = Arc::new(RouteConfig::new(
                            CATCHALL_ROUTE.to_string(),
                            title.unwrap_or_else(|| convert_route_to_title(core)),
                            target,
                            core.to_string(),
                            false,
                            pattern,
                            Arc::new(AtomicBool::new(false)),
                            Nav::Hidden,
                        ));
                        let instruction = Arc::new(RoutingInstruction {
                            fragment: core.to_string(),
                            query_string: query.map(str::to_string),
                            config,
                            params,
                        });
                        self.queue_instruction(instruction, txn).await;
                    }
                }
                true
            }
            None => {
                warn!("Route not found: {core:?}");
                self.events.publish(RouterEvent::NotFound {
                    fragment: core.to_string(),
                });

                // A child that cannot place its tail still keeps the overall
                // fragment; only a root miss rolls the address bar back.
                if self.parent.upgrade().is_some() {
                    self.session.promote_try_url();
                }
                let last = self.session.last_url();
                if !last.is_empty() {
                    self.history.navigate(&last, NavigateOptions::silent_replace());
                }
                self.session.reset_flags();
                false
            }
        }
    }

    async fn queue_instruction(
        &self,
        instruction: Arc<RoutingInstruction>,
        txn: Option<Arc<Transaction>>,
    ) {
        let start = self.queue.lock().unwrap().enqueue((instruction, txn));
        if let Some((instruction, txn)) = start {
            self.process_instruction(instruction, txn).await;
        }
    }

    // =========================================================================
    // The pipeline
    // =========================================================================

    fn process_instruction(
        &self,
        instruction: Arc<RoutingInstruction>,
        txn: Option<Arc<Transaction>>,
    ) -> BoxFuture<'static, ()> {
        let this = self.strong();
        Box::pin(async move {
            let txn = txn.unwrap_or_else(Transaction::new);
            txn.begin();

            // Registered first so it drains after every nested composition's
            // own completion callbacks have run.
            let completed = Arc::new(AtomicBool::new(false));
            {
                let router = Arc::clone(&this);
                let instruction = Arc::clone(&instruction);
                let completed = Arc::clone(&completed);
                txn.on_complete(move || -> BoxFuture<'static, ()> {
                    Box::pin(async move {
                        if completed.load(Ordering::SeqCst) {
                            router.events.publish(RouterEvent::CompositionComplete {
                                instruction: Some(instruction),
                            });
                        }
                        router.drain_queue().await;
                    })
                });
            }

            let outcome = this.run_attempt(Arc::clone(&instruction), &txn).await;
            if matches!(outcome, AttemptOutcome::Completed) {
                completed.store(true, Ordering::SeqCst);
            }

            txn.end().await;
        })
    }

    async fn drain_queue(&self) {
        let next = self.queue.lock().unwrap().finish();
        if let Some((instruction, txn)) = next {
            self.process_instruction(instruction, txn).await;
        }
    }

    async fn run_attempt(
        &self,
        instruction: Arc<RoutingInstruction>,
        txn: &Arc<Transaction>,
    ) -> AttemptOutcome {
        info!("Navigating to {:?}", instruction.fragment);
        self.state.lock().unwrap().current_instruction = Some(Arc::clone(&instruction));
        self.events.publish(RouterEvent::Processing {
            instruction: Arc::clone(&instruction),
        });

        if self.parent.upgrade().is_none() {
            self.session
                .set_navigating_back(!self.session.is_explicit());
        }

        // Router-level guard.
        let guard = self.guard.lock().unwrap().clone();
        if let Some(guard) = guard {
            match guard(Arc::clone(&instruction)).await {
                GuardOutcome::Allow => {}
                GuardOutcome::Cancel => {
                    self.cancel_navigation(instruction).await;
                    return AttemptOutcome::Cancelled;
                }
                GuardOutcome::Redirect(url) => {
                    self.redirect(&url);
                    return AttemptOutcome::Redirected;
                }
            }
        }

        // Param-only change the active screen can absorb: replay the guard
        // chain against the live activation without recomposing.
        if let Some((screen, current_params)) = self.reusable_activation(&instruction) {
            debug!("Reusing active screen {} for {:?}", screen.id(), instruction.fragment);
            let temp = Activator::with_active(
                self.activator_settings.clone(),
                Arc::clone(&screen),
                current_params,
            );
            return match temp
                .activate_item(
                    Arc::clone(&screen),
                    instruction.params.clone(),
                    ActivateOptions::default(),
                )
                .await
            {
                Ok(Activation::Activated) => {
                    self.activator
                        .set_active_params(instruction.params.clone())
                        .await;
                    self.finish_navigation(instruction, screen, txn).await;
                    AttemptOutcome::Completed
                }
                Ok(Activation::Refused) => {
                    self.cancel_navigation(instruction).await;
                    AttemptOutcome::Cancelled
                }
                Ok(Activation::Redirect(url)) => {
                    self.redirect(&url);
                    AttemptOutcome::Redirected
                }
                Err(err) => {
                    warn!("{err}");
                    self.cancel_navigation(instruction).await;
                    AttemptOutcome::Cancelled
                }
            };
        }

        // Resolve the target to a live screen.
        let candidate = match self.resolve_candidate(&instruction).await {
            Ok(screen) => screen,
            Err(err) => {
                self.error_sink.report(&err);
                self.cancel_navigation(instruction).await;
                return AttemptOutcome::Cancelled;
            }
        };

        let previous = self.active_screen();

        // Child routers skip the deactivation leg; the root's guard chain
        // already cascaded through them.
        let options = ActivateOptions {
            can_deactivate: self.parent.upgrade().is_none(),
        };
        match self
            .activator
            .activate_item(Arc::clone(&candidate), instruction.params.clone(), options)
            .await
        {
            Ok(Activation::Activated) => {}
            Ok(Activation::Refused) => {
                self.cancel_navigation(instruction).await;
                return AttemptOutcome::Cancelled;
            }
            Ok(Activation::Redirect(url)) => {
                self.redirect(&url);
                return AttemptOutcome::Redirected;
            }
            Err(err) => {
                warn!("{err}");
                self.cancel_navigation(instruction).await;
                return AttemptOutcome::Cancelled;
            }
        }

        // Compose the new screen, unless it already owns the host.
        let same_screen = previous
            .as_ref()
            .is_some_and(|prev| Arc::ptr_eq(prev, &candidate));
        if !same_screen {
            let mut settings =
                ComposeSettings::for_target(RouteTarget::Screen(Arc::clone(&candidate)));
            settings.params = instruction.params.clone();
            settings.skip_activation = true;
            settings.previous = previous;

            match self.composer.compose(&self.host, settings, txn).await {
                Ok(ComposeOutcome::Composed { .. }) => {
                    self.events.publish(RouterEvent::Attached {
                        instruction: Arc::clone(&instruction),
                    });
                }
                Ok(ComposeOutcome::Skipped) | Err(_) => {
                    // The composer already reported the error.
                    self.cancel_navigation(instruction).await;
                    return AttemptOutcome::Cancelled;
                }
            }
        }

        self.finish_navigation(instruction, candidate, txn).await;
        AttemptOutcome::Completed
    }

    /// Completion bookkeeping plus child delegation.
    async fn finish_navigation(
        &self,
        instruction: Arc<RoutingInstruction>,
        screen: Arc<dyn Screen>,
        txn: &Arc<Transaction>,
    ) {
        let child = instruction
            .config
            .has_child_routes()
            .then(|| screen.child_router())
            .flatten();

        self.complete_navigation(&instruction, &screen, child.is_some());

        if let Some(child) = child {
            self.events.publish(RouterEvent::BeforeChildRoutes {
                instruction: Arc::clone(&instruction),
            });
            instruction.config.set_dynamic_hash(Some(fill_params(
                instruction.config.hash(),
                &instruction.params.positional,
            )));

            let tail = child_fragment_tail(&instruction);
            debug!("Delegating tail {tail:?} to child router");
            child.load_url_with_txn(tail, Arc::clone(txn)).await;
        }
    }

    fn complete_navigation(
        &self,
        instruction: &Arc<RoutingInstruction>,
        screen: &Arc<dyn Screen>,
        delegates_to_child: bool,
    ) {
        info!("Navigation complete: {:?}", instruction.fragment);

        let outgoing = {
            let mut state = self.state.lock().unwrap();
            let outgoing = state.current_activation.take();
            if let Some(old) = &state.active_instruction {
                old.config.set_active(false);
            }
            instruction.config.set_active(true);
            state.active_instruction = Some(Arc::clone(instruction));
            state.current_activation = Some(Arc::clone(screen));
            state.current_instruction = None;
            outgoing
        };

        if let Some(old) = outgoing {
            if !Arc::ptr_eq(&old, screen) {
                self.events.publish(RouterEvent::NavigatedFrom {
                    screen_id: old.id().to_string(),
                });
            }
        }
        self.events.publish(RouterEvent::NavigatedTo {
            screen_id: screen.id().to_string(),
        });

        // The deepest router in the delegation chain writes the title and
        // commits the URL.
        if !delegates_to_child {
            self.update_title(&instruction.config);
            self.session.promote_try_url();
        }

        self.events.publish(RouterEvent::Complete {
            instruction: Arc::clone(instruction),
        });
        self.session.reset_flags();
    }

    async fn cancel_navigation(&self, instruction: Arc<RoutingInstruction>) {
        info!("Navigation cancelled: {:?}", instruction.fragment);

        {
            let mut state = self.state.lock().unwrap();
            state.current_instruction = state.active_instruction.clone();
        }

        let last = self.session.last_url();
        if !last.is_empty() {
            self.navigate(&last, NavigateOptions::silent());
        }

        self.events.publish(RouterEvent::Cancelled { instruction });
        self.session.reset_flags();
    }

    fn redirect(&self, url: &str) {
        info!("Navigation redirecting to {url:?}");
        self.navigate(url, NavigateOptions::redirect());
    }

    fn update_title(&self, config: &RouteConfig) {
        let title = config.title();
        let text = match (&self.app_title, title.is_empty()) {
            (Some(app), false) => format!("{title} | {app}"),
            (Some(app), true) => app.clone(),
            (None, false) => title.to_string(),
            (None, true) => return,
        };
        self.title_sink.set_title(&text);
    }

    /// The active screen qualifies for reuse when the new instruction comes
    /// from the same route registration (sibling patterns of a multi-pattern
    /// spec count) and the screen either opts in via `can_reuse_for` or hosts
    /// a child router that can absorb the tail.
    fn reusable_activation(
        &self,
        instruction: &Arc<RoutingInstruction>,
    ) -> Option<(Arc<dyn Screen>, ActivationParams)> {
        let state = self.state.lock().unwrap();
        let active = state.active_instruction.as_ref()?;
        let screen = state.current_activation.as_ref()?;

        if !active.config.same_registration(&instruction.config) {
            return None;
        }

        let reusable = match screen.can_reuse_for(&instruction.params) {
            Some(decision) => decision,
            None => instruction.config.has_child_routes() && screen.child_router().is_some(),
        };
        reusable.then(|| (Arc::clone(screen), active.params.clone()))
    }

    async fn resolve_candidate(
        &self,
        instruction: &Arc<RoutingInstruction>,
    ) -> Result<Arc<dyn Screen>, ComposeError> {
        match instruction.config.target() {
            RouteTarget::Screen(screen) => Ok(Arc::clone(screen)),
            RouteTarget::Lazy(loader) => {
                debug!("Loading screen for {:?}", instruction.fragment);
                Ok(loader.load().await?)
            }
            RouteTarget::Activator(slot) => slot
                .active_screen()
                .await
                .ok_or(ComposeError::NoActiveScreen),
        }
    }
}

/// Splits a fragment at the first `?`.
fn split_fragment(fragment: &str) -> (&str, Option<&str>) {
    match fragment.find('?') {
        Some(index) => (&fragment[..index], Some(&fragment[index + 1..])),
        None => (fragment, None),
    }
}

/// The fragment a child router should process: the parent's splat capture
/// with the leading slash stripped and the query string carried along.
fn child_fragment_tail(instruction: &RoutingInstruction) -> String {
    let tail = instruction
        .params
        .positional
        .last()
        .and_then(|value| value.as_deref())
        .unwrap_or("");
    let tail = tail.trim_start_matches('/');
    match &instruction.query_string {
        Some(query) if !query.is_empty() => format!("{tail}?{query}"),
        _ => tail.to_string(),
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Configures and builds a root router.
pub struct RouterBuilder {
    history: Arc<dyn History>,
    view_locator: Arc<dyn crate::screen::view::ViewLocator>,
    transitions: Arc<dyn crate::screen::view::TransitionProvider>,
    title_sink: Arc<dyn TitleSink>,
    error_sink: Arc<dyn ErrorSink>,
    app_title: Option<String>,
    case_sensitive: bool,
    default_transition: Option<String>,
    cache_views: bool,
}

impl RouterBuilder {
    pub fn new(history: Arc<dyn History>) -> Self {
        Self {
            history,
            view_locator: Arc::new(crate::screen::view::StaticViewLocator),
            transitions: Arc::new(crate::screen::view::InstantTransitions),
            title_sink: Arc::new(crate::screen::view::NullTitleSink),
            error_sink: Arc::new(crate::compose::LogErrorSink),
            app_title: None,
            case_sensitive: false,
            default_transition: None,
            cache_views: false,
        }
    }

    /// Seeds the builder from resolved configuration.
    pub fn from_config(history: Arc<dyn History>, config: &crate::core::config::ResolvedConfig) -> Self {
        let mut builder = Self::new(history);
        builder.case_sensitive = config.case_sensitive;
        builder.default_transition = config.default_transition.clone();
        builder.cache_views = config.cache_views;
        builder.app_title = config.app_title.clone();
        builder
    }

    pub fn view_locator(mut self, locator: Arc<dyn crate::screen::view::ViewLocator>) -> Self {
        self.view_locator = locator;
        self
    }

    pub fn transitions(
        mut self,
        transitions: Arc<dyn crate::screen::view::TransitionProvider>,
    ) -> Self {
        self.transitions = transitions;
        self
    }

    pub fn title_sink(mut self, sink: Arc<dyn TitleSink>) -> Self {
        self.title_sink = sink;
        self
    }

    pub fn error_sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        self.error_sink = sink;
        self
    }

    pub fn app_title(mut self, title: impl Into<String>) -> Self {
        self.app_title = Some(title.into());
        self
    }

    pub fn case_sensitive(mut self, value: bool) -> Self {
        self.case_sensitive = value;
        self
    }

    pub fn default_transition(mut self, name: impl Into<String>) -> Self {
        self.default_transition = Some(name.into());
        self
    }

    pub fn cache_views(mut self, value: bool) -> Self {
        self.cache_views = value;
        self
    }

    pub fn build(self, host: Arc<ViewHost>) -> Arc<Router> {
        let session = Arc::new(NavigationSession::new(self.case_sensitive));
        let composer = Arc::new(Composer::new(
            self.view_locator,
            self.transitions,
            Arc::clone(&self.error_sink),
            self.default_transition,
            self.cache_views,
        ));
        Router::new_internal(
            session,
            Weak::new(),
            composer,
            self.history,
            self.title_sink,
            self.error_sink,
            self.app_title,
            host,
        )
    }
}

//! Route table entries and routing instructions.
//!
//! A `RouteSpec` is what callers hand to `Router::map`; the router normalizes
//! it into one `RouteConfig` per pattern. A `RoutingInstruction` is one
//! concrete match of a fragment against a config, carrying the extracted
//! params through the activation pipeline.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::core::pattern::{ActivationParams, RoutePattern};
use crate::screen::screen::RouteTarget;

/// Position of a route in the navigation model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nav {
    /// Not part of the navigation model.
    Hidden,
    /// Part of the model, ordered by registration.
    Auto,
    /// Part of the model, with an explicit sort key.
    Order(i64),
}

impl Default for Nav {
    fn default() -> Self {
        Nav::Hidden
    }
}

/// A route registration. `route` may carry several patterns; they share one
/// active flag so highlighting works whichever pattern matched.
#[derive(Debug, Clone, Default)]
pub struct RouteSpec {
    pub route: Vec<String>,
    pub title: Option<String>,
    pub target: Option<RouteTarget>,
    pub hash: Option<String>,
    pub nav: Nav,
    /// Marks this route as a host for a nested router; the compiled pattern
    /// gains a splat tail that captures the child's fragment.
    pub children: bool,
}

impl RouteSpec {
    pub fn new(route: impl Into<String>) -> Self {
        Self {
            route: vec![route.into()],
            ..Default::default()
        }
    }

    /// Registers several patterns resolving to the same target.
    pub fn with_routes(routes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            route: routes.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn target(mut self, target: RouteTarget) -> Self {
        self.target = Some(target);
        self
    }

    pub fn hash(mut self, hash: impl Into<String>) -> Self {
        self.hash = Some(hash.into());
        self
    }

    pub fn nav(mut self, nav: Nav) -> Self {
        self.nav = nav;
        self
    }

    /// Shorthand for `nav(Nav::Auto)`.
    pub fn visible(mut self) -> Self {
        self.nav = Nav::Auto;
        self
    }

    /// Marks the route as hosting a child router.
    pub fn with_children(mut self) -> Self {
        self.children = true;
        self
    }
}

/// A route registration was rejected.
#[derive(Debug)]
pub enum MapError {
    /// Route specs must name a target; there is no convention-based fallback.
    MissingTarget { route: String },
    /// The route template did not compile.
    Pattern(crate::core::pattern::PatternError),
}

impl fmt::Display for MapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapError::MissingTarget { route } => {
                write!(f, "route {route:?} has no target")
            }
            MapError::Pattern(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for MapError {}

impl From<crate::core::pattern::PatternError> for MapError {
    fn from(err: crate::core::pattern::PatternError) -> Self {
        MapError::Pattern(err)
    }
}

/// One normalized, compiled route table entry.
pub struct RouteConfig {
    route: String,
    title: String,
    target: RouteTarget,
    hash: String,
    has_child_routes: bool,
    pattern: RoutePattern,
    /// Shared across sibling configs created from a multi-pattern spec.
    is_active: Arc<AtomicBool>,
    nav: Mutex<Nav>,
    /// Hash recomputed from the current params, for child-router hosts whose
    /// hash contains parameters.
    dynamic_hash: Mutex<Option<String>>,
}

impl RouteConfig {
    pub(crate) fn new(
        route: String,
        title: String,
        target: RouteTarget,
        hash: String,
        has_child_routes: bool,
        pattern: RoutePattern,
        is_active: Arc<AtomicBool>,
        nav: Nav,
    ) -> Self {
        Self {
            route,
            title,
            target,
            hash,
            has_child_routes,
            pattern,
            is_active,
            nav: Mutex::new(nav),
            dynamic_hash: Mutex::new(None),
        }
    }

    pub fn route(&self) -> &str {
        &self.route
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn target(&self) -> &RouteTarget {
        &self.target
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn has_child_routes(&self) -> bool {
        self.has_child_routes
    }

    pub fn pattern(&self) -> &RoutePattern {
        &self.pattern
    }

    pub fn is_active(&self) -> bool {
        self.is_active.load(Ordering::SeqCst)
    }

    pub(crate) fn set_active(&self, value: bool) {
        self.is_active.store(value, Ordering::SeqCst);
    }

    /// Whether two configs came from the same `map` call. Sibling configs of
    /// a multi-pattern spec share one active flag.
    pub(crate) fn same_registration(&self, other: &RouteConfig) -> bool {
        Arc::ptr_eq(&self.is_active, &other.is_active)
    }

    pub fn nav(&self) -> Nav {
        *self.nav.lock().unwrap()
    }

    pub(crate) fn set_nav(&self, nav: Nav) {
        *self.nav.lock().unwrap() = nav;
    }

    /// The hash with current param values substituted, when one was computed.
    pub fn dynamic_hash(&self) -> Option<String> {
        self.dynamic_hash.lock().unwrap().clone()
    }

    pub(crate) fn set_dynamic_hash(&self, hash: Option<String>) {
        *self.dynamic_hash.lock().unwrap() = hash;
    }
}

impl fmt::Debug for RouteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteConfig")
            .field("route", &self.route)
            .field("title", &self.title)
            .field("hash", &self.hash)
            .field("target", &self.target)
            .field("has_child_routes", &self.has_child_routes)
            .field("is_active", &self.is_active())
            .finish()
    }
}

/// One matched navigation attempt, flowing through the pipeline.
#[derive(Debug, Clone)]
pub struct RoutingInstruction {
    pub fragment: String,
    pub query_string: Option<String>,
    pub config: Arc<RouteConfig>,
    pub params: ActivationParams,
}

impl RoutingInstruction {
    /// The full fragment including the query string, as the address bar
    /// would show it.
    pub fn full_fragment(&self) -> String {
        match &self.query_string {
            Some(q) if !q.is_empty() => format!("{}?{}", self.fragment, q),
            _ => self.fragment.clone(),
        }
    }
}

/// Derives a display title from a route template: everything from the first
/// parameter marker on is dropped, then the first letter is capitalized.
pub fn convert_route_to_title(route: &str) -> String {
    let stripped = match route.find(':') {
        Some(index) => &route[..index],
        None => route,
    };
    let trimmed = stripped
        .trim_end_matches(|c| c == '/' || c == '(' || c == '*')
        .trim();

    let mut chars = trimmed.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Derives the default hash from a route template (the template itself with
/// any optional-group markers kept, matching what `navigate` expects).
pub fn convert_route_to_hash(route: &str) -> String {
    route.to_string()
}

//! Waypoint library exports

pub mod compose;
pub mod core;
pub mod screen;

#[cfg(test)]
pub mod test_support;

pub use crate::compose::{ComposeError, Composer, Transaction};
pub use crate::core::activator::{Activation, Activator};
pub use crate::core::pattern::ActivationParams;
pub use crate::core::route::{Nav, RouteSpec, RoutingInstruction};
pub use crate::core::router::{Router, RouterBuilder, UnknownRoutePolicy};
pub use crate::screen::{GuardOutcome, RouteTarget, Screen};

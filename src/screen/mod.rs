//! External collaborator seams.
//!
//! The navigation core treats everything presentation- and platform-specific
//! as a narrow trait it calls into: screens (lifecycle), views (what gets
//! swapped), transitions (how the swap looks), history (the address bar) and
//! the title sink. In-memory reference implementations live alongside the
//! traits for tests and headless runs.

pub mod history;
pub mod screen;
pub mod view;

pub use history::{History, MemoryHistory, NavigateOptions, NavigationRecord};
pub use screen::{GuardError, GuardOutcome, ResolveError, RouteTarget, Screen, ScreenLoader};
pub use view::{
    InstantTransitions, NullTitleSink, RecordingTitleSink, StaticViewLocator, TitleSink,
    Transition, TransitionContext, TransitionProvider, ViewHandle, ViewHost, ViewLocator,
};

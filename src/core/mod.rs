//! # Core Navigation Logic
//!
//! This module contains Waypoint's coordination machinery.
//! It knows nothing about any specific rendering technology.
//!
//! ```text
//!                    ┌─────────────────────────┐
//!                    │         CORE            │
//!                    │  (this module)          │
//!                    │                         │
//!                    │  • pattern (matching)   │
//!                    │  • activator (guards)   │
//!                    │  • router (pipeline)    │
//!                    │                         │
//!                    │  No rendering. No I/O.  │
//!                    └───────────┬─────────────┘
//!                                │
//!            ┌───────────────────┼───────────────────┐
//!            ▼                   ▼                   ▼
//!     ┌────────────┐      ┌────────────┐      ┌────────────┐
//!     │  History   │      │ ViewLocator│      │ Transition │
//!     │  Adapter   │      │  Adapter   │      │  Adapter   │
//!     └────────────┘      └────────────┘      └────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`router`]: The `Router` — matching, queueing and the pipeline
//! - [`activator`]: The guarded activation slot
//! - [`pattern`]: Route template compilation and param extraction

pub mod activator;
pub mod config;
pub mod events;
pub mod pattern;
pub mod queue;
pub mod route;
pub mod router;
pub mod session;

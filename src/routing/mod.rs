//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request path (mount prefix stripped, percent-decoded)
//!     → router.rs (ordered scan of the route table)
//!     → pattern.rs (anchored match, capture extraction)
//!     → Return: RouteMatch { route, captures } or NotFound
//!
//! Route Compilation (at startup):
//!     (template, view, name)[]
//!     → Compile templates
//!     → Reject duplicate names
//!     → Freeze as immutable Router
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - Declaration order is the priority: first match wins
//! - Deterministic: same input always matches same route
//! - Captures are strings here; views own type conversion

pub mod menu;
pub mod pattern;
pub mod router;

pub use menu::{main_menu, MenuItem};
pub use pattern::{CaptureKind, Captures, PathPattern};
pub use router::{Route, RouteMatch, Router};

/// Routing failures.
#[derive(Debug, thiserror::Error)]
pub enum RoutingError {
    #[error("no route matches {path:?}")]
    NotFound { path: String },

    #[error("no route named {0:?}")]
    UnknownRoute(String),

    #[error("route name {0:?} is declared more than once")]
    DuplicateName(String),

    #[error("invalid route template {template:?}: {reason}")]
    InvalidPattern { template: String, reason: String },

    #[error("route {route:?} needs capture {capture:?}")]
    MissingCapture { route: String, capture: String },

    #[error("route {route:?}: {value:?} is not a valid {kind} for capture {capture:?}")]
    InvalidCapture {
        route: String,
        capture: String,
        kind: CaptureKind,
        value: String,
    },

    #[error("route {route:?}: path {path:?} resolves to {by:?} instead")]
    Shadowed {
        route: String,
        path: String,
        by: String,
    },
}

/// Capture conversion failures, raised by views.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    #[error("missing capture {0:?}")]
    Missing(String),

    #[error("capture {name:?} has unusable value {value:?}")]
    Invalid { name: String, value: String },
}

//! View dispatch.
//!
//! # Data Flow
//! ```text
//! RouteMatch { route, captures }
//!     → ViewRequest (view, route name, captures, method, request id)
//!     → HandlerRegistry (View → Arc<dyn Handler>)
//!     → Handler::handle → Response or ViewError
//! ```
//!
//! # Design Decisions
//! - The set of views is closed (one variant per route)
//! - View behaviour is pluggable behind the `Handler` trait
//! - Unregistered views fall back to a placeholder that describes the match

pub mod placeholder;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use axum::http::Method;
use axum::response::Response;
use serde::Serialize;

use crate::routing::{CaptureError, Captures, Router};

pub use placeholder::PlaceholderHandler;

/// Every view the inventory console can dispatch to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum View {
    Index,
    Groups,
    GroupMachines,
    Mbu,
    ReviewMbuMerge,
    MergeMbu,
    CreateMbu,
    UpdateMbu,
    MbuMachines,
    MbuApiEnrollment,
    MachineEvents,
    Machine,
    Probes,
    Probe,
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Everything a handler gets to see about a routed request.
#[derive(Debug)]
pub struct ViewRequest<'a> {
    pub view: View,
    pub route_name: &'a str,
    pub captures: &'a Captures,
    pub method: &'a Method,
    pub request_id: &'a str,
    /// For building links to other routes.
    pub router: &'a Router,
    /// Prefix the route table is served under; empty at the root.
    pub mount_path: &'a str,
}

/// Failures raised by view handlers.
#[derive(Debug, thiserror::Error)]
pub enum ViewError {
    #[error("bad capture: {0}")]
    BadCapture(#[from] CaptureError),

    #[error("method {method} not allowed")]
    MethodNotAllowed { method: Method, allowed: Vec<Method> },

    #[error("view failed: {0}")]
    Internal(String),
}

/// The capability every view implements.
pub trait Handler: Send + Sync {
    fn handle(&self, request: &ViewRequest<'_>) -> Result<Response, ViewError>;
}

/// Maps views to their handlers.
#[derive(Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<View, Arc<dyn Handler>>,
    fallback: Arc<dyn Handler>,
}

impl HandlerRegistry {
    /// A registry where every view is served by `fallback`.
    pub fn new(fallback: Arc<dyn Handler>) -> Self {
        Self {
            handlers: HashMap::new(),
            fallback,
        }
    }

    pub fn register(&mut self, view: View, handler: Arc<dyn Handler>) -> &mut Self {
        if self.handlers.insert(view, handler).is_some() {
            tracing::debug!(view = %view, "Replaced view handler");
        }
        self
    }

    pub fn handler_for(&self, view: View) -> &Arc<dyn Handler> {
        self.handlers.get(&view).unwrap_or(&self.fallback)
    }

    pub fn dispatch(&self, request: &ViewRequest<'_>) -> Result<Response, ViewError> {
        self.handler_for(request.view).handle(request)
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new(Arc::new(PlaceholderHandler))
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("registered", &self.handlers.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

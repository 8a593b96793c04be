//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing, timeout)
//!     → request.rs (read request ID, strip mount prefix, decode path)
//!     → routing (resolve path → route + captures)
//!     → views (handler for the matched view)
//!     → response.rs (map errors to status codes and JSON bodies)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::X_REQUEST_ID;
pub use server::{AppState, HttpServer};

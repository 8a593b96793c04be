//! Inventory console library: route table, view dispatch and schema migrations.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod migrations;
pub mod observability;
pub mod routing;
pub mod views;

pub use config::ConsoleConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use migrations::Migrator;
pub use routing::Router;

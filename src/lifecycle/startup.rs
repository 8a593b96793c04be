//! Startup orchestration.
//!
//! # Responsibilities
//! - Open the schema database and apply pending migrations on request
//! - Initialize metrics and compile the route table
//! - Bind the listener and serve until shutdown
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Migrations finish before the listener binds (traffic only when ready)
//! - Shutdown waits for in-flight requests up to a grace period

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use rusqlite::Connection;
use tokio::net::TcpListener;

use crate::config::{ConsoleConfig, DatabaseConfig};
use crate::http::HttpServer;
use crate::lifecycle::Shutdown;
use crate::migrations::{MigrationError, MigrationKey, Migrator};
use crate::observability::metrics;
use crate::routing::RoutingError;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("database: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("migration: {0}")]
    Migration(#[from] MigrationError),

    #[error("routing: {0}")]
    Routing(#[from] RoutingError),

    #[error("metrics: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub fn open_database(config: &DatabaseConfig) -> Result<Connection, rusqlite::Error> {
    let conn = Connection::open(Path::new(&config.path))?;
    conn.busy_timeout(Duration::from_secs(5))?;
    tracing::debug!(path = %config.path, "Database opened");
    Ok(conn)
}

/// Apply every pending migration in `conn`.
pub fn run_migrations(conn: &mut Connection) -> Result<Vec<MigrationKey>, MigrationError> {
    let migrator = Migrator::inventory()?;
    let applied = migrator.migrate(conn)?;
    metrics::record_migrations(applied.len());
    Ok(applied)
}

/// Run the console until `shutdown` fires.
pub async fn run(config: ConsoleConfig, shutdown: Shutdown) -> Result<(), StartupError> {
    if config.database.migrate_on_start {
        let db = config.database.clone();
        let applied = tokio::task::spawn_blocking(move || {
            let mut conn = open_database(&db)?;
            run_migrations(&mut conn).map_err(StartupError::from)
        })
        .await??;
        tracing::info!(applied = applied.len(), "Schema up to date");
    }

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config
            .observability
            .metrics_address
            .parse()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
        metrics::init_metrics(addr)?;
    }

    let grace = Duration::from_secs(config.timeouts.shutdown_grace_secs);
    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server = HttpServer::new(config)?;
    let mut stop = shutdown.subscribe();
    let mut server_task = tokio::spawn(server.run(listener, shutdown.subscribe()));

    tokio::select! {
        result = &mut server_task => return Ok(result??),
        _ = stop.recv() => {}
    }

    match tokio::time::timeout(grace, &mut server_task).await {
        Ok(result) => Ok(result??),
        Err(_) => {
            tracing::warn!(
                grace_secs = grace.as_secs(),
                "Grace period expired, aborting in-flight requests"
            );
            server_task.abort();
            Ok(())
        }
    }
}

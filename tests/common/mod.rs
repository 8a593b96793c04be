//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;

use rusqlite::{params, Connection};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use inventory_console::migrations::sqlite::load_schema;
use inventory_console::migrations::Migrator;
use inventory_console::{ConsoleConfig, HttpServer, Shutdown};

pub const MACHINES: &str = "monolith_enrolledmachine";

/// In-memory database with only the baseline step applied.
pub fn baseline_db() -> (Migrator, Connection) {
    let migrator = Migrator::inventory().unwrap();
    let mut conn = Connection::open_in_memory().unwrap();
    let baseline = migrator.find("0039_auto_20201012_0916").unwrap().clone();
    migrator.apply(&mut conn, &baseline).unwrap();
    conn.execute_batch(
        "INSERT INTO monolith_enrollment (id, version, created_at) VALUES \
         (1, 1, '2020-10-01T00:00:00'), (2, 1, '2020-10-02T00:00:00')",
    )
    .unwrap();
    (migrator, conn)
}

pub fn insert_machine(conn: &Connection, enrollment: i64, serial: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "INSERT INTO monolith_enrolledmachine (enrollment_id, serial_number, created_at) \
         VALUES (?1, ?2, '2020-10-12T14:32:00')",
        params![enrollment, serial],
    )
}

pub fn column_type(conn: &Connection, table: &str, column: &str) -> String {
    load_schema(conn, table)
        .unwrap()
        .unwrap()
        .column(column)
        .unwrap()
        .decl_type
        .clone()
}

pub fn unique_scopes(conn: &Connection, table: &str) -> Vec<Vec<String>> {
    load_schema(conn, table).unwrap().unwrap().unique_scopes()
}

pub fn machine_count(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM monolith_enrolledmachine", [], |r| r.get(0))
        .unwrap()
}

/// Start a console on a loopback port.
pub async fn start_console(
    mount_path: &str,
) -> (SocketAddr, Shutdown, JoinHandle<std::io::Result<()>>) {
    let mut config = ConsoleConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.http.mount_path = mount_path.to_string();

    let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server = HttpServer::new(config).unwrap();
    let handle = tokio::spawn(server.run(listener, shutdown.subscribe()));
    (addr, shutdown, handle)
}

//! Applied-migration ledger kept in the database itself.

use rusqlite::{params, Connection, OptionalExtension};

use crate::migrations::model::MigrationKey;

const LEDGER_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    id integer NOT NULL PRIMARY KEY AUTOINCREMENT,
    app varchar(255) NOT NULL,
    name varchar(255) NOT NULL,
    applied_at datetime NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    UNIQUE (app, name)
);
"#;

/// A ledger row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMigration {
    pub app: String,
    pub name: String,
    pub applied_at: String,
}

pub fn ensure(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(LEDGER_SQL)
}

pub fn is_applied(conn: &Connection, key: MigrationKey) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT 1 FROM schema_migrations WHERE app = ?1 AND name = ?2",
        params![key.app, key.name],
        |_| Ok(()),
    )
    .optional()
    .map(|row| row.is_some())
}

pub fn record(conn: &Connection, key: MigrationKey) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO schema_migrations (app, name) VALUES (?1, ?2)",
        params![key.app, key.name],
    )?;
    Ok(())
}

pub fn list(conn: &Connection) -> rusqlite::Result<Vec<AppliedMigration>> {
    let mut stmt =
        conn.prepare("SELECT app, name, applied_at FROM schema_migrations ORDER BY id")?;
    let rows = stmt.query_map([], |row| {
        Ok(AppliedMigration {
            app: row.get(0)?,
            name: row.get(1)?,
            applied_at: row.get(2)?,
        })
    })?;
    rows.collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_list() {
        let conn = Connection::open_in_memory().unwrap();
        ensure(&conn).unwrap();
        ensure(&conn).unwrap();

        let key = MigrationKey::new("monolith", "0039_auto_20201012_0916");
        assert!(!is_applied(&conn, key).unwrap());
        record(&conn, key).unwrap();
        assert!(is_applied(&conn, key).unwrap());
        assert!(record(&conn, key).is_err());

        let rows = list(&conn).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "0039_auto_20201012_0916");
        assert!(rows[0].applied_at.ends_with('Z'));
    }
}

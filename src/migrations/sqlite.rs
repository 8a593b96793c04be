//! SQLite schema introspection and table rebuilds.
//!
//! # Responsibilities
//! - Read a table's shape back from `sqlite_master` and the `table_info`,
//!   `foreign_key_list` and `index_list` pragmas
//! - Render a `TableSchema` as `CREATE TABLE`
//! - Rebuild a table under a new shape (SQLite has no `ALTER COLUMN`)
//!
//! # Design Decisions
//! - Rebuild follows the create/copy/drop/rename sequence; callers run it
//!   inside their own transaction
//! - Explicitly created indexes are replayed from their stored SQL
//! - Inline `UNIQUE(...)` constraints travel with the table definition

use rusqlite::types::ValueRef;
use rusqlite::Connection;

/// Quote an identifier for interpolation into SQL.
pub fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn quote_list<S: AsRef<str>>(idents: &[S]) -> String {
    idents
        .iter()
        .map(|i| quote(i.as_ref()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Render a value for an operator-facing message.
pub fn display_value(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => "NULL".to_string(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(t) => String::from_utf8_lossy(t).into_owned(),
        ValueRef::Blob(b) => format!("<{} bytes>", b.len()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableColumn {
    pub name: String,
    pub decl_type: String,
    pub not_null: bool,
    pub default: Option<String>,
    /// 1-based position in the primary key, 0 if not part of it.
    pub pk_position: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    pub table: String,
    pub from: Vec<String>,
    pub to: Vec<String>,
    pub on_update: String,
    pub on_delete: String,
}

/// An explicitly created index (`CREATE [UNIQUE] INDEX`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDef {
    pub name: String,
    pub unique: bool,
    pub columns: Vec<String>,
    pub sql: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<TableColumn>,
    pub autoincrement: bool,
    pub foreign_keys: Vec<ForeignKey>,
    /// Inline `UNIQUE(...)` table constraints.
    pub unique_constraints: Vec<Vec<String>>,
    pub indexes: Vec<IndexDef>,
}

impl TableSchema {
    pub fn column(&self, name: &str) -> Option<&TableColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut TableColumn> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    /// Every uniqueness scope on the table, inline or indexed.
    pub fn unique_scopes(&self) -> Vec<Vec<String>> {
        self.unique_constraints
            .iter()
            .cloned()
            .chain(self.indexes.iter().filter(|i| i.unique).map(|i| i.columns.clone()))
            .collect()
    }

    /// `CREATE TABLE` statement for this shape under `table_name`.
    pub fn create_sql(&self, table_name: &str) -> String {
        let pk: Vec<&TableColumn> = {
            let mut pk: Vec<_> = self.columns.iter().filter(|c| c.pk_position > 0).collect();
            pk.sort_by_key(|c| c.pk_position);
            pk
        };
        let single_pk = pk.len() == 1;

        let mut parts = Vec::new();
        for column in &self.columns {
            let mut def = quote(&column.name);
            if !column.decl_type.is_empty() {
                def.push(' ');
                def.push_str(&column.decl_type);
            }
            if column.not_null {
                def.push_str(" NOT NULL");
            }
            if single_pk && column.pk_position == 1 {
                def.push_str(" PRIMARY KEY");
                if self.autoincrement {
                    def.push_str(" AUTOINCREMENT");
                }
            }
            if let Some(default) = &column.default {
                def.push_str(" DEFAULT ");
                def.push_str(default);
            }
            parts.push(def);
        }
        if pk.len() > 1 {
            let names: Vec<&str> = pk.iter().map(|c| c.name.as_str()).collect();
            parts.push(format!("PRIMARY KEY ({})", quote_list(&names)));
        }
        for unique in &self.unique_constraints {
            parts.push(format!("UNIQUE ({})", quote_list(unique)));
        }
        for fk in &self.foreign_keys {
            let mut clause = format!(
                "FOREIGN KEY ({}) REFERENCES {}",
                quote_list(&fk.from),
                quote(&fk.table)
            );
            if !fk.to.is_empty() {
                clause.push_str(&format!(" ({})", quote_list(&fk.to)));
            }
            if fk.on_update != "NO ACTION" {
                clause.push_str(&format!(" ON UPDATE {}", fk.on_update));
            }
            if fk.on_delete != "NO ACTION" {
                clause.push_str(&format!(" ON DELETE {}", fk.on_delete));
            }
            parts.push(clause);
        }

        format!("CREATE TABLE {} ({})", quote(table_name), parts.join(", "))
    }
}

pub fn table_exists(conn: &Connection, table: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |row| row.get::<_, i64>(0),
    )
    .map(|n| n > 0)
}

fn index_columns(conn: &Connection, index: &str) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA index_info({})", quote(index)))?;
    let mut rows: Vec<(i64, Option<String>)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(2)?)))?
        .collect::<Result<_, _>>()?;
    rows.sort_by_key(|(seq, _)| *seq);
    Ok(rows.into_iter().filter_map(|(_, name)| name).collect())
}

/// Introspect `table`. Returns `None` if it does not exist.
pub fn load_schema(conn: &Connection, table: &str) -> rusqlite::Result<Option<TableSchema>> {
    let create_sql: Option<String> = {
        let mut stmt =
            conn.prepare("SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?1")?;
        let mut rows = stmt.query([table])?;
        match rows.next()? {
            Some(row) => row.get(0)?,
            None => return Ok(None),
        }
    };
    let autoincrement = create_sql
        .as_deref()
        .map(|sql| sql.to_ascii_uppercase().contains("AUTOINCREMENT"))
        .unwrap_or(false);

    let columns = {
        let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote(table)))?;
        let rows = stmt.query_map([], |row| {
            Ok(TableColumn {
                name: row.get(1)?,
                decl_type: row.get(2)?,
                not_null: row.get::<_, i64>(3)? != 0,
                default: row.get(4)?,
                pk_position: row.get(5)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>()?
    };

    let foreign_keys = {
        let mut stmt = conn.prepare(&format!("PRAGMA foreign_key_list({})", quote(table)))?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
            ))
        })?;
        let mut fks: Vec<(i64, ForeignKey)> = Vec::new();
        let mut raw = rows.collect::<Result<Vec<_>, _>>()?;
        raw.sort_by_key(|r| (r.0, r.1));
        for (id, _seq, ref_table, from, to, on_update, on_delete) in raw {
            match fks.iter_mut().find(|(fk_id, _)| *fk_id == id) {
                Some((_, fk)) => {
                    fk.from.push(from);
                    fk.to.extend(to);
                }
                None => fks.push((
                    id,
                    ForeignKey {
                        table: ref_table,
                        from: vec![from],
                        to: to.into_iter().collect(),
                        on_update,
                        on_delete,
                    },
                )),
            }
        }
        fks.into_iter().map(|(_, fk)| fk).collect()
    };

    let index_list: Vec<(String, bool, String)> = {
        let mut stmt = conn.prepare(&format!("PRAGMA index_list({})", quote(table)))?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)? != 0,
                row.get::<_, String>(3)?,
            ))
        })?;
        rows.collect::<Result<_, _>>()?
    };

    let mut unique_constraints = Vec::new();
    let mut indexes = Vec::new();
    for (name, unique, origin) in index_list {
        let columns = index_columns(conn, &name)?;
        match origin.as_str() {
            "u" => unique_constraints.push(columns),
            "c" => {
                let sql: Option<String> = conn.query_row(
                    "SELECT sql FROM sqlite_master WHERE type = 'index' AND name = ?1",
                    [&name],
                    |row| row.get(0),
                )?;
                if let Some(sql) = sql {
                    indexes.push(IndexDef {
                        name,
                        unique,
                        columns,
                        sql,
                    });
                }
            }
            // Primary key autoindexes are rebuilt from the column definitions.
            _ => {}
        }
    }
    // index_list reports most recent first.
    unique_constraints.reverse();
    indexes.reverse();

    Ok(Some(TableSchema {
        name: table.to_string(),
        columns,
        autoincrement,
        foreign_keys,
        unique_constraints,
        indexes,
    }))
}

/// Rewrite `schema.name` under the shape in `schema`, copying every row.
///
/// Blocking and proportional to the table size.
pub fn rebuild_table(conn: &Connection, schema: &TableSchema) -> rusqlite::Result<usize> {
    let table = schema.name.as_str();
    let staging = format!("new__{table}");
    let columns: Vec<&str> = schema.columns.iter().map(|c| c.name.as_str()).collect();
    let column_list = quote_list(&columns);

    conn.execute_batch(&schema.create_sql(&staging))?;
    let copied = conn.execute(
        &format!(
            "INSERT INTO {} ({column_list}) SELECT {column_list} FROM {}",
            quote(&staging),
            quote(table)
        ),
        [],
    )?;
    conn.execute_batch(&format!("DROP TABLE {}", quote(table)))?;
    conn.execute_batch(&format!(
        "ALTER TABLE {} RENAME TO {}",
        quote(&staging),
        quote(table)
    ))?;
    for index in &schema.indexes {
        conn.execute_batch(&index.sql)?;
    }

    tracing::debug!(table = %table, rows = copied, "Table rebuilt");
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE parent (id integer NOT NULL PRIMARY KEY AUTOINCREMENT);
            CREATE TABLE child (
                id integer NOT NULL PRIMARY KEY AUTOINCREMENT,
                parent_id integer NOT NULL,
                code varchar(32) NOT NULL DEFAULT 'x',
                note text,
                UNIQUE (code),
                FOREIGN KEY (parent_id) REFERENCES parent (id) ON DELETE CASCADE
            );
            CREATE INDEX child_note_idx ON child (note);
            CREATE UNIQUE INDEX child_parent_note_uniq ON child (parent_id, note);
            INSERT INTO parent (id) VALUES (1);
            INSERT INTO child (parent_id, code, note) VALUES (1, 'a', 'first'), (1, 'b', NULL);
            "#,
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_load_schema() {
        let conn = conn();
        let schema = load_schema(&conn, "child").unwrap().unwrap();
        assert!(schema.autoincrement);
        assert_eq!(schema.columns.len(), 4);
        assert_eq!(schema.column("code").unwrap().decl_type, "varchar(32)");
        assert_eq!(schema.column("code").unwrap().default.as_deref(), Some("'x'"));
        assert_eq!(schema.column("id").unwrap().pk_position, 1);
        assert_eq!(schema.unique_constraints, vec![vec!["code".to_string()]]);
        assert_eq!(schema.indexes.len(), 2);
        assert_eq!(schema.foreign_keys.len(), 1);
        assert_eq!(schema.foreign_keys[0].on_delete, "CASCADE");
        assert_eq!(schema.unique_scopes().len(), 2);

        assert!(load_schema(&conn, "missing").unwrap().is_none());
    }

    #[test]
    fn test_rebuild_preserves_rows_and_shape() {
        let conn = conn();
        let before = load_schema(&conn, "child").unwrap().unwrap();
        let mut target = before.clone();
        target.column_mut("code").unwrap().decl_type = "text".to_string();

        let copied = rebuild_table(&conn, &target).unwrap();
        assert_eq!(copied, 2);

        let after = load_schema(&conn, "child").unwrap().unwrap();
        assert_eq!(after.column("code").unwrap().decl_type, "text");
        assert_eq!(after.unique_constraints, before.unique_constraints);
        assert_eq!(after.foreign_keys, before.foreign_keys);
        let names: Vec<_> = after.indexes.iter().map(|i| i.name.as_str()).collect();
        assert!(names.contains(&"child_note_idx"));
        assert!(names.contains(&"child_parent_note_uniq"));
        assert!(!table_exists(&conn, "new__child").unwrap());

        let notes: i64 = conn
            .query_row("SELECT COUNT(*) FROM child WHERE note = 'first'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(notes, 1);
    }

    #[test]
    fn test_quote_escapes() {
        assert_eq!(quote("a\"b"), "\"a\"\"b\"");
    }
}

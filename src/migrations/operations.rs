//! Schema operations a migration step is made of.
//!
//! Each operation checks its own preconditions against the live schema
//! before touching anything, so a bad chain fails with a state error instead
//! of a storage error halfway through.

use rusqlite::Connection;

use crate::migrations::model::{ColumnDef, FieldType, MigrationKey};
use crate::migrations::sqlite::{
    self, display_value, load_schema, quote, rebuild_table, ForeignKey, TableColumn, TableSchema,
};
use crate::migrations::{MigrationError, SchemaStateError};

#[derive(Debug, Clone)]
pub enum Operation {
    /// Create a table with inline uniqueness scopes.
    CreateTable {
        table: &'static str,
        columns: Vec<ColumnDef>,
        unique_together: Vec<Vec<&'static str>>,
    },
    /// Change the declared type of one column, rewriting the table.
    AlterField {
        table: &'static str,
        column: &'static str,
        field_type: FieldType,
    },
    /// Replace every uniqueness scope on the table with `fields`.
    AlterUniqueTogether {
        table: &'static str,
        fields: Vec<&'static str>,
    },
}

impl Operation {
    pub fn describe(&self) -> String {
        match self {
            Self::CreateTable { table, .. } => format!("Create table {table}"),
            Self::AlterField {
                table,
                column,
                field_type,
            } => format!("Alter field {column} on {table} to {}", field_type.sql()),
            Self::AlterUniqueTogether { table, fields } => {
                format!("Alter unique_together for {table} ({})", fields.join(", "))
            }
        }
    }

    pub fn apply(&self, conn: &Connection, step: MigrationKey) -> Result<(), MigrationError> {
        match self {
            Self::CreateTable {
                table,
                columns,
                unique_together,
            } => create_table(conn, step, table, columns, unique_together),
            Self::AlterField {
                table,
                column,
                field_type,
            } => alter_field(conn, step, table, column, *field_type),
            Self::AlterUniqueTogether { table, fields } => {
                alter_unique_together(conn, step, table, fields)
            }
        }
    }
}

fn existing_schema(
    conn: &Connection,
    step: MigrationKey,
    table: &str,
) -> Result<TableSchema, MigrationError> {
    load_schema(conn, table)?.ok_or_else(|| {
        SchemaStateError::UnknownTable {
            step,
            table: table.to_string(),
        }
        .into()
    })
}

fn require_columns(
    schema: &TableSchema,
    step: MigrationKey,
    columns: &[&str],
) -> Result<(), MigrationError> {
    match columns.iter().find(|c| schema.column(c).is_none()) {
        Some(missing) => Err(SchemaStateError::UnknownColumn {
            step,
            table: schema.name.clone(),
            column: missing.to_string(),
        }
        .into()),
        None => Ok(()),
    }
}

fn create_table(
    conn: &Connection,
    step: MigrationKey,
    table: &str,
    columns: &[ColumnDef],
    unique_together: &[Vec<&'static str>],
) -> Result<(), MigrationError> {
    if sqlite::table_exists(conn, table)? {
        return Err(SchemaStateError::TableExists {
            step,
            table: table.to_string(),
        }
        .into());
    }

    let schema = TableSchema {
        name: table.to_string(),
        columns: columns
            .iter()
            .map(|c| TableColumn {
                name: c.name.to_string(),
                decl_type: c.field_type.sql(),
                not_null: !c.null,
                default: None,
                pk_position: u32::from(c.primary_key),
            })
            .collect(),
        autoincrement: columns.iter().any(|c| c.primary_key),
        foreign_keys: columns
            .iter()
            .filter_map(|c| {
                c.references.map(|(ref_table, ref_column)| ForeignKey {
                    table: ref_table.to_string(),
                    from: vec![c.name.to_string()],
                    to: vec![ref_column.to_string()],
                    on_update: "NO ACTION".to_string(),
                    on_delete: "NO ACTION".to_string(),
                })
            })
            .collect(),
        unique_constraints: unique_together
            .iter()
            .map(|fields| fields.iter().map(|f| f.to_string()).collect())
            .collect(),
        indexes: Vec::new(),
    };

    conn.execute_batch(&schema.create_sql(table))?;
    for fk in &schema.foreign_keys {
        let column = fk.from.join("_");
        conn.execute_batch(&format!(
            "CREATE INDEX {} ON {} ({})",
            quote(&format!("{table}_{column}_idx")),
            quote(table),
            quote(&column)
        ))?;
    }
    Ok(())
}

fn alter_field(
    conn: &Connection,
    step: MigrationKey,
    table: &str,
    column: &str,
    field_type: FieldType,
) -> Result<(), MigrationError> {
    let mut schema = existing_schema(conn, step, table)?;
    require_columns(&schema, step, &[column])?;

    let decl_type = field_type.sql();
    if let Some(col) = schema.column_mut(column) {
        if col.decl_type.eq_ignore_ascii_case(&decl_type) {
            tracing::debug!(table = %table, column = %column, "Column already has target type");
            return Ok(());
        }
        col.decl_type = decl_type;
    }

    tracing::info!(
        table = %table,
        column = %column,
        field_type = %field_type.sql(),
        "Rewriting table to change column type; blocks writers for the duration"
    );
    rebuild_table(conn, &schema)?;
    Ok(())
}

fn alter_unique_together(
    conn: &Connection,
    step: MigrationKey,
    table: &str,
    fields: &[&str],
) -> Result<(), MigrationError> {
    let schema = existing_schema(conn, step, table)?;
    require_columns(&schema, step, fields)?;

    check_no_duplicates(conn, step, table, fields)?;

    // Inline constraints can only go away with a rewrite.
    if !schema.unique_constraints.is_empty() {
        let mut without = schema.clone();
        without.unique_constraints.clear();
        rebuild_table(conn, &without)?;
    }
    for index in schema.indexes.iter().filter(|i| i.unique) {
        conn.execute_batch(&format!("DROP INDEX {}", quote(&index.name)))?;
        tracing::debug!(index = %index.name, "Dropped unique index");
    }

    let index_name = format!("{}_{}_uniq", table, fields.join("_"));
    let columns = fields.iter().map(|f| quote(f)).collect::<Vec<_>>().join(", ");
    conn.execute_batch(&format!(
        "CREATE UNIQUE INDEX {} ON {} ({columns})",
        quote(&index_name),
        quote(table)
    ))?;
    tracing::debug!(index = %index_name, "Created unique index");
    Ok(())
}

/// Fail with a constraint violation if existing rows break the new scope.
fn check_no_duplicates(
    conn: &Connection,
    step: MigrationKey,
    table: &str,
    fields: &[&str],
) -> Result<(), MigrationError> {
    let columns = fields.iter().map(|f| quote(f)).collect::<Vec<_>>().join(", ");
    let not_null = fields
        .iter()
        .map(|f| format!("{} IS NOT NULL", quote(f)))
        .collect::<Vec<_>>()
        .join(" AND ");
    let sql = format!(
        "SELECT {columns}, COUNT(*) FROM {} WHERE {not_null} \
         GROUP BY {columns} HAVING COUNT(*) > 1",
        quote(table)
    );

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    let mut groups = 0usize;
    let mut first = None;
    while let Some(row) = rows.next()? {
        groups += 1;
        if first.is_none() {
            let values = (0..fields.len())
                .map(|i| row.get_ref(i).map(display_value))
                .collect::<Result<Vec<_>, _>>()?;
            let rows: i64 = row.get(fields.len())?;
            first = Some((values, rows));
        }
    }

    match first {
        None => Ok(()),
        Some((values, rows)) => Err(MigrationError::ConstraintViolation {
            step,
            table: table.to_string(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
            duplicate: values,
            rows,
            groups,
        }),
    }
}

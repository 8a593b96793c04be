//! Migration definitions.

use std::fmt;

use crate::migrations::operations::Operation;

/// Identifies a migration step within the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MigrationKey {
    pub app: &'static str,
    pub name: &'static str,
}

impl MigrationKey {
    pub const fn new(app: &'static str, name: &'static str) -> Self {
        Self { app, name }
    }
}

impl fmt::Display for MigrationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.app, self.name)
    }
}

/// One forward-only schema change with a declared predecessor.
#[derive(Debug, Clone)]
pub struct Migration {
    pub key: MigrationKey,
    pub predecessor: Option<MigrationKey>,
    pub operations: Vec<Operation>,
}

/// Declared column types, rendered the way the app's tables spell them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Integer,
    Varchar(u32),
    Text,
    DateTime,
}

impl FieldType {
    pub fn sql(self) -> String {
        match self {
            Self::Integer => "integer".to_string(),
            Self::Varchar(len) => format!("varchar({len})"),
            Self::Text => "text".to_string(),
            Self::DateTime => "datetime".to_string(),
        }
    }
}

/// Column definition for a created table.
#[derive(Debug, Clone)]
pub struct ColumnDef {
    pub name: &'static str,
    pub field_type: FieldType,
    pub null: bool,
    pub primary_key: bool,
    pub references: Option<(&'static str, &'static str)>,
}

impl ColumnDef {
    /// `integer NOT NULL PRIMARY KEY AUTOINCREMENT`.
    pub const fn auto_id() -> Self {
        Self {
            name: "id",
            field_type: FieldType::Integer,
            null: false,
            primary_key: true,
            references: None,
        }
    }

    pub const fn new(name: &'static str, field_type: FieldType) -> Self {
        Self {
            name,
            field_type,
            null: false,
            primary_key: false,
            references: None,
        }
    }

    pub const fn nullable(mut self) -> Self {
        self.null = true;
        self
    }

    pub const fn references(mut self, table: &'static str, column: &'static str) -> Self {
        self.references = Some((table, column));
        self
    }
}

//! Schema migrations.
//!
//! # Data Flow
//! ```text
//! chain() → Migrator (validated dependency order)
//!     → plan(): steps missing from schema_migrations
//!     → apply(step):
//!         BEGIN IMMEDIATE
//!         → ordering checks against the ledger
//!         → operations (introspect → rebuild / index DDL)
//!         → record in schema_migrations
//!         COMMIT (or roll back on any error)
//! ```
//!
//! # Design Decisions
//! - Forward-only: no step knows how to undo itself
//! - The applied set lives in the database being migrated
//! - Errors are fatal and never retried automatically

pub mod ledger;
pub mod model;
pub mod monolith;
pub mod operations;
pub mod runner;
pub mod sqlite;

pub use ledger::AppliedMigration;
pub use model::{ColumnDef, FieldType, Migration, MigrationKey};
pub use operations::Operation;
pub use runner::Migrator;

/// The console's migration chain, oldest first.
pub fn chain() -> Vec<Migration> {
    vec![
        monolith::m0039_auto_20201012_0916::migration(),
        monolith::m0040_auto_20201012_1432::migration(),
    ]
}

/// The schema is not in the state a step expects.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaStateError {
    #[error("{0} is already applied")]
    AlreadyApplied(MigrationKey),

    #[error("{step} requires {predecessor}, which is not applied")]
    PredecessorMissing {
        step: MigrationKey,
        predecessor: MigrationKey,
    },

    #[error("{step}: table {table} does not exist")]
    UnknownTable { step: MigrationKey, table: String },

    #[error("{step}: table {table} has no column {column}")]
    UnknownColumn {
        step: MigrationKey,
        table: String,
        column: String,
    },

    #[error("{step}: table {table} already exists")]
    TableExists { step: MigrationKey, table: String },
}

#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error(transparent)]
    SchemaState(#[from] SchemaStateError),

    #[error(
        "{step}: {groups} duplicate ({}) group(s) in {table}, first is ({}) x{rows}; \
         clean up the data before retrying",
        .fields.join(", "),
        .duplicate.join(", ")
    )]
    ConstraintViolation {
        step: MigrationKey,
        table: String,
        fields: Vec<String>,
        duplicate: Vec<String>,
        rows: i64,
        groups: usize,
    },

    #[error("{step}: foreign key check failed for table {table}")]
    ForeignKeyCheck { step: MigrationKey, table: String },

    #[error("invalid migration chain: {0}")]
    InvalidChain(String),

    #[error("unknown migration {0:?}")]
    UnknownMigration(String),

    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

//! Baseline: enrollments and enrolled machines as they stood before serial
//! numbers became free-form text.
//!
//! Serial numbers are a bounded `varchar(255)` with no uniqueness scope.

use crate::migrations::model::{ColumnDef, FieldType, Migration, MigrationKey};
use crate::migrations::monolith::{APP, ENROLLED_MACHINE_TABLE, ENROLLMENT_TABLE};
use crate::migrations::operations::Operation;

pub const KEY: MigrationKey = MigrationKey::new(APP, "0039_auto_20201012_0916");

pub fn migration() -> Migration {
    Migration {
        key: KEY,
        predecessor: None,
        operations: vec![
            Operation::CreateTable {
                table: ENROLLMENT_TABLE,
                columns: vec![
                    ColumnDef::auto_id(),
                    ColumnDef::new("version", FieldType::Integer),
                    ColumnDef::new("created_at", FieldType::DateTime),
                ],
                unique_together: Vec::new(),
            },
            Operation::CreateTable {
                table: ENROLLED_MACHINE_TABLE,
                columns: vec![
                    ColumnDef::auto_id(),
                    ColumnDef::new("enrollment_id", FieldType::Integer)
                        .references(ENROLLMENT_TABLE, "id"),
                    ColumnDef::new("serial_number", FieldType::Varchar(255)),
                    ColumnDef::new("created_at", FieldType::DateTime),
                ],
                unique_together: Vec::new(),
            },
        ],
    }
}

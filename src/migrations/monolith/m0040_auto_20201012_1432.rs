//! Serial numbers become unbounded text, and are unique per enrollment
//! rather than globally.
//!
//! On SQLite the type change rewrites `monolith_enrolledmachine`; expect it
//! to hold the write lock for a time proportional to the row count.

use crate::migrations::model::{FieldType, Migration, MigrationKey};
use crate::migrations::monolith::{m0039_auto_20201012_0916, APP, ENROLLED_MACHINE_TABLE};
use crate::migrations::operations::Operation;

pub const KEY: MigrationKey = MigrationKey::new(APP, "0040_auto_20201012_1432");

pub fn migration() -> Migration {
    Migration {
        key: KEY,
        predecessor: Some(m0039_auto_20201012_0916::KEY),
        operations: vec![
            Operation::AlterField {
                table: ENROLLED_MACHINE_TABLE,
                column: "serial_number",
                field_type: FieldType::Text,
            },
            Operation::AlterUniqueTogether {
                table: ENROLLED_MACHINE_TABLE,
                fields: vec!["enrollment_id", "serial_number"],
            },
        ],
    }
}

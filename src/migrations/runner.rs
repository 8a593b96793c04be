//! Ordered, atomic migration runner.
//!
//! # Responsibilities
//! - Hold the chain of steps in dependency order
//! - Report which steps are applied or pending
//! - Apply one step, or every pending step, atomically per step
//!
//! # Design Decisions
//! - Each step runs inside one IMMEDIATE transaction: readers see the pre- or
//!   post-image, never a partial one, and any error rolls everything back
//! - Ordering is checked inside the same transaction that applies the step
//! - Foreign key enforcement is suspended while tables are rebuilt and
//!   verified with `foreign_key_check` before commit

use std::collections::HashSet;
use std::time::Instant;

use rusqlite::{Connection, TransactionBehavior};

use crate::migrations::ledger::{self, AppliedMigration};
use crate::migrations::model::{Migration, MigrationKey};
use crate::migrations::{MigrationError, SchemaStateError};

/// Runs a chain of migrations against a SQLite connection.
#[derive(Debug, Clone)]
pub struct Migrator {
    steps: Vec<Migration>,
}

impl Migrator {
    /// Build a runner, checking that every predecessor comes earlier in `steps`.
    pub fn new(steps: Vec<Migration>) -> Result<Self, MigrationError> {
        let mut seen = HashSet::new();
        for step in &steps {
            if let Some(predecessor) = step.predecessor {
                if !seen.contains(&predecessor) {
                    return Err(MigrationError::InvalidChain(format!(
                        "{} depends on {}, which does not precede it",
                        step.key, predecessor
                    )));
                }
            }
            if !seen.insert(step.key) {
                return Err(MigrationError::InvalidChain(format!(
                    "{} is declared more than once",
                    step.key
                )));
            }
        }
        Ok(Self { steps })
    }

    /// Runner for the console's own schema.
    pub fn inventory() -> Result<Self, MigrationError> {
        Self::new(crate::migrations::chain())
    }

    pub fn steps(&self) -> &[Migration] {
        &self.steps
    }

    /// Look a step up by `name` or `app.name`.
    pub fn find(&self, name: &str) -> Result<&Migration, MigrationError> {
        self.steps
            .iter()
            .find(|m| m.key.name == name || m.key.to_string() == name)
            .ok_or_else(|| MigrationError::UnknownMigration(name.to_string()))
    }

    pub fn applied(&self, conn: &Connection) -> Result<Vec<AppliedMigration>, MigrationError> {
        ledger::ensure(conn)?;
        Ok(ledger::list(conn)?)
    }

    /// Steps not yet applied, in order.
    pub fn plan(&self, conn: &Connection) -> Result<Vec<&Migration>, MigrationError> {
        ledger::ensure(conn)?;
        let mut pending = Vec::new();
        for step in &self.steps {
            if !ledger::is_applied(conn, step.key)? {
                pending.push(step);
            }
        }
        Ok(pending)
    }

    /// Apply every pending step in order, returning what was applied.
    pub fn migrate(&self, conn: &mut Connection) -> Result<Vec<MigrationKey>, MigrationError> {
        let pending: Vec<Migration> = self.plan(conn)?.into_iter().cloned().collect();
        if pending.is_empty() {
            tracing::info!("No migrations to apply");
            return Ok(Vec::new());
        }

        let mut applied = Vec::with_capacity(pending.len());
        for step in &pending {
            self.apply(conn, step)?;
            applied.push(step.key);
        }
        Ok(applied)
    }

    /// Apply one step.
    ///
    /// Fails with a schema state error if the step is already applied, its
    /// predecessor is not, or its target tables or columns are missing; fails
    /// with a constraint violation if existing rows break a new constraint.
    /// On any failure the schema and the ledger are left untouched.
    pub fn apply(&self, conn: &mut Connection, step: &Migration) -> Result<(), MigrationError> {
        let foreign_keys: bool = conn.pragma_query_value(None, "foreign_keys", |row| row.get(0))?;
        if foreign_keys {
            conn.pragma_update(None, "foreign_keys", false)?;
        }

        let result = Self::apply_atomically(conn, step, foreign_keys);

        if foreign_keys {
            if let Err(e) = conn.pragma_update(None, "foreign_keys", true) {
                tracing::error!(error = %e, "Failed to re-enable foreign keys");
                if result.is_ok() {
                    return Err(e.into());
                }
            }
        }

        if let Err(e) = &result {
            tracing::error!(step = %step.key, error = %e, "Migration failed, rolled back");
        }
        result
    }

    /// Record a step as applied without running its operations.
    pub fn fake(&self, conn: &mut Connection, step: &Migration) -> Result<(), MigrationError> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        ledger::ensure(&tx)?;
        Self::check_order(&tx, step)?;
        ledger::record(&tx, step.key)?;
        tx.commit()?;
        tracing::warn!(step = %step.key, "Marked migration as applied without running it");
        Ok(())
    }

    fn apply_atomically(
        conn: &mut Connection,
        step: &Migration,
        check_foreign_keys: bool,
    ) -> Result<(), MigrationError> {
        let started = Instant::now();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        ledger::ensure(&tx)?;
        Self::check_order(&tx, step)?;

        for operation in &step.operations {
            tracing::info!(
                step = %step.key,
                operation = %operation.describe(),
                "Applying operation"
            );
            operation.apply(&tx, step.key)?;
        }

        if check_foreign_keys {
            let violation: Option<String> = {
                let mut stmt = tx.prepare("PRAGMA foreign_key_check")?;
                let mut rows = stmt.query([])?;
                match rows.next()? {
                    Some(row) => Some(row.get(0)?),
                    None => None,
                }
            };
            if let Some(table) = violation {
                return Err(MigrationError::ForeignKeyCheck {
                    step: step.key,
                    table,
                });
            }
        }

        ledger::record(&tx, step.key)?;
        tx.commit()?;

        tracing::info!(
            step = %step.key,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Applied migration"
        );
        Ok(())
    }

    fn check_order(conn: &Connection, step: &Migration) -> Result<(), MigrationError> {
        if ledger::is_applied(conn, step.key)? {
            return Err(SchemaStateError::AlreadyApplied(step.key).into());
        }
        if let Some(predecessor) = step.predecessor {
            if !ledger::is_applied(conn, predecessor)? {
                return Err(SchemaStateError::PredecessorMissing {
                    step: step.key,
                    predecessor,
                }
                .into());
            }
        }
        Ok(())
    }
}

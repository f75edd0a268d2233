//! Migration history tracking.
//!
//! This module manages the `migrations` table. Every schema version of every
//! model gets one row, appended when the version is generated; replay only
//! flips `is_applied` and refreshes `applied_at`.

use tracing::debug;

use crate::database::{Database, Row};
use crate::dialect::MIGRATIONS_TABLE;
use crate::error::{MigrateError, Result};

/// A row of the migrations table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationRecord {
    /// Unique ID in the migrations table.
    pub id: i64,
    /// Model (table) name.
    pub model_name: String,
    /// Version token.
    pub version: String,
    /// SHA-1 of the schema snapshot.
    pub schema_hash: String,
    /// The schema snapshot text.
    pub schema_json: String,
    /// Whether this version is currently applied.
    pub is_applied: bool,
    /// When the version was last applied or reverted, as stored.
    pub applied_at: String,
}

impl MigrationRecord {
    fn from_row(row: &Row) -> Result<Self> {
        let column = |name: &str| {
            row.get(name).cloned().ok_or_else(|| {
                MigrateError::SchemaParse(format!("{MIGRATIONS_TABLE} row has no '{name}' column"))
            })
        };

        let id = column("id")?;
        let id: i64 = id.parse().map_err(|_| {
            MigrateError::SchemaParse(format!("{MIGRATIONS_TABLE} row has invalid id '{id}'"))
        })?;

        Ok(Self {
            id,
            model_name: column("model_name")?,
            version: column("version")?,
            schema_hash: column("schema_hash")?,
            schema_json: column("schema_json")?,
            is_applied: matches!(column("is_applied")?.as_str(), "1" | "true" | "TRUE"),
            applied_at: column("applied_at")?,
        })
    }
}

const SELECT_COLUMNS: &str =
    "id, model_name, version, schema_hash, schema_json, is_applied, applied_at";

/// Manages the migration history in the database.
pub struct MigrationHistory<'a, D: Database> {
    db: &'a D,
}

impl<'a, D: Database> MigrationHistory<'a, D> {
    /// Creates a new migration history manager.
    pub const fn new(db: &'a D) -> Self {
        Self { db }
    }

    /// Ensures the migrations table exists.
    pub async fn ensure_table(&self) -> Result<()> {
        let sql = self.db.dialect().migrations_table_sql();
        self.db.execute_raw(&sql, &[]).await?;
        Ok(())
    }

    /// Appends a new, applied version.
    pub async fn record(
        &self,
        model: &str,
        version: &str,
        schema_hash: &str,
        schema_json: &str,
    ) -> Result<()> {
        debug!(model, version, "Recording migration");
        self.db
            .execute_raw(
                &format!(
                    "INSERT INTO {MIGRATIONS_TABLE} \
                     (model_name, version, schema_hash, schema_json) VALUES (?, ?, ?, ?)"
                ),
                &[model, version, schema_hash, schema_json],
            )
            .await?;
        Ok(())
    }

    /// Returns every version of a model, oldest first.
    pub async fn for_model(&self, model: &str) -> Result<Vec<MigrationRecord>> {
        let rows = self
            .db
            .execute_query(
                &format!(
                    "SELECT {SELECT_COLUMNS} FROM {MIGRATIONS_TABLE} \
                     WHERE model_name = ? ORDER BY id ASC"
                ),
                &[model],
            )
            .await?;
        rows.iter().map(MigrationRecord::from_row).collect()
    }

    /// Returns every recorded version of every model, oldest first.
    pub async fn all(&self) -> Result<Vec<MigrationRecord>> {
        let rows = self
            .db
            .execute_query(
                &format!("SELECT {SELECT_COLUMNS} FROM {MIGRATIONS_TABLE} ORDER BY id ASC"),
                &[],
            )
            .await?;
        rows.iter().map(MigrationRecord::from_row).collect()
    }

    /// Returns the newest version of a model, applied or not.
    pub async fn latest(&self, model: &str) -> Result<Option<MigrationRecord>> {
        let rows = self
            .db
            .execute_query(
                &format!(
                    "SELECT {SELECT_COLUMNS} FROM {MIGRATIONS_TABLE} \
                     WHERE model_name = ? ORDER BY id DESC LIMIT 1"
                ),
                &[model],
            )
            .await?;
        rows.first().map(MigrationRecord::from_row).transpose()
    }

    /// Returns the newest applied version of a model.
    pub async fn latest_applied(&self, model: &str) -> Result<Option<MigrationRecord>> {
        let rows = self
            .db
            .execute_query(
                &format!(
                    "SELECT {SELECT_COLUMNS} FROM {MIGRATIONS_TABLE} \
                     WHERE model_name = ? AND is_applied = 1 ORDER BY id DESC LIMIT 1"
                ),
                &[model],
            )
            .await?;
        rows.first().map(MigrationRecord::from_row).transpose()
    }

    /// Returns true if the model already has a version with this token.
    pub async fn has_version(&self, model: &str, version: &str) -> Result<bool> {
        let rows = self
            .db
            .execute_query(
                &format!(
                    "SELECT id FROM {MIGRATIONS_TABLE} WHERE model_name = ? AND version = ?"
                ),
                &[model, version],
            )
            .await?;
        Ok(!rows.is_empty())
    }

    /// Clears the applied flag without touching the timestamp. Used as the
    /// in-progress marker while a version is being replayed.
    pub async fn mark_in_progress(&self, model: &str, version: &str) -> Result<()> {
        self.db
            .execute_raw(
                &format!(
                    "UPDATE {MIGRATIONS_TABLE} SET is_applied = 0 \
                     WHERE model_name = ? AND version = ?"
                ),
                &[model, version],
            )
            .await?;
        Ok(())
    }

    /// Sets the applied flag and stamps the time.
    pub async fn mark(&self, model: &str, version: &str, applied: bool) -> Result<()> {
        let flag = u8::from(applied);
        self.db
            .execute_raw(
                &format!(
                    "UPDATE {MIGRATIONS_TABLE} SET is_applied = {flag}, \
                     applied_at = CURRENT_TIMESTAMP WHERE model_name = ? AND version = ?"
                ),
                &[model, version],
            )
            .await?;
        Ok(())
    }
}

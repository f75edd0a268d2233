//! Database capability.
//!
//! The migration engine only needs to run statements and read rows back as
//! strings; [`Database`] is that seam. [`SqliteDatabase`] implements it over
//! an `sqlx` pool.

mod sqlite;

pub use sqlite::SqliteDatabase;

use std::collections::BTreeMap;

use quill_core::Model;

use crate::dialect::Dialect;
use crate::error::Result;
use crate::snapshot::SchemaSnapshot;

/// A result row: column name to value. SQL `NULL` reads as an empty string.
pub type Row = BTreeMap<String, String>;

/// A database the migration engine can drive.
///
/// Statements use `?` placeholders; `params` are bound in order.
#[allow(async_fn_in_trait)]
pub trait Database {
    /// Returns the dialect used to render DDL for this database.
    fn dialect(&self) -> &dyn Dialect;

    /// Runs a statement and returns every row it produced.
    async fn execute_query(&self, sql: &str, params: &[&str]) -> Result<Vec<Row>>;

    /// Runs a statement for its side effects. Returns the number of affected
    /// rows.
    async fn execute_raw(&self, sql: &str, params: &[&str]) -> Result<u64>;

    /// Returns the message of the most recent failed statement.
    fn last_error(&self) -> Option<String>;

    /// Escapes a value for use between single quotes.
    fn escape_string(&self, input: &str) -> String {
        input.replace('\'', "''")
    }

    /// Renders `CREATE TABLE IF NOT EXISTS` for a model.
    fn create_table_sql(&self, model: &dyn Model) -> String {
        let snapshot = SchemaSnapshot::from_model(model);
        self.dialect()
            .create_table_sql(model.table_name(), snapshot.fields(), true)
    }

    /// Creates the table of a model if it does not exist.
    async fn create_table(&self, model: &dyn Model) -> Result<()> {
        self.execute_raw(&self.create_table_sql(model), &[]).await?;
        Ok(())
    }
}

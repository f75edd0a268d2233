//! SQLite backend.

use std::str::FromStr;
use std::sync::Mutex;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row as _};
use tracing::debug;

use super::{Database, Row};
use crate::dialect::{Dialect, SqliteDialect};
use crate::error::Result;

/// [`Database`] over an `sqlx` SQLite pool.
pub struct SqliteDatabase {
    pool: SqlitePool,
    dialect: Box<dyn Dialect>,
    last_error: Mutex<Option<String>>,
}

impl SqliteDatabase {
    /// Wraps a pool, rendering DDL with [`SqliteDialect`].
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self::with_dialect(pool, SqliteDialect::new())
    }

    /// Wraps a pool, rendering DDL with another dialect.
    #[must_use]
    pub fn with_dialect(pool: SqlitePool, dialect: impl Dialect + 'static) -> Self {
        Self {
            pool,
            dialect: Box::new(dialect),
            last_error: Mutex::new(None),
        }
    }

    /// Opens a database URL, creating the file if missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the database cannot be
    /// opened.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        Ok(Self::new(pool))
    }

    /// Returns the underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn record_error(&self, err: &sqlx::Error) {
        if let Ok(mut slot) = self.last_error.lock() {
            *slot = Some(err.to_string());
        }
    }

    fn convert_row(row: &SqliteRow) -> Result<Row> {
        let mut out = Row::new();
        for column in row.columns() {
            let i = column.ordinal();
            let value = if let Ok(value) = row.try_get::<Option<String>, _>(i) {
                value
            } else if let Ok(value) = row.try_get::<Option<i64>, _>(i) {
                value.map(|n| n.to_string())
            } else if let Ok(value) = row.try_get::<Option<f64>, _>(i) {
                value.map(|n| n.to_string())
            } else if let Ok(value) = row.try_get::<Option<Vec<u8>>, _>(i) {
                value.map(hex::encode)
            } else {
                row.try_get_unchecked::<Option<String>, _>(i)?
            };
            out.insert(column.name().to_string(), value.unwrap_or_default());
        }
        Ok(out)
    }
}

impl Database for SqliteDatabase {
    fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    async fn execute_query(&self, sql: &str, params: &[&str]) -> Result<Vec<Row>> {
        debug!(sql, "Executing query");
        let mut query = sqlx::query(sql);
        for param in params {
            query = query.bind(*param);
        }
        let rows = query.fetch_all(&self.pool).await.map_err(|e| {
            self.record_error(&e);
            e
        })?;
        rows.iter().map(Self::convert_row).collect()
    }

    async fn execute_raw(&self, sql: &str, params: &[&str]) -> Result<u64> {
        debug!(sql, "Executing statement");
        let mut query = sqlx::query(sql);
        for param in params {
            query = query.bind(*param);
        }
        let result = query.execute(&self.pool).await.map_err(|e| {
            self.record_error(&e);
            e
        })?;
        Ok(result.rows_affected())
    }

    fn last_error(&self) -> Option<String> {
        self.last_error.lock().ok().and_then(|slot| slot.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_core::{Field, FieldType, Record};
    use sqlx::sqlite::SqlitePoolOptions;

    async fn create_test_db() -> SqliteDatabase {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await
            .expect("Failed to create in-memory SQLite pool");
        SqliteDatabase::new(pool)
    }

    #[tokio::test]
    async fn test_query_reads_every_column_as_text() {
        let db = create_test_db().await;
        db.execute_raw(
            "CREATE TABLE t (i INTEGER, r REAL, s TEXT, b BOOLEAN, n TEXT, x BLOB)",
            &[],
        )
        .await
        .unwrap();
        db.execute_raw(
            "INSERT INTO t (i, r, s, b, n, x) VALUES (?, 2.5, ?, 1, NULL, X'0aff')",
            &["42", "hi"],
        )
        .await
        .unwrap();

        let rows = db.execute_query("SELECT * FROM t", &[]).await.unwrap();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row["i"], "42");
        assert_eq!(row["r"], "2.5");
        assert_eq!(row["s"], "hi");
        assert_eq!(row["b"], "1");
        assert_eq!(row["n"], "");
        assert_eq!(row["x"], "0aff");
    }

    #[tokio::test]
    async fn test_last_error() {
        let db = create_test_db().await;
        assert!(db.last_error().is_none());
        assert!(db.execute_raw("SELEC nonsense", &[]).await.is_err());
        assert!(db.last_error().is_some());
    }

    #[tokio::test]
    async fn test_create_table_from_model() {
        let db = create_test_db().await;
        let model = Record::new(
            "notes",
            vec![
                Field::new("id", FieldType::Integer)
                    .primary_key()
                    .auto_increment(),
                Field::new("body", FieldType::Text).nullable(),
            ],
        );
        assert_eq!(
            db.create_table_sql(&model),
            "CREATE TABLE IF NOT EXISTS notes (id INTEGER PRIMARY KEY AUTOINCREMENT, body TEXT)"
        );
        db.create_table(&model).await.unwrap();
        // Idempotent.
        db.create_table(&model).await.unwrap();
        let affected = db
            .execute_raw("INSERT INTO notes (body) VALUES (?)", &["x"])
            .await
            .unwrap();
        assert_eq!(affected, 1);
    }

    #[test]
    fn test_escape_string() {
        let db = tokio_test::block_on(create_test_db());
        assert_eq!(db.escape_string("it's"), "it''s");
        assert_eq!(db.dialect().name(), "sqlite");
    }
}

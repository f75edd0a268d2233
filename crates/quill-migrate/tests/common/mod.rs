#![allow(dead_code)]

use quill_core::{Field, FieldType, Record};
use quill_migrate::prelude::*;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

pub async fn memory_pool() -> SqlitePool {
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect(":memory:")
        .await
        .expect("Failed to create in-memory SQLite pool")
}

/// SQLite storage that renders DDL with the MySQL dialect.
///
/// SQLite accepts the MySQL create and alter statements the engine generates,
/// except the migrations table, which is swapped for the SQLite one.
pub struct MySqlOnSqlite {
    inner: SqliteDatabase,
}

impl MySqlOnSqlite {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            inner: SqliteDatabase::with_dialect(pool, MySqlDialect::new()),
        }
    }
}

impl Database for MySqlOnSqlite {
    fn dialect(&self) -> &dyn Dialect {
        self.inner.dialect()
    }

    async fn execute_query(&self, sql: &str, params: &[&str]) -> Result<Vec<Row>> {
        self.inner.execute_query(sql, params).await
    }

    async fn execute_raw(&self, sql: &str, params: &[&str]) -> Result<u64> {
        if sql == MySqlDialect::new().migrations_table_sql() {
            let sql = SqliteDialect::new().migrations_table_sql();
            return self.inner.execute_raw(&sql, params).await;
        }
        self.inner.execute_raw(sql, params).await
    }

    fn last_error(&self) -> Option<String> {
        self.inner.last_error()
    }
}

pub async fn mysql_engine(options: EngineOptions) -> MigrationEngine<MySqlOnSqlite> {
    let mut engine = MigrationEngine::with_options(MySqlOnSqlite::new(memory_pool().await), options);
    engine
        .initialize()
        .await
        .unwrap_or_else(|e| panic!("Failed to initialize engine: {e}"));
    engine
}

pub async fn sqlite_engine(options: EngineOptions) -> MigrationEngine<SqliteDatabase> {
    let mut engine = MigrationEngine::with_options(SqliteDatabase::new(memory_pool().await), options);
    engine
        .initialize()
        .await
        .unwrap_or_else(|e| panic!("Failed to initialize engine: {e}"));
    engine
}

/// `users` with an auto-increment key and a 50 character name.
pub fn users() -> Record {
    Record::new(
        "users",
        vec![
            Field::new("id", FieldType::Integer)
                .primary_key()
                .auto_increment(),
            Field::new("name", FieldType::String).max_length(50),
        ],
    )
}

pub fn email() -> Field {
    Field::new("email", FieldType::String)
        .max_length(100)
        .nullable()
}

/// Returns true for `YYYYMMDD_HHMMSS`.
pub fn is_timestamp_version(version: &str) -> bool {
    version.len() == 15
        && version.char_indices().all(|(i, c)| {
            if i == 8 {
                c == '_'
            } else {
                c.is_ascii_digit()
            }
        })
}

/// Column names of a table, in declaration order.
pub async fn columns<D: Database>(db: &D, table: &str) -> Vec<String> {
    db.execute_query(&format!("SELECT name FROM pragma_table_info('{table}')"), &[])
        .await
        .unwrap_or_else(|e| panic!("Failed to read columns of {table}: {e}"))
        .into_iter()
        .filter_map(|mut row| row.remove("name"))
        .collect()
}

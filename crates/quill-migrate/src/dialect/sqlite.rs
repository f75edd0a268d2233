//! SQLite dialect.
//!
//! SQLite cannot change a column definition in place, so `MODIFY COLUMN`
//! renders as a comment that the executors skip.

use quill_core::Field;

use super::{quote_literal, Dialect, MIGRATIONS_TABLE};

/// SQLite migration dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl SqliteDialect {
    /// Creates a new SQLite dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn create_column(&self, field: &Field) -> String {
        let opts = &field.options;
        let mut sql = format!("{} {}", field.name, self.column_type(field));

        if opts.primary_key {
            sql.push_str(" PRIMARY KEY");
            if opts.auto_increment {
                sql.push(' ');
                sql.push_str(self.auto_increment_keyword());
            }
        }
        if opts.unique && !opts.primary_key {
            sql.push_str(" UNIQUE");
        }
        if !opts.nullable && !opts.primary_key {
            sql.push_str(" NOT NULL");
        }
        if let Some(default) = opts.default_literal() {
            sql.push_str(" DEFAULT ");
            sql.push_str(&quote_literal(default));
        }

        sql
    }
}

impl Dialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn auto_increment_keyword(&self) -> &'static str {
        "AUTOINCREMENT"
    }

    fn supports_modify_column(&self) -> bool {
        false
    }

    fn create_table_sql(&self, table: &str, fields: &[Field], if_not_exists: bool) -> String {
        let mut sql = String::from("CREATE TABLE ");
        if if_not_exists {
            sql.push_str("IF NOT EXISTS ");
        }
        sql.push_str(table);
        sql.push_str(" (");

        let columns: Vec<String> = fields.iter().map(|f| self.create_column(f)).collect();
        sql.push_str(&columns.join(", "));

        sql.push(')');
        sql
    }

    fn migrations_table_sql(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {MIGRATIONS_TABLE} (\
             id INTEGER PRIMARY KEY AUTOINCREMENT, \
             model_name TEXT NOT NULL, \
             version TEXT NOT NULL, \
             schema_hash TEXT NOT NULL, \
             schema_json TEXT NOT NULL, \
             is_applied BOOLEAN NOT NULL DEFAULT 1, \
             applied_at DATETIME DEFAULT CURRENT_TIMESTAMP)"
        )
    }

    fn modify_column_sql(&self, table: &str, field: &Field) -> String {
        format!(
            "-- MODIFY COLUMN not supported in SQLite. \
             Table recreation required for: {table}.{} ({})",
            field.name,
            self.column_definition(field)
        )
    }
}

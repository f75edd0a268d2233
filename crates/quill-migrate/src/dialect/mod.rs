//! Database dialect implementations.
//!
//! Each dialect knows how to render the DDL the migration engine needs for
//! its database system. Identifiers are emitted bare.

mod mysql;
mod sqlite;

pub use mysql::MySqlDialect;
pub use sqlite::SqliteDialect;

use quill_core::{Field, FieldType};

/// Name of the history table.
pub const MIGRATIONS_TABLE: &str = "migrations";

/// Trait for database-specific SQL generation.
pub trait Dialect: Send + Sync {
    /// Returns the dialect name.
    fn name(&self) -> &'static str;

    /// Returns the auto-increment keyword for this dialect.
    fn auto_increment_keyword(&self) -> &'static str;

    /// Generates `CREATE TABLE` for a full field list.
    fn create_table_sql(&self, table: &str, fields: &[Field], if_not_exists: bool) -> String;

    /// Generates the DDL of the migration history table.
    fn migrations_table_sql(&self) -> String;

    /// Returns whether `ALTER TABLE ... MODIFY COLUMN` is available.
    fn supports_modify_column(&self) -> bool {
        true
    }

    /// Returns the column type used in `ALTER TABLE` statements.
    fn column_type(&self, field: &Field) -> String {
        match field.field_type {
            FieldType::Integer => "INTEGER".to_string(),
            FieldType::Float => "FLOAT".to_string(),
            FieldType::Double => "DOUBLE".to_string(),
            FieldType::Boolean => "BOOLEAN".to_string(),
            FieldType::String => format!("VARCHAR({})", varchar_length(field)),
            FieldType::Text => "TEXT".to_string(),
            FieldType::DateTime => "DATETIME".to_string(),
            FieldType::Blob => "BLOB".to_string(),
        }
    }

    /// Generates the column definition used by `ADD COLUMN` and
    /// `MODIFY COLUMN`.
    fn column_definition(&self, field: &Field) -> String {
        let opts = &field.options;
        let mut parts = vec![field.name.clone(), self.column_type(field)];

        if opts.primary_key {
            parts.push("PRIMARY KEY".to_string());
            if opts.auto_increment {
                parts.push(self.auto_increment_keyword().to_string());
            }
        }

        if !opts.nullable {
            parts.push("NOT NULL".to_string());
        }

        if opts.unique {
            parts.push("UNIQUE".to_string());
        }

        if let Some(default) = opts.default_literal() {
            parts.push(format!("DEFAULT {}", quote_literal(default)));
        }

        parts.join(" ")
    }

    /// Generates SQL for dropping a table.
    fn drop_table_sql(&self, table: &str) -> String {
        format!("DROP TABLE {table}")
    }

    /// Generates SQL for adding a column.
    fn add_column_sql(&self, table: &str, field: &Field) -> String {
        format!(
            "ALTER TABLE {table} ADD COLUMN {}",
            self.column_definition(field)
        )
    }

    /// Generates SQL for dropping a column.
    fn drop_column_sql(&self, table: &str, column: &str) -> String {
        format!("ALTER TABLE {table} DROP COLUMN {column}")
    }

    /// Generates SQL for changing a column to a new definition.
    fn modify_column_sql(&self, table: &str, field: &Field) -> String {
        format!(
            "ALTER TABLE {table} MODIFY COLUMN {}",
            self.column_definition(field)
        )
    }
}

/// Wraps a value in single quotes, doubling embedded quotes.
#[must_use]
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Returns true for statements that only carry a `--` comment.
#[must_use]
pub fn is_comment(statement: &str) -> bool {
    statement.trim_start().starts_with("--")
}

fn varchar_length(field: &Field) -> u32 {
    if field.options.max_length > 0 {
        field.options.max_length
    } else {
        255
    }
}

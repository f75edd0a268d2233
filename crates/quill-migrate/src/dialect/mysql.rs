//! MySQL dialect.

use quill_core::{Field, FieldType};

use super::{quote_literal, Dialect, MIGRATIONS_TABLE};

/// MySQL migration dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDialect;

impl MySqlDialect {
    /// Creates a new MySQL dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Column type inside `CREATE TABLE`; auto-increment is part of the type
    /// and a string without length becomes `TEXT`.
    fn create_type(field: &Field) -> String {
        let opts = &field.options;
        match field.field_type {
            FieldType::Integer if opts.auto_increment => "INT AUTO_INCREMENT".to_string(),
            FieldType::Integer => "INT".to_string(),
            FieldType::String if opts.max_length > 0 => format!("VARCHAR({})", opts.max_length),
            FieldType::String | FieldType::Text => "TEXT".to_string(),
            FieldType::Float => "FLOAT".to_string(),
            FieldType::Double => "DOUBLE".to_string(),
            FieldType::Boolean => "BOOLEAN".to_string(),
            FieldType::DateTime => "DATETIME".to_string(),
            FieldType::Blob => "BLOB".to_string(),
        }
    }

    fn create_column(field: &Field) -> String {
        let opts = &field.options;
        let mut sql = format!("{} {}", field.name, Self::create_type(field));

        if opts.primary_key {
            sql.push_str(" PRIMARY KEY");
        }
        if opts.unique {
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

impl Dialect for MySqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn auto_increment_keyword(&self) -> &'static str {
        "AUTO_INCREMENT"
    }

    fn create_table_sql(&self, table: &str, fields: &[Field], if_not_exists: bool) -> String {
        let mut sql = String::from("CREATE TABLE ");
        if if_not_exists {
            sql.push_str("IF NOT EXISTS ");
        }
        sql.push_str(table);
        sql.push_str(" (");

        let columns: Vec<String> = fields.iter().map(Self::create_column).collect();
        sql.push_str(&columns.join(", "));

        sql.push(')');
        sql
    }

    fn migrations_table_sql(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {MIGRATIONS_TABLE} (\
             id INT PRIMARY KEY AUTO_INCREMENT, \
             model_name TEXT NOT NULL, \
             version TEXT NOT NULL, \
             schema_hash TEXT NOT NULL, \
             schema_json TEXT NOT NULL, \
             is_applied BOOLEAN NOT NULL DEFAULT 1, \
             applied_at DATETIME DEFAULT CURRENT_TIMESTAMP)"
        )
    }
}

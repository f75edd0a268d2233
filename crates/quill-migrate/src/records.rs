//! Row-level helpers over the [`Model`] interface.
//!
//! These work for any model and any [`Database`]: values are passed as bound
//! string parameters and read back as strings.

use std::fmt::Write as _;

use quill_core::value::{Map, Value};
use quill_core::Model;
use tracing::debug;

use crate::database::{Database, Row};
use crate::error::{MigrateError, Result};

/// Inserts the current values of a model as a new row.
///
/// Auto-increment fields are left to the database. An empty value is stored
/// as `NULL` for nullable fields and replaced by the field default
/// otherwise.
///
/// # Errors
///
/// Returns [`MigrateError::MissingValue`] for an empty NOT NULL field without
/// default, or the database error.
pub async fn insert<D: Database>(db: &D, model: &dyn Model) -> Result<u64> {
    let mut columns = Vec::new();
    let mut placeholders = Vec::new();
    let mut params = Vec::new();

    for field in model.fields() {
        if field.name.is_empty() || field.options.auto_increment {
            continue;
        }

        let value = model.field_value(&field.name);
        columns.push(field.name.as_str());

        if !value.is_empty() {
            placeholders.push("?");
            params.push(value);
        } else if field.options.nullable {
            placeholders.push("NULL");
        } else if let Some(default) = field.options.default_literal() {
            placeholders.push("?");
            params.push(default);
        } else {
            return Err(MigrateError::MissingValue {
                model: model.table_name().to_string(),
                field: field.name.clone(),
            });
        }
    }

    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        model.table_name(),
        columns.join(", "),
        placeholders.join(", ")
    );
    debug!(table = model.table_name(), "Inserting record");
    db.execute_raw(&sql, &params).await
}

/// Loads the row whose primary key equals `key` into `model`.
///
/// Returns false if no row matched; the model is left untouched then.
///
/// # Errors
///
/// Returns [`MigrateError::Model`] if the model has no primary key, or the
/// database error.
pub async fn find_by_pk<D: Database>(db: &D, model: &mut dyn Model, key: &str) -> Result<bool> {
    let pk = model.primary_key()?.name.clone();
    let sql = format!("SELECT * FROM {} WHERE {pk} = ?", model.table_name());
    let rows = db.execute_query(&sql, &[key]).await?;

    let Some(row) = rows.into_iter().next() else {
        return Ok(false);
    };

    for (column, value) in &row {
        if model.field(column).is_some() {
            model.set_field_value(column, value)?;
        }
    }
    Ok(true)
}

/// Deletes the row matching the primary key value of `model`.
///
/// # Errors
///
/// Returns [`MigrateError::Model`] if the model has no primary key, or the
/// database error.
pub async fn delete<D: Database>(db: &D, model: &dyn Model) -> Result<u64> {
    let pk = model.primary_key()?;
    let sql = format!("DELETE FROM {} WHERE {} = ?", model.table_name(), pk.name);
    db.execute_raw(&sql, &[model.field_value(&pk.name)]).await
}

/// Returns every row of a table.
///
/// # Errors
///
/// Returns the database error.
pub async fn fetch_all<D: Database>(db: &D, table: &str) -> Result<Vec<Row>> {
    db.execute_query(&format!("SELECT * FROM {table}"), &[])
        .await
}

/// Converts rows to an array of objects with string values.
#[must_use]
pub fn rows_to_value(rows: &[Row]) -> Value {
    Value::Array(
        rows.iter()
            .map(|row| {
                Value::Object(
                    row.iter()
                        .map(|(k, v)| (k.as_str(), v.as_str()))
                        .collect::<Map>(),
                )
            })
            .collect(),
    )
}

/// Renders the set values of a model as an object.
#[must_use]
pub fn model_to_value(model: &dyn Model) -> Value {
    Value::Object(
        model
            .fields()
            .iter()
            .filter(|f| !f.name.is_empty())
            .map(|f| (f.name.as_str(), model.field_value(&f.name)))
            .collect(),
    )
}

/// Renders rows as a fixed-width text table, columns taken from the first
/// row.
#[must_use]
pub fn format_rows(rows: &[Row]) -> String {
    const WIDTH: usize = 15;

    let Some(first) = rows.first() else {
        return "No rows found.\n".to_string();
    };
    let headers: Vec<&str> = first.keys().map(String::as_str).collect();

    let mut out = String::new();
    for header in &headers {
        let _ = write!(out, "{header:<WIDTH$}");
    }
    out.push('\n');
    out.push_str(&"-".repeat(WIDTH * headers.len()));
    out.push('\n');

    for row in rows {
        for header in &headers {
            let value = row.get(*header).map_or("", String::as_str);
            let _ = write!(out, "{value:<WIDTH$}");
        }
        out.push('\n');
    }
    out
}

//! Schema snapshots.
//!
//! A snapshot is the ordered field list of a model at one point in time. It
//! is stored in the history table as value tree text and compared through
//! its SHA-1 hash.

use quill_core::value::{self, Map, Value};
use quill_core::{Field, FieldOptions, FieldType, Model, Record};
use sha1::{Digest, Sha1};
use tracing::warn;

use crate::error::{MigrateError, Result};

/// The ordered field descriptors of a model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaSnapshot {
    fields: Vec<Field>,
}

impl SchemaSnapshot {
    /// Creates a snapshot from descriptors.
    #[must_use]
    pub const fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// Captures the fields of a model.
    ///
    /// Fields without a name are skipped.
    #[must_use]
    pub fn from_model(model: &dyn Model) -> Self {
        let fields = model
            .fields()
            .iter()
            .filter(|field| {
                if field.name.is_empty() {
                    warn!(model = model.table_name(), "Skipping field without a name");
                    false
                } else {
                    true
                }
            })
            .cloned()
            .collect();
        Self { fields }
    }

    /// Returns the fields in declaration order.
    #[must_use]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Consumes the snapshot, returning its fields.
    #[must_use]
    pub fn into_fields(self) -> Vec<Field> {
        self.fields
    }

    /// Renders the snapshot as an array of field objects.
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Array(self.fields.iter().map(field_to_value).collect())
    }

    /// Rebuilds a snapshot from [`to_value`](Self::to_value) output.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::SchemaParse`] if the value is not an array of
    /// complete field objects.
    pub fn from_value(value: &Value) -> Result<Self> {
        let items = value
            .as_array()
            .ok_or_else(|| MigrateError::SchemaParse("expected an array of fields".into()))?;

        let fields = items
            .iter()
            .enumerate()
            .map(|(i, item)| field_from_value(i, item))
            .collect::<Result<_>>()?;

        Ok(Self { fields })
    }

    /// Parses snapshot text.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::MalformedInput`] for invalid text and
    /// [`MigrateError::SchemaParse`] for a valid tree of the wrong shape.
    pub fn from_json(text: &str) -> Result<Self> {
        Self::from_value(&value::parse(text)?)
    }

    /// Renders the snapshot as compact text.
    #[must_use]
    pub fn to_json(&self) -> String {
        value::stringify(&self.to_value())
    }

    /// SHA-1 of [`to_json`](Self::to_json), as 40 lowercase hex characters.
    ///
    /// Field order is part of the hash.
    #[must_use]
    pub fn hash(&self) -> String {
        hex::encode(Sha1::digest(self.to_json().as_bytes()))
    }
}

/// Parses a model definitions document: an object mapping each table name
/// to its snapshot array. Models come back in document order.
///
/// # Errors
///
/// Returns [`MigrateError::MalformedInput`] for invalid text and
/// [`MigrateError::SchemaParse`] if the document is not an object of
/// snapshots.
pub fn parse_models(text: &str) -> Result<Vec<Record>> {
    let tree = value::parse(text)?;
    let entries = tree.as_object().ok_or_else(|| {
        MigrateError::SchemaParse("expected an object of table definitions".into())
    })?;

    entries
        .iter()
        .map(|(table, fields)| {
            let snapshot = SchemaSnapshot::from_value(fields).map_err(|e| match e {
                MigrateError::SchemaParse(msg) => {
                    MigrateError::SchemaParse(format!("table '{table}': {msg}"))
                }
                other => other,
            })?;
            Ok(Record::new(table, snapshot.into_fields()))
        })
        .collect()
}

fn field_to_value(field: &Field) -> Value {
    let opts = &field.options;
    let mut map = Map::new();
    map.insert("name", field.name.as_str());
    map.insert("type", u32::from(field.field_type.ordinal()));
    map.insert("primary_key", opts.primary_key);
    map.insert("auto_increment", opts.auto_increment);
    map.insert("default_value", opts.default_value.as_str());
    map.insert("max_length", opts.max_length);
    map.insert("nullable", opts.nullable);
    map.insert("unique", opts.unique);
    Value::Object(map)
}

fn field_from_value(index: usize, item: &Value) -> Result<Field> {
    let err = |msg: &str| MigrateError::SchemaParse(format!("field #{index}: {msg}"));

    if !item.is_object() {
        return Err(err("expected an object"));
    }

    let name = item
        .get("name")
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| err("missing name"))?;

    let bool_attr = |key: &str| {
        item.get(key)
            .and_then(Value::as_bool)
            .ok_or_else(|| err(&format!("'{key}' must be a boolean")))
    };

    let field_type = item
        .get("type")
        .and_then(Value::as_i64)
        .and_then(FieldType::from_ordinal)
        .ok_or_else(|| err("'type' must be a field type ordinal"))?;

    let max_length = item
        .get("max_length")
        .and_then(Value::as_i64)
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| err("'max_length' must be a non-negative integer"))?;

    // Hand-written snapshots may carry an unquoted numeric default.
    let default_value = match item.get("default_value") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => return Err(err("'default_value' must be a string")),
    };

    let options = FieldOptions {
        primary_key: bool_attr("primary_key")?,
        auto_increment: bool_attr("auto_increment")?,
        nullable: bool_attr("nullable")?,
        unique: bool_attr("unique")?,
        max_length,
        default_value,
    };

    Ok(Field::with_options(name, field_type, options))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> Record {
        Record::new(
            "users",
            vec![
                Field::new("id", FieldType::Integer)
                    .primary_key()
                    .auto_increment(),
                Field::new("name", FieldType::String).max_length(50),
                Field::new("bio", FieldType::Text)
                    .nullable()
                    .default_value("n/a"),
            ],
        )
    }

    #[test]
    fn test_field_object_layout() {
        let snapshot = SchemaSnapshot::from_model(&users());
        let first = snapshot.to_value().get_index(0).cloned().unwrap();
        let keys: Vec<_> = first.as_object().unwrap().keys().collect();
        assert_eq!(
            keys,
            [
                "name",
                "type",
                "primary_key",
                "auto_increment",
                "default_value",
                "max_length",
                "nullable",
                "unique"
            ]
        );
        assert_eq!(
            snapshot.to_json().split("},{").next().unwrap(),
            r#"[{"name":"id","type":0,"primary_key":true,"auto_increment":true,"default_value":"","max_length":0,"nullable":false,"unique":false"#
        );
    }

    #[test]
    fn test_round_trip() {
        let snapshot = SchemaSnapshot::from_model(&users());
        let back = SchemaSnapshot::from_json(&snapshot.to_json()).unwrap();
        assert_eq!(back, snapshot);
        assert_eq!(back.hash(), snapshot.hash());
    }

    #[test]
    fn test_numeric_default_survives_round_trip() {
        let snapshot = SchemaSnapshot::new(vec![
            Field::new("score", FieldType::Integer).default_value("10")
        ]);
        let back = SchemaSnapshot::from_json(&snapshot.to_json()).unwrap();
        assert_eq!(back.fields()[0].options.default_value, "10");
    }

    #[test]
    fn test_hash_is_hex_sha1() {
        let hash = SchemaSnapshot::from_model(&users()).hash();
        assert_eq!(hash.len(), 40);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        // SHA-1 of "[]"
        assert_eq!(
            SchemaSnapshot::default().hash(),
            "97d170e1550eee4afc0af065b78cda302a97674c"
        );
    }

    #[test]
    fn test_hash_depends_on_order() {
        let mut fields = users().fields().to_vec();
        let a = SchemaSnapshot::new(fields.clone());
        fields.swap(0, 1);
        let b = SchemaSnapshot::new(fields);
        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn test_unnamed_fields_are_skipped() {
        let mut model = users();
        model.add_field(Field::new("", FieldType::Blob));
        let snapshot = SchemaSnapshot::from_model(&model);
        assert_eq!(snapshot.fields().len(), 3);
    }

    #[test]
    fn test_from_value_rejects_bad_shapes() {
        let bad = [
            r#"{"name":"id"}"#,
            r"[1]",
            r#"[{"type":0,"primary_key":false,"auto_increment":false,"default_value":"","max_length":0,"nullable":false,"unique":false}]"#,
            r#"[{"name":"","type":0,"primary_key":false,"auto_increment":false,"default_value":"","max_length":0,"nullable":false,"unique":false}]"#,
            r#"[{"name":"id","type":9,"primary_key":false,"auto_increment":false,"default_value":"","max_length":0,"nullable":false,"unique":false}]"#,
            r#"[{"name":"id","type":0,"primary_key":"yes","auto_increment":false,"default_value":"","max_length":0,"nullable":false,"unique":false}]"#,
            r#"[{"name":"id","type":0,"primary_key":false,"auto_increment":false,"default_value":"","max_length":0,"nullable":false}]"#,
        ];
        for text in bad {
            let result = SchemaSnapshot::from_json(text);
            assert!(
                matches!(result, Err(MigrateError::SchemaParse(_))),
                "{text} -> {result:?}"
            );
        }
    }

    #[test]
    fn test_from_value_rejects_null_element() {
        let value = Value::Array(vec![Value::Null]);
        assert!(matches!(
            SchemaSnapshot::from_value(&value),
            Err(MigrateError::SchemaParse(_))
        ));
    }

    #[test]
    fn test_from_json_reports_malformed_text() {
        assert!(matches!(
            SchemaSnapshot::from_json("[{\"name\":\"id\""),
            Err(MigrateError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_parse_models() {
        let users_json = SchemaSnapshot::from_model(&users()).to_json();
        let text = format!(r#"{{"users":{users_json},"tags":[]}}"#);

        let models = parse_models(&text).unwrap();
        assert_eq!(models.len(), 2);
        assert_eq!(models[0].table_name(), "users");
        assert_eq!(models[0].fields(), users().fields());
        assert_eq!(models[1].table_name(), "tags");
        assert!(models[1].fields().is_empty());

        let err = parse_models(r#"{"users":{}}"#).unwrap_err();
        assert!(err.to_string().contains("table 'users'"));
        assert!(matches!(
            parse_models("[]"),
            Err(MigrateError::SchemaParse(_))
        ));
    }
}

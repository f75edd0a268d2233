//! Model descriptors.
//!
//! A model is a table name plus an ordered list of [`Field`] descriptors, and
//! the string values of one row keyed by field name. [`Model`] is the
//! capability the migration layer consumes; [`Record`] is the stock
//! implementation and [`model!`](crate::model!) declares typed wrappers
//! around it.

use core::fmt;
use std::collections::BTreeMap;

use thiserror::Error;

/// Errors raised by model accessors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// The model declares no field with this name.
    #[error("model '{model}' has no field '{field}'")]
    FieldNotFound {
        /// Table name of the model.
        model: String,
        /// The requested field.
        field: String,
    },

    /// The model has no field flagged as primary key.
    #[error("model '{model}' has no primary key")]
    NoPrimaryKey {
        /// Table name of the model.
        model: String,
    },
}

/// Result type alias for model operations.
pub type Result<T> = std::result::Result<T, ModelError>;

/// Column type of a field.
///
/// The ordinal of each variant is persisted in schema snapshots and must not
/// change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Integer,
    Float,
    Double,
    String,
    Boolean,
    Text,
    DateTime,
    Blob,
}

impl FieldType {
    /// All variants in ordinal order.
    pub const ALL: [Self; 8] = [
        Self::Integer,
        Self::Float,
        Self::Double,
        Self::String,
        Self::Boolean,
        Self::Text,
        Self::DateTime,
        Self::Blob,
    ];

    /// Returns the persisted ordinal.
    #[must_use]
    pub const fn ordinal(self) -> u8 {
        match self {
            Self::Integer => 0,
            Self::Float => 1,
            Self::Double => 2,
            Self::String => 3,
            Self::Boolean => 4,
            Self::Text => 5,
            Self::DateTime => 6,
            Self::Blob => 7,
        }
    }

    /// Maps a persisted ordinal back to a type.
    #[must_use]
    pub fn from_ordinal(ordinal: i64) -> Option<Self> {
        usize::try_from(ordinal)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
    }

    /// Returns the variant name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Integer => "Integer",
            Self::Float => "Float",
            Self::Double => "Double",
            Self::String => "String",
            Self::Boolean => "Boolean",
            Self::Text => "Text",
            Self::DateTime => "DateTime",
            Self::Blob => "Blob",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Column constraints and metadata.
///
/// Everything defaults to off: not a key, not auto-increment, NOT NULL, not
/// unique, no length limit (`0`), no default (empty string).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct FieldOptions {
    pub primary_key: bool,
    pub auto_increment: bool,
    pub nullable: bool,
    pub unique: bool,
    /// Maximum length for string columns, `0` for unspecified.
    pub max_length: u32,
    /// Literal default value, empty for none.
    pub default_value: String,
}

impl FieldOptions {
    /// Creates the default option set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the field as primary key.
    #[must_use]
    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Marks the field as auto-increment.
    #[must_use]
    pub const fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    /// Allows NULL values.
    #[must_use]
    pub const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Adds a UNIQUE constraint.
    #[must_use]
    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Sets the maximum length.
    #[must_use]
    pub const fn max_length(mut self, max_length: u32) -> Self {
        self.max_length = max_length;
        self
    }

    /// Sets the default value.
    #[must_use]
    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default_value = value.into();
        self
    }

    /// Returns the default value, if one is set.
    #[must_use]
    pub fn default_literal(&self) -> Option<&str> {
        (!self.default_value.is_empty()).then_some(self.default_value.as_str())
    }
}

/// A field descriptor: name, type and options.
///
/// ```
/// use quill_core::{Field, FieldType};
///
/// let id = Field::new("id", FieldType::Integer).primary_key().auto_increment();
/// assert!(id.options.primary_key);
/// assert!(!id.options.nullable);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub field_type: FieldType,
    pub options: FieldOptions,
}

impl Field {
    /// Creates a field with default options.
    #[must_use]
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self::with_options(name, field_type, FieldOptions::default())
    }

    /// Creates a field with explicit options.
    #[must_use]
    pub fn with_options(
        name: impl Into<String>,
        field_type: FieldType,
        options: FieldOptions,
    ) -> Self {
        Self {
            name: name.into(),
            field_type,
            options,
        }
    }

    /// Marks the field as primary key.
    #[must_use]
    pub fn primary_key(mut self) -> Self {
        self.options = self.options.primary_key();
        self
    }

    /// Marks the field as auto-increment.
    #[must_use]
    pub fn auto_increment(mut self) -> Self {
        self.options = self.options.auto_increment();
        self
    }

    /// Allows NULL values.
    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.options = self.options.nullable();
        self
    }

    /// Adds a UNIQUE constraint.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.options = self.options.unique();
        self
    }

    /// Sets the maximum length.
    #[must_use]
    pub fn max_length(mut self, max_length: u32) -> Self {
        self.options = self.options.max_length(max_length);
        self
    }

    /// Sets the default value.
    #[must_use]
    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.options = self.options.default_value(value);
        self
    }
}

/// A data model: table name, field descriptors and the values of one row.
///
/// Values are strings regardless of the field type; conversion is left to
/// the database.
pub trait Model {
    /// Returns the table name.
    fn table_name(&self) -> &str;

    /// Returns the field descriptors in declaration order.
    fn fields(&self) -> &[Field];

    /// Returns the value of a field, or an empty string when the field is
    /// unset or unknown.
    fn field_value(&self, name: &str) -> &str;

    /// Sets the value of a field.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::FieldNotFound`] if the model has no such field.
    fn set_field_value(&mut self, name: &str, value: &str) -> Result<()>;

    /// Looks up a field descriptor by name.
    fn field(&self, name: &str) -> Option<&Field> {
        self.fields().iter().find(|f| f.name == name)
    }

    /// Returns the first field flagged as primary key.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::NoPrimaryKey`] if no field is flagged.
    fn primary_key(&self) -> Result<&Field> {
        self.fields()
            .iter()
            .find(|f| f.options.primary_key)
            .ok_or_else(|| ModelError::NoPrimaryKey {
                model: self.table_name().to_string(),
            })
    }
}

/// A dynamically described model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    table: String,
    fields: Vec<Field>,
    values: BTreeMap<String, String>,
}

impl Record {
    /// Creates a record with no values set.
    #[must_use]
    pub fn new(table: impl Into<String>, fields: Vec<Field>) -> Self {
        Self {
            table: table.into(),
            fields,
            values: BTreeMap::new(),
        }
    }

    /// Sets a value, consuming and returning the record.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::FieldNotFound`] if the model has no such field.
    pub fn with_value(mut self, name: &str, value: impl Into<String>) -> Result<Self> {
        self.set_field_value(name, &value.into())?;
        Ok(self)
    }

    /// Iterates over the values that have been set.
    pub fn values(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Unsets every value.
    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Appends a field descriptor.
    pub fn add_field(&mut self, field: Field) {
        self.fields.push(field);
    }

    /// Removes a field descriptor and its value. Returns the descriptor.
    pub fn remove_field(&mut self, name: &str) -> Option<Field> {
        let idx = self.fields.iter().position(|f| f.name == name)?;
        self.values.remove(name);
        Some(self.fields.remove(idx))
    }
}

impl Model for Record {
    fn table_name(&self) -> &str {
        &self.table
    }

    fn fields(&self) -> &[Field] {
        &self.fields
    }

    fn field_value(&self, name: &str) -> &str {
        self.values.get(name).map_or("", String::as_str)
    }

    fn set_field_value(&mut self, name: &str, value: &str) -> Result<()> {
        if name.is_empty() || self.field(name).is_none() {
            return Err(ModelError::FieldNotFound {
                model: self.table.clone(),
                field: name.to_string(),
            });
        }
        self.values.insert(name.to_string(), value.to_string());
        Ok(())
    }
}

/// Declares a model type backed by a [`Record`].
///
/// ```
/// use quill_core::{model, Model};
///
/// model! {
///     /// A registered account.
///     pub struct User("users") {
///         id: Integer => primary_key, auto_increment;
///         name: String => max_length(50);
///         bio: Text => nullable;
///     }
/// }
///
/// let mut user = User::new();
/// user.set_field_value("name", "ada").unwrap();
/// assert_eq!(user.table_name(), "users");
/// assert_eq!(user.fields().len(), 3);
/// assert_eq!(user.field_value("name"), "ada");
/// assert_eq!(user.primary_key().unwrap().name, "id");
/// ```
#[macro_export]
macro_rules! model {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident ($table:literal) {
            $(
                $field:ident : $ty:ident $( => $( $opt:ident $( ( $arg:expr ) )? ),+ )? ;
            )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        $vis struct $name($crate::model::Record);

        impl $name {
            /// The table this model maps to.
            pub const TABLE: &'static str = $table;

            /// Creates an instance with no values set.
            #[must_use]
            pub fn new() -> Self {
                Self($crate::model::Record::new(
                    $table,
                    ::std::vec![
                        $(
                            $crate::model::Field::new(
                                ::core::stringify!($field),
                                $crate::model::FieldType::$ty,
                            ) $( $( .$opt( $( $arg )? ) )+ )?
                        ),*
                    ],
                ))
            }

            /// Unwraps the underlying record.
            #[must_use]
            pub fn into_record(self) -> $crate::model::Record {
                self.0
            }
        }

        impl ::core::default::Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl $crate::model::Model for $name {
            fn table_name(&self) -> &str {
                $crate::model::Model::table_name(&self.0)
            }

            fn fields(&self) -> &[$crate::model::Field] {
                $crate::model::Model::fields(&self.0)
            }

            fn field_value(&self, name: &str) -> &str {
                $crate::model::Model::field_value(&self.0, name)
            }

            fn set_field_value(
                &mut self,
                name: &str,
                value: &str,
            ) -> $crate::model::Result<()> {
                $crate::model::Model::set_field_value(&mut self.0, name, value)
            }
        }
    };
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
            ],
        )
    }

    #[test]
    fn test_field_type_ordinals_are_stable() {
        for (i, ty) in FieldType::ALL.iter().enumerate() {
            assert_eq!(usize::from(ty.ordinal()), i);
            assert_eq!(FieldType::from_ordinal(i64::try_from(i).unwrap()), Some(*ty));
        }
        assert_eq!(FieldType::Blob.ordinal(), 7);
        assert_eq!(FieldType::from_ordinal(8), None);
        assert_eq!(FieldType::from_ordinal(-1), None);
    }

    #[test]
    fn test_options_default_off() {
        let opts = FieldOptions::new();
        assert!(!opts.primary_key);
        assert!(!opts.auto_increment);
        assert!(!opts.nullable);
        assert!(!opts.unique);
        assert_eq!(opts.max_length, 0);
        assert_eq!(opts.default_literal(), None);
        assert_eq!(opts.default_value("x").default_literal(), Some("x"));
    }

    #[test]
    fn test_field_value_unset_is_empty() {
        let user = users();
        assert_eq!(user.field_value("name"), "");
        assert_eq!(user.field_value("missing"), "");
    }

    #[test]
    fn test_set_unknown_field() {
        let mut user = users();
        let err = user.set_field_value("email", "a@b").unwrap_err();
        assert_eq!(
            err,
            ModelError::FieldNotFound {
                model: "users".into(),
                field: "email".into(),
            }
        );
        assert_eq!(user.values().count(), 0);
    }

    #[test]
    fn test_primary_key() {
        assert_eq!(users().primary_key().unwrap().name, "id");

        let plain = Record::new("logs", vec![Field::new("line", FieldType::Text)]);
        assert!(matches!(
            plain.primary_key(),
            Err(ModelError::NoPrimaryKey { .. })
        ));
    }

    #[test]
    fn test_remove_field_drops_value() {
        let mut user = users().with_value("name", "ada").unwrap();
        assert!(user.remove_field("name").is_some());
        assert_eq!(user.field_value("name"), "");
        assert!(user.field("name").is_none());
        assert!(user.remove_field("name").is_none());
    }

    crate::model! {
        struct Post("posts") {
            id: Integer => primary_key, auto_increment;
            title: String => max_length(120), unique;
            body: Text;
            score: Double => default_value("0");
        }
    }

    #[test]
    fn test_model_macro() {
        let post = Post::new();
        assert_eq!(Post::TABLE, "posts");
        let names: Vec<_> = post.fields().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["id", "title", "body", "score"]);

        let title = post.field("title").unwrap();
        assert_eq!(title.field_type, FieldType::String);
        assert_eq!(title.options.max_length, 120);
        assert!(title.options.unique);
        assert_eq!(post.field("score").unwrap().options.default_literal(), Some("0"));
        assert_eq!(post.field("body").unwrap().options, FieldOptions::default());
    }
}

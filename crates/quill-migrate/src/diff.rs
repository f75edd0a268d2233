//! Schema diffing.
//!
//! Compares the live field list of a model with the last recorded snapshot
//! and turns the delta into reversible DDL. Fields are matched by name, so a
//! rename shows up as a drop plus an add.

use std::collections::{HashMap, HashSet};

use quill_core::Field;
use tracing::warn;

use crate::dialect::Dialect;
use crate::snapshot::SchemaSnapshot;

/// A single structural change between two snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaChange {
    /// A field present now but not before.
    Added(Field),
    /// A field whose type, nullability or maximum length changed.
    Modified {
        /// The recorded definition.
        old: Field,
        /// The current definition.
        new: Field,
    },
    /// A field present before but not now.
    Dropped(Field),
}

impl SchemaChange {
    /// Returns the affected field name.
    #[must_use]
    pub fn field_name(&self) -> &str {
        match self {
            Self::Added(field) | Self::Dropped(field) => &field.name,
            Self::Modified { new, .. } => &new.name,
        }
    }
}

/// The ordered changes between a recorded snapshot and the current fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaDiff {
    changes: Vec<SchemaChange>,
}

impl SchemaDiff {
    /// Computes the changes from `old` to `current`.
    ///
    /// Additions and modifications come first, in current field order,
    /// followed by drops in recorded order. Changes to the default value,
    /// uniqueness or key flags alone are not reported.
    #[must_use]
    pub fn between(current: &[Field], old: &SchemaSnapshot) -> Self {
        let recorded: HashMap<&str, &Field> = old
            .fields()
            .iter()
            .map(|field| (field.name.as_str(), field))
            .collect();

        let mut changes = Vec::new();

        for field in current {
            match recorded.get(field.name.as_str()) {
                None => changes.push(SchemaChange::Added(field.clone())),
                Some(prev) if is_modified(prev, field) => changes.push(SchemaChange::Modified {
                    old: (*prev).clone(),
                    new: field.clone(),
                }),
                Some(_) => {}
            }
        }

        let live: HashSet<&str> = current.iter().map(|f| f.name.as_str()).collect();
        changes.extend(
            old.fields()
                .iter()
                .filter(|field| !live.contains(field.name.as_str()))
                .cloned()
                .map(SchemaChange::Dropped),
        );

        Self { changes }
    }

    /// Returns the changes in order.
    #[must_use]
    pub fn changes(&self) -> &[SchemaChange] {
        &self.changes
    }

    /// Returns true if nothing changed at the statement level.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Renders `(up, down)` statement lists.
    ///
    /// Both lists follow the order of [`changes`](Self::changes); the i-th
    /// down statement undoes the i-th up statement.
    #[must_use]
    pub fn statements(&self, table: &str, dialect: &dyn Dialect) -> (Vec<String>, Vec<String>) {
        let mut up = Vec::with_capacity(self.changes.len());
        let mut down = Vec::with_capacity(self.changes.len());

        for change in &self.changes {
            match change {
                SchemaChange::Added(field) => {
                    up.push(dialect.add_column_sql(table, field));
                    down.push(dialect.drop_column_sql(table, &field.name));
                }
                SchemaChange::Modified { old, new } => {
                    if !dialect.supports_modify_column() {
                        warn!(
                            table,
                            column = %new.name,
                            dialect = dialect.name(),
                            "Column modification is not supported, emitting a comment"
                        );
                    }
                    up.push(dialect.modify_column_sql(table, new));
                    down.push(dialect.modify_column_sql(table, old));
                }
                SchemaChange::Dropped(field) => {
                    up.push(dialect.drop_column_sql(table, &field.name));
                    down.push(dialect.add_column_sql(table, field));
                }
            }
        }

        (up, down)
    }
}

fn is_modified(old: &Field, new: &Field) -> bool {
    old.field_type != new.field_type
        || old.options.nullable != new.options.nullable
        || old.options.max_length != new.options.max_length
}

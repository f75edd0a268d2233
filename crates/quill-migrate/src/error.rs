//! Error types for the migration system.

use std::fmt;

use quill_core::{ModelError, ParseError};

/// Direction of a replayed migration step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Applying up statements.
    Up,
    /// Applying down statements.
    Down,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Up => "up",
            Self::Down => "down",
        })
    }
}

/// Errors that can occur during migration operations.
#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    /// Text that should hold a value tree could not be parsed.
    #[error(transparent)]
    MalformedInput(#[from] ParseError),

    /// A value tree does not describe a schema snapshot.
    #[error("Invalid schema snapshot: {0}")]
    SchemaParse(String),

    /// A model accessor failed (unknown field, missing primary key).
    #[error(transparent)]
    Model(#[from] ModelError),

    /// A record is missing a value for a NOT NULL field without default.
    #[error("Missing value for required field '{field}' of model '{model}'")]
    MissingValue {
        /// Table name of the model.
        model: String,
        /// The field without a value.
        field: String,
    },

    /// A version is not part of the model's history.
    #[error("Version '{version}' not found in history of model '{model}'")]
    UnknownVersion {
        /// Model (table) name.
        model: String,
        /// The requested or recorded version.
        version: String,
    },

    /// No artifact is registered for a version that has to be replayed.
    #[error("No migration artifact for version '{version}' (tried {})", .tried.join(", "))]
    MissingArtifact {
        /// The version being replayed.
        version: String,
        /// Artifact names that were looked up.
        tried: Vec<String>,
    },

    /// A statement failed while applying or replaying a migration.
    #[error(
        "Migration {model}/{version} failed ({direction}) on `{statement}`: {message}"
    )]
    MigrationFailed {
        /// Model (table) name.
        model: String,
        /// Version being applied.
        version: String,
        /// Whether up or down statements were running.
        direction: Direction,
        /// The statement that failed.
        statement: String,
        /// Database error message.
        message: String,
    },

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// IO error (reading/writing artifact files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;

//! Snapshot-diffing schema migrations for quill models.
//!
//! `quill-migrate` records the field list of every model as a schema
//! snapshot, detects drift by comparing snapshot hashes, and generates
//! reversible DDL from the difference:
//! - Every model version is a row in the `migrations` table
//! - Every version has an artifact holding its up and down statements
//! - Recorded versions can be replayed forward and backward
//!
//! # Architecture
//!
//! - **Snapshot** - Ordered field descriptors, stored as value tree text
//! - **Diff** - Added, modified and dropped fields between two snapshots
//! - **Dialect** - Database-specific DDL (SQLite, MySQL)
//! - **Database** - Raw SQL execution behind a trait, with a SQLite backend
//! - **History** - The `migrations` table
//! - **Artifact** - Up and down statements per version, as JSON files
//! - **Engine** - Ties the above together
//!
//! # Example
//!
//! ```rust,ignore
//! use quill_core::{Field, FieldType, Record};
//! use quill_migrate::prelude::*;
//!
//! let db = SqliteDatabase::connect("sqlite:app.db").await?;
//! let mut engine = MigrationEngine::with_options(
//!     db,
//!     EngineOptions::new().artifact_dir("migrations"),
//! );
//! engine.initialize().await?;
//!
//! let mut users = Record::new(
//!     "users",
//!     vec![
//!         Field::new("id", FieldType::Integer).primary_key().auto_increment(),
//!         Field::new("name", FieldType::String).max_length(50),
//!     ],
//! );
//! engine.migrate_model(&users).await?; // 001_initial
//!
//! users.add_field(Field::new("email", FieldType::String).nullable());
//! engine.migrate_model(&users).await?; // timestamped version
//!
//! engine.migrate_to_version("users", "001_initial").await?;
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! # Create the history table
//! quill-migrate init
//!
//! # Record new versions for changed models
//! quill-migrate make-migrations --models models.json
//!
//! # Show the history
//! quill-migrate show-migrations
//!
//! # Roll a model back
//! quill-migrate migrate-to users 001_initial
//! ```

pub mod artifact;
pub mod database;
pub mod dialect;
pub mod diff;
pub mod engine;
pub mod error;
pub mod history;
pub mod records;
pub mod snapshot;

pub use error::{Direction, MigrateError, Result};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::artifact::{MigrationArtifact, MigrationRegistry, INITIAL_VERSION};
    pub use crate::database::{Database, Row, SqliteDatabase};
    pub use crate::dialect::{Dialect, MySqlDialect, SqliteDialect};
    pub use crate::diff::{SchemaChange, SchemaDiff};
    pub use crate::engine::{EngineOptions, MigrationEngine, MigrationOutcome};
    pub use crate::error::{Direction, MigrateError, Result};
    pub use crate::history::{MigrationHistory, MigrationRecord};
    pub use crate::snapshot::{parse_models, SchemaSnapshot};
}

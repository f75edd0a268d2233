//! The migration engine.
//!
//! [`MigrationEngine`] compares the live definition of a model with the last
//! recorded snapshot, generates an artifact when they differ, and replays
//! recorded versions forward or backward.

use std::fs;
use std::path::{Path, PathBuf};

use quill_core::Model;
use tracing::{debug, info, warn};

use crate::artifact::{MigrationArtifact, MigrationRegistry, INITIAL_VERSION};
use crate::database::Database;
use crate::diff::SchemaDiff;
use crate::dialect::is_comment;
use crate::error::{Direction, MigrateError, Result};
use crate::history::{MigrationHistory, MigrationRecord};
use crate::snapshot::SchemaSnapshot;

/// Format of drift version tokens.
pub const VERSION_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Directory artifacts are written to and loaded from.
    pub artifact_dir: Option<PathBuf>,
    /// Whether drift statements run as soon as they are generated.
    pub apply_changes: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineOptions {
    /// Creates default options: in-memory artifacts, drift applied at once.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            artifact_dir: None,
            apply_changes: true,
        }
    }

    /// Persists artifacts in `dir`.
    #[must_use]
    pub fn artifact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifact_dir = Some(dir.into());
        self
    }

    /// Sets whether drift statements run when generated.
    #[must_use]
    pub const fn apply_changes(mut self, apply: bool) -> Self {
        self.apply_changes = apply;
        self
    }
}

/// What [`MigrationEngine::migrate_model`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// The model had no history; its table was created.
    Created(MigrationArtifact),
    /// The model drifted; a new version was generated.
    Migrated(MigrationArtifact),
    /// The recorded snapshot matches; carries the latest version.
    UpToDate(String),
}

impl MigrationOutcome {
    /// Returns the version the model is at afterwards.
    #[must_use]
    pub fn version(&self) -> &str {
        match self {
            Self::Created(artifact) | Self::Migrated(artifact) => &artifact.version,
            Self::UpToDate(version) => version,
        }
    }

    /// Returns the generated artifact, if any.
    #[must_use]
    pub const fn artifact(&self) -> Option<&MigrationArtifact> {
        match self {
            Self::Created(artifact) | Self::Migrated(artifact) => Some(artifact),
            Self::UpToDate(_) => None,
        }
    }
}

/// Tracks and replays schema versions of models.
pub struct MigrationEngine<D: Database> {
    db: D,
    registry: MigrationRegistry,
    options: EngineOptions,
}

impl<D: Database> MigrationEngine<D> {
    /// Creates an engine with default options and an empty registry.
    pub fn new(db: D) -> Self {
        Self::with_options(db, EngineOptions::default())
    }

    /// Creates an engine with custom options.
    pub fn with_options(db: D, options: EngineOptions) -> Self {
        Self {
            db,
            registry: MigrationRegistry::new(),
            options,
        }
    }

    /// Replaces the artifact registry.
    #[must_use]
    pub fn with_registry(mut self, registry: MigrationRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Returns the database.
    pub const fn database(&self) -> &D {
        &self.db
    }

    /// Returns the artifact registry.
    pub const fn registry(&self) -> &MigrationRegistry {
        &self.registry
    }

    /// Returns the artifact registry for explicit registration.
    pub fn registry_mut(&mut self) -> &mut MigrationRegistry {
        &mut self.registry
    }

    /// Returns the options.
    pub const fn options(&self) -> &EngineOptions {
        &self.options
    }

    const fn history_table(&self) -> MigrationHistory<'_, D> {
        MigrationHistory::new(&self.db)
    }

    /// Creates the history table and loads artifacts from the artifact
    /// directory, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the table cannot be created or the directory
    /// cannot be read.
    pub async fn initialize(&mut self) -> Result<()> {
        self.history_table().ensure_table().await?;

        if let Some(dir) = &self.options.artifact_dir {
            fs::create_dir_all(dir)?;
            let loaded = self.registry.load_dir(dir)?;
            info!(dir = %dir.display(), loaded, "Loaded migration artifacts");
        }
        Ok(())
    }

    /// Brings the recorded schema of a model in line with its definition.
    ///
    /// A model without history gets its table created and version
    /// [`INITIAL_VERSION`]. A model whose snapshot hash changed gets a
    /// timestamped version with the diff as up and down statements. Otherwise
    /// nothing happens.
    ///
    /// # Errors
    ///
    /// Fails if the stored snapshot cannot be read, a drift statement fails
    /// ([`MigrateError::MigrationFailed`], nothing is recorded then), or on
    /// database and file errors.
    pub async fn migrate_model(&mut self, model: &dyn Model) -> Result<MigrationOutcome> {
        let table = model.table_name().to_string();
        let snapshot = SchemaSnapshot::from_model(model);
        let hash = snapshot.hash();

        let latest = self.history_table().latest(&table).await?;
        let Some(latest) = latest else {
            let dialect = self.db.dialect();
            let up = vec![dialect.create_table_sql(&table, snapshot.fields(), false)];
            let down = vec![dialect.drop_table_sql(&table)];
            let artifact = MigrationArtifact::create(&table, INITIAL_VERSION, up, down);
            self.store(&artifact)?;

            let created = match self.db.create_table(model).await {
                Ok(()) => {
                    self.history_table()
                        .record(&table, INITIAL_VERSION, &hash, &snapshot.to_json())
                        .await
                }
                Err(e) => Err(e),
            };
            if let Err(e) = created {
                self.discard(&artifact);
                return Err(e);
            }

            info!(model = %table, version = INITIAL_VERSION, "Created table");
            return Ok(MigrationOutcome::Created(artifact));
        };

        if latest.schema_hash == hash {
            debug!(model = %table, version = %latest.version, "Schema up to date");
            return Ok(MigrationOutcome::UpToDate(latest.version));
        }

        let recorded = SchemaSnapshot::from_json(&latest.schema_json)?;
        let diff = SchemaDiff::between(snapshot.fields(), &recorded);
        let (up, down) = diff.statements(&table, self.db.dialect());

        let version = self.next_version(&table).await?;
        let artifact = MigrationArtifact::after(&table, &version, up, down);
        self.store(&artifact)?;

        let applied = if self.options.apply_changes {
            self.run_statements(&table, &version, Direction::Up, &artifact.up)
                .await
                .map(|_| ())
        } else {
            Ok(())
        };
        let finished = match applied {
            Ok(()) => {
                self.history_table()
                    .record(&table, &version, &hash, &snapshot.to_json())
                    .await
            }
            Err(e) => Err(e),
        };
        if let Err(e) = finished {
            self.discard(&artifact);
            return Err(e);
        }

        info!(
            model = %table,
            version = %version,
            changes = diff.changes().len(),
            "Migrated model"
        );
        Ok(MigrationOutcome::Migrated(artifact))
    }

    /// Returns the newest applied version of a model.
    ///
    /// # Errors
    ///
    /// Returns the database error.
    pub async fn current_version(&self, model_name: &str) -> Result<Option<String>> {
        Ok(self
            .history_table()
            .latest_applied(model_name)
            .await?
            .map(|record| record.version))
    }

    /// Returns every recorded version of a model, oldest first.
    ///
    /// # Errors
    ///
    /// Returns the database error.
    pub async fn history(&self, model_name: &str) -> Result<Vec<MigrationRecord>> {
        self.history_table().for_model(model_name).await
    }

    /// Returns every recorded version of every model, oldest first.
    pub async fn all_history(&self) -> Result<Vec<MigrationRecord>> {
        self.history_table().all().await
    }

    /// Returns the registered artifact of a model version.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::MissingArtifact`] if none is registered.
    pub fn artifact_for(&self, model_name: &str, version: &str) -> Result<&MigrationArtifact> {
        self.registry
            .find_for(model_name, version)
            .map_err(|tried| MigrateError::MissingArtifact {
                version: version.to_string(),
                tried,
            })
    }

    /// Moves a model to `target` by replaying recorded versions.
    ///
    /// Moving forward applies the up statements of every version after the
    /// current one, up to and including the target. Moving backward applies
    /// the down statements of the current version and every older version
    /// down to, but excluding, the target, newest first. Returns the number
    /// of statements executed.
    ///
    /// A failing step aborts the sequence and leaves that version marked as
    /// not applied; earlier steps are not undone.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::UnknownVersion`] if the target or the current
    /// version is not in the model's history,
    /// [`MigrateError::MissingArtifact`] for a step without artifact, and
    /// [`MigrateError::MigrationFailed`] for a failing statement.
    pub async fn migrate_to_version(&self, model_name: &str, target: &str) -> Result<usize> {
        let records = self.history(model_name).await?;
        let position = |version: &str| {
            records
                .iter()
                .position(|r| r.version == version)
                .ok_or_else(|| MigrateError::UnknownVersion {
                    model: model_name.to_string(),
                    version: version.to_string(),
                })
        };

        let target_idx = position(target)?;
        let current_idx = match self.current_version(model_name).await? {
            Some(current) => Some(position(&current)?),
            None => None,
        };

        let steps: Vec<(&MigrationRecord, Direction)> = match current_idx {
            Some(cur) if cur == target_idx => {
                debug!(model = model_name, version = target, "Already at target version");
                return Ok(0);
            }
            Some(cur) if cur > target_idx => (target_idx + 1..=cur)
                .rev()
                .map(|i| (&records[i], Direction::Down))
                .collect(),
            cur => {
                let start = cur.map_or(0, |c| c + 1);
                (start..=target_idx)
                    .map(|i| (&records[i], Direction::Up))
                    .collect()
            }
        };

        let history = self.history_table();
        let mut executed = 0;
        for (record, direction) in steps {
            let artifact = self.artifact_for(model_name, &record.version)?;
            info!(
                model = model_name,
                version = %record.version,
                direction = %direction,
                "Replaying migration"
            );

            history
                .mark_in_progress(model_name, &record.version)
                .await?;
            let statements = match direction {
                Direction::Up => &artifact.up,
                Direction::Down => &artifact.down,
            };
            executed += self
                .run_statements(model_name, &record.version, direction, statements)
                .await?;
            history
                .mark(model_name, &record.version, direction == Direction::Up)
                .await?;
        }

        info!(model = model_name, version = target, executed, "Migration complete");
        Ok(executed)
    }

    async fn run_statements(
        &self,
        model: &str,
        version: &str,
        direction: Direction,
        statements: &[String],
    ) -> Result<usize> {
        let mut executed = 0;
        for sql in statements {
            if is_comment(sql) {
                warn!(comment = %sql, "Skipping comment (unsupported operation)");
                continue;
            }
            if let Err(e) = self.db.execute_raw(sql, &[]).await {
                return Err(MigrateError::MigrationFailed {
                    model: model.to_string(),
                    version: version.to_string(),
                    direction,
                    statement: sql.clone(),
                    message: self.db.last_error().unwrap_or_else(|| e.to_string()),
                });
            }
            executed += 1;
        }
        Ok(executed)
    }

    /// Registers an artifact and writes it to the artifact directory.
    fn store(&mut self, artifact: &MigrationArtifact) -> Result<()> {
        if let Some(dir) = &self.options.artifact_dir {
            write_artifact(dir, artifact)?;
        }
        self.registry.register(artifact.clone());
        Ok(())
    }

    /// Forgets an artifact whose version was never recorded.
    fn discard(&mut self, artifact: &MigrationArtifact) {
        self.registry.remove(&artifact.name);
        if let Some(dir) = &self.options.artifact_dir {
            let path = artifact.path_in(dir);
            if let Err(e) = fs::remove_file(&path) {
                warn!(path = %path.display(), error = %e, "Failed to remove migration artifact");
            }
        }
    }

    /// Returns a fresh timestamp version, suffixed when the same second was
    /// already used for this model.
    async fn next_version(&self, model_name: &str) -> Result<String> {
        let base = chrono::Local::now().format(VERSION_FORMAT).to_string();
        let history = self.history_table();

        let mut version = base.clone();
        let mut n = 2;
        while history.has_version(model_name, &version).await? {
            version = format!("{base}_{n}");
            n += 1;
        }
        Ok(version)
    }
}

fn write_artifact(dir: &Path, artifact: &MigrationArtifact) -> Result<()> {
    fs::create_dir_all(dir)?;
    let path = artifact.write_to(dir)?;
    info!(path = %path.display(), "Wrote migration artifact");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::SqliteDatabase;
    use quill_core::{Field, FieldType, Record};
    use sqlx::sqlite::SqlitePoolOptions;

    async fn create_test_engine(options: EngineOptions) -> MigrationEngine<SqliteDatabase> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await
            .expect("Failed to create in-memory SQLite pool");
        let mut engine = MigrationEngine::with_options(SqliteDatabase::new(pool), options);
        engine.initialize().await.unwrap();
        engine
    }

    fn notes() -> Record {
        Record::new(
            "notes",
            vec![
                Field::new("id", FieldType::Integer)
                    .primary_key()
                    .auto_increment(),
                Field::new("body", FieldType::Text).nullable(),
            ],
        )
    }

    #[tokio::test]
    async fn test_initial_then_up_to_date() {
        let mut engine = create_test_engine(EngineOptions::new()).await;

        let outcome = engine.migrate_model(&notes()).await.unwrap();
        assert!(matches!(outcome, MigrationOutcome::Created(_)));
        assert_eq!(outcome.version(), INITIAL_VERSION);

        let outcome = engine.migrate_model(&notes()).await.unwrap();
        assert_eq!(outcome, MigrationOutcome::UpToDate(INITIAL_VERSION.into()));
        assert!(outcome.artifact().is_none());
        assert_eq!(engine.history("notes").await.unwrap().len(), 1);
        assert_eq!(engine.registry().len(), 1);
    }

    #[tokio::test]
    async fn test_same_second_versions_are_suffixed() {
        let mut engine = create_test_engine(EngineOptions::new()).await;
        let mut model = notes();
        engine.migrate_model(&model).await.unwrap();

        model.add_field(Field::new("a", FieldType::Integer).nullable());
        let first = engine.migrate_model(&model).await.unwrap();
        model.add_field(Field::new("b", FieldType::Integer).nullable());
        let second = engine.migrate_model(&model).await.unwrap();

        assert_ne!(first.version(), second.version());
        if second.version().starts_with(first.version()) {
            assert_eq!(second.version(), format!("{}_2", first.version()));
        }
    }

    #[tokio::test]
    async fn test_drift_without_applying() {
        let mut engine = create_test_engine(EngineOptions::new().apply_changes(false)).await;
        let mut model = notes();
        engine.migrate_model(&model).await.unwrap();

        model.add_field(Field::new("title", FieldType::String).nullable());
        let outcome = engine.migrate_model(&model).await.unwrap();
        assert!(matches!(outcome, MigrationOutcome::Migrated(_)));

        // Recorded but the column was never added.
        let err = engine
            .database()
            .execute_query("SELECT title FROM notes", &[])
            .await;
        assert!(err.is_err());
        assert_eq!(
            engine.current_version("notes").await.unwrap().as_deref(),
            Some(outcome.version())
        );
    }

    #[tokio::test]
    async fn test_failed_drift_is_not_recorded() {
        let mut engine = create_test_engine(EngineOptions::new()).await;
        let mut model = notes();
        engine.migrate_model(&model).await.unwrap();

        // SQLite cannot add a NOT NULL column without a default to a table
        // that already has rows.
        engine
            .database()
            .execute_raw("INSERT INTO notes (body) VALUES ('x')", &[])
            .await
            .unwrap();
        model.add_field(Field::new("title", FieldType::String));
        let err = engine.migrate_model(&model).await.unwrap_err();
        match err {
            MigrateError::MigrationFailed {
                model, direction, statement, ..
            } => {
                assert_eq!(model, "notes");
                assert_eq!(direction, Direction::Up);
                assert!(statement.contains("ADD COLUMN title"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(engine.history("notes").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_drift_leaves_no_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine =
            create_test_engine(EngineOptions::new().artifact_dir(dir.path())).await;
        let mut model = notes();
        engine.migrate_model(&model).await.unwrap();
        engine
            .database()
            .execute_raw("INSERT INTO notes (body) VALUES ('x')", &[])
            .await
            .unwrap();

        model.add_field(Field::new("title", FieldType::String));
        let err = engine.migrate_model(&model).await.unwrap_err();
        assert!(matches!(err, MigrateError::MigrationFailed { .. }));

        let mut files: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect();
        files.sort();
        assert_eq!(files, ["001_initial_create_notes.json"]);
        assert_eq!(engine.registry().len(), 1);

        // A restarted engine only sees the recorded version.
        let mut restarted = MigrationRegistry::new();
        assert_eq!(restarted.load_dir(dir.path()).unwrap(), 1);
        assert!(restarted.get("001_initial_create_notes").is_some());
    }

    #[tokio::test]
    async fn test_unknown_target_version() {
        let mut engine = create_test_engine(EngineOptions::new()).await;
        engine.migrate_model(&notes()).await.unwrap();

        let err = engine.migrate_to_version("notes", "nope").await.unwrap_err();
        assert!(matches!(
            err,
            MigrateError::UnknownVersion { ref version, .. } if version == "nope"
        ));
    }

    #[tokio::test]
    async fn test_missing_artifact() {
        let mut engine = create_test_engine(EngineOptions::new()).await;
        let mut model = notes();
        engine.migrate_model(&model).await.unwrap();
        model.add_field(Field::new("title", FieldType::String).nullable());
        engine.migrate_model(&model).await.unwrap();

        // A fresh registry knows nothing about the recorded versions.
        let engine = engine.with_registry(MigrationRegistry::new());
        let err = engine
            .migrate_to_version("notes", INITIAL_VERSION)
            .await
            .unwrap_err();
        assert!(matches!(err, MigrateError::MissingArtifact { .. }));
    }
}

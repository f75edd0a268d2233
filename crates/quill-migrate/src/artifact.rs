//! Migration artifacts.
//!
//! An artifact holds the up and down statements generated for one version of
//! one model. Artifacts live in a [`MigrationRegistry`] owned by the engine
//! and can be persisted as `<dir>/<name>.json` files so a later process can
//! replay them.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;

/// Version token of the first migration of every model.
pub const INITIAL_VERSION: &str = "001_initial";

/// Name of the artifact that creates a table.
#[must_use]
pub fn create_name(version: &str, table: &str) -> String {
    format!("{version}_create_{table}")
}

/// Name of the artifact that alters a table after drift.
#[must_use]
pub fn after_name(version: &str, table: &str) -> String {
    format!("{version}_after_{table}")
}

/// The statements of one migration step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationArtifact {
    /// Artifact name, see [`create_name`] and [`after_name`].
    pub name: String,
    /// Model (table) name.
    pub model: String,
    /// Version token.
    pub version: String,
    /// Statements that apply this version.
    pub up: Vec<String>,
    /// Statements that revert this version.
    pub down: Vec<String>,
}

impl MigrationArtifact {
    /// Builds the artifact of an initial version.
    #[must_use]
    pub fn create(table: &str, version: &str, up: Vec<String>, down: Vec<String>) -> Self {
        Self {
            name: create_name(version, table),
            model: table.to_string(),
            version: version.to_string(),
            up,
            down,
        }
    }

    /// Builds the artifact of a drift version.
    #[must_use]
    pub fn after(table: &str, version: &str, up: Vec<String>, down: Vec<String>) -> Self {
        Self {
            name: after_name(version, table),
            model: table.to_string(),
            version: version.to_string(),
            up,
            down,
        }
    }

    /// Returns `<dir>/<name>.json`.
    #[must_use]
    pub fn path_in(&self, dir: &Path) -> PathBuf {
        dir.join(format!("{}.json", self.name))
    }

    /// Writes the artifact to [`path_in`](Self::path_in), replacing any
    /// existing file. Returns the path written.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        let path = self.path_in(dir);
        fs::write(&path, serde_json::to_string_pretty(self)?)?;
        debug!(path = %path.display(), "Wrote migration artifact");
        Ok(path)
    }

    /// Reads an artifact file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not an artifact.
    pub fn read_from(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Artifacts by name.
///
/// Populated with explicit [`register`](Self::register) and
/// [`load_dir`](Self::load_dir) calls; there is no global state.
#[derive(Debug, Clone, Default)]
pub struct MigrationRegistry {
    artifacts: BTreeMap<String, MigrationArtifact>,
}

impl MigrationRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an artifact, replacing one with the same name.
    pub fn register(&mut self, artifact: MigrationArtifact) {
        self.artifacts.insert(artifact.name.clone(), artifact);
    }

    /// Removes an artifact by name, returning it.
    pub fn remove(&mut self, name: &str) -> Option<MigrationArtifact> {
        self.artifacts.remove(name)
    }

    /// Looks up an artifact by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&MigrationArtifact> {
        self.artifacts.get(name)
    }

    /// Finds the artifact of a model version. The drift name is tried before
    /// the create name.
    ///
    /// # Errors
    ///
    /// Returns the candidate names when neither is registered.
    pub fn find_for(
        &self,
        table: &str,
        version: &str,
    ) -> std::result::Result<&MigrationArtifact, Vec<String>> {
        let candidates = [after_name(version, table), create_name(version, table)];
        candidates
            .iter()
            .find_map(|name| self.get(name))
            .ok_or_else(|| candidates.to_vec())
    }

    /// Returns the number of registered artifacts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    /// Iterates artifacts in name order.
    pub fn iter(&self) -> impl Iterator<Item = &MigrationArtifact> {
        self.artifacts.values()
    }

    /// Registers every `*.json` artifact found in `dir`. Files that fail to
    /// parse are skipped with a warning. Returns the number loaded.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read.
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize> {
        let mut loaded = 0;
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match MigrationArtifact::read_from(&path) {
                Ok(artifact) => {
                    debug!(name = %artifact.name, "Loaded migration artifact");
                    self.register(artifact);
                    loaded += 1;
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable artifact");
                }
            }
        }
        Ok(loaded)
    }
}

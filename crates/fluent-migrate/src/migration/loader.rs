//! Discovery and ordering of the migrations a runner works on.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::error::{MigrateError, Result};

use super::{matches_tags, Migration, SqlFileMigration};

/// Collects migrations from code and SQL directories.
#[derive(Default)]
pub struct MigrationLoader {
    migrations: Vec<Arc<dyn Migration>>,
}

impl MigrationLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, migration: impl Migration + 'static) -> &mut Self {
        self.migrations.push(Arc::new(migration));
        self
    }

    pub fn add_arc(&mut self, migration: Arc<dyn Migration>) -> &mut Self {
        self.migrations.push(migration);
        self
    }

    /// Add every SQL-file migration found in `dir`.
    pub fn add_sql_dir(&mut self, dir: &Path) -> Result<&mut Self> {
        for migration in SqlFileMigration::load_dir(dir)? {
            self.migrations.push(Arc::new(migration));
        }
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }

    /// Migrations selected by `tags`, ordered by ascending version.
    ///
    /// # Errors
    ///
    /// `DuplicateVersion` when two migrations declare the same version,
    /// whether or not the tags select them.
    pub fn load(&self, tags: &[String]) -> Result<Vec<Arc<dyn Migration>>> {
        let mut by_version: BTreeMap<i64, Arc<dyn Migration>> = BTreeMap::new();
        for migration in &self.migrations {
            let version = migration.version();
            if let Some(existing) = by_version.get(&version) {
                return Err(MigrateError::DuplicateVersion {
                    version,
                    first: existing.description(),
                    second: migration.description(),
                });
            }
            by_version.insert(version, migration.clone());
        }

        let selected: Vec<_> = by_version
            .into_values()
            .filter(|m| matches_tags(&m.tags(), tags))
            .collect();
        debug!(
            "Loaded {} of {} migrations (tags: {:?})",
            selected.len(),
            self.migrations.len(),
            tags
        );
        Ok(selected)
    }
}

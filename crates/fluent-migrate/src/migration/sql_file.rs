//! Migrations backed by `{version}_{description}.up.sql` / `.down.sql` files.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::{MigrateError, Result};

use super::{Migration, MigrationContext};

const UP_SUFFIX: &str = ".up.sql";
const DOWN_SUFFIX: &str = ".down.sql";

/// A migration whose bodies are SQL scripts, executed as written.
#[derive(Debug, Clone)]
pub struct SqlFileMigration {
    version: i64,
    description: String,
    up_sql: String,
    down_sql: Option<String>,
    path: PathBuf,
}

impl SqlFileMigration {
    pub fn new(
        version: i64,
        description: impl Into<String>,
        up_sql: impl Into<String>,
        down_sql: Option<String>,
    ) -> Self {
        Self {
            version,
            description: description.into(),
            up_sql: up_sql.into(),
            down_sql,
            path: PathBuf::new(),
        }
    }

    /// The `.up.sql` file this migration was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn has_down(&self) -> bool {
        self.down_sql.is_some()
    }

    /// Load every migration in `dir`, ordered by version.
    ///
    /// # Errors
    ///
    /// `InvalidMigration` for a malformed file name or a down script
    /// without an up script; `DuplicateVersion` when two up scripts share
    /// a version.
    pub fn load_dir(dir: &Path) -> Result<Vec<SqlFileMigration>> {
        if !dir.is_dir() {
            return Err(MigrateError::Config(format!(
                "migrations directory {} does not exist",
                dir.display()
            )));
        }

        let mut ups: BTreeMap<i64, (String, PathBuf)> = BTreeMap::new();
        let mut downs: BTreeMap<i64, PathBuf> = BTreeMap::new();

        let mut entries = std::fs::read_dir(dir)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<Vec<_>>>()?;
        entries.sort();

        for path in entries {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let (stem, is_up) = if let Some(stem) = name.strip_suffix(UP_SUFFIX) {
                (stem, true)
            } else if let Some(stem) = name.strip_suffix(DOWN_SUFFIX) {
                (stem, false)
            } else {
                if name.ends_with(".sql") {
                    warn!("Ignoring {}: expected a .up.sql or .down.sql suffix", name);
                }
                continue;
            };
            let (version, description) = parse_stem(stem, name)?;

            if is_up {
                if let Some((first, _)) = ups.get(&version) {
                    return Err(MigrateError::DuplicateVersion {
                        version,
                        first: first.clone(),
                        second: description,
                    });
                }
                ups.insert(version, (description, path));
            } else {
                downs.insert(version, path);
            }
        }

        if let Some((version, path)) = downs.iter().find(|(v, _)| !ups.contains_key(v)) {
            return Err(MigrateError::InvalidMigration(format!(
                "down script {} for version {} has no up script",
                path.display(),
                version
            )));
        }

        let mut migrations = Vec::with_capacity(ups.len());
        for (version, (description, path)) in ups {
            let up_sql = std::fs::read_to_string(&path)?;
            let down_sql = match downs.get(&version) {
                Some(down) => Some(std::fs::read_to_string(down)?),
                None => None,
            };
            debug!(
                "Loaded SQL migration {} ({}){}",
                version,
                description,
                if down_sql.is_some() { "" } else { " without down script" }
            );
            migrations.push(SqlFileMigration {
                version,
                description,
                up_sql,
                down_sql,
                path,
            });
        }
        Ok(migrations)
    }
}

/// `202401150930_create_users` -> `(202401150930, "create users")`
fn parse_stem(stem: &str, file_name: &str) -> Result<(i64, String)> {
    let (version, description) = stem.split_once('_').unwrap_or((stem, ""));
    let version = version.parse::<i64>().map_err(|_| {
        MigrateError::InvalidMigration(format!(
            "{}: file name must start with a numeric version",
            file_name
        ))
    })?;
    Ok((version, description.replace('_', " ")))
}

#[async_trait]
impl Migration for SqlFileMigration {
    fn version(&self) -> i64 {
        self.version
    }

    fn description(&self) -> String {
        self.description.clone()
    }

    async fn up(&self, ctx: &mut MigrationContext) -> Result<()> {
        ctx.execute().sql(self.up_sql.clone());
        Ok(())
    }

    async fn down(&self, ctx: &mut MigrationContext) -> Result<()> {
        match &self.down_sql {
            Some(sql) => {
                ctx.execute().sql(sql.clone());
                Ok(())
            }
            None => Err(MigrateError::Build(format!(
                "migration {} ({}) has no down script",
                self.version, self.description
            ))),
        }
    }
}

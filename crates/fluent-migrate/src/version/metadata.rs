//! Names of the table recording applied migrations.

use serde::{Deserialize, Serialize};

/// Version table layout; every field can be overridden from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VersionTableMetadata {
    /// Schema holding the table (default: connection default schema).
    pub schema_name: Option<String>,

    /// Table name (default: "VersionInfo").
    pub table_name: String,

    /// Version column (default: "Version").
    pub column_name: String,

    /// Timestamp column (default: "AppliedOn").
    pub applied_on_column_name: String,

    /// Description column (default: "Description").
    pub description_column_name: String,

    /// Unique index on the version column (default: "UC_Version").
    pub unique_index_name: String,

    /// Create the schema when it is missing (default: true).
    pub owns_schema: bool,

    /// Make the version column the primary key (default: false).
    pub use_primary_key: bool,
}

impl Default for VersionTableMetadata {
    fn default() -> Self {
        Self {
            schema_name: None,
            table_name: "VersionInfo".to_string(),
            column_name: "Version".to_string(),
            applied_on_column_name: "AppliedOn".to_string(),
            description_column_name: "Description".to_string(),
            unique_index_name: "UC_Version".to_string(),
            owns_schema: true,
            use_primary_key: false,
        }
    }
}

impl VersionTableMetadata {
    pub fn schema(&self) -> Option<&str> {
        self.schema_name.as_deref().filter(|s| !s.is_empty())
    }

    /// Every identifier the table uses, for validation.
    pub fn identifiers(&self) -> Vec<(&'static str, &str)> {
        let mut names = vec![
            ("table_name", self.table_name.as_str()),
            ("column_name", self.column_name.as_str()),
            ("applied_on_column_name", self.applied_on_column_name.as_str()),
            ("description_column_name", self.description_column_name.as_str()),
            ("unique_index_name", self.unique_index_name.as_str()),
        ];
        if let Some(schema) = self.schema() {
            names.push(("schema_name", schema));
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let metadata = VersionTableMetadata::default();
        assert_eq!(metadata.table_name, "VersionInfo");
        assert_eq!(metadata.column_name, "Version");
        assert_eq!(metadata.applied_on_column_name, "AppliedOn");
        assert_eq!(metadata.description_column_name, "Description");
        assert_eq!(metadata.unique_index_name, "UC_Version");
        assert_eq!(metadata.schema(), None);
    }

    #[test]
    fn test_partial_override_keeps_defaults() {
        let metadata: VersionTableMetadata =
            serde_yaml::from_str("table_name: SchemaVersions\nschema_name: meta\n").unwrap();
        assert_eq!(metadata.table_name, "SchemaVersions");
        assert_eq!(metadata.schema(), Some("meta"));
        assert_eq!(metadata.column_name, "Version");
        assert!(metadata.owns_schema);
    }
}

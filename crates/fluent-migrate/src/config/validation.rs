//! Configuration validation.

use super::RunnerConfig;
use crate::core::catalog::DriverCatalog;
use crate::core::identifier::validate_identifier;
use crate::drivers::JET;
use crate::error::{MigrateError, Result};

/// Validate the configuration.
pub fn validate(config: &RunnerConfig) -> Result<()> {
    let catalog = DriverCatalog::with_builtins();
    let db_type = catalog.normalize_db_type(&config.database.r#type)?;

    // Jet always scripts; everything else needs a connection unless told otherwise
    let connectionless = config.runner.no_connection || db_type == JET;
    if !connectionless && config.database.connection.trim().is_empty() {
        return Err(MigrateError::Config(
            "database.connection is required unless runner.no_connection is set".into(),
        ));
    }

    if let Some(0) = config.database.command_timeout_secs {
        return Err(MigrateError::Config(
            "database.command_timeout_secs must be at least 1".into(),
        ));
    }

    if let Some(schema) = &config.database.default_schema {
        validate_identifier(schema)
            .map_err(|e| MigrateError::Config(format!("database.default_schema: {}", e)))?;
    }

    if config.runner.output_script.is_some() && !connectionless {
        return Err(MigrateError::Config(
            "runner.output_script requires runner.no_connection".into(),
        ));
    }

    for (field, name) in config.version_table.identifiers() {
        validate_identifier(name)
            .map_err(|e| MigrateError::Config(format!("version_table.{}: {}", field, e)))?;
    }

    if config.runner.tags.iter().any(|t| t.trim().is_empty()) {
        return Err(MigrateError::Config("runner.tags must not contain empty tags".into()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> RunnerConfig {
        RunnerConfig::new("SqlServer", "Server=localhost;Database=app;User Id=sa;Password=pw")
    }

    #[test]
    fn test_valid_config() {
        assert!(validate(&valid_config()).is_ok());
    }

    #[test]
    fn test_unknown_database_type() {
        let mut config = valid_config();
        config.database.r#type = "oracle".to_string();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("Unknown database type"));
    }

    #[test]
    fn test_missing_connection() {
        let mut config = valid_config();
        config.database.connection = String::new();
        assert!(validate(&config).is_err());

        config.runner.no_connection = true;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_jet_needs_no_connection() {
        let config = RunnerConfig::new("access", "");
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_zero_timeout() {
        let mut config = valid_config();
        config.database.command_timeout_secs = Some(0);
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_output_script_requires_no_connection() {
        let mut config = valid_config();
        config.runner.output_script = Some("out.sql".into());
        assert!(validate(&config).is_err());
        config.runner.no_connection = true;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_bad_version_table_name() {
        let mut config = valid_config();
        config.version_table.table_name = String::new();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("version_table.table_name"));
    }

    #[test]
    fn test_database_config_debug_redacts_connection() {
        let mut config = valid_config();
        config.database.connection = "Password=super_secret_password_123".to_string();
        let debug_output = format!("{:?}", config.database);
        assert!(
            debug_output.contains("[REDACTED]"),
            "Debug output should contain [REDACTED]"
        );
        assert!(
            !debug_output.contains("super_secret_password_123"),
            "Debug output should not contain the connection string"
        );
    }
}

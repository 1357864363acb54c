//! Configuration validation.
//!
//! Runs before any connection is opened: a configuration that fails here
//! never produces a single SQL statement.

use super::Config;
use crate::core::identifier::validate_identifier;
use crate::error::{Result, UpsertError};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    if config.host.is_empty() {
        return Err(UpsertError::config("Database host is required"));
    }
    if config.database.is_empty() {
        return Err(UpsertError::config("Database name is required"));
    }
    if config.user.is_empty() {
        return Err(UpsertError::config("Database user is required"));
    }
    if config.tables.is_empty() {
        return Err(UpsertError::config("At least one table is required"));
    }
    if config.staging_schema == config.base_schema {
        return Err(UpsertError::Config(format!(
            "Staging and base schemas must be different. Got '{}' for both",
            config.staging_schema
        )));
    }

    validate_identifier(&config.staging_schema)?;
    validate_identifier(&config.base_schema)?;
    for table in &config.tables {
        validate_identifier(table)?;
    }
    for col in &config.exclude_columns {
        validate_identifier(col)?;
    }
    for col in &config.null_columns {
        validate_identifier(col)?;
    }

    if !config
        .encoding
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        || config.encoding.is_empty()
    {
        return Err(UpsertError::Config(format!(
            "Invalid encoding name: {:?}",
            config.encoding
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigOverlay;

    fn valid_config() -> Config {
        let overlay = ConfigOverlay {
            host: Some("localhost".to_string()),
            database: Some("library".to_string()),
            user: Some("postgres".to_string()),
            tables: Some(vec!["genres".to_string(), "books".to_string()]),
            ..Default::default()
        };
        Config::resolve(overlay, None).unwrap()
    }

    #[test]
    fn test_valid_config() {
        assert!(validate(&valid_config()).is_ok());
    }

    #[test]
    fn test_missing_host() {
        let mut config = valid_config();
        config.host = String::new();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_empty_tables() {
        let mut config = valid_config();
        config.tables.clear();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_same_schemas_rejected() {
        let mut config = valid_config();
        config.base_schema = "staging".to_string();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("must be different"));
    }

    #[test]
    fn test_injection_in_table_name_rejected() {
        let mut config = valid_config();
        config.tables.push("books; DROP TABLE genres".to_string());
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_injection_in_column_name_rejected() {
        let mut config = valid_config();
        config.exclude_columns.push("c; --".to_string());
        assert!(validate(&config).is_err());

        let mut config = valid_config();
        config.null_columns.push("c\"".to_string());
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_bad_encoding_rejected() {
        let mut config = valid_config();
        config.encoding = "utf-8'; drop table x".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_debug_redacts_password() {
        let mut config = valid_config();
        config.password = "super_secret_123".to_string();
        let debug_output = format!("{:?}", config);
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_123"));
    }
}

//! Configuration loading, merging, and validation.

mod types;
mod validation;

pub use types::*;

use crate::error::Result;
use std::path::Path;

impl Config {
    /// Resolve a configuration from CLI flags and an optional config file.
    ///
    /// File values win over CLI values for every key present in the file;
    /// defaults fill whatever neither source provides. The result is
    /// validated; the password is left empty and must be attached with
    /// [`Config::with_password`] before connecting.
    pub fn resolve(cli: ConfigOverlay, file: Option<ConfigOverlay>) -> Result<Config> {
        let merged = match file {
            Some(file) => cli.merged_with(file),
            None => cli,
        };

        let config = Config {
            host: merged.host.unwrap_or_default(),
            port: merged.port.unwrap_or_else(types::default_port),
            database: merged.database.unwrap_or_default(),
            user: merged.user.unwrap_or_default(),
            password: String::new(),
            staging_schema: merged
                .staging_schema
                .unwrap_or_else(types::default_staging_schema),
            base_schema: merged
                .base_schema
                .unwrap_or_else(types::default_base_schema),
            encoding: merged.encoding.unwrap_or_else(types::default_encoding),
            tables: merged.tables.unwrap_or_default(),
            exclude_columns: merged.exclude_columns.unwrap_or_default(),
            null_columns: merged.null_columns.unwrap_or_default(),
            upsert_method: merged.upsert_method.unwrap_or_default(),
            commit: merged.commit.unwrap_or(false),
            interactive: merged.interactive.unwrap_or(false),
        };
        config.validate()?;
        Ok(config)
    }

    /// Attach the password obtained from the environment or a prompt.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    /// Load a partial configuration from a YAML file. Unknown keys are
    /// rejected.
    pub fn load_overlay<P: AsRef<Path>>(path: P) -> Result<ConfigOverlay> {
        let content = std::fs::read_to_string(path)?;
        ConfigOverlay::from_yaml(&content)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// Build a connection string for tokio-postgres.
    pub fn connection_string(&self) -> String {
        format!(
            "host={} port={} dbname={} user={} password={}",
            self.host, self.port, self.database, self.user, self.password
        )
    }

    /// Render a template config file incorporating any values already
    /// provided; placeholders fill the required keys that are missing.
    pub fn template_yaml(overlay: &ConfigOverlay) -> Result<String> {
        let template = Config {
            host: overlay.host.clone().unwrap_or_else(|| "localhost".to_string()),
            port: overlay.port.unwrap_or_else(types::default_port),
            database: overlay
                .database
                .clone()
                .unwrap_or_else(|| "mydatabase".to_string()),
            user: overlay.user.clone().unwrap_or_else(|| "postgres".to_string()),
            password: String::new(),
            staging_schema: overlay
                .staging_schema
                .clone()
                .unwrap_or_else(types::default_staging_schema),
            base_schema: overlay
                .base_schema
                .clone()
                .unwrap_or_else(types::default_base_schema),
            encoding: overlay.encoding.clone().unwrap_or_else(types::default_encoding),
            tables: overlay
                .tables
                .clone()
                .unwrap_or_else(|| vec!["table1".to_string(), "table2".to_string()]),
            exclude_columns: overlay.exclude_columns.clone().unwrap_or_default(),
            null_columns: overlay.null_columns.clone().unwrap_or_default(),
            upsert_method: overlay.upsert_method.unwrap_or_default(),
            commit: overlay.commit.unwrap_or(false),
            interactive: overlay.interactive.unwrap_or(false),
        };
        Ok(serde_yaml::to_string(&template)?)
    }
}

impl ConfigOverlay {
    /// Parse a partial configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<ConfigOverlay> {
        Ok(serde_yaml::from_str(yaml)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UpsertError;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const VALID_YAML: &str = r#"
host: db.example.org
port: 5433
database: library
user: loader
staging_schema: staging
base_schema: public
tables:
  - genres
  - books
exclude_columns:
  - rev_user
  - rev_time
null_columns:
  - alias
upsert_method: update
commit: true
interactive: false
"#;

    fn cli_overlay() -> ConfigOverlay {
        ConfigOverlay {
            host: Some("localhost".to_string()),
            database: Some("cli_db".to_string()),
            user: Some("cli_user".to_string()),
            tables: Some(vec!["genres".to_string()]),
            ..Default::default()
        }
    }

    #[test]
    fn test_from_yaml_valid() {
        let overlay = ConfigOverlay::from_yaml(VALID_YAML).unwrap();
        assert_eq!(overlay.host.as_deref(), Some("db.example.org"));
        assert_eq!(overlay.port, Some(5433));
        assert_eq!(overlay.upsert_method, Some(UpsertMethod::Update));
        assert_eq!(overlay.commit, Some(true));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let result = ConfigOverlay::from_yaml("host: x\nchunk_size: 5\n");
        assert!(matches!(result, Err(UpsertError::Yaml(_))));
    }

    #[test]
    fn test_invalid_method_rejected() {
        let result = ConfigOverlay::from_yaml("upsert_method: merge\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_resolve_defaults() {
        let config = Config::resolve(cli_overlay(), None).unwrap();
        assert_eq!(config.port, 5432);
        assert_eq!(config.staging_schema, "staging");
        assert_eq!(config.base_schema, "public");
        assert_eq!(config.encoding, "utf-8");
        assert_eq!(config.upsert_method, UpsertMethod::Upsert);
        assert!(!config.commit);
        assert!(!config.interactive);
    }

    #[test]
    fn test_file_wins_over_cli() {
        let file = ConfigOverlay::from_yaml(VALID_YAML).unwrap();
        let config = Config::resolve(cli_overlay(), Some(file)).unwrap();
        assert_eq!(config.host, "db.example.org");
        assert_eq!(config.database, "library");
        assert_eq!(config.tables, vec!["genres", "books"]);
        assert_eq!(config.upsert_method, UpsertMethod::Update);
        assert!(config.commit);
    }

    #[test]
    fn test_cli_survives_when_file_silent() {
        let file = ConfigOverlay::from_yaml("port: 5433\n").unwrap();
        let config = Config::resolve(cli_overlay(), Some(file)).unwrap();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 5433);
    }

    #[test]
    fn test_resolve_missing_required_key() {
        let overlay = ConfigOverlay {
            host: Some("localhost".to_string()),
            ..Default::default()
        };
        assert!(Config::resolve(overlay, None).is_err());
    }

    #[test]
    fn test_load_overlay_from_file() {
        let mut file = NamedTempFile::with_suffix(".yaml").unwrap();
        file.write_all(VALID_YAML.as_bytes()).unwrap();
        file.flush().unwrap();

        let overlay = Config::load_overlay(file.path()).unwrap();
        assert_eq!(overlay.database.as_deref(), Some("library"));
    }

    #[test]
    fn test_connection_string() {
        let config = Config::resolve(cli_overlay(), None)
            .unwrap()
            .with_password("s3cret");
        assert_eq!(
            config.connection_string(),
            "host=localhost port=5432 dbname=cli_db user=cli_user password=s3cret"
        );
    }

    #[test]
    fn test_template_yaml_round_trips() {
        let yaml = Config::template_yaml(&cli_overlay()).unwrap();
        assert!(yaml.contains("host: localhost"));
        assert!(yaml.contains("database: cli_db"));
        assert!(yaml.contains("upsert_method: upsert"));
        assert!(!yaml.contains("password"));
        // The template itself must parse back cleanly.
        let overlay = ConfigOverlay::from_yaml(&yaml).unwrap();
        assert_eq!(overlay.host.as_deref(), Some("localhost"));
    }
}

//! Configuration type definitions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, UpsertError};

/// Merge strategy applied when staging rows are loaded into the base table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertMethod {
    /// Update matched rows, then insert unmatched rows.
    #[default]
    Upsert,

    /// Update matched rows only.
    Update,

    /// Insert unmatched rows only.
    Insert,
}

impl FromStr for UpsertMethod {
    type Err = UpsertError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "upsert" => Ok(UpsertMethod::Upsert),
            "update" => Ok(UpsertMethod::Update),
            "insert" => Ok(UpsertMethod::Insert),
            other => Err(UpsertError::Config(format!(
                "Invalid upsert method '{}'. Must be one of: upsert, update, insert",
                other
            ))),
        }
    }
}

impl fmt::Display for UpsertMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpsertMethod::Upsert => write!(f, "upsert"),
            UpsertMethod::Update => write!(f, "update"),
            UpsertMethod::Insert => write!(f, "insert"),
        }
    }
}

/// Resolved run configuration, immutable once constructed.
///
/// Built from CLI flags merged with an optional YAML config file (file keys
/// win) via [`Config::resolve`]. The password never comes from the file and
/// is never serialized.
#[derive(Clone, Serialize)]
pub struct Config {
    /// Database host.
    pub host: String,

    /// Database port (default: 5432).
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password. Supplied via `PGPASSWORD` or an interactive prompt.
    #[serde(skip_serializing)]
    pub password: String,

    /// Schema holding the candidate rows (default: "staging").
    pub staging_schema: String,

    /// Schema receiving the final writes (default: "public").
    pub base_schema: String,

    /// Client encoding (default: "utf-8").
    pub encoding: String,

    /// Tables to check and merge, in processing order.
    pub tables: Vec<String>,

    /// Columns excluded from UPDATE/INSERT column lists.
    pub exclude_columns: Vec<String>,

    /// Columns exempted from the not-null QA check.
    pub null_columns: Vec<String>,

    /// Merge strategy (default: upsert).
    pub upsert_method: UpsertMethod,

    /// Commit on success; otherwise every run is rolled back.
    pub commit: bool,

    /// Prompt the operator before each destructive step.
    pub interactive: bool,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("staging_schema", &self.staging_schema)
            .field("base_schema", &self.base_schema)
            .field("encoding", &self.encoding)
            .field("tables", &self.tables)
            .field("exclude_columns", &self.exclude_columns)
            .field("null_columns", &self.null_columns)
            .field("upsert_method", &self.upsert_method)
            .field("commit", &self.commit)
            .field("interactive", &self.interactive)
            .finish()
    }
}

/// Partial configuration from one source (CLI flags or a YAML file).
///
/// Unknown file keys are rejected.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigOverlay {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database: Option<String>,
    pub user: Option<String>,
    pub staging_schema: Option<String>,
    pub base_schema: Option<String>,
    pub encoding: Option<String>,
    pub tables: Option<Vec<String>>,
    pub exclude_columns: Option<Vec<String>>,
    pub null_columns: Option<Vec<String>>,
    pub upsert_method: Option<UpsertMethod>,
    pub commit: Option<bool>,
    pub interactive: Option<bool>,
}

impl ConfigOverlay {
    /// Overlay `other` on top of `self`: any key set in `other` wins.
    pub fn merged_with(mut self, other: ConfigOverlay) -> ConfigOverlay {
        macro_rules! take {
            ($field:ident) => {
                if other.$field.is_some() {
                    self.$field = other.$field;
                }
            };
        }
        take!(host);
        take!(port);
        take!(database);
        take!(user);
        take!(staging_schema);
        take!(base_schema);
        take!(encoding);
        take!(tables);
        take!(exclude_columns);
        take!(null_columns);
        take!(upsert_method);
        take!(commit);
        take!(interactive);
        self
    }
}

pub(crate) fn default_port() -> u16 {
    5432
}

pub(crate) fn default_staging_schema() -> String {
    "staging".to_string()
}

pub(crate) fn default_base_schema() -> String {
    "public".to_string()
}

pub(crate) fn default_encoding() -> String {
    "utf-8".to_string()
}

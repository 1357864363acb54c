//! Error types for the upsert library.

use thiserror::Error;

/// Main error type for QA and upsert operations.
#[derive(Error, Debug)]
pub enum UpsertError {
    /// Configuration error (invalid identifier, unknown method, bad YAML, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Schema error (missing table or column, staging/base shape mismatch)
    #[error("Schema error: {0}")]
    Schema(String),

    /// Database connection or query error
    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    /// QA checks reported failures for one or more tables
    #[error("QA checks failed")]
    QaFailed,

    /// Operator cancelled the run through the confirmation prompt
    #[error("Cancelled by operator")]
    Cancelled,

    /// IO error (config file, log file)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Internal assertion failure
    #[error("Invariant violation: {0}")]
    Invariant(String),
}

impl UpsertError {
    /// Create a Config error.
    pub fn config(message: impl Into<String>) -> Self {
        UpsertError::Config(message.into())
    }

    /// Create a Schema error.
    pub fn schema(message: impl Into<String>) -> Self {
        UpsertError::Schema(message.into())
    }

    /// Process exit code for this error at the CLI boundary.
    ///
    /// `1` = configuration or schema error, `2` = QA failure,
    /// `3` = operator cancellation, `4` = database error.
    pub fn exit_code(&self) -> u8 {
        match self {
            UpsertError::Config(_)
            | UpsertError::Schema(_)
            | UpsertError::Io(_)
            | UpsertError::Yaml(_)
            | UpsertError::Invariant(_) => 1,
            UpsertError::QaFailed => 2,
            UpsertError::Cancelled => 3,
            UpsertError::Database(_) => 4,
        }
    }

    /// Format error with full details including the source chain.
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for upsert operations.
pub type Result<T> = std::result::Result<T, UpsertError>;

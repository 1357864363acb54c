//! # pg-upsert
//!
//! Validate-then-upsert engine for PostgreSQL staging tables.
//!
//! For each configured table, rows in a *staging* schema are first run
//! through QA checks mirroring the constraints declared on the matching
//! *base* schema table:
//!
//! - **Not-null**: staging NULLs in required base columns
//! - **Primary key**: duplicated key values in staging
//! - **Foreign key**: staging key tuples absent from the referenced table
//! - **Check constraint**: staging rows failing declared predicates
//!
//! Only when every check passes (or the operator explicitly proceeds in
//! interactive mode) are rows merged into the base table by update, insert,
//! or both. The whole run executes inside one transaction and is committed
//! or rolled back as a unit.
//!
//! ## Example
//!
//! ```rust,no_run
//! use pg_upsert::{Config, ConfigOverlay, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), pg_upsert::UpsertError> {
//!     let overlay = ConfigOverlay {
//!         host: Some("localhost".to_string()),
//!         database: Some("library".to_string()),
//!         user: Some("postgres".to_string()),
//!         tables: Some(vec!["genres".to_string(), "books".to_string()]),
//!         commit: Some(true),
//!         ..Default::default()
//!     };
//!     let config = Config::resolve(overlay, None)?.with_password("postgres");
//!     let orchestrator = Orchestrator::connect(config).await?;
//!     let outcome = orchestrator.run().await?;
//!     println!("exit code {}", outcome.exit_code());
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod config;
pub mod control;
pub mod core;
pub mod db;
pub mod error;
pub mod orchestrator;
pub mod prompt;
pub mod qa;
pub mod upsert;

#[cfg(test)]
pub(crate) mod testutil;

// Re-exports for convenient access
pub use catalog::{
    CatalogInspector, CheckConstraintDescriptor, ForeignKeyDescriptor, TableDescriptor,
};
pub use config::{Config, ConfigOverlay, UpsertMethod};
pub use control::{ControlRecord, ControlTable, ErrorFamily};
pub use db::PgSession;
pub use error::{Result, UpsertError};
pub use orchestrator::{Orchestrator, RunOutcome};
pub use prompt::{Decision, Prompter, RowSample, SilentPrompter, TerminalPrompter};
pub use qa::QaEngine;
pub use upsert::UpsertEngine;

//! Run orchestration: session lifecycle, QA-then-merge sequencing, summary
//! emission, and the single commit-or-rollback decision.

use std::time::Instant;

use tracing::{debug, info, warn};

use crate::catalog::{CatalogInspector, TableDescriptor};
use crate::config::Config;
use crate::control::{ControlRecord, ControlTable};
use crate::core::format_elapsed;
use crate::db::PgSession;
use crate::error::{Result, UpsertError};
use crate::prompt::{self, Decision, Prompter, RowSample};
use crate::qa::QaEngine;
use crate::upsert::UpsertEngine;

/// Terminal state of a run. Every variant leaves the database in a known
/// state: either the merge is committed or nothing happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// QA passed, merges applied, transaction committed.
    Committed,

    /// QA passed and merges ran, but the run was configured not to commit;
    /// everything was rolled back.
    RolledBack,

    /// QA recorded errors; no merge was attempted and the transaction was
    /// rolled back.
    QaFailed,

    /// The operator cancelled; the transaction was rolled back.
    Cancelled,
}

impl RunOutcome {
    /// Process exit code for this outcome at the CLI boundary.
    pub fn exit_code(&self) -> u8 {
        match self {
            RunOutcome::Committed | RunOutcome::RolledBack => 0,
            RunOutcome::QaFailed => 2,
            RunOutcome::Cancelled => 3,
        }
    }
}

/// Public entry point: owns the session, the descriptors, the control
/// table, and the prompter for one run.
pub struct Orchestrator {
    config: Config,
    session: PgSession,
    descriptors: Vec<TableDescriptor>,
    control: ControlTable,
    prompter: Box<dyn Prompter>,
}

impl Orchestrator {
    /// Validate the configuration, open a session, and inspect the
    /// catalogs. Fails before any DML on configuration or schema problems.
    pub async fn connect(config: Config) -> Result<Self> {
        config.validate()?;
        let session = PgSession::connect(&config).await?;
        Self::with_session(config, session).await
    }

    /// Like [`Orchestrator::connect`], but adopting a pre-opened session.
    pub async fn with_session(config: Config, session: PgSession) -> Result<Self> {
        config.validate()?;
        session.begin().await?;

        let descriptors = match Self::inspect(&session, &config).await {
            Ok(descriptors) => descriptors,
            Err(e) => {
                let _ = session.rollback().await;
                return Err(e);
            }
        };

        let control = ControlTable::seed(&config);
        let prompter = prompt::for_interactive(config.interactive);
        Ok(Self {
            config,
            session,
            descriptors,
            control,
            prompter,
        })
    }

    /// Replace the prompter, e.g. with a GUI implementation.
    pub fn with_prompter(mut self, prompter: Box<dyn Prompter>) -> Self {
        self.prompter = prompter;
        self
    }

    async fn inspect(session: &PgSession, config: &Config) -> Result<Vec<TableDescriptor>> {
        let inspector = CatalogInspector::new(session);
        let mut descriptors = Vec::with_capacity(config.tables.len());
        for table in &config.tables {
            descriptors.push(inspector.build_descriptor(config, table).await?);
        }
        Ok(descriptors)
    }

    fn find_descriptor<'d>(
        descriptors: &'d [TableDescriptor],
        table: &str,
    ) -> Result<&'d TableDescriptor> {
        descriptors.iter().find(|d| d.name == table).ok_or_else(|| {
            UpsertError::Config(format!("Table {} is not part of this run", table))
        })
    }

    /// Run the full workflow: QA, merge, summary, finalization.
    pub async fn run(mut self) -> Result<RunOutcome> {
        let started = Instant::now();
        info!(
            "Upserting to {} from {}",
            self.config.base_schema, self.config.staging_schema
        );

        if self.config.interactive {
            let sample = RowSample {
                headers: vec!["table".to_string()],
                rows: self
                    .config
                    .tables
                    .iter()
                    .map(|t| vec![t.clone()])
                    .collect(),
            };
            let decision = self.prompter.confirm(
                "Upsert tables",
                "Tables selected for upsert",
                Some(&sample),
            )?;
            if decision != Decision::Proceed {
                return self.finish_cancelled().await;
            }
        } else {
            info!("Tables selected for upsert:");
            for table in &self.config.tables {
                info!("  {}", table);
            }
        }

        let qa_started = Instant::now();
        let passed = match self.qa_all().await {
            Ok(passed) => passed,
            Err(UpsertError::Cancelled) => return self.finish_cancelled().await,
            Err(e) => return self.finish_error(e).await,
        };
        debug!(
            "QA checks completed in {}",
            format_elapsed(qa_started.elapsed())
        );

        if !passed {
            warn!(
                "===QA checks failed. Below is a summary of the errors===\n{}",
                self.control.snapshot()
            );
            self.session.rollback().await?;
            info!("Changes rolled back");
            return Ok(RunOutcome::QaFailed);
        }

        match self.upsert_all().await {
            Ok(()) => {}
            Err(UpsertError::Cancelled) => return self.finish_cancelled().await,
            Err(e) => return self.finish_error(e).await,
        }

        info!("Summary of changes:\n{}", self.control.snapshot());
        let outcome = if self.config.commit {
            self.session.commit().await?;
            info!("Changes committed");
            RunOutcome::Committed
        } else {
            info!("The commit flag is not set, rolling back changes");
            self.session.rollback().await?;
            info!("Changes rolled back");
            RunOutcome::RolledBack
        };
        debug!("Run completed in {}", format_elapsed(started.elapsed()));
        self.session.close().await;
        Ok(outcome)
    }

    async fn finish_cancelled(&self) -> Result<RunOutcome> {
        warn!("Run cancelled by operator");
        info!("Summary of changes:\n{}", self.control.snapshot());
        self.session.rollback().await?;
        info!("Changes rolled back");
        Ok(RunOutcome::Cancelled)
    }

    async fn finish_error(&self, error: UpsertError) -> Result<RunOutcome> {
        let _ = self.session.rollback().await;
        info!("Changes rolled back");
        Err(error)
    }

    /// Run all four QA families over all tables. Returns whether QA passed.
    pub async fn qa_all(&mut self) -> Result<bool> {
        let engine = QaEngine::new(&self.session, self.prompter.as_ref());
        engine.qa_all(&self.descriptors, &mut self.control).await
    }

    /// Not-null QA for a single table.
    pub async fn qa_one_null(&mut self, table: &str) -> Result<()> {
        let d = Self::find_descriptor(&self.descriptors, table)?;
        QaEngine::new(&self.session, self.prompter.as_ref())
            .qa_one_null(d, &mut self.control)
            .await
    }

    /// Primary-key QA for a single table.
    pub async fn qa_one_pk(&mut self, table: &str) -> Result<()> {
        let d = Self::find_descriptor(&self.descriptors, table)?;
        QaEngine::new(&self.session, self.prompter.as_ref())
            .qa_one_pk(d, &mut self.control)
            .await
    }

    /// Foreign-key QA for a single table.
    pub async fn qa_one_fk(&mut self, table: &str) -> Result<()> {
        let d = Self::find_descriptor(&self.descriptors, table)?;
        QaEngine::new(&self.session, self.prompter.as_ref())
            .qa_one_fk(d, &mut self.control)
            .await
    }

    /// Check-constraint QA for a single table.
    pub async fn qa_one_ck(&mut self, table: &str) -> Result<()> {
        let d = Self::find_descriptor(&self.descriptors, table)?;
        QaEngine::new(&self.session, self.prompter.as_ref())
            .qa_one_ck(d, &mut self.control)
            .await
    }

    /// Merge all tables in configuration order.
    pub async fn upsert_all(&mut self) -> Result<()> {
        let engine = UpsertEngine::new(
            &self.session,
            self.prompter.as_ref(),
            self.config.upsert_method,
        );
        engine
            .upsert_all(&self.descriptors, &mut self.control)
            .await
    }

    /// Merge a single table.
    pub async fn upsert_one(&mut self, table: &str) -> Result<()> {
        let d = Self::find_descriptor(&self.descriptors, table)?;
        UpsertEngine::new(
            &self.session,
            self.prompter.as_ref(),
            self.config.upsert_method,
        )
        .upsert_one(d, &mut self.control)
        .await
    }

    /// Commit the open transaction.
    pub async fn commit(&self) -> Result<()> {
        self.session.commit().await
    }

    /// Roll back the open transaction.
    pub async fn rollback(&self) -> Result<()> {
        self.session.rollback().await
    }

    /// Rendered control-table summary.
    pub fn control_snapshot(&self) -> String {
        self.control.snapshot()
    }

    /// Structured control-table contents.
    pub fn control_rows(&self) -> &[ControlRecord] {
        self.control.rows()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_exit_codes() {
        assert_eq!(RunOutcome::Committed.exit_code(), 0);
        assert_eq!(RunOutcome::RolledBack.exit_code(), 0);
        assert_eq!(RunOutcome::QaFailed.exit_code(), 2);
        assert_eq!(RunOutcome::Cancelled.exit_code(), 3);
    }
}

//! Per-table control records: effective flags, accumulated QA findings, and
//! upsert row counts.
//!
//! This is the authoritative answer to "did QA pass" and the source of the
//! operator-facing summary. Error fields only ever grow during a run.

use crate::config::Config;
use crate::core::render_table;
use crate::error::{Result, UpsertError};

/// QA check family, used to address the error field to append to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorFamily {
    Null,
    PrimaryKey,
    ForeignKey,
    Check,
}

/// State for one configured table.
#[derive(Debug, Clone)]
pub struct ControlRecord {
    /// Table name (key).
    pub table_name: String,

    /// Columns excluded from UPDATE/INSERT for this table.
    pub exclude_cols: Vec<String>,

    /// Columns exempt from the not-null check for this table.
    pub exclude_null_checks: Vec<String>,

    /// Whether destructive steps on this table go through the prompter.
    pub interactive: bool,

    /// Not-null findings, `"<column> (<count>)"` comma-joined.
    pub null_errors: Option<String>,

    /// Duplicate-key findings.
    pub pk_errors: Option<String>,

    /// Foreign-key findings, `"<constraint> (<count>)"` comma-joined.
    pub fk_errors: Option<String>,

    /// Check-constraint findings, `"<constraint> (<count>)"` comma-joined.
    pub ck_errors: Option<String>,

    /// Rows updated by the merge; `None` until the upsert engine ran.
    pub rows_updated: Option<i64>,

    /// Rows inserted by the merge; `None` until the upsert engine ran.
    pub rows_inserted: Option<i64>,
}

impl ControlRecord {
    fn new(table_name: &str, config: &Config) -> Self {
        Self {
            table_name: table_name.to_string(),
            exclude_cols: config.exclude_columns.clone(),
            exclude_null_checks: config.null_columns.clone(),
            interactive: config.interactive,
            null_errors: None,
            pk_errors: None,
            fk_errors: None,
            ck_errors: None,
            rows_updated: None,
            rows_inserted: None,
        }
    }

    /// True when any QA family recorded a finding for this table.
    pub fn has_errors(&self) -> bool {
        self.null_errors.is_some()
            || self.pk_errors.is_some()
            || self.fk_errors.is_some()
            || self.ck_errors.is_some()
    }

    fn error_field(&mut self, family: ErrorFamily) -> &mut Option<String> {
        match family {
            ErrorFamily::Null => &mut self.null_errors,
            ErrorFamily::PrimaryKey => &mut self.pk_errors,
            ErrorFamily::ForeignKey => &mut self.fk_errors,
            ErrorFamily::Check => &mut self.ck_errors,
        }
    }
}

/// The control table: one record per configured table, in configuration
/// order. Session-scoped; discarded when the run ends.
#[derive(Debug)]
pub struct ControlTable {
    records: Vec<ControlRecord>,
}

impl ControlTable {
    /// Seed one record per configured table with the run-level defaults.
    pub fn seed(config: &Config) -> Self {
        Self {
            records: config
                .tables
                .iter()
                .map(|t| ControlRecord::new(t, config))
                .collect(),
        }
    }

    pub fn get(&self, table: &str) -> Result<&ControlRecord> {
        self.records
            .iter()
            .find(|r| r.table_name == table)
            .ok_or_else(|| {
                UpsertError::Invariant(format!("Table {} not found in control table", table))
            })
    }

    fn get_mut(&mut self, table: &str) -> Result<&mut ControlRecord> {
        self.records
            .iter_mut()
            .find(|r| r.table_name == table)
            .ok_or_else(|| {
                UpsertError::Invariant(format!("Table {} not found in control table", table))
            })
    }

    /// Append one finding to the addressed error field, comma-separating
    /// successive findings. Findings are never cleared during a run.
    pub fn append_error(
        &mut self,
        table: &str,
        family: ErrorFamily,
        message: &str,
    ) -> Result<()> {
        let field = self.get_mut(table)?.error_field(family);
        match field {
            Some(existing) => {
                existing.push_str(", ");
                existing.push_str(message);
            }
            None => *field = Some(message.to_string()),
        }
        Ok(())
    }

    /// Record the final row counts for a table after its merge ran.
    pub fn set_counts(&mut self, table: &str, updated: i64, inserted: i64) -> Result<()> {
        let record = self.get_mut(table)?;
        record.rows_updated = Some(updated);
        record.rows_inserted = Some(inserted);
        Ok(())
    }

    /// QA passed iff every error field of every record is empty.
    pub fn qa_passed(&self) -> bool {
        self.records.iter().all(|r| !r.has_errors())
    }

    /// All records in configuration order, for programmatic consumers.
    pub fn rows(&self) -> &[ControlRecord] {
        &self.records
    }

    /// Render the control table as a text table for the summary.
    pub fn snapshot(&self) -> String {
        let headers = [
            "table_name",
            "exclude_cols",
            "exclude_null_checks",
            "interactive",
            "null_errors",
            "pk_errors",
            "fk_errors",
            "ck_errors",
            "rows_updated",
            "rows_inserted",
        ];
        let rows: Vec<Vec<String>> = self
            .records
            .iter()
            .map(|r| {
                vec![
                    r.table_name.clone(),
                    r.exclude_cols.join(","),
                    r.exclude_null_checks.join(","),
                    r.interactive.to_string(),
                    r.null_errors.clone().unwrap_or_default(),
                    r.pk_errors.clone().unwrap_or_default(),
                    r.fk_errors.clone().unwrap_or_default(),
                    r.ck_errors.clone().unwrap_or_default(),
                    r.rows_updated.map(|n| n.to_string()).unwrap_or_default(),
                    r.rows_inserted.map(|n| n.to_string()).unwrap_or_default(),
                ]
            })
            .collect();
        render_table(&headers, &rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigOverlay;

    fn config() -> Config {
        let overlay = ConfigOverlay {
            host: Some("localhost".to_string()),
            database: Some("library".to_string()),
            user: Some("postgres".to_string()),
            tables: Some(vec!["genres".to_string(), "books".to_string()]),
            null_columns: Some(vec!["alias".to_string()]),
            ..Default::default()
        };
        Config::resolve(overlay, None).unwrap()
    }

    #[test]
    fn test_seed_defaults() {
        let control = ControlTable::seed(&config());
        assert_eq!(control.rows().len(), 2);
        let record = control.get("books").unwrap();
        assert_eq!(record.exclude_null_checks, vec!["alias"]);
        assert!(!record.interactive);
        assert!(!record.has_errors());
        assert_eq!(record.rows_updated, None);
        assert_eq!(record.rows_inserted, None);
        assert!(control.qa_passed());
    }

    #[test]
    fn test_seed_preserves_configuration_order() {
        let control = ControlTable::seed(&config());
        let names: Vec<&str> = control
            .rows()
            .iter()
            .map(|r| r.table_name.as_str())
            .collect();
        assert_eq!(names, vec!["genres", "books"]);
    }

    #[test]
    fn test_append_error_accumulates() {
        let mut control = ControlTable::seed(&config());
        control
            .append_error("books", ErrorFamily::Null, "book_title (1)")
            .unwrap();
        control
            .append_error("books", ErrorFamily::Null, "genre (2)")
            .unwrap();
        let record = control.get("books").unwrap();
        assert_eq!(record.null_errors.as_deref(), Some("book_title (1), genre (2)"));
        assert!(record.has_errors());
        assert!(!control.qa_passed());
    }

    #[test]
    fn test_families_are_independent() {
        let mut control = ControlTable::seed(&config());
        control
            .append_error("books", ErrorFamily::ForeignKey, "books_genre_fkey (1)")
            .unwrap();
        let record = control.get("books").unwrap();
        assert!(record.null_errors.is_none());
        assert_eq!(record.fk_errors.as_deref(), Some("books_genre_fkey (1)"));
        assert!(control.get("genres").unwrap().null_errors.is_none());
    }

    #[test]
    fn test_unknown_table_is_invariant_violation() {
        let mut control = ControlTable::seed(&config());
        let err = control
            .append_error("missing", ErrorFamily::Null, "x (1)")
            .unwrap_err();
        assert!(matches!(err, UpsertError::Invariant(_)));
    }

    #[test]
    fn test_set_counts() {
        let mut control = ControlTable::seed(&config());
        control.set_counts("genres", 0, 2).unwrap();
        let record = control.get("genres").unwrap();
        assert_eq!(record.rows_updated, Some(0));
        assert_eq!(record.rows_inserted, Some(2));
    }

    #[test]
    fn test_snapshot_contains_findings() {
        let mut control = ControlTable::seed(&config());
        control
            .append_error("books", ErrorFamily::Null, "book_title (1)")
            .unwrap();
        control.set_counts("genres", 0, 2).unwrap();
        let snapshot = control.snapshot();
        assert!(snapshot.contains("table_name"));
        assert!(snapshot.contains("book_title (1)"));
        assert!(snapshot.lines().count() >= 4);
    }
}

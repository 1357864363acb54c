//! Operator confirmation.
//!
//! The engines never decide on their own whether a destructive step runs in
//! interactive mode; they hand a title, a message, and an optional row
//! sample to a [`Prompter`] and act on the decision. Prompters never touch
//! the database.

use dialoguer::Select;
use tokio_postgres::Row;

use crate::core::render_table;
use crate::error::{Result, UpsertError};

/// Operator decision for one confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Perform the step.
    Proceed,

    /// Skip this step and continue the run.
    Skip,

    /// Abort the whole run; the orchestrator rolls back.
    Cancel,
}

/// A bounded sample of rows for display, already stringified.
#[derive(Debug, Clone, Default)]
pub struct RowSample {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RowSample {
    /// Build a sample from query results. Every selected column is expected
    /// to be `::text`-cast server-side; NULLs render as empty cells.
    pub fn from_rows(rows: &[Row]) -> Result<RowSample> {
        let headers: Vec<String> = match rows.first() {
            Some(row) => row.columns().iter().map(|c| c.name().to_string()).collect(),
            None => return Ok(RowSample::default()),
        };

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let mut cells = Vec::with_capacity(headers.len());
            for i in 0..headers.len() {
                let value: Option<String> = row.try_get(i)?;
                cells.push(value.unwrap_or_default());
            }
            out.push(cells);
        }
        Ok(RowSample {
            headers,
            rows: out,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Render the sample as a text table.
    pub fn render(&self) -> String {
        let headers: Vec<&str> = self.headers.iter().map(String::as_str).collect();
        render_table(&headers, &self.rows)
    }
}

/// Capability abstracting operator confirmation.
pub trait Prompter {
    /// Present a step to the operator and return the decision.
    fn confirm(&self, title: &str, message: &str, sample: Option<&RowSample>)
        -> Result<Decision>;
}

/// Non-interactive prompter: always proceeds.
pub struct SilentPrompter;

impl Prompter for SilentPrompter {
    fn confirm(
        &self,
        _title: &str,
        _message: &str,
        _sample: Option<&RowSample>,
    ) -> Result<Decision> {
        Ok(Decision::Proceed)
    }
}

/// Console prompter: prints the sample and asks for a selection.
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn confirm(
        &self,
        title: &str,
        message: &str,
        sample: Option<&RowSample>,
    ) -> Result<Decision> {
        eprintln!("\n=== {} ===", title);
        eprintln!("{}", message);
        if let Some(sample) = sample.filter(|s| !s.is_empty()) {
            eprintln!("\n{}\n", sample.render());
        }

        let selection = Select::new()
            .with_prompt(title)
            .items(&["Proceed", "Skip", "Cancel"])
            .default(0)
            .interact()
            .map_err(prompt_io_error)?;

        Ok(match selection {
            0 => Decision::Proceed,
            1 => Decision::Skip,
            _ => Decision::Cancel,
        })
    }
}

/// Convert a dialoguer failure into the crate's IO error.
pub fn prompt_io_error(e: dialoguer::Error) -> UpsertError {
    UpsertError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
}

/// Pick the prompter for a run: terminal when interactive, silent otherwise.
pub fn for_interactive(interactive: bool) -> Box<dyn Prompter> {
    if interactive {
        Box::new(TerminalPrompter)
    } else {
        Box::new(SilentPrompter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silent_prompter_always_proceeds() {
        let prompter = SilentPrompter;
        assert_eq!(
            prompter.confirm("title", "message", None).unwrap(),
            Decision::Proceed
        );
    }

    #[test]
    fn test_empty_sample_renders_nothing() {
        let sample = RowSample::default();
        assert!(sample.is_empty());
    }

    #[test]
    fn test_sample_render() {
        let sample = RowSample {
            headers: vec!["genre".to_string(), "nrows".to_string()],
            rows: vec![vec!["Mystery".to_string(), "1".to_string()]],
        };
        let rendered = sample.render();
        assert!(rendered.contains("| genre   | nrows |"));
        assert!(rendered.contains("| Mystery | 1     |"));
    }

    #[test]
    fn test_for_interactive_selects_silent() {
        let prompter = for_interactive(false);
        assert_eq!(
            prompter.confirm("t", "m", None).unwrap(),
            Decision::Proceed
        );
    }
}

//! Merge execution: UPDATE/INSERT synthesis against the base schema.
//!
//! Statements are synthesized from the table descriptor; every identifier
//! goes through `core::identifier` quoting. The update direction only
//! touches rows whose non-key values actually differ (`IS DISTINCT FROM`),
//! so re-running a merge over unchanged staging data writes nothing.

use tracing::{debug, info};

use crate::catalog::TableDescriptor;
use crate::config::UpsertMethod;
use crate::control::ControlTable;
use crate::core::identifier::quote;
use crate::db::PgSession;
use crate::error::{Result, UpsertError};
use crate::prompt::{Decision, Prompter, RowSample};
use crate::qa::SAMPLE_ROW_LIMIT;

/// Key-equality predicate between the base (b) and staging (s) aliases.
fn pk_join_predicate(d: &TableDescriptor) -> Result<String> {
    let parts = d
        .primary_key
        .iter()
        .map(|c| Ok(format!("b.{q} = s.{q}", q = quote(c)?)))
        .collect::<Result<Vec<String>>>()?;
    Ok(parts.join(" AND "))
}

/// Change-detection predicate over the non-key DML columns. `None` when the
/// table has no non-key columns to compare.
fn distinct_predicate(d: &TableDescriptor) -> Result<Option<String>> {
    let cols = d.update_set_columns();
    if cols.is_empty() {
        return Ok(None);
    }
    let parts = cols
        .iter()
        .map(|c| Ok(format!("b.{q} IS DISTINCT FROM s.{q}", q = quote(c)?)))
        .collect::<Result<Vec<String>>>()?;
    Ok(Some(parts.join(" OR ")))
}

/// UPDATE of changed rows. `None` when every DML column is part of the key.
fn update_statement(d: &TableDescriptor) -> Result<Option<String>> {
    let Some(changed) = distinct_predicate(d)? else {
        return Ok(None);
    };
    let set_list = d
        .update_set_columns()
        .iter()
        .map(|c| Ok(format!("{q} = s.{q}", q = quote(c)?)))
        .collect::<Result<Vec<String>>>()?
        .join(", ");
    Ok(Some(format!(
        "UPDATE {base} AS b SET {set} FROM {stg} AS s WHERE {join} AND ({changed})",
        base = d.base_ident()?,
        set = set_list,
        stg = d.staging_ident()?,
        join = pk_join_predicate(d)?,
    )))
}

/// INSERT of staging rows whose key is absent from the base table.
fn insert_statement(d: &TableDescriptor) -> Result<String> {
    let col_list = crate::core::identifier::quote_list(&d.dml_columns)?;
    let select_list = d
        .dml_columns
        .iter()
        .map(|c| Ok(format!("s.{}", quote(c)?)))
        .collect::<Result<Vec<String>>>()?
        .join(", ");
    Ok(format!(
        "INSERT INTO {base} ({cols}) SELECT {sel} FROM {stg} AS s \
         WHERE NOT EXISTS (SELECT 1 FROM {base} AS b WHERE {join})",
        base = d.base_ident()?,
        cols = col_list,
        sel = select_list,
        stg = d.staging_ident()?,
        join = pk_join_predicate(d)?,
    ))
}

/// INSERT of every staging row; only valid when the table has no PK.
fn insert_all_statement(d: &TableDescriptor) -> Result<String> {
    let col_list = crate::core::identifier::quote_list(&d.dml_columns)?;
    Ok(format!(
        "INSERT INTO {base} ({cols}) SELECT {cols} FROM {stg}",
        base = d.base_ident()?,
        cols = col_list,
        stg = d.staging_ident()?,
    ))
}

/// Text-cast staging column list for preview selects.
fn preview_select_list(d: &TableDescriptor) -> Result<String> {
    Ok(d.dml_columns
        .iter()
        .map(|c| Ok(format!("s.{q}::text AS {q}", q = quote(c)?)))
        .collect::<Result<Vec<String>>>()?
        .join(", "))
}

/// Rows the update direction would touch.
fn update_preview_query(d: &TableDescriptor, limit: usize) -> Result<Option<String>> {
    let Some(changed) = distinct_predicate(d)? else {
        return Ok(None);
    };
    Ok(Some(format!(
        "SELECT {sel} FROM {stg} AS s INNER JOIN {base} AS b ON {join} \
         WHERE ({changed}) LIMIT {limit}",
        sel = preview_select_list(d)?,
        stg = d.staging_ident()?,
        base = d.base_ident()?,
        join = pk_join_predicate(d)?,
    )))
}

/// Rows the insert direction would add.
fn insert_preview_query(d: &TableDescriptor, limit: usize) -> Result<String> {
    if d.has_pk() {
        Ok(format!(
            "SELECT {sel} FROM {stg} AS s \
             WHERE NOT EXISTS (SELECT 1 FROM {base} AS b WHERE {join}) LIMIT {limit}",
            sel = preview_select_list(d)?,
            stg = d.staging_ident()?,
            base = d.base_ident()?,
            join = pk_join_predicate(d)?,
        ))
    } else {
        Ok(format!(
            "SELECT {sel} FROM {stg} AS s LIMIT {limit}",
            sel = preview_select_list(d)?,
            stg = d.staging_ident()?,
        ))
    }
}

/// Executes the configured merge strategy table by table.
pub struct UpsertEngine<'a> {
    session: &'a PgSession,
    prompter: &'a dyn Prompter,
    method: UpsertMethod,
}

impl<'a> UpsertEngine<'a> {
    pub fn new(
        session: &'a PgSession,
        prompter: &'a dyn Prompter,
        method: UpsertMethod,
    ) -> Self {
        Self {
            session,
            prompter,
            method,
        }
    }

    /// Merge all tables in configuration order.
    pub async fn upsert_all(
        &self,
        descriptors: &[TableDescriptor],
        control: &mut ControlTable,
    ) -> Result<()> {
        info!("===Starting upsert procedures===");
        for d in descriptors {
            self.upsert_one(d, control).await?;
        }
        Ok(())
    }

    /// Merge one table, honouring the QA-passed gate and the interactive
    /// previews. Records the final row counts in the control table.
    pub async fn upsert_one(
        &self,
        d: &TableDescriptor,
        control: &mut ControlTable,
    ) -> Result<()> {
        let record = control.get(&d.name)?;
        if record.has_errors() {
            info!(
                "Skipping table {}: QA checks recorded errors",
                d.base_name()
            );
            return Ok(());
        }
        let interactive = record.interactive;

        if !d.has_pk() && self.method != UpsertMethod::Insert {
            return Err(UpsertError::Schema(format!(
                "Table {} has no primary key; method '{}' requires one",
                d.base_name(),
                self.method
            )));
        }

        info!("Performing upsert on table {}", d.base_name());
        let mut rows_updated = 0i64;
        let mut rows_inserted = 0i64;

        if matches!(self.method, UpsertMethod::Upsert | UpsertMethod::Update) {
            match update_statement(d)? {
                None => info!("  No non-key columns to update"),
                Some(stmt) => {
                    if self.confirm_direction(d, interactive, Direction::Update).await? {
                        debug!("    UPDATE statement for {}", d.base_name());
                        rows_updated = self.session.execute(&stmt).await? as i64;
                        info!("    {} rows updated", rows_updated);
                    }
                }
            }
        }

        if matches!(self.method, UpsertMethod::Upsert | UpsertMethod::Insert) {
            let stmt = if d.has_pk() {
                insert_statement(d)?
            } else {
                insert_all_statement(d)?
            };
            if self.confirm_direction(d, interactive, Direction::Insert).await? {
                debug!("    INSERT statement for {}", d.base_name());
                rows_inserted = self.session.execute(&stmt).await? as i64;
                info!("    {} rows inserted", rows_inserted);
            }
        }

        control.set_counts(&d.name, rows_updated, rows_inserted)?;
        Ok(())
    }

    /// In interactive mode, show the operator the rows one direction would
    /// touch and return whether to perform it. Outside interactive mode the
    /// direction always runs.
    async fn confirm_direction(
        &self,
        d: &TableDescriptor,
        interactive: bool,
        direction: Direction,
    ) -> Result<bool> {
        if !interactive {
            return Ok(true);
        }

        let preview = match direction {
            Direction::Update => match update_preview_query(d, SAMPLE_ROW_LIMIT)? {
                Some(query) => query,
                None => return Ok(false),
            },
            Direction::Insert => insert_preview_query(d, SAMPLE_ROW_LIMIT)?,
        };
        let rows = self.session.query(&preview).await?;
        if rows.is_empty() {
            match direction {
                Direction::Update => info!("  No rows to update"),
                Direction::Insert => info!("  No new data to insert"),
            }
            return Ok(false);
        }
        let sample = RowSample::from_rows(&rows)?;

        let (title, message) = match direction {
            Direction::Update => (
                "Update rows",
                format!(
                    "Do you want to update these rows in {}?",
                    d.base_name()
                ),
            ),
            Direction::Insert => (
                "New data",
                format!(
                    "Do you want to add these new data to {}?",
                    d.base_name()
                ),
            ),
        };

        match self.prompter.confirm(title, &message, Some(&sample))? {
            Decision::Proceed => Ok(true),
            Decision::Skip => Ok(false),
            Decision::Cancel => Err(UpsertError::Cancelled),
        }
    }
}

#[derive(Clone, Copy)]
enum Direction {
    Update,
    Insert,
}

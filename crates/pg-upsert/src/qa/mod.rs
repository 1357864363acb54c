//! QA checks: the four pre-merge integrity check families.
//!
//! Each check counts staging rows that would violate a constraint declared
//! on the base table, and records a structured summary in the control
//! table. Checks never short-circuit: a table failing one family is still
//! run through the others so the final summary is complete.

use tracing::{debug, info, warn};

use crate::catalog::{CheckConstraintDescriptor, ForeignKeyDescriptor, TableDescriptor};
use crate::control::{ControlTable, ErrorFamily};
use crate::core::identifier::{quote, quote_list};
use crate::db::PgSession;
use crate::error::{Result, UpsertError};
use crate::prompt::{Decision, Prompter, RowSample};

/// Upper bound on rows fetched for interactive samples.
pub const SAMPLE_ROW_LIMIT: usize = 1000;

/// Count staging rows with a NULL in one required column.
fn null_count_query(d: &TableDescriptor, column: &str) -> Result<String> {
    Ok(format!(
        "SELECT count(*) FROM {} WHERE {} IS NULL",
        d.staging_ident()?,
        quote(column)?
    ))
}

/// Count duplicate key groups and total duplicated rows in one query:
/// returns `(group_count, row_count)`.
fn pk_summary_query(d: &TableDescriptor) -> Result<String> {
    let pk_list = quote_list(&d.primary_key)?;
    Ok(format!(
        "SELECT count(*), coalesce(sum(nrows), 0)::bigint \
         FROM (SELECT count(*) AS nrows FROM {stg} GROUP BY {pk} HAVING count(*) > 1) AS dupes",
        stg = d.staging_ident()?,
        pk = pk_list
    ))
}

/// Duplicate key groups for display, text-cast and bounded.
fn pk_sample_query(d: &TableDescriptor, limit: usize) -> Result<String> {
    let pk_list = quote_list(&d.primary_key)?;
    let select_list = d
        .primary_key
        .iter()
        .map(|c| Ok(format!("{q}::text AS {q}", q = quote(c)?)))
        .collect::<Result<Vec<String>>>()?
        .join(", ");
    Ok(format!(
        "SELECT {sel}, count(*)::text AS nrows FROM {stg} \
         GROUP BY {pk} HAVING count(*) > 1 ORDER BY {pk} LIMIT {limit}",
        sel = select_list,
        stg = d.staging_ident()?,
        pk = pk_list,
    ))
}

/// Join predicate from the staging table (s) to the referenced table (u).
fn fk_join_predicate(fk: &ForeignKeyDescriptor) -> Result<String> {
    let parts = fk
        .columns
        .iter()
        .zip(&fk.ref_columns)
        .map(|(local, referenced)| {
            Ok(format!("s.{} = u.{}", quote(local)?, quote(referenced)?))
        })
        .collect::<Result<Vec<String>>>()?;
    Ok(parts.join(" AND "))
}

/// Predicate excluding rows with a NULL in any local FK column; those are
/// the not-null check's responsibility.
fn fk_not_null_predicate(fk: &ForeignKeyDescriptor) -> Result<String> {
    let parts = fk
        .columns
        .iter()
        .map(|c| Ok(format!("s.{} IS NOT NULL", quote(c)?)))
        .collect::<Result<Vec<String>>>()?;
    Ok(parts.join(" AND "))
}

/// Count staging rows whose non-NULL local columns have no match in the
/// referenced table.
fn fk_count_query(d: &TableDescriptor, fk: &ForeignKeyDescriptor) -> Result<String> {
    Ok(format!(
        "SELECT count(*) FROM {stg} AS s \
         LEFT JOIN {reference} AS u ON {join} \
         WHERE u.{first_ref} IS NULL AND {not_null}",
        stg = d.staging_ident()?,
        reference = crate::core::identifier::qualify(&fk.ref_schema, &fk.ref_table)?,
        join = fk_join_predicate(fk)?,
        first_ref = quote(&fk.ref_columns[0])?,
        not_null = fk_not_null_predicate(fk)?,
    ))
}

/// Violating FK value groups for display, text-cast and bounded.
fn fk_sample_query(
    d: &TableDescriptor,
    fk: &ForeignKeyDescriptor,
    limit: usize,
) -> Result<String> {
    let select_list = fk
        .columns
        .iter()
        .map(|c| Ok(format!("s.{q}::text AS {q}", q = quote(c)?)))
        .collect::<Result<Vec<String>>>()?
        .join(", ");
    let group_list = fk
        .columns
        .iter()
        .map(|c| Ok(format!("s.{}", quote(c)?)))
        .collect::<Result<Vec<String>>>()?
        .join(", ");
    Ok(format!(
        "SELECT {sel}, count(*)::text AS nrows FROM {stg} AS s \
         LEFT JOIN {reference} AS u ON {join} \
         WHERE u.{first_ref} IS NULL AND {not_null} \
         GROUP BY {group} ORDER BY {group} LIMIT {limit}",
        sel = select_list,
        stg = d.staging_ident()?,
        reference = crate::core::identifier::qualify(&fk.ref_schema, &fk.ref_table)?,
        join = fk_join_predicate(fk)?,
        first_ref = quote(&fk.ref_columns[0])?,
        not_null = fk_not_null_predicate(fk)?,
        group = group_list,
    ))
}

/// Count staging rows where the constraint predicate is FALSE. A NULL
/// result is not a violation, mirroring how the database enforces CHECK.
fn ck_count_query(d: &TableDescriptor, ck: &CheckConstraintDescriptor) -> Result<String> {
    Ok(format!(
        "SELECT count(*) FROM {stg} WHERE NOT ({expr})",
        stg = d.staging_ident()?,
        expr = ck.expression,
    ))
}

/// Runs the four check families and accumulates findings in the control
/// table.
pub struct QaEngine<'a> {
    session: &'a PgSession,
    prompter: &'a dyn Prompter,
}

impl<'a> QaEngine<'a> {
    pub fn new(session: &'a PgSession, prompter: &'a dyn Prompter) -> Self {
        Self { session, prompter }
    }

    /// Run all four families over all tables in configuration order.
    /// Returns whether QA passed (no error field set anywhere).
    pub async fn qa_all(
        &self,
        descriptors: &[TableDescriptor],
        control: &mut ControlTable,
    ) -> Result<bool> {
        for d in descriptors {
            self.qa_one_null(d, control).await?;
            self.qa_one_pk(d, control).await?;
            self.qa_one_fk(d, control).await?;
            self.qa_one_ck(d, control).await?;
        }
        Ok(control.qa_passed())
    }

    /// Not-null check: count staging NULLs in each required column.
    pub async fn qa_one_null(
        &self,
        d: &TableDescriptor,
        control: &mut ControlTable,
    ) -> Result<()> {
        info!("Conducting not-null QA checks on table {}", d.staging_name());
        for column in &d.not_null_columns {
            debug!("  Checking column {} for nulls", column);
            let nulls = self.session.query_scalar(&null_count_query(d, column)?).await?;
            if nulls > 0 {
                warn!("    Column {} has {} null values", column, nulls);
                control.append_error(
                    &d.name,
                    ErrorFamily::Null,
                    &format!("{} ({})", column, nulls),
                )?;
            }
        }
        Ok(())
    }

    /// Primary-key check: look for duplicated key values in staging.
    pub async fn qa_one_pk(
        &self,
        d: &TableDescriptor,
        control: &mut ControlTable,
    ) -> Result<()> {
        if !d.has_pk() {
            info!(
                "Table {} has no primary key, skipping duplicate check",
                d.base_name()
            );
            return Ok(());
        }
        info!(
            "Conducting primary key QA checks on table {}",
            d.staging_name()
        );

        let row = self
            .session
            .query(&pk_summary_query(d)?)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                UpsertError::Invariant("duplicate key summary returned no row".to_string())
            })?;
        let dup_groups: i64 = row.try_get(0)?;
        let dup_rows: i64 = row.try_get(1)?;

        if dup_groups > 0 {
            let message = format!(
                "{} duplicate keys ({} rows) in table {}",
                dup_groups,
                dup_rows,
                d.staging_name()
            );
            warn!("    {}", message);
            control.append_error(&d.name, ErrorFamily::PrimaryKey, &message)?;

            if control.get(&d.name)?.interactive {
                let rows = self
                    .session
                    .query(&pk_sample_query(d, SAMPLE_ROW_LIMIT)?)
                    .await?;
                let sample = RowSample::from_rows(&rows)?;
                let decision =
                    self.prompter
                        .confirm("Duplicate key error", &message, Some(&sample))?;
                if decision == Decision::Cancel {
                    return Err(UpsertError::Cancelled);
                }
            }
        }
        Ok(())
    }

    /// Foreign-key check: staging rows whose non-NULL key tuples are absent
    /// from the referenced base table.
    pub async fn qa_one_fk(
        &self,
        d: &TableDescriptor,
        control: &mut ControlTable,
    ) -> Result<()> {
        info!(
            "Conducting foreign key QA checks on table {}",
            d.staging_name()
        );
        for fk in &d.foreign_keys {
            debug!("  Checking constraint {}", fk.name);
            let violations = self.session.query_scalar(&fk_count_query(d, fk)?).await?;
            if violations > 0 {
                let message = format!(
                    "Foreign key error referencing {}.{}",
                    fk.ref_schema, fk.ref_table
                );
                warn!("    {} ({} rows)", message, violations);
                control.append_error(
                    &d.name,
                    ErrorFamily::ForeignKey,
                    &format!("{} ({})", fk.name, violations),
                )?;

                if control.get(&d.name)?.interactive {
                    let rows = self
                        .session
                        .query(&fk_sample_query(d, fk, SAMPLE_ROW_LIMIT)?)
                        .await?;
                    let sample = RowSample::from_rows(&rows)?;
                    let decision = self.prompter.confirm("Foreign key error", &message, Some(&sample))?;
                    if decision == Decision::Cancel {
                        return Err(UpsertError::Cancelled);
                    }
                }
            }
        }
        Ok(())
    }

    /// Check-constraint check: staging rows where the declared predicate
    /// evaluates to FALSE.
    pub async fn qa_one_ck(
        &self,
        d: &TableDescriptor,
        control: &mut ControlTable,
    ) -> Result<()> {
        info!(
            "Conducting check constraint QA checks on table {}",
            d.staging_name()
        );
        for ck in &d.check_constraints {
            debug!("  Checking constraint {}", ck.name);
            let violations = self.session.query_scalar(&ck_count_query(d, ck)?).await?;
            if violations > 0 {
                warn!(
                    "    Check constraint {} has {} failing rows",
                    ck.name, violations
                );
                control.append_error(
                    &d.name,
                    ErrorFamily::Check,
                    &format!("{} ({})", ck.name, violations),
                )?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{book_authors_descriptor, books_descriptor};

    #[test]
    fn test_null_count_query() {
        let d = books_descriptor();
        assert_eq!(
            null_count_query(&d, "genre").unwrap(),
            "SELECT count(*) FROM \"staging\".\"books\" WHERE \"genre\" IS NULL"
        );
    }

    #[test]
    fn test_pk_summary_query_single_key() {
        let d = books_descriptor();
        assert_eq!(
            pk_summary_query(&d).unwrap(),
            "SELECT count(*), coalesce(sum(nrows), 0)::bigint \
             FROM (SELECT count(*) AS nrows FROM \"staging\".\"books\" \
             GROUP BY \"book_id\" HAVING count(*) > 1) AS dupes"
        );
    }

    #[test]
    fn test_pk_summary_query_composite_key() {
        let d = book_authors_descriptor();
        let sql = pk_summary_query(&d).unwrap();
        assert!(sql.contains("GROUP BY \"book_id\", \"author_id\""));
    }

    #[test]
    fn test_pk_sample_query() {
        let d = books_descriptor();
        assert_eq!(
            pk_sample_query(&d, 1000).unwrap(),
            "SELECT \"book_id\"::text AS \"book_id\", count(*)::text AS nrows \
             FROM \"staging\".\"books\" GROUP BY \"book_id\" \
             HAVING count(*) > 1 ORDER BY \"book_id\" LIMIT 1000"
        );
    }

    #[test]
    fn test_fk_count_query() {
        let d = books_descriptor();
        assert_eq!(
            fk_count_query(&d, &d.foreign_keys[0]).unwrap(),
            "SELECT count(*) FROM \"staging\".\"books\" AS s \
             LEFT JOIN \"public\".\"genres\" AS u ON s.\"genre\" = u.\"genre\" \
             WHERE u.\"genre\" IS NULL AND s.\"genre\" IS NOT NULL"
        );
    }

    #[test]
    fn test_fk_sample_query_bounded() {
        let d = books_descriptor();
        let sql = fk_sample_query(&d, &d.foreign_keys[0], 1000).unwrap();
        assert!(sql.starts_with("SELECT s.\"genre\"::text AS \"genre\", count(*)::text AS nrows"));
        assert!(sql.contains("GROUP BY s.\"genre\""));
        assert!(sql.ends_with("LIMIT 1000"));
    }

    #[test]
    fn test_fk_queries_multi_column() {
        let mut d = book_authors_descriptor();
        d.foreign_keys = vec![crate::catalog::ForeignKeyDescriptor {
            name: "composite_fkey".to_string(),
            columns: vec!["book_id".to_string(), "author_id".to_string()],
            ref_schema: "public".to_string(),
            ref_table: "contributions".to_string(),
            ref_columns: vec!["book".to_string(), "author".to_string()],
        }];
        let sql = fk_count_query(&d, &d.foreign_keys[0]).unwrap();
        assert!(sql.contains("ON s.\"book_id\" = u.\"book\" AND s.\"author_id\" = u.\"author\""));
        assert!(sql.contains(
            "WHERE u.\"book\" IS NULL AND s.\"book_id\" IS NOT NULL AND s.\"author_id\" IS NOT NULL"
        ));
    }

    #[test]
    fn test_ck_count_query_substitutes_expression_verbatim() {
        let d = books_descriptor();
        assert_eq!(
            ck_count_query(&d, &d.check_constraints[0]).unwrap(),
            "SELECT count(*) FROM \"staging\".\"books\" WHERE NOT (length(book_title) > 0)"
        );
    }

    #[test]
    fn test_queries_reject_hostile_catalog_names() {
        let mut d = books_descriptor();
        d.not_null_columns = vec!["x\"; DROP TABLE y".to_string()];
        assert!(null_count_query(&d, &d.not_null_columns[0]).is_err());

        let mut d = books_descriptor();
        d.foreign_keys[0].ref_table = "genres; --".to_string();
        assert!(fk_count_query(&d, &d.foreign_keys[0]).is_err());
    }
}

//! Catalog introspection: constraint discovery for base-schema tables and
//! shape verification of their staging counterparts.
//!
//! Everything here reads `information_schema` and `pg_catalog` with
//! parameterized queries; the resulting descriptors are the read-only input
//! to the QA and upsert engines.

use tracing::debug;

use crate::config::Config;
use crate::core::identifier::qualify;
use crate::db::PgSession;
use crate::error::{Result, UpsertError};

/// A foreign key declared on a base table.
#[derive(Debug, Clone)]
pub struct ForeignKeyDescriptor {
    /// Constraint name.
    pub name: String,

    /// Referencing columns, in constraint ordinal order.
    pub columns: Vec<String>,

    /// Referenced schema.
    pub ref_schema: String,

    /// Referenced table.
    pub ref_table: String,

    /// Referenced columns, paired positionally with `columns`.
    pub ref_columns: Vec<String>,
}

/// A check constraint declared on a base table.
#[derive(Debug, Clone)]
pub struct CheckConstraintDescriptor {
    /// Constraint name.
    pub name: String,

    /// Predicate expression with the `CHECK (...)` wrapper stripped.
    pub expression: String,
}

/// Everything the QA and upsert engines need to know about one configured
/// table. Built once at run start, read-only thereafter.
#[derive(Debug, Clone)]
pub struct TableDescriptor {
    /// Table name (same in both schemas).
    pub name: String,

    /// Base schema.
    pub base_schema: String,

    /// Staging schema.
    pub staging_schema: String,

    /// All base-table columns in ordinal order. QA checks see the full list.
    pub columns: Vec<String>,

    /// Columns participating in DML: `columns` minus the configured
    /// exclusions. Each is verified to exist in the staging table.
    pub dml_columns: Vec<String>,

    /// Primary-key columns in key order. Empty when the table has no PK.
    pub primary_key: Vec<String>,

    /// NOT NULL columns without a default, minus the configured exemptions.
    pub not_null_columns: Vec<String>,

    /// Foreign keys declared on the base table.
    pub foreign_keys: Vec<ForeignKeyDescriptor>,

    /// Check constraints declared on the base table.
    pub check_constraints: Vec<CheckConstraintDescriptor>,
}

impl TableDescriptor {
    /// Quoted, schema-qualified base-table identifier.
    pub fn base_ident(&self) -> Result<String> {
        qualify(&self.base_schema, &self.name)
    }

    /// Quoted, schema-qualified staging-table identifier.
    pub fn staging_ident(&self) -> Result<String> {
        qualify(&self.staging_schema, &self.name)
    }

    /// Unquoted `schema.table` staging name for messages.
    pub fn staging_name(&self) -> String {
        format!("{}.{}", self.staging_schema, self.name)
    }

    /// Unquoted `schema.table` base name for messages.
    pub fn base_name(&self) -> String {
        format!("{}.{}", self.base_schema, self.name)
    }

    pub fn has_pk(&self) -> bool {
        !self.primary_key.is_empty()
    }

    /// DML columns that are not part of the primary key; the SET list of a
    /// synthesized UPDATE.
    pub fn update_set_columns(&self) -> Vec<String> {
        self.dml_columns
            .iter()
            .filter(|c| !self.primary_key.contains(c))
            .cloned()
            .collect()
    }
}

/// Reads system catalogs for one session.
pub struct CatalogInspector<'a> {
    session: &'a PgSession,
}

impl<'a> CatalogInspector<'a> {
    pub fn new(session: &'a PgSession) -> Self {
        Self { session }
    }

    /// Check whether a base table exists in the given schema.
    pub async fn table_exists(&self, schema: &str, table: &str) -> Result<bool> {
        let query = r#"
            SELECT count(*)
            FROM information_schema.tables
            WHERE table_schema = $1
              AND table_name = $2
              AND table_type = 'BASE TABLE'
        "#;
        let row = self
            .session
            .query_one_params(query, &[&schema, &table])
            .await?;
        Ok(row.try_get::<_, i64>(0)? > 0)
    }

    /// Column names of a table in ordinal order.
    pub async fn columns(&self, schema: &str, table: &str) -> Result<Vec<String>> {
        let query = r#"
            SELECT column_name::text
            FROM information_schema.columns
            WHERE table_schema = $1 AND table_name = $2
            ORDER BY ordinal_position
        "#;
        let rows = self.session.query_params(query, &[&schema, &table]).await?;
        rows.iter()
            .map(|r| r.try_get::<_, String>(0).map_err(UpsertError::from))
            .collect()
    }

    /// Primary-key columns of a table, in key order.
    pub async fn primary_key(&self, schema: &str, table: &str) -> Result<Vec<String>> {
        let query = r#"
            SELECT a.attname::text
            FROM pg_catalog.pg_constraint c
            JOIN pg_catalog.pg_class t ON t.oid = c.conrelid
            JOIN pg_catalog.pg_namespace n ON n.oid = t.relnamespace
            JOIN pg_catalog.pg_attribute a ON a.attrelid = t.oid
            WHERE n.nspname = $1
              AND t.relname = $2
              AND c.contype = 'p'
              AND a.attnum = ANY(c.conkey)
            ORDER BY array_position(c.conkey, a.attnum)
        "#;
        let rows = self.session.query_params(query, &[&schema, &table]).await?;
        rows.iter()
            .map(|r| r.try_get::<_, String>(0).map_err(UpsertError::from))
            .collect()
    }

    /// Columns declared NOT NULL without a default expression. Columns with
    /// a default are filled on write and are not a staging-data problem.
    pub async fn not_null_columns(&self, schema: &str, table: &str) -> Result<Vec<String>> {
        let query = r#"
            SELECT column_name::text
            FROM information_schema.columns
            WHERE table_schema = $1
              AND table_name = $2
              AND is_nullable = 'NO'
              AND column_default IS NULL
            ORDER BY ordinal_position
        "#;
        let rows = self.session.query_params(query, &[&schema, &table]).await?;
        rows.iter()
            .map(|r| r.try_get::<_, String>(0).map_err(UpsertError::from))
            .collect()
    }

    /// Foreign keys declared on a table, column pairs in constraint ordinal
    /// order.
    pub async fn foreign_keys(
        &self,
        schema: &str,
        table: &str,
    ) -> Result<Vec<ForeignKeyDescriptor>> {
        let query = r#"
            SELECT
                c.conname AS fk_name,
                array_agg(a.attname ORDER BY array_position(c.conkey, a.attnum)) AS columns,
                rn.nspname AS ref_schema,
                rt.relname AS ref_table,
                array_agg(ra.attname ORDER BY array_position(c.confkey, ra.attnum)) AS ref_columns
            FROM pg_catalog.pg_constraint c
            JOIN pg_catalog.pg_class t ON t.oid = c.conrelid
            JOIN pg_catalog.pg_namespace n ON n.oid = t.relnamespace
            JOIN pg_catalog.pg_class rt ON rt.oid = c.confrelid
            JOIN pg_catalog.pg_namespace rn ON rn.oid = rt.relnamespace
            JOIN pg_catalog.pg_attribute a ON a.attrelid = t.oid AND a.attnum = ANY(c.conkey)
            JOIN pg_catalog.pg_attribute ra ON ra.attrelid = rt.oid AND ra.attnum = ANY(c.confkey)
            WHERE n.nspname = $1
              AND t.relname = $2
              AND c.contype = 'f'
            GROUP BY c.conname, rn.nspname, rt.relname
            ORDER BY c.conname
        "#;
        let rows = self.session.query_params(query, &[&schema, &table]).await?;

        let mut fks = Vec::with_capacity(rows.len());
        for row in rows {
            fks.push(ForeignKeyDescriptor {
                name: row.try_get(0)?,
                columns: row.try_get(1)?,
                ref_schema: row.try_get(2)?,
                ref_table: row.try_get(3)?,
                ref_columns: row.try_get(4)?,
            });
        }
        Ok(fks)
    }

    /// Check constraints declared on a table. `pg_constraint` with
    /// `contype = 'c'` excludes the constraints PostgreSQL generates for
    /// NOT NULL columns.
    pub async fn check_constraints(
        &self,
        schema: &str,
        table: &str,
    ) -> Result<Vec<CheckConstraintDescriptor>> {
        let query = r#"
            SELECT c.conname, pg_get_constraintdef(c.oid)
            FROM pg_catalog.pg_constraint c
            JOIN pg_catalog.pg_class t ON t.oid = c.conrelid
            JOIN pg_catalog.pg_namespace n ON n.oid = t.relnamespace
            WHERE n.nspname = $1 AND t.relname = $2 AND c.contype = 'c'
            ORDER BY c.conname
        "#;
        let rows = self.session.query_params(query, &[&schema, &table]).await?;

        let mut constraints = Vec::with_capacity(rows.len());
        for row in rows {
            let name: String = row.try_get(0)?;
            let definition: String = row.try_get(1)?;
            constraints.push(CheckConstraintDescriptor {
                name,
                expression: strip_check_wrapper(&definition),
            });
        }
        Ok(constraints)
    }

    /// Build the descriptor for one configured table, enforcing the shape
    /// invariants: both tables exist, and every DML column of the base table
    /// is present in the staging table.
    pub async fn build_descriptor(
        &self,
        config: &Config,
        table: &str,
    ) -> Result<TableDescriptor> {
        if !self.table_exists(&config.base_schema, table).await? {
            return Err(UpsertError::Schema(format!(
                "Base table {}.{} does not exist",
                config.base_schema, table
            )));
        }
        if !self.table_exists(&config.staging_schema, table).await? {
            return Err(UpsertError::Schema(format!(
                "Staging table {}.{} does not exist",
                config.staging_schema, table
            )));
        }

        let columns = self.columns(&config.base_schema, table).await?;
        let staging_columns = self.columns(&config.staging_schema, table).await?;

        let dml_columns: Vec<String> = columns
            .iter()
            .filter(|c| !config.exclude_columns.contains(c))
            .cloned()
            .collect();
        let missing: Vec<&String> = dml_columns
            .iter()
            .filter(|c| !staging_columns.contains(c))
            .collect();
        if !missing.is_empty() {
            return Err(UpsertError::Schema(format!(
                "Staging table {}.{} is missing column(s) required for DML: {}",
                config.staging_schema,
                table,
                missing
                    .iter()
                    .map(|s| s.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            )));
        }

        let primary_key = self.primary_key(&config.base_schema, table).await?;
        if let Some(pk_col) = primary_key
            .iter()
            .find(|c| config.exclude_columns.contains(c))
        {
            return Err(UpsertError::Config(format!(
                "Cannot exclude primary key column '{}' of table {}",
                pk_col, table
            )));
        }

        let not_null_columns: Vec<String> = self
            .not_null_columns(&config.base_schema, table)
            .await?
            .into_iter()
            .filter(|c| !config.null_columns.contains(c))
            .collect();

        let foreign_keys = self.foreign_keys(&config.base_schema, table).await?;
        let check_constraints = self.check_constraints(&config.base_schema, table).await?;

        debug!(
            "Descriptor for {}.{}: {} columns, pk {:?}, {} not-null, {} fks, {} checks",
            config.base_schema,
            table,
            columns.len(),
            primary_key,
            not_null_columns.len(),
            foreign_keys.len(),
            check_constraints.len()
        );

        Ok(TableDescriptor {
            name: table.to_string(),
            base_schema: config.base_schema.clone(),
            staging_schema: config.staging_schema.clone(),
            columns,
            dml_columns,
            primary_key,
            not_null_columns,
            foreign_keys,
            check_constraints,
        })
    }
}

/// Strip the `CHECK (...)` wrapper from a `pg_get_constraintdef` result,
/// leaving the bare predicate expression.
fn strip_check_wrapper(definition: &str) -> String {
    let trimmed = definition.trim();
    let body = trimmed
        .strip_prefix("CHECK")
        .map(str::trim_start)
        .unwrap_or(trimmed);
    if body.starts_with('(') && body.ends_with(')') {
        body[1..body.len() - 1].trim().to_string()
    } else {
        body.to_string()
    }
}

//! Append-only Postgres hand-off for batch ingestion runs.

use std::fmt;

use anyhow::{Context, Result};
use dpt_core::PermitBatch;
use sqlx::postgres::{PgPool, PgPoolOptions};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid table name `{0}`: expected letters, digits and underscores, not starting with a digit")]
pub struct InvalidTableName(pub String);

/// A Postgres identifier safe to splice into DDL/DML: `[A-Za-z_][A-Za-z0-9_]*`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableName(String);

impl TableName {
    pub fn parse(raw: &str) -> Result<Self, InvalidTableName> {
        let mut chars = raw.chars();
        let valid_start = chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
        if valid_start && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
            Ok(Self(raw.to_string()))
        } else {
            Err(InvalidTableName(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn create_table_sql(table: &TableName) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            permit_id TEXT,
            state TEXT,
            operator TEXT,
            county_parish TEXT,
            well_name TEXT,
            permit_type TEXT,
            status TEXT,
            application_date DATE,
            approval_date DATE,
            expiration_date DATE,
            ingested_at_utc TIMESTAMPTZ
        )"
    )
}

fn insert_sql(table: &TableName) -> String {
    format!(
        "INSERT INTO {table} (
            permit_id, state, operator, county_parish, well_name, permit_type, status,
            application_date, approval_date, expiration_date, ingested_at_utc
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"
    )
}

/// Appends canonical rows plus their ingestion stamp. `days_to_expiry` is derived on read
/// and is not stored.
pub struct PgPermitSink {
    pool: PgPool,
    table: TableName,
}

impl PgPermitSink {
    pub async fn connect(database_url: &str, table: TableName) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .connect(database_url)
            .await
            .context("connecting to postgres")?;
        Ok(Self { pool, table })
    }

    pub fn table(&self) -> &TableName {
        &self.table
    }

    pub async fn ensure_table(&self) -> Result<()> {
        sqlx::query(&create_table_sql(&self.table))
            .execute(&self.pool)
            .await
            .with_context(|| format!("creating table {}", self.table))?;
        Ok(())
    }

    /// Append every record in one transaction; nothing is written if any insert fails.
    pub async fn append(&self, batch: &PermitBatch) -> Result<u64> {
        let sql = insert_sql(&self.table);
        let mut tx = self.pool.begin().await.context("beginning append transaction")?;
        let mut inserted = 0u64;
        for record in &batch.records {
            let result = sqlx::query(&sql)
                .bind(record.permit_id.as_deref())
                .bind(record.state.as_deref())
                .bind(record.operator.as_deref())
                .bind(record.county_parish.as_deref())
                .bind(record.well_name.as_deref())
                .bind(record.permit_type.as_deref())
                .bind(record.status.as_deref())
                .bind(record.application_date)
                .bind(record.approval_date)
                .bind(record.expiration_date)
                .bind(record.ingested_at_utc)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("inserting into {}", self.table))?;
            inserted += result.rows_affected();
        }
        tx.commit().await.context("committing append transaction")?;
        info!(table = %self.table, rows = inserted, "appended permits");
        Ok(inserted)
    }
}

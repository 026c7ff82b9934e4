//! Loader and writer for the `production_data` table.
//!
//! The loader reads the whole production history into memory. The writer
//! replaces the table in one transaction: build `production_data_next`, fill
//! it in chunks, swap it in, rebuild indexes and record the run. A failure at
//! any step rolls everything back, leaving the previous table in place.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::classifier::ClassificationSummary;
use crate::models::{ClassifiedRecord, ProductionRecord, RawProductionRow, ZeroWindow};

// ---

const STAGING_TABLE: &str = "production_data_next";

/// Columns written for every row ahead of the zero flags, with their array cast.
const BASE_COLUMNS: &[(&str, &str)] = &[
    ("file_no", "INT8[]"),
    ("api_no", "INT8[]"),
    ("pool", "TEXT[]"),
    ("date", "DATE[]"),
    ("bbls_oil", "FLOAT8[]"),
    ("bbls_water", "FLOAT8[]"),
    ("mcf_gas", "FLOAT8[]"),
    ("days_produced", "FLOAT8[]"),
    ("oil_sold", "FLOAT8[]"),
    ("mcf_sold", "FLOAT8[]"),
    ("mcf_flared", "FLOAT8[]"),
];

/// Secondary indexes rebuilt on every replacement, besides the flag indexes.
const BASE_INDEXES: &[(&str, &str)] = &[
    ("idx_file_no", "file_no"),
    ("idx_api_no", "api_no"),
    ("idx_date", "date"),
    ("idx_status", "status"),
];

/// Metadata recorded for one classification run.
///
/// The audit row's `finished_at` is taken inside the replacement transaction,
/// after the rows and indexes are written.
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    /// When the classifier handed its result to the writer.
    pub classified_at: DateTime<Utc>,
}

impl RunRecord {
    /// Completion time for the audit row; never earlier than `classified_at`.
    fn finished_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.max(self.classified_at)
    }
}

/// Read every production row.
///
/// The date column is read as text so unparseable values surface as undated
/// records instead of failing the whole load. Numeric columns are cast so an
/// importer that chose `NUMERIC` or `INTEGER` still loads. Rows come back in
/// a total order over every column, so the rewritten table keeps a stable
/// row order from run to run.
pub async fn load_production(pool: &PgPool) -> Result<Vec<ProductionRecord>> {
    // ---
    let rows: Vec<RawProductionRow> = sqlx::query_as(
        r#"
        SELECT
            file_no::int8            AS file_no,
            api_no::int8             AS api_no,
            pool,
            date::text               AS date_text,
            bbls_oil::float8         AS bbls_oil,
            bbls_water::float8       AS bbls_water,
            mcf_gas::float8          AS mcf_gas,
            days_produced::float8    AS days_produced,
            oil_sold::float8         AS oil_sold,
            mcf_sold::float8         AS mcf_sold,
            mcf_flared::float8       AS mcf_flared
        FROM production_data
        ORDER BY 1, 3, date NULLS LAST,
                 5 NULLS LAST, 2 NULLS LAST, 6 NULLS LAST, 7 NULLS LAST,
                 8 NULLS LAST, 9 NULLS LAST, 10 NULLS LAST, 11 NULLS LAST
        "#,
    )
    .fetch_all(pool)
    .await
    .context("Failed to load production_data")?;

    tracing::info!("Loaded {} production rows", rows.len());

    Ok(rows.into_iter().map(RawProductionRow::to_record).collect())
}

/// Replace `production_data` with the classified rows and record the run.
///
/// Only the zero-flag columns listed in `persisted_flags` are written.
pub async fn replace_production(
    pool: &PgPool,
    records: &[ClassifiedRecord],
    persisted_flags: &[ZeroWindow],
    chunk_rows: usize,
    summary: &ClassificationSummary,
    run: &RunRecord,
) -> Result<()> {
    // ---
    let mut tx = pool
        .begin()
        .await
        .context("Failed to start replacement transaction")?;

    create_staging_table(&mut tx, persisted_flags).await?;

    let insert_sql = insert_statement(persisted_flags);
    let chunk_rows = chunk_rows.max(1);
    for (n, chunk) in records.chunks(chunk_rows).enumerate() {
        insert_chunk(&mut tx, &insert_sql, chunk, persisted_flags)
            .await
            .with_context(|| format!("Failed to write chunk {} ({} rows)", n, chunk.len()))?;
        tracing::debug!("Wrote chunk {} ({} rows)", n, chunk.len());
    }

    sqlx::query("DROP TABLE IF EXISTS production_data")
        .execute(&mut *tx)
        .await
        .context("Failed to drop previous production_data")?;

    sqlx::query(&format!(
        "ALTER TABLE {} RENAME TO production_data",
        STAGING_TABLE
    ))
    .execute(&mut *tx)
    .await
    .context("Failed to swap in new production_data")?;

    create_indexes(&mut tx, persisted_flags).await?;
    record_run(&mut tx, summary, run).await?;

    tx.commit()
        .await
        .context("Failed to commit production_data replacement")?;

    tracing::info!(
        "Replaced production_data with {} rows (run {})",
        records.len(),
        run.run_id
    );
    Ok(())
}

async fn create_staging_table(
    tx: &mut Transaction<'_, Postgres>,
    persisted_flags: &[ZeroWindow],
) -> Result<()> {
    // ---
    let flag_columns: String = persisted_flags
        .iter()
        .map(|w| format!("            {}       BOOLEAN NOT NULL,\n", w.column()))
        .collect();

    sqlx::query(&format!("DROP TABLE IF EXISTS {}", STAGING_TABLE))
        .execute(&mut **tx)
        .await
        .context("Failed to drop stale staging table")?;

    sqlx::query(&format!(
        r#"
        CREATE TABLE {} (
            file_no           BIGINT           NOT NULL,
            api_no            BIGINT,
            pool              TEXT             NOT NULL,
            date              DATE,
            bbls_oil          DOUBLE PRECISION,
            bbls_water        DOUBLE PRECISION,
            mcf_gas           DOUBLE PRECISION,
            days_produced     DOUBLE PRECISION,
            oil_sold          DOUBLE PRECISION,
            mcf_sold          DOUBLE PRECISION,
            mcf_flared        DOUBLE PRECISION,
{}            status            TEXT             NOT NULL
        );
        "#,
        STAGING_TABLE, flag_columns
    ))
    .execute(&mut **tx)
    .await
    .context("Failed to create staging table")?;

    Ok(())
}

/// `INSERT ... SELECT * FROM UNNEST(...)` over one array bind per column.
fn insert_statement(persisted_flags: &[ZeroWindow]) -> String {
    // ---
    let columns: Vec<(&str, &str)> = BASE_COLUMNS
        .iter()
        .copied()
        .chain(persisted_flags.iter().map(|w| (w.column(), "BOOL[]")))
        .chain(std::iter::once(("status", "TEXT[]")))
        .collect();

    let names = columns
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(", ");
    let binds = columns
        .iter()
        .enumerate()
        .map(|(i, (_, cast))| format!("${}::{}", i + 1, cast))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "INSERT INTO {} ({}) SELECT * FROM UNNEST({})",
        STAGING_TABLE, names, binds
    )
}

async fn insert_chunk(
    tx: &mut Transaction<'_, Postgres>,
    insert_sql: &str,
    chunk: &[ClassifiedRecord],
    persisted_flags: &[ZeroWindow],
) -> Result<()> {
    // ---
    let column = |f: fn(&ProductionRecord) -> Option<f64>| -> Vec<Option<f64>> {
        chunk.iter().map(|r| f(&r.record)).collect()
    };

    let file_no: Vec<i64> = chunk.iter().map(|r| r.record.well_id).collect();
    let api_no: Vec<Option<i64>> = chunk.iter().map(|r| r.record.api_no).collect();
    let pools: Vec<String> = chunk.iter().map(|r| r.record.pool.clone()).collect();
    let dates: Vec<Option<NaiveDate>> = chunk.iter().map(|r| r.record.report_date).collect();
    let statuses: Vec<String> = chunk.iter().map(|r| r.status.as_str().to_string()).collect();

    let mut query = sqlx::query(insert_sql)
        .bind(file_no)
        .bind(api_no)
        .bind(pools)
        .bind(dates)
        .bind(column(|r| r.oil_volume))
        .bind(column(|r| r.carried.water_volume))
        .bind(column(|r| r.carried.gas_volume))
        .bind(column(|r| r.carried.days_produced))
        .bind(column(|r| r.carried.oil_sold))
        .bind(column(|r| r.carried.gas_sold))
        .bind(column(|r| r.carried.gas_flared));

    for window in persisted_flags {
        let flags: Vec<bool> = chunk.iter().map(|r| r.flags.get(*window)).collect();
        query = query.bind(flags);
    }

    query.bind(statuses).execute(&mut **tx).await?;
    Ok(())
}

async fn create_indexes(
    tx: &mut Transaction<'_, Postgres>,
    persisted_flags: &[ZeroWindow],
) -> Result<()> {
    // ---
    let flag_indexes = persisted_flags.iter().map(|w| (w.index_name(), w.column()));

    for (index, column) in BASE_INDEXES.iter().copied().chain(flag_indexes) {
        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS {} ON production_data ({})",
            index, column
        ))
        .execute(&mut **tx)
        .await
        .with_context(|| format!("Failed to create index {}", index))?;
    }

    Ok(())
}

async fn record_run(
    tx: &mut Transaction<'_, Postgres>,
    summary: &ClassificationSummary,
    run: &RunRecord,
) -> Result<()> {
    // ---
    sqlx::query(
        r#"
        INSERT INTO classification_runs (
            run_id, started_at, classified_at, finished_at,
            row_count, group_count, undated_count, status_counts
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(run.run_id)
    .bind(run.started_at)
    .bind(run.classified_at)
    .bind(run.finished_at(Utc::now()))
    .bind(summary.row_count as i64)
    .bind(summary.group_count as i64)
    .bind(summary.undated_count as i64)
    .bind(summary.status_counts_json())
    .execute(&mut **tx)
    .await
    .context("Failed to record classification run")?;

    Ok(())
}

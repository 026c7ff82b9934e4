//! Database schema management for `codemetal-wellstatus`.
//!
//! Ensures the production table and the run audit table exist before a
//! classification run or the query service starts. Applied once on startup
//! from `main.rs`.

use anyhow::Result;
use sqlx::PgPool;

// ---

/// Create the database schema if missing (idempotent).
///
/// `production_data` is normally filled by the importer and replaced wholesale
/// by each classification run; creating it here only lets a fresh database
/// load an empty history. `classification_runs` keeps one row per run.
///
/// Errors are propagated if any SQL execution fails.
pub async fn create_schema(pool: &PgPool) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    // Monthly production history, one row per (file_no, pool, date)
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS production_data (
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
            no_prod_1m        BOOLEAN,
            no_prod_2m        BOOLEAN,
            status            TEXT
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Audit trail of classification runs
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS classification_runs (
            run_id            UUID PRIMARY KEY,
            started_at        TIMESTAMPTZ NOT NULL,
            classified_at     TIMESTAMPTZ,
            finished_at       TIMESTAMPTZ NOT NULL,
            row_count         BIGINT      NOT NULL,
            group_count       BIGINT      NOT NULL,
            undated_count     BIGINT      NOT NULL,
            status_counts     JSONB       NOT NULL
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Audit tables created before classified_at was recorded
    sqlx::query(
        r#"
        ALTER TABLE classification_runs
            ADD COLUMN IF NOT EXISTS classified_at TIMESTAMPTZ;
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Indexes for the ingest-time table; replacements rebuild their own
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_api_no
            ON production_data (api_no);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_date
            ON production_data (date);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

//! Read-back checks over the stored classification result.
//!
//! Runs after `classify` against whatever is in `production_data` now: the
//! status distribution, the zero-flag cross-tab, the statuses carried by
//! two-month-dry rows and the recent history of one sample well per status.
//! [`VerificationReport::problems`] turns the counts into consistency
//! failures; an empty list means the table agrees with the status rules.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use sqlx::PgPool;

use crate::models::{WellStatus, ZeroWindow};

// ---

/// Number of recent months shown for a sample well, per status.
const SAMPLE_MONTHS: &[(WellStatus, i64)] = &[(WellStatus::Abandoned, 10), (WellStatus::Active, 5)];

/// Statuses a row may carry when its two-month window is all zero.
const TWO_MONTH_STATUSES: [WellStatus; 3] = [
    WellStatus::InactiveTwoMonths,
    WellStatus::Inactive,
    WellStatus::Abandoned,
];

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}

/// One cell of the `no_prod_1m` × `no_prod_2m` cross-tab.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct FlagCell {
    pub no_prod_1m: Option<bool>,
    pub no_prod_2m: Option<bool>,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct SampleMonth {
    pub date: Option<NaiveDate>,
    pub bbls_oil: Option<f64>,
    pub status: Option<String>,
}

/// Most recent months of one well that carries `status` somewhere.
#[derive(Debug, Clone, PartialEq)]
pub struct WellSample {
    pub status: WellStatus,
    pub well_id: i64,
    pub pool: String,
    pub months: Vec<SampleMonth>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VerificationReport {
    pub row_count: i64,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    /// Configured flag columns that the stored table does not have.
    pub missing_flag_columns: Vec<&'static str>,
    pub status_counts: Vec<StatusCount>,
    /// `None` when either flag column is absent.
    pub flag_counts: Option<Vec<FlagCell>>,
    /// Status distribution of rows with `no_prod_2m` set; `None` without the column.
    pub two_month_statuses: Option<Vec<StatusCount>>,
    /// Dated rows with positive oil whose status is not `A`.
    pub producing_not_active: i64,
    pub samples: Vec<WellSample>,
}

/// Query the stored table and assemble the report.
pub async fn verify_production(pool: &PgPool, expected_flags: &[ZeroWindow]) -> Result<VerificationReport> {
    // ---
    let columns: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT column_name::text
        FROM information_schema.columns
        WHERE table_schema = current_schema()
          AND table_name = 'production_data'
        "#,
    )
    .fetch_all(pool)
    .await
    .context("Failed to list production_data columns")?;

    let has = |window: ZeroWindow| columns.iter().any(|c| c == window.column());

    let (row_count, first_date, last_date): (i64, Option<NaiveDate>, Option<NaiveDate>) =
        sqlx::query_as("SELECT COUNT(*), MIN(date), MAX(date) FROM production_data")
            .fetch_one(pool)
            .await
            .context("Failed to count production_data")?;

    let status_counts: Vec<StatusCount> = sqlx::query_as(
        r#"
        SELECT COALESCE(status, 'Unknown') AS status, COUNT(*) AS count
        FROM production_data
        GROUP BY 1
        ORDER BY 2 DESC, 1
        "#,
    )
    .fetch_all(pool)
    .await
    .context("Failed to read status distribution")?;

    let flag_counts = if has(ZeroWindow::OneMonth) && has(ZeroWindow::TwoMonths) {
        let cells: Vec<FlagCell> = sqlx::query_as(
            r#"
            SELECT no_prod_1m, no_prod_2m, COUNT(*) AS count
            FROM production_data
            GROUP BY 1, 2
            ORDER BY 1, 2
            "#,
        )
        .fetch_all(pool)
        .await
        .context("Failed to read zero flag counts")?;
        Some(cells)
    } else {
        None
    };

    let two_month_statuses = if has(ZeroWindow::TwoMonths) {
        let counts: Vec<StatusCount> = sqlx::query_as(
            r#"
            SELECT COALESCE(status, 'Unknown') AS status, COUNT(*) AS count
            FROM production_data
            WHERE no_prod_2m
            GROUP BY 1
            ORDER BY 2 DESC, 1
            "#,
        )
        .fetch_all(pool)
        .await
        .context("Failed to read statuses of two-month-dry rows")?;
        Some(counts)
    } else {
        None
    };

    // NaN compares greater than every number in Postgres
    let producing_not_active: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM production_data
        WHERE date IS NOT NULL
          AND bbls_oil > 0
          AND bbls_oil <> 'NaN'
          AND status IS DISTINCT FROM 'A'
        "#,
    )
    .fetch_one(pool)
    .await
    .context("Failed to check producing rows")?;

    let mut samples = Vec::new();
    for &(status, months) in SAMPLE_MONTHS {
        if let Some(sample) = fetch_sample(pool, status, months).await? {
            samples.push(sample);
        }
    }

    Ok(VerificationReport {
        row_count,
        first_date,
        last_date,
        missing_flag_columns: missing_flag_columns(&columns, expected_flags),
        status_counts,
        flag_counts,
        two_month_statuses,
        producing_not_active,
        samples,
    })
}

async fn fetch_sample(pool: &PgPool, status: WellStatus, months: i64) -> Result<Option<WellSample>> {
    // ---
    let well: Option<(i64, String)> = sqlx::query_as(
        "SELECT file_no::int8, pool FROM production_data WHERE status = $1 ORDER BY 1, 2 LIMIT 1",
    )
    .bind(status.as_str())
    .fetch_optional(pool)
    .await
    .with_context(|| format!("Failed to find a sample well for {}", status))?;

    let Some((well_id, pool_name)) = well else {
        return Ok(None);
    };

    let months: Vec<SampleMonth> = sqlx::query_as(
        r#"
        SELECT date, bbls_oil::float8 AS bbls_oil, status
        FROM production_data
        WHERE file_no = $1 AND pool = $2
        ORDER BY date DESC NULLS LAST
        LIMIT $3
        "#,
    )
    .bind(well_id)
    .bind(&pool_name)
    .bind(months)
    .fetch_all(pool)
    .await
    .with_context(|| format!("Failed to read history of well {} ({})", well_id, pool_name))?;

    Ok(Some(WellSample {
        status,
        well_id,
        pool: pool_name,
        months,
    }))
}

fn missing_flag_columns(columns: &[String], expected: &[ZeroWindow]) -> Vec<&'static str> {
    // ---
    expected
        .iter()
        .map(|w| w.column())
        .filter(|name| !columns.iter().any(|c| c == name))
        .collect()
}

impl VerificationReport {
    /// Inconsistencies between the stored rows and the status rules.
    pub fn problems(&self) -> Vec<String> {
        // ---
        let mut problems = Vec::new();

        for column in &self.missing_flag_columns {
            problems.push(format!("configured column {} is missing", column));
        }

        for entry in &self.status_counts {
            if entry.status.parse::<WellStatus>().is_err() {
                problems.push(format!("{} rows carry unknown status '{}'", entry.count, entry.status));
            }
        }

        if self.producing_not_active > 0 {
            problems.push(format!(
                "{} producing rows are not marked A",
                self.producing_not_active
            ));
        }

        for cell in self.flag_counts.iter().flatten() {
            if cell.no_prod_2m == Some(true) && cell.no_prod_1m != Some(true) && cell.count > 0 {
                problems.push(format!("{} rows set no_prod_2m without no_prod_1m", cell.count));
            }
        }

        for entry in self.two_month_statuses.iter().flatten() {
            let allowed = TWO_MONTH_STATUSES.iter().any(|s| s.as_str() == entry.status);
            if !allowed && entry.count > 0 {
                problems.push(format!(
                    "{} rows with no_prod_2m set have status '{}'",
                    entry.count, entry.status
                ));
            }
        }

        problems
    }

    pub fn log_report(&self) {
        // ---
        tracing::info!(
            "production_data: {} rows, {} to {}",
            self.row_count,
            display_date(self.first_date),
            display_date(self.last_date)
        );

        tracing::info!("Status distribution:");
        for entry in &self.status_counts {
            tracing::info!("  {:<9}: {}", entry.status, entry.count);
        }

        match &self.flag_counts {
            Some(cells) => {
                tracing::info!("Zero flag counts (no_prod_1m, no_prod_2m):");
                for cell in cells {
                    tracing::info!("  {:?} {:?}: {}", cell.no_prod_1m, cell.no_prod_2m, cell.count);
                }
            }
            None => tracing::info!("Zero flag columns not stored, cross-tab skipped"),
        }

        if let Some(counts) = &self.two_month_statuses {
            tracing::info!("Status distribution where no_prod_2m is set:");
            for entry in counts {
                tracing::info!("  {:<9}: {}", entry.status, entry.count);
            }
        }

        for sample in &self.samples {
            tracing::info!(
                "Sample {} well: file_no {}, pool {}",
                sample.status,
                sample.well_id,
                sample.pool
            );
            for month in &sample.months {
                tracing::info!(
                    "  {}  oil={:?}  {}",
                    display_date(month.date),
                    month.bbls_oil,
                    month.status.as_deref().unwrap_or("-")
                );
            }
        }
    }
}

fn display_date(date: Option<NaiveDate>) -> String {
    date.map_or_else(|| "-".to_string(), |d| d.to_string())
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    fn count(status: &str, count: i64) -> StatusCount {
        StatusCount {
            status: status.to_string(),
            count,
        }
    }

    fn cell(one: bool, two: bool, count: i64) -> FlagCell {
        FlagCell {
            no_prod_1m: Some(one),
            no_prod_2m: Some(two),
            count,
        }
    }

    fn consistent_report() -> VerificationReport {
        // ---
        VerificationReport {
            row_count: 10,
            status_counts: vec![count("A", 4), count("IA 1 - A", 2), count("IA 2 - A", 2), count("IA", 1), count("AB", 1)],
            flag_counts: Some(vec![cell(false, false, 4), cell(true, false, 2), cell(true, true, 4)]),
            two_month_statuses: Some(vec![count("IA 2 - A", 2), count("IA", 1), count("AB", 1)]),
            ..Default::default()
        }
    }

    #[test]
    fn test_consistent_table_has_no_problems() {
        // ---
        assert!(consistent_report().problems().is_empty());
    }

    #[test]
    fn test_missing_flag_columns() {
        // ---
        let columns = vec!["file_no".to_string(), "no_prod_1m".to_string(), "status".to_string()];

        assert_eq!(
            missing_flag_columns(&columns, &[ZeroWindow::OneMonth, ZeroWindow::TwoMonths]),
            vec!["no_prod_2m"]
        );
        assert!(missing_flag_columns(&columns, &[]).is_empty());
    }

    #[test]
    fn test_flags_absent_skip_cross_checks() {
        // ---
        let report = VerificationReport {
            flag_counts: None,
            two_month_statuses: None,
            ..consistent_report()
        };
        assert!(report.problems().is_empty());
    }

    #[test]
    fn test_reports_each_inconsistency() {
        // ---
        let report = VerificationReport {
            missing_flag_columns: vec!["no_prod_6m"],
            status_counts: vec![count("A", 3), count("Dormant", 2)],
            producing_not_active: 1,
            flag_counts: Some(vec![cell(false, true, 3), cell(true, true, 0)]),
            two_month_statuses: Some(vec![count("IA", 5), count("IA 1 - A", 2)]),
            ..Default::default()
        };

        let problems = report.problems();

        assert_eq!(problems.len(), 5, "{:?}", problems);
        assert!(problems[0].contains("no_prod_6m"));
        assert!(problems[1].contains("'Dormant'"));
        assert!(problems[2].starts_with("1 producing rows"));
        assert!(problems[3].starts_with("3 rows set no_prod_2m"));
        assert!(problems[4].contains("'IA 1 - A'"));
    }

    #[test]
    fn test_unknown_status_is_a_valid_label() {
        // ---
        let report = VerificationReport {
            status_counts: vec![count("Unknown", 7)],
            ..Default::default()
        };
        assert!(report.problems().is_empty());
    }
}

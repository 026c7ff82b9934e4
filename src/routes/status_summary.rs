use anyhow::{anyhow, Result};
use axum::{
    extract::Query, extract::State, http::StatusCode, response::IntoResponse, routing::get, Json,
    Router,
};
use chrono::NaiveDate;
use serde::Serialize;
use sqlx::PgPool;
use tracing::{debug, error, info};

use super::AppState;
use crate::WellStatus;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/status/monthly", get(monthly_handler))
        .route("/status/filters", get(filters_handler))
}

/// Query parameters for the monthly status aggregation.
///
/// `pools` repeats once per pool (`pools=BAKKEN&pools=RED RIVER, B`), so pool
/// names may contain commas. `statuses` may repeat or be comma separated, as
/// no status label contains a comma. Blank values are ignored and an empty
/// list applies no filter.
#[derive(Debug, Default)]
pub struct MonthlyQuery {
    start: Option<String>,
    end: Option<String>,
    pools: Vec<String>,
    statuses: Vec<String>,
}

impl MonthlyQuery {
    /// Collect decoded `key=value` pairs; unrecognised keys are ignored.
    fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        // ---
        let mut query = Self::default();
        for (key, value) in pairs {
            match key.as_str() {
                "start" => query.start = Some(value),
                "end" => query.end = Some(value),
                "pools" => query.pools.push(value),
                "statuses" => query
                    .statuses
                    .extend(value.split(',').map(str::to_string)),
                _ => {}
            }
        }
        query
    }
}

/// Validated form of [`MonthlyQuery`].
#[derive(Debug, Default, PartialEq)]
struct MonthlyFilter {
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    pools: Option<Vec<String>>,
    statuses: Option<Vec<String>>,
}

/// One (month, status) bucket of the dashboard chart.
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct MonthlyStatusBucket {
    /// Calendar month as `YYYY-MM`.
    pub month: String,
    pub status: String,
    pub well_count: i64,
    pub total_oil: f64,
}

/// Values available to the dashboard's filter widgets.
#[derive(Debug, Serialize)]
pub struct FilterOptions {
    pub min_date: Option<NaiveDate>,
    pub max_date: Option<NaiveDate>,
    pub pools: Vec<String>,
    pub statuses: Vec<String>,
}

async fn monthly_handler(
    Query(pairs): Query<Vec<(String, String)>>,
    State((pool, _config)): State<AppState>,
) -> impl IntoResponse {
    // ---
    let params = MonthlyQuery::from_pairs(pairs);
    info!("GET /status/monthly - {:?}", params);

    let filter = match parse_filter(&params) {
        Ok(filter) => filter,
        Err(e) => {
            debug!("Rejected monthly query: {}", e);
            return (StatusCode::BAD_REQUEST, Json(e.to_string())).into_response();
        }
    };

    match fetch_monthly(&pool, &filter).await {
        Ok(buckets) => {
            debug!("GET /status/monthly - returning {} buckets", buckets.len());
            (StatusCode::OK, Json(buckets)).into_response()
        }
        Err(e) => {
            error!("Failed to aggregate monthly status: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json("Failed to aggregate production data"),
            )
                .into_response()
        }
    }
}

async fn filters_handler(State((pool, _config)): State<AppState>) -> impl IntoResponse {
    // ---
    info!("GET /status/filters");

    match fetch_filter_options(&pool).await {
        Ok(options) => (StatusCode::OK, Json(options)).into_response(),
        Err(e) => {
            error!("Failed to load filter options: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json("Failed to load filter options"),
            )
                .into_response()
        }
    }
}

// ---

fn parse_filter(params: &MonthlyQuery) -> Result<MonthlyFilter> {
    // ---
    let start = params.start.as_deref().map(parse_day).transpose()?;
    let end = params.end.as_deref().map(parse_day).transpose()?;

    if let (Some(start), Some(end)) = (start, end) {
        if start > end {
            return Err(anyhow!("start {} is after end {}", start, end));
        }
    }

    let pools = non_blank(&params.pools);
    let statuses = non_blank(&params.statuses)
        .map(|labels| {
            labels
                .iter()
                .map(|label| label.parse::<WellStatus>().map(|s| s.as_str().to_string()))
                .collect::<Result<Vec<_>>>()
        })
        .transpose()?;

    Ok(MonthlyFilter {
        start,
        end,
        pools,
        statuses,
    })
}

fn parse_day(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|e| anyhow!("Invalid date '{}', expected YYYY-MM-DD: {}", value, e))
}

/// Trimmed non-blank values; `None` when nothing remains.
fn non_blank(values: &[String]) -> Option<Vec<String>> {
    // ---
    let items: Vec<String> = values
        .iter()
        .map(|item| item.trim())
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect();

    (!items.is_empty()).then_some(items)
}

async fn fetch_monthly(pool: &PgPool, filter: &MonthlyFilter) -> Result<Vec<MonthlyStatusBucket>, sqlx::Error> {
    // ---
    sqlx::query_as::<_, MonthlyStatusBucket>(
        r#"
        SELECT
            to_char(date_trunc('month', date), 'YYYY-MM') AS month,
            COALESCE(status, 'Unknown')                   AS status,
            COUNT(*)                                      AS well_count,
            COALESCE(SUM(bbls_oil) FILTER (WHERE bbls_oil <> 'NaN'), 0)::float8
                                                          AS total_oil
        FROM production_data
        WHERE date IS NOT NULL
          AND ($1::date   IS NULL OR date >= $1)
          AND ($2::date   IS NULL OR date <= $2)
          AND ($3::text[] IS NULL OR pool = ANY($3))
          AND ($4::text[] IS NULL OR COALESCE(status, 'Unknown') = ANY($4))
        GROUP BY 1, 2
        ORDER BY 1, 2
        "#,
    )
    .bind(filter.start)
    .bind(filter.end)
    .bind(filter.pools.as_deref())
    .bind(filter.statuses.as_deref())
    .fetch_all(pool)
    .await
}

async fn fetch_filter_options(pool: &PgPool) -> Result<FilterOptions, sqlx::Error> {
    // ---
    let (min_date, max_date): (Option<NaiveDate>, Option<NaiveDate>) =
        sqlx::query_as("SELECT MIN(date), MAX(date) FROM production_data")
            .fetch_one(pool)
            .await?;

    let pools: Vec<String> =
        sqlx::query_scalar("SELECT DISTINCT pool FROM production_data ORDER BY pool")
            .fetch_all(pool)
            .await?;

    let statuses: Vec<String> = sqlx::query_scalar(
        "SELECT DISTINCT COALESCE(status, 'Unknown') FROM production_data ORDER BY 1",
    )
    .fetch_all(pool)
    .await?;

    Ok(FilterOptions {
        min_date,
        max_date,
        pools,
        statuses,
    })
}

//! Application entry point for `codemetal-wellstatus`.
//!
//! Two subcommands share one startup sequence (configuration from the
//! environment or `.env`, structured logging, a PostgreSQL pool and schema
//! bootstrap):
//! - `classify` – load the full production history, derive the per-month well
//!   status and zero-production flags, and replace `production_data` with the
//!   augmented table
//! - `verify` – read the stored result back and check it against the status
//!   rules
//! - `serve` – run the HTTP query service used by the production dashboard
//!
//! Only `classify` and `serve` bootstrap the schema; `classify --dry-run` and
//! `verify` never write.
//!
//! # Environment Variables
//! - `DATABASE_URL` (**required**) – PostgreSQL connection string
//! - `DB_POOL_MAX` (optional) – maximum number of DB connections (default: 5)
//! - `APP_LOG_LEVEL` (optional) – log verbosity (default: `info`)
//! - `APP_SPAN_EVENTS` (optional) – span event mode for tracing
//!
//! See `config` for the remaining knobs.
use std::env;

use anyhow::{Context, Result};
use axum::Router;
use chrono::Utc;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use is_terminal::IsTerminal;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::Instrument;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use uuid::Uuid;

mod classifier;
mod config;
mod models;
mod routes;
mod schema;
mod store;
mod verify;

pub use config::Config;

// Re-exported for routes/*.rs so they depend on their parent module only.
pub use models::WellStatus;

use classifier::ClassifyOptions;
use store::RunRecord;

// ---

#[derive(Debug, Parser)]
#[command(name = "wellstatus", version, about = "Monthly well status classification")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Recompute status and zero flags for every row and replace the table.
    Classify {
        /// Classify and log the summary without writing anything.
        #[arg(long)]
        dry_run: bool,
    },
    /// Check the stored statuses and zero flags and show sample well histories.
    Verify,
    /// Serve the monthly status aggregation API.
    Serve,
}

impl Command {
    /// Whether the command may create missing tables before it runs.
    fn needs_schema(&self) -> bool {
        match self {
            Command::Classify { dry_run } => !dry_run,
            Command::Verify => false,
            Command::Serve => true,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    let cfg = config::load_from_env()?;
    cfg.log_config();

    tracing::info!("Attempting to connect to database: {}", config::mask_db_url(&cfg.db_url));

    let pool = PgPoolOptions::new()
        .max_connections(cfg.db_pool_max)
        .connect(&cfg.db_url)
        .await
        .map_err(|e| {
            anyhow::anyhow!(
                "Failed to connect to database '{}': {}",
                config::mask_db_url(&cfg.db_url),
                e
            )
        })?;

    tracing::info!("Successfully connected to database");

    if cli.command.needs_schema() {
        schema::create_schema(&pool).await?;
    }

    match cli.command {
        Command::Classify { dry_run } => run_classification(&pool, &cfg, dry_run).await,
        Command::Verify => run_verification(&pool, &cfg).await,
        Command::Serve => serve(pool, cfg).await,
    }
}

/// Loader → classifier → writer, once.
///
/// Storage failures abort the run with nothing committed; row-level data
/// problems only show up in the summary counts.
async fn run_classification(pool: &PgPool, cfg: &Config, dry_run: bool) -> Result<()> {
    // ---
    let run_id = Uuid::new_v4();
    let span = tracing::info_span!("classify", %run_id, dry_run);

    classify_and_write(pool, cfg, run_id, dry_run)
        .instrument(span)
        .await
}

async fn classify_and_write(pool: &PgPool, cfg: &Config, run_id: Uuid, dry_run: bool) -> Result<()> {
    // ---
    let started_at = Utc::now();

    let records = store::load_production(pool).await?;

    let options = ClassifyOptions {
        parallel_min_rows: cfg.parallel_min_rows,
    };
    let classification = tokio::task::spawn_blocking(move || classifier::classify(records, &options))
        .await
        .context("Classification task failed")?;

    classification.summary.log_summary();

    if dry_run {
        tracing::info!("Dry run, production_data left unchanged");
        return Ok(());
    }

    let run = RunRecord {
        run_id,
        started_at,
        classified_at: Utc::now(),
    };

    store::replace_production(
        pool,
        &classification.records,
        &cfg.persisted_flags,
        cfg.write_chunk_rows,
        &classification.summary,
        &run,
    )
    .await?;

    tracing::info!(
        "Classification run complete in {}s",
        (Utc::now() - started_at).num_seconds()
    );
    Ok(())
}

async fn run_verification(pool: &PgPool, cfg: &Config) -> Result<()> {
    // ---
    let report = verify::verify_production(pool, &cfg.persisted_flags).await?;
    report.log_report();

    let problems = report.problems();
    if problems.is_empty() {
        tracing::info!("production_data is consistent with the status rules");
        return Ok(());
    }

    for problem in &problems {
        tracing::error!("{}", problem);
    }
    anyhow::bail!("Verification found {} problem(s)", problems.len())
}

async fn serve(pool: PgPool, cfg: Config) -> Result<()> {
    // ---
    let addr = cfg.listen_addr;

    // Build app from routes gateway
    let app: Router = routes::router(pool, cfg);

    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ---

/// Initialize the global tracing subscriber for structured logging.
///
/// This function configures the [`tracing_subscriber`] with:
/// - Log target, file, and line number output enabled
/// - Color output controlled by TTY detection and `FORCE_COLOR` env var:
///   - `FORCE_COLOR=1|true|yes`: force colors on
///   - `FORCE_COLOR=0|false|no`: force colors off
///   - unset or other values: auto-detect TTY
/// - Span event emission mode controlled by the `APP_SPAN_EVENTS` env var:
///   - `"full"`       : emit ENTER, EXIT, and CLOSE events with timing
///   - `"enter_exit"` : emit ENTER and EXIT only
///   - unset or other values: emit CLOSE events only (default)
/// - Log level controlled by the `APP_LOG_LEVEL` env var
///
/// Called once at startup before any logging macros are invoked.
fn init_tracing() {
    // ---
    let span_events = match env::var("APP_SPAN_EVENTS").as_deref() {
        Ok("full") => FmtSpan::FULL,
        Ok("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    };

    // Determine if we should use colors
    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => std::io::stdout().is_terminal(),
    };

    // Use RUST_LOG if available, otherwise fall back to APP_LOG_LEVEL
    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match env::var("APP_LOG_LEVEL").ok().as_deref() {
            Some("trace") => "trace",
            Some("debug") => "debug",
            Some("info") => "info",
            Some("warn") => "warn",
            Some("error") => "error",
            _ => "info",
        };
        EnvFilter::new(format!("{level},sqlx::query=warn"))
    };

    tracing_subscriber::fmt()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}

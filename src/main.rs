use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

mod clock;
mod config;
mod correlate;
mod db;
mod deep_dive;
mod engine;
mod error;
mod logging;
mod matcher;
mod models;
mod prevention;
mod report;
mod selector;
mod server;
mod store;
mod tally;
mod timeline;
mod window;

use crate::clock::{Clock, FixedClock, SystemClock};
use crate::config::AppConfig;
use crate::engine::Analytics;
use crate::matcher::SubstringMatcher;
use crate::store::{MemoryStore, PgStore, RecordSource};
use crate::window::WindowQuery;

#[derive(Parser)]
#[command(name = "prevention-analytics")]
#[command(about = "Correlates customer issue reports with failed installation audits", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct WindowArgs {
    /// Inclusive lower bound on task creation (YYYY-MM-DD or RFC 3339)
    #[arg(long)]
    start_date: Option<String>,
    /// Inclusive upper bound on task creation (YYYY-MM-DD or RFC 3339)
    #[arg(long)]
    end_date: Option<String>,
    /// Read tasks from a CSV snapshot instead of Postgres
    #[arg(long, requires = "reports_csv")]
    tasks_csv: Option<PathBuf>,
    /// Read reports from a CSV snapshot instead of Postgres
    #[arg(long, requires = "tasks_csv")]
    reports_csv: Option<PathBuf>,
    /// Pin "now" for open-report ages (RFC 3339); defaults to the current time
    #[arg(long)]
    as_of: Option<DateTime<Utc>>,
}

impl WindowArgs {
    fn query(&self) -> WindowQuery {
        WindowQuery::new(self.start_date.clone(), self.end_date.clone())
    }

    fn clock(&self) -> Arc<dyn Clock> {
        match self.as_of {
            Some(instant) => Arc::new(FixedClock(instant)),
            None => Arc::new(SystemClock),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import quality tasks from a CSV file
    ImportTasks {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Import customer issue reports from a CSV file
    ImportReports {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Print prevention statistics as JSON
    Stats {
        #[command(flatten)]
        window: WindowArgs,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Print the score and checkpoint deep dive as JSON
    DeepDive {
        #[command(flatten)]
        window: WindowArgs,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Generate a markdown report
    Report {
        #[command(flatten)]
        window: WindowArgs,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Serve the prevention endpoints over HTTP
    Serve {
        #[arg(long)]
        bind: Option<SocketAddr>,
    },
}

async fn connect(config: &AppConfig) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(config.require_database_url()?)
        .await
        .context("failed to connect to Postgres")
}

fn analytics<S: RecordSource>(source: S, clock: Arc<dyn Clock>) -> Analytics<S> {
    Analytics::new(source, Arc::new(SubstringMatcher), clock)
}

fn emit_json<T: Serialize>(value: &T, out: Option<&Path>) -> anyhow::Result<()> {
    let body = serde_json::to_string_pretty(value)?;
    match out {
        Some(path) => {
            std::fs::write(path, body)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Written to {}.", path.display());
        }
        None => println!("{body}"),
    }
    Ok(())
}

/// What an analysis command writes once the snapshot is loaded.
enum Output<'a> {
    Stats(Option<&'a Path>),
    DeepDive(Option<&'a Path>),
    Report(&'a Path),
}

async fn run_report<S: RecordSource>(
    analytics: Analytics<S>,
    window: &WindowArgs,
    output: Output<'_>,
) -> anyhow::Result<()> {
    let query = window.query();
    match output {
        Output::Stats(out) => {
            let stats = analytics.prevention_stats(&query).await?;
            emit_json(&stats, out)
        }
        Output::DeepDive(out) => {
            let dive = analytics.deep_dive(&query).await?;
            emit_json(&dive, out)
        }
        Output::Report(out) => {
            let stats = analytics.prevention_stats(&query).await?;
            let dive = analytics.deep_dive(&query).await?;
            let report = report::build_report(
                window.start_date.as_deref(),
                window.end_date.as_deref(),
                &stats,
                &dive,
            );
            std::fs::write(out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
            Ok(())
        }
    }
}

async fn run_analysis(
    config: &AppConfig,
    window: &WindowArgs,
    output: Output<'_>,
) -> anyhow::Result<()> {
    match (&window.tasks_csv, &window.reports_csv) {
        (Some(tasks_csv), Some(reports_csv)) => {
            info!(
                tasks = %tasks_csv.display(),
                reports = %reports_csv.display(),
                "using CSV snapshot"
            );
            let store = MemoryStore::from_csv(tasks_csv, reports_csv)?;
            run_report(analytics(store, window.clock()), window, output).await
        }
        _ => {
            let store = PgStore::new(connect(config).await?);
            run_report(analytics(store, window.clock()), window, output).await
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::from_env()?;
    logging::init_tracing(&config.log_filter);

    match &cli.command {
        Commands::InitDb => {
            db::init_db(&connect(&config).await?).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&connect(&config).await?).await?;
            println!("Seed data inserted.");
        }
        Commands::ImportTasks { csv } => {
            let inserted = db::import_tasks_csv(&connect(&config).await?, csv).await?;
            println!("Inserted {inserted} tasks from {}.", csv.display());
        }
        Commands::ImportReports { csv } => {
            let inserted = db::import_reports_csv(&connect(&config).await?, csv).await?;
            println!("Inserted {inserted} reports from {}.", csv.display());
        }
        Commands::Stats { window, out } => {
            run_analysis(&config, window, Output::Stats(out.as_deref())).await?;
        }
        Commands::DeepDive { window, out } => {
            run_analysis(&config, window, Output::DeepDive(out.as_deref())).await?;
        }
        Commands::Report { window, out } => {
            run_analysis(&config, window, Output::Report(out.as_path())).await?;
        }
        Commands::Serve { bind } => {
            let store = PgStore::new(connect(&config).await?);
            let addr = bind.unwrap_or(config.bind);
            server::run(analytics(store, Arc::new(SystemClock)), addr).await?;
        }
    }

    Ok(())
}

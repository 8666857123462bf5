use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{SearchFilter, Transmission};
use crate::db::connection::{init_db, Database};
use crate::db::listings::{prune_listings, store_stats};
use crate::mailer::BrevoMailer;
use crate::pipeline::{run_once, AlertNotifier};
use crate::scraper::CarMaxScraper;

mod config;
mod db;
mod domain;
mod errors;
mod mailer;
mod pipeline;
mod scraper;

#[cfg(test)]
mod tests;

#[derive(Parser)]
#[command(name = "carscout")]
#[command(about = "CarMax listing watcher: scrape, dedup, email new matches")]
#[command(version)]
struct Cli {
    /// Path to the SQLite listings store
    #[arg(long, default_value = "listings.db")]
    db: PathBuf,

    /// Car make (e.g. BMW, Toyota)
    #[arg(long)]
    make: Option<String>,

    /// Car model (e.g. M2, Camry)
    #[arg(long)]
    model: Option<String>,

    /// Starting year for the search
    #[arg(long)]
    year_start: Option<i64>,

    /// Ending year for the search
    #[arg(long)]
    year_end: Option<i64>,

    /// Maximum mileage (no limit if not specified)
    #[arg(long)]
    max_miles: Option<i64>,

    /// Maximum price in dollars (no limit if not specified)
    #[arg(long)]
    max_price: Option<i64>,

    /// Transmission preference
    #[arg(long, value_enum)]
    transmission: Option<Transmission>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Delete listings not seen within the retention window
    Prune {
        /// Retention window in days
        #[arg(long, default_value_t = 30)]
        days: i64,
    },
    /// Show store counts
    Stats,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let db = Database::new(&cli.db);
    if let Err(e) = init_db(&db) {
        error!("❌ Database initialization failed: {e}");
        return ExitCode::from(1);
    }

    match cli.command {
        Some(Command::Prune { days }) => prune(&db, days),
        Some(Command::Stats) => stats(&db),
        None => run(&db, &cli),
    }
}

fn run(db: &Database, cli: &Cli) -> ExitCode {
    let filter = build_filter(cli);
    let start = Instant::now();

    let scraper = match CarMaxScraper::new() {
        Ok(s) => s,
        Err(e) => {
            error!("Scraper init failed: {e}");
            return ExitCode::from(1);
        }
    };

    let mailer = match BrevoMailer::from_env() {
        Ok(m) => Some(m),
        Err(e) => {
            warn!("Email notifications disabled: {e}");
            None
        }
    };
    let notifier = mailer.as_ref().map(|m| m as &dyn AlertNotifier);

    let report = match run_once(db, &scraper, notifier, &filter) {
        Ok(report) => report,
        Err(e) => {
            error!("❌ Run failed: {e}");
            return ExitCode::from(1);
        }
    };

    if let Ok(stats) = store_stats(db) {
        info!(
            "Store: {} listings total, {} awaiting notification",
            stats.total, stats.unnotified
        );
    }
    info!("Run completed in {:.2?}", start.elapsed());

    // Exit 2 tells the scheduler the pass finished but alerts are pending.
    if report.notify_deferred {
        ExitCode::from(2)
    } else {
        ExitCode::SUCCESS
    }
}

fn prune(db: &Database, days: i64) -> ExitCode {
    let cutoff = Utc::now().naive_utc() - Duration::days(days);
    match prune_listings(db, cutoff) {
        Ok(removed) => {
            info!("🧹 Pruned {removed} listings not seen in {days} days");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Prune failed: {e}");
            ExitCode::from(1)
        }
    }
}

fn stats(db: &Database) -> ExitCode {
    match store_stats(db) {
        Ok(stats) => {
            println!("total listings:        {}", stats.total);
            println!("awaiting notification: {}", stats.unnotified);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Stats failed: {e}");
            ExitCode::from(1)
        }
    }
}

fn build_filter(cli: &Cli) -> SearchFilter {
    let mut filter = SearchFilter::default();
    if let Some(make) = &cli.make {
        filter.make = make.clone();
    }
    if let Some(model) = &cli.model {
        filter.model = model.clone();
    }
    if let Some(year_start) = cli.year_start {
        filter.year_start = year_start;
    }
    if let Some(year_end) = cli.year_end {
        filter.year_end = year_end;
    }
    if let Some(max_miles) = cli.max_miles {
        filter.max_mileage = Some(max_miles);
    }
    if let Some(max_price) = cli.max_price {
        filter.max_price = Some(max_price);
    }
    if let Some(transmission) = cli.transmission {
        filter.transmission = transmission;
    }
    filter
}

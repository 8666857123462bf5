// src/pipeline.rs

use chrono::Utc;
use tracing::{info, warn};

use crate::config::SearchFilter;
use crate::db::connection::Database;
use crate::db::listings::{mark_notified, unnotified, upsert_listing};
use crate::domain::listing::{Classification, Listing, ListingRecord};
use crate::errors::RunError;
use crate::mailer::MailerError;
use crate::scraper::ScraperError;

/// Anything that can produce candidate listings for a filter. The error case
/// is distinct from an empty result on purpose: "the fetch broke" must never
/// read as "nothing matches".
pub trait ListingSource {
    fn fetch_listings(&self, filter: &SearchFilter) -> Result<Vec<Listing>, ScraperError>;
    fn source_name(&self) -> &'static str;
}

/// Delivers one alert for a whole batch. All-or-nothing: implementations must
/// not partially succeed, so that a clean return means every record was
/// covered.
pub trait AlertNotifier {
    fn notify(&self, batch: &[ListingRecord]) -> Result<(), MailerError>;
}

/// What one pipeline pass did.
#[derive(Debug, Default)]
pub struct RunReport {
    pub scraped: usize,
    pub new: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub notified: usize,
    /// True when matches are waiting but the alert could not be sent (or no
    /// notifier is configured). The batch is retried on the next run.
    pub notify_deferred: bool,
}

/// One pass of the detection pipeline: scrape, diff against the store,
/// alert on anything new, mark what was alerted.
///
/// A fetch failure aborts before any store mutation. A notify failure does
/// not abort: newly seen listings are already recorded, stay unnotified, and
/// are picked up by the next run's batch. That recovery also covers runs that
/// died between recording and notifying.
pub fn run_once(
    db: &Database,
    source: &dyn ListingSource,
    notifier: Option<&dyn AlertNotifier>,
    filter: &SearchFilter,
) -> Result<RunReport, RunError> {
    info!(
        "Scraping {} for {} {} ({}-{}, {})",
        source.source_name(),
        filter.make,
        filter.model,
        filter.year_start,
        filter.year_end,
        filter.transmission.as_str(),
    );

    let listings = source.fetch_listings(filter)?;

    let mut report = RunReport {
        scraped: listings.len(),
        ..RunReport::default()
    };

    let now = Utc::now().naive_utc();
    for listing in &listings {
        match upsert_listing(db, listing, now)? {
            Classification::New => {
                info!("🆕 New listing: {} ({})", listing.title, listing.url);
                report.new += 1;
            }
            Classification::Updated => report.updated += 1,
            Classification::Unchanged => report.unchanged += 1,
        }
    }
    info!(
        "Recorded {} listings: {} new, {} updated, {} unchanged",
        report.scraped, report.new, report.updated, report.unchanged
    );

    // Everything still awaiting an alert: this run's new rows plus leftovers
    // from any earlier run that recorded but never notified.
    let batch = unnotified(db)?;
    if batch.is_empty() {
        info!("No new listings to report");
        return Ok(report);
    }

    let Some(notifier) = notifier else {
        warn!(
            "Notifications disabled; {} listings pending for the next run",
            batch.len()
        );
        report.notify_deferred = true;
        return Ok(report);
    };

    info!("Sending alert for {} listings", batch.len());
    match notifier.notify(&batch) {
        Ok(()) => {
            for record in &batch {
                mark_notified(db, &record.url)?;
            }
            report.notified = batch.len();
            info!("✅ Alert sent and {} listings marked notified", batch.len());
        }
        Err(e) => {
            // Not fatal: the rows stay unnotified and ride the next batch.
            warn!("Alert failed, will retry next run: {e}");
            report.notify_deferred = true;
        }
    }

    Ok(report)
}

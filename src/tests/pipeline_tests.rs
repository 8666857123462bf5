use std::cell::RefCell;

use crate::config::SearchFilter;
use crate::db::listings::{get_listing, unnotified, upsert_listing};
use crate::domain::listing::{Listing, ListingRecord};
use crate::errors::RunError;
use crate::mailer::MailerError;
use crate::pipeline::{run_once, AlertNotifier, ListingSource};
use crate::scraper::ScraperError;
use crate::tests::utils::{default_filter, make_db, sample_listing, ts};

struct FakeSource {
    listings: Vec<Listing>,
    fail: bool,
}

impl FakeSource {
    fn returning(listings: Vec<Listing>) -> Self {
        Self {
            listings,
            fail: false,
        }
    }

    fn failing() -> Self {
        Self {
            listings: Vec::new(),
            fail: true,
        }
    }
}

impl ListingSource for FakeSource {
    fn fetch_listings(&self, _filter: &SearchFilter) -> Result<Vec<Listing>, ScraperError> {
        if self.fail {
            Err(ScraperError::Network("connection reset".to_string()))
        } else {
            Ok(self.listings.clone())
        }
    }

    fn source_name(&self) -> &'static str {
        "FakeSource"
    }
}

/// Records every batch it is asked to send, as lists of urls.
struct FakeNotifier {
    sent: RefCell<Vec<Vec<String>>>,
    fail: bool,
}

impl FakeNotifier {
    fn working() -> Self {
        Self {
            sent: RefCell::new(Vec::new()),
            fail: false,
        }
    }

    fn failing() -> Self {
        Self {
            sent: RefCell::new(Vec::new()),
            fail: true,
        }
    }

    fn batches(&self) -> Vec<Vec<String>> {
        self.sent.borrow().clone()
    }
}

impl AlertNotifier for FakeNotifier {
    fn notify(&self, batch: &[ListingRecord]) -> Result<(), MailerError> {
        if self.fail {
            return Err(MailerError::RequestFailed("smtp api down".to_string()));
        }
        self.sent
            .borrow_mut()
            .push(batch.iter().map(|r| r.url.clone()).collect());
        Ok(())
    }
}

#[test]
fn new_listing_is_notified_and_marked() {
    // The headline scenario: BMW M2, 2016-2019, manual; one fresh listing.
    let db = make_db();
    let listing = sample_listing("https://www.carmax.com/cars/200001");
    let source = FakeSource::returning(vec![listing.clone()]);
    let notifier = FakeNotifier::working();

    let report = run_once(&db, &source, Some(&notifier), &default_filter()).unwrap();

    assert_eq!(report.new, 1);
    assert_eq!(report.notified, 1);
    assert!(!report.notify_deferred);

    let batches = notifier.batches();
    assert_eq!(batches, vec![vec![listing.url.clone()]]);

    let record = get_listing(&db, &listing.url).unwrap().unwrap();
    assert!(record.notified);
}

#[test]
fn fetch_error_leaves_store_untouched() {
    let db = make_db();
    let source = FakeSource::failing();
    let notifier = FakeNotifier::working();

    let result = run_once(&db, &source, Some(&notifier), &default_filter());
    assert!(matches!(result, Err(RunError::Fetch(_))));

    assert!(unnotified(&db).unwrap().is_empty());
    assert!(notifier.batches().is_empty(), "no notification on fetch error");
}

#[test]
fn identical_second_run_does_not_renotify() {
    let db = make_db();
    let listing = sample_listing("https://www.carmax.com/cars/200002");
    let source = FakeSource::returning(vec![listing.clone()]);

    let first_notifier = FakeNotifier::working();
    let first = run_once(&db, &source, Some(&first_notifier), &default_filter()).unwrap();
    assert_eq!(first.new, 1);

    let second_notifier = FakeNotifier::working();
    let second = run_once(&db, &source, Some(&second_notifier), &default_filter()).unwrap();
    assert_eq!(second.new, 0);
    assert_eq!(second.unchanged, 1);
    assert_eq!(second.notified, 0);
    assert!(second_notifier.batches().is_empty());
}

#[test]
fn notify_failure_defers_batch_to_next_run() {
    let db = make_db();
    let listing = sample_listing("https://www.carmax.com/cars/200003");
    let source = FakeSource::returning(vec![listing.clone()]);

    let broken = FakeNotifier::failing();
    let first = run_once(&db, &source, Some(&broken), &default_filter()).unwrap();
    assert_eq!(first.new, 1);
    assert!(first.notify_deferred);
    assert!(!get_listing(&db, &listing.url).unwrap().unwrap().notified);

    // Next run: the same listing comes back unchanged, the batch goes out.
    let working = FakeNotifier::working();
    let second = run_once(&db, &source, Some(&working), &default_filter()).unwrap();
    assert_eq!(second.new, 0);
    assert_eq!(second.notified, 1);
    assert_eq!(working.batches(), vec![vec![listing.url.clone()]]);
    assert!(get_listing(&db, &listing.url).unwrap().unwrap().notified);
}

#[test]
fn crashed_run_is_recovered_from_unnotified_rows() {
    let db = make_db();
    // Simulate a run that recorded a listing and died before notifying.
    let orphan = sample_listing("https://www.carmax.com/cars/200004");
    upsert_listing(&db, &orphan, ts("2026-08-01 09:00:00")).unwrap();

    // The next scrape happens to return nothing at all.
    let source = FakeSource::returning(Vec::new());
    let notifier = FakeNotifier::working();
    let report = run_once(&db, &source, Some(&notifier), &default_filter()).unwrap();

    assert_eq!(report.new, 0);
    assert_eq!(report.notified, 1);
    assert_eq!(notifier.batches(), vec![vec![orphan.url.clone()]]);
    assert!(unnotified(&db).unwrap().is_empty());
}

#[test]
fn multiple_new_listings_share_one_batch() {
    let db = make_db();
    let a = sample_listing("https://www.carmax.com/cars/200005");
    let b = sample_listing("https://www.carmax.com/cars/200006");
    let source = FakeSource::returning(vec![a.clone(), b.clone()]);
    let notifier = FakeNotifier::working();

    let report = run_once(&db, &source, Some(&notifier), &default_filter()).unwrap();

    assert_eq!(report.new, 2);
    let batches = notifier.batches();
    assert_eq!(batches.len(), 1, "one alert per run, not per listing");
    assert_eq!(batches[0].len(), 2);
}

#[test]
fn missing_notifier_defers_without_failing() {
    let db = make_db();
    let listing = sample_listing("https://www.carmax.com/cars/200007");
    let source = FakeSource::returning(vec![listing.clone()]);

    let report = run_once(&db, &source, None, &default_filter()).unwrap();

    assert_eq!(report.new, 1);
    assert!(report.notify_deferred);
    assert!(!get_listing(&db, &listing.url).unwrap().unwrap().notified);
}

use chrono::NaiveDateTime;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::SearchFilter;
use crate::db::connection::{init_db, Database};
use crate::domain::listing::Listing;

/// Returns a fresh test database with the production schema applied,
/// backed by a throwaway file in the system temp dir.
pub fn make_db() -> Database {
    let path = std::env::temp_dir().join(format!(
        "carscout_test_{}.sqlite",
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ));
    let db = Database::new(path);
    init_db(&db).expect("Failed to initialize DB");
    db
}

/// A listing that matches the default BMW M2 manual filter.
pub fn sample_listing(url: &str) -> Listing {
    Listing {
        source: "CarMax".to_string(),
        title: "2017 BMW M2".to_string(),
        price: Some(45_998),
        mileage: Some(31_000),
        location: "Austin, TX".to_string(),
        url: url.to_string(),
        year: 2017,
        transmission: "6-speed manual".to_string(),
    }
}

pub fn ts(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
}

pub fn default_filter() -> SearchFilter {
    SearchFilter::default()
}

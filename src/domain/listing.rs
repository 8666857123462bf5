// src/domain/listing.rs

use chrono::NaiveDateTime;

/// One car listing as observed on the source site during a run.
///
/// `url` is the natural key: two observations with the same url are the same
/// listing, regardless of how the rest of the fields moved in between.
#[derive(Debug, Clone, PartialEq)]
pub struct Listing {
    pub source: String,
    pub title: String,
    pub price: Option<i64>,
    pub mileage: Option<i64>,
    pub location: String,
    pub url: String,
    pub year: i64,
    pub transmission: String,
}

/// A listing as persisted in the store, with lifecycle bookkeeping.
#[derive(Debug, Clone)]
pub struct ListingRecord {
    pub id: i64,
    pub source: String,
    pub title: String,
    pub price: Option<i64>,
    pub mileage: Option<i64>,
    pub location: String,
    pub url: String,
    pub year: i64,
    pub transmission: String,
    /// Set on first observation, never touched again.
    pub first_seen: NaiveDateTime,
    /// Advances on every re-observation.
    pub last_seen: NaiveDateTime,
    /// Flips false -> true once, after a confirmed alert send.
    pub notified: bool,
}

/// How an incoming observation relates to what the store already holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Url never seen before; a row was created.
    New,
    /// Known url with a changed price or mileage.
    Updated,
    /// Known url, tracked fields identical; only `last_seen` moved.
    Unchanged,
}

use chrono::NaiveDateTime;
use rusqlite::{params, OptionalExtension, Row};

use crate::db::connection::Database;
use crate::domain::listing::{Classification, Listing, ListingRecord};
use crate::errors::StoreError;

/// Record one observation of a listing.
///
/// Unknown url: inserts the row with `first_seen = last_seen = now` and
/// `notified = false`, and classifies it NEW. Known url: refreshes the
/// mutable fields and `last_seen`, and classifies UPDATED when the stored
/// price or mileage differ from the observation, UNCHANGED otherwise.
/// Runs in a transaction so a crash mid-call leaves no partial row.
pub fn upsert_listing(
    db: &Database,
    listing: &Listing,
    now: NaiveDateTime,
) -> Result<Classification, StoreError> {
    db.with_conn(|conn| {
        let tx = conn
            .transaction()
            .map_err(|e| StoreError::Db(e.to_string()))?;

        let existing: Option<(Option<i64>, Option<i64>)> = tx
            .query_row(
                "SELECT price, mileage FROM listings WHERE url = ?1",
                params![listing.url],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(|e| StoreError::Db(e.to_string()))?;

        let classification = match existing {
            None => {
                tx.execute(
                    r#"
                    INSERT INTO listings
                        (source, title, price, mileage, location, url, year,
                         transmission, first_seen, last_seen, notified)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 0)
                    "#,
                    params![
                        listing.source,
                        listing.title,
                        listing.price,
                        listing.mileage,
                        listing.location,
                        listing.url,
                        listing.year,
                        listing.transmission,
                        now,
                        now,
                    ],
                )
                .map_err(|e| StoreError::Db(e.to_string()))?;
                Classification::New
            }
            Some((stored_price, stored_mileage)) => {
                // first_seen and notified are deliberately untouched.
                tx.execute(
                    r#"
                    UPDATE listings
                    SET title = ?1,
                        price = ?2,
                        mileage = ?3,
                        location = ?4,
                        transmission = ?5,
                        last_seen = ?6
                    WHERE url = ?7
                    "#,
                    params![
                        listing.title,
                        listing.price,
                        listing.mileage,
                        listing.location,
                        listing.transmission,
                        now,
                        listing.url,
                    ],
                )
                .map_err(|e| StoreError::Db(e.to_string()))?;

                if stored_price != listing.price || stored_mileage != listing.mileage {
                    Classification::Updated
                } else {
                    Classification::Unchanged
                }
            }
        };

        tx.commit().map_err(|e| StoreError::Db(e.to_string()))?;
        Ok(classification)
    })
}

/// Flag a record as covered by a sent alert. Idempotent: marking an already
/// notified (or unknown) url is a no-op.
pub fn mark_notified(db: &Database, url: &str) -> Result<(), StoreError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE listings SET notified = 1 WHERE url = ?1",
            params![url],
        )
        .map_err(|e| StoreError::Db(e.to_string()))?;
        Ok(())
    })
}

/// All records still waiting for an alert, oldest first. This is the next
/// notification batch: fresh rows from this run plus anything a previous run
/// recorded but failed to send.
pub fn unnotified(db: &Database) -> Result<Vec<ListingRecord>, StoreError> {
    db.with_conn(|conn| {
        let mut stmt = conn
            .prepare(
                r#"
                SELECT id, source, title, price, mileage, location, url, year,
                       transmission, first_seen, last_seen, notified
                FROM listings
                WHERE notified = 0
                ORDER BY first_seen ASC
                "#,
            )
            .map_err(|e| StoreError::Db(e.to_string()))?;

        let rows = stmt
            .query_map([], record_from_row)
            .map_err(|e| StoreError::Db(e.to_string()))?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(|e| StoreError::Db(e.to_string()))?);
        }
        Ok(out)
    })
}

/// Fetch a single record by its url.
pub fn get_listing(db: &Database, url: &str) -> Result<Option<ListingRecord>, StoreError> {
    db.with_conn(|conn| {
        conn.query_row(
            r#"
            SELECT id, source, title, price, mileage, location, url, year,
                   transmission, first_seen, last_seen, notified
            FROM listings
            WHERE url = ?1
            "#,
            params![url],
            record_from_row,
        )
        .optional()
        .map_err(|e| StoreError::Db(e.to_string()))
    })
}

/// Delete records last seen before `cutoff`. Operator maintenance, never part
/// of the per-run pipeline. Returns the number of rows removed.
pub fn prune_listings(db: &Database, cutoff: NaiveDateTime) -> Result<usize, StoreError> {
    db.with_conn(|conn| {
        conn.execute(
            "DELETE FROM listings WHERE last_seen < ?1",
            params![cutoff],
        )
        .map_err(|e| StoreError::Db(e.to_string()))
    })
}

#[derive(Debug)]
pub struct StoreStats {
    pub total: i64,
    pub unnotified: i64,
}

pub fn store_stats(db: &Database) -> Result<StoreStats, StoreError> {
    db.with_conn(|conn| {
        let total = conn
            .query_row("SELECT COUNT(*) FROM listings", [], |row| row.get(0))
            .map_err(|e| StoreError::Db(e.to_string()))?;
        let unnotified = conn
            .query_row(
                "SELECT COUNT(*) FROM listings WHERE notified = 0",
                [],
                |row| row.get(0),
            )
            .map_err(|e| StoreError::Db(e.to_string()))?;
        Ok(StoreStats { total, unnotified })
    })
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<ListingRecord> {
    Ok(ListingRecord {
        id: row.get(0)?,
        source: row.get(1)?,
        title: row.get(2)?,
        price: row.get(3)?,
        mileage: row.get(4)?,
        location: row.get(5)?,
        url: row.get(6)?,
        year: row.get(7)?,
        transmission: row.get(8)?,
        first_seen: row.get(9)?,
        last_seen: row.get(10)?,
        notified: row.get(11)?,
    })
}

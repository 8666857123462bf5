use crate::domain::listing::ListingRecord;
use crate::mailer::{alert_html, fmt_thousands};
use crate::tests::utils::ts;

fn record(url: &str, price: Option<i64>) -> ListingRecord {
    ListingRecord {
        id: 1,
        source: "CarMax".to_string(),
        title: "2017 BMW M2".to_string(),
        price,
        mileage: Some(31_000),
        location: "Austin, TX".to_string(),
        url: url.to_string(),
        year: 2017,
        transmission: "6-speed manual".to_string(),
        first_seen: ts("2026-08-01 09:00:00"),
        last_seen: ts("2026-08-01 09:00:00"),
        notified: false,
    }
}

#[test]
fn fmt_thousands_groups_digits() {
    assert_eq!(fmt_thousands(0), "0");
    assert_eq!(fmt_thousands(999), "999");
    assert_eq!(fmt_thousands(1_000), "1,000");
    assert_eq!(fmt_thousands(45_998), "45,998");
    assert_eq!(fmt_thousands(1_234_567), "1,234,567");
}

#[test]
fn alert_html_lists_every_record() {
    let batch = vec![
        record("https://www.carmax.com/cars/1", Some(45_998)),
        record("https://www.carmax.com/cars/2", None),
    ];
    let html = alert_html(&batch);

    assert!(html.contains("2 new listings"));
    assert!(html.contains("https://www.carmax.com/cars/1"));
    assert!(html.contains("https://www.carmax.com/cars/2"));
    assert!(html.contains("$45,998"));
    assert!(html.contains("Price N/A"));
    assert!(html.contains("31,000 miles"));
    assert!(html.contains("6-speed manual"));
}

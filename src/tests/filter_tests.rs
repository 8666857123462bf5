use crate::config::{SearchFilter, Transmission};
use crate::tests::utils::sample_listing;

#[test]
fn manual_keywords_match_free_text() {
    let filter = SearchFilter::default();
    let keywords = &filter.transmission_keywords;

    assert!(Transmission::Manual.matches("6-speed manual", keywords));
    assert!(Transmission::Manual.matches("6 Speed", keywords));
    assert!(Transmission::Manual.matches("Stick Shift", keywords));
    assert!(!Transmission::Manual.matches("8-speed automatic", keywords));
    assert!(!Transmission::Manual.matches("", keywords));
}

#[test]
fn automatic_and_any_matching() {
    let keywords: Vec<String> = Vec::new();
    assert!(Transmission::Automatic.matches("8-Speed Automatic", &keywords));
    assert!(Transmission::Automatic.matches("Auto", &keywords));
    assert!(!Transmission::Automatic.matches("manual", &keywords));
    assert!(Transmission::Any.matches("whatever", &keywords));
    assert!(Transmission::Any.matches("", &keywords));
}

#[test]
fn year_range_is_inclusive() {
    let filter = SearchFilter::default();
    let mut listing = sample_listing("https://example.com/a");

    listing.year = 2016;
    listing.title = "2016 BMW M2".to_string();
    assert!(filter.matches(&listing));

    listing.year = 2019;
    listing.title = "2019 BMW M2".to_string();
    assert!(filter.matches(&listing));

    listing.year = 2015;
    listing.title = "2015 BMW M2".to_string();
    assert!(!filter.matches(&listing));

    listing.year = 2020;
    listing.title = "2020 BMW M2".to_string();
    assert!(!filter.matches(&listing));
}

#[test]
fn title_must_mention_make_and_model() {
    let filter = SearchFilter::default();
    let mut listing = sample_listing("https://example.com/b");

    listing.title = "2017 BMW M240i".to_string();
    assert!(filter.matches(&listing), "substring match, M240i contains M2");

    listing.title = "2017 BMW 340i".to_string();
    assert!(!filter.matches(&listing));

    listing.title = "2017 bmw m2 competition".to_string();
    assert!(filter.matches(&listing), "case-insensitive");
}

#[test]
fn price_and_mileage_limits() {
    let mut filter = SearchFilter::default();
    filter.max_price = Some(40_000);
    filter.max_mileage = Some(50_000);
    let mut listing = sample_listing("https://example.com/c");

    listing.price = Some(45_998);
    assert!(!filter.matches(&listing));

    listing.price = Some(39_500);
    listing.mileage = Some(60_000);
    assert!(!filter.matches(&listing));

    listing.mileage = Some(31_000);
    assert!(filter.matches(&listing));
}

#[test]
fn unknown_price_or_mileage_passes_limits() {
    let mut filter = SearchFilter::default();
    filter.max_price = Some(40_000);
    filter.max_mileage = Some(50_000);
    let mut listing = sample_listing("https://example.com/d");

    listing.price = None;
    listing.mileage = None;
    assert!(
        filter.matches(&listing),
        "limits only apply when the listing reports a value"
    );
}

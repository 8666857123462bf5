// src/config.rs

use clap::ValueEnum;

use crate::domain::listing::Listing;

/// Transmission texts that count as automatic. Manual keywords are
/// configurable on the filter because sellers phrase manuals many ways.
const AUTOMATIC_KEYWORDS: [&str; 2] = ["automatic", "auto"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Transmission {
    Manual,
    Automatic,
    Any,
}

impl Transmission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transmission::Manual => "manual",
            Transmission::Automatic => "automatic",
            Transmission::Any => "any",
        }
    }

    /// Matches a listing's free-text transmission description.
    pub fn matches(&self, text: &str, manual_keywords: &[String]) -> bool {
        let text = text.to_lowercase();
        match self {
            Transmission::Any => true,
            Transmission::Manual => manual_keywords
                .iter()
                .any(|kw| text.contains(&kw.to_lowercase())),
            Transmission::Automatic => {
                AUTOMATIC_KEYWORDS.iter().any(|kw| text.contains(kw))
            }
        }
    }
}

/// The search a run is looking for. Built once at startup from defaults plus
/// CLI overrides and passed explicitly into the pipeline; nothing here is
/// global state.
#[derive(Debug, Clone)]
pub struct SearchFilter {
    pub make: String,
    pub model: String,
    pub year_start: i64,
    pub year_end: i64,
    /// No mileage limit when None.
    pub max_mileage: Option<i64>,
    /// No price limit when None.
    pub max_price: Option<i64>,
    pub transmission: Transmission,
    /// Free-text fragments that identify a manual gearbox.
    pub transmission_keywords: Vec<String>,
}

impl Default for SearchFilter {
    fn default() -> Self {
        Self {
            make: "BMW".to_string(),
            model: "M2".to_string(),
            year_start: 2016,
            year_end: 2019,
            max_mileage: None,
            max_price: None,
            transmission: Transmission::Manual,
            transmission_keywords: vec![
                "manual".to_string(),
                "6-speed".to_string(),
                "6 speed".to_string(),
                "stick shift".to_string(),
            ],
        }
    }
}

impl SearchFilter {
    /// Client-side filter check, applied after scraping because the site's
    /// own search parameters are best-effort.
    pub fn matches(&self, listing: &Listing) -> bool {
        let title = listing.title.to_lowercase();
        if !title.contains(&self.make.to_lowercase())
            || !title.contains(&self.model.to_lowercase())
        {
            return false;
        }

        if listing.year < self.year_start || listing.year > self.year_end {
            return false;
        }

        if !self
            .transmission
            .matches(&listing.transmission, &self.transmission_keywords)
        {
            return false;
        }

        // Limits only apply when the listing actually reports the value.
        if let (Some(max), Some(mileage)) = (self.max_mileage, listing.mileage) {
            if mileage > max {
                return false;
            }
        }
        if let (Some(max), Some(price)) = (self.max_price, listing.price) {
            if price > max {
                return false;
            }
        }

        true
    }
}

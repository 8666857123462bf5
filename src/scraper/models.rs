use serde::Deserialize;

use crate::domain::listing::Listing;

/// One element of the car array embedded in a search results page.
///
/// The payload schema drifts, so every field is optional and the page-level
/// alternates (price vs basePrice, mileage vs odometer, ...) are all kept.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CarJson {
    pub stock_number: Option<i64>,
    pub vin: Option<String>,
    pub year: Option<i64>,
    pub make: Option<String>,
    pub model: Option<String>,

    pub base_price: Option<f64>,
    pub price: Option<f64>,
    pub list_price: Option<f64>,

    pub mileage: Option<i64>,
    pub odometer: Option<i64>,

    pub store_city: Option<String>,
    pub state_abbreviation: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub location: Option<String>,

    pub url: Option<String>,
    pub transmission: Option<String>,
    pub transmission_type: Option<String>,

    #[serde(default)]
    pub is_reserved: bool,
    #[serde(default = "default_true")]
    pub is_saleable: bool,
    #[serde(default)]
    pub is_coming_soon: bool,
}

fn default_true() -> bool {
    true
}

impl CarJson {
    /// Normalize into a [`Listing`]. Returns None when the element lacks a
    /// year or any usable url, since those carry the filter key and the dedup
    /// key respectively.
    pub fn to_listing(&self, source: &str, base_url: &str) -> Option<Listing> {
        let year = self.year?;

        let url = match (self.url.as_deref(), self.stock_number) {
            (Some(u), _) if !u.is_empty() => u.to_string(),
            (_, Some(stock)) => format!("{base_url}/cars/{stock}"),
            _ => return None,
        };

        let make = self.make.as_deref().unwrap_or("");
        let model = self.model.as_deref().unwrap_or("");
        let title = format!("{year} {make} {model}").trim_end().to_string();

        let price = self
            .base_price
            .or(self.price)
            .or(self.list_price)
            .map(|p| p as i64);
        let mileage = self.mileage.or(self.odometer);

        let location = match (&self.store_city, &self.state_abbreviation) {
            (Some(city), Some(state)) => format!("{city}, {state}"),
            _ => match &self.location {
                Some(loc) => loc.clone(),
                None => match (&self.city, &self.state) {
                    (Some(city), Some(state)) => format!("{city}, {state}"),
                    _ => String::new(),
                },
            },
        };

        let transmission = self
            .transmission
            .clone()
            .or_else(|| self.transmission_type.clone())
            .unwrap_or_default();

        Some(Listing {
            source: source.to_string(),
            title,
            price,
            mileage,
            location,
            url,
            year,
            transmission,
        })
    }
}

pub(crate) mod carmax;
pub mod models;
mod scraper_error;

pub use carmax::CarMaxScraper;
pub use scraper_error::ScraperError;

// carmax.rs
use std::collections::HashSet;
use std::thread;
use std::time::Duration;

use rand::Rng;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, REFERER, USER_AGENT};
use reqwest::StatusCode;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, warn};
use url::{form_urlencoded, Url};

use crate::config::{SearchFilter, Transmission};
use crate::domain::listing::Listing;
use crate::pipeline::ListingSource;
use crate::scraper::models::CarJson;
use crate::scraper::ScraperError;

pub const SOURCE: &str = "CarMax";
const BASE_URL: &str = "https://www.carmax.com";

const MAX_PAGES: usize = 10;
const PAGE_DELAY: Duration = Duration::from_secs(2);

// Rotated per attempt; a fixed agent gets flagged quickly.
const USER_AGENTS: [&str; 4] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:109.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
];

pub struct CarMaxScraper {
    client: Client,
}

impl CarMaxScraper {
    pub fn new() -> Result<Self, ScraperError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ScraperError::Network(e.to_string()))?;

        Ok(Self { client })
    }

    /// Fetch with retry, backoff and user-agent rotation.
    fn fetch_html(&self, url: &str) -> Result<String, ScraperError> {
        const MAX_ATTEMPTS: u64 = 3;
        const MAX_BACKOFF_SECS: u64 = 10;
        const JITTER_MAX_SECS: u64 = 2;

        let mut last_err = None;

        for attempt in 1..=MAX_ATTEMPTS {
            match self.try_fetch_html(url) {
                Ok(html) => return Ok(html),
                Err(e) => {
                    warn!("⚠️ Attempt {attempt} for {url} failed: {e}");
                    last_err = Some(e);

                    if attempt < MAX_ATTEMPTS {
                        let base = std::cmp::min(2 * attempt, MAX_BACKOFF_SECS);
                        let jitter = rand::thread_rng().gen_range(0..=JITTER_MAX_SECS);
                        thread::sleep(Duration::from_secs(base + jitter));
                    }
                }
            }
        }

        Err(last_err.unwrap_or_else(|| ScraperError::Network("retry loop failed".into())))
    }

    fn try_fetch_html(&self, url: &str) -> Result<String, ScraperError> {
        let agent = USER_AGENTS[rand::thread_rng().gen_range(0..USER_AGENTS.len())];

        let resp = self
            .client
            .get(url)
            .header(USER_AGENT, agent)
            .header(REFERER, BASE_URL)
            .send()
            .map_err(|e| ScraperError::Network(e.to_string()))?;

        let status = resp.status();
        // 403 and the site's joke 418 both mean the anti-bot layer fired.
        if status == StatusCode::FORBIDDEN || status.as_u16() == 418 {
            return Err(ScraperError::Blocked(format!("HTTP {status}")));
        }
        if !status.is_success() {
            return Err(ScraperError::Network(format!("HTTP {status}")));
        }

        resp.text().map_err(|e| ScraperError::Network(e.to_string()))
    }
}

impl ListingSource for CarMaxScraper {
    fn source_name(&self) -> &'static str {
        SOURCE
    }

    fn fetch_listings(&self, filter: &SearchFilter) -> Result<Vec<Listing>, ScraperError> {
        // Warm-up visit so the search request carries session cookies.
        // Best effort only.
        if let Err(e) = self.try_fetch_html(BASE_URL) {
            warn!("Session warm-up failed, continuing anyway: {e}");
        }
        thread::sleep(Duration::from_secs(1));

        let search = search_url(filter);
        let sep = if search.contains('?') { '&' } else { '?' };

        let mut seen: HashSet<String> = HashSet::new();
        let mut out = Vec::new();

        for page in 1..=MAX_PAGES {
            let page_url = if page == 1 {
                search.clone()
            } else {
                format!("{search}{sep}page={page}")
            };
            info!("📄 Scraping page {page}: {page_url}");

            let html = match self.fetch_html(&page_url) {
                Ok(html) => html,
                Err(e) if page > 1 => {
                    warn!("Page {page} failed, keeping partial results: {e}");
                    break;
                }
                Err(e) => return Err(e),
            };

            let listings = match extract_embedded_cars(&html) {
                Ok(cars) => {
                    let mut page_listings = Vec::new();
                    for car in &cars {
                        if let Some(listing) = car.to_listing(SOURCE, BASE_URL) {
                            if car.is_reserved || car.is_coming_soon || !car.is_saleable {
                                debug!("Not currently saleable: {}", listing.url);
                            }
                            page_listings.push(listing);
                        }
                    }
                    page_listings
                }
                // No embedded payload: fall back to tile markup. If the first
                // page has neither, the site changed under us; that is a fetch
                // failure, not an empty inventory.
                Err(ScraperError::MissingCarData) => {
                    let tiles = extract_tiles(&html)?;
                    if tiles.is_empty() {
                        if page == 1 {
                            return Err(ScraperError::MissingCarData);
                        }
                        break;
                    }
                    tiles
                }
                Err(e) => return Err(e),
            };

            if listings.is_empty() {
                debug!("Page {page} has no listings, stopping");
                break;
            }

            let mut fresh = 0;
            for listing in listings {
                if !seen.insert(listing.url.clone()) {
                    continue;
                }
                fresh += 1;
                if filter.matches(&listing) {
                    info!(
                        "✅ Match: {} ({}) — {}",
                        listing.title, listing.transmission, listing.url
                    );
                    out.push(listing);
                } else {
                    debug!(
                        "Filtered out: {} (year {}, transmission '{}')",
                        listing.title, listing.year, listing.transmission
                    );
                }
            }

            // Every url on this page was already seen: pagination is looping.
            if fresh == 0 {
                debug!("Page {page} repeated earlier results, stopping");
                break;
            }

            if page < MAX_PAGES {
                thread::sleep(PAGE_DELAY);
            }
        }

        info!(
            "🔎 {} matching listings out of {} unique scraped",
            out.len(),
            seen.len()
        );
        Ok(out)
    }
}

/// Search url for a filter: /cars/<make>/<model> plus year range and, unless
/// the filter takes anything, a transmission parameter.
pub(crate) fn search_url(filter: &SearchFilter) -> String {
    let make = filter.make.to_lowercase().replace(' ', "-");
    let model = filter.model.to_lowercase().replace(' ', "-");

    let mut query = form_urlencoded::Serializer::new(String::new());
    query.append_pair(
        "year",
        &format!("{},{}", filter.year_start, filter.year_end),
    );
    if filter.transmission != Transmission::Any {
        query.append_pair("transmission", filter.transmission.as_str());
    }

    format!("{BASE_URL}/cars/{make}/{model}?{}", query.finish())
}

/// Pull the car array the site embeds in a script tag, as `"cars": [...]` or
/// `const cars = [...]` depending on the bundle version. Elements whose shape
/// has drifted are skipped rather than failing the page.
pub(crate) fn extract_embedded_cars(html: &str) -> Result<Vec<CarJson>, ScraperError> {
    let document = Html::parse_document(html);
    let selector =
        Selector::parse("script").map_err(|e| ScraperError::HtmlParse(e.to_string()))?;

    for element in document.select(&selector) {
        let Some(text) = element.text().next() else {
            continue;
        };
        let Some(raw) = find_cars_array(text) else {
            continue;
        };

        let values: Vec<serde_json::Value> =
            serde_json::from_str(raw).map_err(|e| ScraperError::JsonParse(e.to_string()))?;
        let cars = values
            .into_iter()
            .filter_map(|v| serde_json::from_value::<CarJson>(v).ok())
            .collect();
        return Ok(cars);
    }

    Err(ScraperError::MissingCarData)
}

fn find_cars_array(script: &str) -> Option<&str> {
    for marker in ["\"cars\":", "const cars =", "var cars ="] {
        if let Some(pos) = script.find(marker) {
            let rest = script[pos + marker.len()..].trim_start();
            if rest.starts_with('[') {
                if let Some(array) = balanced_array(rest) {
                    return Some(array);
                }
            }
        }
    }
    None
}

/// Slice out a complete JSON array by bracket depth, honoring string
/// literals and escapes so urls and titles can't derail the scan.
fn balanced_array(s: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, b) in s.bytes().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'[' => depth += 1,
            b']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

const TILE_SELECTORS: [&str; 4] = [
    r#"article[data-testid="car-tile"]"#,
    ".car-tile",
    ".vehicle-card",
    r#"[data-testid="vehicle-card"]"#,
];

/// Fallback for pages without the embedded payload: parse car-tile markup.
pub(crate) fn extract_tiles(html: &str) -> Result<Vec<Listing>, ScraperError> {
    let document = Html::parse_document(html);

    for tile_selector in TILE_SELECTORS {
        let selector = Selector::parse(tile_selector)
            .map_err(|e| ScraperError::HtmlParse(e.to_string()))?;

        let tiles: Vec<ElementRef> = document.select(&selector).collect();
        if tiles.is_empty() {
            continue;
        }

        debug!(
            "Found {} tiles using selector {tile_selector}",
            tiles.len()
        );
        return Ok(tiles.iter().filter_map(tile_to_listing).collect());
    }

    Ok(Vec::new())
}

fn tile_to_listing(tile: &ElementRef) -> Option<Listing> {
    let title = select_text(tile, &["h3", "h2", ".title", ".car-title"])?;
    let year = year_from_title(&title)?;

    let anchor = Selector::parse("a[href]").ok()?;
    let href = tile.select(&anchor).next()?.value().attr("href")?;
    let url = resolve_url(href)?;

    let price = select_text(tile, &[".price", ".car-price", r#"[data-testid="price"]"#])
        .and_then(|t| parse_int(&t));
    let mileage = select_text(
        tile,
        &[".mileage", ".car-mileage", r#"[data-testid="mileage"]"#],
    )
    .and_then(|t| parse_int(&t));
    let location =
        select_text(tile, &[".location", ".store-location"]).unwrap_or_default();

    // Tiles don't expose a transmission field; classify from the title.
    let lower = title.to_lowercase();
    let transmission = if ["manual", "6-speed", "6 speed", "stick"]
        .iter()
        .any(|kw| lower.contains(kw))
    {
        "manual".to_string()
    } else if lower.contains("auto") {
        "automatic".to_string()
    } else {
        String::new()
    };

    Some(Listing {
        source: SOURCE.to_string(),
        title,
        price,
        mileage,
        location,
        url,
        year,
        transmission,
    })
}

fn select_text(tile: &ElementRef, selectors: &[&str]) -> Option<String> {
    for raw in selectors {
        let selector = Selector::parse(raw).ok()?;
        if let Some(element) = tile.select(&selector).next() {
            let text = element.text().collect::<String>().trim().to_string();
            if !text.is_empty() {
                return Some(text);
            }
        }
    }
    None
}

fn resolve_url(href: &str) -> Option<String> {
    if href.starts_with('/') {
        let base = Url::parse(BASE_URL).ok()?;
        Some(base.join(href).ok()?.to_string())
    } else {
        Some(href.to_string())
    }
}

fn year_from_title(title: &str) -> Option<i64> {
    title
        .split_whitespace()
        .filter_map(|token| token.parse::<i64>().ok())
        .find(|y| (1990..=2100).contains(y))
}

/// First integer in a price/mileage string, e.g. "$45,998*" -> 45998.
pub(crate) fn parse_int(text: &str) -> Option<i64> {
    let mut digits = String::new();
    for c in text.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
        } else if c == ',' || c == '$' {
            continue;
        } else if !digits.is_empty() {
            break;
        }
    }
    digits.parse().ok()
}

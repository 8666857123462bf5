// src/mailer.rs

use reqwest::blocking::Client;
use serde::Serialize;
use std::error::Error;
use std::fmt;

use crate::domain::listing::ListingRecord;
use crate::pipeline::AlertNotifier;

const BREVO_ENDPOINT: &str = "https://api.brevo.com/v3/smtp/email";

#[derive(Debug)]
pub enum MailerError {
    Config(String),
    RequestFailed(String),
    ApiError(String),
}

impl fmt::Display for MailerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MailerError::Config(msg) => write!(f, "Mailer not configured: {}", msg),
            MailerError::RequestFailed(msg) => write!(f, "Request failed: {}", msg),
            MailerError::ApiError(msg) => write!(f, "API error: {}", msg),
        }
    }
}

impl Error for MailerError {}

pub struct BrevoMailer {
    api_key: String,
    sender_email: String,
    sender_name: String,
    recipient: String,
    client: Client,
}

#[derive(Serialize)]
struct BrevoSender<'a> {
    name: &'a str,
    email: &'a str,
}

#[derive(Serialize)]
struct BrevoRecipient<'a> {
    email: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BrevoPayload<'a> {
    sender: BrevoSender<'a>,
    to: Vec<BrevoRecipient<'a>>,
    subject: &'a str,
    html_content: String,
}

impl BrevoMailer {
    pub fn new(
        api_key: String,
        sender_email: String,
        sender_name: String,
        recipient: String,
    ) -> Self {
        Self {
            api_key,
            sender_email,
            sender_name,
            recipient,
            client: Client::new(),
        }
    }

    /// Build a mailer from the environment. A missing variable disables
    /// notifications for the run rather than failing it; the caller decides
    /// how loudly to complain.
    pub fn from_env() -> Result<Self, MailerError> {
        let api_key = require_env("BREVO_API_KEY")?;
        let sender_email = require_env("BREVO_SENDER_EMAIL")?;
        let sender_name =
            std::env::var("BREVO_SENDER_NAME").unwrap_or_else(|_| "Car Scout".to_string());
        let recipient = require_env("NOTIFICATION_EMAIL")?;
        Ok(Self::new(api_key, sender_email, sender_name, recipient))
    }

    /// One email covering the whole batch. The send is all-or-nothing: either
    /// the API accepts the message or this returns an error, so callers can
    /// safely mark every record notified on Ok.
    pub fn send_listing_alert(&self, listings: &[ListingRecord]) -> Result<(), MailerError> {
        let subject = format!("🚗 New car listings found ({} new)", listings.len());
        let html_content = alert_html(listings);

        let payload = BrevoPayload {
            sender: BrevoSender {
                name: &self.sender_name,
                email: &self.sender_email,
            },
            to: vec![BrevoRecipient {
                email: &self.recipient,
            }],
            subject: &subject,
            html_content,
        };

        let resp = self
            .client
            .post(BREVO_ENDPOINT)
            .header("api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .map_err(|e| MailerError::RequestFailed(e.to_string()))?;

        if !resp.status().is_success() {
            let error_body = resp.text().unwrap_or_else(|_| "Unknown error".to_string());
            return Err(MailerError::ApiError(format!(
                "Failed to send alert: {}",
                error_body
            )));
        }

        Ok(())
    }
}

impl AlertNotifier for BrevoMailer {
    fn notify(&self, batch: &[ListingRecord]) -> Result<(), MailerError> {
        self.send_listing_alert(batch)
    }
}

fn require_env(name: &str) -> Result<String, MailerError> {
    std::env::var(name).map_err(|_| MailerError::Config(format!("{name} not set")))
}

/// HTML body with one card per listing.
pub(crate) fn alert_html(listings: &[ListingRecord]) -> String {
    let mut html = format!(
        r#"
        <html>
        <body style="font-family: Arial, sans-serif; margin: 20px;">
        <h2>🚗 New car listings found!</h2>
        <p>{} new listings matching your search:</p>
    "#,
        listings.len()
    );

    for listing in listings {
        let price = listing
            .price
            .map(|p| format!("${}", fmt_thousands(p)))
            .unwrap_or_else(|| "Price N/A".to_string());
        let mileage = listing
            .mileage
            .map(|m| format!("{} miles", fmt_thousands(m)))
            .unwrap_or_else(|| "Mileage N/A".to_string());

        html.push_str(&format!(
            r#"
            <div style="border: 1px solid #ddd; margin: 10px 0; padding: 15px; border-radius: 5px; background-color: #f9f9f9;">
                <div style="font-weight: bold; font-size: 16px;">{title}</div>
                <div style="font-size: 18px; color: #2e7d32; font-weight: bold;">{price}</div>
                <div style="color: #666; margin: 5px 0;">
                    <strong>Year:</strong> {year} |
                    <strong>Mileage:</strong> {mileage} |
                    <strong>Location:</strong> {location}
                </div>
                <div style="color: #666; margin: 5px 0;">
                    <strong>Transmission:</strong> {transmission} | {source}
                </div>
                <div style="margin-top: 10px;">
                    <a href="{url}" target="_blank">View listing →</a>
                </div>
            </div>
        "#,
            title = listing.title,
            price = price,
            year = listing.year,
            mileage = mileage,
            location = listing.location,
            transmission = listing.transmission,
            source = listing.source,
            url = listing.url,
        ));
    }

    html.push_str(
        r#"
        <hr>
        <p><em>Automated notification from carscout.</em></p>
        </body>
        </html>
    "#,
    );

    html
}

/// 45998 -> "45,998"
pub(crate) fn fmt_thousands(n: i64) -> String {
    let raw = n.abs().to_string();
    let mut out = String::new();
    for (i, c) in raw.chars().enumerate() {
        if i > 0 && (raw.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    if n < 0 {
        format!("-{out}")
    } else {
        out
    }
}

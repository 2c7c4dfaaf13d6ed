//! Alert delivery.
//!
//! Defines the `NotificationSink` trait and the rendered `AlertMessage`
//! payload. Implementations: Discord direct messages and a log-only sink.

pub mod discord;
pub mod log;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::types::{AlertKind, ListingSnapshot, Monitor, MonitorId};

/// Embed colour for buy alerts (green).
pub const BUY_COLOUR: u32 = 0x00c853;
/// Embed colour for sell alerts (orange).
pub const SELL_COLOUR: u32 = 0xff9800;

/// Best-effort delivery of an alert to a user. One attempt per call.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, owner_id: &str, alert: &AlertMessage) -> Result<()>;
}

/// One labelled value in an alert.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertField {
    pub name: &'static str,
    pub value: String,
}

/// A rendered alert, independent of the delivery channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertMessage {
    pub monitor_id: MonitorId,
    pub kind: AlertKind,
    pub title: String,
    pub url: String,
    pub colour: u32,
    pub fields: Vec<AlertField>,
    pub timestamp: DateTime<Utc>,
}

impl AlertMessage {
    /// Render the alert for a matched listing.
    pub fn new(monitor: &Monitor, listing: &ListingSnapshot, kind: AlertKind) -> Self {
        let price = listing.unit_price.unwrap_or(Decimal::ZERO);
        let shipping = listing.shipping_price.unwrap_or(Decimal::ZERO);

        let (label, colour) = match kind {
            AlertKind::Buy => ("📉 Buy Alert", BUY_COLOUR),
            AlertKind::Sell => ("📈 Sell Alert", SELL_COLOUR),
        };

        let seller = if listing.is_premium_seller {
            format!("{} ⭐", listing.seller_name)
        } else {
            listing.seller_name.clone()
        };
        let rating = listing
            .seller_rating
            .map(|r| format!("{r}%"))
            .unwrap_or_else(|| "N/A".to_string());

        let fields = vec![
            AlertField { name: "Price", value: format!("${price:.2}") },
            AlertField { name: "Shipping", value: format!("${shipping:.2}") },
            AlertField { name: "Total", value: format!("${:.2}", price + shipping) },
            AlertField { name: "Seller", value: seller },
            AlertField { name: "Rating", value: rating },
            AlertField {
                name: "Sales",
                value: listing.seller_sales.clone().unwrap_or_else(|| "N/A".to_string()),
            },
            AlertField { name: "Qty Available", value: listing.quantity.to_string() },
        ];

        Self {
            monitor_id: monitor.id,
            kind,
            title: format!("{label} — {}", monitor.product_name),
            url: monitor.product_url.clone(),
            colour,
            fields,
            timestamp: Utc::now(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.value.as_str())
    }

    /// Single-line plain-text rendering.
    pub fn to_plain_text(&self) -> String {
        let details = self
            .fields
            .iter()
            .map(|f| format!("{}: {}", f.name, f.value))
            .collect::<Vec<_>>()
            .join(" | ");
        format!("{} ({}) {details}", self.title, self.url)
    }
}

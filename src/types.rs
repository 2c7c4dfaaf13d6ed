//! Shared types for the pricewatch bot.
//!
//! These types form the data model used across all modules. Storage,
//! marketplace, notification, and engine modules depend on them
//! without depending on each other.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::engine::fingerprint::ListingFingerprint;

/// Persistent monitor identifier (SQLite rowid).
pub type MonitorId = i64;

// ---------------------------------------------------------------------------
// Monitor
// ---------------------------------------------------------------------------

/// A user's standing request to watch one product for price conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Monitor {
    pub id: MonitorId,
    pub owner_id: String,
    pub product_id: String,
    pub product_name: String,
    pub product_url: String,
    /// Buy target: alert when total price is at or below this.
    pub max_price: Option<Decimal>,
    /// Sell target: alert when total price is at or above this.
    pub min_price: Option<Decimal>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Monitor {
    /// Decide which alert (if any) a listing total triggers.
    ///
    /// The buy target is checked first, so a total satisfying both
    /// targets only ever yields `AlertKind::Buy`.
    pub fn match_target(&self, total: Decimal) -> Option<AlertKind> {
        if let Some(max) = self.max_price {
            if total <= max {
                return Some(AlertKind::Buy);
            }
        }
        if let Some(min) = self.min_price {
            if total >= min {
                return Some(AlertKind::Sell);
            }
        }
        None
    }
}

impl fmt::Display for Monitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.active { "active" } else { "paused" };
        let mut targets = Vec::new();
        if let Some(max) = self.max_price {
            targets.push(format!("buy <= ${max:.2}"));
        }
        if let Some(min) = self.min_price {
            targets.push(format!("sell >= ${min:.2}"));
        }
        write!(
            f,
            "#{} {} ({}) [{status}]",
            self.id,
            self.product_name,
            targets.join(" | "),
        )
    }
}

/// A monitor that has been validated but not yet persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMonitor {
    pub owner_id: String,
    pub product_id: String,
    pub product_name: String,
    pub product_url: String,
    pub max_price: Option<Decimal>,
    pub min_price: Option<Decimal>,
}

/// A product reference parsed out of a marketplace URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductRef {
    pub product_id: String,
    pub name: String,
    pub url: String,
}

// ---------------------------------------------------------------------------
// Listings
// ---------------------------------------------------------------------------

/// Offer type as reported by the marketplace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListingKind {
    /// A fixed-price offer, directly comparable to a target.
    Standard,
    /// Anything else (custom listings, auctions), kept with its raw tag.
    Other(String),
}

impl From<&str> for ListingKind {
    fn from(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("standard") {
            ListingKind::Standard
        } else {
            ListingKind::Other(raw.to_string())
        }
    }
}

/// One seller's offer for a product at poll time. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingSnapshot {
    pub seller_name: String,
    pub unit_price: Option<Decimal>,
    pub shipping_price: Option<Decimal>,
    pub quantity: u32,
    pub seller_rating: Option<f64>,
    pub seller_sales: Option<String>,
    pub is_premium_seller: bool,
    pub listing_kind: ListingKind,
}

impl ListingSnapshot {
    /// Unit price plus shipping, with missing shipping counted as free.
    /// `None` when the unit price is absent.
    pub fn total_price(&self) -> Option<Decimal> {
        self.unit_price
            .map(|price| price + self.shipping_price.unwrap_or(Decimal::ZERO))
    }

    pub fn is_standard(&self) -> bool {
        self.listing_kind == ListingKind::Standard
    }
}

// ---------------------------------------------------------------------------
// Alerts
// ---------------------------------------------------------------------------

/// Which target a listing crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertKind {
    Buy,
    Sell,
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertKind::Buy => write!(f, "BUY"),
            AlertKind::Sell => write!(f, "SELL"),
        }
    }
}

/// Durable dedup ledger entry, unique on `(monitor_id, fingerprint)`.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertRecord {
    pub monitor_id: MonitorId,
    pub fingerprint: ListingFingerprint,
    pub price: Decimal,
    pub seller_name: String,
    pub recorded_at: DateTime<Utc>,
}

/// An alert that made it into the ledger during an evaluation.
#[derive(Debug, Clone)]
pub struct DeliveredAlert {
    pub monitor_id: MonitorId,
    pub kind: AlertKind,
    pub fingerprint: ListingFingerprint,
    pub listing: ListingSnapshot,
    pub total: Decimal,
    /// False when the notification send failed after the ledger write.
    pub delivered: bool,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain errors surfaced by the store, evaluator, and command surface.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Monitor #{id} not found")]
    NotFound { id: MonitorId },

    #[error("Listing fetch failed for product {product_id}: {message}")]
    Fetch { product_id: String, message: String },

    #[error("Notification to {owner_id} failed: {message}")]
    Delivery { owner_id: String, message: String },

    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("Corrupt stored value: {0}")]
    Corrupt(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Mock marketplace and notifier for integration testing.
//!
//! Provides deterministic `ListingSource` and `NotificationSink`
//! implementations. Listings, failures, and delivered messages are all
//! in-memory and controllable from test code.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Instant;

use pricewatch::marketplace::ListingSource;
use pricewatch::notify::{AlertMessage, NotificationSink};
use pricewatch::types::{ListingKind, ListingSnapshot};

/// Build a standard listing with the given prices.
pub fn listing(seller: &str, unit: Decimal, shipping: Decimal) -> ListingSnapshot {
    ListingSnapshot {
        seller_name: seller.to_string(),
        unit_price: Some(unit),
        shipping_price: Some(shipping),
        quantity: 1,
        seller_rating: Some(99.0),
        seller_sales: Some("1000+".to_string()),
        is_premium_seller: false,
        listing_kind: ListingKind::Standard,
    }
}

/// A mock listings API keyed by product id.
#[derive(Default)]
pub struct MockMarketplace {
    listings: Mutex<HashMap<String, Vec<ListingSnapshot>>>,
    failing: Mutex<HashSet<String>>,
    calls: Mutex<Vec<(String, Instant)>>,
}

impl MockMarketplace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the listings returned for a product.
    pub fn set_listings(&self, product_id: &str, listings: Vec<ListingSnapshot>) {
        self.listings
            .lock()
            .unwrap()
            .insert(product_id.to_string(), listings);
    }

    /// Make every fetch for this product fail.
    pub fn fail_product(&self, product_id: &str) {
        self.failing.lock().unwrap().insert(product_id.to_string());
    }

    /// Product ids fetched so far, in order.
    pub fn fetched(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(p, _)| p.clone()).collect()
    }

    pub fn fetch_times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().iter().map(|(_, t)| *t).collect()
    }
}

#[async_trait]
impl ListingSource for MockMarketplace {
    async fn fetch(&self, product_id: &str) -> Result<Vec<ListingSnapshot>> {
        self.calls
            .lock()
            .unwrap()
            .push((product_id.to_string(), Instant::now()));

        if self.failing.lock().unwrap().contains(product_id) {
            return Err(anyhow!("mock marketplace: 503 for product {product_id}"));
        }
        Ok(self
            .listings
            .lock()
            .unwrap()
            .get(product_id)
            .cloned()
            .unwrap_or_default())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Records every alert it is asked to deliver.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, AlertMessage)>>,
    fail: Mutex<bool>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle delivery failures. Failed sends are not recorded.
    pub fn set_failing(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }

    pub fn sent(&self) -> Vec<(String, AlertMessage)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingNotifier {
    async fn send(&self, owner_id: &str, alert: &AlertMessage) -> Result<()> {
        if *self.fail.lock().unwrap() {
            return Err(anyhow!("mock notifier: user has DMs closed"));
        }
        self.sent
            .lock()
            .unwrap()
            .push((owner_id.to_string(), alert.clone()));
        Ok(())
    }
}

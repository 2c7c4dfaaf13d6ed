//! TCGPlayer listings-search integration.
//!
//! Endpoint: `POST {base}/v1/product/{productId}/listings`
//! Auth: none. The search API expects browser-like Origin/Referer
//! headers and rejects bare requests.
//!
//! Listings are requested already sorted by price + shipping, filtered to
//! live sellers and a single card condition.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::ListingSource;
use crate::config::MarketplaceConfig;
use crate::types::{ListingKind, ListingSnapshot};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const SOURCE_NAME: &str = "tcgplayer";

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const ORIGIN: &str = "https://www.tcgplayer.com";
const REFERER: &str = "https://www.tcgplayer.com/";

// ---------------------------------------------------------------------------
// Request body
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequest {
    filters: Filters,
    from: u32,
    size: u32,
    sort: Sort,
    context: SearchContext,
}

#[derive(Debug, Serialize)]
struct Filters {
    term: TermFilter,
    range: serde_json::Value,
    exclude: ExcludeFilter,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TermFilter {
    seller_status: String,
    channel_id: u32,
    condition: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExcludeFilter {
    channel_exclusion: u32,
}

#[derive(Debug, Serialize)]
struct Sort {
    field: String,
    order: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchContext {
    shipping_country: String,
    cart: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Response types (TCGPlayer JSON → Rust)
// ---------------------------------------------------------------------------

/// Top-level envelope: `{ "results": [ { "results": [listing, ...] } ] }`.
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<ResultPage>,
}

#[derive(Debug, Deserialize)]
struct ResultPage {
    #[serde(default)]
    results: Vec<RawListing>,
}

/// One listing as returned by the search API. Only the fields we use;
/// everything is optional because the API omits fields freely.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawListing {
    #[serde(default)]
    seller_name: Option<String>,
    #[serde(default)]
    price: Option<Decimal>,
    #[serde(default)]
    shipping_price: Option<Decimal>,
    #[serde(default)]
    quantity: Option<f64>,
    #[serde(default)]
    seller_rating: Option<f64>,
    /// Usually a string like "10000+", occasionally a number.
    #[serde(default)]
    seller_sales: Option<serde_json::Value>,
    #[serde(default)]
    gold_seller: Option<bool>,
    #[serde(default)]
    listing_type: Option<String>,
}

/// Whole, non-negative quantity. Missing means 0; anything else that
/// does not fit a `u32` exactly is malformed.
fn whole_quantity(raw: Option<f64>) -> Option<u32> {
    match raw {
        None => Some(0),
        Some(q) if q.is_finite() && q >= 0.0 && q.fract() == 0.0 && q <= u32::MAX as f64 => {
            Some(q as u32)
        }
        Some(_) => None,
    }
}

impl RawListing {
    /// `None` when the quantity is malformed: a fractional count would
    /// otherwise collapse distinct offers onto one fingerprint.
    fn into_snapshot(self) -> Option<ListingSnapshot> {
        let Some(quantity) = whole_quantity(self.quantity) else {
            debug!(
                seller = ?self.seller_name,
                quantity = ?self.quantity,
                "Dropping listing with non-integral quantity"
            );
            return None;
        };

        let seller_sales = match self.seller_sales {
            Some(serde_json::Value::String(s)) if !s.is_empty() => Some(s),
            Some(serde_json::Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };

        Some(ListingSnapshot {
            seller_name: self.seller_name.unwrap_or_default(),
            unit_price: self.price,
            shipping_price: self.shipping_price,
            quantity,
            seller_rating: self.seller_rating,
            seller_sales,
            is_premium_seller: self.gold_seller.unwrap_or(false),
            listing_kind: self
                .listing_type
                .as_deref()
                .map(ListingKind::from)
                .unwrap_or_else(|| ListingKind::Other("unknown".to_string())),
        })
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// TCGPlayer listings client.
pub struct TcgPlayerClient {
    http: Client,
    base_url: String,
    page_size: u32,
    condition: String,
    shipping_country: String,
}

impl TcgPlayerClient {
    pub fn new(config: &MarketplaceConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build HTTP client for TCGPlayer")?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            page_size: config.page_size,
            condition: config.condition.clone(),
            shipping_country: config.shipping_country.clone(),
        })
    }

    fn listings_url(&self, product_id: &str) -> String {
        format!("{}/v1/product/{product_id}/listings", self.base_url)
    }

    fn search_request(&self) -> SearchRequest {
        SearchRequest {
            filters: Filters {
                term: TermFilter {
                    seller_status: "Live".to_string(),
                    channel_id: 0,
                    condition: vec![self.condition.clone()],
                },
                range: serde_json::json!({}),
                exclude: ExcludeFilter { channel_exclusion: 0 },
            },
            from: 0,
            size: self.page_size,
            sort: Sort {
                field: "price+shipping".to_string(),
                order: "asc".to_string(),
            },
            context: SearchContext {
                shipping_country: self.shipping_country.clone(),
                cart: serde_json::json!({}),
            },
        }
    }

    /// Decode a search response body into snapshots.
    fn parse_listings(body: &str) -> Result<Vec<ListingSnapshot>> {
        let parsed: SearchResponse = serde_json::from_str(body).with_context(|| {
            let preview: String = body.chars().take(200).collect();
            format!("Failed to parse TCGPlayer listings response: {preview}")
        })?;

        Ok(parsed
            .results
            .into_iter()
            .next()
            .map(|page| page.results.into_iter().filter_map(RawListing::into_snapshot).collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl ListingSource for TcgPlayerClient {
    async fn fetch(&self, product_id: &str) -> Result<Vec<ListingSnapshot>> {
        let url = self.listings_url(product_id);
        debug!(url = %url, "Fetching TCGPlayer listings");

        let resp = self
            .http
            .post(&url)
            .header("Origin", ORIGIN)
            .header("Referer", REFERER)
            .json(&self.search_request())
            .send()
            .await
            .context("TCGPlayer listings request failed")?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .context("Failed to read TCGPlayer listings response")?;

        if !status.is_success() {
            let preview: String = body.chars().take(200).collect();
            anyhow::bail!("TCGPlayer API error {status}: {preview}");
        }

        let listings = Self::parse_listings(&body)?;
        debug!(product_id, count = listings.len(), "TCGPlayer listings fetched");
        Ok(listings)
    }

    fn name(&self) -> &str {
        SOURCE_NAME
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

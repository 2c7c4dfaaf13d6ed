//! Marketplace integrations.
//!
//! Defines the `ListingSource` trait and the TCGPlayer implementation,
//! plus parsing of user-supplied product URLs.

pub mod tcgplayer;

use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;

use crate::types::{ListingSnapshot, MonitorError, ProductRef};

/// Abstraction over a marketplace listings query.
///
/// One call is one remote request. No retries: a failure is final for
/// the current sweep.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ListingSource: Send + Sync {
    /// Fetch the current listings for a product.
    async fn fetch(&self, product_id: &str) -> Result<Vec<ListingSnapshot>>;

    /// Source name for logging.
    fn name(&self) -> &str;
}

static PRODUCT_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/product/(\d+)/?([^?#]*)").expect("product URL pattern is valid")
});

/// Extract the product id and a display name from a product page URL,
/// e.g. `https://www.tcgplayer.com/product/250000/sheoldred-the-apocalypse`.
///
/// The name is the last slug segment with hyphens turned into spaces and
/// each word capitalised; it falls back to `Product {id}`.
pub fn parse_product_url(url: &str) -> Result<ProductRef, MonitorError> {
    let url = url.trim();
    let caps = PRODUCT_URL
        .captures(url)
        .ok_or_else(|| MonitorError::Validation(format!("not a product URL: {url}")))?;

    let product_id = caps[1].to_string();
    let slug = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
    let last_segment = slug.rsplit('/').find(|s| !s.is_empty()).unwrap_or_default();

    let name = last_segment
        .split('-')
        .filter(|w| !w.is_empty())
        .map(capitalise)
        .collect::<Vec<_>>()
        .join(" ");
    let name = if name.is_empty() {
        format!("Product {product_id}")
    } else {
        name
    };

    Ok(ProductRef {
        product_id,
        name,
        url: url.to_string(),
    })
}

fn capitalise(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

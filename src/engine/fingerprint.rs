//! Listing fingerprints.
//!
//! The marketplace exposes no stable listing identifier, so "the same
//! offer" is identified by seller, unit price, and quantity. Two physical
//! listings that agree on all three are treated as one offer.
//!
//! Fields are framed before hashing (length-prefixed seller name,
//! normalised decimal price, integer quantity) so that no two distinct
//! field triples can produce the same byte stream.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Field separator inside the hashed byte stream (ASCII unit separator).
const SEP: u8 = 0x1f;

/// Dedup key for a listing. 64 lowercase hex chars (BLAKE3).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListingFingerprint(String);

impl ListingFingerprint {
    /// Derive the fingerprint for an offer.
    pub fn derive(seller_name: &str, unit_price: Decimal, quantity: u32) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&(seller_name.len() as u64).to_le_bytes());
        hasher.update(seller_name.as_bytes());
        hasher.update(&[SEP]);
        // 8, 8.0 and 8.00 are the same price.
        hasher.update(unit_price.normalize().to_string().as_bytes());
        hasher.update(&[SEP]);
        hasher.update(&quantity.to_le_bytes());
        Self(hasher.finalize().to_hex().to_string())
    }

    /// Wrap a value read back from storage.
    pub fn from_stored(raw: String) -> Self {
        Self(raw)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 chars, for log lines.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for ListingFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

//! pricewatch — marketplace price-target monitor
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod marketplace;
pub mod notify;
pub mod engine;
pub mod storage;
pub mod api;

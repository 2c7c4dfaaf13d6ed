//! End-to-end tests: real evaluator, scheduler, and SQLite store wired to
//! in-memory marketplace and notifier doubles.

mod mock_marketplace;
mod sweep;

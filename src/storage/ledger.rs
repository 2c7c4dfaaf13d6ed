//! Dedup ledger: the durable record of which listings each monitor has
//! already alerted on.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;

use super::Store;
use crate::engine::fingerprint::ListingFingerprint;
use crate::types::{AlertRecord, MonitorError, MonitorId};

/// Persistent set of `(monitor_id, fingerprint)` pairs already notified.
#[async_trait]
pub trait DedupLedger: Send + Sync {
    /// Insert the pair if absent. Returns `true` only for the call that
    /// actually inserted it; the check and the insert are one statement.
    ///
    /// Fails with `NotFound` once the monitor has been deleted, so a sweep
    /// working from an older snapshot cannot record (or alert) for it.
    async fn try_record(
        &self,
        monitor_id: MonitorId,
        fingerprint: &ListingFingerprint,
        price: Decimal,
        seller_name: &str,
    ) -> Result<bool, MonitorError>;

    /// Remove every record for a monitor. Returns the number removed.
    /// Deleting the monitor already does this.
    async fn purge(&self, monitor_id: MonitorId) -> Result<u64, MonitorError>;

    async fn count(&self, monitor_id: MonitorId) -> Result<u64, MonitorError>;

    /// Records for a monitor, oldest first.
    async fn records(&self, monitor_id: MonitorId) -> Result<Vec<AlertRecord>, MonitorError>;
}

#[derive(Debug, sqlx::FromRow)]
struct AlertRow {
    monitor_id: i64,
    fingerprint: String,
    price: String,
    seller_name: String,
    recorded_at: DateTime<Utc>,
}

impl TryFrom<AlertRow> for AlertRecord {
    type Error = MonitorError;

    fn try_from(row: AlertRow) -> Result<Self, Self::Error> {
        let price = Decimal::from_str(&row.price).map_err(|e| {
            MonitorError::Corrupt(format!("alert price {:?}: {e}", row.price))
        })?;
        Ok(AlertRecord {
            monitor_id: row.monitor_id,
            fingerprint: ListingFingerprint::from_stored(row.fingerprint),
            price,
            seller_name: row.seller_name,
            recorded_at: row.recorded_at,
        })
    }
}

#[async_trait]
impl DedupLedger for Store {
    async fn try_record(
        &self,
        monitor_id: MonitorId,
        fingerprint: &ListingFingerprint,
        price: Decimal,
        seller_name: &str,
    ) -> Result<bool, MonitorError> {
        let result = sqlx::query(
            r#"
            INSERT INTO alerted_listings (monitor_id, fingerprint, price, seller_name, recorded_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(monitor_id, fingerprint) DO NOTHING
            "#,
        )
        .bind(monitor_id)
        .bind(fingerprint.as_str())
        .bind(price.to_string())
        .bind(seller_name)
        .bind(Utc::now())
        .execute(self.pool())
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                MonitorError::NotFound { id: monitor_id }
            }
            other => MonitorError::Storage(other),
        })?;

        Ok(result.rows_affected() == 1)
    }

    async fn purge(&self, monitor_id: MonitorId) -> Result<u64, MonitorError> {
        let result = sqlx::query("DELETE FROM alerted_listings WHERE monitor_id = ?")
            .bind(monitor_id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected())
    }

    async fn count(&self, monitor_id: MonitorId) -> Result<u64, MonitorError> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM alerted_listings WHERE monitor_id = ?")
            .bind(monitor_id)
            .fetch_one(self.pool())
            .await?;
        Ok(n as u64)
    }

    async fn records(&self, monitor_id: MonitorId) -> Result<Vec<AlertRecord>, MonitorError> {
        let rows = sqlx::query_as::<_, AlertRow>(
            r#"
            SELECT monitor_id, fingerprint, price, seller_name, recorded_at
            FROM alerted_listings
            WHERE monitor_id = ?
            ORDER BY id
            "#,
        )
        .bind(monitor_id)
        .fetch_all(self.pool())
        .await?;

        rows.into_iter().map(AlertRecord::try_from).collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

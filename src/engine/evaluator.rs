//! Monitor evaluator: one monitor, one fetch, at-most-once alerts.
//!
//! fetch → keep standard listings → total price → match target →
//! fingerprint → ledger check-and-insert → deliver.
//!
//! The ledger write happens before delivery and is never rolled back, so
//! a failed send can lose an alert but can never duplicate one.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::engine::fingerprint::ListingFingerprint;
use crate::marketplace::ListingSource;
use crate::notify::{AlertMessage, NotificationSink};
use crate::storage::DedupLedger;
use crate::types::{DeliveredAlert, ListingSnapshot, Monitor, MonitorError};

pub struct MonitorEvaluator {
    source: Arc<dyn ListingSource>,
    ledger: Arc<dyn DedupLedger>,
    sink: Arc<dyn NotificationSink>,
    fetch_timeout: Duration,
}

impl MonitorEvaluator {
    pub fn new(
        source: Arc<dyn ListingSource>,
        ledger: Arc<dyn DedupLedger>,
        sink: Arc<dyn NotificationSink>,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            source,
            ledger,
            sink,
            fetch_timeout,
        }
    }

    /// Evaluate one monitor and return every alert recorded in the ledger
    /// during this call (delivered or not).
    ///
    /// Errors are scoped to this monitor: a fetch failure or timeout
    /// returns `MonitorError::Fetch` without touching the ledger.
    pub async fn evaluate(&self, monitor: &Monitor) -> Result<Vec<DeliveredAlert>, MonitorError> {
        let mut alerts = Vec::new();
        self.evaluate_into(monitor, &mut alerts).await?;
        Ok(alerts)
    }

    /// Like [`evaluate`](Self::evaluate), but pushes each recorded alert
    /// into `alerts` as it happens. On error, `alerts` still holds every
    /// alert recorded before the failure.
    ///
    /// A monitor deleted after the caller loaded it ends the evaluation
    /// quietly: nothing more is recorded or sent for it.
    pub async fn evaluate_into(
        &self,
        monitor: &Monitor,
        alerts: &mut Vec<DeliveredAlert>,
    ) -> Result<(), MonitorError> {
        let listings = self.fetch(monitor).await?;

        if listings.is_empty() {
            debug!(monitor_id = monitor.id, "No listings returned");
            return Ok(());
        }

        for listing in listings {
            if !listing.is_standard() {
                debug!(
                    monitor_id = monitor.id,
                    seller = %listing.seller_name,
                    kind = ?listing.listing_kind,
                    "Skipping non-standard listing"
                );
                continue;
            }

            // Incomplete price data never alerts.
            let (Some(unit_price), Some(total)) = (listing.unit_price, listing.total_price()) else {
                debug!(monitor_id = monitor.id, seller = %listing.seller_name, "Listing has no price");
                continue;
            };

            let Some(kind) = monitor.match_target(total) else {
                continue;
            };

            let fingerprint =
                ListingFingerprint::derive(&listing.seller_name, unit_price, listing.quantity);

            let inserted = match self
                .ledger
                .try_record(monitor.id, &fingerprint, unit_price, &listing.seller_name)
                .await
            {
                Ok(inserted) => inserted,
                Err(MonitorError::NotFound { .. }) => {
                    info!(monitor_id = monitor.id, "Monitor removed during sweep, stopping");
                    return Ok(());
                }
                Err(e) => return Err(e),
            };
            if !inserted {
                debug!(
                    monitor_id = monitor.id,
                    fingerprint = fingerprint.short(),
                    "Already alerted, skipping"
                );
                continue;
            }

            let message = AlertMessage::new(monitor, &listing, kind);
            let delivered = self.deliver(monitor, &message).await;

            alerts.push(DeliveredAlert {
                monitor_id: monitor.id,
                kind,
                fingerprint,
                listing,
                total,
                delivered,
            });
        }

        Ok(())
    }

    async fn fetch(&self, monitor: &Monitor) -> Result<Vec<ListingSnapshot>, MonitorError> {
        let fetch_error = |message: String| MonitorError::Fetch {
            product_id: monitor.product_id.clone(),
            message,
        };

        match tokio::time::timeout(self.fetch_timeout, self.source.fetch(&monitor.product_id)).await
        {
            Ok(Ok(listings)) => Ok(listings),
            Ok(Err(e)) => Err(fetch_error(format!("{e:#}"))),
            Err(_) => Err(fetch_error(format!(
                "timed out after {}s",
                self.fetch_timeout.as_secs_f64()
            ))),
        }
    }

    /// Send one alert. Failures are logged and reported as `false`.
    async fn deliver(&self, monitor: &Monitor, message: &AlertMessage) -> bool {
        match self.sink.send(&monitor.owner_id, message).await {
            Ok(()) => {
                info!(
                    monitor_id = monitor.id,
                    owner_id = %monitor.owner_id,
                    product = %monitor.product_name,
                    kind = %message.kind,
                    total = message.field("Total").unwrap_or_default(),
                    "Alert sent"
                );
                true
            }
            Err(e) => {
                let err = MonitorError::Delivery {
                    owner_id: monitor.owner_id.clone(),
                    message: format!("{e:#}"),
                };
                warn!(monitor_id = monitor.id, error = %err, "Alert delivery failed");
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Command surface: the operations a front end exposes to users.
//!
//! Every command validates its input and checks ownership before it
//! mutates anything; a rejected command leaves the store untouched.

use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::info;

use crate::marketplace::parse_product_url;
use crate::storage::MonitorStore;
use crate::types::{Monitor, MonitorError, MonitorId, NewMonitor};

pub struct MonitorService {
    store: Arc<dyn MonitorStore>,
}

impl MonitorService {
    pub fn new(store: Arc<dyn MonitorStore>) -> Self {
        Self { store }
    }

    /// Register a new monitor. At least one target must be given, and
    /// every given target must be positive.
    pub async fn add_monitor(
        &self,
        owner_id: &str,
        product_url: &str,
        max_price: Option<Decimal>,
        min_price: Option<Decimal>,
    ) -> Result<Monitor, MonitorError> {
        let owner_id = validate_owner(owner_id)?;
        let product = parse_product_url(product_url)?;

        if max_price.is_none() && min_price.is_none() {
            return Err(MonitorError::Validation(
                "set at least one target: max_price (buy) or min_price (sell)".to_string(),
            ));
        }
        for (label, price) in [("max_price", max_price), ("min_price", min_price)] {
            if let Some(p) = price {
                if p <= Decimal::ZERO {
                    return Err(MonitorError::Validation(format!(
                        "{label} must be greater than zero, got {p}"
                    )));
                }
            }
        }

        let new = NewMonitor {
            owner_id: owner_id.to_string(),
            product_id: product.product_id,
            product_name: product.name,
            product_url: product.url,
            max_price,
            min_price,
        };
        let id = self.store.create(&new).await?;

        // Read back so the caller sees exactly what was stored.
        let monitor = self
            .store
            .get(id)
            .await?
            .ok_or(MonitorError::NotFound { id })?;

        info!(
            monitor_id = id,
            owner_id,
            product_id = %monitor.product_id,
            max_price = ?monitor.max_price,
            min_price = ?monitor.min_price,
            "Monitor added"
        );
        Ok(monitor)
    }

    /// Delete a monitor. Its dedup records go with it in the same
    /// statement.
    pub async fn remove_monitor(&self, id: MonitorId, owner_id: &str) -> Result<(), MonitorError> {
        self.authorize(id, owner_id).await?;
        if !self.store.delete(id).await? {
            return Err(MonitorError::NotFound { id });
        }
        info!(monitor_id = id, owner_id, "Monitor removed");
        Ok(())
    }

    pub async fn pause_monitor(&self, id: MonitorId, owner_id: &str) -> Result<(), MonitorError> {
        self.set_active(id, owner_id, false).await
    }

    pub async fn resume_monitor(&self, id: MonitorId, owner_id: &str) -> Result<(), MonitorError> {
        self.set_active(id, owner_id, true).await
    }

    pub async fn list_monitors(&self, owner_id: &str) -> Result<Vec<Monitor>, MonitorError> {
        let owner_id = validate_owner(owner_id)?;
        self.store.list_by_owner(owner_id).await
    }

    async fn set_active(&self, id: MonitorId, owner_id: &str, active: bool) -> Result<(), MonitorError> {
        self.authorize(id, owner_id).await?;
        if !self.store.set_active(id, active).await? {
            // Removed between the ownership check and the update.
            return Err(MonitorError::NotFound { id });
        }
        info!(monitor_id = id, owner_id, active, "Monitor state changed");
        Ok(())
    }

    /// NotFound unless `owner_id` owns monitor `id`.
    async fn authorize(&self, id: MonitorId, owner_id: &str) -> Result<(), MonitorError> {
        let owner_id = validate_owner(owner_id)?;
        if self.store.exists_for_owner(id, owner_id).await? {
            Ok(())
        } else {
            Err(MonitorError::NotFound { id })
        }
    }
}

fn validate_owner(owner_id: &str) -> Result<&str, MonitorError> {
    let trimmed = owner_id.trim();
    if trimmed.is_empty() {
        return Err(MonitorError::Validation("owner id is required".to_string()));
    }
    Ok(trimmed)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Monitor definitions: persistent CRUD used by the scheduler (read-only)
//! and the command surface.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;
use tracing::{debug, warn};

use super::Store;
use crate::types::{Monitor, MonitorError, MonitorId, NewMonitor};

/// CRUD over monitor definitions.
///
/// Each call is a single statement and is independently consistent, so
/// the command surface and the scheduler can interleave freely.
#[async_trait]
pub trait MonitorStore: Send + Sync {
    /// Persist a new monitor (active) and return its id.
    async fn create(&self, monitor: &NewMonitor) -> Result<MonitorId, MonitorError>;

    async fn get(&self, id: MonitorId) -> Result<Option<Monitor>, MonitorError>;

    /// All monitors owned by `owner_id`, oldest first.
    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Monitor>, MonitorError>;

    /// All active rows, oldest first, decoded one by one so a corrupt row
    /// only affects itself.
    async fn load_active(&self) -> Result<ActiveMonitors, MonitorError>;

    /// All decodable monitors with `active = true`, oldest first.
    async fn list_active(&self) -> Result<Vec<Monitor>, MonitorError> {
        Ok(self.load_active().await?.monitors)
    }

    /// Returns false if no such monitor exists.
    async fn set_active(&self, id: MonitorId, active: bool) -> Result<bool, MonitorError>;

    /// Returns false if no such monitor exists.
    async fn delete(&self, id: MonitorId) -> Result<bool, MonitorError>;

    /// Ownership check used before pause/resume/remove.
    async fn exists_for_owner(&self, id: MonitorId, owner_id: &str) -> Result<bool, MonitorError>;
}

/// The active set as loaded for a sweep.
#[derive(Debug, Default)]
pub struct ActiveMonitors {
    pub monitors: Vec<Monitor>,
    /// Active rows that failed to decode, with the decode error.
    pub corrupt: Vec<(MonitorId, MonitorError)>,
}

impl ActiveMonitors {
    /// Every active row, decodable or not.
    pub fn total(&self) -> usize {
        self.monitors.len() + self.corrupt.len()
    }
}

/// Raw row shape; prices are stored as decimal strings.
#[derive(Debug, sqlx::FromRow)]
struct MonitorRow {
    id: i64,
    owner_id: String,
    product_id: String,
    product_name: String,
    product_url: String,
    max_price: Option<String>,
    min_price: Option<String>,
    active: bool,
    created_at: DateTime<Utc>,
}

const SELECT_MONITOR: &str = "SELECT id, owner_id, product_id, product_name, product_url, \
     max_price, min_price, active, created_at FROM monitors";

fn parse_price(raw: Option<String>, column: &str, id: i64) -> Result<Option<Decimal>, MonitorError> {
    raw.map(|s| {
        Decimal::from_str(&s)
            .map_err(|e| MonitorError::Corrupt(format!("monitor #{id} {column} {s:?}: {e}")))
    })
    .transpose()
}

impl TryFrom<MonitorRow> for Monitor {
    type Error = MonitorError;

    fn try_from(row: MonitorRow) -> Result<Self, Self::Error> {
        Ok(Monitor {
            max_price: parse_price(row.max_price, "max_price", row.id)?,
            min_price: parse_price(row.min_price, "min_price", row.id)?,
            id: row.id,
            owner_id: row.owner_id,
            product_id: row.product_id,
            product_name: row.product_name,
            product_url: row.product_url,
            active: row.active,
            created_at: row.created_at,
        })
    }
}

fn into_monitors(rows: Vec<MonitorRow>) -> Result<Vec<Monitor>, MonitorError> {
    rows.into_iter().map(Monitor::try_from).collect()
}

#[async_trait]
impl MonitorStore for Store {
    async fn create(&self, monitor: &NewMonitor) -> Result<MonitorId, MonitorError> {
        let result = sqlx::query(
            r#"
            INSERT INTO monitors (
                owner_id, product_id, product_name, product_url,
                max_price, min_price, active, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, 1, ?)
            "#,
        )
        .bind(&monitor.owner_id)
        .bind(&monitor.product_id)
        .bind(&monitor.product_name)
        .bind(&monitor.product_url)
        .bind(monitor.max_price.map(|p| p.to_string()))
        .bind(monitor.min_price.map(|p| p.to_string()))
        .bind(Utc::now())
        .execute(self.pool())
        .await?;

        let id = result.last_insert_rowid();
        debug!(monitor_id = id, owner_id = %monitor.owner_id, "Monitor created");
        Ok(id)
    }

    async fn get(&self, id: MonitorId) -> Result<Option<Monitor>, MonitorError> {
        let row = sqlx::query_as::<_, MonitorRow>(&format!("{SELECT_MONITOR} WHERE id = ?"))
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        row.map(Monitor::try_from).transpose()
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Monitor>, MonitorError> {
        let rows = sqlx::query_as::<_, MonitorRow>(&format!(
            "{SELECT_MONITOR} WHERE owner_id = ? ORDER BY id"
        ))
        .bind(owner_id)
        .fetch_all(self.pool())
        .await?;
        into_monitors(rows)
    }

    async fn load_active(&self) -> Result<ActiveMonitors, MonitorError> {
        let rows = sqlx::query_as::<_, MonitorRow>(&format!(
            "{SELECT_MONITOR} WHERE active = 1 ORDER BY id"
        ))
        .fetch_all(self.pool())
        .await?;

        let mut active = ActiveMonitors::default();
        for row in rows {
            let id = row.id;
            match Monitor::try_from(row) {
                Ok(monitor) => active.monitors.push(monitor),
                Err(e) => {
                    warn!(monitor_id = id, error = %e, "Skipping undecodable monitor row");
                    active.corrupt.push((id, e));
                }
            }
        }
        Ok(active)
    }

    async fn set_active(&self, id: MonitorId, active: bool) -> Result<bool, MonitorError> {
        let result = sqlx::query("UPDATE monitors SET active = ? WHERE id = ?")
            .bind(active)
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: MonitorId) -> Result<bool, MonitorError> {
        let result = sqlx::query("DELETE FROM monitors WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn exists_for_owner(&self, id: MonitorId, owner_id: &str) -> Result<bool, MonitorError> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT id FROM monitors WHERE id = ? AND owner_id = ?")
                .bind(id)
                .bind(owner_id)
                .fetch_optional(self.pool())
                .await?;
        Ok(found.is_some())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

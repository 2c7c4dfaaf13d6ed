//! Persistence layer.
//!
//! A single SQLite database holds the monitor definitions and the dedup
//! ledger. `Store` is the explicit handle: opened once at process start,
//! cloned into every component that needs it, closed at shutdown.
//!
//! Every mutation is one statement (or one transaction) on a WAL
//! database with `synchronous = FULL`, so it is durable before the call
//! returns.

pub mod ledger;
pub mod monitors;

use anyhow::{Context, Result};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

pub use ledger::DedupLedger;
pub use monitors::{ActiveMonitors, MonitorStore};

/// Ordered schema migrations. Entry `i` upgrades the schema to version `i + 1`.
/// Append only: never edit a migration that has shipped.
const MIGRATIONS: &[&[&str]] = &[
    // v1: monitors + dedup ledger
    &[
        r#"
        CREATE TABLE IF NOT EXISTS monitors (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            owner_id TEXT NOT NULL,
            product_id TEXT NOT NULL,
            product_name TEXT NOT NULL,
            product_url TEXT NOT NULL,
            max_price TEXT,
            min_price TEXT,
            active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS alerted_listings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            monitor_id INTEGER NOT NULL,
            fingerprint TEXT NOT NULL,
            price TEXT NOT NULL,
            seller_name TEXT NOT NULL,
            recorded_at TEXT NOT NULL,
            UNIQUE(monitor_id, fingerprint)
        )
        "#,
    ],
    // v2: lookup indexes for the scheduler and the command surface
    &[
        "CREATE INDEX IF NOT EXISTS idx_monitors_active ON monitors(active, id)",
        "CREATE INDEX IF NOT EXISTS idx_monitors_owner ON monitors(owner_id, id)",
    ],
    // v3: ledger rows belong to their monitor. Rebuild with a cascading
    // foreign key; orphans left by earlier versions are dropped.
    &[
        r#"
        CREATE TABLE alerted_listings_v3 (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            monitor_id INTEGER NOT NULL REFERENCES monitors(id) ON DELETE CASCADE,
            fingerprint TEXT NOT NULL,
            price TEXT NOT NULL,
            seller_name TEXT NOT NULL,
            recorded_at TEXT NOT NULL,
            UNIQUE(monitor_id, fingerprint)
        )
        "#,
        r#"
        INSERT INTO alerted_listings_v3 (id, monitor_id, fingerprint, price, seller_name, recorded_at)
        SELECT id, monitor_id, fingerprint, price, seller_name, recorded_at
        FROM alerted_listings
        WHERE monitor_id IN (SELECT id FROM monitors)
        "#,
        "DROP TABLE alerted_listings",
        "ALTER TABLE alerted_listings_v3 RENAME TO alerted_listings",
    ],
];

/// Handle to the pricewatch database. Cheap to clone (wraps a pool).
#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (creating if missing) the database at `database_url` and bring
    /// the schema up to date.
    pub async fn open(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("Invalid database URL: {database_url}"))?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Full)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open database: {database_url}"))?;

        let store = Self { pool };
        store.migrate().await?;
        info!(url = database_url, "Store opened");
        Ok(store)
    }

    /// Private in-memory database, used by tests and dry runs.
    ///
    /// Pinned to a single connection that never expires: each SQLite
    /// in-memory connection is its own database.
    pub async fn open_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .context("Invalid in-memory database URL")?
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .context("Failed to open in-memory database")?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Apply every migration newer than the recorded schema version.
    /// Running it against an up-to-date database does nothing.
    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create schema_version table")?;

        let current = self.schema_version().await?;
        let target = MIGRATIONS.len() as i64;

        for (idx, statements) in MIGRATIONS.iter().enumerate() {
            let version = idx as i64 + 1;
            if version <= current {
                continue;
            }

            let mut tx = self.pool.begin().await.context("Failed to begin migration")?;
            for &sql in statements.iter() {
                sqlx::query(sql)
                    .execute(&mut *tx)
                    .await
                    .with_context(|| format!("Migration to v{version} failed"))?;
            }
            sqlx::query("INSERT INTO schema_version (version, applied_at) VALUES (?, ?)")
                .bind(version)
                .bind(chrono::Utc::now())
                .execute(&mut *tx)
                .await
                .with_context(|| format!("Failed to record schema v{version}"))?;
            tx.commit()
                .await
                .with_context(|| format!("Failed to commit schema v{version}"))?;

            info!(version, "Schema migrated");
        }

        debug!(from = current, to = target, "Schema up to date");
        Ok(())
    }

    /// Highest applied schema version (0 for a fresh database).
    pub async fn schema_version(&self) -> Result<i64> {
        let version: i64 =
            sqlx::query_scalar("SELECT COALESCE(MAX(version), 0) FROM schema_version")
                .fetch_one(&self.pool)
                .await
                .context("Failed to read schema version")?;
        Ok(version)
    }

    /// Close the pool, waiting for in-flight statements.
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Store closed");
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

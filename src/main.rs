//! pricewatch — marketplace price-target monitor
//!
//! Entry point. Loads configuration, initialises structured logging,
//! opens the monitor database, and runs the sweep loop with graceful
//! shutdown. The HTTP API, when enabled, runs alongside on its own task.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

use pricewatch::api;
use pricewatch::config::{self, NotifierProvider};
use pricewatch::engine::commands::MonitorService;
use pricewatch::engine::evaluator::MonitorEvaluator;
use pricewatch::engine::scheduler::Scheduler;
use pricewatch::marketplace::tcgplayer::TcgPlayerClient;
use pricewatch::marketplace::ListingSource;
use pricewatch::notify::discord::DiscordNotifier;
use pricewatch::notify::log::LogNotifier;
use pricewatch::notify::NotificationSink;
use pricewatch::storage::Store;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let config_path =
        std::env::var("PRICEWATCH_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
    let cfg = config::AppConfig::load(&config_path)?;

    init_logging();

    info!(
        bot = %cfg.bot.name,
        poll_interval_secs = cfg.scheduler.poll_interval_secs,
        inter_monitor_delay_ms = cfg.scheduler.inter_monitor_delay_ms,
        "pricewatch starting up"
    );

    // -- Initialise components -------------------------------------------

    let store = Store::open(&cfg.storage.database_url).await?;

    let source: Arc<dyn ListingSource> = Arc::new(TcgPlayerClient::new(&cfg.marketplace)?);
    info!(
        source = source.name(),
        base_url = %cfg.marketplace.base_url,
        fetch_timeout_secs = cfg.marketplace.fetch_timeout_secs,
        "Listing source ready"
    );

    let sink: Arc<dyn NotificationSink> = match cfg.notifier.provider {
        NotifierProvider::Discord => match cfg.bot_token() {
            Some(token) => {
                info!(api_base = %cfg.notifier.api_base, "Using Discord notifier");
                Arc::new(
                    DiscordNotifier::new(token, &cfg.notifier.api_base)
                        .context("Failed to initialise Discord notifier")?,
                )
            }
            None => {
                warn!(
                    env = %cfg.notifier.bot_token_env,
                    "No bot token configured, alerts will only be logged (dry run)"
                );
                Arc::new(LogNotifier)
            }
        },
        NotifierProvider::Log => {
            info!("Log notifier selected, alerts will only be logged (dry run)");
            Arc::new(LogNotifier)
        }
    };

    let evaluator = MonitorEvaluator::new(
        source,
        Arc::new(store.clone()),
        sink,
        cfg.marketplace.fetch_timeout(),
    );
    let mut scheduler = Scheduler::new(
        Arc::new(store.clone()),
        evaluator,
        cfg.scheduler.poll_interval(),
        cfg.scheduler.inter_monitor_delay(),
    );

    if cfg.api.enabled {
        let service = MonitorService::new(Arc::new(store.clone()));
        api::spawn_api(Arc::new(service), cfg.api.port);
    }

    // -- Main loop -------------------------------------------------------

    info!("Entering monitor loop. Press Ctrl+C to stop.");
    scheduler.run_until(tokio::signal::ctrl_c()).await;

    store.close().await;
    info!(sweeps = scheduler.sweeps_run(), "pricewatch shut down cleanly.");

    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("pricewatch=info"));

    let json_logging = std::env::var("PRICEWATCH_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}

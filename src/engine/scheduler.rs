//! Sweep scheduler.
//!
//! On a fixed period, loads all active monitors and evaluates them one
//! at a time with a fixed pause between evaluations. Sequential
//! evaluation is the rate limit against the listings API; monitors are
//! never fetched concurrently.
//!
//! Timing: sweeps start on a `tokio::time::interval` tick with
//! `MissedTickBehavior::Delay`. The first sweep runs immediately; later
//! sweeps start one period after the previous scheduled start. A sweep
//! that overruns the period is followed immediately by the next one, and
//! the period is measured from that late start (no catch-up bursts).

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::engine::evaluator::MonitorEvaluator;
use crate::storage::MonitorStore;

// ---------------------------------------------------------------------------
// Sweep report
// ---------------------------------------------------------------------------

/// Summary of one pass over the active monitors.
#[derive(Debug, Clone)]
pub struct SweepReport {
    pub sweep_number: u64,
    pub monitors_active: usize,
    pub monitors_evaluated: usize,
    pub monitors_failed: usize,
    pub alerts_recorded: usize,
    pub deliveries_failed: usize,
    pub elapsed: Duration,
    pub started_at: DateTime<Utc>,
}

impl SweepReport {
    fn new(sweep_number: u64, started_at: DateTime<Utc>) -> Self {
        Self {
            sweep_number,
            monitors_active: 0,
            monitors_evaluated: 0,
            monitors_failed: 0,
            alerts_recorded: 0,
            deliveries_failed: 0,
            elapsed: Duration::ZERO,
            started_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

pub struct Scheduler {
    store: Arc<dyn MonitorStore>,
    evaluator: MonitorEvaluator,
    poll_interval: Duration,
    inter_monitor_delay: Duration,
    sweeps_run: u64,
}

impl Scheduler {
    pub fn new(
        store: Arc<dyn MonitorStore>,
        evaluator: MonitorEvaluator,
        poll_interval: Duration,
        inter_monitor_delay: Duration,
    ) -> Self {
        Self {
            store,
            evaluator,
            poll_interval,
            inter_monitor_delay,
            sweeps_run: 0,
        }
    }

    /// Run one sweep over all active monitors.
    ///
    /// Fails only if the active monitor list cannot be queried. Errors from
    /// individual monitors, including rows that fail to decode, are logged
    /// and counted and never stop the sweep.
    pub async fn run_sweep(&mut self) -> Result<SweepReport> {
        self.sweeps_run += 1;
        let started = Instant::now();
        let mut report = SweepReport::new(self.sweeps_run, Utc::now());

        let active = self.store.load_active().await?;
        report.monitors_active = active.total();

        // Undecodable rows were already logged by the store; they count as
        // failures and the rest of the sweep goes ahead.
        report.monitors_failed += active.corrupt.len();

        for (i, monitor) in active.monitors.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.inter_monitor_delay).await;
            }

            let mut alerts = Vec::new();
            let outcome = self.evaluator.evaluate_into(monitor, &mut alerts).await;

            report.alerts_recorded += alerts.len();
            report.deliveries_failed += alerts.iter().filter(|a| !a.delivered).count();

            match outcome {
                Ok(()) => report.monitors_evaluated += 1,
                Err(e) => {
                    report.monitors_failed += 1;
                    warn!(
                        monitor_id = monitor.id,
                        product_id = %monitor.product_id,
                        error = %e,
                        "Monitor evaluation failed, continuing sweep"
                    );
                }
            }
        }

        report.elapsed = started.elapsed();
        Ok(report)
    }

    /// Run sweeps on the configured period until `shutdown` resolves.
    ///
    /// Shutdown is observed between sweeps; a sweep in progress finishes.
    pub async fn run_until<F>(&mut self, shutdown: F)
    where
        F: Future,
    {
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!(
            interval_secs = self.poll_interval.as_secs(),
            delay_ms = self.inter_monitor_delay.as_millis() as u64,
            "Monitor loop started"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.run_sweep().await {
                        Ok(report) => log_sweep_report(&report),
                        Err(e) => error!(error = %e, "Sweep failed, continuing to next"),
                    }
                }
                _ = &mut shutdown => {
                    info!(sweeps = self.sweeps_run, "Shutdown signal received, monitor loop stopped");
                    break;
                }
            }
        }
    }

    pub fn sweeps_run(&self) -> u64 {
        self.sweeps_run
    }
}

/// Log a sweep summary. Empty sweeps only log at debug.
fn log_sweep_report(report: &SweepReport) {
    if report.monitors_active == 0 {
        tracing::debug!(sweep = report.sweep_number, "No active monitors");
        return;
    }
    info!(
        sweep = report.sweep_number,
        active = report.monitors_active,
        evaluated = report.monitors_evaluated,
        failed = report.monitors_failed,
        alerts = report.alerts_recorded,
        delivery_failures = report.deliveries_failed,
        elapsed_ms = report.elapsed.as_millis() as u64,
        "Sweep complete"
    );
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

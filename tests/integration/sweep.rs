//! Sweep-level behaviour against a real SQLite store.

use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;

use pricewatch::engine::commands::MonitorService;
use pricewatch::engine::evaluator::MonitorEvaluator;
use pricewatch::engine::scheduler::Scheduler;
use pricewatch::storage::{DedupLedger, MonitorStore, Store};
use pricewatch::types::{AlertKind, ListingKind, Monitor, MonitorError};

use crate::mock_marketplace::{listing, MockMarketplace, RecordingNotifier};

fn url(product_id: &str) -> String {
    format!("https://www.tcgplayer.com/product/{product_id}/test-card")
}

struct Harness {
    store: Store,
    market: Arc<MockMarketplace>,
    notifier: Arc<RecordingNotifier>,
    service: MonitorService,
    scheduler: Scheduler,
}

impl Harness {
    async fn new(inter_monitor_delay: Duration) -> Self {
        let store = Store::open_in_memory().await.unwrap();
        let market = Arc::new(MockMarketplace::new());
        let notifier = Arc::new(RecordingNotifier::new());

        let evaluator = MonitorEvaluator::new(
            market.clone(),
            Arc::new(store.clone()),
            notifier.clone(),
            Duration::from_secs(5),
        );
        let scheduler = Scheduler::new(
            Arc::new(store.clone()),
            evaluator,
            Duration::from_secs(90),
            inter_monitor_delay,
        );
        let service = MonitorService::new(Arc::new(store.clone()));

        Self { store, market, notifier, service, scheduler }
    }

    /// A second evaluator over the same store, market and notifier.
    fn evaluator(&self) -> MonitorEvaluator {
        MonitorEvaluator::new(
            self.market.clone(),
            Arc::new(self.store.clone()),
            self.notifier.clone(),
            Duration::from_secs(5),
        )
    }

    async fn add(&self, product_id: &str, max: Option<rust_decimal::Decimal>, min: Option<rust_decimal::Decimal>) -> Monitor {
        self.service
            .add_monitor("owner-1", &url(product_id), max, min)
            .await
            .unwrap()
    }
}

#[tokio::test]
async fn test_buy_alert_sent_once_across_sweeps() {
    let mut h = Harness::new(Duration::from_millis(1)).await;
    let m = h.add("100", Some(dec!(10)), None).await;
    h.market.set_listings("100", vec![listing("CardShop", dec!(8.00), dec!(1.50))]);

    let first = h.scheduler.run_sweep().await.unwrap();
    assert_eq!(first.alerts_recorded, 1);

    let sent = h.notifier.sent();
    assert_eq!(sent.len(), 1);
    let (owner, alert) = &sent[0];
    assert_eq!(owner, "owner-1");
    assert_eq!(alert.kind, AlertKind::Buy);
    assert_eq!(alert.monitor_id, m.id);
    assert_eq!(alert.field("Total"), Some("$9.50"));
    assert_eq!(alert.field("Seller"), Some("CardShop"));

    for _ in 0..3 {
        let report = h.scheduler.run_sweep().await.unwrap();
        assert_eq!(report.alerts_recorded, 0);
    }
    assert_eq!(h.notifier.sent().len(), 1);
    assert_eq!(h.store.count(m.id).await.unwrap(), 1);
}

#[tokio::test]
async fn test_sell_alert_only_for_listing_at_or_above_target() {
    let mut h = Harness::new(Duration::from_millis(1)).await;
    h.add("200", None, Some(dec!(50))).await;
    h.market.set_listings(
        "200",
        vec![
            listing("Cheap", dec!(45), dec!(0)),
            listing("Pricey", dec!(55), dec!(0)),
        ],
    );

    h.scheduler.run_sweep().await.unwrap();

    let sent = h.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].1.kind, AlertKind::Sell);
    assert_eq!(sent[0].1.field("Seller"), Some("Pricey"));
}

#[tokio::test]
async fn test_buy_wins_when_both_targets_match() {
    let mut h = Harness::new(Duration::from_millis(1)).await;
    h.add("300", Some(dec!(50)), Some(dec!(40))).await;
    h.market.set_listings("300", vec![listing("Shop", dec!(45), dec!(0))]);

    h.scheduler.run_sweep().await.unwrap();

    let sent = h.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].1.kind, AlertKind::Buy);
}

#[tokio::test]
async fn test_new_price_from_same_seller_alerts_again() {
    let mut h = Harness::new(Duration::from_millis(1)).await;
    let m = h.add("400", Some(dec!(20)), None).await;
    h.market.set_listings("400", vec![listing("Shop", dec!(15), dec!(0))]);
    h.scheduler.run_sweep().await.unwrap();

    h.market.set_listings("400", vec![listing("Shop", dec!(14), dec!(0))]);
    h.scheduler.run_sweep().await.unwrap();

    assert_eq!(h.notifier.sent().len(), 2);
    assert_eq!(h.store.count(m.id).await.unwrap(), 2);
}

#[tokio::test]
async fn test_non_standard_listings_ignored() {
    let mut h = Harness::new(Duration::from_millis(1)).await;
    let m = h.add("500", Some(dec!(20)), None).await;
    let mut custom = listing("Shop", dec!(1), dec!(0));
    custom.listing_kind = ListingKind::Other("custom".to_string());
    h.market.set_listings("500", vec![custom]);

    let report = h.scheduler.run_sweep().await.unwrap();
    assert_eq!(report.monitors_evaluated, 1);
    assert!(h.notifier.sent().is_empty());
    assert_eq!(h.store.count(m.id).await.unwrap(), 0);
}

#[tokio::test]
async fn test_failing_product_does_not_block_others() {
    let mut h = Harness::new(Duration::from_millis(1)).await;
    let a = h.add("1", Some(dec!(10)), None).await;
    let b = h.add("2", Some(dec!(10)), None).await;
    let c = h.add("3", Some(dec!(10)), None).await;
    for p in ["1", "2", "3"] {
        h.market.set_listings(p, vec![listing("Shop", dec!(5), dec!(0))]);
    }
    h.market.fail_product("2");

    let report = h.scheduler.run_sweep().await.unwrap();
    assert_eq!(report.monitors_failed, 1);
    assert_eq!(report.monitors_evaluated, 2);
    assert_eq!(h.market.fetched(), vec!["1", "2", "3"]);

    assert_eq!(h.store.count(a.id).await.unwrap(), 1);
    assert_eq!(h.store.count(b.id).await.unwrap(), 0);
    assert_eq!(h.store.count(c.id).await.unwrap(), 1);
}

#[tokio::test]
async fn test_fetches_are_spaced_by_inter_monitor_delay() {
    let delay = Duration::from_millis(30);
    let mut h = Harness::new(delay).await;
    for p in ["1", "2", "3"] {
        h.add(p, Some(dec!(10)), None).await;
    }

    h.scheduler.run_sweep().await.unwrap();

    let times = h.market.fetch_times();
    assert_eq!(times.len(), 3);
    for pair in times.windows(2) {
        assert!(pair[1].duration_since(pair[0]) >= delay);
    }
}

#[tokio::test]
async fn test_paused_monitor_not_fetched_until_resumed() {
    let mut h = Harness::new(Duration::from_millis(1)).await;
    let m = h.add("600", Some(dec!(10)), None).await;
    h.market.set_listings("600", vec![listing("Shop", dec!(5), dec!(0))]);

    h.service.pause_monitor(m.id, "owner-1").await.unwrap();
    let report = h.scheduler.run_sweep().await.unwrap();
    assert_eq!(report.monitors_active, 0);
    assert!(h.market.fetched().is_empty());

    h.service.resume_monitor(m.id, "owner-1").await.unwrap();
    h.scheduler.run_sweep().await.unwrap();
    assert_eq!(h.market.fetched(), vec!["600"]);
    assert_eq!(h.notifier.sent().len(), 1);
}

#[tokio::test]
async fn test_failed_delivery_is_not_retried() {
    let mut h = Harness::new(Duration::from_millis(1)).await;
    let m = h.add("700", Some(dec!(10)), None).await;
    h.market.set_listings("700", vec![listing("Shop", dec!(5), dec!(0))]);

    h.notifier.set_failing(true);
    let report = h.scheduler.run_sweep().await.unwrap();
    assert_eq!(report.alerts_recorded, 1);
    assert_eq!(report.deliveries_failed, 1);
    assert_eq!(h.store.count(m.id).await.unwrap(), 1);

    h.notifier.set_failing(false);
    h.scheduler.run_sweep().await.unwrap();
    assert!(h.notifier.sent().is_empty());
}

#[tokio::test]
async fn test_rejected_monitor_persists_nothing() {
    let h = Harness::new(Duration::from_millis(1)).await;

    let err = h
        .service
        .add_monitor("owner-1", &url("800"), None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, MonitorError::Validation(_)));

    let err = h
        .service
        .add_monitor("owner-1", "https://example.com/not-a-product", Some(dec!(5)), None)
        .await
        .unwrap_err();
    assert!(matches!(err, MonitorError::Validation(_)));

    assert!(h.store.list_active().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_remove_clears_dedup_history() {
    let mut h = Harness::new(Duration::from_millis(1)).await;
    let m = h.add("900", Some(dec!(10)), None).await;
    h.market.set_listings("900", vec![listing("Shop", dec!(5), dec!(0))]);
    h.scheduler.run_sweep().await.unwrap();
    assert_eq!(h.store.count(m.id).await.unwrap(), 1);

    h.service.remove_monitor(m.id, "owner-1").await.unwrap();
    assert!(h.store.get(m.id).await.unwrap().is_none());
    assert_eq!(h.store.count(m.id).await.unwrap(), 0);

    h.scheduler.run_sweep().await.unwrap();
    assert_eq!(h.market.fetched(), vec!["900"]);
}

#[tokio::test]
async fn test_monitor_removed_after_sweep_snapshot_sends_nothing() {
    let h = Harness::new(Duration::from_millis(1)).await;
    let m = h.add("950", Some(dec!(10)), None).await;
    h.market.set_listings("950", vec![listing("Shop", dec!(5), dec!(0))]);

    // The sweep has already loaded the monitor when the owner removes it.
    let snapshot = h.store.list_active().await.unwrap();
    assert_eq!(snapshot.len(), 1);
    h.service.remove_monitor(m.id, "owner-1").await.unwrap();

    let alerts = h.evaluator().evaluate(&snapshot[0]).await.unwrap();
    assert!(alerts.is_empty());
    assert!(h.notifier.sent().is_empty());
    assert_eq!(h.store.count(m.id).await.unwrap(), 0);
}

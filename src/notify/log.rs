//! Log-only sink for dry runs: alerts are written to the tracing output
//! instead of being sent anywhere.

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use super::{AlertMessage, NotificationSink};

#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl NotificationSink for LogNotifier {
    async fn send(&self, owner_id: &str, alert: &AlertMessage) -> Result<()> {
        info!(
            owner_id,
            monitor_id = alert.monitor_id,
            kind = %alert.kind,
            "[DRY RUN] {}",
            alert.to_plain_text()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{AlertField, BUY_COLOUR};
    use crate::types::AlertKind;
    use chrono::Utc;

    #[tokio::test]
    async fn test_send_always_succeeds() {
        let alert = AlertMessage {
            monitor_id: 3,
            kind: AlertKind::Buy,
            title: "Buy alert: Black Lotus".to_string(),
            url: "https://www.tcgplayer.com/product/12345/black-lotus".to_string(),
            colour: BUY_COLOUR,
            fields: vec![AlertField {
                name: "Seller",
                value: "CardShop".to_string(),
            }],
            timestamp: Utc::now(),
        };

        assert!(LogNotifier.send("u1", &alert).await.is_ok());
        assert!(LogNotifier.send("", &alert).await.is_ok());
    }
}

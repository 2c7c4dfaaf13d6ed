//! Discord direct-message delivery.
//!
//! API docs: https://discord.com/developers/docs/resources/user#create-dm
//! Flow: `POST /users/@me/channels {recipient_id}` to open (or fetch) the
//! DM channel, then `POST /channels/{id}/messages` with one embed.
//! Auth: `Authorization: Bot {token}`.
//!
//! DM channel ids are cached per recipient; Discord returns the same
//! channel for repeated create-DM calls, so the cache only saves requests.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

use super::{AlertMessage, NotificationSink};

const REQUEST_TIMEOUT_SECS: u64 = 10;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct CreateDmRequest<'a> {
    recipient_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct Channel {
    id: String,
}

#[derive(Debug, Serialize)]
struct CreateMessageRequest {
    embeds: Vec<Embed>,
}

#[derive(Debug, Serialize)]
struct Embed {
    title: String,
    url: String,
    color: u32,
    fields: Vec<EmbedField>,
    timestamp: String,
}

#[derive(Debug, Serialize)]
struct EmbedField {
    name: String,
    value: String,
    inline: bool,
}

impl From<&AlertMessage> for Embed {
    fn from(alert: &AlertMessage) -> Self {
        Embed {
            title: alert.title.clone(),
            url: alert.url.clone(),
            color: alert.colour,
            fields: alert
                .fields
                .iter()
                .map(|f| EmbedField {
                    name: f.name.to_string(),
                    value: f.value.clone(),
                    inline: true,
                })
                .collect(),
            timestamp: alert.timestamp.to_rfc3339(),
        }
    }
}

// ---------------------------------------------------------------------------
// Notifier
// ---------------------------------------------------------------------------

/// Sends alerts as Discord DMs from the bot account.
pub struct DiscordNotifier {
    http: Client,
    api_base: String,
    token: SecretString,
    dm_channels: RwLock<HashMap<String, String>>,
}

impl DiscordNotifier {
    pub fn new(token: SecretString, api_base: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent("DiscordBot (https://github.com/pricewatch, 0.1.0)")
            .build()
            .context("Failed to build HTTP client for Discord")?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            token,
            dm_channels: RwLock::new(HashMap::new()),
        })
    }

    fn auth_header(&self) -> String {
        format!("Bot {}", self.token.expose_secret())
    }

    /// Open (or reuse) the DM channel with a user.
    async fn dm_channel(&self, user_id: &str) -> Result<String> {
        if let Some(id) = self.dm_channels.read().await.get(user_id) {
            return Ok(id.clone());
        }

        let resp = self
            .http
            .post(format!("{}/users/@me/channels", self.api_base))
            .header("Authorization", self.auth_header())
            .json(&CreateDmRequest { recipient_id: user_id })
            .send()
            .await
            .context("Discord create-DM request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Discord create-DM error {status}: {body}");
        }

        let channel: Channel = resp
            .json()
            .await
            .context("Failed to parse Discord channel response")?;

        debug!(user_id, channel_id = %channel.id, "Opened DM channel");
        self.dm_channels
            .write()
            .await
            .insert(user_id.to_string(), channel.id.clone());
        Ok(channel.id)
    }
}

#[async_trait]
impl NotificationSink for DiscordNotifier {
    async fn send(&self, owner_id: &str, alert: &AlertMessage) -> Result<()> {
        let channel_id = self.dm_channel(owner_id).await?;

        let resp = self
            .http
            .post(format!("{}/channels/{channel_id}/messages", self.api_base))
            .header("Authorization", self.auth_header())
            .json(&CreateMessageRequest {
                embeds: vec![Embed::from(alert)],
            })
            .send()
            .await
            .context("Discord create-message request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            // A stale cached channel is the likeliest cause of a 404.
            if status == reqwest::StatusCode::NOT_FOUND {
                self.dm_channels.write().await.remove(owner_id);
            }
            anyhow::bail!("Discord create-message error {status}: {body}");
        }

        Ok(())
    }
}

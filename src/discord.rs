//! Discord channel delivery

use crate::config::{Config, DiscordApi};
use crate::error::{FlyerError, Result};
use crate::format::OPENSEA_ICON_URL;
use crate::types::DisplayRecord;
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

/// Destination for formatted records
#[async_trait]
pub trait DeliverySink: Send + Sync {
    async fn deliver(&self, record: &DisplayRecord) -> Result<()>;
}

/// A text channel resolved through the Discord bot REST API
pub struct DiscordChannel {
    client: Client,
    base_url: String,
    token: String,
    channel_id: String,
    channel_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CurrentUser {
    id: String,
    username: String,
}

#[derive(Debug, Deserialize)]
struct Channel {
    id: String,
    #[serde(default)]
    name: Option<String>,
}

impl DiscordChannel {
    /// Log in with the configured bot token and resolve the configured channel
    pub async fn connect(config: &Config) -> Result<Self> {
        Self::connect_to(
            DiscordApi::BASE_URL,
            &config.discord_bot_token,
            &config.discord_channel_id,
        )
        .await
    }

    /// Same as `connect`, against an explicit API base URL
    pub async fn connect_to(base_url: &str, token: &str, channel_id: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        let mut channel = Self {
            client,
            base_url: base_url.to_string(),
            token: token.to_string(),
            channel_id: channel_id.to_string(),
            channel_name: None,
        };

        let user: CurrentUser = channel
            .get_json(&DiscordApi::current_user_url(base_url), "bot login")
            .await?;
        info!("Logged in to Discord as {} ({})", user.username, user.id);

        let resolved: Channel = channel
            .get_json(&DiscordApi::channel_url(base_url, channel_id), "channel lookup")
            .await?;
        info!(
            "Posting to channel #{} ({})",
            resolved.name.as_deref().unwrap_or("unnamed"),
            resolved.id
        );
        channel.channel_name = resolved.name;

        Ok(channel)
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    pub fn channel_name(&self) -> Option<&str> {
        self.channel_name.as_deref()
    }

    fn auth_header(&self) -> String {
        format!("Bot {}", self.token)
    }

    /// Startup request; any rejection is a configuration problem
    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str, what: &str) -> Result<T> {
        let response = self
            .client
            .get(url)
            .header("Authorization", self.auth_header())
            .send()
            .await?;

        let response = reject_failure(response)
            .await
            .map_err(|body| FlyerError::Config(format!("Discord {} failed: {}", what, body)))?;

        Ok(response.json().await?)
    }
}

/// Pass through a 2xx response, otherwise return `"<status>: <body>"`
async fn reject_failure(response: Response) -> std::result::Result<Response, String> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(format!("{}: {}", status, body))
}

/// Discord rejects embed fields with empty values
fn field_value(value: &str) -> &str {
    if value.trim().is_empty() {
        "Unknown"
    } else {
        value
    }
}

/// Build the `POST /channels/{id}/messages` body for one record
pub fn embed_payload(record: &DisplayRecord) -> Value {
    let fields: Vec<Value> = record
        .fields
        .iter()
        .map(|f| {
            json!({
                "name": f.label,
                "value": field_value(&f.value),
                "inline": false
            })
        })
        .collect();

    let mut embed = json!({
        "title": record.title,
        "color": record.color,
        "fields": fields,
        "footer": {
            "text": record.footer,
            "icon_url": OPENSEA_ICON_URL
        }
    });

    if let Some(url) = &record.url {
        embed["url"] = json!(url);
    }
    if let Some(image_url) = &record.image_url {
        embed["image"] = json!({ "url": image_url });
    }
    if let Some(timestamp) = &record.timestamp {
        embed["timestamp"] = json!(timestamp.to_rfc3339());
    }

    json!({ "embeds": [embed] })
}

#[async_trait]
impl DeliverySink for DiscordChannel {
    async fn deliver(&self, record: &DisplayRecord) -> Result<()> {
        let url = DiscordApi::messages_url(&self.base_url, &self.channel_id);

        let response = self
            .client
            .post(&url)
            .header("Authorization", self.auth_header())
            .json(&embed_payload(record))
            .send()
            .await
            .map_err(|e| FlyerError::Delivery(format!("request failed: {}", e)))?;

        reject_failure(response)
            .await
            .map_err(|body| FlyerError::Delivery(format!("Discord rejected message: {}", body)))?;

        debug!("Discord message sent: {}", record.title);
        Ok(())
    }
}

//! Configuration management for the OpenSea flyer

use crate::error::{FlyerError, Result};
use std::env;
use std::time::Duration;

/// Contract address of the OpenSea shared storefront. Assets minted there
/// belong to many collections, so filtering by it is meaningless.
pub const SHARED_STOREFRONT_ADDRESS: &str = "0x495f947276749Ce646f68AC8c248420045cb7b5e";

/// Upper bound for `SECONDS` (one week)
pub const MAX_POLL_INTERVAL_SECONDS: u64 = 7 * 24 * 60 * 60;

/// Bot configuration loaded from environment
#[derive(Debug, Clone)]
pub struct Config {
    /// Discord bot token used for the REST session
    pub discord_bot_token: String,

    /// Channel that receives every message
    pub discord_channel_id: String,

    /// OpenSea collection slug to watch
    pub collection_slug: String,

    /// Asset contract filter (None when unset)
    pub contract_address: Option<String>,

    /// Poll interval in seconds; also the lookback window
    pub poll_interval_seconds: u64,

    /// Prefix for synthesized asset names ("<label> #<token id>")
    pub collection_label: String,

    /// Optional `event_type` filter passed to the API
    pub event_type: Option<String>,

    /// Optional result limit passed to the API
    pub event_limit: Option<u32>,

    /// Optional OpenSea API key
    pub opensea_api_key: Option<String>,

    /// Pause after each delivered message in milliseconds (default: 500)
    pub send_delay_ms: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let require = |key: &str| {
            get(key).ok_or_else(|| FlyerError::Config(format!("{} is required", key)))
        };

        let discord_bot_token = require("DISCORD_BOT_TOKEN")?;
        let discord_channel_id = require("DISCORD_CHANNEL_ID")?;
        let collection_slug = require("COLLECTION_SLUG")?;

        let contract_address = get("CONTRACT_ADDRESS");

        let poll_interval_seconds = parse_number(&get, "SECONDS")?.unwrap_or(3600);
        if poll_interval_seconds == 0 {
            return Err(FlyerError::Config("SECONDS must be greater than zero".to_string()));
        }
        if poll_interval_seconds > MAX_POLL_INTERVAL_SECONDS {
            return Err(FlyerError::Config(format!(
                "SECONDS must be at most {}, got {}",
                MAX_POLL_INTERVAL_SECONDS, poll_interval_seconds
            )));
        }

        let collection_label = get("COLLECTION_LABEL").unwrap_or_else(|| "EverDragons".to_string());
        let event_type = get("EVENT_TYPE");
        let event_limit = parse_number(&get, "EVENT_LIMIT")?;
        let opensea_api_key = get("OPENSEA_API_KEY");
        let send_delay_ms = parse_number(&get, "SEND_DELAY_MS")?.unwrap_or(500);

        Ok(Self {
            discord_bot_token,
            discord_channel_id,
            collection_slug,
            contract_address,
            poll_interval_seconds,
            collection_label,
            event_type,
            event_limit,
            opensea_api_key,
            send_delay_ms,
        })
    }

    /// Contract address to send to the API, if filtering applies
    pub fn contract_filter(&self) -> Option<&str> {
        self.contract_address
            .as_deref()
            .filter(|addr| !addr.eq_ignore_ascii_case(SHARED_STOREFRONT_ADDRESS))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    pub fn send_delay(&self) -> Duration {
        Duration::from_millis(self.send_delay_ms)
    }
}

fn parse_number<T, G>(get: &G, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| FlyerError::Config(format!("{} must be a non-negative integer, got {:?}", key, raw))),
        None => Ok(None),
    }
}

/// OpenSea API configuration
pub struct OpenSeaApi;

impl OpenSeaApi {
    pub const BASE_URL: &'static str = "https://api.opensea.io";

    pub fn events_url(base: &str) -> String {
        format!("{}/api/v1/events", base.trim_end_matches('/'))
    }
}

/// Discord REST API configuration
pub struct DiscordApi;

impl DiscordApi {
    pub const BASE_URL: &'static str = "https://discord.com/api/v10";

    pub fn current_user_url(base: &str) -> String {
        format!("{}/users/@me", base.trim_end_matches('/'))
    }

    pub fn channel_url(base: &str, channel_id: &str) -> String {
        format!("{}/channels/{}", base.trim_end_matches('/'), channel_id)
    }

    pub fn messages_url(base: &str, channel_id: &str) -> String {
        format!("{}/messages", Self::channel_url(base, channel_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("DISCORD_BOT_TOKEN", "token"),
        ("DISCORD_CHANNEL_ID", "123"),
        ("COLLECTION_SLUG", "everdragons"),
    ];

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&REQUIRED)).unwrap();
        assert_eq!(config.poll_interval_seconds, 3600);
        assert_eq!(config.collection_label, "EverDragons");
        assert_eq!(config.send_delay(), Duration::from_millis(500));
        assert!(config.contract_filter().is_none());
        assert!(config.event_limit.is_none());
    }

    #[test]
    fn test_missing_required_setting() {
        let err = Config::from_lookup(lookup(&REQUIRED[..2])).unwrap_err();
        assert!(matches!(err, FlyerError::Config(ref msg) if msg.contains("COLLECTION_SLUG")));
    }

    #[test]
    fn test_empty_value_counts_as_missing() {
        let mut pairs = REQUIRED.to_vec();
        pairs[0] = ("DISCORD_BOT_TOKEN", "  ");
        assert!(Config::from_lookup(lookup(&pairs)).is_err());
    }

    #[test]
    fn test_invalid_interval() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("SECONDS", "soon"));
        assert!(Config::from_lookup(lookup(&pairs)).is_err());

        let mut pairs = REQUIRED.to_vec();
        pairs.push(("SECONDS", "0"));
        assert!(Config::from_lookup(lookup(&pairs)).is_err());
    }

    #[test]
    fn test_interval_upper_bound() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("SECONDS", "9223372036854775808"));
        let err = Config::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(matches!(err, FlyerError::Config(ref msg) if msg.contains("SECONDS")));

        let mut pairs = REQUIRED.to_vec();
        pairs.push(("SECONDS", "604801"));
        assert!(Config::from_lookup(lookup(&pairs)).is_err());

        let mut pairs = REQUIRED.to_vec();
        pairs.push(("SECONDS", "604800"));
        let config = Config::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(config.poll_interval_seconds, MAX_POLL_INTERVAL_SECONDS);
    }

    #[test]
    fn test_shared_storefront_disables_contract_filter() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("CONTRACT_ADDRESS", "0x495F947276749ce646F68AC8C248420045CB7B5E"));
        let config = Config::from_lookup(lookup(&pairs)).unwrap();
        assert!(config.contract_filter().is_none());

        let mut pairs = REQUIRED.to_vec();
        pairs.push(("CONTRACT_ADDRESS", "0x1111111111111111111111111111111111111111"));
        let config = Config::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(config.contract_filter(), Some("0x1111111111111111111111111111111111111111"));
    }

    #[test]
    fn test_api_urls() {
        assert_eq!(OpenSeaApi::events_url("http://x/"), "http://x/api/v1/events");
        assert_eq!(DiscordApi::messages_url("http://d", "42"), "http://d/channels/42/messages");
    }
}

//! Event source backed by the OpenSea v1 events API

use crate::config::{Config, OpenSeaApi};
use crate::error::{FlyerError, Result};
use crate::types::{Asset, Counterparties, EventKind, PaymentToken, RawEvent};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::Client;
use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Anything that can list marketplace events that occurred after a unix timestamp.
///
/// Implementations return events in the order the upstream API does, which
/// for OpenSea is newest first.
#[async_trait]
pub trait EventSource: Send + Sync {
    async fn fetch_events(&self, occurred_after: i64) -> Result<Vec<RawEvent>>;
}

/// Client for `GET /api/v1/events`
pub struct OpenSeaClient {
    client: Client,
    base_url: String,
    collection_slug: String,
    contract_address: Option<String>,
    event_type: Option<String>,
    limit: Option<u32>,
    api_key: Option<String>,
}

/// Raw event as returned by the API. Only the fields we use are decoded.
#[derive(Debug, Deserialize)]
struct ApiEvent {
    event_type: String,
    #[serde(default)]
    asset: Option<ApiAsset>,
    #[serde(default)]
    seller: Option<ApiAccount>,
    #[serde(default)]
    winner_account: Option<ApiAccount>,
    #[serde(default)]
    from_account: Option<ApiAccount>,
    #[serde(default)]
    to_account: Option<ApiAccount>,
    #[serde(default, deserialize_with = "string_or_number")]
    total_price: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    starting_price: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    bid_amount: Option<String>,
    #[serde(default)]
    payment_token: Option<ApiPaymentToken>,
    #[serde(default)]
    created_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiAsset {
    #[serde(default, deserialize_with = "string_or_number")]
    token_id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    permalink: Option<String>,
    #[serde(default)]
    image_original_url: Option<String>,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    collection: Option<ApiCollection>,
}

#[derive(Debug, Deserialize)]
struct ApiCollection {
    #[serde(default)]
    slug: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiAccount {
    #[serde(default)]
    address: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiPaymentToken {
    #[serde(default)]
    symbol: Option<String>,
    #[serde(default)]
    decimals: Option<u32>,
}

/// Accept prices and token ids encoded either as JSON strings or integers
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(de::Error::custom(format!(
            "expected string or number, got {}",
            other
        ))),
    }
}

fn address(account: &Option<ApiAccount>) -> Option<String> {
    account
        .as_ref()
        .and_then(|a| a.address.clone())
        .filter(|a| !a.is_empty())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Parse `created_date`. OpenSea sends naive UTC timestamps without a zone.
fn parse_created_date(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|d| d.and_utc())
        })
}

impl ApiEvent {
    fn into_raw(self) -> Result<RawEvent> {
        let kind = EventKind::from_api(&self.event_type);

        let asset = match self.asset {
            Some(asset) => {
                let token_id = asset.token_id.ok_or_else(|| {
                    FlyerError::MalformedEvent(format!("{} event asset has no token_id", kind))
                })?;
                let image_url = non_empty(asset.image_original_url).or(non_empty(asset.image_url));

                Some(Asset {
                    token_id,
                    name: non_empty(asset.name),
                    permalink: non_empty(asset.permalink),
                    image_url,
                    collection_slug: asset.collection.and_then(|c| c.slug),
                })
            }
            None => None,
        };

        let buyer = match kind {
            EventKind::BidEntered => address(&self.from_account).or(address(&self.winner_account)),
            _ => address(&self.winner_account),
        };
        let counterparties = Counterparties {
            seller: address(&self.seller),
            buyer,
            from: address(&self.from_account),
            to: address(&self.to_account),
        };

        let amount = match kind {
            EventKind::Sale => self.total_price,
            EventKind::AuctionCreated => self.starting_price,
            EventKind::BidEntered | EventKind::OfferEntered => self.bid_amount,
            EventKind::Transfer | EventKind::Unsupported(_) => None,
        };

        let payment_token = match self.payment_token {
            Some(token) => {
                let symbol = match token.symbol.as_deref() {
                    None | Some("") | Some("ETH") => PaymentToken::ETHER_SYMBOL.to_string(),
                    Some(other) => other.to_string(),
                };
                PaymentToken {
                    symbol,
                    decimals: token.decimals.unwrap_or(18),
                }
            }
            None => PaymentToken::ether(),
        };

        let occurred_at = self.created_date.as_deref().and_then(|raw| {
            let parsed = parse_created_date(raw);
            if parsed.is_none() {
                debug!("Unparseable created_date {:?}", raw);
            }
            parsed
        });

        Ok(RawEvent {
            kind,
            asset,
            counterparties,
            amount,
            payment_token,
            occurred_at,
        })
    }
}

/// Extract events from a response body.
///
/// A body without an `asset_events` array yields no events. Elements that
/// fail to decode are logged and dropped individually.
pub fn decode_events(mut body: Value) -> Vec<RawEvent> {
    let items = match body.get_mut("asset_events").map(Value::take) {
        Some(Value::Array(items)) => items,
        _ => {
            debug!("Response has no asset_events array");
            return Vec::new();
        }
    };

    items
        .into_iter()
        .filter_map(|item| {
            let decoded = serde_json::from_value::<ApiEvent>(item)
                .map_err(|e| FlyerError::MalformedEvent(e.to_string()))
                .and_then(ApiEvent::into_raw);

            match decoded {
                Ok(event) => Some(event),
                Err(e) => {
                    warn!("Dropping event: {}", e);
                    None
                }
            }
        })
        .collect()
}

impl OpenSeaClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: OpenSeaApi::BASE_URL.to_string(),
            collection_slug: config.collection_slug.clone(),
            contract_address: config.contract_filter().map(str::to_string),
            event_type: config.event_type.clone(),
            limit: config.event_limit,
            api_key: config.opensea_api_key.clone(),
        })
    }

    /// Point the client at another host (used against mock servers)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Query parameters for one request, in the order they are sent
    pub fn query(&self, occurred_after: i64) -> Vec<(&'static str, String)> {
        let mut params = vec![("offset", "0".to_string())];

        if let Some(event_type) = &self.event_type {
            params.push(("event_type", event_type.clone()));
        }

        params.push(("only_opensea", "false".to_string()));
        params.push(("occurred_after", occurred_after.to_string()));
        params.push(("collection_slug", self.collection_slug.clone()));

        if let Some(contract) = &self.contract_address {
            params.push(("asset_contract_address", contract.clone()));
        }
        if let Some(limit) = self.limit {
            params.push(("limit", limit.to_string()));
        }

        params
    }
}

#[async_trait]
impl EventSource for OpenSeaClient {
    async fn fetch_events(&self, occurred_after: i64) -> Result<Vec<RawEvent>> {
        let url = OpenSeaApi::events_url(&self.base_url);
        debug!("Fetching events after {} from {}", occurred_after, url);

        let mut request = self.client.get(&url).query(&self.query(occurred_after));
        if let Some(key) = &self.api_key {
            request = request.header("X-API-KEY", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| FlyerError::SourceFetch(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(FlyerError::SourceFetch(format!("API error {}: {}", status, body)));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| FlyerError::SourceFetch(format!("invalid response body: {}", e)))?;

        let events = decode_events(body);
        debug!("Fetched {} events", events.len());
        Ok(events)
    }
}

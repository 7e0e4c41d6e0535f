//! Core types for the OpenSea flyer

use chrono::{DateTime, Utc};
use std::fmt;

/// Kind of marketplace event, as reported by the OpenSea `event_type` field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    Sale,
    AuctionCreated,
    BidEntered,
    OfferEntered,
    Transfer,
    /// Anything else; keeps the raw name for logging
    Unsupported(String),
}

impl EventKind {
    pub fn from_api(event_type: &str) -> Self {
        match event_type {
            "successful" => EventKind::Sale,
            "created" => EventKind::AuctionCreated,
            "bid_entered" => EventKind::BidEntered,
            "offer_entered" => EventKind::OfferEntered,
            "transfer" => EventKind::Transfer,
            other => EventKind::Unsupported(other.to_string()),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Sale => write!(f, "sale"),
            EventKind::AuctionCreated => write!(f, "auction"),
            EventKind::BidEntered => write!(f, "bid"),
            EventKind::OfferEntered => write!(f, "offer"),
            EventKind::Transfer => write!(f, "transfer"),
            EventKind::Unsupported(name) => write!(f, "unsupported({})", name),
        }
    }
}

/// The NFT an event refers to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Asset {
    pub token_id: String,
    pub name: Option<String>,
    pub permalink: Option<String>,
    pub image_url: Option<String>,
    /// Slug of the collection the asset belongs to, as reported by the API
    pub collection_slug: Option<String>,
}

/// Addresses involved in an event. Which ones are set depends on the kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Counterparties {
    pub seller: Option<String>,
    pub buyer: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

/// Currency a price is denominated in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentToken {
    pub symbol: String,
    pub decimals: u32,
}

impl PaymentToken {
    pub const ETHER_SYMBOL: &'static str = "Ξ";

    pub fn ether() -> Self {
        Self {
            symbol: Self::ETHER_SYMBOL.to_string(),
            decimals: 18,
        }
    }
}

impl Default for PaymentToken {
    fn default() -> Self {
        Self::ether()
    }
}

/// One marketplace occurrence, decoded from the event API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub kind: EventKind,
    pub asset: Option<Asset>,
    pub counterparties: Counterparties,
    /// Price in the smallest currency unit, kept as text to avoid float loss
    pub amount: Option<String>,
    pub payment_token: PaymentToken,
    pub occurred_at: Option<DateTime<Utc>>,
}

/// A labelled line of a chat message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub label: String,
    pub value: String,
}

impl Field {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// A formatted, ready-to-send message built from one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayRecord {
    pub title: String,
    /// Order is meaningful and part of the fingerprint
    pub fields: Vec<Field>,
    pub url: Option<String>,
    pub image_url: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub footer: String,
    pub color: u32,
}

//! Event classification and message formatting
//!
//! Turns a decoded marketplace event into the title and ordered field list
//! that gets posted to the channel. The field order produced here is also
//! what the dedupe fingerprint is computed over, so changing it changes
//! which events count as repeats.

use crate::error::{FlyerError, Result};
use crate::types::{Asset, DisplayRecord, EventKind, Field, PaymentToken, RawEvent};
use rust_decimal::Decimal;
use tracing::debug;

/// Footer icon shown next to the footer text
pub const OPENSEA_ICON_URL: &str = "https://files.readme.io/566c72b-opensea-logomark-full-colored.png";

const SALE_COLOR: u32 = 0x0099FF;
const AUCTION_COLOR: u32 = 0xF5A623;
const BID_COLOR: u32 = 0x7ED321;
const OFFER_COLOR: u32 = 0x9013FE;
const TRANSFER_COLOR: u32 = 0x9B9B9B;

/// Build the display record for an event.
///
/// Returns `Ok(None)` when the event should be skipped: it has no asset, or
/// its kind is not one we post. A price that cannot be read exactly is a
/// `MalformedEvent` error.
pub fn classify(raw: &RawEvent, collection_label: &str) -> Result<Option<DisplayRecord>> {
    let Some(asset) = &raw.asset else {
        debug!("Skipping {} event without an asset", raw.kind);
        return Ok(None);
    };

    let name = display_name(asset, collection_label);
    let parties = &raw.counterparties;
    let address = |addr: &Option<String>| addr.clone().unwrap_or_default();
    let price = || {
        format_price(raw.amount.as_deref(), &raw.payment_token).map_err(|e| match e {
            FlyerError::MalformedEvent(msg) => {
                FlyerError::MalformedEvent(format!("{} for {}: {}", raw.kind, name, msg))
            }
            other => other,
        })
    };

    let (title, fields, footer, color) = match &raw.kind {
        EventKind::Sale => (
            format!("{} sold!", name),
            vec![
                Field::new("Seller", address(&parties.seller)),
                Field::new("Buyer", address(&parties.buyer)),
                Field::new("Price", price()?),
            ],
            "Sold on OpenSea",
            SALE_COLOR,
        ),
        EventKind::AuctionCreated => (
            format!("{} is on auction!", name),
            vec![
                Field::new("Seller", address(&parties.seller)),
                Field::new("Price", price()?),
            ],
            "Listed on OpenSea",
            AUCTION_COLOR,
        ),
        EventKind::BidEntered => (
            format!("New bid for {}", name),
            vec![
                Field::new("Buyer", address(&parties.buyer)),
                Field::new("Price", price()?),
            ],
            "Bid on OpenSea",
            BID_COLOR,
        ),
        EventKind::OfferEntered => (
            format!("New offer for {}", name),
            vec![
                Field::new("From", address(&parties.from)),
                Field::new("Price", price()?),
            ],
            "Offer on OpenSea",
            OFFER_COLOR,
        ),
        EventKind::Transfer => (
            format!("{} transferred", name),
            vec![
                Field::new("From", address(&parties.from)),
                Field::new("To", address(&parties.to)),
            ],
            "Transferred on OpenSea",
            TRANSFER_COLOR,
        ),
        EventKind::Unsupported(event_type) => {
            debug!("Unsupported event type {:?} for {}, skipping", event_type, name);
            return Ok(None);
        }
    };

    Ok(Some(DisplayRecord {
        title,
        fields,
        url: asset.permalink.clone(),
        image_url: asset.image_url.as_deref().map(normalize_image_url),
        timestamp: raw.occurred_at,
        footer: footer.to_string(),
        color,
    }))
}

/// Asset name, or `"<label> #<token id>"` when the asset is unnamed
pub fn display_name(asset: &Asset, collection_label: &str) -> String {
    match asset.name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => format!("{} #{}", collection_label, asset.token_id),
    }
}

/// Render an amount in smallest units as `"<decimal><symbol>"`.
///
/// A missing amount renders as zero.
pub fn format_price(amount: Option<&str>, token: &PaymentToken) -> Result<String> {
    let value = to_display_units(amount.unwrap_or("0"), token.decimals)?;
    Ok(format!("{}{}", render_decimal(value), token.symbol))
}

/// Shift an integer amount in smallest units down by `decimals` places.
///
/// The shift only moves the scale, the mantissa is never rounded.
pub fn to_display_units(amount: &str, decimals: u32) -> Result<Decimal> {
    let trimmed = amount.trim();
    let mut value = Decimal::from_str_exact(trimmed)
        .map_err(|e| FlyerError::MalformedEvent(format!("invalid amount {:?}: {}", trimmed, e)))?;

    value
        .set_scale(value.scale() + decimals)
        .map_err(|e| FlyerError::MalformedEvent(format!("amount {:?} out of range: {}", trimmed, e)))?;

    Ok(value)
}

/// `0` for zero, `N.0` for whole amounts, trimmed fraction otherwise
fn render_decimal(value: Decimal) -> String {
    if value.is_zero() {
        return "0".to_string();
    }

    let value = value.normalize();
    if value.fract().is_zero() {
        format!("{}.0", value)
    } else {
        value.to_string()
    }
}

/// Swap a trailing `.svg` for `.png`; the chat client does not render SVG
pub fn normalize_image_url(url: &str) -> String {
    let split = url.len().checked_sub(4).filter(|&i| url.is_char_boundary(i));

    match split {
        Some(i) if url[i..].eq_ignore_ascii_case(".svg") => format!("{}.png", &url[..i]),
        _ => url.to_string(),
    }
}

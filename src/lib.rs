//! OpenSea Flyer Library
//!
//! Watches one OpenSea collection and posts its activity to a Discord
//! channel. Each poll fetches the events of the last interval, turns every
//! sale, auction, bid, offer and transfer into an embed, drops anything
//! already posted during this process lifetime, and sends the rest oldest
//! first.

pub mod config;
pub mod discord;
pub mod error;
pub mod flyer;
pub mod format;
pub mod ledger;
pub mod opensea;
pub mod types;

pub use config::Config;
pub use discord::{DeliverySink, DiscordChannel};
pub use error::FlyerError;
pub use flyer::{CycleReport, Flyer, PollState};
pub use format::classify;
pub use ledger::{fingerprint, Fingerprint, Ledger};
pub use opensea::{EventSource, OpenSeaClient};
pub use types::{Asset, Counterparties, DisplayRecord, EventKind, Field, PaymentToken, RawEvent};

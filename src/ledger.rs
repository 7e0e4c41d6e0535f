//! In-memory deduplication of posted events
//!
//! Consecutive poll windows can return the same event twice. Every record
//! that makes it past classification is fingerprinted and remembered for the
//! lifetime of the process, so a repeat is dropped instead of re-posted.

use crate::error::Result;
use crate::format::classify;
use crate::types::{DisplayRecord, RawEvent};
use serde::Serialize;
use sha2::{Digest, Sha512};
use std::collections::HashSet;
use std::fmt;

/// SHA-512 digest of a record's title and fields, hex encoded
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Canonical form hashed for a fingerprint. Field order is fixed by the
/// struct definition, fields serialize as `[label, value]` pairs.
#[derive(Serialize)]
struct CanonicalRecord<'a> {
    title: &'a str,
    fields: Vec<[&'a str; 2]>,
}

/// Compute the fingerprint of a record
pub fn fingerprint(record: &DisplayRecord) -> Fingerprint {
    let canonical = CanonicalRecord {
        title: &record.title,
        fields: record
            .fields
            .iter()
            .map(|f| [f.label.as_str(), f.value.as_str()])
            .collect(),
    };

    // Serializing borrowed strings into a Vec cannot fail
    let bytes = serde_json::to_vec(&canonical).unwrap_or_default();

    let mut hasher = Sha512::new();
    hasher.update(&bytes);
    Fingerprint(hex::encode(hasher.finalize()))
}

/// Set of fingerprints already delivered (or attempted) by this process.
///
/// Grows for the lifetime of the process; nothing is ever evicted.
#[derive(Debug, Default)]
pub struct Ledger {
    seen: HashSet<Fingerprint>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seen(&self, fp: &Fingerprint) -> bool {
        self.seen.contains(fp)
    }

    pub fn mark_seen(&mut self, fp: Fingerprint) {
        self.seen.insert(fp);
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Classify an event and admit it only if it has not been seen before.
    ///
    /// A repeat returns `Ok(None)` and leaves the ledger untouched; a new
    /// record is marked before it is returned.
    pub fn classify_and_filter(
        &mut self,
        raw: &RawEvent,
        collection_label: &str,
    ) -> Result<Option<DisplayRecord>> {
        let Some(record) = classify(raw, collection_label)? else {
            return Ok(None);
        };

        let fp = fingerprint(&record);
        if self.seen(&fp) {
            return Ok(None);
        }

        self.mark_seen(fp);
        Ok(Some(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Asset, Counterparties, EventKind, Field, PaymentToken};

    fn record(title: &str, fields: &[(&str, &str)]) -> DisplayRecord {
        DisplayRecord {
            title: title.to_string(),
            fields: fields.iter().map(|(l, v)| Field::new(*l, *v)).collect(),
            url: None,
            image_url: None,
            timestamp: None,
            footer: "Sold on OpenSea".to_string(),
            color: 0,
        }
    }

    fn sale(token_id: &str) -> RawEvent {
        RawEvent {
            kind: EventKind::Sale,
            asset: Some(Asset {
                token_id: token_id.to_string(),
                ..Default::default()
            }),
            counterparties: Counterparties {
                seller: Some("0xseller".to_string()),
                buyer: Some("0xbuyer".to_string()),
                ..Default::default()
            },
            amount: Some("1000000000000000000".to_string()),
            payment_token: PaymentToken::ether(),
            occurred_at: None,
        }
    }

    #[test]
    fn test_fingerprint_is_deterministic() {
        let a = record("EverDragons #1 sold!", &[("Seller", "s"), ("Buyer", "b")]);
        let b = record("EverDragons #1 sold!", &[("Seller", "s"), ("Buyer", "b")]);
        assert_eq!(fingerprint(&a), fingerprint(&b));
        // 512 bits, hex encoded
        assert_eq!(fingerprint(&a).as_str().len(), 128);
    }

    #[test]
    fn test_fingerprint_ignores_presentation() {
        let a = record("EverDragons #1 sold!", &[("Seller", "s")]);
        let mut b = a.clone();
        b.url = Some("https://opensea.io".to_string());
        b.color = 0xFFFFFF;
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn test_fingerprint_depends_on_order_and_values() {
        let base = record("t", &[("Seller", "s"), ("Buyer", "b")]);
        let swapped = record("t", &[("Buyer", "b"), ("Seller", "s")]);
        let changed = record("t", &[("Seller", "s"), ("Buyer", "c")]);
        let retitled = record("u", &[("Seller", "s"), ("Buyer", "b")]);

        assert_ne!(fingerprint(&base), fingerprint(&swapped));
        assert_ne!(fingerprint(&base), fingerprint(&changed));
        assert_ne!(fingerprint(&base), fingerprint(&retitled));
    }

    #[test]
    fn test_fingerprint_field_boundaries() {
        // Concatenation of label and value must not collide
        let a = record("t", &[("ab", "c")]);
        let b = record("t", &[("a", "bc")]);
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn test_classify_and_filter_is_idempotent() {
        let mut ledger = Ledger::new();
        let raw = sale("7");

        assert!(ledger.classify_and_filter(&raw, "EverDragons").unwrap().is_some());
        assert_eq!(ledger.len(), 1);

        assert!(ledger.classify_and_filter(&raw.clone(), "EverDragons").unwrap().is_none());
        assert_eq!(ledger.len(), 1);

        assert!(ledger.classify_and_filter(&sale("8"), "EverDragons").unwrap().is_some());
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn test_skipped_events_are_not_marked() {
        let mut ledger = Ledger::new();
        let mut raw = sale("7");
        raw.asset = None;

        assert!(ledger.classify_and_filter(&raw, "EverDragons").unwrap().is_none());
        assert!(ledger.is_empty());
    }
}

//! Poll loop: fetch, classify, dedupe, deliver, sleep

use crate::config::Config;
use crate::discord::DeliverySink;
use crate::ledger::Ledger;
use crate::opensea::EventSource;
use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Where the loop currently is within a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Fetching,
    Processing,
    Sleeping,
}

/// Counters for one fetch/deliver cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Events returned by the source
    pub fetched: usize,
    /// Messages accepted by the sink
    pub delivered: usize,
    /// Events skipped as unsupported, asset-less or already seen
    pub skipped: usize,
    /// Events dropped because their content could not be formatted
    pub malformed: usize,
    /// Messages the sink rejected
    pub failed: usize,
    /// The fetch itself failed
    pub fetch_failed: bool,
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.fetch_failed {
            return write!(f, "fetch failed");
        }
        write!(
            f,
            "{} fetched, {} delivered, {} skipped, {} malformed, {} failed",
            self.fetched, self.delivered, self.skipped, self.malformed, self.failed
        )
    }
}

/// Drives the fetch → classify → dedupe → deliver cycle for one collection.
///
/// Owns the dedupe ledger. Cycles never overlap: the next fetch starts only
/// after the previous cycle and the interval sleep have finished.
pub struct Flyer<S, D> {
    source: S,
    sink: D,
    ledger: Ledger,
    collection_label: String,
    interval: Duration,
    send_delay: Duration,
    state: PollState,
}

impl<S: EventSource, D: DeliverySink> Flyer<S, D> {
    pub fn new(source: S, sink: D, config: &Config) -> Self {
        Self {
            source,
            sink,
            ledger: Ledger::new(),
            collection_label: config.collection_label.clone(),
            interval: config.poll_interval(),
            send_delay: config.send_delay(),
            state: PollState::Idle,
        }
    }

    /// Override the poll interval and the pause between messages
    pub fn with_timing(mut self, interval: Duration, send_delay: Duration) -> Self {
        self.interval = interval;
        self.send_delay = send_delay;
        self
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    fn set_state(&mut self, state: PollState) {
        if self.state != state {
            debug!("Poll state {:?} -> {:?}", self.state, state);
            self.state = state;
        }
    }

    /// Run cycles until the process is terminated
    pub async fn run(&mut self) {
        info!(
            "Polling every {}s for {} events",
            self.interval.as_secs(),
            self.collection_label
        );

        loop {
            let report = self.run_cycle().await;
            info!("Cycle complete: {} ({} seen)", report, self.ledger.len());

            self.set_state(PollState::Sleeping);
            tokio::time::sleep(self.interval).await;
        }
    }

    /// One cycle with the lookback window ending now
    pub async fn run_cycle(&mut self) -> CycleReport {
        self.run_cycle_at(Utc::now()).await
    }

    /// One cycle with the lookback window ending at `now`.
    ///
    /// Never fails: fetch and delivery errors are logged and counted.
    pub async fn run_cycle_at(&mut self, now: DateTime<Utc>) -> CycleReport {
        let mut report = CycleReport::default();
        let window = i64::try_from(self.interval.as_secs()).unwrap_or(i64::MAX);
        let occurred_after = now.timestamp().saturating_sub(window);

        self.set_state(PollState::Fetching);
        let mut events = match self.source.fetch_events(occurred_after).await {
            Ok(events) => events,
            Err(e) => {
                error!("Event fetch failed: {}", e);
                report.fetch_failed = true;
                self.set_state(PollState::Idle);
                return report;
            }
        };

        self.set_state(PollState::Processing);
        report.fetched = events.len();

        // Source is newest first; post oldest first
        events.reverse();

        for raw in &events {
            let record = match self.ledger.classify_and_filter(raw, &self.collection_label) {
                Ok(Some(record)) => record,
                Ok(None) => {
                    report.skipped += 1;
                    continue;
                }
                Err(e) => {
                    warn!("Skipping event: {}", e);
                    report.malformed += 1;
                    continue;
                }
            };

            match self.sink.deliver(&record).await {
                Ok(()) => {
                    info!("Posted: {}", record.title);
                    report.delivered += 1;
                    if !self.send_delay.is_zero() {
                        tokio::time::sleep(self.send_delay).await;
                    }
                }
                Err(e) => {
                    // Stays marked in the ledger; not retried
                    error!("Failed to post {}: {}", record.title, e);
                    report.failed += 1;
                }
            }
        }

        self.set_state(PollState::Idle);
        report
    }
}

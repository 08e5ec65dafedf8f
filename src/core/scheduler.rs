use anyhow::Result;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use super::config::MonitorConfig;
use crate::api::ExchangeFeed;
use crate::monitoring::reporter::{format_alert, format_repeated_failures};
use crate::monitoring::{KnownState, Notifier, StateStore};
use crate::scanner::{ListingEvent, NewListingDetector};

/// Consecutive failed cycles that trigger one meta-alert.
pub const MAX_CONSECUTIVE_FAILURES: u32 = 5;

#[derive(Debug, Error)]
pub enum CycleError {
    #[error("all {attempted} exchange requests failed, last error: {last_error}")]
    AllSourcesFailed { attempted: usize, last_error: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Bootstrap,
    Steady,
}

/// Counts consecutive failed cycles and decides when to escalate.
#[derive(Debug, Clone)]
pub struct FailureTracker {
    consecutive: u32,
    threshold: u32,
}

impl FailureTracker {
    pub fn new(threshold: u32) -> Self {
        Self {
            consecutive: 0,
            threshold: threshold.max(1),
        }
    }

    pub fn consecutive(&self) -> u32 {
        self.consecutive
    }

    pub fn record_success(&mut self) {
        self.consecutive = 0;
    }

    /// Returns the failure count when the threshold is hit, resetting to 0.
    pub fn record_failure(&mut self) -> Option<u32> {
        self.consecutive += 1;
        if self.consecutive >= self.threshold {
            let reached = self.consecutive;
            self.consecutive = 0;
            Some(reached)
        } else {
            None
        }
    }
}

#[derive(Debug, Default)]
pub struct CycleReport {
    pub events: Vec<ListingEvent>,
    pub delivered: usize,
    pub fetch_failures: usize,
    pub persisted: bool,
}

/// Drives fetch, diff, notify and persist once per interval.
///
/// Owns the [`KnownState`] exclusively; feeds are checked sequentially in
/// the order given.
pub struct Scheduler {
    feeds: Vec<Arc<dyn ExchangeFeed>>,
    notifier: Arc<dyn Notifier>,
    store: StateStore,
    state: KnownState,
    interval: Duration,
    failures: FailureTracker,
    phase: Phase,
}

impl Scheduler {
    pub fn new(
        config: &MonitorConfig,
        feeds: Vec<Arc<dyn ExchangeFeed>>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let store = StateStore::new(config.state_file.clone());
        let state = store.load();

        Self {
            feeds,
            notifier,
            store,
            state,
            interval: Duration::from_secs(config.check_interval_secs),
            failures: FailureTracker::new(MAX_CONSECUTIVE_FAILURES),
            phase: Phase::Bootstrap,
        }
    }

    pub fn state(&self) -> &KnownState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.failures.consecutive()
    }

    /// Seeds the known state on first run, without notifying. Returns whether
    /// a baseline was taken.
    pub async fn bootstrap(&mut self) -> bool {
        if self.phase == Phase::Steady {
            return false;
        }
        self.phase = Phase::Steady;

        if !self.state.needs_bootstrap() {
            return false;
        }

        tracing::info!("First run - loading existing market data...");
        for feed in &self.feeds {
            NewListingDetector::baseline(feed.as_ref(), &mut self.state).await;
        }
        self.persist();
        tracing::info!("Initial data loaded. Now monitoring for new listings...");
        true
    }

    /// One pass over every feed. Fails only when no request succeeded.
    pub async fn run_cycle(&mut self) -> Result<CycleReport, CycleError> {
        let mut report = CycleReport::default();
        let mut attempted = 0;
        let mut last_error = None;
        let mut seen_keys = HashSet::new();

        for feed in &self.feeds {
            let check = NewListingDetector::check(feed.as_ref(), &mut self.state).await;

            attempted += check.attempted;
            report.fetch_failures += check.failures.len();
            if let Some((_, e)) = check.failures.last() {
                last_error = Some(format!("{}: {}", feed.exchange(), e));
            }

            for event in check.events {
                if !seen_keys.insert(event.key.clone()) {
                    continue;
                }
                tracing::info!(
                    ">>> NEW {} LISTING: {}",
                    event.exchange.name().to_uppercase(),
                    event.coin_symbol
                );
                if self.notifier.deliver(&format_alert(&event)).await {
                    report.delivered += 1;
                }
                report.events.push(event);
            }
        }

        if attempted > 0 && report.fetch_failures == attempted {
            return Err(CycleError::AllSourcesFailed {
                attempted,
                last_error: last_error.unwrap_or_default(),
            });
        }

        report.persisted = self.persist();

        if !report.events.is_empty() {
            tracing::info!("Found {} new listing(s)!", report.events.len());
        }
        Ok(report)
    }

    /// Runs one cycle with failure accounting and meta-alerting.
    pub async fn tick(&mut self) -> Result<CycleReport, CycleError> {
        let outcome = self.run_cycle().await;

        match &outcome {
            Ok(_) => self.failures.record_success(),
            Err(e) => {
                tracing::error!(
                    "Loop error (#{}): {}",
                    self.failures.consecutive() + 1,
                    e
                );
                if let Some(count) = self.failures.record_failure() {
                    self.notifier
                        .deliver(&format_repeated_failures(count, &e.to_string()))
                        .await;
                }
            }
        }

        outcome
    }

    /// Bootstraps if needed, then polls until the process is stopped.
    pub async fn run(&mut self) -> Result<()> {
        self.bootstrap().await;

        loop {
            tracing::info!("Checking for new listings...");
            // Failures are already logged and counted by tick.
            let _ = self.tick().await;
            tokio::time::sleep(self.interval).await;
        }
    }

    fn persist(&self) -> bool {
        match self.store.save(&self.state) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("Error saving data: {:#}", e);
                false
            }
        }
    }
}

//! Live results poller.
//!
//! One timer task refreshes in the background while callers may trigger
//! manual refreshes at any time. All requests draw from one sequence counter
//! and only the newest response is ever applied to the view.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::{ClientResult, ElectionApi, Notice};
use crate::types::ResultsSummary;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollPhase {
    /// No results received yet
    Loading,
    Ready,
    /// A manual refresh is in flight; previous results stay visible
    Refreshing,
    /// Last refresh failed; previous results stay visible
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultsView {
    pub phase: PollPhase,
    pub results: Option<ResultsSummary>,
    pub last_updated: Option<DateTime<Utc>>,
    /// Sequence number of the response currently displayed (0 = none)
    pub applied_seq: u64,
    pub notice: Option<Notice>,
}

impl Default for ResultsView {
    fn default() -> Self {
        Self {
            phase: PollPhase::Loading,
            results: None,
            last_updated: None,
            applied_seq: 0,
            notice: None,
        }
    }
}

/// Shared between the timer task and manual refreshes
struct Dispatcher {
    api: Arc<dyn ElectionApi>,
    next_seq: AtomicU64,
    view: watch::Sender<ResultsView>,
}

impl Dispatcher {
    fn new(api: Arc<dyn ElectionApi>) -> Self {
        let (view, _) = watch::channel(ResultsView::default());
        Self {
            api,
            next_seq: AtomicU64::new(0),
            view,
        }
    }

    /// Claim a sequence number for a new request
    fn begin(&self, manual: bool) -> u64 {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst) + 1;
        if manual {
            self.view.send_if_modified(|view| {
                if view.results.is_some() && view.phase != PollPhase::Refreshing {
                    view.phase = PollPhase::Refreshing;
                    true
                } else {
                    false
                }
            });
        }
        seq
    }

    /// Apply a response unless a newer one is already displayed
    fn apply(&self, seq: u64, outcome: &ClientResult<ResultsSummary>, manual: bool) {
        self.view.send_modify(|view| {
            if seq < view.applied_seq {
                tracing::debug!(seq, applied = view.applied_seq, "Dropping stale results response");
                if view.phase == PollPhase::Refreshing {
                    view.phase = PollPhase::Ready;
                }
                return;
            }

            match outcome {
                Ok(summary) => {
                    view.results = Some(summary.clone());
                    view.last_updated = Some(Utc::now());
                    view.applied_seq = seq;
                    view.phase = PollPhase::Ready;
                    view.notice = manual.then(|| Notice::success("Results refreshed!"));
                }
                Err(e) => {
                    tracing::warn!(seq, error = %e, "Results refresh failed");
                    // Displayed results survive any failure
                    if view.results.is_some() {
                        view.phase = PollPhase::Error;
                        view.notice = Some(Notice::error("Failed to refresh results"));
                    } else {
                        view.phase = PollPhase::Loading;
                        view.notice = Some(Notice::error("Failed to load results"));
                    }
                }
            }
        });
    }

    async fn fetch(&self, manual: bool) -> ClientResult<()> {
        let seq = self.begin(manual);
        let outcome = self.api.results().await;
        self.apply(seq, &outcome, manual);
        outcome.map(|_| ())
    }
}

/// Handle to a running poller. Dropping it stops the timer task.
pub struct PollerHandle {
    dispatcher: Arc<Dispatcher>,
    timer: JoinHandle<()>,
}

impl PollerHandle {
    /// Start polling: one immediate fetch, then one per `interval`
    pub fn start(api: Arc<dyn ElectionApi>, interval: Duration) -> Self {
        let dispatcher = Arc::new(Dispatcher::new(api));
        let period = interval.max(Duration::from_millis(10));

        let timer = {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    // First tick completes immediately
                    ticker.tick().await;
                    let _ = dispatcher.fetch(false).await;
                }
            })
        };

        tracing::debug!(interval_ms = period.as_millis() as u64, "Results poller started");

        Self { dispatcher, timer }
    }

    /// Fetch now, concurrently with the timer
    pub async fn refresh_now(&self) -> ClientResult<()> {
        self.dispatcher.fetch(true).await
    }

    pub fn subscribe(&self) -> watch::Receiver<ResultsView> {
        self.dispatcher.view.subscribe()
    }

    /// Snapshot of the current view
    pub fn view(&self) -> ResultsView {
        self.dispatcher.view.borrow().clone()
    }

    /// Stop the timer task
    pub fn stop(self) {
        self.timer.abort();
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.timer.abort();
    }
}

//! The dispatch run loop.
//!
//! [`DispatchEngine::run`] walks the configured windows in order. For each
//! window it recomputes the pending pool from the ledger, selects up to the
//! window's capacity, waits until the window's target instant, then sends
//! to each selected recipient with a random pre-send jitter, recording the
//! outcome in the ledger as it goes.
//!
//! The run ends early once the pending pool is empty, and stops cleanly
//! (not an error) when the cancellation token fires. Ledger failures abort
//! the run; transport failures are recorded per-recipient and the loop
//! continues.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use rand::Rng;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::contacts::Recipient;
use crate::dispatch::clock::{Clock, SystemClock};
use crate::dispatch::schedule::Window;
use crate::error::Result;
use crate::ledger::{DeliveryLedger, DeliveryStatus};
use crate::transport::{MessagePayload, MessageTransport};

// ---------------------------------------------------------------------------
// Pacing
// ---------------------------------------------------------------------------

/// Pacing knobs for a dispatch run.
#[derive(Debug, Clone)]
pub struct PacingConfig {
    /// How often the wait loop re-checks the clock before a window opens.
    pub poll_interval: Duration,
    /// Lower bound of the random pre-send delay, in seconds.
    pub jitter_min_secs: u64,
    /// Upper bound (inclusive) of the random pre-send delay, in seconds.
    pub jitter_max_secs: u64,
    /// Pause between consecutive recipients within a window.
    pub pause_between: Duration,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            jitter_min_secs: 2,
            jitter_max_secs: 10,
            pause_between: Duration::from_secs(1),
        }
    }
}

impl PacingConfig {
    /// No delays at all. For tests and rehearsals where real pacing would
    /// only slow things down.
    #[must_use]
    pub fn immediate() -> Self {
        Self {
            poll_interval: Duration::ZERO,
            jitter_min_secs: 0,
            jitter_max_secs: 0,
            pause_between: Duration::ZERO,
        }
    }
}

// ---------------------------------------------------------------------------
// Events and report
// ---------------------------------------------------------------------------

/// Progress events emitted during a run.
///
/// Every recipient-level transition is mirrored here so a UI can render a
/// live view. Events are dropped silently when no consumer is attached.
#[derive(Debug, Clone)]
pub enum DispatchEvent {
    /// A window reached the front of the queue.
    WindowOpened {
        index: usize,
        target: DateTime<Local>,
        selected: usize,
    },
    /// The engine is waiting for the window's target instant.
    Waiting {
        index: usize,
        target: DateTime<Local>,
    },
    /// Recipient turned out to be already sent at send time; no transport
    /// call was made.
    Skipped { recipient: Recipient },
    /// Pre-send jitter applied.
    Jitter { recipient: Recipient, secs: u64 },
    /// Dry-run rehearsal; no transport call, no ledger write.
    Rehearsed { recipient: Recipient },
    /// Transport accepted the message; the ledger records it as sent.
    Delivered { recipient: Recipient },
    /// Transport refused the message; the ledger records it as failed.
    SendFailed { recipient: Recipient, reason: String },
    /// Every selected recipient of the window was processed.
    WindowClosed { index: usize },
    /// The pending pool emptied; remaining windows are skipped.
    PoolDrained { remaining_windows: usize },
}

/// Summary of a completed (or cancelled) dispatch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Windows that opened (had at least one recipient selected).
    pub windows_opened: usize,
    /// Total recipients selected across all windows.
    pub selected: usize,
    /// Sends accepted by the transport.
    pub delivered: usize,
    /// Sends refused by the transport.
    pub failed: usize,
    /// Recipients skipped by the send-time ledger re-check.
    pub skipped: usize,
    /// Recipients rehearsed in dry-run mode.
    pub rehearsed: usize,
    /// Whether the run stopped on a cancellation signal.
    pub cancelled: bool,
}

/// Outcome of processing one selected recipient.
enum Outcome {
    Skipped,
    Rehearsed,
    Delivered,
    Failed,
    Cancelled,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Drives one campaign run across the configured windows.
pub struct DispatchEngine {
    ledger: Arc<DeliveryLedger>,
    transport: Arc<dyn MessageTransport>,
    recipients: Vec<Recipient>,
    windows: Vec<Window>,
    payload: MessagePayload,
    pacing: PacingConfig,
    clock: Arc<dyn Clock>,
    cancel: CancellationToken,
    events: Option<mpsc::UnboundedSender<DispatchEvent>>,
}

impl DispatchEngine {
    /// Create an engine with default pacing, the system clock, and a fresh
    /// cancellation token.
    pub fn new(
        ledger: Arc<DeliveryLedger>,
        transport: Arc<dyn MessageTransport>,
        recipients: Vec<Recipient>,
        windows: Vec<Window>,
        payload: MessagePayload,
    ) -> Self {
        Self {
            ledger,
            transport,
            recipients,
            windows,
            payload,
            pacing: PacingConfig::default(),
            clock: Arc::new(SystemClock),
            cancel: CancellationToken::new(),
            events: None,
        }
    }

    /// Override the pacing configuration.
    #[must_use]
    pub fn with_pacing(mut self, pacing: PacingConfig) -> Self {
        self.pacing = pacing;
        self
    }

    /// Override the time source.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Attach an external cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Attach a progress event channel.
    #[must_use]
    pub fn with_events(mut self, events: mpsc::UnboundedSender<DispatchEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Execute the run. Consumes the engine.
    ///
    /// With `dry_run` set, the full window walk happens (including waits
    /// and jitter) but no transport call is made and the ledger is never
    /// written.
    ///
    /// Cancellation yields `Ok` with [`DispatchReport::cancelled`] set;
    /// only configuration-independent storage failures return `Err`.
    pub async fn run(self, dry_run: bool) -> Result<DispatchReport> {
        let mut report = DispatchReport::default();
        let mut attempted: HashSet<Recipient> = HashSet::new();

        info!(
            recipients = self.recipients.len(),
            windows = self.windows.len(),
            dry_run,
            transport = self.transport.id(),
            "dispatch run started"
        );

        for (index, window) in self.windows.iter().enumerate() {
            // Recompute the pool fresh for every window: everyone not
            // recorded as sent, minus recipients this run already
            // attempted (sent, failed, or rehearsed).
            let mut pool = self.ledger.pending_or_failed(&self.recipients)?;
            let already_sent = self.recipients.len() - pool.len();
            pool.retain(|r| !attempted.contains(r));

            if pool.is_empty() {
                let remaining_windows = self.windows.len() - index;
                info!(remaining_windows, "pending pool drained; ending run early");
                self.emit(DispatchEvent::PoolDrained { remaining_windows });
                break;
            }

            let target = window.target_instant(self.clock.now());
            let batch: Vec<Recipient> = pool.into_iter().take(window.capacity).collect();
            if batch.is_empty() {
                debug!(window = index, "window has zero capacity; nothing selected");
                continue;
            }

            info!(
                window = index,
                target = %target,
                selected = batch.len(),
                capacity = window.capacity,
                already_sent,
                "window opened"
            );
            self.emit(DispatchEvent::WindowOpened {
                index,
                target,
                selected: batch.len(),
            });
            report.windows_opened += 1;
            report.selected += batch.len();

            for recipient in batch {
                if self.cancel.is_cancelled() {
                    info!("dispatch run cancelled");
                    report.cancelled = true;
                    return Ok(report);
                }

                match self.process_recipient(&recipient, index, target, dry_run).await? {
                    Outcome::Skipped => report.skipped += 1,
                    Outcome::Rehearsed => {
                        attempted.insert(recipient);
                        report.rehearsed += 1;
                    }
                    Outcome::Delivered => {
                        attempted.insert(recipient);
                        report.delivered += 1;
                    }
                    Outcome::Failed => {
                        attempted.insert(recipient);
                        report.failed += 1;
                    }
                    Outcome::Cancelled => {
                        info!("dispatch run cancelled");
                        report.cancelled = true;
                        return Ok(report);
                    }
                }

                if !self.idle(self.pacing.pause_between).await {
                    info!("dispatch run cancelled");
                    report.cancelled = true;
                    return Ok(report);
                }
            }

            self.emit(DispatchEvent::WindowClosed { index });
            debug!(window = index, "window closed");
        }

        info!(
            windows_opened = report.windows_opened,
            delivered = report.delivered,
            failed = report.failed,
            skipped = report.skipped,
            rehearsed = report.rehearsed,
            "dispatch run finished"
        );
        Ok(report)
    }

    /// Process one selected recipient through the full send procedure.
    ///
    /// Transport failures are recorded and swallowed here; only ledger
    /// failures propagate.
    async fn process_recipient(
        &self,
        recipient: &Recipient,
        window_index: usize,
        target: DateTime<Local>,
        dry_run: bool,
    ) -> Result<Outcome> {
        // Re-check at send time. The pool was computed when the window
        // opened; the ledger may have moved since.
        if self.ledger.is_sent(recipient)? {
            debug!(%recipient, "already sent; skipping");
            self.emit(DispatchEvent::Skipped {
                recipient: recipient.clone(),
            });
            return Ok(Outcome::Skipped);
        }

        if !self.wait_until(target, window_index).await {
            return Ok(Outcome::Cancelled);
        }

        let jitter_secs = self.draw_jitter();
        if jitter_secs > 0 {
            debug!(%recipient, jitter_secs, "applying pre-send jitter");
            self.emit(DispatchEvent::Jitter {
                recipient: recipient.clone(),
                secs: jitter_secs,
            });
            if !self.idle(Duration::from_secs(jitter_secs)).await {
                return Ok(Outcome::Cancelled);
            }
        }

        if dry_run {
            info!(%recipient, window = window_index, "dry run: would send");
            self.emit(DispatchEvent::Rehearsed {
                recipient: recipient.clone(),
            });
            return Ok(Outcome::Rehearsed);
        }

        match self.transport.send(recipient, &self.payload).await {
            Ok(()) => {
                // A ledger failure here aborts the run; the alternative
                // would be reporting a sent message as anything but sent.
                self.ledger.record_status(recipient, DeliveryStatus::Sent)?;
                info!(%recipient, window = window_index, "message delivered");
                self.emit(DispatchEvent::Delivered {
                    recipient: recipient.clone(),
                });
                Ok(Outcome::Delivered)
            }
            Err(e) => {
                self.ledger.record_status(recipient, DeliveryStatus::Failed)?;
                warn!(%recipient, window = window_index, error = %e, "send failed; recorded");
                self.emit(DispatchEvent::SendFailed {
                    recipient: recipient.clone(),
                    reason: e.to_string(),
                });
                Ok(Outcome::Failed)
            }
        }
    }

    /// Poll the clock until it reaches `target`. Returns `false` if the
    /// run was cancelled while waiting.
    async fn wait_until(&self, target: DateTime<Local>, window_index: usize) -> bool {
        let mut announced = false;
        loop {
            if self.clock.now() >= target {
                return true;
            }
            if !announced {
                info!(window = window_index, target = %target, "waiting for window to open");
                self.emit(DispatchEvent::Waiting {
                    index: window_index,
                    target,
                });
                announced = true;
            }
            tokio::select! {
                () = self.cancel.cancelled() => return false,
                () = tokio::time::sleep(self.pacing.poll_interval) => {}
            }
        }
    }

    /// Cancellable sleep. Returns `false` if cancelled first.
    async fn idle(&self, duration: Duration) -> bool {
        if duration.is_zero() {
            return !self.cancel.is_cancelled();
        }
        tokio::select! {
            () = self.cancel.cancelled() => false,
            () = tokio::time::sleep(duration) => true,
        }
    }

    /// Draw the pre-send jitter in whole seconds.
    fn draw_jitter(&self) -> u64 {
        let (min, max) = (self.pacing.jitter_min_secs, self.pacing.jitter_max_secs);
        if min >= max {
            // Range is validated at config load; a degenerate range means
            // a constant delay.
            return min;
        }
        rand::thread_rng().gen_range(min..=max)
    }

    fn emit(&self, event: DispatchEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

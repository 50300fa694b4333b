//! Outbound mail: transport abstraction and supervised background dispatch
//!
//! Handlers never wait on delivery. [`MailDispatcher::dispatch`] spawns a
//! tracked task bounded by a timeout; failures and timeouts are logged to the
//! `mail_dead_letter` target and counted, never retried and never surfaced to
//! the caller. On shutdown the tracker is closed and drained with a grace period.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Log target for messages that could not be delivered
pub const DEAD_LETTER_TARGET: &str = "mail_dead_letter";

/// A message to deliver
#[derive(Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
}

impl MailMessage {
    pub fn new(to: Vec<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to,
            subject: subject.into(),
            body: body.into(),
        }
    }
}

// Bodies carry one-time links, so Debug shows only addressing
impl std::fmt::Debug for MailMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailMessage")
            .field("to", &self.to)
            .field("subject", &self.subject)
            .finish_non_exhaustive()
    }
}

/// Mail delivery errors
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("mail transport error: {0}")]
    Transport(String),

    #[error("mail rejected: {0}")]
    Rejected(String),
}

/// Mail delivery abstraction
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Deliver a message or return an error
    async fn send(&self, message: &MailMessage) -> Result<(), MailError>;
}

/// Default transport that logs the message instead of delivering it
#[derive(Debug, Clone, Default)]
pub struct LogMailer {
    from: Option<String>,
}

impl LogMailer {
    pub fn new(from: Option<String>) -> Self {
        Self { from }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        info!(
            from = ?self.from,
            to = ?message.to,
            subject = %message.subject,
            "mail send stub"
        );
        debug!(body = %message.body, "mail body");
        Ok(())
    }
}

/// Delivery counters
#[derive(Debug, Default)]
struct DispatchCounters {
    dispatched: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
    timed_out: AtomicU64,
}

/// Point-in-time view of the dispatch counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchStats {
    pub dispatched: u64,
    pub delivered: u64,
    pub failed: u64,
    pub timed_out: u64,
}

/// Spawns supervised, time-bounded mail deliveries
#[derive(Clone)]
pub struct MailDispatcher {
    mailer: Arc<dyn Mailer>,
    tracker: TaskTracker,
    timeout: Duration,
    counters: Arc<DispatchCounters>,
}

impl MailDispatcher {
    /// Default bound on a single delivery
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

    pub fn new(mailer: Arc<dyn Mailer>, timeout: Duration) -> Self {
        Self {
            mailer,
            tracker: TaskTracker::new(),
            timeout,
            counters: Arc::new(DispatchCounters::default()),
        }
    }

    /// Queue a message for delivery in the background
    ///
    /// Must be called from within a Tokio runtime.
    pub fn dispatch(&self, message: MailMessage) {
        self.counters.dispatched.fetch_add(1, Ordering::Relaxed);

        if self.tracker.is_closed() {
            self.counters.failed.fetch_add(1, Ordering::Relaxed);
            error!(
                target: DEAD_LETTER_TARGET,
                to = ?message.to,
                subject = %message.subject,
                "Mail dropped: dispatcher is shutting down"
            );
            return;
        }

        let mailer = Arc::clone(&self.mailer);
        let counters = Arc::clone(&self.counters);
        let timeout = self.timeout;
        let span = info_span!("mail_dispatch", subject = %message.subject);

        self.tracker.spawn(
            async move {
                match tokio::time::timeout(timeout, mailer.send(&message)).await {
                    Ok(Ok(())) => {
                        counters.delivered.fetch_add(1, Ordering::Relaxed);
                        debug!("Mail delivered");
                    }
                    Ok(Err(e)) => {
                        counters.failed.fetch_add(1, Ordering::Relaxed);
                        error!(
                            target: DEAD_LETTER_TARGET,
                            to = ?message.to,
                            subject = %message.subject,
                            error = %e,
                            "Mail delivery failed"
                        );
                    }
                    Err(_) => {
                        counters.timed_out.fetch_add(1, Ordering::Relaxed);
                        error!(
                            target: DEAD_LETTER_TARGET,
                            to = ?message.to,
                            subject = %message.subject,
                            timeout_secs = timeout.as_secs(),
                            "Mail delivery timed out"
                        );
                    }
                }
            }
            .instrument(span),
        );
    }

    /// Number of deliveries still running
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Snapshot of the delivery counters
    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            dispatched: self.counters.dispatched.load(Ordering::Relaxed),
            delivered: self.counters.delivered.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            timed_out: self.counters.timed_out.load(Ordering::Relaxed),
        }
    }

    /// Stop accepting work and wait up to `grace` for running deliveries
    ///
    /// Returns `true` if everything finished in time.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.tracker.close();
        let pending = self.tracker.len();
        if pending == 0 {
            return true;
        }

        info!(pending, "Waiting for mail deliveries to finish");
        if tokio::time::timeout(grace, self.tracker.wait()).await.is_ok() {
            true
        } else {
            warn!(
                abandoned = self.tracker.len(),
                "Mail deliveries still running after shutdown grace period"
            );
            false
        }
    }
}

impl std::fmt::Debug for MailDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailDispatcher")
            .field("timeout", &self.timeout)
            .field("in_flight", &self.tracker.len())
            .finish_non_exhaustive()
    }
}

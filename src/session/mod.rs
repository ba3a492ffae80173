//! Polling sessions for verification results.
//!
//! A session tracks repeated lookups for one request:
//!
//! ```text
//!            ┌──────────────── tick: result found ───────────────► Succeeded
//!            │
//! Pending ───┼──── tick: attempts == max_attempts, no result ────► TimedOut
//!    ▲  │    │
//!    └──┘    └──────────────── tick: permanent error ────────────► Failed
//! tick: no result / transient error
//! ```
//!
//! Terminal states have no outgoing transition. A new submission starts a new
//! session; [`PollingSlot`] cancels the previous one first.

mod poller;

pub use poller::{PollingSlot, SessionConfig, SessionHandle};

use crate::client::{RequestId, ResultRecord};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

/// Shown while a session keeps polling after a failed tick.
pub const CONNECTIVITY_MESSAGE: &str =
    "Unable to reach the verification network. Still waiting for the result...";

/// Shown when a session gives up.
pub const TIMEOUT_MESSAGE: &str =
    "Verification is taking longer than expected. Please check back later.";

/// Shown when wallet pre-flight or upload fails.
pub const SUBMISSION_FAILED_MESSAGE: &str =
    "Could not submit the claim for verification. Check your wallet and try again.";

/// Status of a polling session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PollStatus {
    /// Still polling.
    Pending,
    /// A result was found.
    Succeeded,
    /// The attempt ceiling was reached without a result.
    TimedOut,
    /// A permanent error ended the session.
    Failed,
}

impl PollStatus {
    /// Whether no further ticks will run.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// What one tick did to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickReport {
    /// No result yet, still pending.
    NoResultYet {
        /// Tick number.
        attempt: u32,
    },
    /// The lookup failed but the next tick may succeed.
    TransientError {
        /// Tick number.
        attempt: u32,
        /// User-facing message.
        message: String,
    },
    /// The session succeeded.
    Succeeded {
        /// Tick number.
        attempt: u32,
        /// The result.
        record: ResultRecord,
    },
    /// The session timed out.
    TimedOut {
        /// Ticks performed.
        attempts: u32,
        /// Error from the final tick, if that tick failed.
        last_error: Option<String>,
    },
    /// The session failed permanently.
    Failed {
        /// Error description.
        message: String,
    },
    /// The session was already terminal; nothing changed.
    Ignored,
}

/// State of one polling session.
#[derive(Debug, Clone)]
pub struct PollingSession {
    request_id: RequestId,
    attempts: u32,
    max_attempts: u32,
    status: PollStatus,
    last_result: Option<ResultRecord>,
    last_error: Option<String>,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

impl PollingSession {
    /// Start a pending session. `max_attempts` of zero is treated as one.
    #[must_use]
    pub fn new(request_id: RequestId, max_attempts: u32) -> Self {
        Self {
            request_id,
            attempts: 0,
            max_attempts: max_attempts.max(1),
            status: PollStatus::Pending,
            last_result: None,
            last_error: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Request being polled.
    #[must_use]
    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    /// Ticks performed so far.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Tick ceiling.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> PollStatus {
        self.status
    }

    /// Whether the session has finished.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// The result, once succeeded.
    #[must_use]
    pub fn last_result(&self) -> Option<&ResultRecord> {
        self.last_result.as_ref()
    }

    /// Error from the most recent failed tick.
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// When the session started.
    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// When the session reached a terminal state.
    #[must_use]
    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// Apply the outcome of one lookup.
    pub fn record_tick(&mut self, outcome: Result<Option<ResultRecord>>) -> TickReport {
        if self.is_terminal() {
            return TickReport::Ignored;
        }

        self.attempts += 1;
        let attempt = self.attempts;
        let exhausted = attempt >= self.max_attempts;

        match outcome {
            Ok(Some(record)) => {
                info!(
                    "Result for {} found on attempt {attempt}: {} ({}%)",
                    self.request_id, record.verdict, record.confidence
                );
                self.last_result = Some(record.clone());
                self.finish(PollStatus::Succeeded);
                TickReport::Succeeded { attempt, record }
            }
            Ok(None) if exhausted => {
                self.finish(PollStatus::TimedOut);
                self.timed_out(None)
            }
            Ok(None) => {
                debug!("No result for {} on attempt {attempt}", self.request_id);
                TickReport::NoResultYet { attempt }
            }
            Err(e) if !e.is_retryable() => {
                warn!("Polling {} failed permanently: {e}", self.request_id);
                self.last_error = Some(e.to_string());
                self.finish(PollStatus::Failed);
                TickReport::Failed {
                    message: e.to_string(),
                }
            }
            Err(e) => {
                warn!("Polling {} attempt {attempt} failed: {e}", self.request_id);
                self.last_error = Some(e.to_string());
                if exhausted {
                    self.finish(PollStatus::TimedOut);
                    self.timed_out(Some(e.to_string()))
                } else {
                    TickReport::TransientError {
                        attempt,
                        message: CONNECTIVITY_MESSAGE.to_string(),
                    }
                }
            }
        }
    }

    fn timed_out(&self, last_error: Option<String>) -> TickReport {
        info!(
            "Polling {} timed out after {} attempts",
            self.request_id, self.attempts
        );
        TickReport::TimedOut {
            attempts: self.attempts,
            last_error,
        }
    }

    fn finish(&mut self, status: PollStatus) {
        self.status = status;
        self.finished_at = Some(Utc::now());
    }
}

/// Log a failed submission and return the message shown to the user.
///
/// No session is created for a failed submission, so it never enters `pending`.
#[must_use]
pub fn submission_failure(error: &Error) -> String {
    warn!("Claim submission failed: {error}");
    SUBMISSION_FAILED_MESSAGE.to_string()
}

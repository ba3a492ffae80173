//! Polling event system.

use crate::client::{RequestId, ResultRecord};
use tokio::sync::broadcast;

/// Events emitted while claims are submitted and polled.
#[derive(Debug, Clone)]
pub enum PollEvent {
    /// A session entered `pending`.
    SessionStarted {
        /// Request being polled.
        request_id: RequestId,
    },

    /// A tick completed without finding a result.
    NoResultYet {
        /// Request being polled.
        request_id: RequestId,
        /// Tick number, starting at 1.
        attempt: u32,
    },

    /// A tick failed in a way the next tick may recover from.
    TransientError {
        /// Request being polled.
        request_id: RequestId,
        /// Tick number, starting at 1.
        attempt: u32,
        /// User-facing message.
        message: String,
    },

    /// A result record was found. Terminal.
    Succeeded {
        /// Request being polled.
        request_id: RequestId,
        /// Tick that found the result.
        attempt: u32,
        /// The decoded record.
        record: ResultRecord,
    },

    /// The attempt ceiling was reached. Terminal.
    TimedOut {
        /// Request being polled.
        request_id: RequestId,
        /// Ticks performed.
        attempts: u32,
        /// User-facing message.
        message: String,
    },

    /// A permanent error ended the session. Terminal.
    Failed {
        /// Request being polled.
        request_id: RequestId,
        /// Error description.
        message: String,
    },

    /// The session was cancelled before reaching a terminal state.
    Cancelled {
        /// Request being polled.
        request_id: RequestId,
    },

    /// Wallet pre-flight or upload failed; no session was started.
    SubmissionFailed {
        /// User-facing message.
        message: String,
    },
}

impl PollEvent {
    /// Whether this event ends a session.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Succeeded { .. } | Self::TimedOut { .. } | Self::Failed { .. }
        )
    }
}

/// Channel for receiving poll events.
pub type PollEventsChannel = broadcast::Receiver<PollEvent>;

/// Sender for poll events.
pub type PollEventsSender = broadcast::Sender<PollEvent>;

/// Create a new event channel pair.
#[must_use]
pub fn create_event_channel() -> (PollEventsSender, PollEventsChannel) {
    broadcast::channel(256)
}

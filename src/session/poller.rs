//! Timer-driven session driver.
//!
//! Each session runs as one tokio task around a single interval timer, so
//! ticks of the same session never overlap. Cancellation goes through a
//! `watch` channel owned by the [`SessionHandle`]; dropping the handle
//! cancels the session.

use super::{PollStatus, PollingSession, TickReport, CONNECTIVITY_MESSAGE, TIMEOUT_MESSAGE};
use crate::client::{RequestId, ResultLookup};
use crate::config::{PollingConfig, MAX_POLL_INTERVAL_SECS};
use crate::event::{PollEvent, PollEventsSender};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Shortest tick interval a session runs with.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Timing of a polling session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Time between ticks. The first tick fires one interval after start.
    pub interval: Duration,
    /// Ticks before the session times out.
    pub max_attempts: u32,
}

impl SessionConfig {
    /// Interval actually used: clamped to between 1 ms and one day.
    #[must_use]
    pub fn effective_interval(&self) -> Duration {
        self.interval
            .clamp(MIN_INTERVAL, Duration::from_secs(MAX_POLL_INTERVAL_SECS))
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from(&PollingConfig::default())
    }
}

impl From<&PollingConfig> for SessionConfig {
    fn from(config: &PollingConfig) -> Self {
        Self {
            interval: config.interval(),
            max_attempts: config.max_attempts,
        }
    }
}

/// Owner of a running session.
pub struct SessionHandle {
    request_id: RequestId,
    state: Arc<RwLock<PollingSession>>,
    cancel_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("request_id", &self.request_id)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl SessionHandle {
    /// Start polling `request_id` on the current tokio runtime.
    #[must_use]
    pub fn spawn(
        lookup: Arc<dyn ResultLookup>,
        request_id: RequestId,
        config: SessionConfig,
        events_tx: PollEventsSender,
    ) -> Self {
        let state = Arc::new(RwLock::new(PollingSession::new(
            request_id.clone(),
            config.max_attempts,
        )));
        let (cancel_tx, cancel_rx) = watch::channel(false);

        let interval = config.effective_interval();
        if interval != config.interval {
            warn!(
                "Polling interval {:?} out of range, using {interval:?}",
                config.interval
            );
        }
        info!(
            "Polling {request_id} every {interval:?} (max {} attempts)",
            config.max_attempts
        );
        let _ = events_tx.send(PollEvent::SessionStarted {
            request_id: request_id.clone(),
        });

        let task = tokio::spawn(run_session(
            lookup,
            Arc::clone(&state),
            interval,
            cancel_rx,
            events_tx,
        ));

        Self {
            request_id,
            state,
            cancel_tx,
            task: Some(task),
        }
    }

    /// Request being polled.
    #[must_use]
    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> PollStatus {
        self.state.read().status()
    }

    /// Copy of the current session state.
    #[must_use]
    pub fn snapshot(&self) -> PollingSession {
        self.state.read().clone()
    }

    /// Stop polling. A lookup in flight is dropped and its outcome discarded.
    pub fn cancel(&self) {
        let _ = self.cancel_tx.send(true);
    }

    /// Whether the session task has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Wait for the session task to exit and return the final state.
    pub async fn finished(&mut self) -> PollingSession {
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                debug!("Session task for {} ended abnormally: {e}", self.request_id);
            }
        }
        self.snapshot()
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

async fn run_session(
    lookup: Arc<dyn ResultLookup>,
    state: Arc<RwLock<PollingSession>>,
    interval: Duration,
    mut cancel_rx: watch::Receiver<bool>,
    events_tx: PollEventsSender,
) {
    let request_id = state.read().request_id().clone();
    let start = Instant::now()
        .checked_add(interval)
        .unwrap_or_else(Instant::now);
    let mut timer = interval_at(start, interval);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel_rx.changed() => break,
            _ = timer.tick() => {}
        }

        let outcome = tokio::select! {
            biased;
            _ = cancel_rx.changed() => break,
            outcome = lookup.lookup(&request_id) => outcome,
        };

        let report = state.write().record_tick(outcome);
        if publish(&events_tx, &request_id, report) {
            return;
        }
    }

    if !state.read().is_terminal() {
        info!("Polling {request_id} cancelled");
        let _ = events_tx.send(PollEvent::Cancelled { request_id });
    }
}

/// Emit events for a tick. Returns true once the session is terminal.
fn publish(events_tx: &PollEventsSender, request_id: &RequestId, report: TickReport) -> bool {
    let request_id = request_id.clone();
    let event = match report {
        TickReport::NoResultYet { attempt } => PollEvent::NoResultYet {
            request_id,
            attempt,
        },
        TickReport::TransientError { attempt, message } => PollEvent::TransientError {
            request_id,
            attempt,
            message,
        },
        TickReport::Succeeded { attempt, record } => PollEvent::Succeeded {
            request_id,
            attempt,
            record,
        },
        TickReport::TimedOut {
            attempts,
            last_error,
        } => {
            if last_error.is_some() {
                let _ = events_tx.send(PollEvent::TransientError {
                    request_id: request_id.clone(),
                    attempt: attempts,
                    message: CONNECTIVITY_MESSAGE.to_string(),
                });
            }
            PollEvent::TimedOut {
                request_id,
                attempts,
                message: TIMEOUT_MESSAGE.to_string(),
            }
        }
        TickReport::Failed { message } => PollEvent::Failed {
            request_id,
            message,
        },
        TickReport::Ignored => return true,
    };

    let terminal = event.is_terminal();
    let _ = events_tx.send(event);
    terminal
}

/// The polling slot of one UI context.
///
/// Holds at most one session. Starting a session cancels the previous one,
/// and dropping the slot cancels whatever is running.
pub struct PollingSlot {
    lookup: Arc<dyn ResultLookup>,
    config: SessionConfig,
    events_tx: PollEventsSender,
    current: Option<SessionHandle>,
}

impl PollingSlot {
    /// Create an idle slot.
    #[must_use]
    pub fn new(
        lookup: Arc<dyn ResultLookup>,
        config: SessionConfig,
        events_tx: PollEventsSender,
    ) -> Self {
        Self {
            lookup,
            config,
            events_tx,
            current: None,
        }
    }

    /// Cancel any running session and start polling `request_id`.
    pub fn start(&mut self, request_id: RequestId) -> &mut SessionHandle {
        self.cancel();
        self.current.insert(SessionHandle::spawn(
            Arc::clone(&self.lookup),
            request_id,
            self.config,
            self.events_tx.clone(),
        ))
    }

    /// Cancel and discard the current session, leaving the slot idle.
    pub fn cancel(&mut self) {
        if let Some(previous) = self.current.take() {
            debug!("Discarding session for {}", previous.request_id());
            previous.cancel();
        }
    }

    /// The current session, if any.
    #[must_use]
    pub fn current(&self) -> Option<&SessionHandle> {
        self.current.as_ref()
    }

    /// The current session, mutably.
    pub fn current_mut(&mut self) -> Option<&mut SessionHandle> {
        self.current.as_mut()
    }

    /// Status of the current session; `None` while idle.
    #[must_use]
    pub fn status(&self) -> Option<PollStatus> {
        self.current.as_ref().map(SessionHandle::status)
    }

    /// Session timing used for new sessions.
    #[must_use]
    pub fn config(&self) -> SessionConfig {
        self.config
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::client::{ResultRecord, Verdict};
    use crate::error::{Error, Result};
    use crate::event::create_event_channel;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Replays scripted outcomes, then keeps answering "no result".
    struct ScriptedLookup {
        outcomes: Mutex<VecDeque<Result<Option<ResultRecord>>>>,
        calls: AtomicU32,
    }

    impl ScriptedLookup {
        fn new(outcomes: Vec<Result<Option<ResultRecord>>>) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(outcomes.into()),
                calls: AtomicU32::new(0),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ResultLookup for ScriptedLookup {
        async fn lookup(&self, _request_id: &RequestId) -> Result<Option<ResultRecord>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outcomes.lock().pop_front().unwrap_or(Ok(None))
        }
    }

    fn record() -> ResultRecord {
        ResultRecord {
            verdict: Verdict::False,
            confidence: 87,
            analysis: "Contradicted by primary sources.".into(),
            sources: Vec::new(),
        }
    }

    fn config() -> SessionConfig {
        SessionConfig {
            interval: Duration::from_secs(5),
            max_attempts: 12,
        }
    }

    fn rid(id: &str) -> RequestId {
        RequestId::new(id).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_sixth_tick() {
        let mut outcomes: Vec<_> = (0..5).map(|_| Ok(None)).collect();
        outcomes.push(Ok(Some(record())));
        let lookup = ScriptedLookup::new(outcomes);
        let (events_tx, mut events_rx) = create_event_channel();

        let start = Instant::now();
        let mut handle = SessionHandle::spawn(lookup.clone(), rid("R1"), config(), events_tx);
        let session = handle.finished().await;

        assert_eq!(session.status(), PollStatus::Succeeded);
        assert_eq!(session.attempts(), 6);
        assert_eq!(session.last_result(), Some(&record()));
        assert_eq!(lookup.calls(), 6);
        assert_eq!(start.elapsed(), Duration::from_secs(30));

        assert!(matches!(
            events_rx.recv().await.unwrap(),
            PollEvent::SessionStarted { .. }
        ));
        for attempt in 1..=5 {
            match events_rx.recv().await.unwrap() {
                PollEvent::NoResultYet { attempt: a, .. } => assert_eq!(a, attempt),
                other => unreachable!("unexpected event {other:?}"),
            }
        }
        match events_rx.recv().await.unwrap() {
            PollEvent::Succeeded { attempt, record: r, .. } => {
                assert_eq!(attempt, 6);
                assert_eq!(r, record());
            }
            other => unreachable!("unexpected event {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_after_twelfth_tick_and_stops() {
        let lookup = ScriptedLookup::new(Vec::new());
        let (events_tx, _events_rx) = create_event_channel();

        let start = Instant::now();
        let mut handle = SessionHandle::spawn(lookup.clone(), rid("R2"), config(), events_tx);
        let session = handle.finished().await;

        assert_eq!(session.status(), PollStatus::TimedOut);
        assert_eq!(session.attempts(), 12);
        assert_eq!(start.elapsed(), Duration::from_secs(60));

        // No network activity once terminal.
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(lookup.calls(), 12);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_keep_polling() {
        let lookup = ScriptedLookup::new(vec![
            Err(Error::AllEndpointsFailed(3)),
            Err(Error::TransientNetworkFailure("reset".into())),
            Ok(Some(record())),
        ]);
        let (events_tx, mut events_rx) = create_event_channel();

        let mut handle = SessionHandle::spawn(lookup, rid("R1"), config(), events_tx);
        let session = handle.finished().await;
        assert_eq!(session.status(), PollStatus::Succeeded);
        assert_eq!(session.attempts(), 3);

        let mut transient = 0;
        while let Ok(event) = events_rx.try_recv() {
            if let PollEvent::TransientError { message, .. } = event {
                assert_eq!(message, crate::session::CONNECTIVITY_MESSAGE);
                transient += 1;
            }
        }
        assert_eq!(transient, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_on_last_tick_reports_both() {
        let mut outcomes: Vec<_> = (0..2).map(|_| Ok(None)).collect();
        outcomes.push(Err(Error::AllEndpointsFailed(3)));
        let lookup = ScriptedLookup::new(outcomes);
        let (events_tx, mut events_rx) = create_event_channel();
        let config = SessionConfig {
            max_attempts: 3,
            ..config()
        };

        let mut handle = SessionHandle::spawn(lookup, rid("R1"), config, events_tx);
        assert_eq!(handle.finished().await.status(), PollStatus::TimedOut);

        let events: Vec<_> = std::iter::from_fn(|| events_rx.try_recv().ok()).collect();
        let tail = &events[events.len() - 2..];
        assert!(matches!(tail[0], PollEvent::TransientError { attempt: 3, .. }));
        assert!(matches!(tail[1], PollEvent::TimedOut { attempts: 3, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_still_polls() {
        let lookup = ScriptedLookup::new(vec![Ok(None), Ok(Some(record()))]);
        let (events_tx, _events_rx) = create_event_channel();
        let config = SessionConfig {
            interval: Duration::ZERO,
            ..config()
        };
        assert_eq!(config.effective_interval(), MIN_INTERVAL);

        let mut handle = SessionHandle::spawn(lookup, rid("R1"), config, events_tx);
        let session = handle.finished().await;
        assert_eq!(session.status(), PollStatus::Succeeded);
        assert_eq!(session.attempts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_interval_is_capped_at_one_day() {
        let lookup = ScriptedLookup::new(Vec::new());
        let (events_tx, mut events_rx) = create_event_channel();
        let config = SessionConfig {
            interval: PollingConfig {
                interval_secs: u64::MAX,
                max_attempts: 1,
            }
            .interval(),
            max_attempts: 1,
        };
        let one_day = Duration::from_secs(MAX_POLL_INTERVAL_SECS);
        assert_eq!(config.effective_interval(), one_day);

        let start = Instant::now();
        let mut handle = SessionHandle::spawn(lookup.clone(), rid("R1"), config, events_tx);
        let session = handle.finished().await;

        assert_eq!(session.status(), PollStatus::TimedOut);
        assert_eq!(start.elapsed(), one_day);
        assert_eq!(lookup.calls(), 1);
        let events: Vec<_> = std::iter::from_fn(|| events_rx.try_recv().ok()).collect();
        assert!(matches!(events.last(), Some(PollEvent::TimedOut { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_handle_debug_shows_request_and_status() {
        let lookup = ScriptedLookup::new(Vec::new());
        let (events_tx, _events_rx) = create_event_channel();
        let handle = SessionHandle::spawn(lookup, rid("R9"), config(), events_tx);

        let text = format!("{handle:?}");
        assert!(text.contains("R9"));
        assert!(text.contains("Pending"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_error_fails_session() {
        let lookup = ScriptedLookup::new(vec![Err(Error::InvalidQuery("tag name is empty".into()))]);
        let (events_tx, _events_rx) = create_event_channel();

        let mut handle = SessionHandle::spawn(lookup.clone(), rid("R1"), config(), events_tx);
        assert_eq!(handle.finished().await.status(), PollStatus::Failed);
        assert_eq!(lookup.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_ticks() {
        let lookup = ScriptedLookup::new(Vec::new());
        let (events_tx, mut events_rx) = create_event_channel();

        let mut handle = SessionHandle::spawn(lookup.clone(), rid("R1"), config(), events_tx);
        tokio::time::sleep(Duration::from_secs(11)).await;
        handle.cancel();
        let session = handle.finished().await;

        assert_eq!(session.status(), PollStatus::Pending);
        assert_eq!(session.attempts(), 2);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(lookup.calls(), 2);

        let last = std::iter::from_fn(|| events_rx.try_recv().ok()).last();
        assert!(matches!(last, Some(PollEvent::Cancelled { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_handle_cancels() {
        let lookup = ScriptedLookup::new(Vec::new());
        let (events_tx, _events_rx) = create_event_channel();

        let handle = SessionHandle::spawn(lookup.clone(), rid("R1"), config(), events_tx);
        tokio::time::sleep(Duration::from_secs(6)).await;
        drop(handle);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(lookup.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slot_start_replaces_previous_session() {
        let lookup = ScriptedLookup::new(Vec::new());
        let (events_tx, _events_rx) = create_event_channel();
        let mut slot = PollingSlot::new(lookup.clone(), config(), events_tx);
        assert_eq!(slot.status(), None);

        slot.start(rid("R1"));
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(lookup.calls(), 1);

        let handle = slot.start(rid("R2"));
        assert_eq!(handle.request_id(), &rid("R2"));
        tokio::time::sleep(Duration::from_secs(6)).await;

        // Only the new session ticked.
        assert_eq!(lookup.calls(), 2);
        assert_eq!(slot.current().unwrap().snapshot().attempts(), 1);
        assert_eq!(slot.status(), Some(PollStatus::Pending));

        slot.cancel();
        assert_eq!(slot.status(), None);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(lookup.calls(), 2);
    }
}

//! Session lifecycle state machine.
//!
//! ## Phases
//!
//! ```text
//! Fresh        → state loaded, nothing decided yet
//! Reconciling  → stale running=true found; cleared and persisted
//! Active       → new online session open and persisted
//! ShuttingDown → shutdown routine executing
//! Closed       → session closed; further shutdown calls are no-ops
//! ```
//!
//! A stale `running=true` means the previous process died without running its
//! shutdown. Its end time is unknown, so that session is dropped rather than
//! guessed at.
//!
//! `shutdown()` checks and clears `running` under one lock acquisition. A
//! second trigger (signal racing normal exit) sees the cleared flag and does
//! nothing.

use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::TrackerConfig;
use crate::duration::format_duration;
use crate::error::{Result, TrackerError};
use crate::history::{SessionHistory, SessionKind};
use crate::outputs::OutputDispatcher;
use crate::state::{SessionState, StateStore};

const RECORD_NOTE: &str = " New record!";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderPhase {
    Fresh,
    Reconciling,
    Active,
    ShuttingDown,
    Closed,
}

/// A session that was measured, recorded and announced.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedSession {
    pub kind: SessionKind,
    pub start: f64,
    pub end: f64,
    pub duration: f64,
    pub is_record: bool,
    pub message: String,
}

struct Inner {
    state: SessionState,
    phase: RecorderPhase,
    offline_reported: bool,
}

pub struct SessionRecorder {
    username: String,
    store: StateStore,
    history: Box<dyn SessionHistory>,
    outputs: OutputDispatcher,
    clock: Arc<dyn Clock>,
    min_offline_secs: f64,
    recovered_dirty_session: bool,
    inner: Mutex<Inner>,
}

impl SessionRecorder {
    /// Loads state, reconciles a crashed session if needed, and opens a new one.
    pub fn start(
        config: &TrackerConfig,
        history: Box<dyn SessionHistory>,
        outputs: OutputDispatcher,
    ) -> Self {
        Self::start_with_clock(config, history, outputs, Arc::new(SystemClock))
    }

    pub fn start_with_clock(
        config: &TrackerConfig,
        history: Box<dyn SessionHistory>,
        outputs: OutputDispatcher,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let store = StateStore::new(&config.state_file);
        let mut previous = store.load();
        let mut recorder = Self {
            username: config.username.clone(),
            store,
            history,
            outputs,
            clock,
            min_offline_secs: config.min_offline_secs,
            recovered_dirty_session: false,
            inner: Mutex::new(Inner {
                state: previous.clone(),
                phase: RecorderPhase::Fresh,
                offline_reported: false,
            }),
        };

        if previous.running {
            warn!(
                session_start = ?previous.session_start,
                "Existing running session detected - cleaning up"
            );
            recorder.set_phase(RecorderPhase::Reconciling);
            previous.running = false;
            let _ = recorder.persist(&previous);
            recorder.recovered_dirty_session = true;
        }

        let state = SessionState::begin(recorder.clock.now(), &previous);
        let _ = recorder.persist(&state);
        {
            let mut inner = recorder.lock();
            inner.state = state;
            inner.phase = RecorderPhase::Active;
        }
        info!(username = %recorder.username, "New tracking session started");

        recorder
    }

    pub fn state(&self) -> SessionState {
        self.lock().state.clone()
    }

    pub fn phase(&self) -> RecorderPhase {
        self.lock().phase
    }

    /// Whether startup found and cleared a session left running by a dead process.
    pub fn recovered_dirty_session(&self) -> bool {
        self.recovered_dirty_session
    }

    /// Records and announces the time since the previous shutdown.
    ///
    /// Does nothing on the very first run (no previous shutdown), for gaps
    /// shorter than the configured minimum, or when already reported.
    pub fn report_offline_time(&self) -> Option<CompletedSession> {
        let last_shutdown = {
            let mut inner = self.lock();
            if inner.offline_reported {
                debug!("Offline time already reported for this session");
                return None;
            }
            inner.offline_reported = true;
            inner.state.last_shutdown
        };

        let start = match last_shutdown {
            Some(start) => start,
            None => {
                info!("No previous shutdown detected");
                return None;
            }
        };

        let end = self.clock.now();
        let duration = elapsed(start, end);
        if duration < self.min_offline_secs {
            info!(
                duration_secs = duration,
                min_offline_secs = self.min_offline_secs,
                "Offline time below reporting minimum"
            );
            return None;
        }

        let is_record = self
            .history
            .record(&self.username, SessionKind::Offline, start, end, duration)
            .unwrap_or_else(|err| {
                error!(error = %err, "Failed to record offline session");
                false
            });

        let message = offline_message(&self.username, duration, is_record);
        self.outputs.dispatch(&message);
        info!(duration_secs = duration, is_record, "{}", message);

        Some(CompletedSession {
            kind: SessionKind::Offline,
            start,
            end,
            duration,
            is_record,
            message,
        })
    }

    /// Closes the online session. Safe to call any number of times.
    ///
    /// Returns `Ok(None)` when there was no open session. History and state
    /// write failures don't stop the sequence; the first one is returned once
    /// the message has been dispatched.
    pub fn shutdown(&self) -> Result<Option<CompletedSession>> {
        let mut first_error: Option<TrackerError> = None;

        let completed = {
            let mut inner = self.lock();
            if !inner.state.running {
                debug!("No active session to save");
                return Ok(None);
            }
            inner.phase = RecorderPhase::ShuttingDown;

            let end = self.clock.now();
            let start = inner.state.session_start.unwrap_or(end);
            let duration = elapsed(start, end);

            let is_record = match self.history.record(
                &self.username,
                SessionKind::Online,
                start,
                end,
                duration,
            ) {
                Ok(is_record) => is_record,
                Err(err) => {
                    error!(error = %err, "Failed to record online session");
                    first_error = Some(err);
                    false
                }
            };

            inner.state.running = false;
            inner.state.last_shutdown = Some(end);
            inner.state.last_online_duration = Some(duration);
            if let Err(err) = self.persist(&inner.state) {
                first_error = first_error.or(Some(err));
            }
            inner.phase = RecorderPhase::Closed;

            CompletedSession {
                kind: SessionKind::Online,
                start,
                end,
                duration,
                is_record,
                message: online_message(&self.username, duration, is_record),
            }
        };

        self.outputs.dispatch(&completed.message);
        info!(
            duration = %format_duration(completed.duration),
            is_record = completed.is_record,
            "Session ended"
        );

        match first_error {
            Some(err) => Err(err),
            None => Ok(Some(completed)),
        }
    }

    fn persist(&self, state: &SessionState) -> Result<()> {
        self.store.save(state).map_err(|err| {
            error!(error = %err, "Error saving state");
            err
        })
    }

    fn set_phase(&self, phase: RecorderPhase) {
        self.lock().phase = phase;
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic elsewhere must not block shutdown bookkeeping.
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// `end - start`, clamped at zero for clocks that moved backwards.
fn elapsed(start: f64, end: f64) -> f64 {
    (end - start).max(0.0)
}

fn online_message(username: &str, duration: f64, is_record: bool) -> String {
    let mut message = format!("{} was online for: {}.", username, format_duration(duration));
    if is_record {
        message.push_str(RECORD_NOTE);
    }
    message
}

fn offline_message(username: &str, duration: f64, is_record: bool) -> String {
    let mut message = format!(
        "{} touched grass for: {}.",
        username,
        format_duration(duration)
    );
    if is_record {
        message.push_str(RECORD_NOTE);
    }
    message
}

//! Exactly-once shutdown across signals and normal exit.
//!
//! Two triggers can close the session:
//!
//! 1. SIGINT / SIGHUP / SIGTERM. The handler only stores the signal number in
//!    [`PENDING_SIGNAL`]; the main thread sees it in [`ShutdownController::wait_for_signal`],
//!    runs the shutdown, and then returns normally so the process exits
//!    through the usual path. [`install_signal_handlers`] needs no recorder,
//!    so it can run before the session is opened.
//! 2. Leaving scope, including unwinding from a panic, via [`ExitGuard`].
//!
//! Both call [`SessionRecorder::shutdown`], which is idempotent, so whichever
//! fires second does nothing.

use std::io;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use crate::error::{Result, TrackerError};
use crate::recorder::{CompletedSession, SessionRecorder};

/// Last termination signal received, or 0. The only process-wide state.
static PENDING_SIGNAL: AtomicI32 = AtomicI32::new(0);

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[cfg(unix)]
pub const HANDLED_SIGNALS: [libc::c_int; 3] = [libc::SIGINT, libc::SIGHUP, libc::SIGTERM];

#[cfg(unix)]
extern "C" fn record_signal(signum: libc::c_int) {
    // Only async-signal-safe work here: a single atomic store.
    PENDING_SIGNAL.store(signum, Ordering::SeqCst);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    Signal(i32),
    Exit,
}

pub fn pending_signal() -> Option<i32> {
    match PENDING_SIGNAL.load(Ordering::SeqCst) {
        0 => None,
        signum => Some(signum),
    }
}

/// Routes SIGINT, SIGHUP and SIGTERM to the pending-signal flag.
#[cfg(unix)]
pub fn install_signal_handlers() -> Result<()> {
    for signum in HANDLED_SIGNALS {
        // SAFETY: `action` is fully initialised (zeroed, then mask and
        // handler set) before being passed to sigaction, and the handler
        // performs only an atomic store, which is async-signal-safe.
        #[allow(unsafe_code)]
        let rc = unsafe {
            let mut action: libc::sigaction = std::mem::zeroed();
            action.sa_sigaction = record_signal as extern "C" fn(libc::c_int) as libc::sighandler_t;
            libc::sigemptyset(&mut action.sa_mask);
            action.sa_flags = libc::SA_RESTART;
            libc::sigaction(signum, &action, std::ptr::null_mut())
        };
        if rc != 0 {
            return Err(TrackerError::io(
                format!("Failed to install handler for signal {}", signum),
                io::Error::last_os_error(),
            ));
        }
    }
    Ok(())
}

#[cfg(not(unix))]
pub fn install_signal_handlers() -> Result<()> {
    warn!("Signal handling is not supported on this platform; relying on exit hook");
    Ok(())
}

pub struct ShutdownController {
    recorder: Arc<SessionRecorder>,
    poll_interval: Duration,
}

impl ShutdownController {
    pub fn new(recorder: Arc<SessionRecorder>) -> Self {
        Self {
            recorder,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Hook that closes the session when dropped.
    pub fn exit_guard(&self) -> ExitGuard {
        ExitGuard {
            recorder: Arc::clone(&self.recorder),
        }
    }

    /// Blocks until a termination signal arrives and returns its number.
    pub fn wait_for_signal(&self) -> i32 {
        loop {
            if let Some(signum) = pending_signal() {
                return signum;
            }
            thread::sleep(self.poll_interval);
        }
    }

    /// Like [`ShutdownController::wait_for_signal`], but gives up after `timeout`.
    pub fn wait_for_signal_timeout(&self, timeout: Duration) -> Option<i32> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(signum) = pending_signal() {
                return Some(signum);
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            thread::sleep((deadline - now).min(self.poll_interval));
        }
    }

    /// Runs the recorder's shutdown and hands back its first bookkeeping
    /// error, if any, so the caller can exit with a failure status. The
    /// session is closed either way.
    pub fn trigger(&self, reason: ShutdownReason) -> Result<Option<CompletedSession>> {
        if let ShutdownReason::Signal(signum) = reason {
            info!(signal = signum, "Received shutdown signal");
        }
        self.recorder.shutdown()
    }
}

/// Closes the session on drop: normal return, early return, or panic unwind.
pub struct ExitGuard {
    recorder: Arc<SessionRecorder>,
}

impl Drop for ExitGuard {
    fn drop(&mut self) {
        if thread::panicking() {
            warn!("Unwinding from a panic; closing session");
        }
        // Nobody is left to hand the error to.
        if let Err(err) = self.recorder.shutdown() {
            error!(error = %err, reason = ?ShutdownReason::Exit, "Error during shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::test_utils::ManualClock;
    use crate::config::{AppPaths, TrackerConfig};
    use crate::history::{SessionHistory, SessionKind, SqliteHistory, UsageStats};
    use crate::outputs::test_utils::{Behavior, RecordingOutput};
    use crate::outputs::OutputDispatcher;
    use crate::recorder::RecorderPhase;
    use std::sync::Mutex;

    struct BrokenHistory;

    impl SessionHistory for BrokenHistory {
        fn record(&self, _: &str, _: SessionKind, _: f64, _: f64, _: f64) -> Result<bool> {
            Err(TrackerError::InvalidConfig("history unavailable".to_string()))
        }

        fn stats(&self, _: &str) -> Result<UsageStats> {
            Ok(UsageStats::default())
        }
    }

    fn start_with_history(
        temp: &tempfile::TempDir,
        history: Box<dyn SessionHistory>,
    ) -> (Arc<SessionRecorder>, Arc<Mutex<Vec<String>>>) {
        let config = TrackerConfig::new("test_user", &AppPaths::under(temp.path()));
        let (sink, messages) = RecordingOutput::new("recording", Behavior::Deliver);
        let recorder = SessionRecorder::start_with_clock(
            &config,
            history,
            OutputDispatcher::new().with_sink(Box::new(sink)),
            Arc::new(ManualClock::new(1_000.0)),
        );
        (Arc::new(recorder), messages)
    }

    fn recorder(
        temp: &tempfile::TempDir,
    ) -> (Arc<SessionRecorder>, Arc<Mutex<Vec<String>>>) {
        let config = TrackerConfig::new("test_user", &AppPaths::under(temp.path()));
        let history = SqliteHistory::new(config.history_db.clone()).unwrap();
        start_with_history(temp, Box::new(history))
    }

    #[test]
    fn signal_then_exit_shuts_down_once() {
        let temp = tempfile::tempdir().unwrap();
        let (recorder, messages) = recorder(&temp);
        let controller = ShutdownController::new(Arc::clone(&recorder));

        {
            let _guard = controller.exit_guard();
            assert!(controller
                .trigger(ShutdownReason::Signal(15))
                .unwrap()
                .is_some());
        }

        assert_eq!(recorder.phase(), RecorderPhase::Closed);
        assert_eq!(messages.lock().unwrap().len(), 1);
    }

    #[test]
    fn exit_guard_alone_closes_session() {
        let temp = tempfile::tempdir().unwrap();
        let (recorder, messages) = recorder(&temp);
        let controller = ShutdownController::new(Arc::clone(&recorder));

        drop(controller.exit_guard());

        assert!(!recorder.state().running);
        assert_eq!(messages.lock().unwrap().len(), 1);
        assert!(controller.trigger(ShutdownReason::Exit).unwrap().is_none());
    }

    #[test]
    fn trigger_surfaces_bookkeeping_error_after_closing() {
        let temp = tempfile::tempdir().unwrap();
        let (recorder, messages) = start_with_history(&temp, Box::new(BrokenHistory));
        let controller = ShutdownController::new(Arc::clone(&recorder));

        {
            let _guard = controller.exit_guard();
            let result = controller.trigger(ShutdownReason::Signal(15));
            assert!(matches!(result, Err(TrackerError::InvalidConfig(_))));
        }

        assert_eq!(recorder.phase(), RecorderPhase::Closed);
        assert!(!recorder.state().running);
        assert_eq!(
            *messages.lock().unwrap(),
            vec!["test_user was online for: 0 seconds.".to_string()]
        );
    }

    #[test]
    fn exit_guard_runs_during_panic_unwind() {
        let temp = tempfile::tempdir().unwrap();
        let (recorder, messages) = recorder(&temp);
        let controller = ShutdownController::new(Arc::clone(&recorder));

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = controller.exit_guard();
            panic!("main loop blew up");
        }));

        assert!(result.is_err());
        assert!(!recorder.state().running);
        assert_eq!(messages.lock().unwrap().len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn signal_before_session_opens_is_observed_by_wait() {
        install_signal_handlers().unwrap();

        // SAFETY: a handler for SIGHUP was installed above, so raising it only
        // sets the pending flag instead of terminating the test process.
        #[allow(unsafe_code)]
        let rc = unsafe { libc::raise(libc::SIGHUP) };
        assert_eq!(rc, 0);

        let temp = tempfile::tempdir().unwrap();
        let (recorder, _) = recorder(&temp);
        let controller = ShutdownController::new(recorder)
            .with_poll_interval(Duration::from_millis(10));

        assert_eq!(
            controller.wait_for_signal_timeout(Duration::from_secs(5)),
            Some(libc::SIGHUP)
        );
        assert_eq!(controller.wait_for_signal(), libc::SIGHUP);
        PENDING_SIGNAL.store(0, Ordering::SeqCst);
    }
}

//! # grass-core
//!
//! Session lifecycle and persistence engine for go-touch-grass: tracks how long
//! the machine stays on ("online") and how long it was off between runs
//! ("touching grass"), keeps a history of both, and announces each session
//! through configurable outputs.
//!
//! ## Design Principles
//!
//! - **Synchronous**: No async runtime dependency; the tracker is one thread
//!   plus asynchronous signal delivery.
//! - **Crash-consistent**: The state file is replaced atomically and a session
//!   left running by a killed process is reconciled on the next start.
//! - **Exactly-once shutdown**: Signals and normal exit share one idempotent
//!   shutdown routine.
//! - **Graceful degradation**: Missing or corrupt state, an unreachable network
//!   and failing outputs are logged and absorbed, never fatal.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use grass_core::{AppPaths, SessionRecorder, SqliteHistory, TrackerConfig};
//!
//! let paths = AppPaths::from_env()?;
//! let mut config = TrackerConfig::new("alice", &paths);
//! config.outputs.console = true;
//!
//! let history = SqliteHistory::new(config.history_db.clone())?;
//! let recorder = SessionRecorder::start(&config, Box::new(history), config.build_outputs()?);
//! recorder.report_offline_time();
//! // ... later
//! recorder.shutdown()?;
//! ```

pub mod clock;
pub mod config;
pub mod connectivity;
pub mod duration;
pub mod error;
pub mod history;
pub mod outputs;
pub mod recorder;
pub mod shutdown;
pub mod state;

// Re-export commonly used items at crate root
pub use clock::{Clock, SystemClock};
pub use config::{
    default_config_path, load_file_config, AppPaths, ConfigOverrides, FileConfig, NetworkConfig,
    OutputsConfig, TrackerConfig, APP_NAME,
};
pub use connectivity::{ConnectivityGate, HttpProbe, ReachabilityProbe, DEFAULT_ENDPOINTS};
pub use duration::format_duration;
pub use error::{Result, TrackerError};
pub use history::{KindStats, SessionHistory, SessionKind, SessionRecord, SqliteHistory, UsageStats};
pub use outputs::{
    ConsoleOutput, DispatchSummary, FileOutput, OutputDispatcher, OutputSink, WebhookOutput,
};
pub use recorder::{CompletedSession, RecorderPhase, SessionRecorder};
pub use shutdown::{
    install_signal_handlers, pending_signal, ExitGuard, ShutdownController, ShutdownReason,
};
pub use state::{SessionState, StateStore};

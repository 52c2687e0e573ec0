//! `touch-grass track`: one tracker process from startup to signal.
//!
//! Signal handlers go in before the session is opened, and the exit guard is
//! taken before the network wait, so a signal at any point after startup
//! closes the session instead of killing the process mid-session.

use std::path::Path;
use std::sync::Arc;

use grass_core::{
    install_signal_handlers, load_file_config, pending_signal, AppPaths, ConfigOverrides,
    ConnectivityGate, Result, SessionRecorder, ShutdownController, ShutdownReason, SqliteHistory,
    TrackerConfig, TrackerError,
};
use tracing::{info, warn};

pub fn run(config_path: Option<&Path>, overrides: ConfigOverrides, paths: &AppPaths) -> Result<()> {
    let config = TrackerConfig::resolve(load_file_config(config_path)?, overrides, paths)?;
    if !config.outputs.any_enabled() {
        return Err(TrackerError::InvalidConfig(
            "At least one output must be enabled (--console, --file or --webhook)".to_string(),
        ));
    }

    let (recorder, controller) = open_session(&config)?;
    let _exit_guard = controller.exit_guard();

    println!("{}", banner(&config));

    if config.network.wait {
        wait_for_network(&config);
    }

    if let Some(offline) = recorder.report_offline_time() {
        info!(
            duration_secs = offline.duration,
            is_record = offline.is_record,
            "Reported offline time"
        );
    }

    let signum = controller.wait_for_signal();
    controller.trigger(ShutdownReason::Signal(signum))?;
    Ok(())
}

fn open_session(config: &TrackerConfig) -> Result<(Arc<SessionRecorder>, ShutdownController)> {
    let outputs = config.build_outputs()?;
    let history = SqliteHistory::new(config.history_db.clone())?;

    // From here on a termination signal only sets the pending flag.
    install_signal_handlers()?;
    let recorder = Arc::new(SessionRecorder::start(config, Box::new(history), outputs));
    let controller = ShutdownController::new(Arc::clone(&recorder));
    Ok((recorder, controller))
}

/// Best effort: a timeout or a failed probe setup only means starting offline.
fn wait_for_network(config: &TrackerConfig) {
    let gate = match ConnectivityGate::new(&config.network.endpoints) {
        Ok(gate) => gate,
        Err(e) => {
            warn!(error = %e, "Could not set up connectivity check; starting offline");
            return;
        }
    };

    let online = gate.wait_for_network_until(
        config.network.timeout(),
        config.network.check_interval(),
        || pending_signal().is_some(),
    );
    if !online {
        warn!("Starting offline; webhook messages may fail until the network returns");
    }
}

fn banner(config: &TrackerConfig) -> String {
    let mut handlers = Vec::new();
    if config.outputs.webhook {
        handlers.push("Webhook".to_string());
    }
    if let Some(path) = &config.outputs.file {
        let path = if path.as_os_str().is_empty() {
            Path::new(grass_core::outputs::DEFAULT_LOG_FILE)
        } else {
            path.as_path()
        };
        handlers.push(format!("File({})", path.display()));
    }
    if config.outputs.console {
        handlers.push("Console".to_string());
    }

    format!(
        "Time tracking started for user: {}\nActive handlers: {}",
        config.username,
        handlers.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn config() -> TrackerConfig {
        TrackerConfig::new("ana", &AppPaths::under(Path::new("/tmp/touch-grass-test")))
    }

    #[test]
    fn banner_lists_handlers_in_dispatch_order() {
        let mut config = config();
        config.outputs.console = true;
        config.outputs.webhook = true;
        config.outputs.file = Some(PathBuf::from("usage.txt"));

        assert_eq!(
            banner(&config),
            "Time tracking started for user: ana\n\
             Active handlers: Webhook, File(usage.txt), Console"
        );
    }

    #[test]
    fn banner_shows_default_log_file_for_empty_path() {
        let mut config = config();
        config.outputs.file = Some(PathBuf::new());

        assert!(banner(&config).ends_with("Active handlers: File(activity_log.txt)"));
    }

    #[test]
    fn run_without_outputs_is_a_usage_error() {
        let temp = tempfile::tempdir().unwrap();
        let paths = AppPaths::under(temp.path());
        let overrides = ConfigOverrides {
            username: Some("ana".to_string()),
            ..Default::default()
        };

        let config_path = temp.path().join("missing.toml");
        let err = run(Some(config_path.as_path()), overrides, &paths).unwrap_err();
        assert!(matches!(err, TrackerError::InvalidConfig(_)));
        assert!(!paths.state_file().exists());
    }

    #[cfg(unix)]
    #[test]
    fn signal_right_after_open_closes_session_cleanly() {
        let temp = tempfile::tempdir().unwrap();
        let mut config = TrackerConfig::new("ana", &AppPaths::under(temp.path()));
        config.outputs.file = Some(temp.path().join("activity.txt"));

        let (recorder, controller) = open_session(&config).unwrap();
        assert!(recorder.state().running);

        // SAFETY: open_session installed the termination handlers, so SIGTERM
        // only sets the pending flag instead of killing the test process.
        #[allow(unsafe_code)]
        let rc = unsafe { libc::raise(libc::SIGTERM) };
        assert_eq!(rc, 0);

        assert_eq!(pending_signal(), Some(libc::SIGTERM));
        let completed = controller
            .trigger(ShutdownReason::Signal(libc::SIGTERM))
            .unwrap()
            .expect("session closed");
        assert!(completed.message.starts_with("ana was online for: "));
        assert!(!recorder.state().running);

        let log = std::fs::read_to_string(temp.path().join("activity.txt")).unwrap();
        assert!(log.contains("ana was online for: "));
    }
}

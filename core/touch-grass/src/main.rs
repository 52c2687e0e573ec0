//! touch-grass: tracks how long the machine stays on and how long you were away.
//!
//! ## Subcommands
//!
//! - `track`: Runs until SIGINT/SIGHUP/SIGTERM, reporting the preceding offline
//!   interval at startup and the online interval at shutdown
//! - `stats`: Prints the longest and total online/offline time for a user

mod logging;
mod stats;
mod track;

use clap::error::ErrorKind;
use clap::{Args, CommandFactory, Parser, Subcommand};
use grass_core::{AppPaths, ConfigOverrides, Result, TrackerError};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "touch-grass")]
#[command(about = "Tracks computer usage and time spent away from it")]
#[command(version)]
struct Cli {
    /// Config file (defaults to ~/.config/go_touch_grass/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Track the current session until a termination signal arrives
    Track(TrackArgs),

    /// Show longest and total online/offline time
    Stats {
        /// User whose history to read (falls back to the config file)
        #[arg(long)]
        username: Option<String>,

        /// Print machine-readable JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
struct TrackArgs {
    /// Name used in messages and history (falls back to the config file)
    #[arg(long)]
    username: Option<String>,

    /// Print messages to stdout
    #[arg(long)]
    console: bool,

    /// Append messages to a log file
    #[arg(
        long,
        value_name = "PATH",
        num_args = 0..=1,
        default_missing_value = grass_core::outputs::DEFAULT_LOG_FILE
    )]
    file: Option<PathBuf>,

    /// Post messages to the webhook from the config file or DISCORD_WEBHOOK_URL
    #[arg(long, alias = "discord")]
    webhook: bool,

    /// Ignore offline intervals shorter than this many seconds
    #[arg(long, value_name = "N")]
    min_offline_secs: Option<f64>,

    /// How long to wait for the network before starting offline
    #[arg(long, value_name = "N")]
    network_timeout_secs: Option<u64>,

    /// Skip the startup connectivity check
    #[arg(long)]
    no_network_wait: bool,
}

impl TrackArgs {
    fn into_overrides(self) -> ConfigOverrides {
        ConfigOverrides {
            username: self.username,
            console: self.console,
            file: self.file,
            webhook: self.webhook,
            min_offline_secs: self.min_offline_secs,
            network_timeout_secs: self.network_timeout_secs,
            skip_network_wait: self.no_network_wait,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let paths = AppPaths::from_env();
    let logging_guard = logging::init(paths.as_ref().ok().map(|p| p.cache_dir.as_path()));

    let result = paths.and_then(|paths| match cli.command {
        Commands::Track(args) => track::run(cli.config.as_deref(), args.into_overrides(), &paths),
        Commands::Stats { username, json } => {
            stats::run(cli.config.as_deref(), username, json, &paths)
        }
    });
    let code = exit_code(result);

    // process::exit skips destructors; flush the log file first.
    drop(logging_guard);
    std::process::exit(code);
}

/// Reports a failed run and picks the exit status: 2 for usage errors, 1 for
/// everything else.
fn exit_code(result: Result<()>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(TrackerError::InvalidConfig(details)) => {
            let err = Cli::command().error(ErrorKind::MissingRequiredArgument, details);
            let _ = err.print();
            err.exit_code()
        }
        Err(e) => {
            tracing::error!(error = %e, "touch-grass failed");
            1
        }
    }
}

//! Configuration loading and path resolution.
//!
//! Handles:
//! - Application directories (`$XDG_STATE_HOME/go_touch_grass`, `$XDG_CACHE_HOME/go_touch_grass`)
//! - The optional `config.toml` file
//! - Merging file values with command-line overrides into a [`TrackerConfig`]

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, TrackerError};
use crate::outputs::{
    ConsoleOutput, FileOutput, OutputDispatcher, WebhookOutput, DEFAULT_LOG_FILE,
};

pub const APP_NAME: &str = "go_touch_grass";

const STATE_FILE_NAME: &str = "state.json";
const HISTORY_DB_NAME: &str = "usage_stats.db";
const CONFIG_FILE_NAME: &str = "config.toml";

const DEFAULT_NETWORK_TIMEOUT_SECS: u64 = 300;
const DEFAULT_CHECK_INTERVAL_SECS: u64 = 10;

/// Directories the tracker reads and writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    /// Holds `state.json` and `usage_stats.db`.
    pub state_dir: PathBuf,
    /// Holds rotated log files.
    pub cache_dir: PathBuf,
}

impl AppPaths {
    /// Resolves the platform state/cache directories.
    pub fn from_env() -> Result<Self> {
        let home = dirs::home_dir().ok_or(TrackerError::HomeDirNotFound)?;
        let state_base = dirs::state_dir().unwrap_or_else(|| home.join(".local").join("state"));
        let cache_base = dirs::cache_dir().unwrap_or_else(|| home.join(".cache"));
        Ok(Self {
            state_dir: state_base.join(APP_NAME),
            cache_dir: cache_base.join(APP_NAME),
        })
    }

    /// Everything under one root, for tests and portable installs.
    pub fn under(root: &Path) -> Self {
        Self {
            state_dir: root.join("state"),
            cache_dir: root.join("cache"),
        }
    }

    pub fn state_file(&self) -> PathBuf {
        self.state_dir.join(STATE_FILE_NAME)
    }

    pub fn history_db(&self) -> PathBuf {
        self.state_dir.join(HISTORY_DB_NAME)
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_NAME).join(CONFIG_FILE_NAME))
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct OutputsConfig {
    #[serde(default)]
    pub console: bool,
    #[serde(default)]
    pub file: Option<PathBuf>,
    #[serde(default)]
    pub webhook: bool,
}

impl OutputsConfig {
    pub fn any_enabled(&self) -> bool {
        self.console || self.file.is_some() || self.webhook
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NetworkConfig {
    /// Skip the connectivity wait entirely when false.
    #[serde(default = "default_true")]
    pub wait: bool,
    #[serde(default = "default_network_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,
    /// Empty means the built-in endpoint list.
    #[serde(default)]
    pub endpoints: Vec<String>,
}

impl NetworkConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            wait: true,
            timeout_secs: DEFAULT_NETWORK_TIMEOUT_SECS,
            check_interval_secs: DEFAULT_CHECK_INTERVAL_SECS,
            endpoints: Vec::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_network_timeout_secs() -> u64 {
    DEFAULT_NETWORK_TIMEOUT_SECS
}

fn default_check_interval_secs() -> u64 {
    DEFAULT_CHECK_INTERVAL_SECS
}

/// Contents of `config.toml`. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub outputs: OutputsConfig,
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub min_offline_secs: Option<f64>,
    #[serde(default)]
    pub network: NetworkConfig,
}

/// Loads `config.toml`, returning defaults if the file doesn't exist.
pub fn load_file_config(path: Option<&Path>) -> Result<FileConfig> {
    let config_path = match path {
        Some(path) => path.to_path_buf(),
        None => match default_config_path() {
            Some(path) => path,
            None => return Ok(FileConfig::default()),
        },
    };

    if !config_path.exists() {
        return Ok(FileConfig::default());
    }

    let content = fs_err::read_to_string(&config_path)
        .map_err(|err| TrackerError::io("Failed to read config file", err))?;
    toml::from_str::<FileConfig>(&content).map_err(|err| TrackerError::ConfigMalformed {
        path: config_path,
        details: err.to_string(),
    })
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub username: Option<String>,
    pub console: bool,
    pub file: Option<PathBuf>,
    pub webhook: bool,
    pub min_offline_secs: Option<f64>,
    pub network_timeout_secs: Option<u64>,
    pub skip_network_wait: bool,
}

/// Fully resolved settings for one tracker process.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerConfig {
    pub username: String,
    pub state_file: PathBuf,
    pub history_db: PathBuf,
    pub log_dir: PathBuf,
    pub outputs: OutputsConfig,
    pub webhook_url: Option<String>,
    /// Offline intervals shorter than this are neither recorded nor reported.
    pub min_offline_secs: f64,
    pub network: NetworkConfig,
}

impl TrackerConfig {
    /// Defaults for `username` with every file under `paths`.
    pub fn new(username: impl Into<String>, paths: &AppPaths) -> Self {
        Self {
            username: username.into(),
            state_file: paths.state_file(),
            history_db: paths.history_db(),
            log_dir: paths.cache_dir.clone(),
            outputs: OutputsConfig::default(),
            webhook_url: None,
            min_offline_secs: 0.0,
            network: NetworkConfig::default(),
        }
    }

    pub fn resolve(file: FileConfig, overrides: ConfigOverrides, paths: &AppPaths) -> Result<Self> {
        let username = overrides
            .username
            .or(file.username)
            .ok_or_else(|| TrackerError::InvalidConfig("a username is required".to_string()))?;

        let mut config = Self::new(username, paths);
        config.outputs = OutputsConfig {
            console: overrides.console || file.outputs.console,
            file: overrides.file.or(file.outputs.file),
            webhook: overrides.webhook || file.outputs.webhook,
        };
        config.webhook_url = file.webhook_url;
        config.min_offline_secs = overrides
            .min_offline_secs
            .or(file.min_offline_secs)
            .unwrap_or(0.0);
        config.network = file.network;
        if let Some(timeout_secs) = overrides.network_timeout_secs {
            config.network.timeout_secs = timeout_secs;
        }
        if overrides.skip_network_wait {
            config.network.wait = false;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.username.trim().is_empty() {
            return Err(TrackerError::InvalidConfig(
                "username must not be empty".to_string(),
            ));
        }
        if !self.min_offline_secs.is_finite() || self.min_offline_secs < 0.0 {
            return Err(TrackerError::InvalidConfig(format!(
                "min_offline_secs must be a non-negative number, got {}",
                self.min_offline_secs
            )));
        }
        if self.network.check_interval_secs == 0 && self.network.wait {
            return Err(TrackerError::InvalidConfig(
                "network.check_interval_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Builds the enabled outputs in a fixed order: webhook, file, console.
    ///
    /// A misconfigured output (webhook without a URL, unwritable log file)
    /// is rejected here rather than failing on every message later.
    pub fn build_outputs(&self) -> Result<OutputDispatcher> {
        let mut dispatcher = OutputDispatcher::new();

        if self.outputs.webhook {
            dispatcher.register(Box::new(WebhookOutput::from_config_or_env(
                self.webhook_url.as_deref(),
            )?));
        }
        if let Some(path) = &self.outputs.file {
            let path = if path.as_os_str().is_empty() {
                Path::new(DEFAULT_LOG_FILE)
            } else {
                path.as_path()
            };
            dispatcher.register(Box::new(FileOutput::new(path)?));
        }
        if self.outputs.console {
            dispatcher.register(Box::new(ConsoleOutput::new()));
        }

        Ok(dispatcher)
    }
}

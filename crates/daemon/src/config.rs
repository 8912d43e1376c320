//! Daemon configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Daemon configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Store directory path
    pub store_path: PathBuf,

    /// HTTP listen address
    pub listen: String,

    /// Recording tool configuration
    pub recorder: RecorderConfig,

    /// Replay configuration
    pub replay: ReplayConfig,

    /// AI endpoint configuration (overrides the environment)
    pub ai: AiConfig,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            store_path: recplay_common::default_store_path(),
            listen: "127.0.0.1:7070".to_string(),
            recorder: RecorderConfig::default(),
            replay: ReplayConfig::default(),
            ai: AiConfig::default(),
        }
    }
}

/// Recording tool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Executable launched per recording session
    pub command: String,

    /// Arguments; `{output}` and `{url}` are substituted per session
    pub args: Vec<String>,

    /// Directory for per-session artifacts (defaults to `<store>/artifacts`)
    pub artifact_dir: Option<PathBuf>,

    /// Window after spawn in which an exit counts as a start failure
    pub startup_grace_ms: u64,

    /// Time between SIGTERM and SIGKILL when the daemon shuts down.
    /// Explicit stops and reaping kill immediately.
    pub shutdown_grace_ms: u64,

    /// Active sessions untouched this long are reaped (0 disables)
    pub idle_timeout_secs: u64,

    /// Sessions whose recorder exited are kept this long for a final save
    pub finished_ttl_secs: u64,

    /// Reaper interval
    pub reap_interval_secs: u64,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            command: "npx".to_string(),
            args: [
                "playwright",
                "codegen",
                "--target",
                "javascript",
                "-o",
                "{output}",
                "{url}",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            artifact_dir: None,
            startup_grace_ms: 300,
            shutdown_grace_ms: 500,
            idle_timeout_secs: 1800,
            finished_ttl_secs: 600,
            reap_interval_secs: 5,
        }
    }
}

impl RecorderConfig {
    pub fn startup_grace(&self) -> Duration {
        Duration::from_millis(self.startup_grace_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
    }

    pub fn finished_ttl(&self) -> Duration {
        Duration::from_secs(self.finished_ttl_secs)
    }

    pub fn reap_interval(&self) -> Duration {
        Duration::from_secs(self.reap_interval_secs.max(1))
    }
}

/// Replay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// Pause after the last step before the browser is released
    pub settle_delay_ms: u64,

    /// Node executable running the Playwright bridge
    pub node_binary: PathBuf,

    /// Directory from which the `playwright` package resolves
    pub working_dir: Option<PathBuf>,

    /// chromium, firefox or webkit
    pub browser: String,

    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub launch_timeout_ms: u64,
    pub navigation_timeout_ms: u64,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: 1000,
            node_binary: PathBuf::from("node"),
            working_dir: None,
            browser: "chromium".to_string(),
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
            launch_timeout_ms: 30_000,
            navigation_timeout_ms: 30_000,
        }
    }
}

/// AI endpoint settings as written in the configuration file.
/// Unset fields fall back to the environment, then to defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub timeout_ms: Option<u64>,
    pub max_retries: Option<u32>,
}

impl DaemonConfig {
    /// Load configuration from file
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the database path
    pub fn db_path(&self) -> PathBuf {
        self.store_path.join("tests.db")
    }

    /// Get the recorder artifact directory
    pub fn artifact_dir(&self) -> PathBuf {
        self.recorder
            .artifact_dir
            .clone()
            .unwrap_or_else(|| self.store_path.join("artifacts"))
    }

    /// Get the directory for replay suite results
    pub fn results_dir(&self) -> PathBuf {
        self.store_path.join("results")
    }
}

//! Recplay Common Library
//!
//! Shared data model, error taxonomy and test-case storage for the Recplay
//! recorder, replay engine and CLI.

pub mod db;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use db::{SqliteTestStore, TestCaseStore};
pub use error::{Error, Result};
pub use types::*;

/// Recplay version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default store path (`RECPLAY_HOME`, else `~/.recplay`)
pub fn default_store_path() -> std::path::PathBuf {
    if let Some(home) = std::env::var_os("RECPLAY_HOME") {
        return std::path::PathBuf::from(home);
    }
    dirs::home_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join(".recplay")
}

/// Default configuration file path
pub fn default_config_path() -> std::path::PathBuf {
    default_store_path().join("config.toml")
}

/// Default database path
pub fn default_db_path() -> std::path::PathBuf {
    default_store_path().join("tests.db")
}

/// Default directory for recorder artifacts
pub fn default_artifact_dir() -> std::path::PathBuf {
    default_store_path().join("artifacts")
}

/// Home directory helper
mod dirs {
    pub fn home_dir() -> Option<std::path::PathBuf> {
        std::env::var_os("HOME").map(std::path::PathBuf::from)
    }
}

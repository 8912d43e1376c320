//! Error types for replay

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReplayError {
    /// The browser could not be launched
    #[error("Browser launch failed: {0}")]
    Launch(String),

    /// The automation capability rejected an operation. The message is the
    /// driver's own and is surfaced verbatim in step results.
    #[error("{0}")]
    Driver(String),

    #[error("Timed out after {ms} ms waiting for {op}")]
    Timeout { op: String, ms: u64 },

    /// The bridge process went away or spoke out of protocol
    #[error("Browser bridge error: {0}")]
    Bridge(String),

    #[error("Replay plan parse error: {0}")]
    PlanParse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type DriverResult<T> = Result<T, ReplayError>;

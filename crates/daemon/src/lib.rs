//! Recplay daemon
//!
//! Supervises recording sessions, replays recorded steps and brokers AI
//! requests, all behind a small HTTP API.
//!
//! ```text
//!   HTTP (api) ──► AppContext
//!                    ├── RecorderSupervisor ──► RecordingBackend (codegen)
//!                    ├── ReplayService ───────► StepRunner (recplay-replay)
//!                    ├── AiGateway ───────────► Transport (reqwest)
//!                    └── SessionRegistry ◄──── Reaper
//! ```

pub mod api;
pub mod backend;
pub mod codegen;
pub mod config;
pub mod context;
pub mod gateway;
pub mod reaper;
pub mod recorder;
pub mod registry;
pub mod replay;

pub use config::DaemonConfig;
pub use context::AppContext;

//! Recplay replay engine
//!
//! Replays recorded browser interactions with fail-fast semantics:
//! - `driver`: the browser-automation capability and the action executor
//! - `runner`: the step runner sequencing actions and producing results
//! - `playwright`: production driver backed by a node bridge process
//! - `plan`: declarative replay plans loaded from YAML/JSON files
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  StepRunner                                              │
//! │    ├── DriverFactory::launch() -> Box<dyn BrowserDriver> │
//! │    ├── goto_url(target_url)     (navigation failure)     │
//! │    ├── for each Action: ActionExecutor::execute()        │
//! │    │     └── stop at first failure                       │
//! │    ├── settle delay                                      │
//! │    └── close()                                           │
//! └──────────────────────────────────────────────────────────┘
//! ```

pub mod driver;
pub mod error;
pub mod plan;
pub mod playwright;
pub mod runner;

pub use driver::{ActionExecutor, BrowserDriver, DriverFactory};
pub use error::{DriverResult, ReplayError};
pub use plan::ReplayPlan;
pub use playwright::{PlaywrightConfig, PlaywrightDriver, PlaywrightFactory};
pub use runner::{run_with_driver, write_results, PlanResult, RunnerConfig, StepRunner, SuiteResult};

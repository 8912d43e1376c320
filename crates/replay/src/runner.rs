//! Step runner: replays an action sequence with fail-fast semantics

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use recplay_common::{
    Action, FailureKind, ReplayResult, RunStatus, StepResult, StepStatus,
};

use crate::driver::{ActionExecutor, BrowserDriver, DriverFactory};
use crate::error::DriverResult;
use crate::plan::ReplayPlan;

/// Default pause between the last action and releasing the browser
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(1000);

/// Configuration for the step runner
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Grace period after the last action before the browser is closed
    pub settle_delay: Duration,

    /// Output directory for suite results
    pub output_dir: PathBuf,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            settle_delay: DEFAULT_SETTLE_DELAY,
            output_dir: PathBuf::from("test-results"),
        }
    }
}

/// Result of one plan within a suite
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanResult {
    pub name: String,
    #[serde(flatten)]
    pub result: ReplayResult,
}

/// Result of running several plans
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteResult {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub duration_ms: u64,
    pub results: Vec<PlanResult>,
}

impl SuiteResult {
    /// Tally per-plan results into a suite summary
    pub fn from_results(results: Vec<PlanResult>, duration_ms: u64) -> Self {
        let passed = results.iter().filter(|r| r.result.passed()).count();
        Self {
            total: results.len(),
            passed,
            failed: results.len() - passed,
            duration_ms,
            results,
        }
    }
}

/// Replays action sequences, launching one browser per run
pub struct StepRunner {
    factory: Arc<dyn DriverFactory>,
    config: RunnerConfig,
}

impl StepRunner {
    /// Create a step runner over a driver factory
    pub fn new(factory: Arc<dyn DriverFactory>, config: RunnerConfig) -> Self {
        Self { factory, config }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Launch a browser, replay `steps` against `target_url` and release it.
    ///
    /// Always returns a complete result; launch, navigation and step failures
    /// are reported as data.
    pub async fn run(&self, target_url: &str, steps: &[Action]) -> ReplayResult {
        let start = Instant::now();

        let mut driver = match self.factory.launch().await {
            Ok(driver) => driver,
            Err(e) => {
                error!("Browser launch failed: {}", e);
                return ReplayResult {
                    status: RunStatus::Failed,
                    duration_ms: start.elapsed().as_millis() as u64,
                    step_results: Vec::new(),
                    failure_reason: Some(e.to_string()),
                    failure_kind: Some(FailureKind::Launch),
                };
            }
        };

        let result =
            run_with_driver(driver.as_mut(), target_url, steps, self.config.settle_delay).await;

        if let Err(e) = driver.close().await {
            warn!("Failed to close browser: {}", e);
        }

        result
    }

    /// Run a list of replay plans, one browser each
    pub async fn run_plans(&self, plans: &[ReplayPlan]) -> SuiteResult {
        let start = Instant::now();
        let mut results = Vec::with_capacity(plans.len());

        info!("Running {} replay plan(s)...", plans.len());

        for plan in plans {
            let result = self.run(&plan.target_url, &plan.steps).await;
            if result.passed() {
                info!("✓ {} ({} ms)", plan.name, result.duration_ms);
            } else {
                error!(
                    "✗ {} - {}",
                    plan.name,
                    result.failure_reason.as_deref().unwrap_or("unknown error")
                );
            }
            results.push(PlanResult {
                name: plan.name.clone(),
                result,
            });
        }

        let suite = SuiteResult::from_results(results, start.elapsed().as_millis() as u64);
        info!(
            "Replay results: {} passed, {} failed ({} ms)",
            suite.passed, suite.failed, suite.duration_ms
        );
        suite
    }

    /// Write suite results to a JSON file in the configured output directory
    pub fn write_results(&self, results: &SuiteResult) -> DriverResult<PathBuf> {
        write_results(&self.config.output_dir, results)
    }
}

/// Write suite results as `replay-results.json` under `output_dir`
pub fn write_results(output_dir: &Path, results: &SuiteResult) -> DriverResult<PathBuf> {
    std::fs::create_dir_all(output_dir)?;

    let path = output_dir.join("replay-results.json");
    let json = serde_json::to_string_pretty(results)?;
    std::fs::write(&path, json)?;

    info!("Results written to: {}", path.display());
    Ok(path)
}

/// Replay against an already launched driver. The caller owns the driver and
/// is responsible for closing it.
///
/// `duration_ms` covers navigation and the steps; the settle delay is not
/// counted.
pub async fn run_with_driver(
    driver: &mut dyn BrowserDriver,
    target_url: &str,
    steps: &[Action],
    settle_delay: Duration,
) -> ReplayResult {
    let start = Instant::now();

    debug!("Navigating to {}", target_url);
    if let Err(e) = driver.goto_url(target_url).await {
        let duration_ms = start.elapsed().as_millis() as u64;
        warn!("Initial navigation to {} failed: {}", target_url, e);
        settle(driver, settle_delay).await;
        return ReplayResult {
            status: RunStatus::Failed,
            duration_ms,
            step_results: Vec::new(),
            failure_reason: Some(format!("Navigation to {} failed: {}", target_url, e)),
            failure_kind: Some(FailureKind::Navigation),
        };
    }

    let mut step_results = Vec::with_capacity(steps.len());
    let mut failure_reason = None;

    for (index, action) in steps.iter().enumerate() {
        let step_start = Instant::now();
        let outcome = ActionExecutor::execute(driver, action).await;
        let duration_ms = step_start.elapsed().as_millis() as u64;

        match outcome {
            Ok(()) => {
                debug!("Step {} ({}) passed", index + 1, action.tag());
                step_results.push(StepResult {
                    index,
                    action: action.tag().to_string(),
                    status: StepStatus::Passed,
                    error: None,
                    duration_ms,
                });
            }
            Err(e) => {
                let message = e.to_string();
                warn!("Step {} ({}) failed: {}", index + 1, action.tag(), message);
                failure_reason = Some(format!("Step {} ({}): {}", index + 1, action.tag(), message));
                step_results.push(StepResult {
                    index,
                    action: action.tag().to_string(),
                    status: StepStatus::Failed,
                    error: Some(message),
                    duration_ms,
                });
                break;
            }
        }
    }

    let duration_ms = start.elapsed().as_millis() as u64;
    settle(driver, settle_delay).await;

    let (status, failure_kind) = match failure_reason {
        Some(_) => (RunStatus::Failed, Some(FailureKind::Step)),
        None => (RunStatus::Passed, None),
    };

    ReplayResult {
        status,
        duration_ms,
        step_results,
        failure_reason,
        failure_kind,
    }
}

async fn settle(driver: &mut dyn BrowserDriver, delay: Duration) {
    if delay.is_zero() {
        return;
    }
    if let Err(e) = driver.wait_for(delay).await {
        debug!("Settle delay interrupted: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recplay_common::TestStatus;

    fn passed_result() -> ReplayResult {
        ReplayResult {
            status: RunStatus::Passed,
            duration_ms: 12,
            step_results: vec![],
            failure_reason: None,
            failure_kind: None,
        }
    }

    #[test]
    fn test_write_results() {
        let dir = tempfile::tempdir().unwrap();
        let suite = SuiteResult {
            total: 1,
            passed: 1,
            failed: 0,
            duration_ms: 12,
            results: vec![PlanResult {
                name: "smoke".into(),
                result: passed_result(),
            }],
        };

        let path = write_results(dir.path(), &suite).unwrap();
        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(written["results"][0]["name"], "smoke");
        assert_eq!(written["results"][0]["status"], "passed");
        assert_eq!(TestStatus::from(suite.results[0].result.status), TestStatus::Passed);
    }
}

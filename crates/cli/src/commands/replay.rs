//! Replay command
//!
//! Runs replay plans either through the daemon or in-process with a local
//! browser, then writes `replay-results.json`.

use anyhow::{bail, Result};
use clap::Args;
use colored::Colorize;
use recplay_common::{ReplayResult, StepStatus};
use recplay_replay::{
    playwright::Browser, write_results, PlanResult, PlaywrightConfig, PlaywrightFactory,
    ReplayPlan, RunnerConfig, StepRunner, SuiteResult,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

use crate::client::DaemonClient;
use crate::output::{print_info, print_list, print_value, truncate, OutputFormat, TableDisplay};

#[derive(Args)]
pub struct ReplayArgs {
    /// Plan file or directory of plans
    pub path: PathBuf,

    /// Only run plans carrying this tag
    #[arg(short, long)]
    pub tag: Option<String>,

    /// Replay in-process with a local browser instead of through the daemon
    #[arg(long)]
    pub local: bool,

    /// Directory for replay-results.json
    #[arg(short, long, default_value = "test-results")]
    pub output: PathBuf,

    /// Browser for local replays (chromium, firefox, webkit)
    #[arg(long, default_value = "chromium")]
    pub browser: String,

    /// Show the browser window during local replays
    #[arg(long)]
    pub headed: bool,

    /// Node executable for local replays
    #[arg(long, default_value = "node")]
    pub node: PathBuf,

    /// Pause after the last step before closing the browser, in milliseconds
    #[arg(long, default_value = "1000")]
    pub settle_ms: u64,
}

/// One row per replayed plan
#[derive(Serialize)]
pub struct ResultDisplay {
    pub name: String,
    pub passed: bool,
    pub steps: usize,
    pub duration_ms: u64,
    pub failure: Option<String>,
}

impl ResultDisplay {
    pub fn new(name: &str, result: &ReplayResult) -> Self {
        Self {
            name: name.to_string(),
            passed: result.passed(),
            steps: result.step_results.len(),
            duration_ms: result.duration_ms,
            failure: result.failure_reason.clone(),
        }
    }
}

impl TableDisplay for ResultDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["Plan", "Status", "Steps", "Duration", "Failure"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            if self.passed {
                "passed".green().to_string()
            } else {
                "failed".red().to_string()
            },
            self.steps.to_string(),
            format!("{} ms", self.duration_ms),
            self.failure
                .as_deref()
                .map(|f| truncate(f, 60))
                .unwrap_or_default(),
        ]
    }
}

/// Per-step breakdown for one replay
pub fn print_result(name: &str, result: &ReplayResult) {
    println!("{}", name.bold());
    for step in &result.step_results {
        let mark = match step.status {
            StepStatus::Passed => "✓".green(),
            StepStatus::Failed => "✗".red(),
        };
        match &step.error {
            Some(err) => println!("  {} {} {} - {}", mark, step.index + 1, step.action, err),
            None => println!(
                "  {} {} {} ({} ms)",
                mark,
                step.index + 1,
                step.action,
                step.duration_ms
            ),
        }
    }
    if result.step_results.is_empty() {
        if let Some(reason) = &result.failure_reason {
            println!("  {} {}", "✗".red(), reason);
        }
    }
}

/// Returns false when any plan failed
pub async fn execute(
    args: ReplayArgs,
    client: Result<DaemonClient>,
    format: OutputFormat,
) -> Result<bool> {
    let mut plans = ReplayPlan::load(&args.path)?;
    if let Some(tag) = &args.tag {
        plans = ReplayPlan::filter_by_tag(&plans, tag)
            .into_iter()
            .cloned()
            .collect();
    }
    if plans.is_empty() {
        bail!("no replay plans found at {}", args.path.display());
    }

    let suite = if args.local {
        run_local(&args, &plans).await?
    } else {
        run_remote(&client?, &plans).await?
    };

    let path = write_results(&args.output, &suite)?;

    if format.is_human() {
        let rows: Vec<ResultDisplay> = suite
            .results
            .iter()
            .map(|r| ResultDisplay::new(&r.name, &r.result))
            .collect();
        print_list(&rows, format);
        for failed in suite.results.iter().filter(|r| !r.result.passed()) {
            print_result(&failed.name, &failed.result);
        }
        println!(
            "{} passed, {} failed, {} total ({} ms)",
            suite.passed.to_string().green(),
            suite.failed.to_string().red(),
            suite.total,
            suite.duration_ms
        );
        print_info(&format!("Results written to {}", path.display()));
    } else {
        print_value(&suite, "", format);
    }

    Ok(suite.failed == 0)
}

async fn run_local(args: &ReplayArgs, plans: &[ReplayPlan]) -> Result<SuiteResult> {
    let browser: Browser = args.browser.parse()?;
    let factory = PlaywrightFactory::new(PlaywrightConfig {
        node_binary: args.node.clone(),
        browser,
        headless: !args.headed,
        ..Default::default()
    });
    let runner = StepRunner::new(
        Arc::new(factory),
        RunnerConfig {
            settle_delay: Duration::from_millis(args.settle_ms),
            output_dir: args.output.clone(),
        },
    );

    info!("Replaying {} plan(s) locally", plans.len());
    Ok(runner.run_plans(plans).await)
}

async fn run_remote(client: &DaemonClient, plans: &[ReplayPlan]) -> Result<SuiteResult> {
    info!("Replaying {} plan(s) through {}", plans.len(), client.addr());

    let start = Instant::now();
    let mut results = Vec::with_capacity(plans.len());
    for plan in plans {
        let result = client.replay(&plan.to_request()).await?;
        results.push(PlanResult {
            name: plan.name.clone(),
            result,
        });
    }

    Ok(SuiteResult::from_results(
        results,
        start.elapsed().as_millis() as u64,
    ))
}

//! Stored test commands

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use recplay_common::{NewTestCase, TestCase, TestStatus};
use recplay_replay::ReplayPlan;
use serde::Serialize;
use std::path::PathBuf;

use crate::client::DaemonClient;
use crate::commands::replay::{print_result, ResultDisplay};
use crate::output::{
    format_timestamp, print_item, print_list, print_success, print_value, truncate, OutputFormat,
    TableDisplay,
};

#[derive(Subcommand)]
pub enum TestCommands {
    /// List or search saved tests
    List {
        /// Match against name, URL and code
        #[arg(short, long)]
        query: Option<String>,
    },

    /// Show a saved test, including its code
    Get {
        /// Test ID
        id: String,
    },

    /// Replay a saved test and record the outcome
    Run {
        /// Test ID
        id: String,
    },

    /// Delete a saved test
    Delete {
        /// Test ID
        id: String,
    },

    /// Create a test from a replay plan file
    Import {
        /// Plan file (YAML or JSON)
        file: PathBuf,
    },
}

/// Test case display wrapper
#[derive(Serialize)]
pub struct TestDisplay {
    pub id: String,
    pub name: String,
    pub url: String,
    pub status: String,
    pub steps: usize,
    pub created: String,
    pub last_run: String,
    #[serde(skip)]
    status_kind: TestStatus,
}

impl From<TestCase> for TestDisplay {
    fn from(t: TestCase) -> Self {
        Self {
            id: t.id,
            name: t.name,
            url: t.url,
            status: t.status.to_string(),
            steps: t.steps.len(),
            created: format_timestamp(t.created_at),
            last_run: t
                .last_run_at
                .map(format_timestamp)
                .unwrap_or_else(|| "never".into()),
            status_kind: t.status,
        }
    }
}

impl TableDisplay for TestDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["ID", "Name", "URL", "Status", "Steps", "Created", "Last Run"]
    }

    fn row(&self) -> Vec<String> {
        let status = match self.status_kind {
            TestStatus::Passed => self.status.green().to_string(),
            TestStatus::Failed => self.status.red().to_string(),
            TestStatus::NotRun => self.status.dimmed().to_string(),
        };
        vec![
            self.id.clone(),
            self.name.clone(),
            truncate(&self.url, 48),
            status,
            self.steps.to_string(),
            self.created.clone(),
            self.last_run.clone(),
        ]
    }
}

/// A plan becomes a test with its steps; recorded code stays empty
pub fn plan_to_test(plan: ReplayPlan) -> NewTestCase {
    let mut test = NewTestCase {
        name: plan.name,
        url: plan.target_url,
        steps: plan.steps,
        ..Default::default()
    };
    if !plan.description.is_empty() {
        test.metadata.insert("description".into(), plan.description);
    }
    if !plan.tags.is_empty() {
        test.metadata.insert("tags".into(), plan.tags.join(","));
    }
    test
}

/// Returns false when a run failed
pub async fn execute(cmd: TestCommands, client: DaemonClient, format: OutputFormat) -> Result<bool> {
    match cmd {
        TestCommands::List { query } => {
            let tests = client.list_tests(query.as_deref()).await?;
            let displays: Vec<TestDisplay> = tests.into_iter().map(TestDisplay::from).collect();
            print_list(&displays, format);
        }

        TestCommands::Get { id } => {
            let test = client.get_test(&id).await?;
            if format.is_human() {
                let code = test.code.clone();
                print_item(&TestDisplay::from(test), format);
                if !code.trim().is_empty() {
                    println!("{}", code.trim_end());
                }
            } else {
                print_value(&test, "", format);
            }
        }

        TestCommands::Run { id } => {
            let run = client.run_test(&id).await?;
            let passed = run.result.passed();
            if format.is_human() {
                print_item(&ResultDisplay::new(&run.test.name, &run.result), format);
                print_result(&run.test.name, &run.result);
            } else {
                print_value(&run, "", format);
            }
            return Ok(passed);
        }

        TestCommands::Delete { id } => {
            client.delete_test(&id).await?;
            print_success(&format!("Test {} deleted", id));
        }

        TestCommands::Import { file } => {
            let plan = ReplayPlan::from_file(&file)?;
            let test = client.create_test(&plan_to_test(plan)).await?;
            if format.is_human() {
                print_success(&format!("Imported test '{}' ({})", test.name, test.id));
            }
            print_item(&TestDisplay::from(test), format);
        }
    }

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_to_test_keeps_steps_and_tags() {
        let plan = ReplayPlan::from_yaml(
            r##"
name: search
description: Search for a crate
tags: [smoke, search]
target_url: https://crates.io
steps:
  - action: fill
    selector: "#q"
    value: serde
  - action: click
    selector: "button[type=submit]"
"##,
        )
        .unwrap();

        let test = plan_to_test(plan);
        assert_eq!(test.name, "search");
        assert_eq!(test.url, "https://crates.io");
        assert_eq!(test.steps.len(), 2);
        assert_eq!(test.metadata["tags"], "smoke,search");
        assert_eq!(test.metadata["description"], "Search for a crate");
        assert!(test.code.is_empty());
    }
}

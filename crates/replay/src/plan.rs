//! Declarative replay plans loaded from YAML or JSON files

use serde::{Deserialize, Serialize};
use std::path::Path;

use recplay_common::{Action, ReplayRequest};

use crate::error::{DriverResult, ReplayError};

/// A named replay: where to start and which actions to perform
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayPlan {
    /// Unique name for this plan
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Tags for filtering plans
    #[serde(default)]
    pub tags: Vec<String>,

    /// Initial navigation target
    #[serde(alias = "targetUrl")]
    pub target_url: String,

    /// Steps to execute in order
    #[serde(default)]
    pub steps: Vec<Action>,
}

impl ReplayPlan {
    /// Parse a plan from a YAML string (JSON documents parse too)
    pub fn from_yaml(yaml: &str) -> DriverResult<Self> {
        let plan: Self = serde_yaml::from_str(yaml)?;
        plan.validate()?;
        Ok(plan)
    }

    /// Parse a plan from a JSON string
    pub fn from_json(json: &str) -> DriverResult<Self> {
        let plan: Self = serde_json::from_str(json)?;
        plan.validate()?;
        Ok(plan)
    }

    /// Parse a plan from a file, choosing the format by extension
    pub fn from_file(path: &Path) -> DriverResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let plan = if has_extension(path, &["json"]) {
            Self::from_json(&content)
        } else {
            Self::from_yaml(&content)
        };
        plan.map_err(|e| ReplayError::PlanParse(format!("{}: {}", path.display(), e)))
    }

    /// Load all plans from a directory, ordered by path
    pub fn load_all(dir: &Path) -> DriverResult<Vec<Self>> {
        let mut paths: Vec<_> = walkdir::WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| has_extension(p, &["yaml", "yml", "json"]))
            .collect();
        paths.sort();

        paths.iter().map(|p| Self::from_file(p)).collect()
    }

    /// Load a single file or every plan under a directory
    pub fn load(path: &Path) -> DriverResult<Vec<Self>> {
        if path.is_dir() {
            Self::load_all(path)
        } else {
            Ok(vec![Self::from_file(path)?])
        }
    }

    /// Filter plans by tag
    pub fn filter_by_tag<'a>(plans: &'a [Self], tag: &str) -> Vec<&'a Self> {
        plans.iter().filter(|p| p.tags.iter().any(|t| t == tag)).collect()
    }

    /// The request the step runner executes for this plan
    pub fn to_request(&self) -> ReplayRequest {
        ReplayRequest {
            target_url: self.target_url.clone(),
            steps: self.steps.clone(),
        }
    }

    fn validate(&self) -> DriverResult<()> {
        if self.name.trim().is_empty() {
            return Err(ReplayError::PlanParse("plan name must not be empty".into()));
        }
        if self.target_url.trim().is_empty() {
            return Err(ReplayError::PlanParse(format!(
                "plan '{}' has no target_url",
                self.name
            )));
        }
        Ok(())
    }
}

fn has_extension(path: &Path, exts: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| exts.contains(&e))
        .unwrap_or(false)
}

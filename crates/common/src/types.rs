//! Core types for Recplay

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

/// Default per-action timeout for click and fill
pub const DEFAULT_ACTION_TIMEOUT_MS: u64 = 5000;

/// Default duration of a wait action
pub const DEFAULT_WAIT_MS: u64 = 1000;

// ============================================================================
// Replay
// ============================================================================

/// One typed browser operation in a replay sequence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Navigate the page to a URL
    Navigate { url: String },

    /// Click the element matched by a locator
    Click {
        selector: String,
        #[serde(default, alias = "timeoutMs", skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
    },

    /// Fill an input matched by a locator
    Fill {
        selector: String,
        value: String,
        #[serde(default, alias = "timeoutMs", skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
    },

    /// Wait for a fixed amount of time
    Wait {
        #[serde(default, alias = "durationMs", skip_serializing_if = "Option::is_none")]
        duration_ms: Option<u64>,
    },
}

impl Action {
    /// The action tag as it appears on the wire and in failure reasons
    pub fn tag(&self) -> &'static str {
        match self {
            Action::Navigate { .. } => "navigate",
            Action::Click { .. } => "click",
            Action::Fill { .. } => "fill",
            Action::Wait { .. } => "wait",
        }
    }

    /// Effective locator timeout for click/fill, with the default applied
    pub fn locator_timeout(&self) -> Duration {
        let ms = match self {
            Action::Click { timeout_ms, .. } | Action::Fill { timeout_ms, .. } => {
                timeout_ms.unwrap_or(DEFAULT_ACTION_TIMEOUT_MS)
            }
            _ => DEFAULT_ACTION_TIMEOUT_MS,
        };
        Duration::from_millis(ms)
    }

    /// Effective wait duration, with the default applied
    pub fn wait_duration(&self) -> Duration {
        match self {
            Action::Wait { duration_ms } => {
                Duration::from_millis(duration_ms.unwrap_or(DEFAULT_WAIT_MS))
            }
            _ => Duration::ZERO,
        }
    }
}

/// A request to replay an ordered action sequence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayRequest {
    /// Initial navigation target
    #[serde(alias = "targetUrl")]
    pub target_url: String,

    /// Steps executed strictly in order
    #[serde(default)]
    pub steps: Vec<Action>,
}

/// Outcome of a single step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Passed,
    Failed,
}

/// One executed action plus its outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    /// Zero-based position in the request's step list
    pub index: usize,
    /// Action tag
    pub action: String,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub duration_ms: u64,
}

/// Overall outcome of a replay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Passed,
    Failed,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Passed => write!(f, "passed"),
            RunStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Where a failed replay stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The browser could not be launched
    Launch,
    /// The initial navigation failed; no step was attempted
    Navigation,
    /// A step failed
    Step,
}

/// Complete result of a replay. Always produced, never replaced by an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayResult {
    pub status: RunStatus,
    pub duration_ms: u64,
    pub step_results: Vec<StepResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_kind: Option<FailureKind>,
}

impl ReplayResult {
    pub fn passed(&self) -> bool {
        self.status == RunStatus::Passed
    }
}

// ============================================================================
// Test cases
// ============================================================================

/// Status of a stored test case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    #[default]
    #[serde(rename = "not run", alias = "not_run")]
    NotRun,
    Passed,
    Failed,
}

impl TestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestStatus::NotRun => "not run",
            TestStatus::Passed => "passed",
            TestStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for TestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<RunStatus> for TestStatus {
    fn from(status: RunStatus) -> Self {
        match status {
            RunStatus::Passed => TestStatus::Passed,
            RunStatus::Failed => TestStatus::Failed,
        }
    }
}

/// A persisted test case
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCase {
    pub id: String,
    pub name: String,
    pub url: String,
    pub code: String,
    #[serde(default)]
    pub steps: Vec<Action>,
    #[serde(default)]
    pub status: TestStatus,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(default)]
    pub last_run_at: Option<i64>,
}

/// Input for creating a test case
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewTestCase {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub steps: Vec<Action>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl NewTestCase {
    /// Materialize into a record with a fresh id and timestamps
    pub fn into_record(self) -> TestCase {
        let now = chrono::Utc::now().timestamp();
        TestCase {
            id: Uuid::new_v4().to_string(),
            name: self.name,
            url: self.url,
            code: self.code,
            steps: self.steps,
            status: TestStatus::NotRun,
            metadata: self.metadata,
            created_at: now,
            updated_at: now,
            last_run_at: None,
        }
    }
}

// ============================================================================
// Sessions
// ============================================================================

/// Discriminates the two kinds of in-memory session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    Recording,
    Replay,
}

/// Lifecycle of a recording session
///
/// `Active -> Finished` happens when the recorder exits on its own.
/// `Active | Finished -> Destroyed` happens on save or stop and is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Active,
    Finished,
    Destroyed,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Active => write!(f, "active"),
            SessionState::Finished => write!(f, "finished"),
            SessionState::Destroyed => write!(f, "destroyed"),
        }
    }
}

/// Poll result for a recording session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingStatus {
    pub session_id: String,
    pub state: SessionState,
    pub running: bool,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

/// Diagnostic view of a recording session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingSummary {
    pub session_id: String,
    pub target_url: String,
    pub test_name: String,
    pub state: SessionState,
    pub started_at: i64,
    pub age_secs: u64,
    #[serde(default)]
    pub pid: Option<u32>,
}

/// Registry-level view of any session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub kind: SessionKind,
    pub started_at: i64,
    pub target_url: String,
}

/// Body of a recording start request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartRecordingRequest {
    pub url: String,
    #[serde(alias = "testName")]
    pub test_name: String,
}

/// Body of a recording start response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartRecordingResponse {
    pub session_id: String,
}

/// Body of a recording save request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SaveRecordingRequest {
    #[serde(default, alias = "testName")]
    pub test_name: Option<String>,
}

// ============================================================================
// AI gateway
// ============================================================================

/// What the model is asked to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AiRequestKind {
    /// Turn recorded steps/code into structured intent
    Analyze,
    /// Turn approved intent into test code
    Generate,
}

impl AiRequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AiRequestKind::Analyze => "analyze",
            AiRequestKind::Generate => "generate",
        }
    }
}

/// A request to the AI gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiRequest {
    pub kind: AiRequestKind,
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Structured intent extracted from a recording
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisResult {
    pub intent: String,
    pub steps: Vec<serde_json::Value>,
    pub assertions: Vec<serde_json::Value>,
    pub confidence: f64,
}

/// Normalized AI gateway output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AiResponse {
    Analyze(AnalysisResult),
    Generate { code: String },
}

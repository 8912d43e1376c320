//! Daemon HTTP client

use anyhow::Result;
use recplay_common::{
    AiRequestKind, AiResponse, NewTestCase, RecordingStatus, RecordingSummary, ReplayRequest,
    ReplayResult, SaveRecordingRequest, SessionSummary, StartRecordingRequest,
    StartRecordingResponse, TestCase,
};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Failures talking to the daemon
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("cannot reach daemon at {addr}: {message}")]
    Unreachable { addr: String, message: String },

    #[error("{message} [{code}, HTTP {status}]")]
    Api {
        status: u16,
        code: String,
        message: String,
    },
}

impl ClientError {
    /// Build an API error from a non-2xx response body
    pub fn from_response(status: u16, body: &str) -> Self {
        #[derive(Deserialize)]
        struct ErrorBody {
            error: String,
            #[serde(default)]
            code: String,
        }

        match serde_json::from_str::<ErrorBody>(body) {
            Ok(e) => ClientError::Api {
                status,
                code: if e.code.is_empty() { "unknown".into() } else { e.code },
                message: e.error,
            },
            Err(_) => ClientError::Api {
                status,
                code: "unknown".into(),
                message: body.trim().to_string(),
            },
        }
    }

    /// Machine-readable code returned by the daemon, if any
    pub fn code(&self) -> Option<&str> {
        match self {
            ClientError::Api { code, .. } => Some(code),
            ClientError::Unreachable { .. } => None,
        }
    }
}

#[derive(Deserialize)]
struct TestList {
    tests: Vec<TestCase>,
}

#[derive(Deserialize)]
struct RecordingList {
    recordings: Vec<RecordingSummary>,
}

#[derive(Deserialize)]
struct SessionList {
    sessions: Vec<SessionSummary>,
}

/// Result of running a stored test through the daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestRun {
    pub test: TestCase,
    pub result: ReplayResult,
}

/// Client for the daemon's JSON API
#[derive(Clone)]
pub struct DaemonClient {
    http: reqwest::Client,
    base: Url,
}

impl DaemonClient {
    /// Create a client for the daemon at `addr` (e.g. `http://127.0.0.1:7070`)
    pub fn new(addr: &str) -> Result<Self> {
        let base = Url::parse(addr)?;
        Ok(Self {
            http: reqwest::Client::new(),
            base,
        })
    }

    pub fn addr(&self) -> &str {
        self.base.as_str()
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let url = self.base.join(path)?;
        debug!("{} {}", method, url);
        Ok(self.http.request(method, url))
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request
            .send()
            .await
            .map_err(|e| ClientError::Unreachable {
                addr: self.base.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ClientError::from_response(status.as_u16(), &body).into());
        }
        Ok(serde_json::from_str(&body)?)
    }

    /// Check if the daemon is healthy
    pub async fn health_check(&self) -> Result<Value> {
        self.send(self.request(Method::GET, "/health")?).await
    }

    pub async fn list_sessions(&self) -> Result<Vec<SessionSummary>> {
        let list: SessionList = self.send(self.request(Method::GET, "/api/sessions")?).await?;
        Ok(list.sessions)
    }

    // Recording

    pub async fn start_recording(&self, url: &str, test_name: &str) -> Result<String> {
        let body = StartRecordingRequest {
            url: url.to_string(),
            test_name: test_name.to_string(),
        };
        let resp: StartRecordingResponse = self
            .send(self.request(Method::POST, "/api/recordings")?.json(&body))
            .await?;
        Ok(resp.session_id)
    }

    pub async fn recording_status(&self, id: &str) -> Result<RecordingStatus> {
        self.send(self.request(Method::GET, &format!("/api/recordings/{}", id))?)
            .await
    }

    pub async fn save_recording(&self, id: &str, test_name: Option<String>) -> Result<TestCase> {
        let body = SaveRecordingRequest { test_name };
        self.send(
            self.request(Method::POST, &format!("/api/recordings/{}/save", id))?
                .json(&body),
        )
        .await
    }

    pub async fn stop_recording(&self, id: &str) -> Result<()> {
        let _: Value = self
            .send(self.request(Method::POST, &format!("/api/recordings/{}/stop", id))?)
            .await?;
        Ok(())
    }

    pub async fn list_recordings(&self) -> Result<Vec<RecordingSummary>> {
        let list: RecordingList = self
            .send(self.request(Method::GET, "/api/recordings")?)
            .await?;
        Ok(list.recordings)
    }

    // Replay

    pub async fn replay(&self, request: &ReplayRequest) -> Result<ReplayResult> {
        self.send(self.request(Method::POST, "/api/replay")?.json(request))
            .await
    }

    // Test cases

    pub async fn list_tests(&self, query: Option<&str>) -> Result<Vec<TestCase>> {
        let mut request = self.request(Method::GET, "/api/tests")?;
        if let Some(q) = query {
            request = request.query(&[("q", q)]);
        }
        let list: TestList = self.send(request).await?;
        Ok(list.tests)
    }

    pub async fn get_test(&self, id: &str) -> Result<TestCase> {
        self.send(self.request(Method::GET, &format!("/api/tests/{}", id))?)
            .await
    }

    pub async fn create_test(&self, test: &NewTestCase) -> Result<TestCase> {
        self.send(self.request(Method::POST, "/api/tests")?.json(test))
            .await
    }

    pub async fn run_test(&self, id: &str) -> Result<TestRun> {
        self.send(self.request(Method::POST, &format!("/api/tests/{}/run", id))?)
            .await
    }

    pub async fn delete_test(&self, id: &str) -> Result<()> {
        let _: Value = self
            .send(self.request(Method::DELETE, &format!("/api/tests/{}", id))?)
            .await?;
        Ok(())
    }

    // AI

    pub async fn ai(&self, kind: AiRequestKind, payload: Value) -> Result<AiResponse> {
        let path = format!("/api/ai/{}", kind.as_str());
        self.send(
            self.request(Method::POST, &path)?
                .json(&json!({ "payload": payload })),
        )
        .await
    }
}

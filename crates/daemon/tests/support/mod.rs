//! In-process doubles shared by the daemon integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use recplay_common::{Error, Result, SqliteTestStore, TestCaseStore};
use recplay_daemon::backend::{remove_artifact, ExitInfo, ProcessPoll, RecordingBackend, RecordingProcess};
use recplay_daemon::gateway::{AiGateway, GatewayConfig, Transport, TransportError, TransportResponse};
use recplay_daemon::recorder::{RecorderSupervisor, SupervisorConfig};
use recplay_daemon::registry::SessionRegistry;
use recplay_daemon::AppContext;
use recplay_replay::{BrowserDriver, DriverFactory, DriverResult, RunnerConfig, StepRunner};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use url::Url;

// ============================================================================
// Recording backend
// ============================================================================

type ExitSender = Arc<watch::Sender<Option<ExitInfo>>>;

/// Backend whose "processes" are driven by the test
#[derive(Clone, Default)]
pub struct FakeBackend {
    sessions: Arc<Mutex<HashMap<String, (PathBuf, ExitSender)>>>,
    spawn_error: Option<String>,
}

impl FakeBackend {
    pub fn failing(message: &str) -> Self {
        Self {
            spawn_error: Some(message.to_string()),
            ..Default::default()
        }
    }

    pub fn started(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    pub fn artifact(&self, session_id: &str) -> PathBuf {
        self.sessions.lock().unwrap()[session_id].0.clone()
    }

    /// Simulate the recorder writing generated code
    pub fn write_code(&self, session_id: &str, code: &str) {
        std::fs::write(self.artifact(session_id), code).unwrap();
    }

    /// Simulate the recorder exiting on its own
    pub fn exit(&self, session_id: &str, code: i32) {
        let tx = self.sessions.lock().unwrap()[session_id].1.clone();
        tx.send_replace(Some(ExitInfo {
            code: Some(code),
            killed: false,
        }));
    }
}

#[async_trait]
impl RecordingBackend for FakeBackend {
    async fn start(
        &self,
        session_id: &str,
        _target_url: &str,
        artifact_path: &Path,
    ) -> Result<Box<dyn RecordingProcess>> {
        if let Some(msg) = &self.spawn_error {
            return Err(Error::Spawn(msg.clone()));
        }

        let (tx, _rx) = watch::channel(None);
        let tx = Arc::new(tx);
        self.sessions.lock().unwrap().insert(
            session_id.to_string(),
            (artifact_path.to_path_buf(), tx.clone()),
        );
        Ok(Box::new(FakeProcess {
            artifact: artifact_path.to_path_buf(),
            exit_tx: tx,
        }))
    }
}

struct FakeProcess {
    artifact: PathBuf,
    exit_tx: ExitSender,
}

#[async_trait]
impl RecordingProcess for FakeProcess {
    fn pid(&self) -> Option<u32> {
        Some(4242)
    }

    fn poll(&self) -> ProcessPoll {
        ProcessPoll::from_exit(*self.exit_tx.borrow())
    }

    fn exit_watch(&self) -> watch::Receiver<Option<ExitInfo>> {
        self.exit_tx.subscribe()
    }

    async fn stop(&mut self) -> Result<()> {
        if self.exit_tx.borrow().is_none() {
            self.exit_tx.send_replace(Some(ExitInfo {
                code: None,
                killed: true,
            }));
        }
        remove_artifact(&self.artifact).await
    }
}

// ============================================================================
// Test case stores
// ============================================================================

pub fn memory_store() -> Arc<dyn TestCaseStore> {
    Arc::new(SqliteTestStore::open_memory().unwrap())
}

/// Store that refuses every write
pub struct BrokenStore;

impl TestCaseStore for BrokenStore {
    fn create(&self, _new: recplay_common::NewTestCase) -> Result<recplay_common::TestCase> {
        Err(Error::Internal("disk full".into()))
    }

    fn get(&self, _id: &str) -> Result<Option<recplay_common::TestCase>> {
        Ok(None)
    }

    fn search(&self, _query: Option<&str>) -> Result<Vec<recplay_common::TestCase>> {
        Ok(Vec::new())
    }

    fn delete(&self, _id: &str) -> Result<bool> {
        Ok(false)
    }

    fn record_run(
        &self,
        id: &str,
        _status: recplay_common::TestStatus,
    ) -> Result<recplay_common::TestCase> {
        Err(Error::test_not_found(id))
    }
}

// ============================================================================
// Browser
// ============================================================================

/// Browser that accepts everything except selectors starting with `#missing`
#[derive(Default)]
pub struct LenientBrowser;

#[async_trait]
impl BrowserDriver for LenientBrowser {
    async fn goto_url(&mut self, _url: &str) -> DriverResult<()> {
        Ok(())
    }

    async fn locator_click(&mut self, selector: &str, timeout: Duration) -> DriverResult<()> {
        if selector.starts_with("#missing") {
            return Err(recplay_replay::ReplayError::Timeout {
                op: format!("click {}", selector),
                ms: timeout.as_millis() as u64,
            });
        }
        Ok(())
    }

    async fn locator_fill(&mut self, _selector: &str, _value: &str, _timeout: Duration) -> DriverResult<()> {
        Ok(())
    }

    async fn wait_for(&mut self, _duration: Duration) -> DriverResult<()> {
        Ok(())
    }

    async fn close(&mut self) -> DriverResult<()> {
        Ok(())
    }
}

pub struct LenientFactory;

#[async_trait]
impl DriverFactory for LenientFactory {
    async fn launch(&self) -> DriverResult<Box<dyn BrowserDriver>> {
        Ok(Box::new(LenientBrowser))
    }
}

pub fn runner(output_dir: &Path) -> StepRunner {
    StepRunner::new(
        Arc::new(LenientFactory),
        RunnerConfig {
            settle_delay: Duration::ZERO,
            output_dir: output_dir.to_path_buf(),
        },
    )
}

// ============================================================================
// AI transport
// ============================================================================

/// Transport replaying a fixed response and logging request bodies
#[derive(Clone)]
pub struct CannedTransport {
    pub status: u16,
    pub body: String,
    pub requests: Arc<Mutex<Vec<Value>>>,
}

impl CannedTransport {
    pub fn ok(body: Value) -> Self {
        Self {
            status: 200,
            body: body.to_string(),
            requests: Arc::default(),
        }
    }
}

#[async_trait]
impl Transport for CannedTransport {
    async fn post_json(
        &self,
        _url: &Url,
        _bearer: Option<&str>,
        body: &Value,
        _timeout: Duration,
    ) -> std::result::Result<TransportResponse, TransportError> {
        self.requests.lock().unwrap().push(body.clone());
        Ok(TransportResponse {
            status: self.status,
            body: self.body.clone(),
        })
    }
}

pub fn gateway(endpoint: Option<&str>, transport: CannedTransport) -> AiGateway {
    AiGateway::new(
        GatewayConfig {
            endpoint: endpoint.map(str::to_string),
            api_key: None,
            model: "test-model".to_string(),
            timeout: Duration::from_secs(1),
            max_retries: 1,
        },
        Arc::new(transport),
    )
}

// ============================================================================
// Wiring
// ============================================================================

pub fn supervisor_config(dir: &Path) -> SupervisorConfig {
    SupervisorConfig {
        artifact_dir: dir.join("artifacts"),
        idle_timeout: Some(Duration::from_secs(60)),
        finished_ttl: Duration::from_secs(30),
    }
}

pub fn supervisor(
    backend: FakeBackend,
    store: Arc<dyn TestCaseStore>,
    dir: &Path,
) -> (RecorderSupervisor, SessionRegistry) {
    let registry = SessionRegistry::new();
    let supervisor = RecorderSupervisor::new(
        registry.clone(),
        Arc::new(backend),
        store,
        supervisor_config(dir),
    );
    (supervisor, registry)
}

pub fn app(backend: FakeBackend, transport: CannedTransport, endpoint: Option<&str>, dir: &Path) -> AppContext {
    AppContext::new(
        memory_store(),
        Arc::new(backend),
        runner(&dir.join("results")),
        gateway(endpoint, transport),
        supervisor_config(dir),
    )
}

//! Recorder process supervisor
//!
//! Owns one recording process per session and exposes the code it generates
//! through polling. Session lifecycle:
//!
//! ```text
//!  start ──> Active ──(recorder exits)──> Finished
//!              │                              │
//!              └──── save / stop / reap ──────┴──> Destroyed (deregistered)
//! ```
//!
//! The exit monitor only captures the final artifact and marks the session
//! `Finished`; it never deregisters. Save, stop and the reaper move the
//! session to `Destroyed` under its mutex before removing it, so a caller that
//! was waiting on the mutex observes `SessionGone`.

use recplay_common::{
    Error, NewTestCase, RecordingStatus, RecordingSummary, Result, SessionKind, SessionState,
    TestCase, TestCaseStore,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};
use url::Url;

use crate::backend::{ExitInfo, RecordingBackend, RecordingProcess};
use crate::registry::{RecordingEntry, SessionEntry, SessionRegistry};

/// State of one recording session. Only reachable through its mutex.
pub struct RecordingSession {
    pub id: String,
    pub target_url: String,
    pub test_name: String,
    pub artifact_path: PathBuf,
    /// Unix seconds
    pub started_at: i64,
    pub state: SessionState,
    /// Last content successfully read from the artifact
    pub last_known_code: String,
    pub exit: Option<ExitInfo>,
    started: Instant,
    last_activity: Instant,
    finished_at: Option<Instant>,
    process: Box<dyn RecordingProcess>,
}

impl RecordingSession {
    fn ensure_live(&self) -> Result<()> {
        if self.state == SessionState::Destroyed {
            return Err(Error::SessionGone {
                id: self.id.clone(),
            });
        }
        Ok(())
    }

    /// Read the artifact, falling back to the cache when it is missing or
    /// unreadable
    async fn refresh_code(&mut self) -> String {
        match tokio::fs::read_to_string(&self.artifact_path).await {
            Ok(content) => self.last_known_code = content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                "Failed to read artifact for session {}: {}; serving cached code",
                self.id, e
            ),
        }
        self.last_known_code.clone()
    }

    /// Mark destroyed and release the process and artifact
    async fn destroy(&mut self) {
        self.state = SessionState::Destroyed;
        if let Err(e) = self.process.stop().await {
            warn!("Failed to clean up recorder for session {}: {}", self.id, e);
        }
    }

    /// Like `destroy`, but lets the recorder exit cleanly first
    async fn release(&mut self) {
        self.state = SessionState::Destroyed;
        if let Err(e) = self.process.shutdown().await {
            warn!("Failed to clean up recorder for session {}: {}", self.id, e);
        }
    }

    fn summary(&self, now: Instant) -> RecordingSummary {
        RecordingSummary {
            session_id: self.id.clone(),
            target_url: self.target_url.clone(),
            test_name: self.test_name.clone(),
            state: self.state,
            started_at: self.started_at,
            age_secs: now.saturating_duration_since(self.started).as_secs(),
            pid: self.process.pid(),
        }
    }

    /// Whether the reaper should remove this session at `now`
    fn expired(&self, now: Instant, idle_timeout: Option<Duration>, finished_ttl: Duration) -> bool {
        match self.state {
            SessionState::Active => idle_timeout
                .map(|t| now.saturating_duration_since(self.last_activity) >= t)
                .unwrap_or(false),
            SessionState::Finished => {
                let since = self.finished_at.unwrap_or(self.last_activity);
                now.saturating_duration_since(since) >= finished_ttl
            }
            SessionState::Destroyed => false,
        }
    }
}

/// Supervisor timing knobs
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub artifact_dir: PathBuf,
    pub idle_timeout: Option<Duration>,
    pub finished_ttl: Duration,
}

/// Starts, polls, saves and stops recording sessions
pub struct RecorderSupervisor {
    registry: SessionRegistry,
    backend: Arc<dyn RecordingBackend>,
    store: Arc<dyn TestCaseStore>,
    config: SupervisorConfig,
}

impl RecorderSupervisor {
    pub fn new(
        registry: SessionRegistry,
        backend: Arc<dyn RecordingBackend>,
        store: Arc<dyn TestCaseStore>,
        config: SupervisorConfig,
    ) -> Self {
        Self {
            registry,
            backend,
            store,
            config,
        }
    }

    /// Start a recording session for `target_url`
    pub async fn start(&self, target_url: &str, test_name: &str) -> Result<String> {
        validate_target(target_url)?;
        let test_name = test_name.trim();
        if test_name.is_empty() {
            return Err(Error::InvalidRequest("test name must not be empty".into()));
        }

        let session_id = SessionRegistry::new_session_id(SessionKind::Recording);
        tokio::fs::create_dir_all(&self.config.artifact_dir).await?;
        let artifact_path = self.config.artifact_dir.join(format!("{}.js", session_id));

        let process = self
            .backend
            .start(&session_id, target_url, &artifact_path)
            .await?;
        let exit_rx = process.exit_watch();

        let now = Instant::now();
        let started_at = chrono::Utc::now().timestamp();
        let handle = Arc::new(Mutex::new(RecordingSession {
            id: session_id.clone(),
            target_url: target_url.to_string(),
            test_name: test_name.to_string(),
            artifact_path,
            started_at,
            state: SessionState::Active,
            last_known_code: String::new(),
            exit: None,
            started: now,
            last_activity: now,
            finished_at: None,
            process,
        }));

        let entry = SessionEntry::Recording(RecordingEntry {
            target_url: target_url.to_string(),
            started_at,
            session: handle.clone(),
        });
        if let Err(e) = self.registry.insert(&session_id, entry) {
            handle.lock().await.destroy().await;
            return Err(e);
        }

        tokio::spawn(monitor_exit(session_id.clone(), Arc::downgrade(&handle), exit_rx));

        info!(
            "Recording session {} started for {} ({})",
            session_id, target_url, test_name
        );
        Ok(session_id)
    }

    /// Current liveness and latest generated code
    pub async fn status(&self, session_id: &str) -> Result<RecordingStatus> {
        let handle = self.registry.get_recording(session_id)?;
        let mut session = handle.lock().await;
        session.ensure_live()?;
        session.last_activity = Instant::now();

        let code = session.refresh_code().await;
        let poll = session.process.poll();
        Ok(RecordingStatus {
            session_id: session.id.clone(),
            state: session.state,
            running: poll.running,
            code,
            exit_code: poll.exit_code,
        })
    }

    /// Persist the recorded code as a test case, then tear the session down.
    /// If persistence fails the session is left untouched.
    pub async fn save(&self, session_id: &str, test_name: Option<&str>) -> Result<TestCase> {
        let handle = self.registry.get_recording(session_id)?;
        let mut session = handle.lock().await;
        session.ensure_live()?;
        session.last_activity = Instant::now();

        let code = session.refresh_code().await;
        if code.trim().is_empty() {
            warn!("Saving session {} with no recorded code", session_id);
        }

        let name = test_name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(&session.test_name)
            .to_string();
        let mut metadata = HashMap::new();
        metadata.insert("session_id".to_string(), session_id.to_string());
        metadata.insert("recorder".to_string(), "playwright-codegen".to_string());

        let record = self.store.create(NewTestCase {
            name,
            url: session.target_url.clone(),
            code,
            steps: Vec::new(),
            metadata,
        })?;

        session.destroy().await;
        drop(session);
        self.registry.remove(session_id);

        info!("Recording session {} saved as test {}", session_id, record.id);
        Ok(record)
    }

    /// Terminate the recorder, discard its artifact and deregister
    pub async fn stop(&self, session_id: &str) -> Result<()> {
        let handle = self.registry.get_recording(session_id)?;
        let mut session = handle.lock().await;
        session.ensure_live()?;

        session.destroy().await;
        drop(session);
        self.registry.remove(session_id);

        info!("Recording session {} stopped", session_id);
        Ok(())
    }

    /// Diagnostic listing of recording sessions, oldest first
    pub async fn list(&self) -> Vec<RecordingSummary> {
        let now = Instant::now();
        let mut list = Vec::new();
        for (_, entry) in self.registry.recordings() {
            let session = entry.session.lock().await;
            if session.state != SessionState::Destroyed {
                list.push(session.summary(now));
            }
        }
        list.sort_by(|a, b| {
            a.started_at
                .cmp(&b.started_at)
                .then_with(|| a.session_id.cmp(&b.session_id))
        });
        list
    }

    /// Remove finished sessions past their TTL and active sessions idle past
    /// the idle timeout. Returns how many sessions were removed.
    pub async fn reap(&self, now: Instant) -> usize {
        let mut reaped = 0;
        for (session_id, entry) in self.registry.recordings() {
            let mut session = entry.session.lock().await;
            if !session.expired(now, self.config.idle_timeout, self.config.finished_ttl) {
                continue;
            }

            info!("Reaping {} recording session {}", session.state, session_id);
            session.destroy().await;
            drop(session);
            self.registry.remove(&session_id);
            reaped += 1;
        }
        reaped
    }

    /// Stop every recording session (daemon shutdown)
    pub async fn shutdown(&self) {
        for (session_id, entry) in self.registry.recordings() {
            let mut session = entry.session.lock().await;
            if session.state != SessionState::Destroyed {
                session.release().await;
            }
            drop(session);
            self.registry.remove(&session_id);
        }
    }

    pub fn artifact_dir(&self) -> &Path {
        &self.config.artifact_dir
    }
}

/// Waits for the recorder to exit and captures its final output
async fn monitor_exit(
    session_id: String,
    session: Weak<Mutex<RecordingSession>>,
    mut exit_rx: watch::Receiver<Option<ExitInfo>>,
) {
    let exit = match exit_rx.wait_for(|v| v.is_some()).await {
        Ok(v) => *v,
        Err(_) => return,
    };

    let Some(handle) = session.upgrade() else {
        return;
    };
    let mut session = handle.lock().await;
    if session.state != SessionState::Active {
        debug!("Recorder exit for session {} already handled", session_id);
        return;
    }

    session.refresh_code().await;
    session.exit = exit;
    session.state = SessionState::Finished;
    session.finished_at = Some(Instant::now());
    info!(
        "Recorder for session {} exited ({:?}); session kept for saving",
        session_id,
        exit.and_then(|e| e.code)
    );
}

fn validate_target(target_url: &str) -> Result<()> {
    let url = Url::parse(target_url)?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(Error::InvalidRequest(format!(
            "unsupported URL scheme '{}', expected http or https",
            other
        ))),
    }
}

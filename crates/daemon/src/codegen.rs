//! Playwright codegen recording backend
//!
//! Spawns the configured recording command per session and supervises it from
//! a watcher task that owns the child. `stop` kills outright; daemon shutdown
//! sends SIGTERM and kills once the shutdown grace period runs out.

use async_trait::async_trait;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use parking_lot::Mutex;
use recplay_common::{Error, Result};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tokio::sync::{oneshot, watch};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::backend::{remove_artifact, ExitInfo, ProcessPoll, RecordingBackend, RecordingProcess};
use crate::config::RecorderConfig;

/// Lines of recorder stderr kept for start-failure reports
const STDERR_TAIL_LINES: usize = 20;

/// Upper bound on waiting for a killed child to be reaped
const REAP_WAIT: Duration = Duration::from_secs(2);

/// How the watcher should end the child
#[derive(Debug, Clone, Copy)]
enum Termination {
    Kill,
    Graceful,
}

/// Recording backend running Playwright codegen (or any compatible command)
#[derive(Debug, Clone)]
pub struct CodegenBackend {
    command: String,
    args: Vec<String>,
    startup_grace: Duration,
    shutdown_grace: Duration,
}

impl CodegenBackend {
    pub fn new(config: &RecorderConfig) -> Self {
        Self {
            command: config.command.clone(),
            args: config.args.clone(),
            startup_grace: config.startup_grace(),
            shutdown_grace: config.shutdown_grace(),
        }
    }

    /// Arguments with `{output}` and `{url}` substituted
    pub fn build_args(&self, target_url: &str, artifact_path: &Path) -> Vec<String> {
        let output = artifact_path.to_string_lossy();
        self.args
            .iter()
            .map(|a| a.replace("{output}", &output).replace("{url}", target_url))
            .collect()
    }
}

#[async_trait]
impl RecordingBackend for CodegenBackend {
    async fn start(
        &self,
        session_id: &str,
        target_url: &str,
        artifact_path: &Path,
    ) -> Result<Box<dyn RecordingProcess>> {
        let args = self.build_args(target_url, artifact_path);
        debug!("Recorder command: {} {}", self.command, args.join(" "));

        let mut child = Command::new(&self.command)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Spawn(format!("failed to spawn '{}': {}", self.command, e)))?;

        let pid = child.id();
        let tail = Arc::new(Mutex::new(VecDeque::with_capacity(STDERR_TAIL_LINES)));
        let drain = child
            .stderr
            .take()
            .map(|stderr| tokio::spawn(drain_stderr(session_id.to_string(), stderr, tail.clone())));

        // An exit inside the startup window is a start failure unless it was clean
        let early_exit = match timeout(self.startup_grace, child.wait()).await {
            Err(_) => None,
            Ok(Ok(status)) if status.success() => Some(status),
            Ok(Ok(status)) => {
                if let Some(handle) = drain {
                    let _ = timeout(Duration::from_millis(200), handle).await;
                }
                let tail = tail.lock().iter().cloned().collect::<Vec<_>>().join("\n");
                return Err(Error::Spawn(format!(
                    "'{}' exited with {} during startup{}{}",
                    self.command,
                    status,
                    if tail.is_empty() { "" } else { ": " },
                    tail
                )));
            }
            Ok(Err(e)) => {
                return Err(Error::Spawn(format!("failed to wait for '{}': {}", self.command, e)))
            }
        };

        info!("Recorder for session {} started (pid: {:?})", session_id, pid);

        let (exit_tx, exit_rx) = watch::channel(None);
        let (kill_tx, kill_rx) = oneshot::channel();
        match early_exit {
            Some(status) => {
                let _ = exit_tx.send(Some(exit_info(status, false)));
            }
            None => {
                tokio::spawn(watch_child(
                    session_id.to_string(),
                    child,
                    kill_rx,
                    exit_tx,
                    self.shutdown_grace,
                ));
            }
        }

        Ok(Box::new(CodegenProcess {
            session_id: session_id.to_string(),
            pid,
            artifact_path: artifact_path.to_path_buf(),
            exit_rx,
            kill_tx: Some(kill_tx),
            shutdown_wait: self.shutdown_grace + REAP_WAIT,
        }))
    }
}

/// Handle to a running codegen process
pub struct CodegenProcess {
    session_id: String,
    pid: Option<u32>,
    artifact_path: PathBuf,
    exit_rx: watch::Receiver<Option<ExitInfo>>,
    kill_tx: Option<oneshot::Sender<Termination>>,
    shutdown_wait: Duration,
}

impl CodegenProcess {
    async fn request_exit(&mut self, how: Termination, wait: Duration) -> Result<()> {
        if let Some(tx) = self.kill_tx.take() {
            let _ = tx.send(how);
            let mut rx = self.exit_rx.clone();
            if timeout(wait, rx.wait_for(|v| v.is_some())).await.is_err() {
                warn!("Recorder for session {} did not exit in time", self.session_id);
            }
        }
        remove_artifact(&self.artifact_path).await
    }
}

#[async_trait]
impl RecordingProcess for CodegenProcess {
    fn pid(&self) -> Option<u32> {
        self.pid
    }

    fn poll(&self) -> ProcessPoll {
        ProcessPoll::from_exit(*self.exit_rx.borrow())
    }

    fn exit_watch(&self) -> watch::Receiver<Option<ExitInfo>> {
        self.exit_rx.clone()
    }

    async fn stop(&mut self) -> Result<()> {
        self.request_exit(Termination::Kill, REAP_WAIT).await
    }

    async fn shutdown(&mut self) -> Result<()> {
        let wait = self.shutdown_wait;
        self.request_exit(Termination::Graceful, wait).await
    }
}

/// Owns the child until it exits, on its own or because a stop was requested
async fn watch_child(
    session_id: String,
    mut child: Child,
    kill_rx: oneshot::Receiver<Termination>,
    exit_tx: watch::Sender<Option<ExitInfo>>,
    shutdown_grace: Duration,
) {
    let info = tokio::select! {
        status = child.wait() => match status {
            Ok(status) => exit_info(status, false),
            Err(e) => {
                warn!("Failed to wait for recorder of session {}: {}", session_id, e);
                ExitInfo { code: None, killed: false }
            }
        },
        how = kill_rx => match how {
            Ok(Termination::Graceful) => terminate(&session_id, &mut child, shutdown_grace).await,
            // A dropped handle counts as a stop request
            Ok(Termination::Kill) | Err(_) => force_kill(&session_id, &mut child).await,
        },
    };

    debug!("Recorder for session {} exited: {:?}", session_id, info);
    let _ = exit_tx.send(Some(info));
}

/// SIGTERM, then kill once `grace` runs out
async fn terminate(session_id: &str, child: &mut Child, grace: Duration) -> ExitInfo {
    if let Some(pid) = child.id() {
        if kill(Pid::from_raw(pid as i32), Signal::SIGTERM).is_ok() {
            if let Ok(Ok(status)) = timeout(grace, child.wait()).await {
                return exit_info(status, true);
            }
        }
    }

    force_kill(session_id, child).await
}

async fn force_kill(session_id: &str, child: &mut Child) -> ExitInfo {
    info!("Killing recorder of session {}", session_id);
    let _ = child.start_kill();
    match child.wait().await {
        Ok(status) => exit_info(status, true),
        Err(_) => ExitInfo { code: None, killed: true },
    }
}

async fn drain_stderr(session_id: String, stderr: ChildStderr, tail: Arc<Mutex<VecDeque<String>>>) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!(session = %session_id, "recorder: {}", line);
        let mut tail = tail.lock();
        if tail.len() == STDERR_TAIL_LINES {
            tail.pop_front();
        }
        tail.push_back(line);
    }
}

fn exit_info(status: ExitStatus, killed: bool) -> ExitInfo {
    ExitInfo {
        code: status.code(),
        killed,
    }
}

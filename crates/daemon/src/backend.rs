//! Recording backend capability
//!
//! The supervisor never touches processes or files directly; it drives a
//! [`RecordingBackend`] that starts one [`RecordingProcess`] per session.

use async_trait::async_trait;
use recplay_common::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::sync::watch;

/// How a recording process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitInfo {
    /// Exit code, if the process exited normally
    pub code: Option<i32>,
    /// True when the exit was caused by `stop`
    pub killed: bool,
}

/// Liveness snapshot of a recording process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessPoll {
    pub running: bool,
    pub exit_code: Option<i32>,
}

impl ProcessPoll {
    /// Derive a poll result from the exit watch value
    pub fn from_exit(exit: Option<ExitInfo>) -> Self {
        match exit {
            Some(info) => Self {
                running: false,
                exit_code: info.code,
            },
            None => Self {
                running: true,
                exit_code: None,
            },
        }
    }
}

/// Starts recording processes
#[async_trait]
pub trait RecordingBackend: Send + Sync {
    /// Start recording `target_url`, with generated code written to
    /// `artifact_path`. Fails with `Error::Spawn` when the tool cannot be
    /// started or dies during its startup window.
    async fn start(
        &self,
        session_id: &str,
        target_url: &str,
        artifact_path: &Path,
    ) -> Result<Box<dyn RecordingProcess>>;
}

/// Exclusive handle to one running recording process
#[async_trait]
pub trait RecordingProcess: Send + Sync {
    /// OS process id, when there is one
    fn pid(&self) -> Option<u32>;

    /// Current liveness
    fn poll(&self) -> ProcessPoll;

    /// Receiver that flips from `None` to `Some` once the process has exited
    fn exit_watch(&self) -> watch::Receiver<Option<ExitInfo>>;

    /// Forcibly terminate the process if alive and delete the artifact if
    /// present. Returns without waiting for a graceful exit. Idempotent.
    async fn stop(&mut self) -> Result<()>;

    /// Terminate for daemon shutdown, giving the process a chance to exit
    /// cleanly. Same cleanup as `stop`.
    async fn shutdown(&mut self) -> Result<()> {
        self.stop().await
    }
}

/// Delete an artifact file, treating a missing file as success
pub async fn remove_artifact(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_from_exit() {
        assert!(ProcessPoll::from_exit(None).running);
        let done = ProcessPoll::from_exit(Some(ExitInfo { code: Some(3), killed: false }));
        assert!(!done.running);
        assert_eq!(done.exit_code, Some(3));
    }

    #[tokio::test]
    async fn test_remove_missing_artifact_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rec.js");
        remove_artifact(&path).await.unwrap();

        tokio::fs::write(&path, "x").await.unwrap();
        remove_artifact(&path).await.unwrap();
        assert!(!path.exists());
    }
}

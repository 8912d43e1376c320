//! Replay service: runs the step runner under a registered replay session

use recplay_common::{
    Error, ReplayRequest, ReplayResult, Result, SessionKind, TestCase, TestCaseStore,
};
use recplay_replay::StepRunner;
use std::sync::Arc;
use tracing::info;

use crate::registry::{ReplayEntry, SessionEntry, SessionRegistry};

/// Replays requests and stored test cases
pub struct ReplayService {
    runner: StepRunner,
    registry: SessionRegistry,
    store: Arc<dyn TestCaseStore>,
}

/// Keeps a replay session registered until dropped, including when the
/// request future is cancelled mid-run
struct Registration {
    registry: SessionRegistry,
    session_id: String,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.remove(&self.session_id);
    }
}

impl ReplayService {
    pub fn new(runner: StepRunner, registry: SessionRegistry, store: Arc<dyn TestCaseStore>) -> Self {
        Self {
            runner,
            registry,
            store,
        }
    }

    /// Replay an action sequence. Failures during the replay are part of the
    /// returned result; only an unusable request is an error.
    pub async fn run(&self, request: &ReplayRequest) -> Result<ReplayResult> {
        if request.target_url.trim().is_empty() {
            return Err(Error::InvalidRequest("target_url must not be empty".into()));
        }

        let session_id = SessionRegistry::new_session_id(SessionKind::Replay);
        self.registry.insert(
            &session_id,
            SessionEntry::Replay(ReplayEntry {
                target_url: request.target_url.clone(),
                started_at: chrono::Utc::now().timestamp(),
            }),
        )?;
        let _registration = Registration {
            registry: self.registry.clone(),
            session_id: session_id.clone(),
        };

        info!(
            "Replay {} started: {} step(s) against {}",
            session_id,
            request.steps.len(),
            request.target_url
        );
        let result = self.runner.run(&request.target_url, &request.steps).await;
        info!(
            "Replay {} {} in {} ms",
            session_id, result.status, result.duration_ms
        );

        Ok(result)
    }

    /// Replay a stored test case and record the outcome on it.
    ///
    /// Recordings are saved as generated code only, so a test without typed
    /// steps is rejected rather than recorded as a pass.
    pub async fn run_test(&self, test_id: &str) -> Result<(TestCase, ReplayResult)> {
        let test = self
            .store
            .get(test_id)?
            .ok_or_else(|| Error::test_not_found(test_id))?;
        if test.steps.is_empty() {
            return Err(Error::InvalidRequest(format!(
                "test {} has no replayable steps",
                test_id
            )));
        }

        let request = ReplayRequest {
            target_url: test.url.clone(),
            steps: test.steps.clone(),
        };
        let result = self.run(&request).await?;
        let updated = self.store.record_run(test_id, result.status.into())?;
        Ok((updated, result))
    }
}

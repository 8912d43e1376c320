//! Application context shared by the API handlers

use recplay_common::{SqliteTestStore, TestCaseStore};
use recplay_replay::{playwright::Browser, PlaywrightConfig, PlaywrightFactory, RunnerConfig, StepRunner};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::backend::RecordingBackend;
use crate::codegen::CodegenBackend;
use crate::config::DaemonConfig;
use crate::gateway::{AiGateway, GatewayConfig, HttpTransport};
use crate::recorder::{RecorderSupervisor, SupervisorConfig};
use crate::registry::SessionRegistry;
use crate::replay::ReplayService;

/// Everything a request needs, built once at startup
#[derive(Clone)]
pub struct AppContext {
    pub registry: SessionRegistry,
    pub store: Arc<dyn TestCaseStore>,
    pub recorder: Arc<RecorderSupervisor>,
    pub replay: Arc<ReplayService>,
    pub gateway: Arc<AiGateway>,
}

impl AppContext {
    /// Wire the production backends from configuration
    pub fn from_config(config: &DaemonConfig) -> anyhow::Result<Self> {
        let store: Arc<dyn TestCaseStore> = Arc::new(SqliteTestStore::open(config.db_path())?);
        let backend: Arc<dyn RecordingBackend> = Arc::new(CodegenBackend::new(&config.recorder));

        let browser: Browser = config.replay.browser.parse()?;
        let factory = PlaywrightFactory::new(PlaywrightConfig {
            node_binary: config.replay.node_binary.clone(),
            working_dir: config.replay.working_dir.clone(),
            browser,
            headless: config.replay.headless,
            viewport_width: config.replay.viewport_width,
            viewport_height: config.replay.viewport_height,
            launch_timeout: Duration::from_millis(config.replay.launch_timeout_ms),
            navigation_timeout: Duration::from_millis(config.replay.navigation_timeout_ms),
        });
        let runner = StepRunner::new(
            Arc::new(factory),
            RunnerConfig {
                settle_delay: Duration::from_millis(config.replay.settle_delay_ms),
                output_dir: config.results_dir(),
            },
        );

        let gateway_config = GatewayConfig::from_env(&config.ai);
        match &gateway_config.endpoint {
            Some(endpoint) => info!("AI gateway endpoint: {}", endpoint),
            None => info!("AI gateway not configured; AI routes will report config errors"),
        }
        let gateway = AiGateway::new(gateway_config, Arc::new(HttpTransport::new()));

        Ok(Self::new(
            store,
            backend,
            runner,
            gateway,
            SupervisorConfig {
                artifact_dir: config.artifact_dir(),
                idle_timeout: config.recorder.idle_timeout(),
                finished_ttl: config.recorder.finished_ttl(),
            },
        ))
    }

    /// Assemble a context from explicit parts
    pub fn new(
        store: Arc<dyn TestCaseStore>,
        backend: Arc<dyn RecordingBackend>,
        runner: StepRunner,
        gateway: AiGateway,
        supervisor: SupervisorConfig,
    ) -> Self {
        let registry = SessionRegistry::new();
        let recorder = Arc::new(RecorderSupervisor::new(
            registry.clone(),
            backend,
            store.clone(),
            supervisor,
        ));
        let replay = Arc::new(ReplayService::new(runner, registry.clone(), store.clone()));

        Self {
            registry,
            store,
            recorder,
            replay,
            gateway: Arc::new(gateway),
        }
    }
}

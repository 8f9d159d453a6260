//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the settings root and the platform's processing chain
//! - Restore stored settings once every element has attached its own
//! - Wire the runner slot, the bridge and the connection pool together
//!
//! # Design Decisions
//! - Fail fast: an unsupported platform or a settings clash is fatal
//! - Settings are loaded after chain assembly so stored values land on real nodes
//! - Listeners are bound by the caller, after this succeeds

use std::sync::{Arc, Mutex};

use thiserror::Error;

use crate::config::AppConfig;
use crate::http::AppState;
use crate::lifecycle::Shutdown;
use crate::pipeline::{CallbackRegistry, PipelineError, ProcessingChain};
use crate::pool::{ConnectionPool, ConnectionTracker};
use crate::runner::{self, BridgeDrain, RunnerSlot, SharedPipeline};
use crate::settings::{SettingsNode, SettingsStore, SubtreeWidget};

/// Startup failures.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to assemble pipeline: {0}")]
    Pipeline(#[from] PipelineError),
}

/// Everything the HTTP server needs, ready to serve.
pub struct Runtime {
    pub state: AppState,
    pub drain: BridgeDrain,
}

/// Assemble all subsystems from `config`.
pub fn assemble(config: &AppConfig, shutdown: Shutdown) -> Result<Runtime, StartupError> {
    let root = SettingsNode::root()
        .with_label("Settings")
        .with_widget(Arc::new(SubtreeWidget));
    let settings = Arc::new(SettingsStore::new(&config.settings.path, root));
    let callbacks = Arc::new(CallbackRegistry::new());

    let chain = ProcessingChain::for_platform(
        &config.pipeline.platform,
        Arc::clone(&settings),
        Arc::clone(&callbacks),
    )?;
    let platform = chain.platform().to_string();
    settings.load();

    let pipeline: SharedPipeline = Arc::new(Mutex::new(Box::new(chain)));
    let (bridge, drain) = runner::bridge::channel();
    let runners = Arc::new(RunnerSlot::new(pipeline, bridge, config.runner.clone()));

    tracing::info!(
        platform = %platform,
        settings = %config.settings.path.display(),
        topic = %config.runner.topic,
        "Subsystems assembled"
    );

    Ok(Runtime {
        state: AppState {
            settings,
            pool: Arc::new(ConnectionPool::new()),
            runners,
            callbacks,
            tracker: ConnectionTracker::new(),
            shutdown,
            send_buffer: config.connections.send_buffer,
            platform,
        },
        drain,
    })
}

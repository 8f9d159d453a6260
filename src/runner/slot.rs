//! Process-wide owner of the current runner instance.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::config::RunnerConfig;
use crate::runner::background::{BackgroundRunner, SharedPipeline};
use crate::runner::bridge::Bridge;
use crate::runner::RunnerError;

/// Holds at most one logically current [`BackgroundRunner`].
pub struct RunnerSlot {
    current: Mutex<Option<Arc<BackgroundRunner>>>,
    pipeline: SharedPipeline,
    bridge: Bridge,
    config: RunnerConfig,
}

impl RunnerSlot {
    pub fn new(pipeline: SharedPipeline, bridge: Bridge, config: RunnerConfig) -> Self {
        Self {
            current: Mutex::new(None),
            pipeline,
            bridge,
            config,
        }
    }

    /// The current runner, replaced by a fresh generation if the old one fully exited.
    pub fn get_or_create(&self) -> Arc<BackgroundRunner> {
        let mut current = self.lock_current();
        if let Some(runner) = current.as_ref().filter(|r| !r.has_exited()) {
            return Arc::clone(runner);
        }

        let previous = current.as_ref().map(|r| r.generation());
        let runner = Arc::new(BackgroundRunner::new(
            Arc::clone(&self.pipeline),
            self.bridge.clone(),
            self.config.clone(),
        ));
        tracing::debug!(generation = %runner.generation(), ?previous, "Runner instance created");
        *current = Some(Arc::clone(&runner));
        runner
    }

    /// The current runner, if any was ever created.
    pub fn current(&self) -> Option<Arc<BackgroundRunner>> {
        self.lock_current().clone()
    }

    /// Start the current runner, creating one if needed.
    pub fn activate(&self) -> Result<Arc<BackgroundRunner>, RunnerError> {
        let runner = self.get_or_create();
        runner.start()?;
        Ok(runner)
    }

    /// Stop the current runner. No-op if there is none.
    pub fn deactivate(&self) -> bool {
        self.current().is_some_and(|runner| runner.stop())
    }

    pub fn is_running(&self) -> bool {
        self.current().is_some_and(|runner| runner.is_running())
    }

    fn lock_current(&self) -> MutexGuard<'_, Option<Arc<BackgroundRunner>>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for RunnerSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunnerSlot")
            .field("current", &self.current())
            .field("topic", &self.config.topic)
            .finish()
    }
}
